//! The `Runtime`, the process-lifetime object behind §4.4: wires the Store,
//! both tool registries, the secret broker, and an `LlmProvider` together and
//! drives the chat loop of §4.4.4. Grounded in the source project's
//! `skynet-agent/src/runtime.rs` `AgentRuntime` shape, narrowed to this
//! project's explicit-builder model (Design Note §9): a fresh per-turn tool
//! set and system prompt are built from the shared registries on every call,
//! rather than a long-lived closure-captured agent object.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use pith_core::config::AgentConfig;
use pith_core::types::{ProfileType, SessionId};
use pith_extensions::ExtensionRegistry;
use pith_mcp::McpRegistry;
use pith_store::types::ModelMessage;
use pith_store::Store;

use crate::error::Result;
use crate::prompt::{build_system_prompt, PromptInputs};
use crate::provider::{ChatRequest, LlmProvider};
use crate::secrets::SecretBroker;
use crate::tools::builtin::{BuiltinTools, SecretRequestCallback};
use crate::tools::edit::EditTool;
use crate::tools::file_search::FileSearchTool;
use crate::tools::list_dir::ListDirTool;
use crate::tools::list_secrets::ListSecretsTool;
use crate::tools::memory_save::MemorySaveTool;
use crate::tools::memory_search::MemorySearchTool;
use crate::tools::read::ReadTool;
use crate::tools::run_python::RunPythonTool;
use crate::tools::set_profile::SetProfileTool;
use crate::tools::store_secret::StoreSecretTool;
use crate::tools::tool_call::ToolCallTool;
use crate::tools::tool_loop::{run_tool_loop, ToolLoopCallbacks};
use crate::tools::write::WriteTool;
use crate::tools::{to_definitions, Tool};

const SOUL_FILE: &str = "SOUL.md";
/// Top-N memory entries retrieved per turn, per §4.4.4 step 3.
const DEFAULT_MEMORY_SEARCH_LIMIT: usize = 8;

pub struct Runtime {
    pub store: Arc<Store>,
    builtin: Arc<BuiltinTools>,
    provider: Box<dyn LlmProvider>,
    workspace_root: PathBuf,
    model: String,
    history_limit: usize,
}

/// Per-call knobs and callbacks for `Runtime::chat`, matching §4.4.4's
/// `chat(message, session_id?, on_text?, on_tool_call?, on_tool_result?,
/// on_secret_request?, channel?)`.
#[derive(Default)]
pub struct ChatOptions<'a> {
    pub session_id: Option<SessionId>,
    pub channel: Option<&'a str>,
    pub on_text: Option<&'a (dyn Fn(&str) + Send + Sync)>,
    pub on_tool_call: Option<&'a (dyn Fn(&str, &serde_json::Value) + Send + Sync)>,
    pub on_tool_result: Option<&'a (dyn Fn(&str, bool) + Send + Sync)>,
    pub on_secret_request: Option<SecretRequestCallback>,
    /// Fired by the caller (e.g. on client disconnect) to stop the loop from
    /// starting any further model call or tool execution. Per §5
    /// "Cancellation".
    pub cancel: Option<&'a CancellationToken>,
}

pub struct ChatOutcome {
    pub session_id: SessionId,
    pub text: String,
}

impl Runtime {
    pub fn new(
        workspace_root: PathBuf,
        provider: Box<dyn LlmProvider>,
        config: &AgentConfig,
        remote_tool_prefix: &str,
    ) -> Result<Self> {
        let store = Arc::new(Store::open(&workspace_root)?);
        let extensions = Arc::new(ExtensionRegistry::new(remote_tool_prefix));
        let mcp = Arc::new(McpRegistry::with_timeout(
            remote_tool_prefix,
            Duration::from_secs(config.remote_tool_timeout_secs),
        ));
        let secrets = Arc::new(SecretBroker::new());

        let builtin = Arc::new(BuiltinTools {
            store: store.clone(),
            workspace_root: workspace_root.clone(),
            extensions,
            mcp,
            secrets,
            remote_tool_prefix: remote_tool_prefix.to_string(),
            tool_output_max_chars: config.tool_output_max_chars,
        });

        Ok(Self {
            store,
            builtin,
            provider,
            workspace_root,
            model: config.model.clone(),
            history_limit: config.history_limit,
        })
    }

    /// Refreshes both tool registries from the workspace, then reconciles
    /// bootstrap state (§4.4.1). Call once at process startup and whenever an
    /// operator wants extension/mcp config changes picked up without a
    /// restart.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        self.builtin.extensions.refresh(&self.workspace_root)?;
        self.builtin.mcp.refresh(&self.workspace_root).await?;

        let bootstrap_complete = self.store.get_bootstrap_state()?;
        self.store.log_event(
            "initialize",
            "info",
            serde_json::json!({ "bootstrap_complete": bootstrap_complete }),
        )?;
        if !bootstrap_complete {
            self.store.set_app_state("bootstrap_note", "identity not fully configured")?;
        }

        Ok(())
    }

    fn soul_text(&self) -> Option<String> {
        std::fs::read_to_string(self.workspace_root.join(SOUL_FILE)).ok()
    }

    fn build_tools(&self, on_secret_request: Option<SecretRequestCallback>) -> Vec<Box<dyn Tool>> {
        vec![
            Box::new(ReadTool { builtin: self.builtin.clone() }),
            Box::new(WriteTool { builtin: self.builtin.clone() }),
            Box::new(EditTool { builtin: self.builtin.clone() }),
            Box::new(ListDirTool { builtin: self.builtin.clone() }),
            Box::new(FileSearchTool { builtin: self.builtin.clone() }),
            Box::new(RunPythonTool { builtin: self.builtin.clone() }),
            Box::new(MemorySaveTool { builtin: self.builtin.clone() }),
            Box::new(MemorySearchTool { builtin: self.builtin.clone() }),
            Box::new(SetProfileTool { builtin: self.builtin.clone() }),
            Box::new(ToolCallTool { builtin: self.builtin.clone() }),
            Box::new(ListSecretsTool { builtin: self.builtin.clone() }),
            Box::new(StoreSecretTool { builtin: self.builtin.clone(), on_secret_request }),
        ]
    }

    /// §4.4.4's `chat(...)`.
    #[instrument(skip(self, message, options))]
    pub async fn chat(&self, message: &str, options: ChatOptions<'_>) -> Result<ChatOutcome> {
        let session_id = match options.session_id {
            Some(id) => id,
            None => self.store.ensure_active_session()?,
        };
        let bootstrap = self.store.get_bootstrap_state()?;
        self.store.log_event(
            "chat_start",
            "info",
            serde_json::json!({ "session_id": session_id.as_str(), "channel": options.channel }),
        )?;

        let history = self.store.get_message_history(&session_id, self.history_limit)?;

        let memories = self.store.memory_search(message, DEFAULT_MEMORY_SEARCH_LIMIT)?;
        let user_text = if memories.is_empty() {
            message.to_string()
        } else {
            let preface = memories
                .iter()
                .map(|m| format!("- {}", m.content))
                .collect::<Vec<_>>()
                .join("\n");
            format!("[Relevant memories]\n{preface}\n\n{message}")
        };

        let agent_profile = self.store.get_profile(ProfileType::Agent)?;
        let user_profile = self.store.get_profile(ProfileType::User)?;
        let soul_text = self.soul_text();
        let extension_tool_names = self.builtin.extensions.tool_names();
        let remote_tools = self.builtin.mcp.tool_descriptions();

        let system_prompt = build_system_prompt(&PromptInputs {
            bootstrap,
            agent_profile: &agent_profile,
            user_profile: &user_profile,
            soul_text: soul_text.as_deref(),
            extension_tool_names: &extension_tool_names,
            remote_tools: &remote_tools,
            channel: options.channel,
        });

        let tools = self.build_tools(options.on_secret_request);

        let mut messages = history;
        let user_message = ModelMessage::User { text: user_text };
        messages.push(user_message.clone());

        let request = ChatRequest {
            model: self.model.clone(),
            system_prompt,
            messages,
            tools: to_definitions(&tools),
            max_tokens: 4096,
        };

        let callbacks = ToolLoopCallbacks {
            on_text: options.on_text,
            on_tool_call: options.on_tool_call,
            on_tool_result: options.on_tool_result,
        };

        let outcome = run_tool_loop(self.provider.as_ref(), request, &tools, &callbacks, options.cancel).await?;

        let mut new_messages = Vec::with_capacity(outcome.new_messages.len() + 1);
        new_messages.push(user_message);
        new_messages.extend(outcome.new_messages);
        self.store.append_messages(&session_id, &new_messages)?;

        if bootstrap {
            self.store.get_bootstrap_state()?;
        }

        self.store.log_event(
            "chat_done",
            "info",
            serde_json::json!({ "session_id": session_id.as_str(), "stop_reason": outcome.stop_reason }),
        )?;

        Ok(ChatOutcome { session_id, text: outcome.final_text })
    }

    /// §4.4.5 step 4: delivers a secret value to the waiting `store_secret`
    /// call. Returns `true` if a waiter was still pending.
    pub fn provide_secret(&self, request_id: &str, value: String) -> bool {
        self.builtin.secrets.provide(request_id, value)
    }

    /// §4.4.6.
    pub fn new_session(&self) -> Result<SessionId> {
        Ok(self.store.new_session()?)
    }

    /// §4.4.6, `compact_session(keep=50)`.
    pub fn compact_session(&self, session_id: &SessionId, keep: usize) -> Result<String> {
        match self.store.compact_session(session_id, keep)? {
            Some(summary) => Ok(format!(
                "compacted session {} ({} chars summarized)",
                session_id,
                summary.summary_text.len()
            )),
            None => Ok(format!("session {session_id} has no surplus messages to compact")),
        }
    }

    /// §4.4.6, `get_info(session_id)`.
    pub fn get_info(&self, session_id: &SessionId) -> Result<serde_json::Value> {
        let bootstrap_complete = self.store.get_bootstrap_state()?;
        let agent_profile = self.store.get_profile(ProfileType::Agent)?;
        let user_profile = self.store.get_profile(ProfileType::User)?;
        let message_count = self.store.message_count(session_id, self.history_limit)?;

        Ok(serde_json::json!({
            "session_id": session_id.as_str(),
            "bootstrap_complete": bootstrap_complete,
            "agent_profile": agent_profile.into_iter().collect::<std::collections::HashMap<_, _>>(),
            "user_profile": user_profile.into_iter().collect::<std::collections::HashMap<_, _>>(),
            "message_count": message_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EchoProvider;
    use tempfile::TempDir;

    fn runtime(dir: &std::path::Path) -> Runtime {
        let config = AgentConfig::default();
        Runtime::new(dir.to_path_buf(), Box::new(EchoProvider), &config, "mcp").unwrap()
    }

    #[tokio::test]
    async fn chat_round_trip_persists_user_and_assistant_messages() {
        let dir = TempDir::new().unwrap();
        let runtime = runtime(dir.path());
        runtime.initialize().await.unwrap();

        let outcome = runtime.chat("hello there", ChatOptions::default()).await.unwrap();
        assert_eq!(outcome.text, "echo: hello there");

        let history = runtime.store.get_message_history(&outcome.session_id, 20).unwrap();
        assert_eq!(history.len(), 2);
        assert!(matches!(&history[0], ModelMessage::User { text } if text == "hello there"));
        assert!(matches!(&history[1], ModelMessage::Assistant { text } if text == "echo: hello there"));
    }

    #[tokio::test]
    async fn chat_prepends_relevant_memories() {
        let dir = TempDir::new().unwrap();
        let runtime = runtime(dir.path());
        runtime.initialize().await.unwrap();
        runtime
            .store
            .memory_save("the user's favorite color is teal", "durable", None, pith_store::types::MemorySource::UserSaid)
            .unwrap();

        let outcome = runtime.chat("what is my favorite color", ChatOptions::default()).await.unwrap();
        assert!(outcome.text.contains("Relevant memories"));
        assert!(outcome.text.contains("teal"));
    }

    #[tokio::test]
    async fn get_info_reports_profile_and_message_count() {
        let dir = TempDir::new().unwrap();
        let runtime = runtime(dir.path());
        runtime.initialize().await.unwrap();
        let session_id = runtime.store.ensure_active_session().unwrap();
        runtime
            .chat("hi", ChatOptions { session_id: Some(session_id.clone()), ..Default::default() })
            .await
            .unwrap();

        let info = runtime.get_info(&session_id).unwrap();
        assert_eq!(info["message_count"], 2);
        assert_eq!(info["bootstrap_complete"], false);
    }

    #[tokio::test]
    async fn compact_session_reports_no_surplus_when_under_keep() {
        let dir = TempDir::new().unwrap();
        let runtime = runtime(dir.path());
        runtime.initialize().await.unwrap();
        let session_id = runtime.store.ensure_active_session().unwrap();
        runtime
            .chat("hi", ChatOptions { session_id: Some(session_id.clone()), ..Default::default() })
            .await
            .unwrap();

        let result = runtime.compact_session(&session_id, 50).unwrap();
        assert!(result.contains("no surplus"));
    }
}
