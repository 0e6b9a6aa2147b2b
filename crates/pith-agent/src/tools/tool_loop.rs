//! The tool-call loop, grounded in the source project's
//! `skynet-agent/src/tools/tool_loop.rs` `run_tool_loop`, generalized per
//! §4.4.4.1 to also drive the `on_text`/`on_tool_call`/`on_tool_result`
//! callbacks the chat loop requires. Drives each turn by consuming
//! `LlmProvider::send_stream`'s event stream rather than the non-streaming
//! `send`, per Design Note §9's "event iterator → typed channel" — `for event
//! in stream` is the shape, `futures_util::StreamExt::next` is the Rust of
//! it.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use pith_store::types::ModelMessage;

use crate::provider::{ChatRequest, LlmProvider, ProviderError, ToolCallRequest};
use crate::stream::StreamEvent;

use super::{Tool, ToolResult};

async fn wait_cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(c) => c.cancelled().await,
        None => std::future::pending().await,
    }
}

const MAX_ITERATIONS: usize = 25;

pub struct ToolLoopOutcome {
    pub final_text: String,
    pub new_messages: Vec<ModelMessage>,
    pub stop_reason: String,
}

pub struct ToolLoopCallbacks<'a> {
    pub on_text: Option<&'a (dyn Fn(&str) + Send + Sync)>,
    pub on_tool_call: Option<&'a (dyn Fn(&str, &serde_json::Value) + Send + Sync)>,
    pub on_tool_result: Option<&'a (dyn Fn(&str, bool) + Send + Sync)>,
}

/// Drives model/tool turns until the model stops requesting tools, the
/// iteration cap is hit, or `cancel` fires. Per §5 "Cancellation": a fired
/// token stops the loop from starting any further model call or tool
/// execution, but a tool call already in flight is allowed to finish (its
/// result is still folded into `new_messages`, which the caller may then
/// choose to discard rather than append to the Store).
pub async fn run_tool_loop(
    provider: &dyn LlmProvider,
    mut request: ChatRequest,
    tools: &[Box<dyn Tool>],
    callbacks: &ToolLoopCallbacks<'_>,
    cancel: Option<&CancellationToken>,
) -> Result<ToolLoopOutcome, ProviderError> {
    let mut new_messages = Vec::new();
    let mut final_text = String::new();
    let mut stop_reason = "end_turn".to_string();

    for _ in 0..MAX_ITERATIONS {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            stop_reason = "cancelled".to_string();
            break;
        }

        let mut stream = tokio::select! {
            biased;
            _ = wait_cancelled(cancel) => {
                stop_reason = "cancelled".to_string();
                break;
            }
            result = provider.send_stream(&request) => result?,
        };

        let mut turn_text = String::new();
        let mut turn_tool_calls: Vec<ToolCallRequest> = Vec::new();
        let mut turn_stop_reason = "end_turn".to_string();
        let mut cancelled_mid_stream = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = wait_cancelled(cancel) => {
                    cancelled_mid_stream = true;
                    None
                }
                item = stream.next() => item,
            };
            let Some(event) = next else { break };

            match event {
                StreamEvent::TextDelta { text } => {
                    if let Some(on_text) = callbacks.on_text {
                        on_text(&text);
                    }
                    turn_text.push_str(&text);
                }
                StreamEvent::ToolUse { id, name, args } => {
                    turn_tool_calls.push(ToolCallRequest { id, name, args });
                }
                StreamEvent::ToolResult { .. } => {}
                StreamEvent::Done { stop_reason: sr } => {
                    turn_stop_reason = sr;
                    break;
                }
                StreamEvent::Error { message } => return Err(ProviderError::InvalidResponse(message)),
            }
        }

        if cancelled_mid_stream {
            stop_reason = "cancelled".to_string();
            break;
        }
        stop_reason = turn_stop_reason;

        if !turn_text.is_empty() {
            final_text.push_str(&turn_text);
            let message = ModelMessage::Assistant { text: turn_text };
            new_messages.push(message.clone());
            request.messages.push(message);
        }

        if turn_tool_calls.is_empty() || stop_reason != "tool_use" {
            break;
        }

        if cancel.is_some_and(|c| c.is_cancelled()) {
            stop_reason = "cancelled".to_string();
            break;
        }

        for call in turn_tool_calls {
            if let Some(on_tool_call) = callbacks.on_tool_call {
                on_tool_call(&call.name, &call.args);
            }

            let result = execute_tool(tools, &call.name, call.args.clone()).await;

            if let Some(on_tool_result) = callbacks.on_tool_result {
                on_tool_result(&call.name, !result.is_error);
            }

            let tool_call_message = ModelMessage::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                args: call.args,
            };
            let tool_result_message = ModelMessage::ToolResult {
                id: call.id,
                name: call.name,
                content: result.content,
                is_error: result.is_error,
            };
            new_messages.push(tool_call_message.clone());
            new_messages.push(tool_result_message.clone());
            request.messages.push(tool_call_message);
            request.messages.push(tool_result_message);
        }
    }

    Ok(ToolLoopOutcome { final_text, new_messages, stop_reason })
}

async fn execute_tool(tools: &[Box<dyn Tool>], name: &str, args: serde_json::Value) -> ToolResult {
    match tools.iter().find(|t| t.name() == name) {
        Some(tool) => tool.execute(args).await,
        None => ToolResult::error(format!("unknown tool: {name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::SystemPrompt;
    use crate::provider::{ChatResponse, EchoProvider};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn request(text: &str) -> ChatRequest {
        ChatRequest {
            model: "echo".to_string(),
            system_prompt: SystemPrompt { static_tier: String::new(), user_tier: String::new(), volatile_tier: String::new() },
            messages: vec![ModelMessage::User { text: text.to_string() }],
            tools: Vec::new(),
            max_tokens: 1024,
        }
    }

    struct CountingToolCallProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmProvider for CountingToolCallProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn send(&self, _request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(ChatResponse {
                    content: String::new(),
                    tool_calls: vec![crate::provider::ToolCallRequest {
                        id: "call-1".to_string(),
                        name: "noop".to_string(),
                        args: serde_json::json!({}),
                    }],
                    stop_reason: "tool_use".to_string(),
                    tokens_in: 0,
                    tokens_out: 0,
                })
            } else {
                Ok(ChatResponse {
                    content: "done".to_string(),
                    tool_calls: Vec::new(),
                    stop_reason: "end_turn".to_string(),
                    tokens_in: 0,
                    tokens_out: 0,
                })
            }
        }

        fn token_info(&self) -> crate::provider::TokenInfo {
            crate::provider::TokenInfo {
                token_type: crate::provider::TokenType::None,
                expires_at: None,
                refreshable: false,
            }
        }
    }

    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }
        fn description(&self) -> &str {
            "does nothing"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        async fn execute(&self, _input: serde_json::Value) -> ToolResult {
            ToolResult::success("ok")
        }
    }

    #[tokio::test]
    async fn terminates_immediately_without_tool_use() {
        let provider = EchoProvider;
        let callbacks = ToolLoopCallbacks { on_text: None, on_tool_call: None, on_tool_result: None };
        let outcome = run_tool_loop(&provider, request("hi"), &[], &callbacks, None).await.unwrap();
        assert_eq!(outcome.final_text, "echo: hi");
        assert_eq!(outcome.stop_reason, "end_turn");
        assert_eq!(outcome.new_messages.len(), 1);
    }

    #[tokio::test]
    async fn drives_tool_call_then_resolves() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CountingToolCallProvider { calls: calls.clone() };
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(NoopTool)];
        let tool_call_names = Arc::new(std::sync::Mutex::new(Vec::new()));
        let names_clone = tool_call_names.clone();
        let on_tool_call = move |name: &str, _args: &serde_json::Value| {
            names_clone.lock().unwrap().push(name.to_string());
        };
        let callbacks = ToolLoopCallbacks { on_text: None, on_tool_call: Some(&on_tool_call), on_tool_result: None };
        let outcome = run_tool_loop(&provider, request("hi"), &tools, &callbacks, None).await.unwrap();
        assert_eq!(outcome.final_text, "done");
        assert_eq!(*tool_call_names.lock().unwrap(), vec!["noop".to_string()]);
        assert!(outcome.new_messages.iter().any(|m| matches!(m, ModelMessage::ToolResult { .. })));
    }
}
