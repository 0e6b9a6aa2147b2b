use tracing::debug;

/// 3-tier system prompt for providers that support prompt caching, grounded
/// in the source project's `skynet-agent/src/prompt.rs` `SystemPrompt`.
/// Packaging only — both modes in §4.4.2 produce the same text content
/// regardless of how it's split into tiers.
///
/// TIER 1 (static): the fixed guideline block for the current mode — never
/// changes within a process lifetime.
/// TIER 2 (user): identity line + SOUL text + profile dump — changes only on
/// `set_profile`/SOUL edits.
/// TIER 3 (volatile): extra-tools list + channel descriptor — can change
/// every `refresh()`.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    pub static_tier: String,
    pub user_tier: String,
    pub volatile_tier: String,
}

impl SystemPrompt {
    /// Flatten all tiers into one string for providers without cache-control
    /// support.
    pub fn to_plain_text(&self) -> String {
        let mut out = self.static_tier.clone();
        if !self.user_tier.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.user_tier);
        }
        if !self.volatile_tier.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.volatile_tier);
        }
        out
    }

    /// Anthropic-style content blocks with cache breakpoints on the static
    /// and user tiers; the volatile tier is placed last, uncached.
    pub fn to_anthropic_blocks(&self) -> Vec<serde_json::Value> {
        let mut blocks = Vec::with_capacity(3);
        blocks.push(serde_json::json!({
            "type": "text",
            "text": self.static_tier,
            "cache_control": { "type": "ephemeral" }
        }));
        if !self.user_tier.is_empty() {
            blocks.push(serde_json::json!({
                "type": "text",
                "text": self.user_tier,
                "cache_control": { "type": "ephemeral" }
            }));
        }
        if !self.volatile_tier.is_empty() {
            blocks.push(serde_json::json!({
                "type": "text",
                "text": self.volatile_tier,
            }));
        }
        blocks
    }
}

const NORMAL_GUIDELINES: &str = "\
Speak in the first person, as yourself, never as \"the assistant\". Act on the \
user's behalf rather than narrating what you would do. You can extend your own \
capabilities by writing new extension tools into the workspace. Never ask for a \
secret value in chat — route credential requests through `list_secrets` and \
`store_secret` so the value never appears in the conversation.";

const BOOTSTRAP_GUIDELINES: &str = "\
This is a first run. Discover, one question at a time, your own name, your own \
nature (a short description of what kind of agent you are), and the user's \
name. After each answer, call `set_profile` to persist it before asking the \
next question. Once all three are known, call `write` to create `SOUL.md` \
describing the personality you'll embody, then announce that you're ready.";

/// Inputs to system-prompt assembly, per §4.4.2.
pub struct PromptInputs<'a> {
    pub bootstrap: bool,
    pub agent_profile: &'a [(String, String)],
    pub user_profile: &'a [(String, String)],
    pub soul_text: Option<&'a str>,
    pub extension_tool_names: &'a [String],
    pub remote_tools: &'a [(String, String)],
    pub channel: Option<&'a str>,
}

/// Build the system prompt for one turn. Two modes per §4.4.2: bootstrap
/// (before the agent/user identity is known) and normal.
pub fn build_system_prompt(inputs: &PromptInputs<'_>) -> SystemPrompt {
    let static_tier = if inputs.bootstrap {
        BOOTSTRAP_GUIDELINES.to_string()
    } else {
        let agent_name = profile_value(inputs.agent_profile, "name").unwrap_or("the agent");
        let user_name = profile_value(inputs.user_profile, "name").unwrap_or("the user");
        format!(
            "You are {agent_name}, a personal AI agent. Your user is {user_name}.\n\n{NORMAL_GUIDELINES}"
        )
    };

    let mut user_tier = String::new();
    if !inputs.bootstrap {
        if let Some(soul) = inputs.soul_text {
            user_tier.push_str(soul.trim_end());
        }
    }
    let profile_dump = render_profile_dump(inputs.agent_profile, inputs.user_profile);
    if !profile_dump.is_empty() {
        if !user_tier.is_empty() {
            user_tier.push_str("\n\n");
        }
        user_tier.push_str(&profile_dump);
    }

    let mut volatile_tier = String::new();
    if !inputs.extension_tool_names.is_empty() || !inputs.remote_tools.is_empty() {
        volatile_tier.push_str("# Extra tools\n");
        for name in inputs.extension_tool_names {
            volatile_tier.push_str(&format!("- {name}\n"));
        }
        for (name, description) in inputs.remote_tools {
            volatile_tier.push_str(&format!("- {name}: {description}\n"));
        }
    }
    if let Some(channel) = inputs.channel {
        if !volatile_tier.is_empty() {
            volatile_tier.push('\n');
        }
        volatile_tier.push_str("# Channel\n");
        volatile_tier.push_str(channel);
    }

    debug!(bootstrap = inputs.bootstrap, "assembled system prompt");

    SystemPrompt { static_tier, user_tier, volatile_tier: volatile_tier.trim_end().to_string() }
}

fn profile_value<'a>(profile: &'a [(String, String)], key: &str) -> Option<&'a str> {
    profile
        .iter()
        .find(|(k, v)| k == key && !v.trim().is_empty())
        .map(|(_, v)| v.as_str())
}

fn render_profile_dump(agent_profile: &[(String, String)], user_profile: &[(String, String)]) -> String {
    let mut out = String::new();
    if !agent_profile.is_empty() {
        out.push_str("# Agent profile\n");
        for (k, v) in agent_profile {
            out.push_str(&format!("- {k}: {v}\n"));
        }
    }
    if !user_profile.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("# User profile\n");
        for (k, v) in user_profile {
            out.push_str(&format!("- {k}: {v}\n"));
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_mode_uses_onboarding_guidelines() {
        let inputs = PromptInputs {
            bootstrap: true,
            agent_profile: &[],
            user_profile: &[],
            soul_text: None,
            extension_tool_names: &[],
            remote_tools: &[],
            channel: None,
        };
        let prompt = build_system_prompt(&inputs);
        assert!(prompt.static_tier.contains("first run"));
    }

    #[test]
    fn normal_mode_includes_identity_line_and_soul() {
        let agent_profile = vec![("name".to_string(), "pith".to_string())];
        let user_profile = vec![("name".to_string(), "david".to_string())];
        let inputs = PromptInputs {
            bootstrap: false,
            agent_profile: &agent_profile,
            user_profile: &user_profile,
            soul_text: Some("I am curious and terse."),
            extension_tool_names: &[],
            remote_tools: &[],
            channel: None,
        };
        let prompt = build_system_prompt(&inputs);
        assert!(prompt.static_tier.contains("You are pith, a personal AI agent. Your user is david."));
        assert!(prompt.user_tier.contains("I am curious and terse."));
    }

    #[test]
    fn volatile_tier_lists_extra_tools_and_channel() {
        let extension_tools = vec!["weather".to_string()];
        let remote_tools = vec![("mcp_working_ping".to_string(), "pings the server".to_string())];
        let inputs = PromptInputs {
            bootstrap: false,
            agent_profile: &[],
            user_profile: &[],
            soul_text: None,
            extension_tool_names: &extension_tools,
            remote_tools: &remote_tools,
            channel: Some("telegram"),
        };
        let prompt = build_system_prompt(&inputs);
        assert!(prompt.volatile_tier.contains("weather"));
        assert!(prompt.volatile_tier.contains("mcp_working_ping"));
        assert!(prompt.volatile_tier.contains("telegram"));
    }

    #[test]
    fn plain_text_concatenates_tiers_in_order() {
        let prompt = SystemPrompt {
            static_tier: "S".to_string(),
            user_tier: "U".to_string(),
            volatile_tier: "V".to_string(),
        };
        assert_eq!(prompt.to_plain_text(), "S\n\nU\n\nV");
    }
}
