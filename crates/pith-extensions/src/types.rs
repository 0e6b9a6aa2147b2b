use std::path::PathBuf;

/// A locally-defined tool plugin discovered under `extensions/tools/`.
#[derive(Debug, Clone)]
pub struct ToolPlugin {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
    pub source: String,
}

/// A locally-defined channel plugin discovered under `extensions/channels/`.
#[derive(Debug, Clone)]
pub struct ChannelPlugin {
    pub name: String,
    pub path: PathBuf,
    pub source: String,
}

/// A single inbound record returned by a channel plugin's `recv()`.
/// Free-form beyond requiring a `text` field, per §4.2.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChannelRecord {
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
