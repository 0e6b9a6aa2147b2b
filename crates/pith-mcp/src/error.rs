use thiserror::Error;

/// Per §7.1: discovery failures are logged and swallowed by the caller;
/// call failures are formatted as `"<ErrorKind>: <message>"` tool-result text.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("config error: {0}")]
    Config(String),

    #[error("unknown server: {0}")]
    UnknownServer(String),
}

impl McpError {
    /// `"<ErrorKind>: <message>"` per §7's remote-tool-call-failure policy.
    pub fn as_tool_result(&self) -> String {
        let kind = match self {
            McpError::Transport(_) => "Transport",
            McpError::Rpc { .. } => "Rpc",
            McpError::Timeout => "Timeout",
            McpError::Config(_) => "Config",
            McpError::UnknownServer(_) => "UnknownServer",
        };
        format!("{kind}: {self}")
    }
}

pub type Result<T> = std::result::Result<T, McpError>;
