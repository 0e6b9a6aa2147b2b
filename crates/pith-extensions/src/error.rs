use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("I/O error reading extensions: {0}")]
    Io(#[from] std::io::Error),

    #[error("extension '{name}' is missing required entry point: {entry_point}")]
    MissingEntryPoint { name: String, entry_point: String },

    #[error("tool name '{0}' collides with the remote-tool prefix")]
    ReservedPrefix(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("channel plugin error: {0}")]
    Channel(String),
}

pub type Result<T> = std::result::Result<T, ExtensionError>;
