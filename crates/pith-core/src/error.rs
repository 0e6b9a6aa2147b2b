use thiserror::Error;

/// Startup- and config-scoped errors. Per the error taxonomy, these are the
/// only kinds that are fatal — everything tool-scoped recovers locally instead
/// of bubbling up through this type.
#[derive(Debug, Error)]
pub enum PithError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PithError {
    /// Short error code string, matching the source project's client-facing
    /// `.code()` convention.
    pub fn code(&self) -> &'static str {
        match self {
            PithError::Config(_) => "CONFIG_ERROR",
            PithError::Serialization(_) => "SERIALIZATION_ERROR",
            PithError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PithError>;
