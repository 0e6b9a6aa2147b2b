use thiserror::Error;

/// Startup/runtime-fatal errors — anything else becomes a tool-result error
/// string instead of propagating, per §7's "local recovery for anything
/// tool-scoped" policy.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] pith_store::StoreError),

    #[error(transparent)]
    Provider(#[from] crate::provider::ProviderError),

    #[error(transparent)]
    Extension(#[from] pith_extensions::ExtensionError),

    #[error(transparent)]
    Mcp(#[from] pith_mcp::McpError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
