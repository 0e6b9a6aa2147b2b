pub mod env_file;
pub mod error;
pub mod prompt;
pub mod provider;
pub mod runtime;
pub mod secrets;
pub mod stream;
pub mod tools;

pub use error::{Result, RuntimeError};
pub use provider::{ChatRequest, ChatResponse, EchoProvider, LlmProvider, ProviderError};
pub use runtime::{ChatOptions, ChatOutcome, Runtime};
pub use secrets::SecretBroker;
pub use stream::StreamEvent;
