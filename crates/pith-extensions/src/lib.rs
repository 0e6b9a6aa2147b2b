pub mod error;
pub mod lua_runtime;
pub mod registry;
pub mod types;

pub use error::{ExtensionError, Result};
pub use lua_runtime::LuaChannelSession;
pub use registry::ExtensionRegistry;
pub use types::{ChannelPlugin, ChannelRecord, ToolPlugin};
