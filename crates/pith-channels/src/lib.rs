pub mod channel;
pub mod error;
pub mod extension_loop;
pub mod manager;
pub mod run_loop;
pub mod types;

pub use channel::Channel;
pub use error::ChannelError;
pub use extension_loop::run_extension_channel_loop;
pub use manager::ChannelManager;
pub use run_loop::{run_channel_loop, InboundText};
pub use types::{ChannelStatus, InboundMessage, MessageFormat, OutboundMessage};
