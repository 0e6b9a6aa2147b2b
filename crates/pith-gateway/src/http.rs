pub mod chat;
pub mod health;
pub mod secret;
pub mod session;
