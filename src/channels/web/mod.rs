//! HTTP gateway: JSON routes for sessions and tools plus a server-sent
//! event stream of pipeline progress.

pub mod server;
pub mod types;

pub use self::server::{GatewayState, router, start_server};
