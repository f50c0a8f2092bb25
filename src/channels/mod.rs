//! Front-end adapters that drive pipeline sessions.
//!
//! - [`ReplChannel`]: terminal line editor, one local session
//! - [`web`]: HTTP gateway with per-session routes and an SSE event stream

pub mod repl;
pub mod web;

pub use self::repl::ReplChannel;
pub use self::web::{GatewayState, start_server};
