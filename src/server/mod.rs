//! HTTP chat server

mod handler;
pub mod server;
pub mod streaming;

pub use handler::{chat_handler, ChatError};
pub use server::{app, run_server, AppState};
pub use streaming::{bridge_generation, BridgeError, StreamCallbacks};
