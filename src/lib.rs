//! llama-chat: streaming chat endpoint for llama.cpp server
//!
//! Features:
//! - Context-bounded prompt assembly (system instruction + trimmed history)
//! - Pluggable prompt formats (llama2, chatml)
//! - Streaming bridge with ordered lifecycle callbacks
//! - Per-request generation stats logging

pub mod api;
pub mod backend;
pub mod config;
pub mod prompt;
pub mod server;
pub mod stats;

pub use config::AppConfig;
pub use server::run_server;
