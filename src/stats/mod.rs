//! Per-request stats collection and formatting

mod collector;
mod formatter;
mod request_log;

pub use collector::*;
pub use formatter::*;
pub use request_log::*;
