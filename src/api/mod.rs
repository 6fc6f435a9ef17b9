//! Inbound wire types

mod chat;

pub use chat::*;
