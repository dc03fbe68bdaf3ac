//! Telegram bot integration.

pub mod client;
pub mod handler;

pub use client::{connect, serve};
pub use handler::ChatSink;
