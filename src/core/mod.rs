//! Core module - command parsing, dispatch and status reporting.
//!
//! This module contains the bot's message processing:
//! - Chat command parser
//! - Pending add/remove tracking
//! - Feed and archiver status resolution
//! - Dispatcher and reply formatting

pub mod command;
pub mod dispatcher;
pub mod pending;
pub mod reply;
pub mod status;

pub use command::{parse, Command, Operation};
pub use dispatcher::CommandDispatcher;
pub use pending::PendingSet;
pub use reply::ReplySink;
pub use status::{ArchiverStatus, FeedStatus, StatusResolver};
