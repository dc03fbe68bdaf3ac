//! archivebot library root.

pub mod archive;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod telegram;

pub use archive::{Archive, ArchiveEvent, Feed, FeedKey, MemoryArchive};
pub use cli::Args;
pub use config::{load_settings, Settings};
pub use crate::core::{parse, CommandDispatcher, FeedStatus, Operation, PendingSet, ReplySink};
pub use error::{Error, Result};
