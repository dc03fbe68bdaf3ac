//! Error types for archivebot.

use thiserror::Error;

use crate::archive::{ArchiveError, FeedKey};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Collaborator failures are shown to the chat verbatim.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("TODO: Not implemented in the archiver yet. PR please =).")]
    NotImplemented,

    #[error("usage: {0} <key>")]
    MissingKey(String),

    #[error("content feed for {0} is not available yet, try again later")]
    ContentPending(FeedKey),
}
