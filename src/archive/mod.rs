//! Archive collaborator interface.
//!
//! The archiving engine owns replication, discovery and storage. This module
//! only describes the narrow surface the bot talks to:
//! - `Archive`: add/remove/list/get plus a lifecycle event stream
//! - `Feed`: block availability for one feed
//! - `FeedKey`: the 32-byte public key that names a feed

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

pub mod key;
pub mod memory;

pub use key::{FeedKey, InvalidFeedKey};
pub use memory::{MemoryArchive, MemoryFeed};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("{0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ArchiveError {
    pub fn failed(s: impl Into<String>) -> Self {
        ArchiveError::Failed(s.into())
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        ArchiveError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(e: serde_json::Error) -> Self {
        ArchiveError::Storage(e.to_string())
    }
}

/// An append-only sequence of blocks.
#[async_trait]
pub trait Feed: Send + Sync {
    fn key(&self) -> FeedKey;

    /// Number of blocks known to exist, local or remote.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload size in bytes.
    fn byte_len(&self) -> u64;

    /// Whether block `index` is available locally.
    fn has(&self, index: u64) -> bool;

    /// Resolves once the feed length exceeds `seen`, immediately if it
    /// already does.
    async fn update(&self, seen: u64) -> Result<(), ArchiveError>;
}

/// A metadata feed and its optional content feed.
#[derive(Clone)]
pub struct FeedPair {
    pub feed: Arc<dyn Feed>,
    pub content: Option<Arc<dyn Feed>>,
}

/// Point-in-time view of a feed that finished syncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub key: FeedKey,
    pub byte_len: u64,
    pub content_byte_len: Option<u64>,
}

impl FeedSnapshot {
    pub fn of(pair: &FeedPair) -> Self {
        Self {
            key: pair.feed.key(),
            byte_len: pair.feed.byte_len(),
            content_byte_len: pair.content.as_ref().map(|c| c.byte_len()),
        }
    }

    /// Bytes archived for this feed: the content feed when present.
    pub fn archived_size(&self) -> u64 {
        self.content_byte_len.unwrap_or(self.byte_len)
    }
}

/// Lifecycle events emitted by the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEvent {
    Synced(FeedSnapshot),
    Changes(FeedKey),
    Added(FeedKey),
    Removed(FeedKey),
}

/// The archiving engine as seen by the bot.
#[async_trait]
pub trait Archive: Send + Sync {
    async fn add(&self, key: &FeedKey) -> Result<(), ArchiveError>;

    async fn remove(&self, key: &FeedKey) -> Result<(), ArchiveError>;

    async fn list(&self) -> Result<Vec<FeedKey>, ArchiveError>;

    /// Look up a feed. Unknown keys yield an empty feed and no content.
    async fn get(&self, key: &FeedKey) -> Result<FeedPair, ArchiveError>;

    fn subscribe(&self) -> broadcast::Receiver<ArchiveEvent>;

    /// Engine version string reported by `status`.
    fn version(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archived_size_prefers_content() {
        let key = FeedKey::from_bytes([1; 32]);
        let with_content = FeedSnapshot {
            key,
            byte_len: 10,
            content_byte_len: Some(4096),
        };
        assert_eq!(with_content.archived_size(), 4096);

        let bare = FeedSnapshot {
            key,
            byte_len: 10,
            content_byte_len: None,
        };
        assert_eq!(bare.archived_size(), 10);
    }

    #[test]
    fn test_archive_error_message_is_verbatim() {
        assert_eq!(ArchiveError::failed("disk full").to_string(), "disk full");
    }
}
