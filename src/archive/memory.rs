//! In-process archive engine.
//!
//! Tracks the set of archived keys and per-feed block availability without
//! replicating anything. The binary runs against it until a real engine is
//! plugged in behind the `Archive` trait; the tests drive it directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use super::{Archive, ArchiveError, ArchiveEvent, Feed, FeedKey, FeedPair, FeedSnapshot};

/// File holding the tracked key list inside the storage directory.
pub const STORE_FILE: &str = "feeds.json";

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct FeedState {
    present: Vec<bool>,
    block_sizes: Vec<u64>,
}

/// A feed whose blocks are tracked in memory.
pub struct MemoryFeed {
    key: FeedKey,
    state: RwLock<FeedState>,
    length: watch::Sender<u64>,
}

impl MemoryFeed {
    pub fn new(key: FeedKey) -> Self {
        let (length, _) = watch::channel(0);
        Self {
            key,
            state: RwLock::new(FeedState::default()),
            length,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FeedState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FeedState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Learn about `count` remote blocks of `block_size` bytes that are not
    /// downloaded yet.
    pub fn extend(&self, count: u64, block_size: u64) {
        let len = {
            let mut state = self.write();
            for _ in 0..count {
                state.present.push(false);
                state.block_sizes.push(block_size);
            }
            state.present.len() as u64
        };
        self.length.send_replace(len);
    }

    /// Append a locally written block.
    pub fn append(&self, block_size: u64) {
        let len = {
            let mut state = self.write();
            state.present.push(true);
            state.block_sizes.push(block_size);
            state.present.len() as u64
        };
        self.length.send_replace(len);
    }

    /// Mark block `index` as downloaded. Returns false if it is out of range.
    pub fn download(&self, index: u64) -> bool {
        let mut state = self.write();
        match state.present.get_mut(index as usize) {
            Some(slot) => {
                *slot = true;
                true
            }
            None => false,
        }
    }

    /// Whether every known block is present locally.
    pub fn is_complete(&self) -> bool {
        self.read().present.iter().all(|p| *p)
    }
}

#[async_trait]
impl Feed for MemoryFeed {
    fn key(&self) -> FeedKey {
        self.key
    }

    fn len(&self) -> u64 {
        self.read().present.len() as u64
    }

    fn byte_len(&self) -> u64 {
        self.read().block_sizes.iter().sum()
    }

    fn has(&self, index: u64) -> bool {
        self.read()
            .present
            .get(index as usize)
            .copied()
            .unwrap_or(false)
    }

    async fn update(&self, seen: u64) -> Result<(), ArchiveError> {
        let mut rx = self.length.subscribe();
        rx.wait_for(|len| *len > seen)
            .await
            .map(|_| ())
            .map_err(|_| ArchiveError::failed(format!("feed {} closed", self.key)))
    }
}

struct Tracked {
    feed: Arc<MemoryFeed>,
    content: Option<Arc<MemoryFeed>>,
}

impl Tracked {
    fn new(key: FeedKey) -> Self {
        Self {
            feed: Arc::new(MemoryFeed::new(key)),
            content: None,
        }
    }

    fn pair(&self) -> FeedPair {
        FeedPair {
            feed: self.feed.clone(),
            content: self.content.clone().map(|c| c as Arc<dyn Feed>),
        }
    }
}

/// On-disk form of the tracked key list.
#[derive(Serialize, Deserialize, Debug, Default)]
struct StoreFile {
    changes: Option<FeedKey>,
    #[serde(default)]
    feeds: Vec<FeedKey>,
}

/// Archive engine that keeps feed state in memory.
pub struct MemoryArchive {
    feeds: RwLock<BTreeMap<FeedKey, Tracked>>,
    store: Option<PathBuf>,
    changes: FeedKey,
    events: broadcast::Sender<ArchiveEvent>,
}

impl MemoryArchive {
    /// Archive with no backing file.
    pub fn in_memory() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            feeds: RwLock::new(BTreeMap::new()),
            store: None,
            changes: generate_key(),
            events,
        }
    }

    /// Open (or create) an archive whose key list lives in `dir`.
    pub fn open(dir: &Path) -> Result<Self, ArchiveError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE);

        let stored: StoreFile = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            StoreFile::default()
        };

        let feeds = stored
            .feeds
            .iter()
            .map(|key| (*key, Tracked::new(*key)))
            .collect::<BTreeMap<_, _>>();

        tracing::debug!("Loaded {} feeds from {}", feeds.len(), path.display());

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let archive = Self {
            feeds: RwLock::new(feeds),
            store: Some(path),
            changes: stored.changes.unwrap_or_else(generate_key),
            events,
        };
        archive.persist()?;
        Ok(archive)
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<FeedKey, Tracked>> {
        self.feeds.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<FeedKey, Tracked>> {
        self.feeds.write().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self) -> Result<(), ArchiveError> {
        let Some(path) = &self.store else {
            return Ok(());
        };

        let stored = StoreFile {
            changes: Some(self.changes),
            feeds: self.read().keys().copied().collect(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }

    fn emit(&self, event: ArchiveEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Key of the feed that records archive changes.
    pub fn changes_key(&self) -> FeedKey {
        self.changes
    }

    /// Announce the changes feed to current subscribers.
    pub fn announce_changes(&self) {
        self.emit(ArchiveEvent::Changes(self.changes));
    }

    /// Metadata feed for a tracked key.
    pub fn feed(&self, key: &FeedKey) -> Option<Arc<MemoryFeed>> {
        self.read().get(key).map(|t| t.feed.clone())
    }

    /// Register the content feed of a tracked key. Returns the existing one
    /// if already attached, `None` if the key is not tracked.
    pub fn attach_content(&self, key: &FeedKey, content_key: FeedKey) -> Option<Arc<MemoryFeed>> {
        let mut feeds = self.write();
        let tracked = feeds.get_mut(key)?;
        let content = tracked
            .content
            .get_or_insert_with(|| Arc::new(MemoryFeed::new(content_key)));
        Some(content.clone())
    }

    /// Emit `Synced` if the feed and its content are fully downloaded.
    pub fn notify_if_synced(&self, key: &FeedKey) -> bool {
        let snapshot = {
            let feeds = self.read();
            let Some(tracked) = feeds.get(key) else {
                return false;
            };
            let content_done = tracked.content.as_ref().map_or(true, |c| c.is_complete());
            if tracked.feed.is_empty() || !tracked.feed.is_complete() || !content_done {
                return false;
            }
            FeedSnapshot::of(&tracked.pair())
        };

        self.emit(ArchiveEvent::Synced(snapshot));
        true
    }
}

#[async_trait]
impl Archive for MemoryArchive {
    async fn add(&self, key: &FeedKey) -> Result<(), ArchiveError> {
        let inserted = {
            let mut feeds = self.write();
            if feeds.contains_key(key) {
                false
            } else {
                feeds.insert(*key, Tracked::new(*key));
                true
            }
        };

        if inserted {
            self.persist()?;
            self.emit(ArchiveEvent::Added(*key));
        }
        Ok(())
    }

    async fn remove(&self, key: &FeedKey) -> Result<(), ArchiveError> {
        let removed = self.write().remove(key).is_some();
        if removed {
            self.persist()?;
            self.emit(ArchiveEvent::Removed(*key));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<FeedKey>, ArchiveError> {
        Ok(self.read().keys().copied().collect())
    }

    async fn get(&self, key: &FeedKey) -> Result<FeedPair, ArchiveError> {
        Ok(self
            .read()
            .get(key)
            .map(Tracked::pair)
            .unwrap_or_else(|| FeedPair {
                feed: Arc::new(MemoryFeed::new(*key)),
                content: None,
            }))
    }

    fn subscribe(&self) -> broadcast::Receiver<ArchiveEvent> {
        self.events.subscribe()
    }

    fn version(&self) -> String {
        format!("memory-archive {}", env!("CARGO_PKG_VERSION"))
    }
}

fn generate_key() -> FeedKey {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(&ulid::Ulid::new().to_bytes());
    bytes[16..].copy_from_slice(&ulid::Ulid::new().to_bytes());
    FeedKey::from_bytes(bytes)
}
