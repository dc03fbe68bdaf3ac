//! Archival progress for feeds and for the archiver as a whole.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::archive::{Archive, Feed, FeedKey, FeedPair};
use crate::core::reply::format_duration;
use crate::error::{Error, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Block counts for a feed and its content feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedStatus {
    pub key: FeedKey,
    pub need: u64,
    pub have: u64,
}

impl FeedStatus {
    /// Percentage of blocks present. Zero when nothing is known.
    pub fn progress(&self) -> f64 {
        if self.need == 0 {
            return 0.0;
        }
        self.have as f64 / self.need as f64 * 100.0
    }
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status {}: {:.2}% archived ({} of {} blocks)",
            self.key,
            self.progress(),
            self.have,
            self.need
        )
    }
}

/// Whole-archiver summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiverStatus {
    pub feed_count: usize,
    pub uptime: Duration,
    pub bot_version: String,
    pub archiver_version: String,
}

impl ArchiverStatus {
    pub async fn query(archive: &dyn Archive, started: Instant) -> Result<Self> {
        let keys = archive.list().await?;
        Ok(Self {
            feed_count: keys.len(),
            uptime: started.elapsed(),
            bot_version: env!("CARGO_PKG_VERSION").to_string(),
            archiver_version: archive.version(),
        })
    }
}

impl fmt::Display for ArchiverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Archiving {} feeds. Uptime: {}. bot version: {}, archiver version: {}.",
            self.feed_count,
            format_duration(self.uptime),
            self.bot_version,
            self.archiver_version
        )
    }
}

/// Blocks in `0..feed.len()` that are not available locally.
fn blocks_remaining(feed: &dyn Feed) -> u64 {
    (0..feed.len()).filter(|i| !feed.has(*i)).count() as u64
}

/// Computes `FeedStatus`, waiting for a content feed that has not been
/// discovered yet.
#[derive(Debug, Clone)]
pub struct StatusResolver {
    max_attempts: u32,
    update_timeout: Duration,
}

impl Default for StatusResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_UPDATE_TIMEOUT)
    }
}

impl StatusResolver {
    pub fn new(max_attempts: u32, update_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            update_timeout,
        }
    }

    /// Resolve the status of `key`.
    ///
    /// While the content feed is still empty behind a populated metadata
    /// feed, waits for it to grow and looks the feed up again, at most
    /// `max_attempts` times.
    pub async fn resolve(&self, archive: &dyn Archive, key: &FeedKey) -> Result<FeedStatus> {
        let mut waits = 0;
        loop {
            let pair = archive.get(key).await?;

            let Some(content) = pending_content(&pair) else {
                return Ok(feed_status(key, &pair));
            };

            if waits == self.max_attempts {
                return Err(Error::ContentPending(*key));
            }
            waits += 1;

            tracing::debug!(
                "Waiting for content of {} (attempt {}/{})",
                key,
                waits,
                self.max_attempts
            );
            let seen = content.len();
            match tokio::time::timeout(self.update_timeout, content.update(seen)).await {
                Ok(result) => result?,
                Err(_) => tracing::debug!("Content update for {} timed out", key),
            }
        }
    }
}

/// The content feed, if it has not been synced from peers yet.
fn pending_content(pair: &FeedPair) -> Option<&Arc<dyn Feed>> {
    pair.content
        .as_ref()
        .filter(|content| content.is_empty() && pair.feed.len() > 1)
}

fn feed_status(key: &FeedKey, pair: &FeedPair) -> FeedStatus {
    let content_len = pair.content.as_ref().map_or(0, |c| c.len());
    let need = pair.feed.len() + content_len;
    let missing = blocks_remaining(&*pair.feed)
        + pair.content.as_deref().map_or(0, |c| blocks_remaining(c));

    FeedStatus {
        key: *key,
        need,
        have: need.saturating_sub(missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;

    fn key(n: u8) -> FeedKey {
        FeedKey::from_bytes([n; 32])
    }

    #[test]
    fn test_progress_formatting() {
        let status = FeedStatus {
            key: key(1),
            need: 10,
            have: 5,
        };
        assert_eq!(format!("{:.2}", status.progress()), "50.00");

        let empty = FeedStatus {
            key: key(1),
            need: 0,
            have: 0,
        };
        assert_eq!(format!("{:.2}", empty.progress()), "0.00");
        assert!(empty.to_string().contains("0.00% archived (0 of 0 blocks)"));
    }

    #[tokio::test]
    async fn test_unknown_feed_is_empty() {
        let archive = MemoryArchive::in_memory();
        let status = StatusResolver::default()
            .resolve(&archive, &key(1))
            .await
            .unwrap();
        assert_eq!(status.need, 0);
        assert_eq!(status.have, 0);
    }

    #[tokio::test]
    async fn test_counts_feed_and_content() {
        let archive = MemoryArchive::in_memory();
        archive.add(&key(1)).await.unwrap();

        let feed = archive.feed(&key(1)).unwrap();
        feed.extend(2, 10);
        feed.download(0);
        let content = archive.attach_content(&key(1), key(2)).unwrap();
        content.extend(2, 100);
        content.download(1);
        content.download(0);

        let status = StatusResolver::default()
            .resolve(&archive, &key(1))
            .await
            .unwrap();
        assert_eq!(status.need, 4);
        assert_eq!(status.have, 3);
        assert!(status.have <= status.need);
    }

    #[tokio::test]
    async fn test_waits_for_content_then_resolves() {
        let archive = Arc::new(MemoryArchive::in_memory());
        archive.add(&key(1)).await.unwrap();
        let feed = archive.feed(&key(1)).unwrap();
        feed.extend(3, 10);
        let content = archive.attach_content(&key(1), key(2)).unwrap();

        let grower = {
            let content = content.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                content.extend(5, 10);
            })
        };

        let resolver = StatusResolver::new(3, Duration::from_secs(5));
        let status = resolver.resolve(archive.as_ref(), &key(1)).await.unwrap();
        grower.await.unwrap();

        assert_eq!(status.need, 8);
        assert_eq!(status.have, 0);
    }

    #[tokio::test]
    async fn test_single_attempt_rechecks_after_wait() {
        let archive = MemoryArchive::in_memory();
        archive.add(&key(1)).await.unwrap();
        archive.feed(&key(1)).unwrap().extend(3, 10);
        let content = archive.attach_content(&key(1), key(2)).unwrap();

        let grower = {
            let content = content.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                content.extend(5, 10);
            })
        };

        let resolver = StatusResolver::new(1, Duration::from_secs(5));
        let status = resolver.resolve(&archive, &key(1)).await.unwrap();
        grower.await.unwrap();

        assert_eq!(status.need, 8);
        assert_eq!(status.have, 0);
    }

    #[tokio::test]
    async fn test_content_grown_before_wait_is_not_missed() {
        let archive = MemoryArchive::in_memory();
        archive.add(&key(1)).await.unwrap();
        archive.feed(&key(1)).unwrap().extend(3, 10);
        let content = archive.attach_content(&key(1), key(2)).unwrap();

        // Growth after the lookup but before the wait starts.
        content.extend(2, 10);
        let waited = tokio::time::timeout(Duration::from_secs(1), content.update(0)).await;
        assert!(matches!(waited, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        let archive = MemoryArchive::in_memory();
        archive.add(&key(1)).await.unwrap();
        archive.feed(&key(1)).unwrap().extend(2, 10);
        archive.attach_content(&key(1), key(2)).unwrap();

        let resolver = StatusResolver::new(2, Duration::from_millis(5));
        let err = resolver.resolve(&archive, &key(1)).await.unwrap_err();
        assert!(matches!(err, Error::ContentPending(k) if k == key(1)));
    }

    #[tokio::test]
    async fn test_archiver_status_line() {
        let archive = MemoryArchive::in_memory();
        archive.add(&key(1)).await.unwrap();
        archive.add(&key(2)).await.unwrap();

        let status = ArchiverStatus::query(&archive, Instant::now()).await.unwrap();
        assert_eq!(status.feed_count, 2);

        let line = status.to_string();
        assert!(line.starts_with("Archiving 2 feeds. Uptime: "));
        assert!(line.contains(&format!("bot version: {}", env!("CARGO_PKG_VERSION"))));
        assert!(line.contains("archiver version: memory-archive"));
    }
}
