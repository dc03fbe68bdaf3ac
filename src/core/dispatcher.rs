//! Command dispatch and archive event handling.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::archive::{Archive, ArchiveEvent, FeedKey, FeedSnapshot};
use crate::config::Settings;
use crate::error::{Error, Result};

use super::command::{parse, Command, Operation};
use super::pending::PendingSet;
use super::reply::{self, ReplySink};
use super::status::{ArchiverStatus, StatusResolver};

/// Process-scoped bot service: applies chat commands to the archive and
/// reports archive lifecycle events back to chat.
pub struct CommandDispatcher {
    archive: Arc<dyn Archive>,
    pending: PendingSet,
    resolver: StatusResolver,
    bot_name: Option<String>,
    started: Instant,
    notifier: RwLock<Option<Arc<dyn ReplySink>>>,
}

impl CommandDispatcher {
    pub fn new(archive: Arc<dyn Archive>, bot_name: Option<String>, resolver: StatusResolver) -> Self {
        Self {
            archive,
            pending: PendingSet::new(),
            resolver,
            bot_name,
            started: Instant::now(),
            notifier: RwLock::new(None),
        }
    }

    pub fn from_settings(archive: Arc<dyn Archive>, settings: &Settings) -> Self {
        Self::new(archive, settings.name.clone(), settings.status_resolver())
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    pub fn bot_name(&self) -> Option<&str> {
        self.bot_name.as_deref()
    }

    /// Route lifecycle notifications to `sink`.
    pub fn attach_notifier(&self, sink: Arc<dyn ReplySink>) {
        *self.notifier.write().unwrap_or_else(|e| e.into_inner()) = Some(sink);
    }

    fn notifier(&self) -> Option<Arc<dyn ReplySink>> {
        self.notifier
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Parse a chat message and reply through `sink`.
    ///
    /// Returns false when the message was not addressed to the bot. The sink
    /// of the last answered command also receives lifecycle notifications.
    pub async fn handle_message(&self, text: &str, sink: Arc<dyn ReplySink>) -> bool {
        let Some(op) = parse(text, self.bot_name()) else {
            return false;
        };

        if let Some(result) = self.dispatch(&op).await {
            self.attach_notifier(sink.clone());
            if let Err(e) = &result {
                tracing::warn!("Command {} failed: {}", op.command, e);
            }
            sink.send(reply::format(&result)).await;
        }
        true
    }

    /// Apply an operation. `None` means the command is not ours and gets no
    /// reply.
    pub async fn dispatch(&self, op: &Operation) -> Option<Result<String>> {
        tracing::debug!("Dispatching {} {:?}", op.command, op.key);

        let result = match &op.command {
            Command::Track => Err(Error::NotImplemented),
            Command::Add => match &op.key {
                Some(key) => self.add(key).await,
                None => Err(Error::MissingKey(op.command.to_string())),
            },
            Command::Remove => match &op.key {
                Some(key) => self.remove(key).await,
                None => Err(Error::MissingKey(op.command.to_string())),
            },
            Command::Status => match &op.key {
                Some(key) => self.feed_status(key).await,
                None => self.archiver_status().await,
            },
            Command::Other(word) => {
                tracing::debug!("Ignoring unknown command '{}'", word);
                return None;
            }
        };
        Some(result)
    }

    async fn add(&self, key: &FeedKey) -> Result<String> {
        self.pending.mark_pending(*key);
        self.archive.add(key).await?;
        Ok(format!("Adding {}", key))
    }

    async fn remove(&self, key: &FeedKey) -> Result<String> {
        self.pending.clear_pending(key);
        self.archive.remove(key).await?;
        Ok(format!("Removing {}", key))
    }

    async fn feed_status(&self, key: &FeedKey) -> Result<String> {
        let status = self.resolver.resolve(self.archive.as_ref(), key).await?;
        Ok(status.to_string())
    }

    async fn archiver_status(&self) -> Result<String> {
        let status = ArchiverStatus::query(self.archive.as_ref(), self.started).await?;
        Ok(status.to_string())
    }

    /// React to one archive lifecycle event.
    pub async fn handle_event(&self, event: ArchiveEvent) {
        match event {
            ArchiveEvent::Synced(snapshot) => self.archive_synced(snapshot).await,
            ArchiveEvent::Changes(key) => tracing::info!("Changes feed available at {}", key),
            ArchiveEvent::Added(key) => tracing::info!("Adding {}", key),
            ArchiveEvent::Removed(key) => tracing::info!("Removing {}", key),
        }
    }

    async fn archive_synced(&self, snapshot: FeedSnapshot) {
        self.pending.clear_pending(&snapshot.key);
        tracing::info!("Feed archived {}", snapshot.key);

        if let Some(sink) = self.notifier() {
            let size = bytesize::ByteSize(snapshot.archived_size());
            sink.send(format!("{} has been fully archived ({})", snapshot.key, size))
                .await;
        }
    }

    /// Consume archive events until the archive goes away.
    ///
    /// Subscribes before returning, so events emitted after this call are
    /// never missed.
    pub fn spawn_event_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = BroadcastStream::new(self.archive.subscribe());
        let this = Arc::clone(self);

        tokio::spawn(async move {
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => this.handle_event(event).await,
                    Err(BroadcastStreamRecvError::Lagged(n)) => {
                        tracing::warn!("Archive event loop lagged, {} events dropped", n);
                    }
                }
            }
            tracing::debug!("Archive event stream closed");
        })
    }
}
