//! Keys whose add/remove is in flight.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::archive::FeedKey;

/// Advisory, in-memory set of pending feed keys. Lost on restart.
#[derive(Debug, Default)]
pub struct PendingSet {
    keys: RwLock<HashSet<FeedKey>>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashSet<FeedKey>> {
        self.keys.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<FeedKey>> {
        self.keys.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn mark_pending(&self, key: FeedKey) {
        self.write().insert(key);
    }

    /// Returns true if the key was pending.
    pub fn clear_pending(&self, key: &FeedKey) -> bool {
        self.write().remove(key)
    }

    pub fn is_pending(&self, key: &FeedKey) -> bool {
        self.read().contains(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
