use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use leasehold_state::error::StoreError;
use leasehold_state::store::LeaseStore;

/// Internal entry representing a stored value with its expiry.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_owned(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug)]
struct BackendInner {
    entries: DashMap<String, Entry>,
    online: AtomicBool,
}

/// Shared data behind every [`MemoryStore`] handle.
///
/// Cloning yields another reference to the same data, the way two network
/// connections reach the same server.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    inner: Arc<BackendInner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BackendInner {
                entries: DashMap::new(),
                online: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate the server going away (`false`) or coming back (`true`).
    /// While offline every handle call fails with a connection error.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Open a new handle onto this backend.
    pub fn handle(&self) -> MemoryStore {
        MemoryStore {
            backend: self.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// Remaining time to live for `key`, if present and unexpired.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.inner
            .entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.expires_at.saturating_duration_since(Instant::now()))
    }

    fn entries(&self) -> &DashMap<String, Entry> {
        &self.inner.entries
    }
}

/// In-memory [`LeaseStore`] handle.
///
/// Expiry is lazy: an expired entry is treated as absent and evicted the next
/// time a write touches it.
#[derive(Debug)]
pub struct MemoryStore {
    backend: MemoryBackend,
    closed: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryBackend::new().handle()
    }
}

impl MemoryStore {
    /// Create a handle onto a fresh, private backend.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        if !self.backend.is_online() {
            return Err(StoreError::Connection("memory backend offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let entries = self.backend.entries();

        // Remove expired entries lazily.
        entries.remove_if(key, |_, entry| entry.is_expired());

        match entries.entry(key.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Entry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.check()?;
        let removed = self
            .backend
            .entries()
            .remove_if(key, |_, entry| !entry.is_expired() && entry.value == expected);
        Ok(removed.is_some())
    }

    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let Some(mut entry) = self.backend.entries().get_mut(key) else {
            return Ok(false);
        };
        if entry.is_expired() || entry.value != expected {
            return Ok(false);
        }
        entry.expires_at = Instant::now() + ttl;
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self
            .backend
            .entries()
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.backend
            .entries()
            .insert(key.to_owned(), Entry::new(value, ttl));
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
