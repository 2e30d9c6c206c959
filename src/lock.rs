//! Dedup lock store used for repeat-timeout suppression.
//!
//! The engine only needs "claim this key for a while" semantics. Any
//! key-value cache with expiry can provide them through [`LockStore`];
//! [`MemoryLockStore`] is the in-process implementation.
//!
//! # Architecture
//!
//! `MemoryLockStore` uses:
//! - **moka sync cache**: thread-safe, bounded, with per-entry expiry
//! - **entry API**: claiming a key is a single atomic insert-if-absent
//!
//! # Example
//!
//! ```
//! use noticer::lock::{LockStore, MemoryLockStore};
//! use std::time::Duration;
//!
//! let store = MemoryLockStore::new();
//! assert!(store.try_acquire("notice-mail-abc", Duration::from_secs(60)));
//! assert!(!store.try_acquire("notice-mail-abc", Duration::from_secs(60)));
//! ```

use moka::Expiry;
use moka::sync::Cache;
use std::time::{Duration, Instant};

/// Default maximum number of held locks, bounds memory under key churn.
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Value written when claiming a lock through [`LockStore::try_acquire`].
const LOCK_VALUE: &str = "1";

/// Get/set-with-expiry contract over an external cache.
///
/// Implementations must be `Send + Sync`: one store is shared by every
/// notice built from the same registry.
pub trait LockStore: Send + Sync {
    /// Current value for `key`, `None` when absent or expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: &str, ttl: Duration);

    /// Claim `key` for `ttl` if nobody holds it.
    ///
    /// Returns `true` when this call took the lock, `false` when it was
    /// already held. The default is check-then-set and is only as atomic as
    /// the caller's concurrency domain; stores with a native set-if-absent
    /// should override it.
    fn try_acquire(&self, key: &str, ttl: Duration) -> bool {
        if self.get(key).is_some() {
            return false;
        }
        self.set(key, LOCK_VALUE, ttl);
        true
    }
}

#[derive(Debug, Clone)]
struct LockEntry {
    value: String,
    ttl: Duration,
}

/// Expiry policy reading the TTL stored alongside each entry.
struct PerEntryTtl;

impl Expiry<String, LockEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &LockEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &LockEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process lock store on a moka cache.
///
/// Moka handles expiration: once an entry's TTL is over it is no longer
/// visible and the next claim for that key succeeds.
pub struct MemoryLockStore {
    cache: Cache<String, LockEntry>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    /// Create a store holding at most `max_capacity` locks.
    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache }
    }

    /// Number of live locks (approximate until pending tasks run).
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush moka's pending maintenance (evictions, expirations).
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    /// Drop every held lock.
    pub fn clear(&self) {
        let entry_count = self.cache.entry_count();
        self.cache.invalidate_all();
        tracing::debug!(entries_cleared = entry_count, "Lock store cleared");
    }
}

impl Default for MemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LockStore for MemoryLockStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).map(|entry| entry.value)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.cache.insert(
            key.to_string(),
            LockEntry {
                value: value.to_string(),
                ttl,
            },
        );
    }

    fn try_acquire(&self, key: &str, ttl: Duration) -> bool {
        let entry = self
            .cache
            .entry(key.to_string())
            .or_insert_with(|| LockEntry {
                value: LOCK_VALUE.to_string(),
                ttl,
            });
        let acquired = entry.is_fresh();
        tracing::trace!(lock_key = %key, acquired, ttl_secs = ttl.as_secs_f64(), "Lock claim");
        acquired
    }
}

impl std::fmt::Debug for MemoryLockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLockStore")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}
