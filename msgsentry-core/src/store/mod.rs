//! Bounded time-keyed stores
//!
//! The detection core keeps three pieces of shared state, each behind its
//! own mutex so no operation ever needs two of these locks at once:
//!
//! - [`FlaggedStore`]: flagged messages awaiting marker placement
//!   (100 entries, 24 hour expiry)
//! - [`ProcessedLedger`]: de-duplication record of every text that has
//!   completed a classification attempt, flagged or not (500 entries,
//!   7 day expiry, keyed by a hash of the text to bound memory)
//! - [`DismissalSet`]: message keys the user dismissed for this viewing
//!   session (no expiry, cleared on context change)
//!
//! All state is in-memory and process-lifetime only; persistence across
//! restarts is an accepted non-goal.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::types::{ClassificationVerdict, FlaggedEntry};

/// Acquire a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Timestamped<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// Generic synchronized map with max-entry-count eviction and age expiry.
///
/// `put` first drops expired entries, then if the store is full evicts the
/// single entry with the smallest stored timestamp, then inserts (or
/// overwrites, refreshing the timestamp). `get`/`contains` never return
/// entries older than the configured max age.
pub struct TimedStore<K, V> {
    entries: Mutex<HashMap<K, Timestamped<V>>>,
    capacity: usize,
    max_age: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TimedStore<K, V> {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            max_age,
        }
    }

    pub fn put(&self, key: K, value: V, now: DateTime<Utc>) {
        let mut entries = lock_or_recover(&self.entries);
        Self::drop_expired(&mut entries, now, self.max_age);

        if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(key, Timestamped { value, stored_at: now });
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_with_time(key).map(|(value, _)| value)
    }

    pub fn get_with_time(&self, key: &K) -> Option<(V, DateTime<Utc>)> {
        let entries = lock_or_recover(&self.entries);
        let now = Utc::now();
        entries.get(key).and_then(|entry| {
            if now - entry.stored_at > self.max_age {
                None
            } else {
                Some((entry.value.clone(), entry.stored_at))
            }
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get_with_time(key).is_some()
    }

    /// Drop every entry older than the configured max age.
    pub fn remove_expired(&self, now: DateTime<Utc>) {
        let mut entries = lock_or_recover(&self.entries);
        Self::drop_expired(&mut entries, now, self.max_age);
    }

    pub fn clear(&self) {
        lock_or_recover(&self.entries).clear();
    }

    pub fn keys(&self) -> Vec<K> {
        lock_or_recover(&self.entries).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drop_expired(
        entries: &mut HashMap<K, Timestamped<V>>,
        now: DateTime<Utc>,
        max_age: Duration,
    ) {
        entries.retain(|_, entry| now - entry.stored_at <= max_age);
    }
}

// ============================================
// Flagged-message store
// ============================================

/// Store of flagged messages, keyed by raw message text.
pub struct FlaggedStore {
    store: TimedStore<String, ClassificationVerdict>,
}

impl FlaggedStore {
    pub const CAPACITY: usize = 100;

    pub fn new() -> Self {
        Self::with_limits(Self::CAPACITY, Duration::hours(24))
    }

    pub fn with_limits(capacity: usize, max_age: Duration) -> Self {
        Self {
            store: TimedStore::new(capacity, max_age),
        }
    }

    /// Insert or overwrite a flagged message, refreshing its timestamp.
    pub fn insert(&self, key: &str, verdict: ClassificationVerdict, now: DateTime<Utc>) {
        self.store.put(key.to_string(), verdict, now);
    }

    pub fn entry(&self, key: &str) -> Option<FlaggedEntry> {
        self.store
            .get_with_time(&key.to_string())
            .map(|(verdict, created_at)| FlaggedEntry {
                key: key.to_string(),
                verdict,
                created_at,
            })
    }

    pub fn is_flagged(&self, key: &str) -> bool {
        self.store.contains(&key.to_string())
    }

    /// All flagged message texts currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    pub fn remove_expired(&self, now: DateTime<Utc>) {
        self.store.remove_expired(now);
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for FlaggedStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// Processed-message ledger
// ============================================

/// De-duplication ledger of texts that completed a classification attempt.
///
/// Keys are the first 8 bytes of the SHA-256 of the text, not the text
/// itself, so the ledger can track many more messages than the flagged
/// store without holding their content.
pub struct ProcessedLedger {
    store: TimedStore<u64, ()>,
}

impl ProcessedLedger {
    pub const CAPACITY: usize = 500;

    pub fn new() -> Self {
        Self::with_limits(Self::CAPACITY, Duration::days(7))
    }

    pub fn with_limits(capacity: usize, max_age: Duration) -> Self {
        Self {
            store: TimedStore::new(capacity, max_age),
        }
    }

    pub fn mark(&self, text: &str, now: DateTime<Utc>) {
        self.store.put(key_hash(text), (), now);
    }

    pub fn contains(&self, text: &str) -> bool {
        self.store.contains(&key_hash(text))
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for ProcessedLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn key_hash(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

// ============================================
// Dismissal set
// ============================================

/// Message keys the user dismissed for the current viewing session.
///
/// Deliberately session-scoped: dismissal applies to "this chat, this
/// session" and is cleared whenever the observation context changes.
pub struct DismissalSet {
    inner: Mutex<HashSet<String>>,
}

impl DismissalSet {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashSet::new()),
        }
    }

    pub fn dismiss(&self, key: &str) {
        lock_or_recover(&self.inner).insert(key.to_string());
    }

    pub fn is_dismissed(&self, key: &str) -> bool {
        lock_or_recover(&self.inner).contains(key)
    }

    pub fn clear(&self) {
        lock_or_recover(&self.inner).clear();
    }

    pub fn count(&self) -> usize {
        lock_or_recover(&self.inner).len()
    }
}

impl Default for DismissalSet {
    fn default() -> Self {
        Self::new()
    }
}
