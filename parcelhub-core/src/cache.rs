//! Process-local implementation of the carrier cache contract, backed by Moka.

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache;

use crate::ports::CarrierCache;

/// Entries kept before Moka starts evicting the least useful ones.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Lifetimes above this are stored without expiry.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct Slot {
    value: Vec<u8>,
    ttl: Option<Duration>,
}

struct SlotExpiry;

impl Expiry<String, Slot> for SlotExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        slot: &Slot,
        _created_at: Instant,
    ) -> Option<Duration> {
        slot.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        slot.ttl
    }
}

/// In-memory cache for embedders without a platform cache.
///
/// Bounded to a number of entries; each entry may carry its own lifetime.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, Slot>,
}

impl MemoryCache {
    /// Create a cache holding up to [`DEFAULT_MAX_ENTRIES`] entries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache holding up to `max_entries` entries.
    #[must_use]
    pub fn with_capacity(max_entries: u64) -> Self {
        tracing::debug!(max_entries, "building in-memory carrier cache");
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(SlotExpiry)
            .build();
        Self { entries }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    /// Whether no live entry is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MemoryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl CarrierCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|slot| slot.value)
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let ttl = ttl.filter(|ttl| *ttl <= MAX_TTL);
        self.entries.insert(key.to_owned(), Slot { value, ttl });
    }

    fn remove(&self, key: &str) {
        self.entries.invalidate(key);
    }

    fn increment(&self, key: &str) -> u64 {
        let mut next = 0;
        self.entries
            .entry(key.to_owned())
            .and_upsert_with(|current| {
                let current = current
                    .map(|entry| entry.into_value().value)
                    .and_then(|bytes| <[u8; 8]>::try_from(bytes.as_slice()).ok())
                    .map_or(0, u64::from_be_bytes);
                next = current.saturating_add(1);
                Slot {
                    value: next.to_be_bytes().to_vec(),
                    ttl: None,
                }
            });
        next
    }
}
