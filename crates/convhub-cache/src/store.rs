//! In-memory conversion result cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use convhub_core::config::CacheConfig;
use convhub_core::traits::Clock;
use convhub_core::{AppError, AppResult};

use crate::fingerprint::{Fingerprint, content_hash};

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of live entries.
    pub entry_count: usize,
    /// Sum of payload sizes.
    pub total_size_bytes: u64,
    /// Sum of payload sizes in megabytes.
    pub total_size_mb: f64,
    /// Capacity.
    pub max_size_bytes: u64,
    /// Entry lifetime in seconds.
    pub ttl_seconds: u64,
}

#[derive(Debug)]
struct CacheEntry {
    payload: Bytes,
    checksum: String,
    created_at: DateTime<Utc>,
    size_bytes: u64,
    seq: u64,
}

/// Entries plus an insertion-age index. Every field is updated together
/// under the cache mutex.
#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<Fingerprint, CacheEntry>,
    by_age: BTreeMap<(DateTime<Utc>, u64), Fingerprint>,
    total_bytes: u64,
    next_seq: u64,
}

impl CacheState {
    fn remove(&mut self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let entry = self.entries.remove(fingerprint)?;
        self.by_age.remove(&(entry.created_at, entry.seq));
        self.total_bytes = self.total_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    fn remove_oldest(&mut self) -> Option<CacheEntry> {
        let (_, fingerprint) = self.by_age.pop_first()?;
        let entry = self.entries.remove(&fingerprint)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    /// Drop every entry created before `cutoff`. Returns how many went.
    fn expire_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while let Some((&(created_at, _), _)) = self.by_age.first_key_value() {
            if created_at >= cutoff {
                break;
            }
            self.remove_oldest();
            removed += 1;
        }
        removed
    }
}

/// Shared content-addressed store of conversion outputs.
///
/// Lookups and inserts sweep expired entries first. Inserts evict the oldest
/// entries until the total payload size fits the capacity. Payload hashing
/// happens outside the lock.
#[derive(Debug, Clone)]
pub struct ConversionCache {
    state: Arc<Mutex<CacheState>>,
    clock: Arc<dyn Clock>,
    max_size_bytes: u64,
    ttl: Duration,
}

impl ConversionCache {
    /// Create a cache with an explicit capacity and lifetime.
    pub fn new(max_size_bytes: u64, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            clock,
            max_size_bytes,
            ttl,
        }
    }

    /// Create a cache from configuration.
    pub fn from_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.max_size_bytes(), config.ttl(), clock)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn expiry_cutoff(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let now = self.clock.now();
        now.checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn sweep(&self, state: &mut CacheState) {
        let removed = state.expire_before(self.expiry_cutoff());
        if removed > 0 {
            debug!(removed, "Expired cache entries");
        }
    }

    /// Look up a payload. Absent, expired and corrupted entries are all a
    /// miss; the latter two are evicted.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Bytes> {
        let (payload, checksum, seq) = {
            let mut state = self.lock();
            self.sweep(&mut state);
            let entry = state.entries.get(fingerprint)?;
            (entry.payload.clone(), entry.checksum.clone(), entry.seq)
        };

        if content_hash(&payload) != checksum {
            warn!(fingerprint = %fingerprint, "Cache entry failed integrity check, evicting");
            let mut state = self.lock();
            if state.entries.get(fingerprint).is_some_and(|e| e.seq == seq) {
                state.remove(fingerprint);
            }
            return None;
        }

        debug!(fingerprint = %fingerprint, bytes = payload.len(), "Cache hit");
        Some(payload)
    }

    /// Store a payload. Returns `false` when the fingerprint was already
    /// present, in which case the existing payload is kept.
    ///
    /// A payload larger than the whole capacity is rejected.
    pub fn put(&self, fingerprint: Fingerprint, payload: Bytes) -> AppResult<bool> {
        let size_bytes = payload.len() as u64;
        if size_bytes > self.max_size_bytes {
            return Err(AppError::cache(format!(
                "Payload of {size_bytes} bytes exceeds cache capacity of {} bytes",
                self.max_size_bytes
            )));
        }
        let checksum = content_hash(&payload);
        let created_at = self.clock.now();

        let mut state = self.lock();
        self.sweep(&mut state);
        if state.entries.contains_key(&fingerprint) {
            debug!(fingerprint = %fingerprint, "Cache entry already present");
            return Ok(false);
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.by_age.insert((created_at, seq), fingerprint.clone());
        state.entries.insert(
            fingerprint,
            CacheEntry {
                payload,
                checksum,
                created_at,
                size_bytes,
                seq,
            },
        );
        state.total_bytes += size_bytes;

        let mut evicted = 0usize;
        while state.total_bytes > self.max_size_bytes {
            if state.remove_oldest().is_none() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, total_bytes = state.total_bytes, "Evicted oldest cache entries");
        }
        Ok(true)
    }

    /// Current occupancy.
    pub fn stats(&self) -> CacheStats {
        let mut state = self.lock();
        self.sweep(&mut state);
        CacheStats {
            entry_count: state.entries.len(),
            total_size_bytes: state.total_bytes,
            total_size_mb: state.total_bytes as f64 / (1024.0 * 1024.0),
            max_size_bytes: self.max_size_bytes,
            ttl_seconds: self.ttl.as_secs(),
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut state = self.lock();
        *state = CacheState::default();
    }

    #[cfg(test)]
    fn tamper(&self, fingerprint: &Fingerprint, payload: Bytes) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get_mut(fingerprint) {
            entry.payload = payload;
        }
    }
}
