//! Key/value store contract the cache runs against.
//!
//! The store holds encoded bucket payloads under `"{owner}:{date}"` keys.
//! Replication, partitioning and persistence are the store's business; the
//! cache only needs per-key atomic read-modify-write.

mod memory;

use serde::Serialize;

use crate::error::Result;

pub use memory::InMemoryStore;

/// Best-effort store counters, surfaced as the cache's own statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub owned_entry_count: u64,
    pub memory_cost_bytes: u64,
    pub put_count: u64,
    pub get_count: u64,
}

/// Read-modify-write callback passed to [`KvStore::compute_atomic`].
///
/// Receives the current value (or `None` when the key is absent) and returns
/// the value to store, `None` to leave or make the key absent, or an error to
/// abort without changing anything.
pub type ComputeFn<'a> = dyn FnMut(Option<&[u8]>) -> Result<Option<Vec<u8>>> + 'a;

/// Trait for key/value store implementations.
///
/// Failures of the store itself are reported as `StoreUnavailable`.
pub trait KvStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Atomically replaces the value under `key` with the callback's result.
    ///
    /// No other writer to `key` may interleave between the read handed to
    /// `f` and the write of its result.
    fn compute_atomic(&self, key: &str, f: &mut ComputeFn<'_>) -> Result<()>;

    /// Removes `key`; returns `true` if it was present.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Snapshot of all keys. Not atomic with respect to concurrent writes.
    fn keys(&self) -> Result<Vec<String>>;

    /// Number of stored entries.
    fn size(&self) -> Result<usize>;

    /// Store counters.
    fn stats(&self) -> Result<StoreStats>;
}
