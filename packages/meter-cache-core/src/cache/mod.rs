//! Cache service: day bucketing, range queries, aggregation and eviction.
//!
//! All mutable bucket state lives in the [`KvStore`]. Each mutation of a
//! bucket is a single `compute_atomic` call, so concurrent ingests to the
//! same owner and day never lose readings. Operations spanning several
//! days are not atomic as a whole.

mod aggregate;
mod clock;
mod key;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::bucket::{date_to_epoch_day, Bucket};
use crate::codec;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::record::{Record, Value};
use crate::schema::{RecordDef, SchemaHash, SchemaRegistry, SchemaSet};
use crate::store::KvStore;

pub use aggregate::{AggregationKind, AggregationResult, Interval};
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{bucket_key, day_of, parse_bucket_key};

/// Outcome of a batch ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub readings: usize,
    pub buckets_touched: usize,
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvictionReport {
    pub scanned: usize,
    pub evicted: usize,
    /// Entries whose header could not be decoded; they are kept
    pub undecodable: usize,
}

/// Cache statistics, taken from the store.
///
/// `put_count` counts every bucket write, including the rewrite a query
/// makes to refresh last-access times when `touch_on_read` is on, so it
/// grows on read-only workloads too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub owned_entry_count: u64,
    pub memory_cost_bytes: u64,
    pub put_count: u64,
    pub get_count: u64,
    pub size: usize,
}

/// Result of inspecting one key during an eviction scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanOutcome {
    Gone,
    Keep,
    Stale,
    Undecodable,
}

/// Hot-tier cache over a key/value store.
pub struct CacheService {
    registry: Arc<SchemaRegistry>,
    schema: Arc<SchemaSet>,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    reading_def: Arc<RecordDef>,
    bucket_def: Arc<RecordDef>,
    aggregation_index: usize,
}

impl CacheService {
    /// Creates a cache service.
    ///
    /// Record kinds and the aggregation field are resolved once here.
    ///
    /// # Arguments
    /// * `registry` - Loaded schema registry
    /// * `store` - Backing key/value store
    /// * `config` - Cache configuration
    ///
    /// # Returns
    /// `Result<CacheService, CacheError>`; `UnknownModel` if the registry is
    /// not loaded or lacks a configured kind, `Config` if the configured
    /// kinds or field have the wrong shape.
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn KvStore>,
        config: CacheConfig,
    ) -> Result<Self> {
        config.validate()?;
        let schema = registry.schema_set()?;

        let reading_def = schema.record_def(&config.reading_kind)?;
        if !reading_def.is_reading_kind() {
            return Err(CacheError::Config(format!(
                "reading kind '{}' has no timestamp field",
                config.reading_kind
            )));
        }

        let bucket_def = schema.record_def(&config.bucket_kind)?;
        if bucket_def.element_kind() != Some(reading_def.name()) {
            return Err(CacheError::Config(format!(
                "bucket kind '{}' does not hold '{}' readings",
                config.bucket_kind, config.reading_kind
            )));
        }

        let aggregation_index = reading_def.field_index(&config.aggregation_field)?;
        let field_type = &reading_def.fields()[aggregation_index].field_type;
        if !field_type.is_numeric() {
            return Err(CacheError::Config(format!(
                "aggregation field '{}' is {}, not numeric",
                config.aggregation_field, field_type
            )));
        }

        tracing::info!(
            "Cache service ready: {} readings in {} buckets, aggregating '{}', schema {}",
            reading_def.name(),
            bucket_def.name(),
            config.aggregation_field,
            schema.hash()
        );

        Ok(Self {
            registry,
            schema,
            store,
            clock: Arc::new(SystemClock),
            config,
            reading_def,
            bucket_def,
            aggregation_index,
        })
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Reading kind this cache stores.
    pub fn reading_def(&self) -> &Arc<RecordDef> {
        &self.reading_def
    }

    /// Hash of the schema this cache encodes with.
    pub fn schema_hash(&self) -> SchemaHash {
        self.schema.hash()
    }

    /// Rejects a peer whose schema differs from ours.
    pub fn validate_peer(&self, remote: &SchemaHash) -> Result<()> {
        let result = self.registry.validate_peer(remote);
        if let Err(e) = &result {
            tracing::error!("Rejecting peer: {}", e);
        }
        result
    }

    /// Stores one reading in its owner's bucket for the reading's UTC day.
    ///
    /// A reading with the same timestamp as a stored one replaces it.
    pub fn ingest(&self, owner_id: &str, reading: Record) -> Result<()> {
        check_owner(owner_id)?;
        self.check_reading(&reading)?;
        let date = day_of(reading.timestamp())?;
        self.upsert(owner_id, date, std::slice::from_ref(&reading))?;
        tracing::debug!(
            "Ingested reading {} for {} on {}",
            reading.timestamp(),
            owner_id,
            date
        );
        Ok(())
    }

    /// Builds a reading from a field map and ingests it.
    pub fn ingest_fields(&self, owner_id: &str, fields: HashMap<String, Value>) -> Result<()> {
        let reading = Record::from_values(Arc::clone(&self.reading_def), fields)?;
        self.ingest(owner_id, reading)
    }

    /// Builds a reading from a JSON object and ingests it.
    pub fn ingest_json(&self, owner_id: &str, json: &serde_json::Value) -> Result<()> {
        let reading = Record::from_json(Arc::clone(&self.reading_def), json)?;
        self.ingest(owner_id, reading)
    }

    /// Ingests a batch with one atomic update per distinct day.
    ///
    /// The whole batch is validated before any bucket is touched. Days are
    /// written in ascending order; a store failure leaves earlier days
    /// written.
    ///
    /// # Arguments
    /// * `owner_id` - Device that produced the readings
    /// * `readings` - Readings in any order
    ///
    /// # Returns
    /// `Result<IngestSummary, CacheError>` counting readings and buckets.
    pub fn ingest_many(&self, owner_id: &str, readings: Vec<Record>) -> Result<IngestSummary> {
        check_owner(owner_id)?;
        let mut by_day: BTreeMap<NaiveDate, Vec<Record>> = BTreeMap::new();
        for reading in readings {
            self.check_reading(&reading)?;
            by_day
                .entry(day_of(reading.timestamp())?)
                .or_default()
                .push(reading);
        }

        let mut summary = IngestSummary::default();
        for (date, day_readings) in &by_day {
            self.upsert(owner_id, *date, day_readings)?;
            summary.readings += day_readings.len();
            summary.buckets_touched += 1;
        }

        tracing::debug!(
            "Ingested {} readings for {} across {} buckets",
            summary.readings,
            owner_id,
            summary.buckets_touched
        );
        Ok(summary)
    }

    /// Readings of an owner with `start <= timestamp <= end`, ascending.
    ///
    /// Each calendar day in the window is one bucket lookup; missing
    /// buckets are skipped. With `touch_on_read` every bucket read has its
    /// last-access time refreshed in the same atomic update.
    ///
    /// # Arguments
    /// * `owner_id` - Device to query
    /// * `start` - Window start in ms, inclusive
    /// * `end` - Window end in ms, inclusive
    ///
    /// # Returns
    /// `Result<Vec<Record>, CacheError>`; empty when `start > end`,
    /// `InvalidArgument` when the window spans more than `max_query_days`.
    pub fn query_range(&self, owner_id: &str, start: i64, end: i64) -> Result<Vec<Record>> {
        check_owner(owner_id)?;
        if start > end {
            return Ok(Vec::new());
        }

        let first = day_of(start)?;
        let last = day_of(end)?;
        let days = (last - first).num_days() + 1;
        if days > i64::from(self.config.max_query_days) {
            return Err(CacheError::InvalidArgument(format!(
                "query spans {} days, limit is {}",
                days, self.config.max_query_days
            )));
        }

        let mut hits = Vec::new();
        for date in first.iter_days().take(days as usize) {
            let day_hits = if self.config.touch_on_read {
                self.read_and_touch(owner_id, date, start, end)?
            } else {
                self.get_bucket(owner_id, date)?
                    .map(|b| b.query_range(start, end))
                    .unwrap_or_default()
            };
            hits.extend(day_hits);
        }
        hits.sort_by_key(Record::timestamp);

        tracing::debug!(
            "Query {} [{}, {}] over {} days returned {} readings",
            owner_id,
            start,
            end,
            days,
            hits.len()
        );
        Ok(hits)
    }

    /// Folds the configured aggregation field over a query window.
    ///
    /// An empty window yields `value: None` and `count: 0`. `interval` is
    /// recorded in the result and does not split the window.
    pub fn aggregate(
        &self,
        owner_id: &str,
        start: i64,
        end: i64,
        kind: AggregationKind,
        interval: Interval,
    ) -> Result<AggregationResult> {
        let readings = self.query_range(owner_id, start, end)?;
        Ok(AggregationResult {
            subject_id: owner_id.to_string(),
            kind,
            interval,
            value: aggregate::fold(&readings, self.aggregation_index, kind),
            count: readings.len(),
        })
    }

    /// Decoded bucket of an owner for one date, without touching it.
    pub fn get_bucket(&self, owner_id: &str, date: NaiveDate) -> Result<Option<Bucket>> {
        let key = bucket_key(owner_id, date);
        let bytes = self.store_call("get", &key, self.store.get(&key))?;
        bytes
            .map(|b| codec::decode_bucket(&b, &self.schema))
            .transpose()
    }

    /// Drops an owner's bucket for one date; returns `true` if it existed.
    pub fn invalidate(&self, owner_id: &str, date: NaiveDate) -> Result<bool> {
        let key = bucket_key(owner_id, date);
        let removed = self.store_call("delete", &key, self.store.delete(&key))?;
        tracing::debug!("Invalidated {} (present: {})", key, removed);
        Ok(removed)
    }

    /// Removes every bucket older than `retention_days` and idle for more
    /// than `idle_hours`.
    ///
    /// Scans the whole key space. Both thresholds must be exceeded, and the
    /// check is repeated inside the atomic delete so a bucket touched
    /// mid-scan survives. Entries that cannot be decoded are logged and kept.
    pub fn evict(&self, retention_days: u32, idle_hours: u32) -> Result<EvictionReport> {
        let keys = self.store_call("keys", "*", self.store.keys())?;
        let now = self.clock.now_millis();

        let classify = |key: &String| self.classify(key, now, retention_days, idle_hours);
        #[cfg(feature = "parallel")]
        let outcomes: Vec<ScanOutcome> = {
            use rayon::prelude::*;
            keys.par_iter().map(classify).collect::<Result<_>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<ScanOutcome> = keys.iter().map(classify).collect::<Result<_>>()?;

        let mut report = EvictionReport::default();
        for (key, outcome) in keys.iter().zip(outcomes) {
            match outcome {
                ScanOutcome::Gone => continue,
                ScanOutcome::Keep => {}
                ScanOutcome::Undecodable => report.undecodable += 1,
                ScanOutcome::Stale => {
                    if self.delete_if_stale(key, now, retention_days, idle_hours)? {
                        report.evicted += 1;
                    }
                }
            }
            report.scanned += 1;
        }

        tracing::info!(
            "Eviction (retention {}d, idle {}h): scanned {}, evicted {}, undecodable {}",
            retention_days,
            idle_hours,
            report.scanned,
            report.evicted,
            report.undecodable
        );
        Ok(report)
    }

    /// Runs [`evict`](Self::evict) with the configured thresholds.
    pub fn evict_expired(&self) -> Result<EvictionReport> {
        self.evict(self.config.retention_days, self.config.idle_hours)
    }

    /// Store counters plus the current entry count.
    pub fn stats(&self) -> Result<CacheStats> {
        let stats = self.store_call("stats", "*", self.store.stats())?;
        let size = self.store_call("size", "*", self.store.size())?;
        Ok(CacheStats {
            owned_entry_count: stats.owned_entry_count,
            memory_cost_bytes: stats.memory_cost_bytes,
            put_count: stats.put_count,
            get_count: stats.get_count,
            size,
        })
    }

    /// Rejects readings of another kind or with a non-finite aggregation value.
    fn check_reading(&self, reading: &Record) -> Result<()> {
        if reading.kind() != self.reading_def.name() {
            return Err(CacheError::InvalidArgument(format!(
                "cache stores {} readings, got {}",
                self.reading_def.name(),
                reading.kind()
            )));
        }
        if let Some(v) = reading
            .get_at(self.aggregation_index)
            .and_then(|v| v.as_f64())
            .filter(|v| !v.is_finite())
        {
            return Err(CacheError::InvalidArgument(format!(
                "reading {} has non-finite {} ({})",
                reading.timestamp(),
                self.config.aggregation_field,
                v
            )));
        }
        Ok(())
    }

    fn new_bucket(&self, owner_id: &str, date: NaiveDate, now: i64) -> Bucket {
        Bucket::new(
            owner_id,
            date_to_epoch_day(date),
            self.bucket_def.name(),
            Arc::clone(&self.reading_def),
            now,
        )
        .with_initial_capacity(self.config.initial_bucket_capacity)
    }

    fn encode(&self, bucket: &mut Bucket) -> Result<Vec<u8>> {
        bucket.trim_to_fit();
        codec::encode_bucket(bucket, self.config.compression_level)
    }

    /// Adds readings of one day to its bucket in a single atomic update.
    fn upsert(&self, owner_id: &str, date: NaiveDate, readings: &[Record]) -> Result<()> {
        let key = bucket_key(owner_id, date);
        let now = self.clock.now_millis();
        let result = self.store.compute_atomic(&key, &mut |current| {
            let mut bucket = match current {
                Some(bytes) => codec::decode_bucket(bytes, &self.schema)?,
                None => self.new_bucket(owner_id, date, now),
            };
            for reading in readings {
                bucket.add_reading(reading.clone(), now)?;
            }
            self.encode(&mut bucket).map(Some)
        });
        self.store_call("compute", &key, result)
    }

    /// Reads one day's hits and refreshes the bucket's last access.
    fn read_and_touch(
        &self,
        owner_id: &str,
        date: NaiveDate,
        start: i64,
        end: i64,
    ) -> Result<Vec<Record>> {
        let key = bucket_key(owner_id, date);
        let now = self.clock.now_millis();
        let mut hits = Vec::new();
        let result = self.store.compute_atomic(&key, &mut |current| match current {
            None => Ok(None),
            Some(bytes) => {
                let mut bucket = codec::decode_bucket(bytes, &self.schema)?;
                hits = bucket.query_range(start, end);
                bucket.touch(now);
                self.encode(&mut bucket).map(Some)
            }
        });
        self.store_call("compute", &key, result)?;
        Ok(hits)
    }

    fn classify(
        &self,
        key: &str,
        now: i64,
        retention_days: u32,
        idle_hours: u32,
    ) -> Result<ScanOutcome> {
        let Some(bytes) = self.store_call("get", key, self.store.get(key))? else {
            return Ok(ScanOutcome::Gone);
        };
        match codec::decode_bucket_header(&bytes) {
            Ok(header) if header.is_evictable(now, retention_days, idle_hours) => {
                Ok(ScanOutcome::Stale)
            }
            Ok(_) => Ok(ScanOutcome::Keep),
            Err(e) => {
                tracing::warn!("Keeping undecodable entry {}: {}", key, e);
                Ok(ScanOutcome::Undecodable)
            }
        }
    }

    fn delete_if_stale(
        &self,
        key: &str,
        now: i64,
        retention_days: u32,
        idle_hours: u32,
    ) -> Result<bool> {
        let mut deleted = false;
        let result = self.store.compute_atomic(key, &mut |current| {
            deleted = false;
            let Some(bytes) = current else {
                return Ok(None);
            };
            match codec::decode_bucket_header(bytes) {
                Ok(header) if header.is_evictable(now, retention_days, idle_hours) => {
                    deleted = true;
                    Ok(None)
                }
                _ => Ok(Some(bytes.to_vec())),
            }
        });
        self.store_call("compute", key, result)?;
        if deleted {
            tracing::debug!("Evicted {}", key);
        }
        Ok(deleted)
    }

    /// Logs store failures on their way back to the caller.
    fn store_call<T>(&self, op: &str, key: &str, result: Result<T>) -> Result<T> {
        if let Err(CacheError::StoreUnavailable(reason)) = &result {
            tracing::error!("Store {} on {} failed: {}", op, key, reason);
        }
        result
    }
}

fn check_owner(owner_id: &str) -> Result<()> {
    if owner_id.is_empty() {
        return Err(CacheError::InvalidArgument("owner id is empty".to_string()));
    }
    if owner_id.contains(char::is_whitespace) {
        return Err(CacheError::InvalidArgument(format!(
            "owner id '{}' contains whitespace",
            owner_id
        )));
    }
    Ok(())
}
