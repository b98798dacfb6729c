//! Shared fixtures for integration tests.

use std::sync::Arc;

use anyhow::Result;

use meter_cache_core::cache::{CacheService, ManualClock};
use meter_cache_core::config::CacheConfig;
use meter_cache_core::record::Record;
use meter_cache_core::schema::{SchemaRegistry, SchemaSource};
use meter_cache_core::store::{InMemoryStore, KvStore};

/// 2026-02-18T00:00:00Z
pub const DAY_START: i64 = 1_771_372_800_000;
pub const MINUTE: i64 = 60_000;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 24 * HOUR;

pub const SCHEMA: &str = r#"{
  "version": 1,
  "models": [
    {
      "name": "MeterReading",
      "timestamp_field": "timestamp",
      "fields": [
        { "name": "meterId", "type": "string" },
        { "name": "timestamp", "type": "long" },
        { "name": "power", "type": "double" },
        { "name": "voltage", "type": "float" },
        { "name": "valid", "type": "bool" }
      ]
    },
    {
      "name": "MeterBucket",
      "array_field": "readings",
      "fields": [
        { "name": "meterId", "type": "string" },
        { "name": "day", "type": "long" },
        { "name": "readings", "type": "array", "element_type": "MeterReading" }
      ]
    }
  ]
}"#;

pub struct TestCache {
    pub cache: CacheService,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
}

/// Writes the schema to a temp dir and loads it the way a process would.
pub fn load_registry() -> Result<Arc<SchemaRegistry>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("schema.json");
    std::fs::write(&path, SCHEMA)?;
    Ok(Arc::new(SchemaRegistry::from_source(&SchemaSource::Path(path))?))
}

pub fn cache_with(config: CacheConfig) -> Result<TestCache> {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(DAY_START));
    let cache = CacheService::new(load_registry()?, store.clone(), config)?
        .with_clock(clock.clone());
    Ok(TestCache {
        cache,
        store,
        clock,
    })
}

pub fn test_cache() -> Result<TestCache> {
    cache_with(CacheConfig::default())
}

pub fn cache_over(store: Arc<dyn KvStore>) -> Result<CacheService> {
    Ok(CacheService::new(
        load_registry()?,
        store,
        CacheConfig::default(),
    )?)
}

pub fn reading(cache: &CacheService, owner: &str, ts: i64, power: f64) -> Result<Record> {
    Ok(Record::builder(Arc::clone(cache.reading_def()))?
        .set("meterId", owner)?
        .set("timestamp", ts)?
        .set("power", power)?
        .set("valid", true)?
        .build()?)
}
