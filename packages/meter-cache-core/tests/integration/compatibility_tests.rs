//! Store failures and schema compatibility between processes.

use std::sync::Arc;

use anyhow::Result;

use meter_cache_core::cache::{CacheService, AggregationKind, Interval};
use meter_cache_core::codec;
use meter_cache_core::config::CacheConfig;
use meter_cache_core::error::{CacheError, Result as CacheResult};
use meter_cache_core::schema::{schema_hash, SchemaHash, SchemaRegistry, SchemaSource};
use meter_cache_core::store::{ComputeFn, InMemoryStore, KvStore, StoreStats};

use super::helpers::*;

/// Store whose every call fails, as an unreachable cluster would.
struct UnavailableStore;

impl KvStore for UnavailableStore {
    fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }

    fn compute_atomic(&self, _key: &str, _f: &mut ComputeFn<'_>) -> CacheResult<()> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }

    fn delete(&self, _key: &str) -> CacheResult<bool> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }

    fn keys(&self) -> CacheResult<Vec<String>> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }

    fn size(&self) -> CacheResult<usize> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }

    fn stats(&self) -> CacheResult<StoreStats> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }
}

#[test]
fn test_store_failure_surfaces_unchanged() -> Result<()> {
    let cache = cache_over(Arc::new(UnavailableStore))?;
    let r = reading(&cache, "MTR-001", DAY_START, 1.0)?;

    let is_unavailable = |e: &CacheError| matches!(e, CacheError::StoreUnavailable(_));
    assert!(is_unavailable(&cache.ingest("MTR-001", r).unwrap_err()));
    assert!(is_unavailable(
        &cache.query_range("MTR-001", DAY_START, DAY_START + 1).unwrap_err()
    ));
    assert!(is_unavailable(
        &cache
            .aggregate("MTR-001", DAY_START, DAY_START + 1, AggregationKind::Sum, Interval::Daily)
            .unwrap_err()
    ));
    assert!(is_unavailable(&cache.evict(7, 24).unwrap_err()));
    assert!(is_unavailable(&cache.stats().unwrap_err()));
    Ok(())
}

#[test]
fn test_rejected_reading_leaves_bucket_intact() -> Result<()> {
    let t = test_cache()?;
    t.cache
        .ingest("MTR-001", reading(&t.cache, "MTR-001", DAY_START, 1.0)?)?;

    let bad = serde_json::json!({ "timestamp": DAY_START + 1, "power": "lots" });
    assert!(matches!(
        t.cache.ingest_json("MTR-001", &bad),
        Err(CacheError::TypeMismatch { .. })
    ));
    let unknown = serde_json::json!({ "timestamp": DAY_START + 2, "torque": 1.0 });
    assert!(matches!(
        t.cache.ingest_json("MTR-001", &unknown),
        Err(CacheError::UnknownField { .. })
    ));

    assert_eq!(t.cache.query_range("MTR-001", DAY_START, DAY_START + 10)?.len(), 1);
    Ok(())
}

#[test]
fn test_peer_hash_check() -> Result<()> {
    let t = test_cache()?;
    let same = schema_hash(&SchemaSource::from(SCHEMA))?;
    t.cache.validate_peer(&same)?;

    let mut edited = SCHEMA.to_string();
    edited.push('\n');
    let drifted = schema_hash(&SchemaSource::Bytes(edited.into_bytes()))?;
    assert!(matches!(
        t.cache.validate_peer(&drifted),
        Err(CacheError::SchemaMismatch { .. })
    ));

    let parsed: SchemaHash = same.to_hex().parse()?;
    assert_eq!(parsed, t.cache.schema_hash());
    Ok(())
}

/// A reader whose schema gained a field still decodes buckets written
/// before the change; the new field reads as its zero value.
#[test]
fn test_reader_with_extended_schema_decodes_old_buckets() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let writer = CacheService::new(load_registry()?, store.clone(), CacheConfig::default())?;
    writer.ingest("MTR-001", reading(&writer, "MTR-001", DAY_START, 42.0)?)?;

    let extended = SCHEMA.replace(
        r#"{ "name": "valid", "type": "bool" }"#,
        r#"{ "name": "valid", "type": "bool" },
        { "name": "frequency", "type": "double" }"#,
    );
    let registry = Arc::new(SchemaRegistry::from_source(&SchemaSource::from(
        extended.as_str(),
    ))?);
    assert_ne!(registry.hash()?, writer.schema_hash());

    let reader = CacheService::new(registry, store.clone(), CacheConfig::default())?;
    let hits = reader.query_range("MTR-001", DAY_START, DAY_START + 1)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].get_f64("power")?, 42.0);
    assert_eq!(hits[0].get_f64("frequency")?, 0.0);

    // Re-encoded by the reader, the bucket now embeds the extended layout.
    let stored = store.get("MTR-001:2026-02-18")?.expect("bucket present");
    let set = reader.registry().schema_set()?;
    let bucket = codec::decode_bucket(&stored, &set)?;
    assert_eq!(bucket.reading_def().field_count(), 6);
    Ok(())
}
