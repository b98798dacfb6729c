//! Eviction: both the age and the idle threshold must be exceeded.

use anyhow::Result;

use meter_cache_core::cache::EvictionReport;
use meter_cache_core::config::CacheConfig;
use meter_cache_core::store::KvStore;

use super::helpers::*;

#[test]
fn test_old_and_idle_bucket_is_evicted() -> Result<()> {
    let t = test_cache()?;
    t.cache
        .ingest("MTR-001", reading(&t.cache, "MTR-001", DAY_START, 1.0)?)?;

    t.clock.advance(8 * DAY);
    let report = t.cache.evict(7, 24)?;
    assert_eq!(
        report,
        EvictionReport {
            scanned: 1,
            evicted: 1,
            undecodable: 0
        }
    );
    assert_eq!(t.store.size()?, 0);
    Ok(())
}

#[test]
fn test_recently_read_old_bucket_is_kept() -> Result<()> {
    let t = test_cache()?;
    t.cache
        .ingest("MTR-001", reading(&t.cache, "MTR-001", DAY_START, 1.0)?)?;

    t.clock.advance(8 * DAY);
    t.cache.query_range("MTR-001", DAY_START, DAY_START + HOUR)?;
    t.clock.advance(2 * HOUR);

    assert_eq!(t.cache.evict(7, 24)?.evicted, 0);
    assert_eq!(t.store.size()?, 1);
    Ok(())
}

#[test]
fn test_fresh_idle_bucket_is_kept() -> Result<()> {
    let t = test_cache()?;
    t.cache
        .ingest("MTR-001", reading(&t.cache, "MTR-001", DAY_START, 1.0)?)?;

    // Idle for three days but younger than the retention period.
    t.clock.advance(3 * DAY);
    assert_eq!(t.cache.evict(7, 24)?.evicted, 0);
    Ok(())
}

#[test]
fn test_recent_ingest_keeps_old_bucket() -> Result<()> {
    let t = test_cache()?;
    t.cache
        .ingest("MTR-001", reading(&t.cache, "MTR-001", DAY_START, 1.0)?)?;

    t.clock.advance(10 * DAY);
    t.cache
        .ingest("MTR-001", reading(&t.cache, "MTR-001", DAY_START + HOUR, 2.0)?)?;

    assert_eq!(t.cache.evict(7, 24)?.evicted, 0);
    t.clock.advance(25 * HOUR);
    assert_eq!(t.cache.evict(7, 24)?.evicted, 1);
    Ok(())
}

#[test]
fn test_evict_expired_uses_configured_thresholds() -> Result<()> {
    let t = cache_with(CacheConfig {
        retention_days: 1,
        idle_hours: 1,
        ..CacheConfig::default()
    })?;
    for owner in ["MTR-001", "MTR-002", "MTR-003"] {
        t.cache
            .ingest(owner, reading(&t.cache, owner, DAY_START, 1.0)?)?;
    }
    t.clock.advance(DAY + 2 * HOUR);
    t.cache
        .ingest("MTR-003", reading(&t.cache, "MTR-003", DAY_START + 1, 1.0)?)?;

    let report = t.cache.evict_expired()?;
    assert_eq!(report.scanned, 3);
    assert_eq!(report.evicted, 2);
    assert_eq!(t.store.keys()?, vec!["MTR-003:2026-02-18".to_string()]);
    Ok(())
}
