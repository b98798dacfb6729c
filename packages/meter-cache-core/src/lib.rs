//! Hot-tier cache engine for per-device time-series telemetry.
//!
//! Provides a schema registry for externally defined record kinds, a
//! schema-bound record model, the compressed bucket codec, per-day bucket
//! logic, and the cache service that ingests, queries, aggregates and evicts
//! against an external key/value store.

pub mod bucket;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod record;
pub mod schema;
pub mod store;

pub use bucket::Bucket;
pub use cache::{
    AggregationKind, AggregationResult, CacheService, CacheStats, Clock, EvictionReport,
    IngestSummary, Interval, ManualClock, SystemClock,
};
pub use config::CacheConfig;
pub use error::CacheError;
pub use record::{Record, RecordBuilder, Value};
pub use schema::{SchemaHash, SchemaRegistry, SchemaSet, SchemaSource};
pub use store::{InMemoryStore, KvStore, StoreStats};
