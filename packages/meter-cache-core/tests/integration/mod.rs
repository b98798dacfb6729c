//! Integration test suite for the cache engine.
//!
//! 1. End-to-end ingest, query and aggregation
//! 2. Eviction
//! 3. Concurrency
//! 4. Store failures and schema compatibility

pub mod compatibility_tests;
pub mod concurrency_tests;
pub mod end_to_end_tests;
pub mod eviction_tests;
pub mod helpers;
