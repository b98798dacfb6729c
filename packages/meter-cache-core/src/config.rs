//! Cache configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Schema source file describing the record kinds
    pub schema_path: PathBuf,
    /// Record kind used for readings
    pub reading_kind: String,
    /// Record kind used for day buckets
    pub bucket_kind: String,
    /// Numeric reading field folded by aggregations
    pub aggregation_field: String,
    /// Minimum bucket age in days before eviction is considered
    pub retention_days: u32,
    /// Minimum idle time in hours before eviction is considered
    pub idle_hours: u32,
    /// zstd level applied to encoded buckets (1-22)
    pub compression_level: i32,
    /// Capacity of a bucket's reading array on first growth
    pub initial_bucket_capacity: usize,
    /// Largest number of calendar days a single range query may span
    pub max_query_days: u32,
    /// Refresh a bucket's last-access time when a query reads it
    pub touch_on_read: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            schema_path: PathBuf::from("./schema.json"),
            reading_kind: "MeterReading".to_string(),
            bucket_kind: "MeterBucket".to_string(),
            aggregation_field: "power".to_string(),
            retention_days: 7,
            idle_hours: 24,
            compression_level: 6,
            initial_bucket_capacity: 16,
            max_query_days: 366,
            touch_on_read: true,
        }
    }
}

impl CacheConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// Keys absent from the file keep their default values.
    ///
    /// # Arguments
    /// * `path` - Path to the JSON configuration file
    ///
    /// # Returns
    /// `Result<CacheConfig, CacheError>` containing the validated configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            CacheError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: CacheConfig = serde_json::from_str(&contents).map_err(|e| {
            CacheError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.reading_kind.is_empty() || self.bucket_kind.is_empty() {
            return Err(CacheError::Config(
                "reading_kind and bucket_kind must be set".to_string(),
            ));
        }
        if self.aggregation_field.is_empty() {
            return Err(CacheError::Config(
                "aggregation_field must be set".to_string(),
            ));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(CacheError::Config(format!(
                "compression_level {} outside 1-22",
                self.compression_level
            )));
        }
        if self.initial_bucket_capacity == 0 {
            return Err(CacheError::Config(
                "initial_bucket_capacity must be > 0".to_string(),
            ));
        }
        if self.max_query_days == 0 {
            return Err(CacheError::Config(
                "max_query_days must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
