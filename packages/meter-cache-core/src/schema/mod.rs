//! Schema registry: record kinds, field definitions and content hashing.

mod field;
mod record_def;
mod registry;
mod source;
pub(crate) mod validation;

pub use field::{ElementType, FieldDef, FieldType};
pub use record_def::RecordDef;
pub use registry::{schema_hash, validate_peer_hash, SchemaHash, SchemaRegistry, SchemaSet};
pub use source::{FieldSchema, ModelSchema, SchemaFile, SchemaSource, SCHEMA_VERSION};

/// Schema used by unit tests across the crate.
#[cfg(test)]
pub(crate) const TEST_SCHEMA: &str = r#"{
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
        { "name": "sequence", "type": "int" },
        { "name": "valid", "type": "bool" },
        { "name": "phases", "type": "array", "element_type": "double" }
      ]
    },
    {
      "name": "MeterBucket",
      "array_field": "readings",
      "fields": [
        { "name": "meterId", "type": "string" },
        { "name": "day", "type": "long" },
        { "name": "readings", "type": "array", "element_type": "MeterReading" },
        { "name": "count", "type": "int" },
        { "name": "createdAt", "type": "long" },
        { "name": "lastAccessAt", "type": "long" }
      ]
    }
  ]
}"#;

/// Loaded registry over [`TEST_SCHEMA`].
#[cfg(test)]
pub(crate) fn test_registry() -> std::sync::Arc<SchemaRegistry> {
    std::sync::Arc::new(
        SchemaRegistry::from_source(&SchemaSource::from(TEST_SCHEMA))
            .expect("test schema must load"),
    )
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
