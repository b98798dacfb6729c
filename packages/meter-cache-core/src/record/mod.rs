//! Schema-bound record model.
//!
//! Every record kind is represented by the same `Record` type: a shared
//! reference to its `RecordDef` plus a value vector in declaration order.
//! Field names resolve to positions through the definition's index, so no
//! per-kind type is ever generated.

mod value;

use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{CacheError, Result};
use crate::schema::RecordDef;

pub use value::Value;

/// One reading: a schema-bound, immutable set of typed values.
#[derive(Debug, Clone)]
pub struct Record {
    def: Arc<RecordDef>,
    values: Vec<Value>,
    timestamp: i64,
}

impl Record {
    /// Builds a record from a field map, validating every entry.
    ///
    /// # Arguments
    /// * `def` - Reading kind the record belongs to
    /// * `values` - Field name to value mapping
    ///
    /// # Returns
    /// `Result<Record, CacheError>`: `UnknownField` for undeclared names,
    /// `TypeMismatch` for mistyped values, `MissingField` when the timestamp
    /// is absent. Other absent fields take their type's zero value.
    pub fn from_values(def: Arc<RecordDef>, values: HashMap<String, Value>) -> Result<Self> {
        let mut builder = RecordBuilder::new(def)?;
        for (field, value) in values {
            builder = builder.set(&field, value)?;
        }
        builder.build()
    }

    /// Builds a record from a JSON object, coercing numbers per declared type.
    ///
    /// `null` members count as absent.
    pub fn from_json(def: Arc<RecordDef>, json: &serde_json::Value) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            CacheError::InvalidArgument(format!(
                "{} reading must be a JSON object",
                def.name()
            ))
        })?;

        let mut builder = RecordBuilder::new(Arc::clone(&def))?;
        for (field, member) in object {
            if member.is_null() {
                def.field_index(field)?;
                continue;
            }
            let field_type = &def.field(field)?.field_type;
            let value = Value::from_json(member, field_type, field)?;
            builder = builder.set(field, value)?;
        }
        builder.build()
    }

    /// Starts a typed builder for a reading kind.
    pub fn builder(def: Arc<RecordDef>) -> Result<RecordBuilder> {
        RecordBuilder::new(def)
    }

    /// Assembles a record from values already in declaration order.
    ///
    /// Used by the codec, which reads values straight off the wire.
    pub(crate) fn from_ordered(def: Arc<RecordDef>, values: Vec<Value>) -> Result<Self> {
        let ts_idx = require_reading_kind(&def)?;
        if values.len() != def.field_count() {
            return Err(CacheError::codec(format!(
                "{} expects {} values, got {}",
                def.name(),
                def.field_count(),
                values.len()
            )));
        }
        for (field, value) in def.fields().iter().zip(values.iter()) {
            if !value.matches(&field.field_type) {
                return Err(CacheError::TypeMismatch {
                    field: field.name.clone(),
                    expected: field.field_type.tag(),
                    got: value.type_name().to_string(),
                });
            }
        }
        let timestamp = values[ts_idx].as_i64().ok_or_else(|| {
            CacheError::codec(format!("{} timestamp is not a long", def.name()))
        })?;
        Ok(Self {
            def,
            values,
            timestamp,
        })
    }

    /// Reading kind of this record.
    pub fn kind(&self) -> &str {
        self.def.name()
    }

    /// Backing record definition.
    pub fn def(&self) -> &Arc<RecordDef> {
        &self.def
    }

    /// Values in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Timestamp in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Value of a field by name.
    pub fn get(&self, field: &str) -> Result<&Value> {
        let idx = self.def.field_index(field)?;
        Ok(&self.values[idx])
    }

    /// Value at a pre-resolved field position.
    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Numeric value of a field, widened to `f64`.
    pub fn get_f64(&self, field: &str) -> Result<f64> {
        let idx = self.def.field_index(field)?;
        self.values[idx]
            .as_f64()
            .ok_or_else(|| CacheError::TypeMismatch {
                field: field.to_string(),
                expected: "numeric".to_string(),
                got: self.def.fields()[idx].field_type.tag(),
            })
    }

    /// JSON object keyed by field name.
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .def
            .fields()
            .iter()
            .zip(self.values.iter())
            .map(|(f, v)| (f.name.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(object)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.def.name() == other.def.name() && self.values == other.values
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.def.fields().iter().zip(self.values.iter()) {
            map.serialize_entry(&field.name, value)?;
        }
        map.end()
    }
}

/// Typed, validated construction of a `Record`.
#[derive(Debug)]
pub struct RecordBuilder {
    def: Arc<RecordDef>,
    values: Vec<Option<Value>>,
}

impl RecordBuilder {
    /// Starts a builder; fails unless `def` is a reading kind.
    pub fn new(def: Arc<RecordDef>) -> Result<Self> {
        require_reading_kind(&def)?;
        let values = vec![None; def.field_count()];
        Ok(Self { def, values })
    }

    /// Sets a field by name, checking its declared type.
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Result<Self> {
        let idx = self.def.field_index(field)?;
        let value = value.into();
        let field_type = &self.def.fields()[idx].field_type;
        if !value.matches(field_type) {
            return Err(CacheError::TypeMismatch {
                field: field.to_string(),
                expected: field_type.tag(),
                got: value.type_name().to_string(),
            });
        }
        self.values[idx] = Some(value);
        Ok(self)
    }

    /// Finishes the record, defaulting unset fields other than the timestamp.
    pub fn build(self) -> Result<Record> {
        let ts_idx = require_reading_kind(&self.def)?;
        let timestamp = match &self.values[ts_idx] {
            Some(Value::Long(ts)) => *ts,
            _ => {
                return Err(CacheError::MissingField {
                    model: self.def.name().to_string(),
                    field: self.def.fields()[ts_idx].name.clone(),
                });
            }
        };

        let values = self
            .values
            .into_iter()
            .zip(self.def.fields().iter())
            .map(|(v, f)| v.unwrap_or_else(|| Value::default_for(&f.field_type)))
            .collect();

        Ok(Record {
            def: self.def,
            values,
            timestamp,
        })
    }
}

fn require_reading_kind(def: &RecordDef) -> Result<usize> {
    def.timestamp_index().ok_or_else(|| {
        CacheError::InvalidArgument(format!("'{}' is not a reading kind", def.name()))
    })
}
