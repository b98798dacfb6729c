//! Record kind definitions with pre-resolved field lookup.

use std::collections::HashMap;

use crate::error::{CacheError, Result};

use super::field::{ElementType, FieldDef, FieldType};

/// Schema for one record kind.
///
/// Field names are resolved to positions once, at construction; records of
/// this kind store their values in the same order as `fields`.
#[derive(Debug, Clone)]
pub struct RecordDef {
    name: String,
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
    timestamp_index: Option<usize>,
    array_index: Option<usize>,
}

impl RecordDef {
    /// Creates a record definition and checks its local invariants.
    ///
    /// # Arguments
    /// * `name` - Record kind name
    /// * `fields` - Field name/type pairs in declaration order
    /// * `timestamp_field` - Designated timestamp field (reading kinds)
    /// * `array_field` - Designated array field (bucket kinds)
    ///
    /// # Returns
    /// `Result<RecordDef, CacheError>` with a `Schema` error when a name is
    /// duplicated or a designated field is missing or mistyped.
    pub fn new(
        name: impl Into<String>,
        fields: Vec<(String, FieldType)>,
        timestamp_field: Option<&str>,
        array_field: Option<&str>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CacheError::schema("record kind with empty name"));
        }

        let def = Self::build(name, fields)?;

        let timestamp_index = match timestamp_field {
            Some(ts) => {
                let idx = def.index.get(ts).copied().ok_or_else(|| {
                    CacheError::schema(format!(
                        "timestamp field '{}' not declared in '{}'",
                        ts, def.name
                    ))
                })?;
                if def.fields[idx].field_type != FieldType::Long {
                    return Err(CacheError::schema(format!(
                        "timestamp field '{}' in '{}' must be long, found {}",
                        ts, def.name, def.fields[idx].field_type
                    )));
                }
                Some(idx)
            }
            None => None,
        };

        let array_index = match array_field {
            Some(arr) => {
                let idx = def.index.get(arr).copied().ok_or_else(|| {
                    CacheError::schema(format!(
                        "array field '{}' not declared in '{}'",
                        arr, def.name
                    ))
                })?;
                if def.fields[idx].field_type.is_scalar() {
                    return Err(CacheError::schema(format!(
                        "designated array field '{}' in '{}' is {}",
                        arr, def.name, def.fields[idx].field_type
                    )));
                }
                let array_count = def.fields.iter().filter(|f| !f.field_type.is_scalar()).count();
                if array_count > 1 {
                    return Err(CacheError::schema(format!(
                        "bucket kind '{}' declares {} array fields",
                        def.name, array_count
                    )));
                }
                Some(idx)
            }
            None => None,
        };

        Ok(Self {
            timestamp_index,
            array_index,
            ..def
        })
    }

    /// Builds a definition straight from wire descriptors.
    ///
    /// Descriptor-built definitions carry no designated fields; they describe
    /// what a writer embedded, not a kind of the local schema.
    pub fn from_descriptors(
        name: impl Into<String>,
        fields: Vec<(String, FieldType)>,
    ) -> Result<Self> {
        Self::build(name.into(), fields).map_err(|e| match e {
            CacheError::Schema(msg) => CacheError::Codec(msg),
            other => other,
        })
    }

    fn build(name: String, fields: Vec<(String, FieldType)>) -> Result<Self> {
        let mut index = HashMap::with_capacity(fields.len());
        let mut defs = Vec::with_capacity(fields.len());
        for (order, (field_name, field_type)) in fields.into_iter().enumerate() {
            if field_name.is_empty() {
                return Err(CacheError::schema(format!(
                    "field #{} in '{}' has an empty name",
                    order, name
                )));
            }
            if index.insert(field_name.clone(), order).is_some() {
                return Err(CacheError::schema(format!(
                    "duplicate field '{}' in '{}'",
                    field_name, name
                )));
            }
            defs.push(FieldDef::new(field_name, field_type, order));
        }

        Ok(Self {
            name,
            fields: defs,
            index,
            timestamp_index: None,
            array_index: None,
        })
    }

    /// Record kind name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Number of declared fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Resolves a field name to its position.
    pub fn field_index(&self, field: &str) -> Result<usize> {
        self.index
            .get(field)
            .copied()
            .ok_or_else(|| CacheError::UnknownField {
                model: self.name.clone(),
                field: field.to_string(),
            })
    }

    /// Looks up a field definition by name.
    pub fn field(&self, field: &str) -> Result<&FieldDef> {
        self.field_index(field).map(|idx| &self.fields[idx])
    }

    /// Position of the designated timestamp field.
    pub fn timestamp_index(&self) -> Option<usize> {
        self.timestamp_index
    }

    /// Designated timestamp field, if this is a reading kind.
    pub fn timestamp_field(&self) -> Option<&FieldDef> {
        self.timestamp_index.map(|idx| &self.fields[idx])
    }

    /// Designated array field, if this is a bucket kind.
    pub fn array_field(&self) -> Option<&FieldDef> {
        self.array_index.map(|idx| &self.fields[idx])
    }

    /// Returns `true` if this kind carries a timestamp.
    pub fn is_reading_kind(&self) -> bool {
        self.timestamp_index.is_some()
    }

    /// Returns `true` if this kind holds an array of readings.
    pub fn is_bucket_kind(&self) -> bool {
        self.array_index.is_some()
    }

    /// Record kind stored in the designated array field.
    pub fn element_kind(&self) -> Option<&str> {
        match self.array_field().map(|f| &f.field_type) {
            Some(FieldType::Array(ElementType::Record(kind))) => Some(kind),
            _ => None,
        }
    }

    /// Returns `true` if both definitions declare the same names and types in
    /// the same order.
    pub fn same_layout(&self, other: &RecordDef) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.name == b.name && a.field_type == b.field_type)
    }
}
