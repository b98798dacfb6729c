//! Cross-kind validation and record definition assembly.

use std::collections::HashSet;

use crate::error::{CacheError, Result};

use super::field::{ElementType, FieldType};
use super::record_def::RecordDef;
use super::source::{ModelSchema, SchemaFile};

/// Builds and validates every record definition in a schema file.
///
/// # Arguments
/// * `file` - Parsed schema document
///
/// # Returns
/// `Result<Vec<RecordDef>, CacheError>` in declaration order, or the first
/// `Schema` error found. No partial result is returned.
pub(crate) fn build_record_defs(file: &SchemaFile) -> Result<Vec<RecordDef>> {
    if file.models.is_empty() {
        return Err(CacheError::schema("schema declares no record kinds"));
    }

    let mut seen = HashSet::new();
    for model in &file.models {
        if !seen.insert(model.name.as_str()) {
            return Err(CacheError::schema(format!(
                "duplicate record kind '{}'",
                model.name
            )));
        }
    }

    let defs = file
        .models
        .iter()
        .map(build_record_def)
        .collect::<Result<Vec<_>>>()?;

    validate_array_elements(&defs)?;
    Ok(defs)
}

/// Builds one record definition from its source form.
fn build_record_def(model: &ModelSchema) -> Result<RecordDef> {
    let fields = model
        .fields
        .iter()
        .map(|f| {
            FieldType::parse(&f.r#type, f.element_type.as_deref())
                .map(|t| (f.name.clone(), t))
                .map_err(|e| match e {
                    CacheError::Schema(msg) => CacheError::schema(format!(
                        "field '{}' in '{}': {}",
                        f.name, model.name, msg
                    )),
                    other => other,
                })
        })
        .collect::<Result<Vec<_>>>()?;

    RecordDef::new(
        model.name.clone(),
        fields,
        model.timestamp_field.as_deref(),
        model.array_field.as_deref(),
    )
}

/// Checks record-typed array elements.
///
/// Record elements are only allowed in the designated array field of a
/// bucket kind, and must name a reading kind of the same schema.
fn validate_array_elements(defs: &[RecordDef]) -> Result<()> {
    for def in defs {
        for field in def.fields() {
            let FieldType::Array(ElementType::Record(kind)) = &field.field_type else {
                continue;
            };

            let designated = def
                .array_field()
                .map(|a| a.name == field.name)
                .unwrap_or(false);
            if !designated {
                return Err(CacheError::schema(format!(
                    "field '{}' in '{}' embeds records but is not a bucket array field",
                    field.name,
                    def.name()
                )));
            }

            let target = defs.iter().find(|d| d.name() == kind).ok_or_else(|| {
                CacheError::schema(format!(
                    "array field '{}' in '{}' references unknown kind '{}'",
                    field.name,
                    def.name(),
                    kind
                ))
            })?;
            if !target.is_reading_kind() {
                return Err(CacheError::schema(format!(
                    "array field '{}' in '{}' references '{}', which has no timestamp field",
                    field.name,
                    def.name(),
                    kind
                )));
            }
        }

        if def.is_bucket_kind() && def.element_kind().is_none() {
            return Err(CacheError::schema(format!(
                "bucket kind '{}' must hold an array of a reading kind",
                def.name()
            )));
        }
    }
    Ok(())
}
