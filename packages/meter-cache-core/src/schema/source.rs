//! Schema source file format.

use std::borrow::Cow;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Supported schema source version.
pub const SCHEMA_VERSION: u32 = 1;

/// Where a schema is read from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// JSON file on disk
    Path(PathBuf),
    /// Raw JSON bytes already in memory
    Bytes(Vec<u8>),
}

impl SchemaSource {
    /// Reads the raw source bytes.
    ///
    /// # Returns
    /// `Result<Cow<[u8]>, CacheError>`; an unreadable file is a `Schema` error.
    pub fn read(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            SchemaSource::Path(path) => fs::read(path).map(Cow::Owned).map_err(|e| {
                CacheError::schema(format!("failed to read {}: {}", path.display(), e))
            }),
            SchemaSource::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
        }
    }
}

impl From<PathBuf> for SchemaSource {
    fn from(path: PathBuf) -> Self {
        SchemaSource::Path(path)
    }
}

impl From<&str> for SchemaSource {
    fn from(json: &str) -> Self {
        SchemaSource::Bytes(json.as_bytes().to_vec())
    }
}

/// Top-level schema document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    /// Schema format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Record kinds in declaration order
    pub models: Vec<ModelSchema>,
}

/// One record kind as written in the source.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSchema {
    /// Record kind name
    pub name: String,
    /// Designated timestamp field (reading kinds)
    #[serde(default)]
    pub timestamp_field: Option<String>,
    /// Designated array field (bucket kinds)
    #[serde(default)]
    pub array_field: Option<String>,
    /// Ordered field list
    pub fields: Vec<FieldSchema>,
}

/// One field as written in the source.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSchema {
    /// Field name
    pub name: String,
    /// Type token
    pub r#type: String,
    /// Element type token for arrays
    #[serde(default)]
    pub element_type: Option<String>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl SchemaFile {
    /// Parses raw source bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(CacheError::schema("schema source is empty"));
        }
        let file: SchemaFile = serde_json::from_slice(bytes)
            .map_err(|e| CacheError::schema(format!("failed to parse schema: {}", e)))?;
        if file.version != SCHEMA_VERSION {
            return Err(CacheError::schema(format!(
                "unsupported schema version {}",
                file.version
            )));
        }
        Ok(file)
    }
}
