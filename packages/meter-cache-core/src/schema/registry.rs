//! Schema set loading, content hashing and the process-wide registry.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};

use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

use super::record_def::RecordDef;
use super::source::{SchemaFile, SchemaSource};
use super::validation::build_record_defs;

/// SHA-256 digest of raw schema source bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaHash([u8; 32]);

impl SchemaHash {
    /// Hashes raw schema bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SchemaHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SchemaHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaHash({})", self.to_hex())
    }
}

impl FromStr for SchemaHash {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| CacheError::InvalidArgument(format!("bad schema hash '{}': {}", s, e)))?;
        let digest: [u8; 32] = bytes.try_into().map_err(|_| {
            CacheError::InvalidArgument(format!("schema hash '{}' is not 32 bytes", s))
        })?;
        Ok(Self(digest))
    }
}

/// Computes the schema hash of a source.
pub fn schema_hash(source: &SchemaSource) -> Result<SchemaHash> {
    Ok(SchemaHash::of(&source.read()?))
}

/// Fails with `SchemaMismatch` when two processes disagree on the schema.
///
/// The bucket codec has no per-field tags for skipped or added fields, so a
/// peer writing with a different layout must not be served.
pub fn validate_peer_hash(local: &SchemaHash, remote: &SchemaHash) -> Result<()> {
    if local != remote {
        return Err(CacheError::SchemaMismatch {
            local: local.to_hex(),
            remote: remote.to_hex(),
        });
    }
    Ok(())
}

/// All record kinds loaded from one schema source.
#[derive(Debug)]
pub struct SchemaSet {
    defs: Vec<Arc<RecordDef>>,
    by_name: HashMap<String, usize>,
    hash: SchemaHash,
}

impl SchemaSet {
    /// Parses and validates raw schema bytes.
    ///
    /// # Arguments
    /// * `bytes` - Raw JSON schema source
    ///
    /// # Returns
    /// `Result<SchemaSet, CacheError>`; any defect is a `Schema` error and no
    /// partial set is produced.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let file = SchemaFile::parse(bytes)?;
        let defs = build_record_defs(&file)?;

        let by_name = defs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name().to_string(), i))
            .collect();

        Ok(Self {
            defs: defs.into_iter().map(Arc::new).collect(),
            by_name,
            hash: SchemaHash::of(bytes),
        })
    }

    /// Reads and parses a schema source.
    pub fn load(source: &SchemaSource) -> Result<Self> {
        Self::parse(&source.read()?)
    }

    /// Looks up a record kind by name.
    pub fn record_def(&self, name: &str) -> Result<Arc<RecordDef>> {
        self.by_name
            .get(name)
            .map(|&i| Arc::clone(&self.defs[i]))
            .ok_or_else(|| CacheError::UnknownModel {
                model: name.to_string(),
            })
    }

    /// Record kind names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.defs.iter().map(|d| d.name().to_string()).collect()
    }

    /// All record kinds in declaration order.
    pub fn record_defs(&self) -> &[Arc<RecordDef>] {
        &self.defs
    }

    /// Content hash of the source this set was loaded from.
    pub fn hash(&self) -> SchemaHash {
        self.hash
    }

    /// Kinds that carry a timestamp field.
    pub fn reading_kinds(&self) -> Vec<Arc<RecordDef>> {
        self.defs
            .iter()
            .filter(|d| d.is_reading_kind())
            .cloned()
            .collect()
    }

    /// Kinds that hold an array of readings.
    pub fn bucket_kinds(&self) -> Vec<Arc<RecordDef>> {
        self.defs
            .iter()
            .filter(|d| d.is_bucket_kind())
            .cloned()
            .collect()
    }

    /// First bucket kind whose array holds the given reading kind.
    pub fn bucket_kind_for(&self, reading_kind: &str) -> Result<Arc<RecordDef>> {
        self.defs
            .iter()
            .find(|d| d.element_kind() == Some(reading_kind))
            .cloned()
            .ok_or_else(|| CacheError::UnknownModel {
                model: format!("bucket of {}", reading_kind),
            })
    }
}

/// Load-once registry of record kinds.
///
/// Constructed explicitly by the process entry point and shared by reference
/// (usually behind an `Arc`). The first `load` parses the source; concurrent
/// and later calls observe that same set.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    set: OnceLock<Arc<SchemaSet>>,
    init: Mutex<()>,
}

impl SchemaRegistry {
    /// Creates an empty, unloaded registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry and loads it immediately.
    pub fn from_source(source: &SchemaSource) -> Result<Self> {
        let registry = Self::new();
        registry.load(source)?;
        Ok(registry)
    }

    /// Loads the schema once.
    ///
    /// Exactly one caller parses the source; the others wait on the init
    /// lock and then observe the loaded set. Calling `load` on an already
    /// loaded registry is a no-op that returns the existing set, whatever
    /// `source` is.
    ///
    /// # Arguments
    /// * `source` - Schema source to load on first call
    ///
    /// # Returns
    /// `Result<Arc<SchemaSet>, CacheError>`; a failed load leaves the
    /// registry unloaded.
    pub fn load(&self, source: &SchemaSource) -> Result<Arc<SchemaSet>> {
        if let Some(set) = self.set.get() {
            return Ok(Arc::clone(set));
        }

        let _guard = self.init.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(set) = self.set.get() {
            return Ok(Arc::clone(set));
        }

        let set = Arc::new(SchemaSet::load(source)?);
        tracing::info!(
            "Loaded schema {} with {} record kinds: {:?}",
            set.hash(),
            set.names().len(),
            set.names()
        );
        let _ = self.set.set(Arc::clone(&set));
        Ok(set)
    }

    /// Returns `true` once a schema has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.set.get().is_some()
    }

    /// The loaded schema set.
    pub fn schema_set(&self) -> Result<Arc<SchemaSet>> {
        self.set
            .get()
            .cloned()
            .ok_or_else(|| CacheError::UnknownModel {
                model: "<schema not loaded>".to_string(),
            })
    }

    /// Looks up a record kind by name.
    pub fn record_def(&self, name: &str) -> Result<Arc<RecordDef>> {
        match self.set.get() {
            Some(set) => set.record_def(name),
            None => Err(CacheError::UnknownModel {
                model: name.to_string(),
            }),
        }
    }

    /// Record kind names in declaration order.
    pub fn names(&self) -> Result<Vec<String>> {
        self.schema_set().map(|s| s.names())
    }

    /// Hash of the loaded schema source.
    pub fn hash(&self) -> Result<SchemaHash> {
        self.schema_set().map(|s| s.hash())
    }

    /// Compares the loaded schema against a peer's hash.
    pub fn validate_peer(&self, remote: &SchemaHash) -> Result<()> {
        validate_peer_hash(&self.hash()?, remote)
    }
}
