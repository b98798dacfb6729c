//! Binary codec for readings and buckets.
//!
//! Records are encoded field by field in declaration order with no tags.
//! Buckets embed the name and type of every reading field so a reader can
//! decode payloads written under a drifted schema. Standalone readings and
//! buckets are zstd-compressed as a whole.

mod wire;

use std::sync::Arc;

use crate::bucket::Bucket;
use crate::error::{CacheError, Result};
use crate::record::{Record, Value};
use crate::schema::{FieldType, RecordDef, SchemaSet};

pub use wire::{WireReader, WireWriter};

/// Default zstd level for stored payloads.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 6;

/// Compresses an encoded payload.
pub fn compress(payload: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::encode_all(payload, level)
        .map_err(|e| CacheError::codec(format!("compression failed: {}", e)))
}

/// Decompresses a stored payload.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(|e| CacheError::codec(format!("decompression failed: {}", e)))
}

/// Writes a record's values in declaration order.
pub fn write_record(writer: &mut WireWriter, record: &Record) -> Result<()> {
    for value in record.values() {
        writer.write_value(value)?;
    }
    Ok(())
}

/// Reads one value per field of `def`.
pub fn read_values(reader: &mut WireReader<'_>, def: &RecordDef) -> Result<Vec<Value>> {
    def.fields()
        .iter()
        .map(|f| reader.read_value(&f.field_type))
        .collect()
}

/// Encodes a record without compression.
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut writer = WireWriter::new();
    write_record(&mut writer, record)?;
    Ok(writer.into_bytes())
}

/// Decodes an uncompressed record of a known kind.
///
/// # Arguments
/// * `bytes` - Output of [`encode_record`]
/// * `def` - Reading kind the bytes were written with
///
/// # Returns
/// `Result<Record, CacheError>` with `CodecError` on truncation or trailing
/// bytes.
pub fn decode_record(bytes: &[u8], def: &Arc<RecordDef>) -> Result<Record> {
    let mut reader = WireReader::new(bytes);
    let values = read_values(&mut reader, def)?;
    reader.finish()?;
    Record::from_ordered(Arc::clone(def), values)
}

/// Encodes a standalone reading: kind name then values, compressed.
pub fn encode_reading(record: &Record, level: i32) -> Result<Vec<u8>> {
    let mut writer = WireWriter::new();
    writer.write_string(record.kind())?;
    write_record(&mut writer, record)?;
    compress(&writer.into_bytes(), level)
}

/// Decodes a standalone reading, resolving its kind through the schema.
///
/// Unlike buckets, standalone readings carry no field descriptors and rely
/// on both sides sharing the same schema.
pub fn decode_reading(data: &[u8], schema: &SchemaSet) -> Result<Record> {
    let payload = decompress(data)?;
    let mut reader = WireReader::new(&payload);
    let kind = reader.read_string()?;
    let def = schema.record_def(&kind)?;
    let values = read_values(&mut reader, &def)?;
    reader.finish()?;
    Record::from_ordered(def, values)
}

/// Fixed bucket header, readable without decoding any reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketHeader {
    pub owner_id: String,
    pub day: i64,
    pub kind: String,
    pub reading_count: usize,
    pub created_at: i64,
    pub last_access_at: i64,
}

impl BucketHeader {
    fn read(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            owner_id: reader.read_string()?,
            day: reader.read_i64()?,
            kind: reader.read_string()?,
            reading_count: reader.read_count()?,
            created_at: reader.read_i64()?,
            last_access_at: reader.read_i64()?,
        })
    }

    /// Returns `true` when both the age and the idle threshold are exceeded.
    pub fn is_evictable(&self, now: i64, retention_days: u32, idle_hours: u32) -> bool {
        crate::bucket::is_stale(
            self.created_at,
            self.last_access_at,
            now,
            retention_days,
            idle_hours,
        )
    }
}

/// Encodes a bucket in the stored layout and compresses it.
///
/// Only the live readings are written; callers trim the bucket first so the
/// stored capacity matches the count.
///
/// # Arguments
/// * `bucket` - Bucket to encode
/// * `level` - zstd compression level
///
/// # Returns
/// `Result<Vec<u8>, CacheError>` with the compressed payload.
pub fn encode_bucket(bucket: &Bucket, level: i32) -> Result<Vec<u8>> {
    let def = bucket.reading_def();
    let mut writer = WireWriter::with_capacity(64 + bucket.len() * def.field_count() * 8);

    writer.write_string(bucket.owner_id())?;
    writer.write_i64(bucket.day());
    writer.write_string(bucket.kind())?;
    writer.write_count(bucket.len())?;
    writer.write_i64(bucket.created_at());
    writer.write_i64(bucket.last_access_at());

    writer.write_string(def.name())?;
    writer.write_count(def.field_count())?;
    for field in def.fields() {
        writer.write_string(&field.name)?;
        writer.write_string(&field.field_type.tag())?;
    }

    for reading in bucket.readings() {
        write_record(&mut writer, reading)?;
    }

    compress(&writer.into_bytes(), level)
}

/// Decodes only the fixed header of a stored bucket.
pub fn decode_bucket_header(data: &[u8]) -> Result<BucketHeader> {
    let payload = decompress(data)?;
    BucketHeader::read(&mut WireReader::new(&payload))
}

/// Decodes a stored bucket against the local schema.
///
/// The embedded field descriptors drive decoding. Readings are then mapped
/// by field name onto the local definition of the embedded kind: fields the
/// writer lacked take their zero value, fields only the writer had are
/// dropped.
///
/// # Arguments
/// * `data` - Compressed payload from [`encode_bucket`]
/// * `schema` - Local schema set
///
/// # Returns
/// `Result<Bucket, CacheError>`: `CodecError` for corrupt input, for a
/// bucket kind the local schema does not pair with the embedded reading
/// kind, for a shared field whose type drifted, for a reading outside the
/// header's day, or when the writer had no local timestamp field. No partial
/// bucket is ever returned.
pub fn decode_bucket(data: &[u8], schema: &SchemaSet) -> Result<Bucket> {
    let payload = decompress(data)?;
    let mut reader = WireReader::new(&payload);
    let header = BucketHeader::read(&mut reader)?;

    let embedded_kind = reader.read_string()?;
    let field_count = reader.read_count()?;
    let mut descriptors = Vec::with_capacity(field_count.min(reader.remaining()));
    for _ in 0..field_count {
        let name = reader.read_string()?;
        let tag = reader.read_string()?;
        descriptors.push((name, FieldType::from_tag(&tag)?));
    }
    let writer_def = RecordDef::from_descriptors(embedded_kind.as_str(), descriptors)?;

    let local_def = schema.record_def(&embedded_kind).map_err(|_| {
        CacheError::codec(format!(
            "embedded kind '{}' is not in the local schema",
            embedded_kind
        ))
    })?;
    let bucket_def = schema.record_def(&header.kind).map_err(|_| {
        CacheError::codec(format!(
            "bucket kind '{}' is not in the local schema",
            header.kind
        ))
    })?;
    if bucket_def.element_kind() != Some(local_def.name()) {
        return Err(CacheError::codec(format!(
            "bucket kind '{}' does not hold '{}' readings",
            header.kind, embedded_kind
        )));
    }
    let mapping = FieldMapping::new(&writer_def, &local_def)?;

    let mut readings = Vec::with_capacity(header.reading_count.min(reader.remaining()));
    for _ in 0..header.reading_count {
        let values = read_values(&mut reader, &writer_def)?;
        readings.push(Record::from_ordered(
            Arc::clone(&local_def),
            mapping.apply(values),
        )?);
    }
    reader.finish()?;

    Bucket::from_parts(
        header.owner_id,
        header.day,
        header.kind,
        local_def,
        readings,
        header.created_at,
        header.last_access_at,
    )
}

/// Positions of local fields within the writer's layout.
#[derive(Debug)]
struct FieldMapping {
    /// For each local field, `Some(writer position)` or `None` for a default
    sources: Vec<Option<usize>>,
    defaults: Vec<Value>,
    identity: bool,
}

impl FieldMapping {
    fn new(writer: &RecordDef, local: &RecordDef) -> Result<Self> {
        let ts_field = local.timestamp_field().ok_or_else(|| {
            CacheError::codec(format!("embedded kind '{}' is not a reading kind", local.name()))
        })?;

        let mut sources = Vec::with_capacity(local.field_count());
        let mut defaults = Vec::with_capacity(local.field_count());
        for field in local.fields() {
            let source = match writer.field(&field.name) {
                Ok(w) if w.field_type == field.field_type => Some(w.order),
                Ok(w) => {
                    return Err(CacheError::codec(format!(
                        "field '{}' of '{}' drifted from {} to {}",
                        field.name,
                        local.name(),
                        w.field_type,
                        field.field_type
                    )));
                }
                Err(_) if field.name == ts_field.name => {
                    return Err(CacheError::codec(format!(
                        "embedded '{}' readings have no timestamp field '{}'",
                        local.name(),
                        field.name
                    )));
                }
                Err(_) => None,
            };
            sources.push(source);
            defaults.push(Value::default_for(&field.field_type));
        }

        let identity = writer.same_layout(local);
        if !identity {
            tracing::debug!(
                "Mapping drifted {} layout: {} writer fields onto {} local fields",
                local.name(),
                writer.field_count(),
                local.field_count()
            );
        }

        Ok(Self {
            sources,
            defaults,
            identity,
        })
    }

    fn apply(&self, values: Vec<Value>) -> Vec<Value> {
        if self.identity {
            return values;
        }
        self.sources
            .iter()
            .zip(self.defaults.iter())
            .map(|(source, default)| match source {
                Some(i) => values[*i].clone(),
                None => default.clone(),
            })
            .collect()
    }
}
