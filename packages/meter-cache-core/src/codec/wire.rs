//! Little-endian primitive encoding.
//!
//! Strings are a `u32` byte length followed by UTF-8 bytes. Arrays are an
//! `i32` element count followed by the elements. Booleans are one byte,
//! `0` or `1`.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CacheError, Result};
use crate::record::Value;
use crate::schema::FieldType;

/// Append-only encoder.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.put_f64_le(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.put_f32_le(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, v: &str) -> Result<()> {
        let len = u32::try_from(v.len())
            .map_err(|_| CacheError::codec(format!("string of {} bytes too long", v.len())))?;
        self.buf.put_u32_le(len);
        self.buf.put_slice(v.as_bytes());
        Ok(())
    }

    /// Writes an element or reading count.
    pub fn write_count(&mut self, count: usize) -> Result<()> {
        let count = i32::try_from(count)
            .map_err(|_| CacheError::codec(format!("count {} exceeds i32", count)))?;
        self.write_i32(count);
        Ok(())
    }

    /// Writes one value in the encoding of its own type.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::String(s) => self.write_string(s)?,
            Value::Long(v) => self.write_i64(*v),
            Value::Int(v) => self.write_i32(*v),
            Value::Double(v) => self.write_f64(*v),
            Value::Float(v) => self.write_f32(*v),
            Value::Bool(v) => self.write_bool(*v),
            Value::Array(items) => {
                self.write_count(items.len())?;
                for item in items {
                    self.write_value(item)?;
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Bounds-checked decoder over a byte slice.
///
/// Every read fails with `CodecError` instead of panicking when the input
/// ends early.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(CacheError::codec(format!(
                "unexpected end of stream reading {} ({} of {} bytes left)",
                what,
                self.buf.remaining(),
                n
            )));
        }
        Ok(())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.need(8, "long")?;
        Ok(self.buf.get_i64_le())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.need(4, "int")?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.need(8, "double")?;
        Ok(self.buf.get_f64_le())
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.need(4, "float")?;
        Ok(self.buf.get_f32_le())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.need(1, "bool")?;
        match self.buf.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CacheError::codec(format!("invalid bool byte {}", other))),
        }
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.need(4, "string length")?;
        let len = self.buf.get_u32_le() as usize;
        self.need(len, "string")?;
        let (head, tail) = self.buf.split_at(len);
        let s = std::str::from_utf8(head)
            .map_err(|e| CacheError::codec(format!("invalid UTF-8 string: {}", e)))?
            .to_string();
        self.buf = tail;
        Ok(s)
    }

    /// Reads an element or reading count; negative counts are corrupt.
    pub fn read_count(&mut self) -> Result<usize> {
        let count = self.read_i32()?;
        usize::try_from(count).map_err(|_| CacheError::codec(format!("negative count {}", count)))
    }

    /// Reads one value of a declared field type.
    pub fn read_value(&mut self, field_type: &FieldType) -> Result<Value> {
        let value = match field_type {
            FieldType::String => Value::String(self.read_string()?),
            FieldType::Long => Value::Long(self.read_i64()?),
            FieldType::Int => Value::Int(self.read_i32()?),
            FieldType::Double => Value::Double(self.read_f64()?),
            FieldType::Float => Value::Float(self.read_f32()?),
            FieldType::Bool => Value::Bool(self.read_bool()?),
            FieldType::Array(element) => {
                let scalar = element.as_scalar().ok_or_else(|| {
                    CacheError::codec(format!(
                        "record elements of '{}' cannot be nested in a reading",
                        element.token()
                    ))
                })?;
                let count = self.read_count()?;
                let mut items = Vec::with_capacity(count.min(self.buf.remaining()));
                for _ in 0..count {
                    items.push(self.read_value(&scalar)?);
                }
                Value::Array(items)
            }
        };
        Ok(value)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Fails if any input is left over.
    pub fn finish(self) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(CacheError::codec(format!(
                "{} trailing bytes after payload",
                self.buf.len()
            )));
        }
        Ok(())
    }
}
