//! Typed field values.

use serde::Serialize;

use crate::error::{CacheError, Result};
use crate::schema::{ElementType, FieldType};

/// One typed field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Long(i64),
    Int(i32),
    Double(f64),
    Float(f32),
    Bool(bool),
    Array(Vec<Value>),
}

impl Value {
    /// Zero value of a field type, used for fields an ingest did not supply.
    pub fn default_for(field_type: &FieldType) -> Value {
        match field_type {
            FieldType::String => Value::String(String::new()),
            FieldType::Long => Value::Long(0),
            FieldType::Int => Value::Int(0),
            FieldType::Double => Value::Double(0.0),
            FieldType::Float => Value::Float(0.0),
            FieldType::Bool => Value::Bool(false),
            FieldType::Array(_) => Value::Array(Vec::new()),
        }
    }

    /// Name of the runtime type, in schema token form.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Long(_) => "long",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Array(_) => "array",
        }
    }

    /// Returns `true` if this value may be stored in a field of `field_type`.
    pub fn matches(&self, field_type: &FieldType) -> bool {
        match (self, field_type) {
            (Value::String(_), FieldType::String)
            | (Value::Long(_), FieldType::Long)
            | (Value::Int(_), FieldType::Int)
            | (Value::Double(_), FieldType::Double)
            | (Value::Float(_), FieldType::Float)
            | (Value::Bool(_), FieldType::Bool) => true,
            (Value::Array(items), FieldType::Array(element)) => match element.as_scalar() {
                Some(scalar) => items.iter().all(|v| v.matches(&scalar)),
                None => false,
            },
            _ => false,
        }
    }

    /// Numeric view used by aggregations.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Float(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer view of `long` and `int` values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            Value::Int(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// String view of `string` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a JSON value to the declared field type.
    ///
    /// Numbers are coerced to the declared width; lossy coercions (a
    /// fractional number into `long`, an out-of-range number into `int` or
    /// `float`) are rejected.
    ///
    /// # Arguments
    /// * `json` - Incoming JSON value
    /// * `field_type` - Declared type of the target field
    /// * `field` - Field name, for error reporting
    ///
    /// # Returns
    /// `Result<Value, CacheError>` with `TypeMismatch` when no coercion applies.
    pub fn from_json(
        json: &serde_json::Value,
        field_type: &FieldType,
        field: &str,
    ) -> Result<Value> {
        let mismatch = || CacheError::TypeMismatch {
            field: field.to_string(),
            expected: field_type.tag(),
            got: json_type_name(json).to_string(),
        };

        let value = match field_type {
            FieldType::String => json.as_str().map(|s| Value::String(s.to_string())),
            FieldType::Long => json.as_i64().map(Value::Long),
            FieldType::Int => json
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Int),
            FieldType::Double => json.as_f64().map(Value::Double),
            FieldType::Float => json
                .as_f64()
                .map(|v| v as f32)
                .filter(|v| v.is_finite())
                .map(Value::Float),
            FieldType::Bool => json.as_bool().map(Value::Bool),
            FieldType::Array(element) => {
                let scalar = match element {
                    ElementType::Record(_) => return Err(mismatch()),
                    other => other.as_scalar().ok_or_else(mismatch)?,
                };
                let items = json.as_array().ok_or_else(mismatch)?;
                let values = items
                    .iter()
                    .map(|item| Value::from_json(item, &scalar, field))
                    .collect::<Result<Vec<_>>>()?;
                Some(Value::Array(values))
            }
        };
        value.ok_or_else(mismatch)
    }

    /// Converts this value to JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Long(v) => serde_json::Value::from(*v),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Double(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Value::from(*v as f64),
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(n) if n.is_f64() => "double",
        serde_json::Value::Number(_) => "long",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches() {
        assert!(Value::Long(1).matches(&FieldType::Long));
        assert!(!Value::Int(1).matches(&FieldType::Long));
        assert!(Value::from(vec![1.0f64, 2.0]).matches(&FieldType::Array(ElementType::Double)));
        assert!(!Value::from(vec![1i32]).matches(&FieldType::Array(ElementType::Double)));
        assert!(!Value::Array(vec![])
            .matches(&FieldType::Array(ElementType::Record("MeterReading".into()))));
    }

    #[test]
    fn test_from_json_coercion() {
        assert_eq!(
            Value::from_json(&json!(5), &FieldType::Double, "power").unwrap(),
            Value::Double(5.0)
        );
        assert_eq!(
            Value::from_json(&json!(7), &FieldType::Int, "seq").unwrap(),
            Value::Int(7)
        );
        assert_eq!(
            Value::from_json(&json!([1, 2.5]), &FieldType::Array(ElementType::Double), "p")
                .unwrap(),
            Value::Array(vec![Value::Double(1.0), Value::Double(2.5)])
        );
    }

    #[test]
    fn test_from_json_rejects_lossy() {
        assert!(matches!(
            Value::from_json(&json!(1.5), &FieldType::Long, "timestamp"),
            Err(CacheError::TypeMismatch { .. })
        ));
        assert!(Value::from_json(&json!(i64::MAX), &FieldType::Int, "seq").is_err());
        assert!(Value::from_json(&json!("100"), &FieldType::Double, "power").is_err());
        assert!(matches!(
            Value::from_json(&json!(1e40), &FieldType::Float, "voltage"),
            Err(CacheError::TypeMismatch { .. })
        ));
        assert_eq!(
            Value::from_json(&json!(230.5), &FieldType::Float, "voltage").unwrap(),
            Value::Float(230.5)
        );
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::Bool(true).as_f64(), None);
    }
}
