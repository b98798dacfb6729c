//! Field definitions and type tags.

use std::fmt;

use crate::error::{CacheError, Result};

/// Element type of an array field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementType {
    String,
    Long,
    Int,
    Double,
    Float,
    Bool,
    /// Embedded records of the named record kind
    Record(String),
}

impl ElementType {
    /// Parses an element type token. Unknown tokens name a record kind.
    pub fn parse(token: &str) -> Self {
        match token {
            "string" => ElementType::String,
            "long" => ElementType::Long,
            "int" => ElementType::Int,
            "double" => ElementType::Double,
            "float" => ElementType::Float,
            "bool" => ElementType::Bool,
            other => ElementType::Record(other.to_string()),
        }
    }

    /// Returns the equivalent scalar field type, or `None` for record elements.
    pub fn as_scalar(&self) -> Option<FieldType> {
        match self {
            ElementType::String => Some(FieldType::String),
            ElementType::Long => Some(FieldType::Long),
            ElementType::Int => Some(FieldType::Int),
            ElementType::Double => Some(FieldType::Double),
            ElementType::Float => Some(FieldType::Float),
            ElementType::Bool => Some(FieldType::Bool),
            ElementType::Record(_) => None,
        }
    }

    /// Token used in schema sources and wire descriptors.
    pub fn token(&self) -> &str {
        match self {
            ElementType::String => "string",
            ElementType::Long => "long",
            ElementType::Int => "int",
            ElementType::Double => "double",
            ElementType::Float => "float",
            ElementType::Bool => "bool",
            ElementType::Record(name) => name,
        }
    }
}

/// Declared type of a record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Long,
    Int,
    Double,
    Float,
    Bool,
    Array(ElementType),
}

impl FieldType {
    /// Parses a schema type token plus its optional element type.
    ///
    /// # Arguments
    /// * `token` - Type token (`string`, `long`, `int`, `double`, `float`, `bool`, `array`)
    /// * `element_type` - Element type token, required for `array` and rejected otherwise
    ///
    /// # Returns
    /// `Result<FieldType, CacheError>` with a `Schema` error on malformed input.
    pub fn parse(token: &str, element_type: Option<&str>) -> Result<Self> {
        let field_type = match token {
            "string" => FieldType::String,
            "long" => FieldType::Long,
            "int" => FieldType::Int,
            "double" => FieldType::Double,
            "float" => FieldType::Float,
            "bool" => FieldType::Bool,
            "array" => {
                let element = element_type
                    .filter(|e| !e.is_empty())
                    .ok_or_else(|| CacheError::schema("array field has no element type"))?;
                return Ok(FieldType::Array(ElementType::parse(element)));
            }
            other => {
                return Err(CacheError::schema(format!("unknown field type '{}'", other)));
            }
        };

        if element_type.is_some() {
            return Err(CacheError::schema(format!(
                "element type given for non-array type '{}'",
                token
            )));
        }
        Ok(field_type)
    }

    /// Parses a wire type tag (`long`, `array<double>`, ...).
    pub fn from_tag(tag: &str) -> Result<Self> {
        if let Some(inner) = tag.strip_prefix("array<").and_then(|t| t.strip_suffix('>')) {
            if inner.is_empty() {
                return Err(CacheError::codec(format!("unknown type tag '{}'", tag)));
            }
            return Ok(FieldType::Array(ElementType::parse(inner)));
        }
        FieldType::parse(tag, None)
            .map_err(|_| CacheError::codec(format!("unknown type tag '{}'", tag)))
    }

    /// Wire type tag for this type.
    pub fn tag(&self) -> String {
        match self {
            FieldType::Array(element) => format!("array<{}>", element.token()),
            other => other.token().to_string(),
        }
    }

    fn token(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Long => "long",
            FieldType::Int => "int",
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Array(_) => "array",
        }
    }

    /// Returns `true` for fixed-width and string scalars.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Array(_))
    }

    /// Returns `true` if values of this type can be folded as numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Long | FieldType::Int | FieldType::Double | FieldType::Float
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// One named, typed field of a record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    pub field_type: FieldType,
    /// Zero-based declaration order
    pub order: usize,
}

impl FieldDef {
    /// Creates a new field definition.
    pub fn new(name: impl Into<String>, field_type: FieldType, order: usize) -> Self {
        Self {
            name: name.into(),
            field_type,
            order,
        }
    }
}
