//! Column schema for decoded records
//!
//! A `Schema` is the ordered list of output columns for one run: the frame
//! fields (applied to every job) followed by the fields of the selected
//! group. It is resolved once at startup and shared read-only by the
//! flattener, the column accumulator and the table writer.

use crate::error::SchemaError;
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, SchemaRef};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Native type of an output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[serde(alias = "utf8", alias = "str")]
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    #[serde(alias = "u8")]
    UInt8,
    #[serde(alias = "u16")]
    UInt16,
}

impl ValueType {
    /// Arrow type used to store this column
    pub fn data_type(self) -> DataType {
        match self {
            ValueType::String => DataType::Utf8,
            ValueType::Int32 => DataType::Int32,
            ValueType::Int64 => DataType::Int64,
            ValueType::Float32 => DataType::Float32,
            ValueType::Float64 => DataType::Float64,
            ValueType::UInt8 => DataType::UInt8,
            ValueType::UInt16 => DataType::UInt16,
        }
    }

    /// Name as written in the configuration file
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Int32 => "int32",
            ValueType::Int64 => "int64",
            ValueType::Float32 => "float32",
            ValueType::Float64 => "float64",
            ValueType::UInt8 => "uint8",
            ValueType::UInt16 => "uint16",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured output column
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldSpec {
    /// Output column name
    pub label: String,

    /// Decoder field identifier (e.g. `frame.time_epoch`)
    #[serde(rename = "field")]
    pub source_key: String,

    /// Column type
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

impl FieldSpec {
    pub fn new(label: impl Into<String>, source_key: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            label: label.into(),
            source_key: source_key.into(),
            value_type,
        }
    }
}

/// Ordered output columns: frame segment first, then group segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    frame_len: usize,
}

impl Schema {
    /// Build a schema from its two segments.
    ///
    /// Labels must be unique across both segments.
    pub fn new(frame: Vec<FieldSpec>, group: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let frame_len = frame.len();
        let mut fields = frame;
        fields.extend(group);

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.label.as_str()) {
                return Err(SchemaError::DuplicateLabel(field.label.clone()));
            }
        }

        Ok(Self { fields, frame_len })
    }

    /// All columns in output order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Total column count (F + G)
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of frame columns (F)
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Number of group columns (G)
    pub fn group_len(&self) -> usize {
        self.fields.len() - self.frame_len
    }

    pub fn frame_fields(&self) -> &[FieldSpec] {
        &self.fields[..self.frame_len]
    }

    pub fn group_fields(&self) -> &[FieldSpec] {
        &self.fields[self.frame_len..]
    }

    /// Decoder field identifiers in request order
    pub fn source_keys(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.source_key.as_str()).collect()
    }

    /// Labels of the frame segment, in configured order
    pub fn frame_labels(&self) -> Vec<String> {
        self.frame_fields().iter().map(|f| f.label.clone()).collect()
    }

    /// Arrow schema for the table file. Every column is nullable.
    pub fn arrow_schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .fields
            .iter()
            .map(|f| Field::new(&f.label, f.value_type.data_type(), true))
            .collect();
        Arc::new(ArrowSchema::new(fields))
    }
}
