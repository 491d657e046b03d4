//! Typed column builders
//!
//! One `ColumnBuilder` per schema column. Each variant owns the matching
//! Arrow builder and knows how to convert decoder text into its native
//! type.

use crate::error::ParseError;
use crate::schema::ValueType;
use arrow::array::{
    ArrayBuilder, ArrayRef, Float32Builder, Float64Builder, Int32Builder, Int64Builder,
    StringBuilder, UInt16Builder, UInt8Builder,
};
use std::str::FromStr;
use std::sync::Arc;

/// Growable column of one native type
#[derive(Debug)]
pub enum ColumnBuilder {
    String(StringBuilder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    UInt8(UInt8Builder),
    UInt16(UInt16Builder),
}

impl ColumnBuilder {
    /// Create an empty builder sized for `capacity` rows
    pub fn new(value_type: ValueType, capacity: usize) -> Self {
        match value_type {
            ValueType::String => ColumnBuilder::String(StringBuilder::with_capacity(capacity, capacity * 16)),
            ValueType::Int32 => ColumnBuilder::Int32(Int32Builder::with_capacity(capacity)),
            ValueType::Int64 => ColumnBuilder::Int64(Int64Builder::with_capacity(capacity)),
            ValueType::Float32 => ColumnBuilder::Float32(Float32Builder::with_capacity(capacity)),
            ValueType::Float64 => ColumnBuilder::Float64(Float64Builder::with_capacity(capacity)),
            ValueType::UInt8 => ColumnBuilder::UInt8(UInt8Builder::with_capacity(capacity)),
            ValueType::UInt16 => ColumnBuilder::UInt16(UInt16Builder::with_capacity(capacity)),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            ColumnBuilder::String(_) => ValueType::String,
            ColumnBuilder::Int32(_) => ValueType::Int32,
            ColumnBuilder::Int64(_) => ValueType::Int64,
            ColumnBuilder::Float32(_) => ValueType::Float32,
            ColumnBuilder::Float64(_) => ValueType::Float64,
            ColumnBuilder::UInt8(_) => ValueType::UInt8,
            ColumnBuilder::UInt16(_) => ValueType::UInt16,
        }
    }

    /// Append one text value.
    ///
    /// Empty text is an empty string for string columns and null otherwise.
    /// Text that does not convert is appended as null and reported back.
    pub fn append_text(&mut self, text: &str) -> Result<(), ParseError> {
        let parsed = match self {
            ColumnBuilder::String(b) => {
                b.append_value(text);
                true
            }
            ColumnBuilder::Int32(b) => append_parsed(b, text, parse_integer::<i32>),
            ColumnBuilder::Int64(b) => append_parsed(b, text, parse_integer::<i64>),
            ColumnBuilder::Float32(b) => append_parsed(b, text, parse_float::<f32>),
            ColumnBuilder::Float64(b) => append_parsed(b, text, parse_float::<f64>),
            ColumnBuilder::UInt8(b) => append_parsed(b, text, parse_integer::<u8>),
            ColumnBuilder::UInt16(b) => append_parsed(b, text, parse_integer::<u16>),
        };

        if parsed {
            Ok(())
        } else {
            Err(ParseError {
                value_type: self.value_type(),
                text: text.to_string(),
            })
        }
    }

    /// Number of buffered values
    pub fn len(&self) -> usize {
        match self {
            ColumnBuilder::String(b) => b.len(),
            ColumnBuilder::Int32(b) => b.len(),
            ColumnBuilder::Int64(b) => b.len(),
            ColumnBuilder::Float32(b) => b.len(),
            ColumnBuilder::Float64(b) => b.len(),
            ColumnBuilder::UInt8(b) => b.len(),
            ColumnBuilder::UInt16(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the buffered values as an immutable array, leaving the builder
    /// empty and ready for the next batch.
    pub fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::String(b) => Arc::new(b.finish()),
            ColumnBuilder::Int32(b) => Arc::new(b.finish()),
            ColumnBuilder::Int64(b) => Arc::new(b.finish()),
            ColumnBuilder::Float32(b) => Arc::new(b.finish()),
            ColumnBuilder::Float64(b) => Arc::new(b.finish()),
            ColumnBuilder::UInt8(b) => Arc::new(b.finish()),
            ColumnBuilder::UInt16(b) => Arc::new(b.finish()),
        }
    }
}

/// Append `text` to a primitive builder; returns false on a conversion failure
fn append_parsed<T, F>(builder: &mut arrow::array::PrimitiveBuilder<T>, text: &str, parse: F) -> bool
where
    T: arrow::datatypes::ArrowPrimitiveType,
    F: Fn(&str) -> Option<T::Native>,
{
    if text.is_empty() {
        builder.append_null();
        return true;
    }
    match parse(text) {
        Some(v) => {
            builder.append_value(v);
            true
        }
        None => {
            builder.append_null();
            false
        }
    }
}

/// Parse a decimal integer, or a `0x`-prefixed hexadecimal one.
///
/// Out-of-range values are rejected rather than wrapped. Hex digits carry
/// no sign.
pub fn parse_integer<T>(text: &str) -> Option<T>
where
    T: FromStr + TryFrom<u64>,
{
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        return u64::from_str_radix(hex, 16).ok().and_then(|v| T::try_from(v).ok());
    }
    text.parse().ok()
}

pub fn parse_float<T: FromStr>(text: &str) -> Option<T> {
    text.trim().parse().ok()
}
