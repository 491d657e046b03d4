//! Record flattening
//!
//! The decoder prints one line per decoded record, with one `;`-separated
//! positional field per requested identifier. A field that occurs several
//! times inside one record (e.g. several plots in one ASTERIX data block)
//! is printed as a `,`-separated list of sub-values.
//!
//! Flattening turns such a line into aligned rows:
//!
//! ```text
//! TIMESTAMP      ; ALT          ; SPEED
//! 1690000000.1   ; 120.5,121.0  ; 300
//!
//!   row 0: ["1690000000.1", "120.5", "300"]
//!   row 1: ["1690000000.1", "121.0", ""   ]
//! ```
//!
//! Frame fields are scalar: their first sub-value is copied into every row.
//! The row count is the largest sub-value count among the group fields, and
//! a line with no group content yields no rows at all.

use crate::schema::Schema;
use std::ops::Deref;

/// Positional field separator
pub const FIELD_SEPARATOR: char = ';';

/// Sub-value (occurrence) separator
pub const OCCURRENCE_SEPARATOR: char = ',';

/// One output row, positionally aligned to the schema.
///
/// Values borrow from the decoded line; an absent value is `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedRow<'a>(Vec<&'a str>);

impl<'a> FlattenedRow<'a> {
    pub fn values(&self) -> &[&'a str] {
        &self.0
    }
}

impl<'a> Deref for FlattenedRow<'a> {
    type Target = [&'a str];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Rows produced from one decoded line, plus how well the line fit the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flattened<'a> {
    pub rows: Vec<FlattenedRow<'a>>,

    /// Positional fields actually present on the line
    pub field_count: usize,
}

impl Flattened<'_> {
    /// Fewer positional fields than the schema expects
    pub fn is_short(&self, schema_len: usize) -> bool {
        self.field_count < schema_len
    }

    /// More positional fields than the schema expects (extras are ignored)
    pub fn is_long(&self, schema_len: usize) -> bool {
        self.field_count > schema_len
    }
}

/// Stateless line flattener for one schema
#[derive(Debug, Clone, Copy)]
pub struct Flattener {
    frame_len: usize,
    group_len: usize,
}

impl Flattener {
    pub fn new(schema: &Schema) -> Self {
        Self {
            frame_len: schema.frame_len(),
            group_len: schema.group_len(),
        }
    }

    /// Row width (F + G)
    pub fn width(&self) -> usize {
        self.frame_len + self.group_len
    }

    /// Flatten one decoded line.
    ///
    /// Missing trailing positional fields are treated as empty; extra
    /// trailing fields are ignored. Never fails.
    pub fn flatten<'a>(&self, line: &'a str) -> Flattened<'a> {
        let line = line.trim_end_matches(['\r', '\n']);
        let raw: Vec<&'a str> = line.split(FIELD_SEPARATOR).collect();
        let field_count = raw.len();

        let frame: Vec<&'a str> = (0..self.frame_len)
            .map(|i| {
                raw.get(i)
                    .and_then(|field| split_occurrences(field).into_iter().next())
                    .unwrap_or("")
            })
            .collect();

        let group: Vec<Vec<&'a str>> = (0..self.group_len)
            .map(|j| {
                raw.get(self.frame_len + j)
                    .map(|field| split_occurrences(field))
                    .unwrap_or_default()
            })
            .collect();

        let max = group.iter().map(Vec::len).max().unwrap_or(0);

        let rows = (0..max)
            .map(|i| {
                let mut values = Vec::with_capacity(self.width());
                values.extend_from_slice(&frame);
                values.extend(group.iter().map(|subs| subs.get(i).copied().unwrap_or("")));
                FlattenedRow(values)
            })
            .collect();

        Flattened { rows, field_count }
    }
}

/// Split one positional field into trimmed sub-values.
///
/// A field that is empty after trimming has no sub-values; otherwise every
/// `,`-separated piece counts, including empty interior ones.
fn split_occurrences(field: &str) -> Vec<&str> {
    let field = field.trim();
    if field.is_empty() {
        return Vec::new();
    }
    field.split(OCCURRENCE_SEPARATOR).map(str::trim).collect()
}
