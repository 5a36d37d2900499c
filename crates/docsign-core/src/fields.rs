//! Field content model
//!
//! Persisted coordinate fields carry a `type` tag and a string `value`. At the
//! deserialization boundary they are classified once into [`FieldContent`],
//! a sum type with one variant per field kind, so rendering never sniffs the
//! shape of a string again.

use serde::{Deserialize, Serialize};
use shared_types::{CoordinateField, FieldType, TableValue};
use tracing::{debug, warn};

use crate::capture::codec::is_image_data;

/// Tables larger than this in either dimension are treated as malformed
pub const MAX_TABLE_DIMENSION: usize = 100;

/// Which participant a signature-variant field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureRole {
    Editor,
    Signer,
    Reviewer,
}

/// A parsed table value
#[derive(Debug, Clone, PartialEq)]
pub struct TableGrid {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<String>>,
    column_widths: Option<Vec<f64>>,
}

impl TableGrid {
    /// Build a grid, dropping `column_widths` unless it has one fraction in
    /// `(0, 1]` per column. Fractions need not sum to 1.
    pub fn new(
        rows: usize,
        cols: usize,
        cells: Vec<Vec<String>>,
        column_widths: Option<Vec<f64>>,
    ) -> Option<Self> {
        if rows > MAX_TABLE_DIMENSION || cols > MAX_TABLE_DIMENSION {
            return None;
        }
        let column_widths = column_widths.filter(|widths| {
            widths.len() == cols && widths.iter().all(|w| w.is_finite() && *w > 0.0 && *w <= 1.0)
        });
        Some(Self {
            rows,
            cols,
            cells,
            column_widths,
        })
    }

    /// Build a grid from an explicit table descriptor
    pub fn from_descriptor(value: &TableValue) -> Option<Self> {
        Self::new(
            value.rows,
            value.cols,
            value.cells.clone(),
            value.column_widths.clone(),
        )
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn column_widths(&self) -> Option<&[f64]> {
        self.column_widths.as_deref()
    }

    /// Text of a cell; empty for indices beyond the parsed cells
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Horizontal `(offset, width)` of every column inside a box of `total_width`
    pub fn column_spans(&self, total_width: f64) -> Vec<(f64, f64)> {
        if self.cols == 0 {
            return Vec::new();
        }
        let uniform = 1.0 / self.cols as f64;
        let mut offset = 0.0;
        (0..self.cols)
            .map(|i| {
                let fraction = self
                    .column_widths
                    .as_ref()
                    .map(|w| w[i])
                    .unwrap_or(uniform);
                let width = fraction * total_width;
                let span = (offset, width);
                offset += width;
                span
            })
            .collect()
    }

    /// Serialize back to the persisted `{rows, cols, cells, columnWidths?}` shape
    pub fn to_value_string(&self) -> String {
        let value = TableValue {
            rows: self.rows,
            cols: self.cols,
            cells: self.cells.clone(),
            column_widths: self.column_widths.clone(),
        };
        serde_json::to_string(&value).unwrap_or_default()
    }
}

/// Lenient wire shape: cells may hold numbers, booleans, or nulls
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTable {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    column_widths: Option<Vec<f64>>,
}

/// Parse a table out of a field value. Never fails loudly: anything that is
/// not a `{rows, cols, cells}` object yields `None`.
pub fn parse_table(value: &str) -> Option<TableGrid> {
    let trimmed = value.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let raw: RawTable = match serde_json::from_str(trimmed) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "field value is not a table");
            return None;
        }
    };
    let cells = raw
        .cells
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect();
    TableGrid::new(raw.rows, raw.cols, cells, raw.column_widths)
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Content of a coordinate field, one variant per kind
#[derive(Debug, Clone, PartialEq)]
pub enum FieldContent {
    Plain {
        value: String,
        label: String,
        required: bool,
    },
    Table(TableGrid),
    Signature {
        role: SignatureRole,
        /// Present only when the value is a non-empty image-data string
        image: Option<String>,
        assignee_email: Option<String>,
        assignee_name: Option<String>,
    },
}

impl FieldContent {
    /// Classify a persisted field
    pub fn from_field(field: &CoordinateField) -> Self {
        let signature_role = match field.field_type {
            FieldType::EditorSignature => Some(SignatureRole::Editor),
            FieldType::SignerSignature => Some(SignatureRole::Signer),
            FieldType::ReviewerSignature => Some(SignatureRole::Reviewer),
            _ => None,
        };

        if let Some(role) = signature_role {
            let value = field.value.trim();
            let image = if value.is_empty() {
                None
            } else if is_image_data(value) {
                Some(value.to_string())
            } else {
                warn!(field_id = %field.id, "signature value is not image data, showing as unsigned");
                None
            };
            return FieldContent::Signature {
                role,
                image,
                assignee_email: field.signer_email.clone(),
                assignee_name: field.signer_name.clone(),
            };
        }

        if let Some(descriptor) = &field.table {
            if let Some(grid) = TableGrid::from_descriptor(descriptor) {
                return FieldContent::Table(grid);
            }
        }

        if let Some(grid) = parse_table(&field.value) {
            return FieldContent::Table(grid);
        }

        if field.field_type == FieldType::Table {
            warn!(field_id = %field.id, "unparsable table value, rendering as empty plain field");
            return FieldContent::Plain {
                value: String::new(),
                label: field.label.clone(),
                required: field.required,
            };
        }

        FieldContent::Plain {
            value: field.value.clone(),
            label: field.label.clone(),
            required: field.required,
        }
    }

    pub fn is_signature(&self) -> bool {
        matches!(self, FieldContent::Signature { .. })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn cells() -> impl Strategy<Value = (usize, usize, Vec<Vec<String>>)> {
        (1usize..8, 1usize..8).prop_flat_map(|(rows, cols)| {
            // Ragged and short rows are allowed on the wire
            let row = prop::collection::vec("[a-zA-Z0-9 ]{0,6}", 0..=cols + 1);
            (Just(rows), Just(cols), prop::collection::vec(row, 0..=rows + 1))
        })
    }

    proptest! {
        /// Property: serialize then parse reproduces every cell, with empty
        /// strings past the original bounds
        #[test]
        fn table_round_trip_preserves_cells((rows, cols, cells) in cells()) {
            let grid = TableGrid::new(rows, cols, cells.clone(), None).unwrap();
            let parsed = parse_table(&grid.to_value_string()).unwrap();

            for r in 0..rows {
                for c in 0..cols {
                    let expected = cells.get(r).and_then(|row| row.get(c)).map(String::as_str).unwrap_or("");
                    prop_assert_eq!(parsed.cell(r, c), expected);
                }
            }
        }

        /// Property: column spans follow the fractions at any width
        #[test]
        fn column_spans_are_proportional(
            widths in prop::collection::vec(0.05f64..=1.0, 1..6),
            total in 10.0f64..5000.0,
        ) {
            let cols = widths.len();
            let grid = TableGrid::new(1, cols, Vec::new(), Some(widths.clone())).unwrap();
            let spans = grid.column_spans(total);
            for (i, (_, w)) in spans.iter().enumerate() {
                prop_assert!((w / total - widths[i]).abs() < 1e-9);
            }
        }

        /// Property: arbitrary strings never panic the table parser
        #[test]
        fn parse_table_is_total(value in ".{0,64}") {
            let _ = parse_table(&value);
        }
    }
}
