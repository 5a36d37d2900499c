//! Positioned field records stored in `Document.data`

use serde::{Deserialize, Serialize};

use crate::geometry::FieldRect;

/// Persisted `type` tag of a coordinate field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Plain,
    Table,
    EditorSignature,
    SignerSignature,
    ReviewerSignature,
    /// Tags written by newer clients render as plain fields
    #[serde(other)]
    Unknown,
}

impl FieldType {
    pub fn is_signature(self) -> bool {
        matches!(
            self,
            FieldType::EditorSignature | FieldType::SignerSignature | FieldType::ReviewerSignature
        )
    }
}

/// Explicit table descriptor, also the JSON shape of a table field's `value`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableValue {
    pub rows: usize,
    pub cols: usize,
    #[serde(default)]
    pub cells: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_widths: Option<Vec<f64>>,
}

fn default_page() -> u32 {
    1
}

/// A positioned, typed content region on a page raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateField {
    pub id: String,
    #[serde(flatten)]
    pub rect: FieldRect,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    /// Plain text, serialized table JSON, or an image-data string
    #[serde(default)]
    pub value: String,
    /// 1-based page index
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    /// Assignee of a signature-variant field
    #[serde(
        default,
        alias = "reviewerEmail",
        skip_serializing_if = "Option::is_none"
    )]
    pub signer_email: Option<String>,
    #[serde(
        default,
        alias = "reviewerName",
        skip_serializing_if = "Option::is_none"
    )]
    pub signer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableValue>,
}

impl CoordinateField {
    pub fn new(id: &str, field_type: FieldType, rect: FieldRect) -> Self {
        Self {
            id: id.to_string(),
            rect,
            field_type,
            label: String::new(),
            required: false,
            value: String::new(),
            page: 1,
            font_size: None,
            font_family: None,
            signer_email: None,
            signer_name: None,
            table: None,
        }
    }

    /// Whether this is a signature-variant field carrying a non-empty value
    /// for the given assignee
    pub fn is_signed_by(&self, identifier: &str) -> bool {
        self.field_type.is_signature()
            && !self.value.trim().is_empty()
            && self
                .signer_email
                .as_deref()
                .is_some_and(|e| e.trim().eq_ignore_ascii_case(identifier.trim()))
    }
}

/// Placement-only record assigning a page region to a reviewer or signer.
///
/// Immutable once persisted through a completed placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureField {
    pub id: String,
    #[serde(flatten)]
    pub rect: FieldRect,
    #[serde(rename = "reviewerEmail", alias = "signerEmail")]
    pub assignee_email: String,
    #[serde(rename = "reviewerName", alias = "signerName", default)]
    pub assignee_name: String,
    #[serde(default = "default_page")]
    pub page: u32,
}
