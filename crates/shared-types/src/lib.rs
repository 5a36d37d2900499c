//! Data model shared between the signing core and its front ends
//!
//! Wire shapes follow the persistence API: camelCase keys, SCREAMING_SNAKE_CASE
//! enums for status and role, snake_case field type tags.

pub mod document;
pub mod field;
pub mod geometry;
pub mod signature;

pub use document::{Document, DocumentData, DocumentStatus, Role, Task};
pub use field::{CoordinateField, FieldType, SignatureField, TableValue};
pub use geometry::{FieldRect, Point, MIN_FIELD_HEIGHT, MIN_FIELD_WIDTH, PAGE_HEIGHT, PAGE_WIDTH};
pub use signature::SavedSignature;
