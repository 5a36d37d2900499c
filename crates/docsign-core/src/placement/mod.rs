//! Field placement
//!
//! Fields are placed at a fixed default geometry, then dragged and resized
//! by pointer deltas in page space. Overlap is allowed. Drags clamp only at
//! the top-left; resizes clamp at the minimum field size.

mod draft;
mod editor;
mod interaction;

pub use draft::{draft_key, PlacementDraft, PlacementOutcome};
pub use editor::CoordinateFieldEditor;
pub use interaction::{reduce, FieldEdit, Interaction, PointerEvent};

use shared_types::{CoordinateField, FieldRect, SignatureField};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Field not found: {0}")]
    NotFound(String),

    /// Signature fields are read-only once placement completes
    #[error("Field {0} has already been submitted and cannot be changed")]
    Immutable(String),

    #[error("Invalid field geometry: {0}")]
    InvalidGeometry(String),

    #[error("Field {0} is not a signature field")]
    NotSignature(String),

    #[error("An assignee email is required")]
    MissingAssignee,
}

/// Anything with an id and a page rect
pub trait Placeable {
    fn id(&self) -> &str;
    fn rect(&self) -> &FieldRect;
    fn rect_mut(&mut self) -> &mut FieldRect;
}

impl Placeable for CoordinateField {
    fn id(&self) -> &str {
        &self.id
    }

    fn rect(&self) -> &FieldRect {
        &self.rect
    }

    fn rect_mut(&mut self) -> &mut FieldRect {
        &mut self.rect
    }
}

impl Placeable for SignatureField {
    fn id(&self) -> &str {
        &self.id
    }

    fn rect(&self) -> &FieldRect {
        &self.rect
    }

    fn rect_mut(&mut self) -> &mut FieldRect {
        &mut self.rect
    }
}

/// An ordered set of placeable fields. Order is z-order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSet<F> {
    fields: Vec<F>,
}

impl<F> Default for FieldSet<F> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<F: Placeable> FieldSet<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(fields: Vec<F>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[F] {
        &self.fields
    }

    pub fn into_vec(self) -> Vec<F> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&F> {
        self.fields.iter().find(|f| f.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut F> {
        self.fields.iter_mut().find(|f| f.id() == id)
    }

    /// Append on top of every existing field
    pub fn push(&mut self, field: F) {
        self.fields.push(field);
    }

    pub fn drag(&mut self, id: &str, dx: f64, dy: f64) -> Result<FieldRect, FieldError> {
        let field = self
            .get_mut(id)
            .ok_or_else(|| FieldError::NotFound(id.to_string()))?;
        let rect = field.rect().translated(dx, dy);
        *field.rect_mut() = rect;
        Ok(rect)
    }

    pub fn resize(&mut self, id: &str, dw: f64, dh: f64) -> Result<FieldRect, FieldError> {
        let field = self
            .get_mut(id)
            .ok_or_else(|| FieldError::NotFound(id.to_string()))?;
        let rect = field.rect().resized(dw, dh);
        *field.rect_mut() = rect;
        Ok(rect)
    }

    pub fn apply(&mut self, edit: &FieldEdit) -> Result<FieldRect, FieldError> {
        match edit {
            FieldEdit::Move { field_id, dx, dy } => self.drag(field_id, *dx, *dy),
            FieldEdit::Resize { field_id, dw, dh } => self.resize(field_id, *dw, *dh),
        }
    }

    pub fn remove(&mut self, id: &str) -> Result<F, FieldError> {
        let position = self
            .fields
            .iter()
            .position(|f| f.id() == id)
            .ok_or_else(|| FieldError::NotFound(id.to_string()))?;
        Ok(self.fields.remove(position))
    }

    pub fn retain<P: FnMut(&F) -> bool>(&mut self, keep: P) {
        self.fields.retain(keep);
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use shared_types::{FieldType, MIN_FIELD_HEIGHT, MIN_FIELD_WIDTH};

    fn any_edit() -> impl Strategy<Value = FieldEdit> {
        let delta = -5000.0f64..5000.0;
        prop_oneof![
            (delta.clone(), delta.clone()).prop_map(|(dx, dy)| FieldEdit::Move {
                field_id: "f".to_string(),
                dx,
                dy
            }),
            (delta.clone(), delta).prop_map(|(dw, dh)| FieldEdit::Resize {
                field_id: "f".to_string(),
                dw,
                dh
            }),
        ]
    }

    proptest! {
        /// Property: any sequence of drags and resizes keeps the placement
        /// invariant
        #[test]
        fn edits_preserve_invariant(edits in prop::collection::vec(any_edit(), 1..40)) {
            let mut set = FieldSet::from_vec(vec![
                CoordinateField::new("f", FieldType::Plain, FieldRect::DEFAULT),
            ]);
            for edit in &edits {
                let rect = set.apply(edit).unwrap();
                prop_assert!(rect.x >= 0.0 && rect.y >= 0.0);
                prop_assert!(rect.width >= MIN_FIELD_WIDTH);
                prop_assert!(rect.height >= MIN_FIELD_HEIGHT);
            }
        }
    }
}
