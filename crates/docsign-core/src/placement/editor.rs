//! Editing of a document's coordinate fields

use shared_types::{CoordinateField, Document, DocumentData, FieldRect, FieldType};
use uuid::Uuid;

use super::{FieldEdit, FieldError, FieldSet};
use crate::fields::TableGrid;

/// Buffered coordinate-field edits for one document. Changes stay local until
/// they are submitted with the document's data.
#[derive(Debug, Clone, Default)]
pub struct CoordinateFieldEditor {
    fields: FieldSet<CoordinateField>,
    dirty: bool,
}

impl CoordinateFieldEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(doc: &Document) -> Self {
        Self {
            fields: FieldSet::from_vec(doc.data.coordinate_fields.clone()),
            dirty: false,
        }
    }

    /// Replace the buffer with the authoritative field set
    pub fn reset(&mut self, doc: &Document) {
        *self = Self::from_document(doc);
    }

    pub fn fields(&self) -> &[CoordinateField] {
        self.fields.fields()
    }

    pub fn get(&self, id: &str) -> Option<&CoordinateField> {
        self.fields.get(id)
    }

    pub fn fields_on_page(&self, page: u32) -> impl Iterator<Item = &CoordinateField> {
        self.fields.fields().iter().filter(move |f| f.page == page)
    }

    /// Whether there are edits not yet submitted
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Place a field at the default geometry on top of every other field
    pub fn place(&mut self, field_type: FieldType, label: &str, page: u32) -> CoordinateField {
        let id = Uuid::new_v4().to_string();
        let mut field = CoordinateField::new(&id, field_type, FieldRect::DEFAULT);
        field.label = label.to_string();
        field.page = page.max(1);
        self.fields.push(field.clone());
        self.dirty = true;
        field
    }

    /// Place a field at explicit geometry, clamped to the placement minimums
    pub fn place_at(
        &mut self,
        field_type: FieldType,
        label: &str,
        page: u32,
        rect: FieldRect,
    ) -> Result<CoordinateField, FieldError> {
        let finite = [rect.x, rect.y, rect.width, rect.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(FieldError::InvalidGeometry(format!("{:?}", rect)));
        }

        let mut field = self.place(field_type, label, page);
        field.rect = FieldRect::for_create(rect.x, rect.y, rect.width, rect.height);
        if let Some(placed) = self.fields.get_mut(&field.id) {
            placed.rect = field.rect;
        }
        Ok(field)
    }

    pub fn set_value(&mut self, id: &str, value: &str) -> Result<(), FieldError> {
        let field = self.field_mut(id)?;
        field.value = value.to_string();
        self.dirty = true;
        Ok(())
    }

    pub fn set_required(&mut self, id: &str, required: bool) -> Result<(), FieldError> {
        self.field_mut(id)?.required = required;
        self.dirty = true;
        Ok(())
    }

    /// Store a table as the field's serialized value
    pub fn set_table(&mut self, id: &str, grid: &TableGrid) -> Result<(), FieldError> {
        let field = self.field_mut(id)?;
        field.field_type = FieldType::Table;
        field.value = grid.to_value_string();
        field.table = None;
        self.dirty = true;
        Ok(())
    }

    /// Assign a signature-variant field to a participant
    pub fn assign(&mut self, id: &str, email: &str, name: &str) -> Result<(), FieldError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(FieldError::MissingAssignee);
        }
        let field = self.field_mut(id)?;
        if !field.field_type.is_signature() {
            return Err(FieldError::NotSignature(id.to_string()));
        }
        field.signer_email = Some(email.to_string());
        field.signer_name = Some(name.trim().to_string());
        self.dirty = true;
        Ok(())
    }

    pub fn drag(&mut self, id: &str, dx: f64, dy: f64) -> Result<FieldRect, FieldError> {
        let rect = self.fields.drag(id, dx, dy)?;
        self.dirty = true;
        Ok(rect)
    }

    pub fn resize(&mut self, id: &str, dw: f64, dh: f64) -> Result<FieldRect, FieldError> {
        let rect = self.fields.resize(id, dw, dh)?;
        self.dirty = true;
        Ok(rect)
    }

    pub fn apply(&mut self, edit: &FieldEdit) -> Result<FieldRect, FieldError> {
        let rect = self.fields.apply(edit)?;
        self.dirty = true;
        Ok(rect)
    }

    pub fn remove(&mut self, id: &str) -> Result<CoordinateField, FieldError> {
        let removed = self.fields.remove(id)?;
        self.dirty = true;
        Ok(removed)
    }

    /// `base` with its coordinate fields replaced by the buffer
    pub fn to_data(&self, base: &DocumentData) -> DocumentData {
        DocumentData {
            coordinate_fields: self.fields.fields().to_vec(),
            ..base.clone()
        }
    }

    fn field_mut(&mut self, id: &str) -> Result<&mut CoordinateField, FieldError> {
        self.fields
            .get_mut(id)
            .ok_or_else(|| FieldError::NotFound(id.to_string()))
    }
}
