//! Signature-field placement drafts
//!
//! In-progress signature fields are buffered per document and mirrored to
//! local storage under `signatureFields_{documentId}` so a reload does not
//! lose them. Completing placement merges the buffer into the document's
//! signature fields through the persistence API.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use shared_types::{Document, FieldRect, SignatureField};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{FieldEdit, FieldError, FieldSet};
use crate::api::{ApiError, DocumentApi, DocumentUpdate};
use crate::storage::{KeyValueStore, StorageError};

/// Storage key of a document's placement draft
pub fn draft_key(document_id: &str) -> String {
    format!("signatureFields_{}", document_id)
}

/// Result of a placement completion request
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    /// Fields were persisted; carries the server's response
    Completed(Document),
    /// Another completion for this draft was still outstanding
    Suppressed,
    /// The buffer was empty
    NothingToSubmit,
}

/// Buffered signature-field placement for one document
pub struct PlacementDraft<S> {
    document_id: String,
    store: S,
    fields: Mutex<FieldSet<SignatureField>>,
    committed: Mutex<HashSet<String>>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when a completion ends, including when its
/// future is dropped
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: KeyValueStore> PlacementDraft<S> {
    /// Open the draft for `doc`, restoring buffered fields from storage.
    /// Signature fields already on the document are treated as committed.
    /// Buffered entries whose id the document already holds are dropped.
    pub fn open(store: S, doc: &Document) -> Self {
        let committed: HashSet<String> = doc
            .data
            .signature_fields
            .iter()
            .map(|f| f.id.clone())
            .collect();

        let mut fields = load_draft(&store, &doc.id);
        let before = fields.len();
        fields.retain(|f| {
            let stale = committed.contains(&f.id);
            if stale {
                warn!(
                    document_id = %doc.id,
                    field_id = %f.id,
                    "dropping draft entry for a placed field"
                );
            }
            !stale
        });
        let dropped = before - fields.len();

        let draft = Self {
            document_id: doc.id.clone(),
            store,
            fields: Mutex::new(fields),
            committed: Mutex::new(committed),
            in_flight: AtomicBool::new(false),
        };
        if dropped > 0 {
            draft.persist(&draft.lock_fields());
        }
        draft
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Snapshot of the buffered fields in z-order
    pub fn fields(&self) -> Vec<SignatureField> {
        self.lock_fields().fields().to_vec()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_fields().is_empty()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Place a field for an assignee at the default geometry on page 1
    pub fn place(
        &self,
        assignee_email: &str,
        assignee_name: &str,
    ) -> Result<SignatureField, FieldError> {
        self.place_on_page(1, assignee_email, assignee_name)
    }

    pub fn place_on_page(
        &self,
        page: u32,
        assignee_email: &str,
        assignee_name: &str,
    ) -> Result<SignatureField, FieldError> {
        let assignee_email = assignee_email.trim();
        if assignee_email.is_empty() {
            return Err(FieldError::MissingAssignee);
        }

        let field = SignatureField {
            id: Uuid::new_v4().to_string(),
            rect: FieldRect::DEFAULT,
            assignee_email: assignee_email.to_string(),
            assignee_name: assignee_name.trim().to_string(),
            page: page.max(1),
        };

        let mut set = self.lock_fields();
        set.push(field.clone());
        self.persist(&set);
        debug!(document_id = %self.document_id, field_id = %field.id, "signature field placed");
        Ok(field)
    }

    pub fn drag(&self, id: &str, dx: f64, dy: f64) -> Result<FieldRect, FieldError> {
        self.apply(&FieldEdit::Move {
            field_id: id.to_string(),
            dx,
            dy,
        })
    }

    pub fn resize(&self, id: &str, dw: f64, dh: f64) -> Result<FieldRect, FieldError> {
        self.apply(&FieldEdit::Resize {
            field_id: id.to_string(),
            dw,
            dh,
        })
    }

    /// Apply a pointer edit to a buffered field
    pub fn apply(&self, edit: &FieldEdit) -> Result<FieldRect, FieldError> {
        let id = match edit {
            FieldEdit::Move { field_id, .. } | FieldEdit::Resize { field_id, .. } => field_id,
        };
        self.ensure_mutable(id)?;

        let mut set = self.lock_fields();
        let rect = set.apply(edit)?;
        self.persist(&set);
        Ok(rect)
    }

    /// Remove a buffered field. An emptied draft is deleted from storage.
    pub fn remove(&self, id: &str) -> Result<SignatureField, FieldError> {
        self.ensure_mutable(id)?;

        let mut set = self.lock_fields();
        let removed = set.remove(id)?;
        self.persist(&set);
        Ok(removed)
    }

    /// Merge the buffered fields into the document and persist them.
    ///
    /// Only one completion runs at a time; a call made while another is
    /// outstanding returns [`PlacementOutcome::Suppressed`] without touching
    /// the network. On failure the buffer is left exactly as it was.
    pub async fn complete<A>(&self, doc: &Document, api: &A) -> Result<PlacementOutcome, ApiError>
    where
        A: DocumentApi + ?Sized,
    {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            info!(document_id = %self.document_id, "placement completion already in flight");
            return Ok(PlacementOutcome::Suppressed);
        }
        let _in_flight = InFlight(&self.in_flight);

        let submitted = self.take_submittable(doc);
        if submitted.is_empty() {
            return Ok(PlacementOutcome::NothingToSubmit);
        }

        let mut data = doc.data.clone();
        data.signature_fields.extend(submitted.iter().cloned());
        let update = DocumentUpdate { data, status: None };

        let updated = match api.update_document(&doc.id, &update).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(
                    document_id = %doc.id,
                    error = %e,
                    "placement completion failed, keeping draft"
                );
                return Err(e);
            }
        };

        let ids: HashSet<String> = submitted.into_iter().map(|f| f.id).collect();
        {
            let mut set = self.lock_fields();
            set.retain(|f| !ids.contains(&f.id));
            self.persist(&set);
        }
        let count = ids.len();
        self.lock_committed().extend(ids);

        info!(document_id = %doc.id, count, "signature field placement completed");
        Ok(PlacementOutcome::Completed(updated))
    }

    /// Buffered fields that are new to `doc`. Entries for ids the document
    /// already holds are read-only and are dropped from the buffer.
    fn take_submittable(&self, doc: &Document) -> Vec<SignatureField> {
        let placed: HashSet<&str> = doc
            .data
            .signature_fields
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        let committed = self.lock_committed().clone();
        let is_placed =
            |f: &SignatureField| placed.contains(f.id.as_str()) || committed.contains(&f.id);

        let mut set = self.lock_fields();
        let stale: Vec<String> = set
            .fields()
            .iter()
            .filter(|f| is_placed(f))
            .map(|f| f.id.clone())
            .collect();
        if !stale.is_empty() {
            warn!(
                document_id = %doc.id,
                fields = ?stale,
                "skipping fields that are already placed"
            );
            set.retain(|f| !is_placed(f));
            self.persist(&set);
        }
        set.fields().to_vec()
    }

    fn ensure_mutable(&self, id: &str) -> Result<(), FieldError> {
        if self.lock_committed().contains(id) {
            return Err(FieldError::Immutable(id.to_string()));
        }
        Ok(())
    }

    fn lock_fields(&self) -> MutexGuard<'_, FieldSet<SignatureField>> {
        self.fields.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_committed(&self) -> MutexGuard<'_, HashSet<String>> {
        self.committed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mirror the buffer to storage; failures are logged and absorbed
    fn persist(&self, set: &FieldSet<SignatureField>) {
        let key = draft_key(&self.document_id);
        let result = if set.is_empty() {
            self.store.remove(&key)
        } else {
            serde_json::to_string(set.fields())
                .map_err(|e| StorageError::Serialize {
                    key: key.clone(),
                    message: e.to_string(),
                })
                .and_then(|json| self.store.set(&key, &json))
        };

        if let Err(e) = result {
            warn!(document_id = %self.document_id, error = %e, "could not save placement draft");
        }
    }
}

fn load_draft<S: KeyValueStore>(store: &S, document_id: &str) -> FieldSet<SignatureField> {
    let key = draft_key(document_id);
    let raw = match store.get(&key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return FieldSet::new(),
        Err(e) => {
            warn!(document_id, error = %e, "placement draft unreadable, starting empty");
            return FieldSet::new();
        }
    };

    match serde_json::from_str::<Vec<SignatureField>>(&raw) {
        Ok(fields) => FieldSet::from_vec(fields),
        Err(e) => {
            warn!(document_id, error = %e, "placement draft corrupt, starting empty");
            FieldSet::new()
        }
    }
}
