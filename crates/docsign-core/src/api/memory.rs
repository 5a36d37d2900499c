//! In-memory persistence API for development and testing
//!
//! Applies the server's side of each transition to documents held in a map.
//! Calls are made as a single configurable identity, standing in for the
//! bearer token's user.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use shared_types::{Document, DocumentStatus, Role, Task};

use super::{
    ApiError, ApproveRequest, AssignReviewerRequest, DocumentApi, DocumentUpdate, RejectRequest,
};
use crate::lifecycle::signing_progress;

#[derive(Debug, Default)]
pub struct MemoryDocumentApi {
    documents: Mutex<HashMap<String, Document>>,
    identity: Mutex<String>,
    failures: Mutex<Vec<ApiError>>,
    calls: AtomicUsize,
    viewed: Mutex<Vec<(String, String)>>,
}

impl MemoryDocumentApi {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: Mutex::new(identity.trim().to_string()),
            ..Self::default()
        }
    }

    /// Act as a different participant for subsequent calls
    pub fn set_identity(&self, identity: &str) {
        *lock(&self.identity) = identity.trim().to_string();
    }

    pub fn insert(&self, doc: Document) {
        lock(&self.documents).insert(doc.id.clone(), doc);
    }

    /// Server-side copy of a document
    pub fn document(&self, id: &str) -> Option<Document> {
        lock(&self.documents).get(id).cloned()
    }

    /// Fail the next call with `error`. Queued failures are used in order.
    pub fn fail_next(&self, error: ApiError) {
        lock(&self.failures).push(error);
    }

    /// Number of calls received, including failed ones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(document id, identity)` for every mark-viewed call
    pub fn viewed(&self) -> Vec<(String, String)> {
        lock(&self.viewed).clone()
    }

    fn identity(&self) -> String {
        lock(&self.identity).clone()
    }

    fn begin(&self) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut failures = lock(&self.failures);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.remove(0))
        }
    }

    fn with_document<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Document) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        self.begin()?;
        let mut documents = lock(&self.documents);
        let doc = documents
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        f(doc)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn require_role(doc: &Document, identity: &str, role: Role) -> Result<(), ApiError> {
    if doc.task_for(identity, role).is_none() {
        return Err(ApiError::Forbidden(format!("{} is not a {}", identity, role)));
    }
    Ok(())
}

#[async_trait]
impl DocumentApi for MemoryDocumentApi {
    async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
        self.with_document(id, |doc| Ok(doc.clone()))
    }

    async fn update_document(
        &self,
        id: &str,
        update: &DocumentUpdate,
    ) -> Result<Document, ApiError> {
        self.with_document(id, |doc| {
            if doc.status.is_terminal() {
                return Err(ApiError::Validation(format!(
                    "Document is {} and can no longer be edited",
                    doc.status
                )));
            }
            doc.data = update.data.clone();
            if let Some(status) = update.status {
                doc.status = status;
            }
            Ok(doc.clone())
        })
    }

    /// A signer approval answers with the document as it was before the
    /// completion check ran, like a server that finalizes asynchronously.
    async fn approve(&self, id: &str, request: &ApproveRequest) -> Result<Document, ApiError> {
        let identity = self.identity();
        self.with_document(id, |doc| match doc.status {
            DocumentStatus::ReadyForReview | DocumentStatus::Reviewing => {
                require_role(doc, &identity, Role::Reviewer)?;
                doc.status = DocumentStatus::Signing;
                Ok(doc.clone())
            }
            DocumentStatus::Signing => {
                require_role(doc, &identity, Role::Signer)?;
                if request.signature_data.trim().is_empty() {
                    return Err(ApiError::Validation("Signature is required".to_string()));
                }

                let mut wrote = false;
                for field in doc.data.coordinate_fields.iter_mut() {
                    let mine = field
                        .signer_email
                        .as_deref()
                        .is_some_and(|e| e.trim().eq_ignore_ascii_case(&identity));
                    if field.field_type.is_signature() && mine {
                        field.value = request.signature_data.clone();
                        wrote = true;
                    }
                }
                if !wrote {
                    return Err(ApiError::Validation(
                        "No signature field is assigned to you".to_string(),
                    ));
                }
                doc.data
                    .signatures
                    .insert(identity.clone(), request.signature_data.clone());

                let answered = doc.clone();
                if signing_progress(doc).is_complete() {
                    doc.status = DocumentStatus::Completed;
                }
                Ok(answered)
            }
            status => Err(ApiError::Validation(format!(
                "Document is not awaiting approval ({})",
                status
            ))),
        })
    }

    async fn reject(&self, id: &str, request: &RejectRequest) -> Result<Document, ApiError> {
        let identity = self.identity();
        self.with_document(id, |doc| {
            if request.reason.trim().is_empty() {
                return Err(ApiError::Validation("Reason is required".to_string()));
            }
            match doc.status {
                DocumentStatus::ReadyForReview | DocumentStatus::Reviewing => {
                    require_role(doc, &identity, Role::Reviewer)?
                }
                DocumentStatus::Signing => require_role(doc, &identity, Role::Signer)?,
                status => {
                    return Err(ApiError::Validation(format!(
                        "Document cannot be rejected ({})",
                        status
                    )))
                }
            }
            doc.status = DocumentStatus::Rejected;
            Ok(doc.clone())
        })
    }

    async fn assign_reviewer(
        &self,
        id: &str,
        request: &AssignReviewerRequest,
    ) -> Result<Document, ApiError> {
        let identity = self.identity();
        self.with_document(id, |doc| {
            if doc.status != DocumentStatus::ReadyForReview {
                return Err(ApiError::Validation(format!(
                    "Reviewer can only be assigned in {} (document is {})",
                    DocumentStatus::ReadyForReview,
                    doc.status
                )));
            }
            let may_assign = doc.task_for(&identity, Role::Creator).is_some()
                || doc
                    .tasks_with_role(Role::Editor)
                    .any(|t| t.is_assigned_to(&identity) && t.can_assign_reviewer);
            if !may_assign {
                return Err(ApiError::Forbidden(format!(
                    "{} may not assign a reviewer",
                    identity
                )));
            }
            if doc.has_role(Role::Reviewer) {
                return Err(ApiError::Validation("A reviewer is already assigned".to_string()));
            }

            let email = request.reviewer_email.trim();
            let mut task = Task::new(Role::Reviewer, email, "");
            task.created_at = Some(chrono::Utc::now());
            doc.tasks.push(task);
            doc.status = DocumentStatus::Reviewing;
            Ok(doc.clone())
        })
    }

    async fn mark_viewed(&self, id: &str) -> Result<(), ApiError> {
        let identity = self.identity();
        self.with_document(id, |doc| {
            lock(&self.viewed).push((doc.id.clone(), identity));
            Ok(())
        })
    }
}
