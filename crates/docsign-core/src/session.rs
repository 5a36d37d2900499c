//! Document session
//!
//! Holds the cached copy of one open document and runs role actions against
//! it. Each action checks its lifecycle guard locally, makes one API call,
//! then re-fetches the document so the next guard sees the server's state.
//! Nothing is retried automatically.
//!
//! Opening another document bumps the session epoch. A call that finishes
//! after that is allowed to complete, but its result is discarded.

use std::sync::{Mutex, MutexGuard};

use shared_types::{Document, DocumentStatus};
use tracing::{debug, info, warn};

use crate::api::{
    ApiError, ApproveRequest, AssignReviewerRequest, DocumentApi, DocumentUpdate, RejectRequest,
};
use crate::capture::{is_image_data, CaptureError};
use crate::error::DocsignError;
use crate::lifecycle::{self, Action, Actor, GuardViolation};
use crate::placement::{CoordinateFieldEditor, PlacementDraft, PlacementOutcome};
use crate::storage::KeyValueStore;

/// Result of an action that reached the server
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The session still shows the same document; carries the fresh state
    Applied(T),
    /// The session moved on while the call was outstanding
    Discarded,
}

impl<T> Outcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Discarded => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Applied(value) => Outcome::Applied(f(value)),
            Outcome::Discarded => Outcome::Discarded,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    document_id: Option<String>,
    document: Option<Document>,
    /// The server reported the document as gone
    missing: bool,
    epoch: u64,
}

/// The open document as of an action's start
struct Ticket {
    epoch: u64,
    document: Document,
}

pub struct DocumentSession<A> {
    api: A,
    actor: Actor,
    state: Mutex<SessionState>,
}

impl<A: DocumentApi> DocumentSession<A> {
    pub fn new(api: A, actor: Actor) -> Self {
        Self {
            api,
            actor,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Cached copy of the open document
    pub fn document(&self) -> Option<Document> {
        self.lock().document.clone()
    }

    pub fn document_id(&self) -> Option<String> {
        self.lock().document_id.clone()
    }

    /// Whether the open document was reported as not found
    pub fn is_missing(&self) -> bool {
        self.lock().missing
    }

    /// Actions the actor may take on the cached document
    pub fn allowed_actions(&self) -> Vec<Action> {
        match &self.lock().document {
            Some(doc) => lifecycle::allowed_actions(doc, &self.actor),
            None => Vec::new(),
        }
    }

    /// Switch to a document and fetch it
    pub async fn open(&self, id: &str) -> Result<Outcome<Document>, DocsignError> {
        let epoch = {
            let mut state = self.lock();
            state.epoch += 1;
            state.document_id = Some(id.to_string());
            state.document = None;
            state.missing = false;
            state.epoch
        };
        debug!(document_id = id, epoch, "opening document");
        self.fetch(id, epoch).await
    }

    /// Fetch the open document again
    pub async fn refresh(&self) -> Result<Outcome<Document>, DocsignError> {
        let (id, epoch) = {
            let state = self.lock();
            let id = state.document_id.clone().ok_or(DocsignError::NotOpen)?;
            (id, state.epoch)
        };
        self.fetch(&id, epoch).await
    }

    pub async fn assign_reviewer(
        &self,
        reviewer_email: &str,
    ) -> Result<Outcome<Document>, DocsignError> {
        let reviewer_email = reviewer_email.trim();
        if reviewer_email.is_empty() {
            return Err(GuardViolation::EmptyReviewer.into());
        }
        let ticket = self.guarded(Action::AssignReviewer)?;

        let request = AssignReviewerRequest {
            reviewer_email: reviewer_email.to_string(),
        };
        let result = self
            .api
            .assign_reviewer(&ticket.document.id, &request)
            .await;
        self.settle(&ticket, Action::AssignReviewer, result).await
    }

    /// Reviewer approval, or the actor's signature while the document is
    /// signing. A signature must be a PNG image-data string.
    pub async fn approve(&self, signature_data: &str) -> Result<Outcome<Document>, DocsignError> {
        let ticket = self.guarded(Action::Approve)?;
        let signing = ticket.document.status == DocumentStatus::Signing;
        if signing && signature_data.trim().is_empty() {
            return Err(CaptureError::EmptySignature.into());
        }
        if signing && !is_image_data(signature_data) {
            return Err(CaptureError::Decode("signature is not PNG image data".to_string()).into());
        }

        let request = ApproveRequest {
            signature_data: signature_data.to_string(),
            reviewer_email: self.reviewer_email(&ticket.document),
        };
        let result = self.api.approve(&ticket.document.id, &request).await;
        self.settle(&ticket, Action::Approve, result).await
    }

    pub async fn reject(&self, reason: &str) -> Result<Outcome<Document>, DocsignError> {
        let reason = lifecycle::validate_reject_reason(reason)?;
        let ticket = self.guarded(Action::Reject)?;

        let request = RejectRequest {
            reason,
            reviewer_email: self.reviewer_email(&ticket.document),
        };
        let result = self.api.reject(&ticket.document.id, &request).await;
        self.settle(&ticket, Action::Reject, result).await
    }

    /// Acknowledge that the actor has seen the document. Failures are logged
    /// and never surfaced.
    pub async fn mark_viewed(&self) {
        let Some(id) = self.document_id() else {
            return;
        };
        match self.api.mark_viewed(&id).await {
            Ok(()) => debug!(document_id = %id, "marked viewed"),
            Err(e) => warn!(document_id = %id, error = %e, "mark viewed failed"),
        }
    }

    /// Submit the editor's fields and hand the document to review. The
    /// editor keeps its edits when the call fails.
    pub async fn complete_setup(
        &self,
        editor: &mut CoordinateFieldEditor,
    ) -> Result<Outcome<Document>, DocsignError> {
        let ticket = self.guarded(Action::CompleteSetup)?;
        let update = DocumentUpdate {
            data: editor.to_data(&ticket.document.data),
            status: Some(DocumentStatus::ReadyForReview),
        };
        let result = self
            .api
            .update_document(&ticket.document.id, &update)
            .await;
        let outcome = self.settle(&ticket, Action::CompleteSetup, result).await?;
        if let Outcome::Applied(doc) = &outcome {
            editor.reset(doc);
        }
        Ok(outcome)
    }

    /// Save the editor's fields without changing status
    pub async fn save_fields(
        &self,
        editor: &mut CoordinateFieldEditor,
    ) -> Result<Outcome<Document>, DocsignError> {
        let ticket = self.guarded(Action::CompleteSetup)?;
        let update = DocumentUpdate {
            data: editor.to_data(&ticket.document.data),
            status: None,
        };
        let result = self
            .api
            .update_document(&ticket.document.id, &update)
            .await;
        let outcome = self
            .settle_expecting(&ticket, "save fields", Some(ticket.document.status), result)
            .await?;
        if let Outcome::Applied(_) = &outcome {
            editor.mark_saved();
        }
        Ok(outcome)
    }

    /// Complete a signature-field placement draft for the open document
    pub async fn complete_placement<S: KeyValueStore>(
        &self,
        draft: &PlacementDraft<S>,
    ) -> Result<Outcome<PlacementOutcome>, DocsignError> {
        let ticket = self.guarded(Action::PlaceSignatureFields)?;
        if draft.document_id() != ticket.document.id {
            return Err(DocsignError::WrongDocument {
                draft: draft.document_id().to_string(),
                open: ticket.document.id.clone(),
            });
        }

        let expected = Some(ticket.document.status);
        match draft.complete(&ticket.document, &self.api).await {
            Ok(PlacementOutcome::Completed(response)) => {
                let outcome = self
                    .settle_expecting(&ticket, "complete placement", expected, Ok(response))
                    .await?;
                Ok(outcome.map(PlacementOutcome::Completed))
            }
            Ok(other) => Ok(Outcome::Applied(other)),
            Err(e) => {
                let outcome = self
                    .settle_expecting(&ticket, "complete placement", expected, Err(e))
                    .await?;
                Ok(outcome.map(PlacementOutcome::Completed))
            }
        }
    }

    /// Put a rejected document back into editing for a correction run
    pub async fn restart_after_rejection(&self) -> Result<Outcome<Document>, DocsignError> {
        let ticket = self.ticket()?;
        let status = lifecycle::restart_after_rejection(&ticket.document, &self.actor)?;
        let update = DocumentUpdate {
            data: ticket.document.data.clone(),
            status: Some(status),
        };
        let result = self
            .api
            .update_document(&ticket.document.id, &update)
            .await;
        self.settle_expecting(&ticket, "restart after rejection", Some(status), result)
            .await
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ticket(&self) -> Result<Ticket, DocsignError> {
        let state = self.lock();
        let document = state.document.clone().ok_or(DocsignError::NotOpen)?;
        Ok(Ticket {
            epoch: state.epoch,
            document,
        })
    }

    fn guarded(&self, action: Action) -> Result<Ticket, DocsignError> {
        let ticket = self.ticket()?;
        if let Err(violation) = lifecycle::check(&ticket.document, &self.actor, action) {
            debug!(
                document_id = %ticket.document.id,
                status = %ticket.document.status,
                %action,
                %violation,
                "action refused locally"
            );
            return Err(violation.into());
        }
        Ok(ticket)
    }

    /// Reviewer identity sent with approve/reject during review
    fn reviewer_email(&self, doc: &Document) -> Option<String> {
        match doc.status {
            DocumentStatus::ReadyForReview | DocumentStatus::Reviewing => {
                Some(self.actor.identifier.clone())
            }
            _ => None,
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    /// Store `doc` if the session is still on `epoch`
    fn commit(&self, epoch: u64, doc: Document) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            return false;
        }
        state.missing = false;
        state.document = Some(doc);
        true
    }

    fn mark_missing(&self, epoch: u64) {
        let mut state = self.lock();
        if state.epoch == epoch {
            state.missing = true;
            state.document = None;
        }
    }

    async fn fetch(&self, id: &str, epoch: u64) -> Result<Outcome<Document>, DocsignError> {
        match self.api.get_document(id).await {
            Ok(doc) => {
                if self.commit(epoch, doc.clone()) {
                    Ok(Outcome::Applied(doc))
                } else {
                    debug!(document_id = id, "discarding stale fetch");
                    Ok(Outcome::Discarded)
                }
            }
            Err(e) => {
                if !self.is_current(epoch) {
                    return Ok(Outcome::Discarded);
                }
                if matches!(e, ApiError::NotFound(_)) {
                    self.mark_missing(epoch);
                }
                Err(e.into())
            }
        }
    }

    async fn settle(
        &self,
        ticket: &Ticket,
        action: Action,
        result: Result<Document, ApiError>,
    ) -> Result<Outcome<Document>, DocsignError> {
        let expected = lifecycle::expected_status_after(&ticket.document, &self.actor, action);
        let label = action.to_string();
        self.settle_expecting(ticket, &label, Some(expected), result)
            .await
    }

    /// Finish an action: re-fetch the document and keep the fresh copy unless
    /// the session has moved on
    async fn settle_expecting(
        &self,
        ticket: &Ticket,
        action: &str,
        expected: Option<DocumentStatus>,
        result: Result<Document, ApiError>,
    ) -> Result<Outcome<Document>, DocsignError> {
        let id = ticket.document.id.as_str();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if !self.is_current(ticket.epoch) {
                    debug!(document_id = id, action, error = %e, "discarding stale failure");
                    return Ok(Outcome::Discarded);
                }
                warn!(document_id = id, action, error = %e, "action failed");
                if matches!(e, ApiError::NotFound(_)) {
                    self.mark_missing(ticket.epoch);
                } else if !e.is_authorization() {
                    if let Err(refresh) = self.fetch(id, ticket.epoch).await {
                        debug!(document_id = id, error = %refresh, "re-fetch after failure failed");
                    }
                }
                return Err(e.into());
            }
        };

        let fresh = match self.api.get_document(id).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(
                    document_id = id,
                    action,
                    error = %e,
                    "re-fetch after action failed, keeping the call's response"
                );
                response
            }
        };

        if let Some(expected) = expected {
            if fresh.status != expected {
                info!(
                    document_id = id,
                    action,
                    %expected,
                    status = %fresh.status,
                    "server status differs from expected"
                );
            }
        }

        if self.commit(ticket.epoch, fresh.clone()) {
            info!(document_id = id, action, status = %fresh.status, "action applied");
            Ok(Outcome::Applied(fresh))
        } else {
            debug!(document_id = id, action, "discarding stale result");
            Ok(Outcome::Discarded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryDocumentApi;
    use crate::capture::{to_data_url, Surface};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use shared_types::{CoordinateField, FieldRect, FieldType, Role, Task};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn signature() -> String {
        to_data_url(&Surface::new(2, 2)).unwrap()
    }

    fn signing_doc(id: &str) -> Document {
        let mut doc = Document::new(id, DocumentStatus::Signing);
        doc.tasks = vec![
            Task::new(Role::Signer, "a@x.com", "A"),
            Task::new(Role::Signer, "b@x.com", "B"),
        ];
        for (field_id, email) in [("f1", "a@x.com"), ("f2", "b@x.com")] {
            let mut f =
                CoordinateField::new(field_id, FieldType::SignerSignature, FieldRect::DEFAULT);
            f.signer_email = Some(email.to_string());
            doc.data.coordinate_fields.push(f);
        }
        doc
    }

    fn session_for(
        api: &Arc<MemoryDocumentApi>,
        email: &str,
    ) -> DocumentSession<Arc<MemoryDocumentApi>> {
        api.set_identity(email);
        DocumentSession::new(api.clone(), Actor::new(email, "Someone"))
    }

    #[tokio::test]
    async fn test_second_signer_sees_completed_after_refetch() {
        let api = Arc::new(MemoryDocumentApi::new("a@x.com"));
        api.insert(signing_doc("doc-1"));

        let first = session_for(&api, "a@x.com");
        first.open("doc-1").await.unwrap();
        let doc = first.approve(&signature()).await.unwrap().applied().unwrap();
        assert_eq!(doc.status, DocumentStatus::Signing);
        assert!(first.allowed_actions().is_empty());

        let second = session_for(&api, "b@x.com");
        second.open("doc-1").await.unwrap();
        let doc = second.approve(&signature()).await.unwrap().applied().unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(second.document().unwrap().status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_guard_refuses_before_network() {
        let api = Arc::new(MemoryDocumentApi::new("stranger@x.com"));
        api.insert(signing_doc("doc-1"));
        let session = session_for(&api, "stranger@x.com");
        session.open("doc-1").await.unwrap();
        let calls = api.calls();

        let err = session.approve(&signature()).await.unwrap_err();
        assert!(matches!(err, DocsignError::Guard(GuardViolation::NotAssigned { .. })));
        let err = session.reject("  ").await.unwrap_err();
        assert!(matches!(err, DocsignError::Guard(GuardViolation::EmptyReason)));
        assert_eq!(api.calls(), calls);
    }

    #[tokio::test]
    async fn test_signing_requires_image_data() {
        let api = Arc::new(MemoryDocumentApi::new("a@x.com"));
        api.insert(signing_doc("doc-1"));
        let session = session_for(&api, "a@x.com");
        session.open("doc-1").await.unwrap();

        let err = session.approve("").await.unwrap_err();
        assert!(matches!(err, DocsignError::Capture(CaptureError::EmptySignature)));
        let err = session.approve("not an image").await.unwrap_err();
        assert!(matches!(err, DocsignError::Capture(CaptureError::Decode(_))));
    }

    #[tokio::test]
    async fn test_missing_document_is_flagged() {
        let api = Arc::new(MemoryDocumentApi::new("a@x.com"));
        let session = session_for(&api, "a@x.com");

        let err = session.open("gone").await.unwrap_err();
        assert!(matches!(err, DocsignError::Api(ApiError::NotFound(_))));
        assert!(session.is_missing());
        assert!(session.document().is_none());
    }

    #[tokio::test]
    async fn test_reviewer_flow() {
        let api = Arc::new(MemoryDocumentApi::new("owner@x.com"));
        let mut doc = Document::new("doc-1", DocumentStatus::ReadyForReview);
        doc.tasks.push(Task::new(Role::Creator, "owner@x.com", "Owner"));
        api.insert(doc);

        let owner = session_for(&api, "owner@x.com");
        owner.open("doc-1").await.unwrap();
        assert!(matches!(
            owner.assign_reviewer(" ").await,
            Err(DocsignError::Guard(GuardViolation::EmptyReviewer))
        ));
        let doc = owner.assign_reviewer("rev@x.com").await.unwrap().applied().unwrap();
        assert_eq!(doc.status, DocumentStatus::Reviewing);
        assert!(owner.allowed_actions().is_empty());

        let reviewer = session_for(&api, "rev@x.com");
        reviewer.open("doc-1").await.unwrap();
        let doc = reviewer.reject("Wrong date").await.unwrap().applied().unwrap();
        assert_eq!(doc.status, DocumentStatus::Rejected);
    }

    #[tokio::test]
    async fn test_complete_setup_keeps_edits_on_failure() {
        let api = Arc::new(MemoryDocumentApi::new("ed@x.com"));
        let mut doc = Document::new("doc-1", DocumentStatus::Editing);
        doc.tasks.push(Task::new(Role::Editor, "ed@x.com", "Ed"));
        api.insert(doc);

        let session = session_for(&api, "ed@x.com");
        let doc = session.open("doc-1").await.unwrap().applied().unwrap();
        let mut editor = CoordinateFieldEditor::from_document(&doc);
        editor.place(FieldType::Plain, "Name", 1);

        api.fail_next(ApiError::Server {
            status: 503,
            message: "unavailable".to_string(),
        });
        let err = session.complete_setup(&mut editor).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(editor.is_dirty());
        assert_eq!(editor.fields().len(), 1);

        let doc = session.complete_setup(&mut editor).await.unwrap().applied().unwrap();
        assert_eq!(doc.status, DocumentStatus::ReadyForReview);
        assert_eq!(doc.data.coordinate_fields.len(), 1);
        assert!(!editor.is_dirty());
    }

    #[tokio::test]
    async fn test_complete_placement_through_session() {
        let api = Arc::new(MemoryDocumentApi::new("owner@x.com"));
        let mut doc = Document::new("doc-1", DocumentStatus::ReadyForReview);
        doc.tasks.push(Task::new(Role::Creator, "owner@x.com", "Owner"));
        api.insert(doc.clone());

        let session = session_for(&api, "owner@x.com");
        session.open("doc-1").await.unwrap();
        let draft = PlacementDraft::open(MemoryStore::new(), &doc);
        draft.place("rev@x.com", "Rev").unwrap();

        let outcome = session.complete_placement(&draft).await.unwrap();
        let Outcome::Applied(PlacementOutcome::Completed(updated)) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(updated.data.signature_fields.len(), 1);
        assert!(draft.is_empty());

        let elsewhere = Document::new("doc-2", DocumentStatus::Draft);
        let other = PlacementDraft::open(MemoryStore::new(), &elsewhere);
        assert!(matches!(
            session.complete_placement(&other).await,
            Err(DocsignError::WrongDocument { .. })
        ));
    }

    #[tokio::test]
    async fn test_signer_cannot_submit_placement() {
        let api = Arc::new(MemoryDocumentApi::new("a@x.com"));
        let doc = signing_doc("doc-1");
        api.insert(doc.clone());

        let session = session_for(&api, "a@x.com");
        session.open("doc-1").await.unwrap();
        let draft = PlacementDraft::open(MemoryStore::new(), &doc);
        draft.place("a@x.com", "A").unwrap();
        let calls = api.calls();

        assert!(matches!(
            session.complete_placement(&draft).await,
            Err(DocsignError::Guard(GuardViolation::WrongStatus {
                action: Action::PlaceSignatureFields,
                ..
            }))
        ));
        assert_eq!(api.calls(), calls);
        assert_eq!(draft.fields().len(), 1);
        assert!(api.document("doc-1").unwrap().data.signature_fields.is_empty());
    }

    #[tokio::test]
    async fn test_restart_after_rejection() {
        let api = Arc::new(MemoryDocumentApi::new("ed@x.com"));
        let mut doc = Document::new("doc-1", DocumentStatus::Rejected);
        doc.tasks.push(Task::new(Role::Editor, "ed@x.com", "Ed"));
        api.insert(doc);

        let session = session_for(&api, "ed@x.com");
        session.open("doc-1").await.unwrap();
        let doc = session.restart_after_rejection().await.unwrap().applied().unwrap();
        assert_eq!(doc.status, DocumentStatus::Editing);
    }

    /// Holds approve calls until released
    struct GatedApi {
        inner: Arc<MemoryDocumentApi>,
        gate: Notify,
    }

    #[async_trait]
    impl DocumentApi for GatedApi {
        async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
            self.inner.get_document(id).await
        }

        async fn update_document(
            &self,
            id: &str,
            update: &DocumentUpdate,
        ) -> Result<Document, ApiError> {
            self.inner.update_document(id, update).await
        }

        async fn approve(&self, id: &str, request: &ApproveRequest) -> Result<Document, ApiError> {
            self.gate.notified().await;
            self.inner.approve(id, request).await
        }

        async fn reject(&self, id: &str, request: &RejectRequest) -> Result<Document, ApiError> {
            self.inner.reject(id, request).await
        }

        async fn assign_reviewer(
            &self,
            id: &str,
            request: &AssignReviewerRequest,
        ) -> Result<Document, ApiError> {
            self.inner.assign_reviewer(id, request).await
        }

        async fn mark_viewed(&self, id: &str) -> Result<(), ApiError> {
            self.inner.mark_viewed(id).await
        }
    }

    #[tokio::test]
    async fn test_result_for_previous_document_is_discarded() {
        let inner = Arc::new(MemoryDocumentApi::new("a@x.com"));
        inner.insert(signing_doc("doc-1"));
        inner.insert(signing_doc("doc-2"));
        let session = DocumentSession::new(
            GatedApi {
                inner: inner.clone(),
                gate: Notify::new(),
            },
            Actor::new("a@x.com", "A"),
        );
        session.open("doc-1").await.unwrap();

        let sig = signature();
        let (approved, _) = tokio::join!(session.approve(&sig), async {
            session.open("doc-2").await.unwrap();
            session.api().gate.notify_one();
        });

        assert_eq!(approved.unwrap(), Outcome::Discarded);
        assert_eq!(session.document().unwrap().id, "doc-2");
        // The stale call still reached the server
        assert!(inner.document("doc-1").unwrap().data.signatures.contains_key("a@x.com"));
    }

    #[tokio::test]
    async fn test_mark_viewed_never_fails() {
        let api = Arc::new(MemoryDocumentApi::new("a@x.com"));
        api.insert(signing_doc("doc-1"));
        let session = session_for(&api, "a@x.com");

        session.mark_viewed().await;
        assert!(api.viewed().is_empty());

        session.open("doc-1").await.unwrap();
        api.fail_next(ApiError::Transport("reset".to_string()));
        session.mark_viewed().await;
        session.mark_viewed().await;
        assert_eq!(api.viewed(), vec![("doc-1".to_string(), "a@x.com".to_string())]);
    }
}
