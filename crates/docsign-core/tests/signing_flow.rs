//! End-to-end lifecycle runs against the in-memory persistence API

use std::sync::Arc;

use docsign_core::capture::{to_data_url, Surface, INK};
use docsign_core::lifecycle::{signing_progress, SigningProgress};
use docsign_core::{
    Action, Actor, CoordinateFieldEditor, DocumentSession, MemoryDocumentApi, MemoryStore,
    PlacementDraft, PlacementOutcome,
};
use pretty_assertions::assert_eq;
use shared_types::{
    CoordinateField, Document, DocumentStatus, FieldRect, FieldType, Point, Role, Task,
};

fn ink_signature() -> String {
    let mut surface = Surface::new(40, 20);
    surface.stroke_segment(Point::new(2.0, 10.0), Point::new(38.0, 10.0), 2.0, INK);
    to_data_url(&surface).unwrap()
}

fn session(
    api: &Arc<MemoryDocumentApi>,
    email: &str,
) -> DocumentSession<Arc<MemoryDocumentApi>> {
    api.set_identity(email);
    DocumentSession::new(api.clone(), Actor::new(email, email))
}

fn draft_document() -> Document {
    let mut doc = Document::new("contract-7", DocumentStatus::Draft);
    doc.tasks = vec![
        Task::new(Role::Creator, "owner@example.com", "Owner"),
        Task::new(Role::Editor, "editor@example.com", "Editor"),
        Task::new(Role::Signer, "alice@example.com", "Alice"),
        Task::new(Role::Signer, "bob@example.com", "Bob"),
    ];
    doc
}

#[tokio::test]
async fn full_run_from_draft_to_completed() {
    let api = Arc::new(MemoryDocumentApi::new("editor@example.com"));
    api.insert(draft_document());

    // Editor places one signature field per signer and hands off to review
    let editor_session = session(&api, "editor@example.com");
    let doc = editor_session.open("contract-7").await.unwrap().applied().unwrap();
    assert_eq!(editor_session.allowed_actions(), vec![Action::CompleteSetup]);

    let mut editor = CoordinateFieldEditor::from_document(&doc);
    for (email, name) in [("alice@example.com", "Alice"), ("bob@example.com", "Bob")] {
        let field = editor.place(FieldType::SignerSignature, "Sign here", 1);
        editor.assign(&field.id, email, name).unwrap();
    }
    let doc = editor_session
        .complete_setup(&mut editor)
        .await
        .unwrap()
        .applied()
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::ReadyForReview);

    // Creator assigns a reviewer, who approves into signing
    let owner = session(&api, "owner@example.com");
    owner.open("contract-7").await.unwrap();
    owner.assign_reviewer("rev@example.com").await.unwrap();

    let reviewer = session(&api, "rev@example.com");
    reviewer.open("contract-7").await.unwrap();
    let doc = reviewer.approve("").await.unwrap().applied().unwrap();
    assert_eq!(doc.status, DocumentStatus::Signing);

    // First of two signers: the document stays in signing
    let alice = session(&api, "alice@example.com");
    alice.open("contract-7").await.unwrap();
    let doc = alice.approve(&ink_signature()).await.unwrap().applied().unwrap();
    assert_eq!(doc.status, DocumentStatus::Signing);
    assert_eq!(signing_progress(&doc), SigningProgress { signers: 2, signed: 1 });

    // Second signer: the call's own response lags, the re-fetch shows completion
    let bob = session(&api, "bob@example.com");
    bob.open("contract-7").await.unwrap();
    let doc = bob.approve(&ink_signature()).await.unwrap().applied().unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert!(bob.allowed_actions().is_empty());
}

#[test]
fn two_signers_one_signed_stays_signing() {
    let mut doc = Document::new("d-2", DocumentStatus::Signing);
    doc.tasks = vec![
        Task::new(Role::Signer, "a@example.com", "A"),
        Task::new(Role::Signer, "b@example.com", "B"),
    ];
    for (id, email, value) in [
        ("f1", "a@example.com", ink_signature()),
        ("f2", "b@example.com", String::new()),
    ] {
        let mut field = CoordinateField::new(id, FieldType::SignerSignature, FieldRect::DEFAULT);
        field.signer_email = Some(email.to_string());
        field.value = value;
        doc.data.coordinate_fields.push(field);
    }

    let progress = signing_progress(&doc);
    assert!(!progress.is_complete());
    assert_eq!(progress.outstanding(), 1);
    assert_eq!(doc.status, DocumentStatus::Signing);
}

#[tokio::test]
async fn placement_survives_a_failed_completion() {
    let api = Arc::new(MemoryDocumentApi::new("owner@example.com"));
    let mut doc = draft_document();
    doc.status = DocumentStatus::ReadyForReview;
    api.insert(doc.clone());

    let store = Arc::new(MemoryStore::new());
    let owner = session(&api, "owner@example.com");
    owner.open("contract-7").await.unwrap();

    let draft = PlacementDraft::open(store.clone(), &doc);
    let field = draft.place("rev@example.com", "Reviewer").unwrap();
    draft.drag(&field.id, -150.0, -150.0).unwrap();

    api.fail_next(docsign_core::ApiError::Transport("connection reset".to_string()));
    let err = owner.complete_placement(&draft).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(draft.fields().len(), 1);
    assert!(store.contains("signatureFields_contract-7"));

    // Retry is a plain re-invocation
    let outcome = owner.complete_placement(&draft).await.unwrap().applied().unwrap();
    let PlacementOutcome::Completed(updated) = outcome else {
        panic!("expected completion");
    };
    let placed = &updated.data.signature_fields[0];
    assert_eq!((placed.rect.x, placed.rect.y), (0.0, 0.0));
    assert!(draft.is_empty());
    assert!(!store.contains("signatureFields_contract-7"));
}
