//! Document lifecycle state machine
//!
//! ```text
//! DRAFT -> EDITING -> READY_FOR_REVIEW -> REVIEWING -> SIGNING -> COMPLETED
//!                            |               |            |
//!                            +-------> REJECTED <---------+
//! ```
//!
//! Guards run client-side before the matching network call. The server is
//! the final authority, so every guard is recomputed from a freshly fetched
//! document after each call rather than from local state.

use std::collections::BTreeSet;
use std::fmt;

use shared_types::{Document, DocumentStatus, Role};
use thiserror::Error;

/// The participant acting through this client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Email address, matched case-insensitively against task assignees
    pub identifier: String,
    pub name: String,
}

impl Actor {
    pub fn new(identifier: &str, name: &str) -> Self {
        Self {
            identifier: identifier.trim().to_string(),
            name: name.trim().to_string(),
        }
    }
}

/// Role actions that move a document through the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Editor or creator hands the prepared document to review
    CompleteSetup,
    AssignReviewer,
    /// Reviewer approval, or a signer's signature while signing
    Approve,
    Reject,
    /// Submit buffered signature-field placements
    PlaceSignatureFields,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::CompleteSetup,
        Action::AssignReviewer,
        Action::Approve,
        Action::Reject,
        Action::PlaceSignatureFields,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::CompleteSetup => "complete setup",
            Action::AssignReviewer => "assign reviewer",
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::PlaceSignatureFields => "place signature fields",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("Cannot {action} while the document is {status}")]
    WrongStatus {
        action: Action,
        status: DocumentStatus,
    },

    #[error("You are not assigned as {role} on this document")]
    NotAssigned { role: Role },

    #[error("You are not allowed to assign a reviewer")]
    NoAssignAuthority,

    #[error("A reviewer is already assigned")]
    ReviewerAlreadyAssigned,

    #[error("You have already signed this document")]
    AlreadySigned,

    #[error("A reason is required to reject")]
    EmptyReason,

    #[error("Reviewer email must not be empty")]
    EmptyReviewer,
}

/// Check whether `actor` may perform `action` on `doc` as it stands
pub fn check(doc: &Document, actor: &Actor, action: Action) -> Result<(), GuardViolation> {
    let status = doc.status;
    let wrong_status = || GuardViolation::WrongStatus { action, status };

    match action {
        Action::CompleteSetup => {
            if !matches!(status, DocumentStatus::Draft | DocumentStatus::Editing) {
                return Err(wrong_status());
            }
            if doc.task_for(&actor.identifier, Role::Creator).is_none()
                && doc.task_for(&actor.identifier, Role::Editor).is_none()
            {
                return Err(GuardViolation::NotAssigned { role: Role::Editor });
            }
            Ok(())
        }

        Action::AssignReviewer => {
            if status != DocumentStatus::ReadyForReview {
                return Err(wrong_status());
            }
            if !has_assign_authority(doc, actor) {
                return Err(GuardViolation::NoAssignAuthority);
            }
            if doc.has_role(Role::Reviewer) {
                return Err(GuardViolation::ReviewerAlreadyAssigned);
            }
            Ok(())
        }

        // Placement is part of preparing the document for review
        Action::PlaceSignatureFields => {
            if !matches!(
                status,
                DocumentStatus::Draft | DocumentStatus::Editing | DocumentStatus::ReadyForReview
            ) {
                return Err(wrong_status());
            }
            if !has_assign_authority(doc, actor) {
                return Err(GuardViolation::NoAssignAuthority);
            }
            Ok(())
        }

        Action::Approve | Action::Reject => match status {
            DocumentStatus::ReadyForReview | DocumentStatus::Reviewing => {
                if doc.task_for(&actor.identifier, Role::Reviewer).is_none() {
                    return Err(GuardViolation::NotAssigned {
                        role: Role::Reviewer,
                    });
                }
                Ok(())
            }
            DocumentStatus::Signing => {
                if doc.task_for(&actor.identifier, Role::Signer).is_none() {
                    return Err(GuardViolation::NotAssigned { role: Role::Signer });
                }
                if has_signed(doc, &actor.identifier) {
                    return Err(GuardViolation::AlreadySigned);
                }
                Ok(())
            }
            _ => Err(wrong_status()),
        },
    }
}

/// The creator, or an editor flagged `canAssignReviewer`
fn has_assign_authority(doc: &Document, actor: &Actor) -> bool {
    doc.task_for(&actor.identifier, Role::Creator).is_some()
        || doc
            .tasks_with_role(Role::Editor)
            .any(|t| t.is_assigned_to(&actor.identifier) && t.can_assign_reviewer)
}

/// Every action `actor` may currently perform on `doc`
pub fn allowed_actions(doc: &Document, actor: &Actor) -> Vec<Action> {
    Action::ALL
        .into_iter()
        .filter(|action| check(doc, actor, *action).is_ok())
        .collect()
}

/// Trimmed rejection reason, refusing blank text
pub fn validate_reject_reason(reason: &str) -> Result<String, GuardViolation> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(GuardViolation::EmptyReason);
    }
    Ok(reason.to_string())
}

/// Whether `identifier` has a non-empty value on one of their own
/// signature-variant fields
pub fn has_signed(doc: &Document, identifier: &str) -> bool {
    doc.data
        .coordinate_fields
        .iter()
        .any(|f| f.is_signed_by(identifier))
}

/// Signers assigned versus signers who have signed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningProgress {
    pub signers: usize,
    pub signed: usize,
}

impl SigningProgress {
    pub fn outstanding(&self) -> usize {
        self.signers.saturating_sub(self.signed)
    }

    pub fn is_complete(&self) -> bool {
        self.signers > 0 && self.outstanding() == 0
    }
}

/// Count distinct signers and how many of them have signed. A signer holding
/// several SIGNER tasks counts once.
pub fn signing_progress(doc: &Document) -> SigningProgress {
    let signers: BTreeSet<String> = doc
        .tasks_with_role(Role::Signer)
        .map(|t| t.assigned_user_identifier.trim().to_ascii_lowercase())
        .collect();
    let signed = signers.iter().filter(|s| has_signed(doc, s)).count();

    SigningProgress {
        signers: signers.len(),
        signed,
    }
}

/// The status the server is expected to report after `actor` successfully
/// performs `action`. Used only to flag divergence; the re-fetched document
/// always wins.
pub fn expected_status_after(doc: &Document, actor: &Actor, action: Action) -> DocumentStatus {
    match (action, doc.status) {
        (Action::CompleteSetup, _) => DocumentStatus::ReadyForReview,
        (Action::AssignReviewer | Action::PlaceSignatureFields, status) => status,
        (Action::Reject, _) => DocumentStatus::Rejected,
        (Action::Approve, DocumentStatus::ReadyForReview | DocumentStatus::Reviewing) => {
            DocumentStatus::Signing
        }
        (Action::Approve, DocumentStatus::Signing) => {
            let progress = signing_progress(doc);
            let after = if has_signed(doc, &actor.identifier) {
                progress.signed
            } else {
                progress.signed + 1
            };
            if after >= progress.signers {
                DocumentStatus::Completed
            } else {
                DocumentStatus::Signing
            }
        }
        (Action::Approve, status) => status,
    }
}

/// Whether the machine has an edge `from -> to`. A signer approval that is
/// not the last one stays on SIGNING.
pub fn can_transition(from: DocumentStatus, to: DocumentStatus) -> bool {
    use DocumentStatus::*;
    matches!(
        (from, to),
        (Draft, Editing)
            | (Draft, ReadyForReview)
            | (Editing, ReadyForReview)
            | (ReadyForReview, Reviewing)
            | (ReadyForReview, Signing)
            | (ReadyForReview, Rejected)
            | (Reviewing, Signing)
            | (Reviewing, Rejected)
            | (Signing, Signing)
            | (Signing, Completed)
            | (Signing, Rejected)
    )
}

/// Start a correction run after a rejection. This is a new run of the
/// machine from EDITING, not an edge out of REJECTED.
pub fn restart_after_rejection(
    doc: &Document,
    actor: &Actor,
) -> Result<DocumentStatus, GuardViolation> {
    if doc.status != DocumentStatus::Rejected {
        return Err(GuardViolation::WrongStatus {
            action: Action::CompleteSetup,
            status: doc.status,
        });
    }
    if doc.task_for(&actor.identifier, Role::Creator).is_none()
        && doc.task_for(&actor.identifier, Role::Editor).is_none()
    {
        return Err(GuardViolation::NotAssigned { role: Role::Editor });
    }
    Ok(DocumentStatus::Editing)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use shared_types::Task;

    fn any_status() -> impl Strategy<Value = DocumentStatus> {
        prop_oneof![
            Just(DocumentStatus::Draft),
            Just(DocumentStatus::Editing),
            Just(DocumentStatus::ReadyForReview),
            Just(DocumentStatus::Reviewing),
            Just(DocumentStatus::Signing),
            Just(DocumentStatus::Completed),
            Just(DocumentStatus::Rejected),
        ]
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::Creator),
            Just(Role::Editor),
            Just(Role::Reviewer),
            Just(Role::Signer),
        ]
    }

    proptest! {
        /// Property: terminal documents allow no role action to anyone
        #[test]
        fn terminal_states_allow_nothing(
            status in any_status(),
            roles in prop::collection::vec((any_role(), any::<bool>()), 0..6),
        ) {
            prop_assume!(status.is_terminal());
            let mut doc = Document::new("d", status);
            for (role, flag) in roles {
                let mut task = Task::new(role, "me@x.com", "Me");
                task.can_assign_reviewer = flag;
                doc.tasks.push(task);
            }
            prop_assert!(allowed_actions(&doc, &Actor::new("me@x.com", "Me")).is_empty());
        }

        /// Property: no edge leaves a terminal state
        #[test]
        fn terminal_states_have_no_outgoing_edges(from in any_status(), to in any_status()) {
            if from.is_terminal() {
                prop_assert!(!can_transition(from, to));
            }
        }

        /// Property: a participant with no tasks can never act
        #[test]
        fn strangers_cannot_act(status in any_status(), role in any_role()) {
            let mut doc = Document::new("d", status);
            doc.tasks.push(Task::new(role, "member@x.com", "Member"));
            prop_assert!(allowed_actions(&doc, &Actor::new("stranger@x.com", "S")).is_empty());
        }
    }
}
