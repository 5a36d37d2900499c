//! Documents, role assignments, and lifecycle status as exchanged with the
//! persistence API
//!
//! The persistence API owns these records. Clients hold a cached, possibly
//! stale copy and replace it wholesale after every mutating call.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::field::{CoordinateField, SignatureField};

/// Lifecycle status of a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Editing,
    ReadyForReview,
    Reviewing,
    Signing,
    Completed,
    Rejected,
}

impl DocumentStatus {
    /// Terminal states accept no further role actions
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::Editing => "EDITING",
            DocumentStatus::ReadyForReview => "READY_FOR_REVIEW",
            DocumentStatus::Reviewing => "REVIEWING",
            DocumentStatus::Signing => "SIGNING",
            DocumentStatus::Completed => "COMPLETED",
            DocumentStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a participant holds on a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Creator,
    Editor,
    Reviewer,
    Signer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Creator => "CREATOR",
            Role::Editor => "EDITOR",
            Role::Reviewer => "REVIEWER",
            Role::Signer => "SIGNER",
        };
        f.write_str(s)
    }
}

/// Assignment of one participant to one role on a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub role: Role,
    pub assigned_user_identifier: String,
    #[serde(default)]
    pub assigned_user_name: String,
    /// Only meaningful for EDITOR tasks
    #[serde(default)]
    pub can_assign_reviewer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(role: Role, identifier: &str, name: &str) -> Self {
        Self {
            role,
            assigned_user_identifier: identifier.to_string(),
            assigned_user_name: name.to_string(),
            can_assign_reviewer: false,
            created_at: None,
        }
    }

    /// Whether this task is assigned to the given participant.
    /// Identifiers are email addresses, compared case-insensitively.
    pub fn is_assigned_to(&self, identifier: &str) -> bool {
        self.assigned_user_identifier
            .trim()
            .eq_ignore_ascii_case(identifier.trim())
    }
}

/// Field aggregate stored under `Document.data`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentData {
    /// Order is z-order when rendering
    #[serde(default)]
    pub coordinate_fields: Vec<CoordinateField>,
    #[serde(default)]
    pub signature_fields: Vec<SignatureField>,
    /// Participant identifier to image-data string
    #[serde(default)]
    pub signatures: BTreeMap<String, String>,
}

/// The signable unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Stored path of the page raster image, used to derive page URLs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default)]
    pub data: DocumentData,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Document {
    pub fn new(id: &str, status: DocumentStatus) -> Self {
        Self {
            id: id.to_string(),
            status,
            name: None,
            image_path: None,
            data: DocumentData::default(),
            tasks: Vec::new(),
        }
    }

    /// All tasks with the given role, in document order
    pub fn tasks_with_role(&self, role: Role) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.role == role)
    }

    /// The task of `role` held by `identifier`, if any
    pub fn task_for(&self, identifier: &str, role: Role) -> Option<&Task> {
        self.tasks_with_role(role)
            .find(|t| t.is_assigned_to(identifier))
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.tasks.iter().any(|t| t.role == role)
    }
}
