//! Persistence API seam
//!
//! The server owns documents and tasks and is the final authority on every
//! transition. This module defines the calls the client makes, the request
//! bodies, and the error taxonomy that callers surface to users.

mod http;
mod memory;

pub use http::HttpDocumentApi;
pub use memory::MemoryDocumentApi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{Document, DocumentData, DocumentStatus};
use thiserror::Error;

/// Body of `PUT /documents/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdate {
    pub data: DocumentData,
    /// Only sent by edits that also move the document to a new status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,
}

/// Body of `POST /documents/{id}/approve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub signature_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_email: Option<String>,
}

/// Body of `POST /documents/{id}/reject`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_email: Option<String>,
}

/// Body of `POST /documents/{id}/assign-reviewer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignReviewerRequest {
    pub reviewer_email: String,
}

/// Failures of a persistence API call.
///
/// None of these are retried automatically; retry is always an explicit user
/// re-invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// HTTP 401
    #[error("Session expired")]
    SessionExpired,

    /// HTTP 403
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// HTTP 404
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Other 4xx; the message is the server's, verbatim
    #[error("Rejected by server: {0}")]
    Validation(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-success HTTP status and its response body
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = server_message(body);
        match status {
            401 => ApiError::SessionExpired,
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            400..=499 => ApiError::Validation(message),
            _ => ApiError::Server { status, message },
        }
    }

    /// Authorization failures are fatal to the attempted action
    pub fn is_authorization(&self) -> bool {
        matches!(self, ApiError::SessionExpired | ApiError::Forbidden(_))
    }

    /// Whether a user re-invocation may reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Server { .. } | ApiError::Transport(_) | ApiError::Decode(_)
        )
    }

    /// Message shown to the person who triggered the action
    pub fn user_message(&self) -> String {
        match self {
            ApiError::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            ApiError::Forbidden(_) => "You are not allowed to perform this action.".to_string(),
            ApiError::NotFound(_) => "This document is no longer available.".to_string(),
            ApiError::Validation(message) => message.clone(),
            ApiError::Server { .. } | ApiError::Transport(_) | ApiError::Decode(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"error": "..."}`, `{"message": "..."}`, or plain text.
fn server_message(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["error", "message"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    trimmed.to_string()
}

/// The persistence API calls the client makes
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// `GET /documents/{id}`
    async fn get_document(&self, id: &str) -> Result<Document, ApiError>;

    /// `PUT /documents/{id}`
    async fn update_document(&self, id: &str, update: &DocumentUpdate)
        -> Result<Document, ApiError>;

    /// `POST /documents/{id}/approve`
    async fn approve(&self, id: &str, request: &ApproveRequest) -> Result<Document, ApiError>;

    /// `POST /documents/{id}/reject`
    async fn reject(&self, id: &str, request: &RejectRequest) -> Result<Document, ApiError>;

    /// `POST /documents/{id}/assign-reviewer`
    async fn assign_reviewer(
        &self,
        id: &str,
        request: &AssignReviewerRequest,
    ) -> Result<Document, ApiError>;

    /// `POST /documents/{id}/mark-viewed`
    async fn mark_viewed(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl<T: DocumentApi + ?Sized> DocumentApi for std::sync::Arc<T> {
    async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
        (**self).get_document(id).await
    }

    async fn update_document(
        &self,
        id: &str,
        update: &DocumentUpdate,
    ) -> Result<Document, ApiError> {
        (**self).update_document(id, update).await
    }

    async fn approve(&self, id: &str, request: &ApproveRequest) -> Result<Document, ApiError> {
        (**self).approve(id, request).await
    }

    async fn reject(&self, id: &str, request: &RejectRequest) -> Result<Document, ApiError> {
        (**self).reject(id, request).await
    }

    async fn assign_reviewer(
        &self,
        id: &str,
        request: &AssignReviewerRequest,
    ) -> Result<Document, ApiError> {
        (**self).assign_reviewer(id, request).await
    }

    async fn mark_viewed(&self, id: &str) -> Result<(), ApiError> {
        (**self).mark_viewed(id).await
    }
}
