//! Locally archived signature images

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entry in the client-local signature vault.
///
/// Never sent to the server except as the payload of a submitted approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSignature {
    pub id: String,
    pub name: String,
    /// Image-data string (`data:image/png;base64,...`)
    pub data: String,
    pub created_at: DateTime<Utc>,
}
