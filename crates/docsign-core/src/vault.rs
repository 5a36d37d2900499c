//! Local signature vault
//!
//! Named, reusable signature images kept in client-local storage under a
//! single key. The whole list is rewritten on every change.

use chrono::Utc;
use shared_types::SavedSignature;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::codec::is_image_data;
use crate::storage::{KeyValueStore, StorageError};

/// Storage key holding the serialized vault
pub const VAULT_KEY: &str = "savedSignatures";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Signature name must not be empty")]
    EmptyName,

    #[error("Signature data is not a PNG image")]
    InvalidImage,

    #[error("Saved signature not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct SignatureVault<S> {
    store: S,
    entries: Vec<SavedSignature>,
}

impl<S: KeyValueStore> SignatureVault<S> {
    /// Load the vault. Missing, unreadable, or corrupt data opens an empty
    /// vault.
    pub fn open(store: S) -> Self {
        let entries = load_entries(&store);
        Self { store, entries }
    }

    /// Re-read the stored list, discarding the in-memory copy
    pub fn reload(&mut self) {
        self.entries = load_entries(&self.store);
    }

    pub fn list(&self) -> &[SavedSignature] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&SavedSignature> {
        self.entries.iter().find(|s| s.id == id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Add a named signature. Nothing changes in memory if the write fails.
    pub fn add(&mut self, name: &str, data: &str) -> Result<SavedSignature, VaultError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::EmptyName);
        }
        if !is_image_data(data) {
            return Err(VaultError::InvalidImage);
        }

        let entry = SavedSignature {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            data: data.to_string(),
            created_at: Utc::now(),
        };

        let mut next = self.entries.clone();
        next.push(entry.clone());
        self.persist(&next)?;
        self.entries = next;

        info!(signature_id = %entry.id, "signature saved to vault");
        Ok(entry)
    }

    /// Remove a signature by id. An emptied vault is stored as `[]`.
    pub fn remove(&mut self, id: &str) -> Result<SavedSignature, VaultError> {
        let position = self
            .entries
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;

        let mut next = self.entries.clone();
        let removed = next.remove(position);
        self.persist(&next)?;
        self.entries = next;

        info!(signature_id = %id, "signature removed from vault");
        Ok(removed)
    }

    fn persist(&self, entries: &[SavedSignature]) -> Result<(), StorageError> {
        let json = serde_json::to_string(entries).map_err(|e| StorageError::Serialize {
            key: VAULT_KEY.to_string(),
            message: e.to_string(),
        })?;
        self.store.set(VAULT_KEY, &json)
    }
}

fn load_entries<S: KeyValueStore>(store: &S) -> Vec<SavedSignature> {
    let raw = match store.get(VAULT_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "signature vault unreadable, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<SavedSignature>>(&raw) {
        Ok(entries) => {
            debug!(count = entries.len(), "signature vault loaded");
            entries
        }
        Err(e) => {
            warn!(error = %e, "signature vault corrupt, starting empty");
            Vec::new()
        }
    }
}
