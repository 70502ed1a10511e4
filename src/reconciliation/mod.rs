//! Approval reconciliation.
//!
//! The [`Reconciler`] brings the record store in line with the identity
//! provider and applies explicit approvals. It owns no global state: the
//! store and the provider are handed in at construction.

mod execute;
mod plan;

pub use plan::BackfillPlan;

use crate::approval::{DEFAULT_BACKFILL_NOTE, DEFAULT_COLLECTION};
use crate::auth::AuthError;
use crate::config::DaemonConfig;
use crate::identity::{IdentityError, IdentityLister};
use crate::store::{KeyedStore, StoreError, StorePath};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(#[from] AuthError),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Operation cancelled before writing")]
    Cancelled,

    #[error("Failed to encode record: {0}")]
    EncodeError(#[from] serde_json::Error),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        ReconcileError::BackendUnavailable(err.to_string())
    }
}

impl From<IdentityError> for ReconcileError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Cancelled => ReconcileError::Cancelled,
            other => ReconcileError::BackendUnavailable(other.to_string()),
        }
    }
}

/// Counts reported by bulk operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub processed_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
}

/// Settings the Reconciler needs from configuration
#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    /// Top-level store key holding approval records
    pub collection: String,
    /// `note` stored on backfilled records
    pub backfill_note: String,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            backfill_note: DEFAULT_BACKFILL_NOTE.to_string(),
        }
    }
}

impl From<&DaemonConfig> for ReconcilerOptions {
    fn from(config: &DaemonConfig) -> Self {
        Self {
            collection: config.collection.clone(),
            backfill_note: config.backfill_note.clone(),
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn KeyedStore>,
    identities: Arc<dyn IdentityLister>,
    collection: StorePath,
    backfill_note: String,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn KeyedStore>,
        identities: Arc<dyn IdentityLister>,
        options: ReconcilerOptions,
    ) -> Result<Self, ReconcileError> {
        let collection = StorePath::root().child(&options.collection).map_err(|_| {
            ReconcileError::InvalidArgument(format!(
                "collection '{}' is not a valid store key",
                options.collection
            ))
        })?;

        Ok(Self {
            store,
            identities,
            collection,
            backfill_note: options.backfill_note,
        })
    }

    /// Path of the record for `id`
    fn record_path(&self, id: &str) -> Result<StorePath, ReconcileError> {
        if id.is_empty() {
            return Err(ReconcileError::InvalidArgument("uid is required".to_string()));
        }
        self.collection
            .child(id)
            .map_err(|_| ReconcileError::InvalidArgument(format!("'{}' is not a valid uid", id)))
    }
}

fn require_attribution(attributed_by: &str) -> Result<(), ReconcileError> {
    if attributed_by.trim().is_empty() {
        return Err(ReconcileError::InvalidArgument(
            "approvedBy attribution is required".to_string(),
        ));
    }
    Ok(())
}
