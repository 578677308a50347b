//! Per-project claim queue.
//!
//! One ordered, deferrable, bounded queue of not-yet-delivered claims per
//! project, persisted as a single JSON document under the vault key
//! `"claims"`. Delivery order is claim id ascending among the claims that
//! are currently due; a claim with a future `until` stays invisible to
//! [`Claims::take`] until the clock passes it.
//!
//! The queue is bounded: an [`Claims::add`] that finds the queue already
//! holding more than the configured ceiling fails with
//! [`ClaimsError::Overflow`] instead of appending. The ceiling exists to
//! fail fast on runaway handler chains (a handler that emits claims in a
//! cycle) rather than let a queue grow without bound.
//!
//! Every operation is one scoped acquire/commit on the underlying vault
//! item, so `take` is atomic with respect to any other caller on the same
//! project: no two `take` calls can return the same claim.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::claim::{Claim, ClaimDraft};
use crate::vault::{Item, ProjectId, Vault, VaultError};

/// Vault key of the claim queue document.
pub const CLAIMS_KEY: &str = "claims";

/// Default hard ceiling on outstanding claims per project.
pub const DEFAULT_QUEUE_CEILING: usize = 100;

/// Errors surfaced by claim queue operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClaimsError {
    /// A caller attempted to add zero claims. Programmer error, surfaced
    /// immediately.
    #[error("cannot add an empty claim batch")]
    EmptyBatch,

    /// The queue already holds more outstanding claims than the ceiling
    /// allows. Nothing was appended.
    #[error("claim queue overflow in {project}: {size} outstanding, ceiling {ceiling}")]
    Overflow {
        /// The project whose queue is full.
        project: ProjectId,
        /// Outstanding claims at the time of the check.
        size: usize,
        /// The configured ceiling.
        ceiling: usize,
    },

    /// The stored queue document could not be decoded.
    #[error("claim store for {project} is corrupt: {reason}")]
    Corrupt {
        /// The project whose document is unreadable.
        project: ProjectId,
        /// Decoder diagnostic.
        reason: String,
    },

    /// The underlying vault failed.
    #[error(transparent)]
    Storage(#[from] VaultError),
}

/// Stored representation of the queue.
///
/// `next_id` is a monotonic allocator: ids stay unique within the current
/// queue even after arbitrary removals.
#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueDoc {
    next_id: u64,
    #[serde(default)]
    claims: Vec<Claim>,
}

/// Handle on one project's claim queue.
#[derive(Clone)]
pub struct Claims {
    project: ProjectId,
    vault: Arc<dyn Vault>,
    ceiling: usize,
}

impl Claims {
    /// Binds a queue handle to a project with the default overflow
    /// ceiling.
    #[must_use]
    pub fn new(project: ProjectId, vault: Arc<dyn Vault>) -> Self {
        Self {
            project,
            vault,
            ceiling: DEFAULT_QUEUE_CEILING,
        }
    }

    /// Overrides the overflow ceiling.
    #[must_use]
    pub const fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// The project this handle is bound to.
    #[must_use]
    pub const fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Idempotently ensures the queue document exists in an initial
    /// empty, well-formed state.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::Storage`] if the vault fails.
    pub fn bootstrap(&self) -> Result<(), ClaimsError> {
        let mut item = self.vault.acquire(&self.project, CLAIMS_KEY)?;
        if item.read()?.is_some() {
            return Ok(());
        }
        let doc = QueueDoc {
            next_id: 1,
            claims: Vec::new(),
        };
        item.write(Self::encode(&doc));
        item.commit()?;
        Ok(())
    }

    /// Appends a non-empty batch of drafts as one atomic storage
    /// mutation, assigning each the next sequential id. Returns the
    /// assigned ids.
    ///
    /// # Errors
    ///
    /// - [`ClaimsError::EmptyBatch`] if `drafts` is empty.
    /// - [`ClaimsError::Overflow`] if the queue already exceeds the
    ///   ceiling; the check runs before anything is appended and the
    ///   queue is left unchanged.
    /// - [`ClaimsError::Storage`] / [`ClaimsError::Corrupt`] on vault or
    ///   decode failure.
    pub fn add(&self, drafts: &[ClaimDraft]) -> Result<Vec<u64>, ClaimsError> {
        if drafts.is_empty() {
            return Err(ClaimsError::EmptyBatch);
        }
        let mut item = self.vault.acquire(&self.project, CLAIMS_KEY)?;
        let mut doc = self.load(item.as_ref())?;
        let size = doc.claims.len();
        if size > self.ceiling {
            return Err(ClaimsError::Overflow {
                project: self.project.clone(),
                size,
                ceiling: self.ceiling,
            });
        }
        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = doc.next_id;
            doc.next_id += 1;
            ids.push(id);
            doc.claims.push(draft.clone().assemble(id));
        }
        item.write(Self::encode(&doc));
        item.commit()?;
        debug!(
            project = %self.project,
            count = ids.len(),
            first_id = ids[0],
            "Claims appended"
        );
        Ok(ids)
    }

    /// Removes and returns the due claim with the smallest id, or `None`
    /// when nothing is due. Select-and-remove happens under the vault's
    /// exclusive item lock, atomically with respect to other callers.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::Storage`] / [`ClaimsError::Corrupt`] on
    /// vault or decode failure; the queue is unchanged in that case.
    pub fn take(&self) -> Result<Option<Claim>, ClaimsError> {
        self.take_at(Utc::now())
    }

    /// [`Claims::take`] against an explicit instant. Exposed so tests can
    /// drive deferred delivery without sleeping.
    ///
    /// # Errors
    ///
    /// Same as [`Claims::take`].
    pub fn take_at(&self, now: DateTime<Utc>) -> Result<Option<Claim>, ClaimsError> {
        let mut item = self.vault.acquire(&self.project, CLAIMS_KEY)?;
        let mut doc = self.load(item.as_ref())?;
        let due = doc
            .claims
            .iter()
            .enumerate()
            .filter(|(_, claim)| claim.is_due(now))
            .min_by_key(|(_, claim)| claim.id);
        let Some((index, _)) = due else {
            return Ok(None);
        };
        let claim = doc.claims.remove(index);
        item.write(Self::encode(&doc));
        item.commit()?;
        debug!(
            project = %self.project,
            claim_id = claim.id,
            kind = %claim.kind,
            "Claim taken"
        );
        Ok(Some(claim))
    }

    /// Read-only view of the due claims, ascending by id. Never mutates
    /// the queue.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::Storage`] / [`ClaimsError::Corrupt`] on
    /// vault or decode failure.
    pub fn iterate(&self) -> Result<Vec<Claim>, ClaimsError> {
        self.iterate_at(Utc::now())
    }

    /// [`Claims::iterate`] against an explicit instant.
    ///
    /// # Errors
    ///
    /// Same as [`Claims::iterate`].
    pub fn iterate_at(&self, now: DateTime<Utc>) -> Result<Vec<Claim>, ClaimsError> {
        let item = self.vault.acquire(&self.project, CLAIMS_KEY)?;
        let doc = self.load(item.as_ref())?;
        let mut due: Vec<Claim> = doc
            .claims
            .into_iter()
            .filter(|claim| claim.is_due(now))
            .collect();
        due.sort_by_key(|claim| claim.id);
        Ok(due)
    }

    fn load(&self, item: &dyn Item) -> Result<QueueDoc, ClaimsError> {
        match item.read()? {
            None => Ok(QueueDoc {
                next_id: 1,
                claims: Vec::new(),
            }),
            Some(body) => serde_json::from_str(&body).map_err(|err| ClaimsError::Corrupt {
                project: self.project.clone(),
                reason: err.to_string(),
            }),
        }
    }

    fn encode(doc: &QueueDoc) -> String {
        serde_json::to_string(doc).expect("queue document always serializes")
    }
}
