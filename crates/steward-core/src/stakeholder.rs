//! Stakeholder handler contract.
//!
//! A stakeholder is a named capability pairing a match predicate with a
//! handler function. Handlers read a claim and a project and report one of
//! three outcomes: completed (possibly emitting derived claims), rejected
//! (an expected business condition, the "soft" failure), or failed (an
//! unexpected error, the "hard" failure that gets escalated). The dispatch
//! loop branches on the [`Outcome`] value instead of inspecting error
//! types.

use std::error::Error;
use std::sync::Arc;

use crate::claim::ClaimDraft;
use crate::claims::Claims;
use crate::vault::{Item, ProjectId, Vault, VaultError};

/// Boxed cause of a hard handler failure.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Handle a stakeholder receives for the project whose claim it is
/// processing. Bundles the project id with scoped access to the project's
/// documents.
#[derive(Clone)]
pub struct Project {
    id: ProjectId,
    vault: Arc<dyn Vault>,
}

impl Project {
    /// Binds a project handle.
    #[must_use]
    pub const fn new(id: ProjectId, vault: Arc<dyn Vault>) -> Self {
        Self { id, vault }
    }

    /// The project id.
    #[must_use]
    pub const fn id(&self) -> &ProjectId {
        &self.id
    }

    /// The vault behind this project. Handlers use this to reach other
    /// projects' queues when they need to post cross-project claims.
    #[must_use]
    pub const fn vault(&self) -> &Arc<dyn Vault> {
        &self.vault
    }

    /// Acquires exclusive scoped access to one of this project's
    /// documents.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError`] if the vault cannot provide the document.
    pub fn acquire(&self, key: &str) -> Result<Box<dyn Item>, VaultError> {
        self.vault.acquire(&self.id, key)
    }

    /// This project's claim queue with the default ceiling.
    #[must_use]
    pub fn claims(&self) -> Claims {
        Claims::new(self.id.clone(), Arc::clone(&self.vault))
    }
}

/// Result of one handler invocation.
#[derive(Debug)]
pub enum Outcome {
    /// The handler ran to completion, emitting zero or more derived
    /// claims for the triggering project's queue.
    Completed {
        /// Derived claims to append.
        emitted: Vec<ClaimDraft>,
    },

    /// Expected business rejection (soft failure). Logged, never
    /// escalated; the claim stays consumed.
    Rejected {
        /// Human-readable business reason.
        reason: String,
    },

    /// Unexpected error (hard failure). Escalated to the failure
    /// notifier; the cycle continues with the next stakeholder.
    Failed {
        /// The underlying cause.
        error: BoxError,
    },
}

impl Outcome {
    /// Completed with nothing emitted.
    #[must_use]
    pub const fn done() -> Self {
        Self::Completed {
            emitted: Vec::new(),
        }
    }

    /// Completed, emitting the given drafts.
    #[must_use]
    pub fn emit(emitted: Vec<ClaimDraft>) -> Self {
        Self::Completed { emitted }
    }

    /// Soft business rejection.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Hard failure from any error value.
    #[must_use]
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }
}

/// A registered claim handler.
///
/// Implementations are stateless across invocations except for whatever
/// they read from the project's own storage, and must be safe to call
/// from any worker thread.
pub trait Stakeholder: Send + Sync {
    /// Processes one claim against one project.
    fn process(&self, project: &Project, claim: &crate::claim::Claim) -> Outcome;
}
