//! steward-core - Reactive claim queue and dispatch engine
//!
//! This library implements the claim-processing core of the steward
//! project-management platform. Every business event is a small immutable
//! "claim" appended to a per-project queue; independently registered
//! stakeholders declare, via a boolean match expression over claim
//! attributes, which claims they react to. The dispatch engine polls all
//! known projects, pulls the earliest due claim, and runs every matching
//! stakeholder, re-enqueueing whatever claims those handlers emit.
//!
//! # Central invariant
//!
//! *Serialized per project, parallel across projects.* A given project has
//! at most one claim in flight at a time (a per-project async lock), while
//! different projects are dispatched concurrently from a bounded worker
//! pool. Within one project, claims are delivered strictly by ascending id
//! among those currently due.
//!
//! # Modules
//!
//! - [`claim`]: the `Claim` event record and the `ClaimDraft` construction
//!   directive
//! - [`claims`]: the per-project durable, ordered, deferrable claim queue
//! - [`term`]: the match-expression language (conjunction of equalities)
//! - [`registry`]: the immutable, deterministically ordered stakeholder set
//! - [`stakeholder`]: the handler contract and its three-way outcome
//! - [`engine`]: the dispatch loop, failure isolation, and escalation
//! - [`vault`]: the scoped acquire/commit document store the queue sits on
//! - [`config`]: engine tuning knobs (poll interval, workers, ceiling)

pub mod claim;
pub mod claims;
pub mod config;
pub mod engine;
pub mod registry;
pub mod stakeholder;
pub mod term;
pub mod vault;

pub use claim::{Claim, ClaimDraft};
pub use claims::{Claims, ClaimsError, DEFAULT_QUEUE_CEILING};
pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, FailureNotifier, TracingNotifier};
pub use registry::{RegistryBuilder, RegistryError, StakeholderEntry, StakeholderRegistry};
pub use stakeholder::{Outcome, Project, Stakeholder};
pub use term::{Attr, Term, TermError};
pub use vault::{FsVault, Item, MemoryVault, ProjectId, ProjectRoster, Vault, VaultError};
