//! One dispatch cycle: pick, resolve, invoke, commit.
//!
//! A cycle handles at most one due claim for one project. The claim is
//! removed from the queue atomically with being taken; from that point it
//! is rolled forward, never rolled back — every matching stakeholder runs
//! to completion even if the engine is shutting down or an earlier
//! stakeholder failed hard. Storage failure before the removal commits
//! aborts only this project's cycle and leaves the claim queued.
//!
//! Synchronous storage and handler work runs under
//! [`tokio::task::spawn_blocking`]; handler invocations are additionally
//! bounded by the configured timeout, with a timeout escalated as a hard
//! failure so a hung handler cannot occupy the project's slot forever.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

use crate::claim::Claim;
use crate::claims::{Claims, ClaimsError};
use crate::config::EngineConfig;
use crate::registry::{StakeholderEntry, StakeholderRegistry};
use crate::stakeholder::{BoxError, Outcome, Project};
use crate::vault::{ProjectId, Vault};

use super::notifier::{escalate, FailureNotifier};

/// Everything one cycle needs, cloned out of the engine so the cycle task
/// is `'static`.
pub(crate) struct CycleContext {
    pub registry: Arc<StakeholderRegistry>,
    pub vault: Arc<dyn Vault>,
    pub notifier: Arc<dyn FailureNotifier>,
    pub config: EngineConfig,
    pub project: ProjectId,
}

/// Hard failures produced inside a cycle, in the shape the notifier
/// consumes.
#[derive(Debug, Error)]
pub(crate) enum CycleFailure {
    #[error("stakeholder {name} failed on claim {claim_id} ({kind}): {source}")]
    Handler {
        name: String,
        claim_id: u64,
        kind: String,
        #[source]
        source: BoxError,
    },

    #[error("stakeholder {name} timed out after {seconds}s on claim {claim_id} ({kind})")]
    Timeout {
        name: String,
        claim_id: u64,
        kind: String,
        seconds: u64,
    },

    #[error("stakeholder {name} panicked on claim {claim_id} ({kind})")]
    Panic {
        name: String,
        claim_id: u64,
        kind: String,
    },

    #[error("failed to enqueue claims emitted by {name} for claim {claim_id}: {source}")]
    Enqueue {
        name: String,
        claim_id: u64,
        #[source]
        source: ClaimsError,
    },
}

/// What came back from one bounded handler invocation.
enum Invocation {
    Outcome(Outcome),
    TimedOut,
    Panicked,
}

/// Runs one dispatch cycle for `ctx.project`. Never returns an error:
/// every failure mode is classified and handled here so nothing can
/// propagate into another project's cycle.
pub(crate) async fn run_cycle(ctx: CycleContext) {
    let claims = Claims::new(ctx.project.clone(), Arc::clone(&ctx.vault))
        .with_ceiling(ctx.config.queue_ceiling);

    let taken = {
        let claims = claims.clone();
        spawn_blocking(move || claims.take()).await
    };
    let claim = match taken {
        Ok(Ok(Some(claim))) => claim,
        Ok(Ok(None)) => return,
        Ok(Err(err)) => {
            // The removal never committed: the claim is still queued and
            // a later tick retries. Only this project is affected.
            warn!(
                project = %ctx.project,
                error = %err,
                "Claim take failed; cycle aborted"
            );
            return;
        },
        Err(join_err) => {
            warn!(
                project = %ctx.project,
                error = %join_err,
                "Claim take task failed; cycle aborted"
            );
            return;
        },
    };

    let matched = ctx.registry.resolve(&claim);
    if matched.is_empty() {
        info!(
            project = %ctx.project,
            claim_id = claim.id,
            kind = %claim.kind,
            "No stakeholders matched; claim consumed"
        );
        return;
    }
    debug!(
        project = %ctx.project,
        claim_id = claim.id,
        kind = %claim.kind,
        stakeholders = matched.len(),
        "Dispatching claim"
    );

    let project = Project::new(ctx.project.clone(), Arc::clone(&ctx.vault));
    for entry in matched {
        let invocation = invoke(entry, &project, &claim, ctx.config.handler_timeout()).await;
        match invocation {
            Invocation::Outcome(Outcome::Completed { emitted }) => {
                if emitted.is_empty() {
                    debug!(
                        project = %ctx.project,
                        stakeholder = entry.name(),
                        claim_id = claim.id,
                        "Stakeholder completed"
                    );
                    continue;
                }
                let count = emitted.len();
                let enqueue = {
                    let claims = claims.clone();
                    spawn_blocking(move || claims.add(&emitted)).await
                };
                match enqueue {
                    Ok(Ok(ids)) => debug!(
                        project = %ctx.project,
                        stakeholder = entry.name(),
                        claim_id = claim.id,
                        emitted = count,
                        first_id = ids[0],
                        "Stakeholder completed; emitted claims enqueued"
                    ),
                    Ok(Err(source)) => {
                        // Overflow here usually means a runaway handler
                        // chain; surface it instead of dropping silently.
                        let failure = CycleFailure::Enqueue {
                            name: entry.name().to_string(),
                            claim_id: claim.id,
                            source,
                        };
                        escalate(ctx.notifier.as_ref(), ctx.project.as_str(), &failure);
                    },
                    Err(join_err) => {
                        let failure = CycleFailure::Enqueue {
                            name: entry.name().to_string(),
                            claim_id: claim.id,
                            source: ClaimsError::Storage(crate::vault::VaultError::Io {
                                path: ctx.project.to_string(),
                                source: std::io::Error::other(join_err),
                            }),
                        };
                        escalate(ctx.notifier.as_ref(), ctx.project.as_str(), &failure);
                    },
                }
            },
            Invocation::Outcome(Outcome::Rejected { reason }) => debug!(
                project = %ctx.project,
                stakeholder = entry.name(),
                claim_id = claim.id,
                %reason,
                "Stakeholder rejected claim"
            ),
            Invocation::Outcome(Outcome::Failed { error }) => {
                let failure = CycleFailure::Handler {
                    name: entry.name().to_string(),
                    claim_id: claim.id,
                    kind: claim.kind.clone(),
                    source: error,
                };
                escalate(ctx.notifier.as_ref(), ctx.project.as_str(), &failure);
            },
            Invocation::TimedOut => {
                let failure = CycleFailure::Timeout {
                    name: entry.name().to_string(),
                    claim_id: claim.id,
                    kind: claim.kind.clone(),
                    seconds: ctx.config.handler_timeout_secs,
                };
                escalate(ctx.notifier.as_ref(), ctx.project.as_str(), &failure);
            },
            Invocation::Panicked => {
                let failure = CycleFailure::Panic {
                    name: entry.name().to_string(),
                    claim_id: claim.id,
                    kind: claim.kind.clone(),
                };
                escalate(ctx.notifier.as_ref(), ctx.project.as_str(), &failure);
            },
        }
    }
}

/// Runs one handler under the invocation timeout. The handler itself is
/// synchronous, so it runs on the blocking pool; on timeout the blocking
/// thread is abandoned (the vault's per-document locks keep any late
/// write safe) and the slot is reclaimed.
async fn invoke(
    entry: &StakeholderEntry,
    project: &Project,
    claim: &Claim,
    timeout: Duration,
) -> Invocation {
    let handler = Arc::clone(entry.handler());
    let project = project.clone();
    let claim = claim.clone();
    let task = spawn_blocking(move || handler.process(&project, &claim));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(outcome)) => Invocation::Outcome(outcome),
        Ok(Err(join_err)) if join_err.is_panic() => Invocation::Panicked,
        Ok(Err(_)) => Invocation::Panicked,
        Err(_elapsed) => Invocation::TimedOut,
    }
}
