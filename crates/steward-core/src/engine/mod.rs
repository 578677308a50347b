//! Dispatch engine.
//!
//! A recurring scheduler polls the project roster at a fixed interval and
//! attempts one `take`-and-dispatch per project per tick, so no single
//! project can starve the others; the scan's starting project rotates
//! across ticks, so worker-pool exhaustion mid-scan does not keep hitting
//! the same suffix of the roster. Cycles run on a bounded worker pool,
//! with the central invariant enforced here:
//!
//! *Serialized per project, parallel across projects.* Each project has a
//! per-project async lock created on demand; a tick skips any project
//! whose lock is held (a claim is already in flight there) and dispatches
//! the rest concurrently, up to the worker pool size.
//!
//! Shutdown is cooperative: flipping the shutdown flag stops scheduling
//! new cycles, and [`Engine::run`] drains every in-flight cycle before
//! returning, so a taken claim is never left removed-but-unprocessed.

mod cycle;
mod notifier;


pub use notifier::{FailureNotifier, TracingNotifier};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::{spawn_blocking, JoinSet};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::registry::StakeholderRegistry;
use crate::vault::{ProjectId, ProjectRoster, Vault};

use self::cycle::CycleContext;

/// The claim dispatch engine.
pub struct Engine {
    registry: Arc<StakeholderRegistry>,
    vault: Arc<dyn Vault>,
    roster: Arc<dyn ProjectRoster>,
    notifier: Arc<dyn FailureNotifier>,
    config: EngineConfig,
    /// One async lock per project, created on demand. Holding it marks a
    /// claim in flight for that project.
    locks: parking_lot::Mutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>,
    workers: Arc<Semaphore>,
    shutdown: Arc<AtomicBool>,
    /// Per-tick rotation of the roster scan's starting point, so a
    /// saturated worker pool cannot pin scheduling to the same prefix
    /// of the (sorted) roster.
    cursor: AtomicUsize,
}

impl Engine {
    /// Builds an engine over a registry, a vault, and a project roster,
    /// escalating hard failures through [`TracingNotifier`].
    #[must_use]
    pub fn new(
        registry: Arc<StakeholderRegistry>,
        vault: Arc<dyn Vault>,
        roster: Arc<dyn ProjectRoster>,
        config: EngineConfig,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(config.workers));
        Self {
            registry,
            vault,
            roster,
            notifier: Arc::new(TracingNotifier),
            config,
            locks: parking_lot::Mutex::new(HashMap::new()),
            workers,
            shutdown: Arc::new(AtomicBool::new(false)),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Replaces the failure notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn FailureNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Handle for requesting shutdown. Setting it stops new scheduling;
    /// [`Engine::run`] drains in-flight cycles before returning.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Runs the scheduler until shutdown is requested, then drains all
    /// in-flight cycles.
    pub async fn run(&self) {
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            workers = self.config.workers,
            queue_ceiling = self.config.queue_ceiling,
            "Dispatch engine starting"
        );

        let mut inflight: JoinSet<()> = JoinSet::new();
        while !self.shutdown.load(Ordering::Relaxed) {
            // Reap completed cycles so the set does not grow across ticks.
            while inflight.try_join_next().is_some() {}

            let projects = {
                let roster = Arc::clone(&self.roster);
                match spawn_blocking(move || roster.projects()).await {
                    Ok(Ok(projects)) => projects,
                    Ok(Err(err)) => {
                        warn!(error = %err, "Project roster unavailable; tick skipped");
                        tokio::time::sleep(self.config.poll_interval()).await;
                        continue;
                    },
                    Err(join_err) => {
                        warn!(error = %join_err, "Project roster task failed; tick skipped");
                        tokio::time::sleep(self.config.poll_interval()).await;
                        continue;
                    },
                }
            };
            self.prune_locks(&projects);

            let len = projects.len();
            let offset = if len == 0 {
                0
            } else {
                self.cursor.fetch_add(1, Ordering::Relaxed) % len
            };
            for index in 0..len {
                let project = projects[(offset + index) % len].clone();
                let lock = self.project_lock(&project);
                // Held lock: a cycle for this project is still running.
                let Ok(project_guard) = lock.try_lock_owned() else {
                    continue;
                };
                let Ok(permit) = Arc::clone(&self.workers).try_acquire_owned() else {
                    debug!("Worker pool exhausted; remaining projects wait for the next tick");
                    break;
                };
                let ctx = CycleContext {
                    registry: Arc::clone(&self.registry),
                    vault: Arc::clone(&self.vault),
                    notifier: Arc::clone(&self.notifier),
                    config: self.config.clone(),
                    project,
                };
                inflight.spawn(async move {
                    let _guard = project_guard;
                    let _permit = permit;
                    cycle::run_cycle(ctx).await;
                });
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }

        info!("Shutdown requested; draining in-flight dispatch cycles");
        while inflight.join_next().await.is_some() {}
        info!("Dispatch engine stopped");
    }

    fn project_lock(&self, project: &ProjectId) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(project.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Drops locks for projects that left the roster, keeping any that
    /// still have a cycle in flight.
    fn prune_locks(&self, current: &[ProjectId]) {
        let live: HashSet<&ProjectId> = current.iter().collect();
        self.locks
            .lock()
            .retain(|id, lock| live.contains(id) || Arc::strong_count(lock) > 1);
    }
}
