//! Failure escalation channel.
//!
//! Hard failures are reported to an external notifier as one-way,
//! fire-and-forget notifications. The engine calls notifiers behind a
//! panic guard: a notifier that itself blows up is logged and discarded,
//! never thrown back into the dispatch loop.

use std::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{error, warn};

/// Consumer of `(context, error)` escalations.
///
/// Implementations should return quickly; delivery guarantees are out of
/// scope for the engine.
pub trait FailureNotifier: Send + Sync {
    /// Reports one hard failure. Must not block the dispatch loop.
    fn notify(&self, context: &str, error: &(dyn Error + 'static));
}

/// Default notifier: an error-level structured tracing event.
pub struct TracingNotifier;

impl FailureNotifier for TracingNotifier {
    fn notify(&self, context: &str, error: &(dyn Error + 'static)) {
        error!(context, error = %error, "Hard failure escalated");
    }
}

/// Invokes the notifier behind a panic guard.
pub(crate) fn escalate(
    notifier: &dyn FailureNotifier,
    context: &str,
    error: &(dyn Error + 'static),
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| notifier.notify(context, error)));
    if outcome.is_err() {
        warn!(context, "Failure notifier panicked; escalation dropped");
    }
}
