//! Notification sink.
//!
//! Terminal stakeholder for `notify` claims: it logs the message and
//! emits nothing, so every conversational chain ends here instead of
//! circulating forever.

use steward_core::{Claim, Outcome, Project, Stakeholder};
use tracing::info;

/// Handles `type='notify'`.
pub struct Notify;

impl Stakeholder for Notify {
    fn process(&self, project: &Project, claim: &Claim) -> Outcome {
        let message = claim.param("message").unwrap_or("(no message)");
        info!(
            project = %project.id(),
            recipient = claim.author().unwrap_or("-"),
            message,
            "Notification delivered"
        );
        Outcome::done()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use steward_core::{ClaimDraft, MemoryVault, ProjectId, Vault};

    use super::*;

    #[test]
    fn notify_completes_without_emitting() {
        let vault: Arc<dyn Vault> = Arc::new(MemoryVault::new());
        let project = Project::new(ProjectId::new("P1"), vault);
        let claim = ClaimDraft::new("notify")
            .author("alice")
            .param("message", "Welcome on board, @alice!")
            .assemble(9);

        let outcome = Notify.process(&project, &claim);
        let Outcome::Completed { emitted } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert!(emitted.is_empty(), "notify is a terminal sink");
    }

    #[test]
    fn messageless_notify_still_completes() {
        let vault: Arc<dyn Vault> = Arc::new(MemoryVault::new());
        let project = Project::new(ProjectId::new("P1"), vault);
        let claim = ClaimDraft::new("notify").assemble(1);
        assert!(matches!(
            Notify.process(&project, &claim),
            Outcome::Completed { .. }
        ));
    }
}
