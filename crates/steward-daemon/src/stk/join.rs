//! Join workflow.
//!
//! A `join` claim puts its author on the project's people roster and
//! replies with a welcome. Joining twice is an expected business
//! condition, so it comes back as a soft rejection, not an escalation.

use std::sync::Arc;

use steward_core::{Claim, Outcome, Project, Stakeholder};

use crate::people::People;

/// Handles `type='join'`.
pub struct Join;

impl Stakeholder for Join {
    fn process(&self, project: &Project, claim: &Claim) -> Outcome {
        let Some(author) = claim.author() else {
            return Outcome::rejected("join claim carries no author");
        };
        let people = People::new(project.id().clone(), Arc::clone(project.vault()));
        if let Err(err) = people.bootstrap() {
            return Outcome::failed(err);
        }
        match people.join(author) {
            Ok(true) => Outcome::emit(vec![
                claim.reply(format!("Welcome on board, @{author}!")),
            ]),
            Ok(false) => Outcome::rejected(format!("@{author} is already on the project")),
            Err(err) => Outcome::failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use steward_core::{ClaimDraft, MemoryVault, ProjectId, Vault};

    use super::*;

    fn project() -> Project {
        let vault: Arc<dyn Vault> = Arc::new(MemoryVault::new());
        Project::new(ProjectId::new("P1"), vault)
    }

    #[test]
    fn first_join_is_recorded_and_welcomed() {
        let project = project();
        let claim = ClaimDraft::new("join").author("alice").assemble(1);

        let outcome = Join.process(&project, &claim);
        let Outcome::Completed { emitted } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].kind, "notify");
        assert_eq!(
            emitted[0].params.get("message").map(String::as_str),
            Some("Welcome on board, @alice!")
        );

        let people = People::new(project.id().clone(), Arc::clone(project.vault()));
        assert!(people.contains("alice").unwrap());
    }

    #[test]
    fn second_join_is_a_soft_rejection() {
        let project = project();
        let claim = ClaimDraft::new("join").author("alice").assemble(1);
        let _first = Join.process(&project, &claim);

        let outcome = Join.process(&project, &claim);
        assert!(
            matches!(outcome, Outcome::Rejected { ref reason } if reason.contains("alice")),
            "got {outcome:?}"
        );
    }

    #[test]
    fn authorless_join_is_rejected_not_escalated() {
        let project = project();
        let claim = ClaimDraft::new("join").assemble(1);
        let outcome = Join.process(&project, &claim);
        assert!(matches!(outcome, Outcome::Rejected { .. }), "got {outcome:?}");
    }
}
