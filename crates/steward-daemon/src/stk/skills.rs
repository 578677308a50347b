//! Skills workflows: record a skill, show a profile's skills.

use std::sync::Arc;

use steward_core::{Claim, Outcome, Project, Stakeholder};

use crate::people::{People, PeopleError};

/// Handles `type='profile.skills.add'`: records one skill for the
/// claim's author.
pub struct AddSkill;

impl Stakeholder for AddSkill {
    fn process(&self, project: &Project, claim: &Claim) -> Outcome {
        let Some(author) = claim.author() else {
            return Outcome::rejected("skills.add claim carries no author");
        };
        let Some(skill) = claim.param("skill") else {
            return Outcome::rejected("skills.add claim carries no skill parameter");
        };
        let people = People::new(project.id().clone(), Arc::clone(project.vault()));
        if let Err(err) = people.bootstrap() {
            return Outcome::failed(err);
        }
        match people.add_skill(author, skill) {
            Ok(true) => Outcome::emit(vec![claim.reply(format!(
                "The skill `{skill}` was added to your profile"
            ))]),
            Ok(false) => {
                Outcome::rejected(format!("@{author} already has `{skill}` on the profile"))
            },
            Err(PeopleError::UnknownLogin { .. }) => {
                Outcome::rejected(format!("@{author} has to join the project first"))
            },
            Err(err) => Outcome::failed(err),
        }
    }
}

/// Handles `type='profile.skills.show'`: replies with the `person`
/// parameter's skill list, formatted deterministically.
pub struct ShowSkills;

impl Stakeholder for ShowSkills {
    fn process(&self, project: &Project, claim: &Claim) -> Outcome {
        let Some(person) = claim.param("person") else {
            return Outcome::rejected("skills.show claim carries no person parameter");
        };
        let people = People::new(project.id().clone(), Arc::clone(project.vault()));
        if let Err(err) = people.bootstrap() {
            return Outcome::failed(err);
        }
        match people.skills(person) {
            Ok(skills) if skills.is_empty() => {
                Outcome::emit(vec![claim.reply("Your skills are not defined yet")])
            },
            Ok(skills) => Outcome::emit(vec![claim.reply(format!(
                "Your skills are: `{}`",
                skills.join("`, `")
            ))]),
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

    fn people_of(project: &Project) -> People {
        People::new(project.id().clone(), Arc::clone(project.vault()))
    }

    #[test]
    fn show_formats_both_skills_deterministically() {
        let project = project();
        let people = people_of(&project);
        people.bootstrap().unwrap();
        people.join("alice").unwrap();
        people.add_skill("alice", "x").unwrap();
        people.add_skill("alice", "y").unwrap();

        let claim = ClaimDraft::new("profile.skills.show")
            .author("alice")
            .param("person", "alice")
            .assemble(1);
        let outcome = ShowSkills.process(&project, &claim);
        let Outcome::Completed { emitted } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(emitted.len(), 1, "exactly one reply claim");
        assert_eq!(
            emitted[0].params.get("message").map(String::as_str),
            Some("Your skills are: `x`, `y`")
        );
    }

    #[test]
    fn show_falls_back_when_no_skills_defined() {
        let project = project();
        let claim = ClaimDraft::new("profile.skills.show")
            .param("person", "nobody")
            .assemble(1);
        let outcome = ShowSkills.process(&project, &claim);
        let Outcome::Completed { emitted } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(
            emitted[0].params.get("message").map(String::as_str),
            Some("Your skills are not defined yet")
        );
    }

    #[test]
    fn add_requires_membership() {
        let project = project();
        let claim = ClaimDraft::new("profile.skills.add")
            .author("ghost")
            .param("skill", "rust")
            .assemble(1);
        let outcome = AddSkill.process(&project, &claim);
        assert!(
            matches!(outcome, Outcome::Rejected { ref reason } if reason.contains("join")),
            "got {outcome:?}"
        );
    }

    #[test]
    fn add_then_duplicate_is_soft_rejected() {
        let project = project();
        let people = people_of(&project);
        people.bootstrap().unwrap();
        people.join("bob").unwrap();

        let claim = ClaimDraft::new("profile.skills.add")
            .author("bob")
            .param("skill", "rust")
            .assemble(1);
        assert!(matches!(
            AddSkill.process(&project, &claim),
            Outcome::Completed { .. }
        ));
        assert!(matches!(
            AddSkill.process(&project, &claim),
            Outcome::Rejected { .. }
        ));
        assert_eq!(people.skills("bob").unwrap(), vec!["rust"]);
    }
}
