//! Per-project people roster.
//!
//! One JSON document per project under the vault key `"people"`: a map
//! from login to profile (currently just the skill list). The built-in
//! join and skills stakeholders read and mutate it through the same
//! scoped acquire/commit discipline the claim queue uses.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use steward_core::{Item, ProjectId, Vault, VaultError};
use thiserror::Error;

/// Vault key of the people document.
pub const PEOPLE_KEY: &str = "people";

/// Errors surfaced by people roster operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PeopleError {
    /// The stored document could not be decoded.
    #[error("people document for {project} is corrupt: {reason}")]
    Corrupt {
        /// The project whose document is unreadable.
        project: ProjectId,
        /// Decoder diagnostic.
        reason: String,
    },

    /// The login is not on the roster.
    #[error("person is not on the project roster: {login}")]
    UnknownLogin {
        /// The missing login.
        login: String,
    },

    /// The underlying vault failed.
    #[error(transparent)]
    Storage(#[from] VaultError),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RosterDoc {
    #[serde(default)]
    people: BTreeMap<String, Profile>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Profile {
    #[serde(default)]
    skills: Vec<String>,
}

/// Handle on one project's people roster.
#[derive(Clone)]
pub struct People {
    project: ProjectId,
    vault: Arc<dyn Vault>,
}

impl People {
    /// Binds a roster handle to a project.
    #[must_use]
    pub fn new(project: ProjectId, vault: Arc<dyn Vault>) -> Self {
        Self { project, vault }
    }

    /// Idempotently ensures the roster document exists.
    ///
    /// # Errors
    ///
    /// Returns [`PeopleError::Storage`] if the vault fails.
    pub fn bootstrap(&self) -> Result<(), PeopleError> {
        let mut item = self.vault.acquire(&self.project, PEOPLE_KEY)?;
        if item.read()?.is_some() {
            return Ok(());
        }
        item.write(Self::encode(&RosterDoc::default()));
        item.commit()?;
        Ok(())
    }

    /// Adds a login to the roster. Returns `false` (without mutating)
    /// when the login is already present.
    ///
    /// # Errors
    ///
    /// Returns [`PeopleError::Storage`] / [`PeopleError::Corrupt`] on
    /// vault or decode failure.
    pub fn join(&self, login: &str) -> Result<bool, PeopleError> {
        let mut item = self.vault.acquire(&self.project, PEOPLE_KEY)?;
        let mut doc = self.load(item.as_ref())?;
        if doc.people.contains_key(login) {
            return Ok(false);
        }
        doc.people.insert(login.to_string(), Profile::default());
        item.write(Self::encode(&doc));
        item.commit()?;
        Ok(true)
    }

    /// Whether the login is on the roster.
    ///
    /// # Errors
    ///
    /// Returns [`PeopleError::Storage`] / [`PeopleError::Corrupt`] on
    /// vault or decode failure.
    pub fn contains(&self, login: &str) -> Result<bool, PeopleError> {
        let item = self.vault.acquire(&self.project, PEOPLE_KEY)?;
        let doc = self.load(item.as_ref())?;
        Ok(doc.people.contains_key(login))
    }

    /// The login's skills, in the order they were added. Empty when the
    /// login is unknown or has no skills yet.
    ///
    /// # Errors
    ///
    /// Returns [`PeopleError::Storage`] / [`PeopleError::Corrupt`] on
    /// vault or decode failure.
    pub fn skills(&self, login: &str) -> Result<Vec<String>, PeopleError> {
        let item = self.vault.acquire(&self.project, PEOPLE_KEY)?;
        let doc = self.load(item.as_ref())?;
        Ok(doc
            .people
            .get(login)
            .map(|profile| profile.skills.clone())
            .unwrap_or_default())
    }

    /// Records a skill for a roster member. Returns `false` (without
    /// mutating) when the member already has it.
    ///
    /// # Errors
    ///
    /// - [`PeopleError::UnknownLogin`] if the login never joined.
    /// - [`PeopleError::Storage`] / [`PeopleError::Corrupt`] on vault or
    ///   decode failure.
    pub fn add_skill(&self, login: &str, skill: &str) -> Result<bool, PeopleError> {
        let mut item = self.vault.acquire(&self.project, PEOPLE_KEY)?;
        let mut doc = self.load(item.as_ref())?;
        let profile = doc
            .people
            .get_mut(login)
            .ok_or_else(|| PeopleError::UnknownLogin {
                login: login.to_string(),
            })?;
        if profile.skills.iter().any(|s| s == skill) {
            return Ok(false);
        }
        profile.skills.push(skill.to_string());
        item.write(Self::encode(&doc));
        item.commit()?;
        Ok(true)
    }

    fn load(&self, item: &dyn Item) -> Result<RosterDoc, PeopleError> {
        match item.read()? {
            None => Ok(RosterDoc::default()),
            Some(body) => serde_json::from_str(&body).map_err(|err| PeopleError::Corrupt {
                project: self.project.clone(),
                reason: err.to_string(),
            }),
        }
    }

    fn encode(doc: &RosterDoc) -> String {
        serde_json::to_string(doc).expect("roster document always serializes")
    }
}

#[cfg(test)]
mod tests {
    use steward_core::MemoryVault;

    use super::*;

    fn roster() -> People {
        let vault: Arc<dyn Vault> = Arc::new(MemoryVault::new());
        People::new(ProjectId::new("P1"), vault)
    }

    #[test]
    fn join_is_recorded_once() {
        let people = roster();
        people.bootstrap().unwrap();
        assert!(people.join("alice").unwrap());
        assert!(!people.join("alice").unwrap(), "second join is a no-op");
        assert!(people.contains("alice").unwrap());
        assert!(!people.contains("bob").unwrap());
    }

    #[test]
    fn skills_accumulate_in_insertion_order() {
        let people = roster();
        people.bootstrap().unwrap();
        people.join("alice").unwrap();
        assert!(people.add_skill("alice", "java").unwrap());
        assert!(people.add_skill("alice", "rust").unwrap());
        assert!(!people.add_skill("alice", "java").unwrap(), "duplicate skill");
        assert_eq!(people.skills("alice").unwrap(), vec!["java", "rust"]);
    }

    #[test]
    fn unknown_login_has_no_skills_but_cannot_gain_any() {
        let people = roster();
        people.bootstrap().unwrap();
        assert!(people.skills("ghost").unwrap().is_empty());
        assert!(matches!(
            people.add_skill("ghost", "rust"),
            Err(PeopleError::UnknownLogin { .. })
        ));
    }
}
