//! Stakeholder registry.
//!
//! Holds the immutable list of `(name, predicate, handler)` entries,
//! built once at startup from an explicit manifest and sorted by name so
//! that side-effect ordering is reproducible when several stakeholders
//! match the same claim. Predicates are parsed at registration: a bad
//! manifest entry fails startup, never dispatch. The registry is
//! read-only after startup and needs no locking.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::claim::Claim;
use crate::stakeholder::Stakeholder;
use crate::term::{Term, TermError};

/// Errors raised while building the registry at startup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// A manifest entry carries a malformed match expression.
    #[error("malformed term for stakeholder {name}: {source}")]
    BadTerm {
        /// The stakeholder being registered.
        name: String,
        /// The parse failure.
        #[source]
        source: TermError,
    },

    /// Two manifest entries share a name.
    #[error("duplicate stakeholder name: {name}")]
    DuplicateName {
        /// The name that appeared twice.
        name: String,
    },
}

/// One registered stakeholder.
pub struct StakeholderEntry {
    name: String,
    term: Term,
    handler: Arc<dyn Stakeholder>,
}

impl StakeholderEntry {
    /// The stakeholder's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed match expression.
    #[must_use]
    pub const fn term(&self) -> &Term {
        &self.term
    }

    /// The handler.
    #[must_use]
    pub const fn handler(&self) -> &Arc<dyn Stakeholder> {
        &self.handler
    }
}

impl fmt::Debug for StakeholderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Handlers are opaque trait objects; name and term identify the
        // entry.
        f.debug_struct("StakeholderEntry")
            .field("name", &self.name)
            .field("term", &self.term)
            .finish_non_exhaustive()
    }
}

/// Builder for the startup manifest.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<StakeholderEntry>,
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("entries", &self.entries)
            .finish()
    }
}

impl RegistryBuilder {
    /// Starts an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one stakeholder, parsing its match expression.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BadTerm`] if the expression does not
    /// parse.
    pub fn register(
        mut self,
        name: impl Into<String>,
        term: &str,
        handler: Arc<dyn Stakeholder>,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        let term = Term::parse(term).map_err(|source| RegistryError::BadTerm {
            name: name.clone(),
            source,
        })?;
        self.entries.push(StakeholderEntry {
            name,
            term,
            handler,
        });
        Ok(self)
    }

    /// Seals the manifest, sorting entries by name for deterministic
    /// resolution order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if two entries collide.
    pub fn build(mut self) -> Result<StakeholderRegistry, RegistryError> {
        self.entries.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in self.entries.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(RegistryError::DuplicateName {
                    name: pair[0].name.clone(),
                });
            }
        }
        Ok(StakeholderRegistry {
            entries: self.entries,
        })
    }
}

/// The immutable, deterministically ordered stakeholder set.
pub struct StakeholderRegistry {
    entries: Vec<StakeholderEntry>,
}

impl fmt::Debug for StakeholderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StakeholderRegistry")
            .field("entries", &self.entries)
            .finish()
    }
}

impl StakeholderRegistry {
    /// Resolves the stakeholders matching a claim, in registration
    /// (name-sorted) order. Zero matches is not an error.
    #[must_use]
    pub fn resolve(&self, claim: &Claim) -> Vec<&StakeholderEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.term.matches(claim))
            .collect()
    }

    /// Number of registered stakeholders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::claim::ClaimDraft;
    use crate::stakeholder::{Outcome, Project};

    use super::*;

    struct Noop;

    impl Stakeholder for Noop {
        fn process(&self, _project: &Project, _claim: &Claim) -> Outcome {
            Outcome::done()
        }
    }

    fn handler() -> Arc<dyn Stakeholder> {
        Arc::new(Noop)
    }

    #[test]
    fn resolve_returns_matches_in_name_order() {
        let registry = RegistryBuilder::new()
            .register("zeta", "type='x'", handler())
            .unwrap()
            .register("alpha", "type='x'", handler())
            .unwrap()
            .register("other", "type='y'", handler())
            .unwrap()
            .build()
            .unwrap();

        let claim = ClaimDraft::new("x").assemble(1);
        let matched: Vec<&str> = registry
            .resolve(&claim)
            .into_iter()
            .map(StakeholderEntry::name)
            .collect();
        assert_eq!(matched, vec!["alpha", "zeta"]);
    }

    #[test]
    fn zero_matches_is_not_an_error() {
        let registry = RegistryBuilder::new()
            .register("only", "type='x'", handler())
            .unwrap()
            .build()
            .unwrap();
        let claim = ClaimDraft::new("unrelated").assemble(1);
        assert!(registry.resolve(&claim).is_empty());
    }

    #[test]
    fn malformed_term_fails_registration() {
        let err = RegistryBuilder::new()
            .register("broken", "type=", handler())
            .unwrap_err();
        assert!(matches!(err, RegistryError::BadTerm { name, .. } if name == "broken"));
    }

    #[test]
    fn debug_output_names_entries_without_handlers() {
        let registry = RegistryBuilder::new()
            .register("only", "type='x'", handler())
            .unwrap()
            .build()
            .unwrap();
        let rendered = format!("{registry:?}");
        assert!(rendered.contains("only"), "{rendered}");
        assert!(rendered.contains("Kind"), "{rendered}");
    }

    #[test]
    fn duplicate_names_fail_build() {
        let err = RegistryBuilder::new()
            .register("dup", "type='x'", handler())
            .unwrap()
            .register("dup", "type='y'", handler())
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { name } if name == "dup"));
    }
}
