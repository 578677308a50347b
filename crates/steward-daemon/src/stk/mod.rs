//! Built-in stakeholders and the startup manifest.
//!
//! The manifest is the explicit, compile-time list of every stakeholder
//! the daemon registers, replacing any runtime discovery: each entry
//! names the stakeholder, its match expression, and its handler. The
//! registry sorts entries by name, so ordering here is cosmetic;
//! uniqueness is not — a duplicate name fails startup.

pub mod join;
pub mod notify;
pub mod skills;

use std::sync::Arc;

use steward_core::{RegistryBuilder, RegistryError, StakeholderRegistry};

/// Builds the registry of built-in stakeholders.
///
/// # Errors
///
/// Returns [`RegistryError`] if a manifest entry carries a malformed
/// match expression or a duplicate name; either fails daemon startup.
pub fn manifest() -> Result<StakeholderRegistry, RegistryError> {
    RegistryBuilder::new()
        .register("join", "type='join'", Arc::new(join::Join))?
        .register("notify", "type='notify'", Arc::new(notify::Notify))?
        .register(
            "profile.skills.add",
            "type='profile.skills.add'",
            Arc::new(skills::AddSkill),
        )?
        .register(
            "profile.skills.show",
            "type='profile.skills.show'",
            Arc::new(skills::ShowSkills),
        )?
        .build()
}

#[cfg(test)]
mod tests {
    use steward_core::ClaimDraft;

    use super::*;

    #[test]
    fn manifest_builds_and_routes_each_claim_kind() {
        let registry = manifest().unwrap();
        assert_eq!(registry.len(), 4);

        for (kind, expected) in [
            ("join", "join"),
            ("notify", "notify"),
            ("profile.skills.add", "profile.skills.add"),
            ("profile.skills.show", "profile.skills.show"),
        ] {
            let claim = ClaimDraft::new(kind).assemble(1);
            let matched = registry.resolve(&claim);
            assert_eq!(matched.len(), 1, "exactly one stakeholder for {kind}");
            assert_eq!(matched[0].name(), expected);
        }
    }
}
