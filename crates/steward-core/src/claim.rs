//! Claim data model.
//!
//! A [`Claim`] is an immutable event record queued for processing by a
//! project. Producers never build a `Claim` directly; they submit a
//! [`ClaimDraft`] (a claim-construction directive) and the queue assigns
//! the next sequential id on append.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable event record owned by a project's claim queue.
///
/// Once appended a claim never changes; its only lifecycle transition is
/// removal from the queue, which happens exactly once, atomically with
/// being handed to the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Queue-assigned id, unique within the project's current queue and
    /// monotonically increasing across appends.
    pub id: u64,

    /// Free-form event name used for matching and logging.
    #[serde(rename = "type")]
    pub kind: String,

    /// Originating identity, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Named string parameters. Insertion order is irrelevant.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,

    /// Deferred-delivery instant: the claim is not eligible for delivery
    /// before this instant has passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

impl Claim {
    /// Returns the named parameter, if present.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns the author, if present.
    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Whether the claim is eligible for delivery at `now`. Eligibility
    /// requires `until` to be strictly in the past.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.until.map_or(true, |until| until < now)
    }

    /// Builds a conversational `notify` draft addressed back at whoever
    /// posted this claim, carrying `message` as a parameter.
    #[must_use]
    pub fn reply(&self, message: impl Into<String>) -> ClaimDraft {
        let mut draft = ClaimDraft::new("notify").param("message", message);
        if let Some(author) = &self.author {
            draft = draft.author(author.clone());
        }
        draft
    }
}

/// A claim-construction directive: everything a [`Claim`] carries except
/// the queue-assigned id.
///
/// Built fluently:
///
/// ```
/// use steward_core::ClaimDraft;
///
/// let draft = ClaimDraft::new("profile.skills.show")
///     .author("alice")
///     .param("person", "alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDraft {
    /// Event name.
    #[serde(rename = "type")]
    pub kind: String,

    /// Originating identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Named string parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,

    /// Deferred-delivery instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

impl ClaimDraft {
    /// Starts a draft for the given event name.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            author: None,
            params: BTreeMap::new(),
            until: None,
        }
    }

    /// Sets the originating identity.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Adds a named parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Defers delivery until the given instant.
    #[must_use]
    pub const fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Seals the draft into a claim under the queue-assigned id.
    #[must_use]
    pub fn assemble(self, id: u64) -> Claim {
        Claim {
            id,
            kind: self.kind,
            author: self.author,
            params: self.params,
            until: self.until,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn draft_assembles_into_claim() {
        let claim = ClaimDraft::new("join")
            .author("alice")
            .param("role", "DEV")
            .assemble(7);
        assert_eq!(claim.id, 7);
        assert_eq!(claim.kind, "join");
        assert_eq!(claim.author(), Some("alice"));
        assert_eq!(claim.param("role"), Some("DEV"));
        assert_eq!(claim.param("missing"), None);
        assert!(claim.until.is_none());
    }

    #[test]
    fn due_depends_on_until() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let immediate = ClaimDraft::new("ping").assemble(1);
        assert!(immediate.is_due(now));

        let deferred = ClaimDraft::new("ping")
            .until(now + chrono::Duration::hours(1))
            .assemble(2);
        assert!(!deferred.is_due(now));
        assert!(deferred.is_due(now + chrono::Duration::hours(2)));
        // Boundary: at exactly `until` the claim is still deferred.
        assert!(!deferred.is_due(now + chrono::Duration::hours(1)));
    }

    #[test]
    fn reply_preserves_author_and_carries_message() {
        let claim = ClaimDraft::new("profile.skills.show")
            .author("bob")
            .assemble(3);
        let reply = claim.reply("Your skills are not defined yet");
        assert_eq!(reply.kind, "notify");
        assert_eq!(reply.author.as_deref(), Some("bob"));
        assert_eq!(
            reply.params.get("message").map(String::as_str),
            Some("Your skills are not defined yet")
        );
    }

    #[test]
    fn claim_round_trips_through_json() {
        let claim = ClaimDraft::new("join").author("carol").assemble(42);
        let json = serde_json::to_string(&claim).unwrap();
        assert!(json.contains("\"type\":\"join\""), "kind serializes as 'type': {json}");
        let back: Claim = serde_json::from_str(&json).unwrap();
        assert_eq!(back, claim);
    }
}
