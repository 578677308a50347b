//! Match-expression language for stakeholder predicates.
//!
//! Each stakeholder declares which claims it reacts to with a small
//! boolean expression over claim attributes: a conjunction of equality
//! clauses, e.g.
//!
//! ```text
//! type='profile.skills.show' and person='alice'
//! ```
//!
//! `type` and `author` address the claim's own attributes; any other
//! identifier addresses the named parameter. Terms are parsed once at
//! registration ([`Term::parse`]) so malformed predicates are rejected at
//! startup, never at dispatch time. Evaluation ([`Term::matches`]) is pure
//! and total: a claim missing an optional attribute simply fails that
//! clause, and conjunctions short-circuit.

use std::fmt;

use thiserror::Error;

use crate::claim::Claim;

/// Errors raised while parsing a term at registration time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TermError {
    /// The term is empty or whitespace only.
    #[error("term is empty")]
    Empty,

    /// The parser expected something else at the given byte offset.
    #[error("unexpected input at byte {at}: expected {expected}")]
    Unexpected {
        /// Byte offset into the term string.
        at: usize,
        /// What the parser was looking for.
        expected: &'static str,
    },

    /// A quoted value never closed.
    #[error("unterminated quoted value starting at byte {at}")]
    Unterminated {
        /// Byte offset of the opening quote.
        at: usize,
    },
}

/// A claim attribute addressed by an equality clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attr {
    /// The claim's event name (`type`).
    Kind,
    /// The claim's originating identity (`author`).
    Author,
    /// A named parameter.
    Param(String),
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind => f.write_str("type"),
            Self::Author => f.write_str("author"),
            Self::Param(name) => f.write_str(name),
        }
    }
}

/// Parsed match expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// A single `attr='value'` clause.
    Eq {
        /// Attribute addressed by the clause.
        attr: Attr,
        /// Literal the attribute must equal.
        value: String,
    },
    /// Conjunction of clauses; true iff every member matches.
    And(Vec<Term>),
}

impl Term {
    /// Parses a term string. Called once at registration; a `Err` here
    /// must fail startup.
    ///
    /// # Errors
    ///
    /// Returns [`TermError`] describing the first malformed token.
    pub fn parse(input: &str) -> Result<Self, TermError> {
        let mut parser = Parser {
            input: input.as_bytes(),
            pos: 0,
        };
        parser.skip_whitespace();
        if parser.at_end() {
            return Err(TermError::Empty);
        }
        let mut clauses = vec![parser.clause()?];
        loop {
            parser.skip_whitespace();
            if parser.at_end() {
                break;
            }
            parser.keyword_and()?;
            parser.skip_whitespace();
            clauses.push(parser.clause()?);
        }
        if clauses.len() == 1 {
            Ok(clauses.remove(0))
        } else {
            Ok(Self::And(clauses))
        }
    }

    /// Evaluates the term against a claim. Pure and total: absence of an
    /// optional attribute fails the clause rather than erroring.
    #[must_use]
    pub fn matches(&self, claim: &Claim) -> bool {
        match self {
            Self::Eq { attr, value } => match attr {
                Attr::Kind => claim.kind == *value,
                Attr::Author => claim.author() == Some(value.as_str()),
                Attr::Param(name) => claim.param(name) == Some(value.as_str()),
            },
            Self::And(terms) => terms.iter().all(|term| term.matches(claim)),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq { attr, value } => write!(f, "{attr}='{value}'"),
            Self::And(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    write!(f, "{term}")?;
                }
                Ok(())
            },
        }
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn identifier(&mut self) -> Result<String, TermError> {
        let start = self.pos;
        while self.pos < self.input.len() && Self::is_identifier_byte(self.input[self.pos]) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(TermError::Unexpected {
                at: start,
                expected: "attribute name",
            });
        }
        // Identifier bytes are a subset of ASCII, so this slice is valid
        // UTF-8 by construction.
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn is_identifier_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-'
    }

    fn clause(&mut self) -> Result<Term, TermError> {
        let name = self.identifier()?;
        self.skip_whitespace();
        if self.at_end() || self.input[self.pos] != b'=' {
            return Err(TermError::Unexpected {
                at: self.pos,
                expected: "'='",
            });
        }
        self.pos += 1;
        self.skip_whitespace();
        let value = self.quoted_value()?;
        let attr = match name.as_str() {
            "type" => Attr::Kind,
            "author" => Attr::Author,
            _ => Attr::Param(name),
        };
        Ok(Term::Eq { attr, value })
    }

    fn quoted_value(&mut self) -> Result<String, TermError> {
        if self.at_end() || self.input[self.pos] != b'\'' {
            return Err(TermError::Unexpected {
                at: self.pos,
                expected: "opening quote",
            });
        }
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.input.len() && self.input[self.pos] != b'\'' {
            self.pos += 1;
        }
        if self.at_end() {
            return Err(TermError::Unterminated { at: open });
        }
        let value = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        self.pos += 1;
        Ok(value)
    }

    fn keyword_and(&mut self) -> Result<(), TermError> {
        let at = self.pos;
        let word = self.identifier().map_err(|_| TermError::Unexpected {
            at,
            expected: "'and'",
        })?;
        if word == "and" {
            Ok(())
        } else {
            Err(TermError::Unexpected {
                at,
                expected: "'and'",
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::claim::ClaimDraft;

    use super::*;

    fn claim(kind: &str) -> Claim {
        ClaimDraft::new(kind).assemble(1)
    }

    #[test]
    fn single_type_clause_matches_kind() {
        let term = Term::parse("type='profile.skills.show'").unwrap();
        assert!(term.matches(&claim("profile.skills.show")));
        assert!(!term.matches(&claim("join")));
    }

    #[test]
    fn conjunction_requires_all_clauses() {
        let term = Term::parse("type='join' and role='DEV'").unwrap();
        let matching = ClaimDraft::new("join").param("role", "DEV").assemble(1);
        let wrong_role = ClaimDraft::new("join").param("role", "QA").assemble(2);
        assert!(term.matches(&matching));
        assert!(!term.matches(&wrong_role));
        assert!(!term.matches(&claim("join")), "missing param fails the clause");
    }

    #[test]
    fn author_clause_fails_totally_when_author_absent() {
        let term = Term::parse("author='alice'").unwrap();
        assert!(!term.matches(&claim("anything")));
        let by_alice = ClaimDraft::new("anything").author("alice").assemble(1);
        assert!(term.matches(&by_alice));
    }

    #[test]
    fn whitespace_is_flexible() {
        let term = Term::parse("  type = 'a'   and   person = 'bob' ").unwrap();
        let matching = ClaimDraft::new("a").param("person", "bob").assemble(1);
        assert!(term.matches(&matching));
    }

    #[test]
    fn malformed_terms_are_rejected() {
        assert_eq!(Term::parse(""), Err(TermError::Empty));
        assert_eq!(Term::parse("   "), Err(TermError::Empty));
        assert!(matches!(
            Term::parse("type"),
            Err(TermError::Unexpected { expected: "'='", .. })
        ));
        assert!(matches!(
            Term::parse("type='a"),
            Err(TermError::Unterminated { .. })
        ));
        assert!(matches!(
            Term::parse("type='a' or type='b'"),
            Err(TermError::Unexpected { expected: "'and'", .. })
        ));
        assert!(matches!(
            Term::parse("type='a' and"),
            Err(TermError::Unexpected { .. })
        ));
        assert!(matches!(
            Term::parse("='a'"),
            Err(TermError::Unexpected { expected: "attribute name", .. })
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let source = "type='join' and role='DEV'";
        let term = Term::parse(source).unwrap();
        assert_eq!(term.to_string(), source);
        assert_eq!(Term::parse(&term.to_string()).unwrap(), term);
    }
}
