//! The correlation token that names every dispatched command.
//!
//! A token is the only thing the completion channel carries besides the
//! resource id, so it has to encode enough to route the signal back to the
//! originating request: the verb, the subject the command operated on, and a
//! disambiguator separating otherwise-identical commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field separator in the wire form. No token field may contain it; the
/// feature layer is responsible for choosing safe subjects (e.g. cleaned
/// domain names).
pub const SEPARATOR: &str = "---";

// ---------------------------------------------------------------------------
// CommandToken
// ---------------------------------------------------------------------------

/// Immutable 3-part correlation token, wire form
/// `verb---subject---disambiguator`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandToken {
    /// Action identifier, e.g. `backup-run-manual`.
    pub verb: String,
    /// Stable string identifying what the command operates on, typically a
    /// domain name.
    pub subject: String,
    /// Either a unique epoch-second nonce or a shared time-bucket value.
    pub disambiguator: String,
}

impl CommandToken {
    /// Token with a unique epoch-second nonce. Used for actions that must be
    /// individually auditable.
    pub fn one_shot(verb: impl Into<String>, subject: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            verb: verb.into(),
            subject: subject.into(),
            disambiguator: now.timestamp().to_string(),
        }
    }

    /// Token whose disambiguator is the current time bucket. Two commands for
    /// the same verb and subject issued within the same bucket produce
    /// identical tokens, collapsing accidental double-submissions.
    pub fn windowed(
        verb: impl Into<String>,
        subject: impl Into<String>,
        now: DateTime<Utc>,
        window_seconds: u64,
    ) -> Self {
        let window = window_seconds.max(1) as i64;
        let ts = now.timestamp();
        Self {
            verb: verb.into(),
            subject: subject.into(),
            disambiguator: (ts - ts.rem_euclid(window)).to_string(),
        }
    }

    /// Parse the wire form. Returns `None` unless splitting on `---` yields
    /// exactly three non-empty fields. Never panics; callers treat `None` as
    /// "ignore this completion".
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        match parts.as_slice() {
            [verb, subject, disambiguator]
                if !verb.is_empty() && !subject.is_empty() && !disambiguator.is_empty() =>
            {
                Some(Self {
                    verb: verb.to_string(),
                    subject: subject.to_string(),
                    disambiguator: disambiguator.to_string(),
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for CommandToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.verb,
            self.subject,
            self.disambiguator,
            sep = SEPARATOR
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trip() {
        let token = CommandToken {
            verb: "backup-run-manual".into(),
            subject: "example.com".into(),
            disambiguator: "1700000000".into(),
        };
        let wire = token.to_string();
        assert_eq!(wire, "backup-run-manual---example.com---1700000000");
        assert_eq!(CommandToken::parse(&wire).unwrap(), token);
    }

    #[test]
    fn parse_rejects_wrong_arity() {
        assert!(CommandToken::parse("only-one-part").is_none());
        assert!(CommandToken::parse("two---parts").is_none());
        assert!(CommandToken::parse("a---b---c---d").is_none());
        assert!(CommandToken::parse("").is_none());
    }

    #[test]
    fn parse_rejects_empty_fields() {
        assert!(CommandToken::parse("---b---c").is_none());
        assert!(CommandToken::parse("a------c").is_none());
        assert!(CommandToken::parse("a---b---").is_none());
    }

    #[test]
    fn one_shot_uses_epoch_seconds() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = CommandToken::one_shot("backup-run-manual", "example.com", now);
        assert_eq!(token.disambiguator, "1700000000");
    }

    #[test]
    fn windowed_collapses_within_bucket() {
        let first = Utc.timestamp_opt(1_700_000_003, 0).unwrap();
        let second = Utc.timestamp_opt(1_700_000_041, 0).unwrap();
        let a = CommandToken::windowed("replace_domain", "example.com", first, 60);
        let b = CommandToken::windowed("replace_domain", "example.com", second, 60);
        assert_eq!(a, b);
        assert_eq!(a.disambiguator, "1700000000");
    }

    #[test]
    fn windowed_differs_across_buckets() {
        let first = Utc.timestamp_opt(1_700_000_059, 0).unwrap();
        let second = Utc.timestamp_opt(1_700_000_061, 0).unwrap();
        let a = CommandToken::windowed("replace_domain", "example.com", first, 60);
        let b = CommandToken::windowed("replace_domain", "example.com", second, 60);
        assert_ne!(a.disambiguator, b.disambiguator);
    }
}
