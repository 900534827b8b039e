//! Email harvesting pattern and the strict grammar every reported address must satisfy.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Loose pattern used to pull candidates out of arbitrary text.
static HARVEST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b")
        .expect("harvest pattern is a valid regex")
});

/// Strict grammar: dot-separated atoms, `@`, two or more DNS labels that
/// start and end with an alphanumeric. Case-insensitive.
static STRICT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$",
    )
    .expect("strict email pattern is a valid regex")
});

/// Raw regex matches in `text`. Callers must run them through [`validate`]
/// before exposing them.
pub fn harvest_candidates(text: &str) -> impl Iterator<Item = &str> {
    HARVEST_PATTERN.find_iter(text).map(|m| m.as_str())
}

/// Whether `email` satisfies the strict grammar.
pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && STRICT_PATTERN.is_match(email)
}

/// Filters candidates through the strict grammar and returns the sorted,
/// duplicate-free survivors. Casing is preserved.
pub fn validate<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let candidate = candidate.as_ref();
            if is_valid_email(candidate) {
                Some(candidate.to_string())
            } else {
                tracing::trace!(target: "extract_task", "Rejected candidate '{}'", candidate);
                None
            }
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_addresses() {
        for email in [
            "test@example.com",
            "user.name@domain.co.uk",
            "user+tag@example.org",
            "user123@test-domain.com",
            "Info@Example.COM",
        ] {
            assert!(is_valid_email(email), "{} should be valid", email);
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in [
            "invalid-email",
            "@example.com",
            "test@",
            "test@.com",
            "test..test@example.com",
            ".test@example.com",
            "test.@example.com",
            "test@example",
            "test@-example.com",
            "test@example-.com",
            "",
        ] {
            assert!(!is_valid_email(email), "{} should be invalid", email);
        }
    }

    #[test]
    fn validate_filters_list() {
        let valid = validate(["valid@example.com", "invalid-email", "another@test.org", "@invalid.com"]);
        assert_eq!(valid, vec!["another@test.org", "valid@example.com"]);
    }

    #[test]
    fn validate_is_idempotent_and_case_preserving() {
        for email in ["a@b.co", "John.Smith@Example.org", "x_y-z@sub.domain.ru"] {
            assert_eq!(validate([email]), vec![email.to_string()]);
        }
    }

    #[test]
    fn validate_dedups_and_sorts() {
        let out = validate(["b@x.com", "a@x.com", "b@x.com", "a@x.com", "c@x.com"]);
        assert_eq!(out, vec!["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[test]
    fn harvest_finds_embedded_addresses() {
        let found: Vec<&str> =
            harvest_candidates("Write to sales@acme.com or support@help.acme.io today.").collect();
        assert_eq!(found, vec!["sales@acme.com", "support@help.acme.io"]);
    }

    #[test]
    fn harvest_overaccepts_what_validation_rejects() {
        let raw: Vec<&str> = harvest_candidates("odd..dots@example.com").collect();
        assert_eq!(raw, vec!["odd..dots@example.com"]);
        assert!(validate(raw).is_empty());
    }
}
