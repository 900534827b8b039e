//! Turns raw identifiers (bare domains, URLs, registration codes) into fetchable URLs.

use crate::core::config::{Config, DEFAULT_COMPANY_URL_TEMPLATE, DEFAULT_PERSON_URL_TEMPLATE};
use crate::core::error::{AppError, Result};
use std::path::Path;
use url::Url;

/// Digit count of an entity registration code.
pub const COMPANY_CODE_LENGTH: usize = 13;
/// Digit count of an individual's registration code.
pub const PERSON_CODE_LENGTH: usize = 15;

const RECOGNIZED_SCHEMES: [&str; 2] = ["http://", "https://"];
const DEFAULT_SCHEME: &str = "https://";

/// What kind of reference an identifier turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Url,
    CompanyCode,
    PersonCode,
}

/// URL templates for coded identifiers. `{code}` is replaced by the digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierTemplates {
    pub company: String,
    pub person: String,
}

impl Default for IdentifierTemplates {
    fn default() -> Self {
        Self {
            company: DEFAULT_COMPANY_URL_TEMPLATE.to_string(),
            person: DEFAULT_PERSON_URL_TEMPLATE.to_string(),
        }
    }
}

impl IdentifierTemplates {
    pub fn from_config(config: &Config) -> Self {
        Self {
            company: config.company_url_template.clone(),
            person: config.person_url_template.clone(),
        }
    }
}

/// Normalizes an identifier using the default templates.
pub fn normalize(raw: &str) -> Result<String> {
    normalize_identifier(raw, &IdentifierTemplates::default()).map(|(url, _)| url)
}

/// Normalizes an identifier into a fetchable URL.
///
/// - Strings already starting with `http://` or `https://` are returned unchanged (trimmed).
/// - All-digit strings are registration codes: 13 digits map to the company template,
///   15 digits to the person template, any other length is unsupported.
///   Spreadsheet exports such as `1027700132195.0` are accepted.
/// - Anything else gets `https://` prepended.
///
/// Returns `Err(AppError::UnsupportedIdentifierFormat)` when no URL can be produced.
pub fn normalize_identifier(
    raw: &str,
    templates: &IdentifierTemplates,
) -> Result<(String, IdentifierKind)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(unsupported(raw, "identifier is empty"));
    }

    if let Some(code) = as_registration_code(trimmed) {
        let (template, kind) = match code.len() {
            COMPANY_CODE_LENGTH => (&templates.company, IdentifierKind::CompanyCode),
            PERSON_CODE_LENGTH => (&templates.person, IdentifierKind::PersonCode),
            other => {
                tracing::warn!(
                    "Unsupported registration code '{}' (length: {})",
                    code,
                    other
                );
                return Err(unsupported(
                    raw,
                    &format!(
                        "registration codes must have {} or {} digits, got {}",
                        COMPANY_CODE_LENGTH, PERSON_CODE_LENGTH, other
                    ),
                ));
            }
        };
        let url = template.replace("{code}", code);
        tracing::debug!("Mapped code {} to {}", code, url);
        return Ok((url, kind));
    }

    let lower = trimmed.to_ascii_lowercase();
    let candidate = if RECOGNIZED_SCHEMES.iter().any(|s| lower.starts_with(s)) {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        return Err(unsupported(raw, "unsupported URL scheme"));
    } else {
        format!("{}{}", DEFAULT_SCHEME, trimmed)
    };

    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => {
            tracing::trace!("Normalized '{}' to '{}'", trimmed, candidate);
            Ok((candidate, IdentifierKind::Url))
        }
        Ok(_) => Err(unsupported(raw, "URL has no host")),
        Err(e) => Err(unsupported(raw, &format!("not a valid URL: {}", e))),
    }
}

/// Returns the digits if `value` is a registration code, tolerating a `.0` suffix.
fn as_registration_code(value: &str) -> Option<&str> {
    let digits = value
        .strip_suffix(".0")
        .filter(|d| !d.is_empty())
        .unwrap_or(value);
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

/// Identifiers from a list file: one per line, blank lines and `#` comments skipped.
pub fn parse_identifier_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_identifiers(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    Ok(parse_identifier_lines(&text))
}

fn unsupported(identifier: &str, reason: &str) -> AppError {
    AppError::UnsupportedIdentifierFormat {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_domain_gets_https() {
        assert_eq!(normalize("example.com").unwrap(), "https://example.com");
        assert_eq!(normalize("  example.com/contacts ").unwrap(), "https://example.com/contacts");
    }

    #[test]
    fn existing_scheme_is_kept() {
        assert_eq!(normalize("https://example.com").unwrap(), "https://example.com");
        assert_eq!(normalize("http://example.com/a?b=1").unwrap(), "http://example.com/a?b=1");
        assert_eq!(normalize("HTTPS://Example.com").unwrap(), "HTTPS://Example.com");
    }

    #[test]
    fn company_code_maps_to_contacts_template() {
        let (url, kind) =
            normalize_identifier("1027700132195", &IdentifierTemplates::default()).unwrap();
        assert_eq!(url, "https://companium.ru/id/1027700132195/contacts");
        assert_eq!(kind, IdentifierKind::CompanyCode);
    }

    #[test]
    fn person_code_maps_to_individual_template() {
        let (url, kind) =
            normalize_identifier("304500116000157", &IdentifierTemplates::default()).unwrap();
        assert_eq!(url, "https://companium.ru/people/inn/304500116000157");
        assert_eq!(kind, IdentifierKind::PersonCode);
    }

    #[test]
    fn spreadsheet_float_codes_are_accepted() {
        assert_eq!(
            normalize("1027700132195.0").unwrap(),
            "https://companium.ru/id/1027700132195/contacts"
        );
    }

    #[test]
    fn other_code_lengths_are_unsupported() {
        for code in ["123", "123456789012", "12345678901234", "1234567890123456"] {
            assert!(
                matches!(
                    normalize(code),
                    Err(AppError::UnsupportedIdentifierFormat { .. })
                ),
                "{} should be rejected",
                code
            );
        }
    }

    #[test]
    fn garbage_is_unsupported() {
        assert!(normalize("").is_err());
        assert!(normalize("   ").is_err());
        assert!(normalize("ftp://example.com").is_err());
        assert!(normalize("https://").is_err());
        assert!(normalize("exa mple.com").is_err());
    }

    #[test]
    fn identifier_lists_skip_blanks_and_comments() {
        let text = "# companies\n1027700132195\n\n  example.com  \n#example.org\n";
        assert_eq!(parse_identifier_lines(text), vec!["1027700132195", "example.com"]);
    }

    #[test]
    fn identifier_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "a.test\nb.test\n").unwrap();
        assert_eq!(read_identifiers(&path).unwrap().len(), 2);
        assert!(matches!(
            read_identifiers(dir.path().join("missing.txt")),
            Err(AppError::Io(_))
        ));
    }

    #[test]
    fn custom_templates_are_used() {
        let templates = IdentifierTemplates {
            company: "https://registry.test/c/{code}".to_string(),
            person: "https://registry.test/p/{code}".to_string(),
        };
        let (url, _) = normalize_identifier("1027700132195", &templates).unwrap();
        assert_eq!(url, "https://registry.test/c/1027700132195");
    }
}
