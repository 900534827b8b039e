//! Data structures passed between the pipeline stages and returned to callers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// Label used when no entity name heuristic matches a page.
pub const UNKNOWN_ENTITY: &str = "Unknown entity";

/// Category used for batches that were not started under a named category.
pub const DEFAULT_CATEGORY: &str = "default";

/// Proxy protocols the HTTP client can route through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Http,
    Https,
    Socks5,
    Socks5h,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
            ProxyScheme::Socks5 => "socks5",
            ProxyScheme::Socks5h => "socks5h",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "http" => Some(ProxyScheme::Http),
            "https" => Some(ProxyScheme::Https),
            "socks5" => Some(ProxyScheme::Socks5),
            "socks5h" => Some(ProxyScheme::Socks5h),
            _ => None,
        }
    }
}

/// A single proxy candidate. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
}

impl ProxyEndpoint {
    pub fn new(scheme: ProxyScheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// The proxy as a URL string suitable for `reqwest::Proxy::all`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// Outcome of a single HTTP attempt, recorded by the fetcher for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttemptOutcome {
    Success { status: u16 },
    Blocked { status: u16 },
    Transient { reason: String },
}

/// One try of a fetch. Created per attempt and discarded with the fetch.
#[derive(Debug, Clone, Serialize)]
pub struct FetchAttempt {
    pub url: String,
    pub proxy: Option<ProxyEndpoint>,
    pub user_agent: String,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
}

/// Entity name and candidate emails pulled from one document.
///
/// Once returned by [`crate::extract`], `emails` only holds addresses accepted
/// by the strict grammar, sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub entity_name: String,
    pub emails: BTreeSet<String>,
}

/// Why an identifier ended up where it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum IdentifierStatus {
    /// At least one validated email was found.
    Succeeded,
    /// The page was fetched and parsed but held no valid email.
    NoEmails,
    /// The identifier could not be turned into a URL.
    Skipped(String),
    /// The host refused access outright; not retried.
    Blocked(u16),
    /// Every attempt failed.
    Exhausted(String),
    /// The document could not be parsed.
    ParseFailed(String),
}

impl IdentifierStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, IdentifierStatus::Succeeded)
    }
}

/// Per-identifier record produced by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifierOutcome {
    pub identifier: String,
    pub category: String,
    pub url: Option<String>,
    pub entity_name: String,
    pub emails: Vec<String>,
    #[serde(flatten)]
    pub status: IdentifierStatus,
}

/// Counters for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub emails_found: usize,
}

/// Running batch counters. Mutated only by the orchestrator after each
/// identifier completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub blocked: usize,
    pub total_emails: usize,
    pub categories: BTreeMap<String, CategoryStats>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one completed identifier into the counters.
    pub fn record(&mut self, outcome: &IdentifierOutcome) {
        self.attempted += 1;
        let category = self.categories.entry(outcome.category.clone()).or_default();
        category.attempted += 1;

        match &outcome.status {
            IdentifierStatus::Succeeded => {
                self.succeeded += 1;
                self.total_emails += outcome.emails.len();
                category.succeeded += 1;
                category.emails_found += outcome.emails.len();
            }
            other => {
                self.failed += 1;
                category.failed += 1;
                match other {
                    IdentifierStatus::Skipped(_) => self.skipped += 1,
                    IdentifierStatus::Blocked(_) => self.blocked += 1,
                    _ => {}
                }
            }
        }
    }

    /// Merges counters from another run into this one.
    pub fn absorb(&mut self, other: &PipelineStats) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.blocked += other.blocked;
        self.total_emails += other.total_emails;
        for (name, stats) in &other.categories {
            let entry = self.categories.entry(name.clone()).or_default();
            entry.attempted += stats.attempted;
            entry.succeeded += stats.succeeded;
            entry.failed += stats.failed;
            entry.emails_found += stats.emails_found;
        }
    }
}

/// One output row: entity name paired with an email (empty when none was found).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultRow {
    pub name: String,
    pub email: String,
}

/// Everything a batch produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub category: String,
    pub outcomes: Vec<IdentifierOutcome>,
    pub stats: PipelineStats,
    /// Sorted union of every validated email across the batch.
    pub unique_emails: Vec<String>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub cancelled: bool,
}

impl BatchReport {
    /// Tabular rows (entity name, email) in identifier order.
    pub fn rows(&self) -> Vec<ResultRow> {
        let mut rows = Vec::new();
        for outcome in &self.outcomes {
            match outcome.status {
                IdentifierStatus::Succeeded => {
                    rows.extend(outcome.emails.iter().map(|email| ResultRow {
                        name: outcome.entity_name.clone(),
                        email: email.clone(),
                    }));
                }
                IdentifierStatus::NoEmails if !outcome.entity_name.is_empty() => {
                    rows.push(ResultRow {
                        name: outcome.entity_name.clone(),
                        email: String::new(),
                    });
                }
                _ => {}
            }
        }
        rows
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(category: &str, status: IdentifierStatus, emails: &[&str]) -> IdentifierOutcome {
        IdentifierOutcome {
            identifier: "id".to_string(),
            category: category.to_string(),
            url: Some("https://example.com".to_string()),
            entity_name: "Acme".to_string(),
            emails: emails.iter().map(|e| e.to_string()).collect(),
            status,
        }
    }

    #[test]
    fn stats_record_successes_and_failures_per_category() {
        let mut stats = PipelineStats::new();
        stats.record(&outcome("shops", IdentifierStatus::Succeeded, &["a@b.com", "c@d.com"]));
        stats.record(&outcome("shops", IdentifierStatus::Blocked(403), &[]));
        stats.record(&outcome("labs", IdentifierStatus::Skipped("bad".into()), &[]));
        stats.record(&outcome("labs", IdentifierStatus::NoEmails, &[]));

        assert_eq!(stats.attempted, 4);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.total_emails, 2);
        assert_eq!(stats.categories["shops"].emails_found, 2);
        assert_eq!(stats.categories["labs"].failed, 2);
    }

    #[test]
    fn absorb_sums_counters() {
        let mut a = PipelineStats::new();
        a.record(&outcome("x", IdentifierStatus::Succeeded, &["a@b.com"]));
        let mut b = PipelineStats::new();
        b.record(&outcome("x", IdentifierStatus::NoEmails, &[]));
        a.absorb(&b);
        assert_eq!(a.attempted, 2);
        assert_eq!(a.categories["x"].attempted, 2);
        assert_eq!(a.categories["x"].succeeded, 1);
    }

    #[test]
    fn rows_include_named_pages_without_emails() {
        let report = BatchReport {
            category: DEFAULT_CATEGORY.to_string(),
            outcomes: vec![
                outcome("x", IdentifierStatus::Succeeded, &["a@b.com", "c@d.com"]),
                outcome("x", IdentifierStatus::NoEmails, &[]),
                outcome("x", IdentifierStatus::Exhausted("timeout".into()), &[]),
            ],
            stats: PipelineStats::new(),
            unique_emails: vec![],
            duration: Duration::from_secs(1),
            cancelled: false,
        };
        let rows = report.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].email, "");
    }

    #[test]
    fn proxy_endpoint_formats_as_url() {
        let proxy = ProxyEndpoint::new(ProxyScheme::Socks5, "10.0.0.1", 1080);
        assert_eq!(proxy.url(), "socks5://10.0.0.1:1080");
        assert_eq!(ProxyScheme::from_name("HTTPS"), Some(ProxyScheme::Https));
        assert_eq!(ProxyScheme::from_name("socks4"), None);
    }
}
