//! Error type shared by every stage of the harvesting pipeline.

use thiserror::Error;

/// Errors produced by the harvesting library.
///
/// Per-identifier failures (`UnsupportedIdentifierFormat`, the `Fetch*` kinds,
/// `ParseFailure`) are reported through batch statistics and never abort a batch.
/// `ProxyUnusable` only ever removes one candidate during vetting.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unsupported identifier format: '{identifier}' ({reason})")]
    UnsupportedIdentifierFormat { identifier: String, reason: String },

    #[error("Transient fetch failure for {url}: {message}")]
    FetchTransient { url: String, message: String },

    #[error("Access blocked by {url} (HTTP {status})")]
    FetchBlocked { url: String, status: u16 },

    #[error("Failed to fetch {url} after {attempts} attempts: {last_error}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Failed to parse document: {0}")]
    ParseFailure(String),

    #[error("Proxy {proxy} unusable: {reason}")]
    ProxyUnusable { proxy: String, reason: String },

    #[error("Invalid proxy entry: {0}")]
    ProxyParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl AppError {
    /// Whether the fetcher should spend another attempt after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::FetchTransient { .. })
    }

    /// Short machine-friendly label, used in reports and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::UnsupportedIdentifierFormat { .. } => "unsupported_identifier",
            AppError::FetchTransient { .. } => "fetch_transient",
            AppError::FetchBlocked { .. } => "fetch_blocked",
            AppError::FetchExhausted { .. } => "fetch_exhausted",
            AppError::ParseFailure(_) => "parse_failure",
            AppError::ProxyUnusable { .. } => "proxy_unusable",
            AppError::ProxyParse(_) => "proxy_parse",
            AppError::Config(_) => "config",
            AppError::Initialization(_) => "initialization",
            AppError::Io(_) => "io",
            AppError::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_fetch_errors_are_retryable() {
        let transient = AppError::FetchTransient {
            url: "https://example.com".into(),
            message: "connection reset".into(),
        };
        let blocked = AppError::FetchBlocked {
            url: "https://example.com".into(),
            status: 403,
        };
        assert!(transient.is_retryable());
        assert!(!blocked.is_retryable());
        assert!(!AppError::ParseFailure("empty".into()).is_retryable());
        assert!(!AppError::Cancelled.is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = AppError::FetchExhausted {
            url: "https://example.com".into(),
            attempts: 3,
            last_error: "timed out".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("https://example.com"));
        assert!(msg.contains("3 attempts"));
        assert_eq!(err.kind(), "fetch_exhausted");
    }
}
