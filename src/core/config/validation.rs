//! Contains validation logic for the final Config struct.

use super::{Config, Result};
use crate::core::error::AppError;
use std::collections::HashSet;

/// Validates the configuration settings after loading and potential overrides.
/// Mutates the config to clamp values where a sane fallback exists.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if config.max_retries == 0 {
        tracing::warn!("max_retries was set to 0. Setting to 1.");
        config.max_retries = 1;
    }
    if config.max_concurrency == 0 {
        tracing::warn!("Max concurrency was set to 0. Setting to 1.");
        config.max_concurrency = 1;
    }
    if config.proxy_vet_concurrency == 0 {
        tracing::warn!("Proxy vetting concurrency was set to 0. Setting to 1.");
        config.proxy_vet_concurrency = 1;
    }
    if config.request_timeout.is_zero() {
        return Err(AppError::Config(
            "Request timeout must be greater than zero.".to_string(),
        ));
    }
    if config.proxy_probe_timeout.is_zero() {
        return Err(AppError::Config(
            "Proxy probe timeout must be greater than zero.".to_string(),
        ));
    }

    for (label, template) in [
        ("company_url_template", &config.company_url_template),
        ("person_url_template", &config.person_url_template),
    ] {
        if !template.contains("{code}") {
            return Err(AppError::Config(format!(
                "{} must contain a {{code}} placeholder: '{}'",
                label, template
            )));
        }
    }

    if let Some(status) = config
        .blocked_statuses
        .iter()
        .find(|s| !(100..=599).contains(*s))
    {
        return Err(AppError::Config(format!(
            "Blocked status {} is not a valid HTTP status code.",
            status
        )));
    }
    if config.blocked_statuses.iter().any(|s| (200..300).contains(s)) {
        tracing::warn!("blocked_statuses contains a 2xx code; successful responses are never treated as blocked.");
    }

    if config.use_proxies && config.proxy_file.is_none() && config.proxy_list_url.is_none() {
        return Err(AppError::Config(
            "use_proxies is enabled but neither a proxy file nor a proxy list URL is configured."
                .to_string(),
        ));
    }
    if config.use_proxies
        && (config.proxy_probe_url.is_empty() || config.proxy_judge_url.is_empty())
    {
        return Err(AppError::Config(
            "Proxy probe and judge URLs are required when use_proxies is enabled.".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for category in &config.categories {
        let name = category.name.trim();
        if name.is_empty() {
            return Err(AppError::Config("Category name cannot be empty.".to_string()));
        }
        if !seen.insert(name.to_string()) {
            return Err(AppError::Config(format!(
                "Category '{}' is declared more than once.",
                name
            )));
        }
        if category.urls_file.trim().is_empty() {
            return Err(AppError::Config(format!(
                "Category '{}' has an empty urls_file.",
                name
            )));
        }
    }

    if config.email_attributes.is_empty() {
        tracing::warn!("No email-bearing attributes configured; attribute scan disabled.");
    }
    if config.email_classes.is_empty() {
        tracing::warn!("No contact classes configured; class scan disabled.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CategoryConfig;
    use std::time::Duration;

    #[test]
    fn clamps_zero_counts() {
        let mut config = Config {
            max_retries: 0,
            max_concurrency: 0,
            ..Config::default()
        };
        validate_config(&mut config).unwrap();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.max_concurrency, 1);
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let mut config = Config {
            person_url_template: "https://example.com/people".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            validate_config(&mut config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn rejects_proxies_without_source() {
        let mut config = Config {
            use_proxies: true,
            proxy_file: None,
            proxy_list_url: None,
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn rejects_duplicate_categories_and_zero_timeout() {
        let category = CategoryConfig {
            name: "monitor".to_string(),
            urls_file: "a.txt".to_string(),
            output_file: None,
        };
        let mut config = Config {
            categories: vec![category.clone(), category],
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());

        let mut config = Config {
            request_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());
    }
}
