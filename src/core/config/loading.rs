//! Handles loading configuration from files and applying it to the Config struct.

use super::{Config, ConfigFile, Result};
use crate::core::error::AppError;
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration settings from a TOML file.
/// Returns the parsed `ConfigFile` content.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config_file_content: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::debug!("Successfully parsed configuration file: {}", file_path);
    Ok(config_file_content)
}

/// Merges every setting present in `file_config` onto `config`.
/// Also used for builder overrides, which share the `ConfigFile` shape.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) -> Result<()> {
    let extraction = &file_config.extraction;
    if let Some(retries) = extraction.max_retries {
        config.max_retries = retries;
    }
    if let Some(timeout) = extraction.timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(delay) = extraction.delay_between_requests {
        config.delay_between_requests = Duration::try_from_secs_f64(delay).map_err(|e| {
            AppError::Config(format!("Invalid delay_between_requests ({}): {}", delay, e))
        })?;
    }
    if let Some(use_proxies) = extraction.use_proxies {
        config.use_proxies = use_proxies;
    }
    if let Some(concurrency) = extraction.max_concurrency {
        config.max_concurrency = concurrency;
    }
    if let Some(ref statuses) = extraction.blocked_statuses {
        config.blocked_statuses = statuses.clone();
    }

    let proxies = &file_config.proxies;
    if let Some(ref file) = proxies.file {
        config.proxy_file = non_empty(file);
    }
    if let Some(ref url) = proxies.list_url {
        config.proxy_list_url = non_empty(url);
    }
    if let Some(timeout) = proxies.probe_timeout {
        config.proxy_probe_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref url) = proxies.probe_url {
        config.proxy_probe_url = url.trim().to_string();
    }
    if let Some(ref url) = proxies.judge_url {
        config.proxy_judge_url = url.trim().to_string();
    }
    if let Some(concurrency) = proxies.vet_concurrency {
        config.proxy_vet_concurrency = concurrency;
    }

    let identifiers = &file_config.identifiers;
    if let Some(ref template) = identifiers.company_url_template {
        config.company_url_template = template.trim().to_string();
    }
    if let Some(ref template) = identifiers.person_url_template {
        config.person_url_template = template.trim().to_string();
    }

    let scraping = &file_config.scraping;
    if let Some(ref attrs) = scraping.email_attributes {
        if !attrs.is_empty() {
            config.email_attributes = attrs.clone();
        }
    }
    if let Some(ref classes) = scraping.email_classes {
        if !classes.is_empty() {
            config.email_classes = classes.clone();
        }
    }
    if let Some(ref agents) = scraping.user_agents {
        config.user_agents = agents
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
    }

    if let Some(ref categories) = file_config.categories {
        config.categories = categories.clone();
    }
    Ok(())
}

/// Empty strings switch an optional source off.
fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
