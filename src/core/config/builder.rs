//! Provides the `ConfigBuilder` for fluent configuration construction.

use super::loading::{apply_file_config, load_config_file};
use super::validation::validate_config;
use super::{CategoryConfig, Config, ConfigFile, Result};
use crate::AppError;
use std::path::Path;
use std::time::Duration;

/// Files checked, in order, when no configuration file is named explicitly.
const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["./email-harvester.toml", "./config.toml"];

/// Builder pattern for creating `Config` instances fluently.
///
/// Layers defaults, an optional TOML file and explicit overrides, then validates.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    config_file_path: Option<String>,
    skip_default_locations: bool,
    overrides: ConfigFile,
}

impl ConfigBuilder {
    /// Creates a new builder with default configuration values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify an optional configuration file path to load.
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    /// Do not probe the default config file locations.
    pub fn without_default_files(mut self) -> Self {
        self.skip_default_locations = true;
        self
    }

    pub fn max_retries(mut self, value: u32) -> Self {
        self.overrides.extraction.max_retries = Some(value);
        self
    }
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.overrides.extraction.timeout = Some(duration.as_secs());
        self
    }
    pub fn delay_between_requests(mut self, duration: Duration) -> Self {
        self.overrides.extraction.delay_between_requests = Some(duration.as_secs_f64());
        self
    }
    pub fn use_proxies(mut self, enable: bool) -> Self {
        self.overrides.extraction.use_proxies = Some(enable);
        self
    }
    pub fn max_concurrency(mut self, value: usize) -> Self {
        self.overrides.extraction.max_concurrency = Some(value);
        self
    }
    pub fn blocked_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.overrides.extraction.blocked_statuses = Some(statuses);
        self
    }
    pub fn proxy_file(mut self, path: impl Into<String>) -> Self {
        self.overrides.proxies.file = Some(path.into());
        self
    }
    pub fn proxy_list_url(mut self, url: impl Into<String>) -> Self {
        self.overrides.proxies.list_url = Some(url.into());
        self
    }
    pub fn proxy_probe_timeout(mut self, duration: Duration) -> Self {
        self.overrides.proxies.probe_timeout = Some(duration.as_secs());
        self
    }
    pub fn proxy_vet_concurrency(mut self, value: usize) -> Self {
        self.overrides.proxies.vet_concurrency = Some(value);
        self
    }
    pub fn company_url_template(mut self, template: impl Into<String>) -> Self {
        self.overrides.identifiers.company_url_template = Some(template.into());
        self
    }
    pub fn person_url_template(mut self, template: impl Into<String>) -> Self {
        self.overrides.identifiers.person_url_template = Some(template.into());
        self
    }
    pub fn user_agents(mut self, agents: Vec<String>) -> Self {
        self.overrides.scraping.user_agents = Some(agents);
        self
    }
    pub fn categories(mut self, categories: Vec<CategoryConfig>) -> Self {
        self.overrides.categories = Some(categories);
        self
    }

    /// Builds the final `Config`: defaults, then the file layer, then overrides, then validation.
    pub fn build(mut self) -> Result<Config> {
        if let Some((path, file_config)) = self.locate_file_layer()? {
            apply_file_config(&mut self.config, &file_config)?;
            self.config.loaded_config_path = Some(path);
        }
        apply_file_config(&mut self.config, &self.overrides)?;
        validate_config(&mut self.config)?;

        tracing::debug!("Final configuration built successfully.");
        Ok(self.config)
    }

    /// An explicitly named file must load. Default locations are tried in
    /// order and a broken one is skipped with a warning.
    fn locate_file_layer(&self) -> Result<Option<(String, ConfigFile)>> {
        if let Some(ref path) = self.config_file_path {
            let file_config = load_config_file(path).map_err(|e| {
                AppError::Config(format!("Failed to load configuration file '{}': {:#}", path, e))
            })?;
            tracing::info!("Loaded configuration from {}", path);
            return Ok(Some((path.clone(), file_config)));
        }
        if self.skip_default_locations {
            return Ok(None);
        }

        let found = DEFAULT_CONFIG_LOCATIONS
            .iter()
            .filter(|path| Path::new(path).exists())
            .find_map(|path| match load_config_file(path) {
                Ok(file_config) => Some((path.to_string(), file_config)),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable config '{}': {:#}", path, e);
                    None
                }
            });
        match &found {
            Some((path, _)) => tracing::info!("Loaded configuration from default location {}", path),
            None => tracing::info!("No configuration file found; using defaults and overrides."),
        }
        Ok(found)
    }
}
