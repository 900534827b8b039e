//! Runtime configuration: defaults, the TOML file shape, and the builder that merges them.

mod builder;
mod loading;
mod validation;

pub use builder::ConfigBuilder;
pub use crate::core::error::Result;

use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_DELAY_SECS: u64 = 30;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

pub const DEFAULT_COMPANY_URL_TEMPLATE: &str = "https://companium.ru/id/{code}/contacts";
pub const DEFAULT_PERSON_URL_TEMPLATE: &str = "https://companium.ru/people/inn/{code}";
pub const DEFAULT_PROXY_LIST_URL: &str =
    "https://raw.githubusercontent.com/proxifly/free-proxy-list/refs/heads/main/proxies/countries/RU/data.txt";
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com/generate_204";
pub const DEFAULT_JUDGE_URL: &str = "https://httpbin.org/ip";

/// A named group of identifiers processed as one batch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub urls_file: String,
    #[serde(default)]
    pub output_file: Option<String>,
}

/// Fully resolved configuration used by the library.
#[derive(Debug, Clone)]
pub struct Config {
    // Fetching
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub delay_between_requests: Duration,
    pub max_concurrency: usize,
    pub blocked_statuses: Vec<u16>,

    // Proxies
    pub use_proxies: bool,
    pub proxy_file: Option<String>,
    pub proxy_list_url: Option<String>,
    pub proxy_probe_timeout: Duration,
    pub proxy_probe_url: String,
    pub proxy_judge_url: String,
    pub proxy_vet_concurrency: usize,

    // Identifier templates
    pub company_url_template: String,
    pub person_url_template: String,

    // Scraping
    pub email_attributes: Vec<String>,
    pub email_classes: Vec<String>,
    pub user_agents: Vec<String>,

    pub categories: Vec<CategoryConfig>,
    pub loaded_config_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            delay_between_requests: Duration::from_secs(DEFAULT_DELAY_SECS),
            max_concurrency: 1,
            blocked_statuses: vec![403, 451],

            use_proxies: false,
            proxy_file: Some("data/input/proxies.txt".to_string()),
            proxy_list_url: Some(DEFAULT_PROXY_LIST_URL.to_string()),
            proxy_probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            proxy_probe_url: DEFAULT_PROBE_URL.to_string(),
            proxy_judge_url: DEFAULT_JUDGE_URL.to_string(),
            proxy_vet_concurrency: 16,

            company_url_template: DEFAULT_COMPANY_URL_TEMPLATE.to_string(),
            person_url_template: DEFAULT_PERSON_URL_TEMPLATE.to_string(),

            email_attributes: ["data-email", "data-mail", "data-e-mail"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            email_classes: ["email", "mail", "e-mail", "contact-email", "contact-mail"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            user_agents: Vec::new(),

            categories: Vec::new(),
            loaded_config_path: None,
        }
    }
}

impl Config {
    /// Looks up a configured category by name.
    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub proxies: ProxySettings,
    #[serde(default)]
    pub identifiers: IdentifierSettings,
    #[serde(default)]
    pub scraping: ScrapingSettings,
    #[serde(default)]
    pub categories: Option<Vec<CategoryConfig>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExtractionSettings {
    pub max_retries: Option<u32>,
    /// Seconds.
    pub timeout: Option<u64>,
    /// Seconds.
    pub delay_between_requests: Option<f64>,
    pub use_proxies: Option<bool>,
    pub max_concurrency: Option<usize>,
    pub blocked_statuses: Option<Vec<u16>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ProxySettings {
    pub file: Option<String>,
    pub list_url: Option<String>,
    /// Seconds.
    pub probe_timeout: Option<u64>,
    pub probe_url: Option<String>,
    pub judge_url: Option<String>,
    pub vet_concurrency: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct IdentifierSettings {
    pub company_url_template: Option<String>,
    pub person_url_template: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScrapingSettings {
    pub email_attributes: Option<Vec<String>>,
    pub email_classes: Option<Vec<String>>,
    pub user_agents: Option<Vec<String>>,
}
