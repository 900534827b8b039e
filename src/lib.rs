//! # Email Harvester Core Library
//!
//! Harvests contact email addresses and entity names from web pages. Raw
//! identifiers (domains, URLs or registry codes) are normalized into URLs,
//! fetched with retries through an optional pool of vetted proxies, and
//! scanned by several extraction strategies whose results are validated
//! against a strict address grammar.
//!
//! The `email-harvester` binary is a thin CLI over this library.

pub mod core;
pub mod extraction;
pub mod network;
pub mod utils;

pub use crate::core::config::{CategoryConfig, Config, ConfigBuilder, ConfigFile};
pub use crate::core::error::{AppError, Result};
pub use crate::core::harvester::Harvester;
pub use crate::core::models::{
    BatchReport, ExtractionResult, IdentifierOutcome, IdentifierStatus, PipelineStats,
    ProxyEndpoint, ResultRow, DEFAULT_CATEGORY,
};
pub use crate::extraction::{extract, ExtractionRules};
pub use crate::network::proxy::vet_proxies;
pub use crate::network::{Fetcher, ProxyPool};
pub use crate::utils::address::{normalize, read_identifiers};
pub use crate::utils::email::validate;

use crate::network::proxy::gather_candidates;
use std::sync::Arc;

/// Gathers proxy candidates from the configured sources and vets them.
///
/// Returns an empty pool (direct connections) when proxies are disabled or
/// none survive vetting.
pub async fn prepare_proxy_pool(config: &Config) -> ProxyPool {
    if !config.use_proxies {
        return ProxyPool::empty();
    }

    let candidates = gather_candidates(config).await;
    if candidates.is_empty() {
        tracing::warn!(target: "proxy_vetting", "No proxy candidates found; using direct connections.");
        return ProxyPool::empty();
    }

    let pool = vet_proxies(config, candidates).await;
    if pool.is_empty() {
        tracing::warn!(target: "proxy_vetting", "No proxy passed vetting; using direct connections.");
    }
    pool
}

/// Builds a ready-to-run [`Harvester`]: proxies are vetted once here and
/// the pool stays fixed for the harvester's lifetime.
pub async fn initialize_harvester(config: Arc<Config>) -> Result<Harvester> {
    tracing::debug!("Initializing harvester components...");
    let proxies = Arc::new(prepare_proxy_pool(&config).await);
    let fetcher = Fetcher::from_config(&config, proxies);
    let harvester = Harvester::new(config, fetcher)?;
    tracing::info!(
        "Harvester initialized ({} proxies in pool).",
        harvester.fetcher().proxies().len()
    );
    Ok(harvester)
}
