//! Retrying page fetcher with per-attempt header and proxy rotation.

use super::client::{PageClient, PageResponse, ReqwestPageClient};
use super::proxy::ProxyPool;
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{AttemptOutcome, FetchAttempt, ProxyEndpoint};
use crate::utils::headers::{synthesize_headers, UserAgentPool};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::header::{HeaderMap, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff exponent cap, so a large retry budget cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 10;

pub struct Fetcher {
    client: Arc<dyn PageClient>,
    proxies: Arc<ProxyPool>,
    agents: UserAgentPool,
    rng: Mutex<StdRng>,
    max_retries: u32,
    timeout: Duration,
    blocked_statuses: Vec<u16>,
}

impl Fetcher {
    pub fn new(client: Arc<dyn PageClient>, proxies: Arc<ProxyPool>, config: &Config) -> Self {
        Self::with_rng(client, proxies, config, StdRng::from_entropy())
    }

    /// Same as [`Fetcher::new`] with a caller-supplied RNG, for reproducible runs.
    pub fn with_rng(
        client: Arc<dyn PageClient>,
        proxies: Arc<ProxyPool>,
        config: &Config,
        mut rng: StdRng,
    ) -> Self {
        let agents = UserAgentPool::from_config(&mut rng, &config.user_agents);
        Self {
            client,
            proxies,
            agents,
            rng: Mutex::new(rng),
            max_retries: config.max_retries.max(1),
            timeout: config.request_timeout,
            blocked_statuses: config.blocked_statuses.clone(),
        }
    }

    /// Fetcher over real HTTP.
    pub fn from_config(config: &Config, proxies: Arc<ProxyPool>) -> Self {
        Self::new(Arc::new(ReqwestPageClient::new()), proxies, config)
    }

    pub fn proxies(&self) -> &ProxyPool {
        &self.proxies
    }

    /// Fetches `url`, retrying transient failures.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        self.fetch_with_cancel(url, &CancellationToken::new()).await
    }

    /// Fetches `url` with up to `max_retries` attempts, waiting `2^attempt`
    /// seconds between them.
    ///
    /// A 2xx returns the body. A blocked status fails at once with
    /// `FetchBlocked`. Anything else is retried; when the budget runs out the
    /// result is `FetchExhausted`. Cancellation is honoured before every
    /// attempt and during backoff.
    pub async fn fetch_with_cancel(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        let mut last_error = String::new();
        let mut attempts_made = 0;

        for attempt in 0..self.max_retries {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let (headers, proxy) = self.prepare_attempt();
            let user_agent = headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();

            let result = tokio::time::timeout(
                self.timeout,
                self.client.get(url, headers, proxy.as_ref(), self.timeout),
            )
            .await
            .unwrap_or_else(|_| {
                Err(AppError::FetchTransient {
                    url: url.to_string(),
                    message: format!("timed out after {:?}", self.timeout),
                })
            });

            let outcome = self.classify(&result);
            let record = FetchAttempt {
                url: url.to_string(),
                proxy,
                user_agent,
                attempt: attempt + 1,
                outcome,
            };
            log_attempt(&record, self.max_retries);
            attempts_made = attempt + 1;

            // A direct request failing for a non-transport reason fails the same way again.
            let hopeless = record.proxy.is_none()
                && matches!(&result, Err(e) if !e.is_retryable());

            match (record.outcome, result) {
                (AttemptOutcome::Success { .. }, Ok(page)) => return Ok(page.body),
                (AttemptOutcome::Blocked { status }, _) => {
                    return Err(AppError::FetchBlocked {
                        url: url.to_string(),
                        status,
                    })
                }
                (AttemptOutcome::Transient { reason }, _) => last_error = reason,
                (AttemptOutcome::Success { .. }, Err(_)) => {}
            }
            if hopeless {
                break;
            }

            if attempt + 1 < self.max_retries {
                let backoff = Duration::from_secs(1u64 << attempt.min(MAX_BACKOFF_EXPONENT));
                tracing::debug!(target: "fetch_task", "[{}] Backing off {:?}", url, backoff);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AppError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }

        tracing::warn!(
            target: "fetch_task",
            "[{}] Giving up after {} attempts: {}",
            url,
            attempts_made,
            last_error
        );
        Err(AppError::FetchExhausted {
            url: url.to_string(),
            attempts: attempts_made,
            last_error,
        })
    }

    /// Fresh headers and a fresh proxy. The RNG lock is released before any await.
    fn prepare_attempt(&self) -> (HeaderMap, Option<ProxyEndpoint>) {
        let mut rng = self.rng.lock();
        let headers = synthesize_headers(&mut *rng, &self.agents);
        let proxy = self.proxies.choose(&mut *rng).cloned();
        (headers, proxy)
    }

    fn classify(&self, result: &Result<PageResponse>) -> AttemptOutcome {
        match result {
            Ok(page) if page.is_success() => AttemptOutcome::Success {
                status: page.status,
            },
            Ok(page) if self.blocked_statuses.contains(&page.status) => AttemptOutcome::Blocked {
                status: page.status,
            },
            Ok(page) => AttemptOutcome::Transient {
                reason: format!("HTTP {}", page.status),
            },
            Err(AppError::FetchTransient { message, .. }) => AttemptOutcome::Transient {
                reason: message.clone(),
            },
            Err(e) => AttemptOutcome::Transient {
                reason: format!("{} [{}]", e, e.kind()),
            },
        }
    }
}

fn log_attempt(record: &FetchAttempt, max_attempts: u32) {
    let via = record
        .proxy
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "direct".to_string());
    match &record.outcome {
        AttemptOutcome::Success { status } => tracing::info!(
            target: "fetch_task",
            "[{}] Attempt {}/{} via {}: HTTP {}",
            record.url, record.attempt, max_attempts, via, status
        ),
        AttemptOutcome::Blocked { status } => tracing::warn!(
            target: "fetch_task",
            "[{}] Attempt {}/{} via {}: blocked with HTTP {}",
            record.url, record.attempt, max_attempts, via, status
        ),
        AttemptOutcome::Transient { reason } => tracing::warn!(
            target: "fetch_task",
            "[{}] Attempt {}/{} via {} failed: {}",
            record.url, record.attempt, max_attempts, via, reason
        ),
    }
    tracing::trace!(target: "fetch_task", "[{}] User-Agent: {}", record.url, record.user_agent);
}
