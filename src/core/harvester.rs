use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{BatchReport, IdentifierOutcome, IdentifierStatus, PipelineStats};
use crate::extraction::ExtractionRules;
use crate::network::Fetcher;
use crate::utils::address::{normalize_identifier, IdentifierTemplates};

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Drives identifiers through normalize, fetch, extract and validate.
#[derive(Clone)]
pub struct Harvester {
    config: Arc<Config>,
    fetcher: Arc<Fetcher>,
    rules: Arc<ExtractionRules>,
    templates: Arc<IdentifierTemplates>,
}

/// Spaces identifier starts by a fixed interval across all workers.
struct Pacer {
    interval: Duration,
    next_start: tokio::sync::Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_start: tokio::sync::Mutex::new(None),
        }
    }

    /// Waits for this caller's slot. Returns `false` if cancelled first.
    async fn wait(&self, cancel: &CancellationToken) -> bool {
        let mut next_start = self.next_start.lock().await;
        if cancel.is_cancelled() {
            return false;
        }
        if let Some(at) = *next_start {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = sleep_until(at) => {}
            }
        }
        *next_start = Some(Instant::now() + self.interval);
        true
    }
}

type TaskResult = std::result::Result<Option<(usize, IdentifierOutcome)>, JoinError>;

impl Harvester {
    pub fn new(config: Arc<Config>, fetcher: Fetcher) -> Result<Self> {
        let rules = ExtractionRules::from_config(&config)?;
        let templates = IdentifierTemplates::from_config(&config);
        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
            rules: Arc::new(rules),
            templates: Arc::new(templates),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Processes one identifier end to end, without pacing.
    ///
    /// Per-identifier failures are folded into the returned outcome; the
    /// only error is `AppError::Cancelled`.
    pub async fn process_identifier(
        &self,
        category: &str,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<IdentifierOutcome> {
        match normalize_identifier(identifier, &self.templates) {
            Ok((url, _)) => self.harvest_url(category, identifier, url, cancel).await,
            Err(e) => Ok(skipped(category, identifier, &e)),
        }
    }

    pub async fn run_batch(
        &self,
        category: &str,
        identifiers: Vec<String>,
        cancel: CancellationToken,
    ) -> BatchReport {
        self.run_batch_with_progress(category, identifiers, cancel, |_| {})
            .await
    }

    /// Runs a batch, calling `on_progress` as each identifier is recorded.
    ///
    /// At most `max_concurrency` identifiers are in flight and their starts
    /// are spaced by `delay_between_requests`. Outcomes come back in input
    /// order. After cancellation no new identifier starts; those that did
    /// not finish leave no record.
    pub async fn run_batch_with_progress<F>(
        &self,
        category: &str,
        identifiers: Vec<String>,
        cancel: CancellationToken,
        mut on_progress: F,
    ) -> BatchReport
    where
        F: FnMut(&IdentifierOutcome),
    {
        let start = Instant::now();
        let total = identifiers.len();
        let concurrency = self.config.max_concurrency.max(1);
        tracing::info!(
            target: "batch_task",
            "[{}] Starting batch of {} identifiers (concurrency {}, delay {:?})",
            category,
            total,
            concurrency,
            self.config.delay_between_requests
        );

        let pacer = Arc::new(Pacer::new(self.config.delay_between_requests));
        let mut stats = PipelineStats::new();
        let mut outcomes: Vec<(usize, IdentifierOutcome)> = Vec::with_capacity(total);
        let mut tasks = FuturesUnordered::new();

        let mut record = |index: usize, outcome: IdentifierOutcome| {
            stats.record(&outcome);
            on_progress(&outcome);
            outcomes.push((index, outcome));
        };

        for (index, identifier) in identifiers.into_iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(target: "batch_task", "[{}] Cancelled before identifier {}", category, index + 1);
                break;
            }

            let url = match normalize_identifier(&identifier, &self.templates) {
                Ok((url, _)) => url,
                Err(e) => {
                    record(index, skipped(category, &identifier, &e));
                    continue;
                }
            };

            while tasks.len() >= concurrency {
                match tasks.next().await {
                    Some(joined) => collect(category, joined, &mut record),
                    None => break,
                }
            }

            let harvester = self.clone();
            let pacer = Arc::clone(&pacer);
            let cancel = cancel.clone();
            let category = category.to_string();
            tasks.push(tokio::spawn(async move {
                if !pacer.wait(&cancel).await {
                    return None;
                }
                harvester
                    .harvest_url(&category, &identifier, url, &cancel)
                    .await
                    .ok()
                    .map(|outcome| (index, outcome))
            }));
        }

        while let Some(joined) = tasks.next().await {
            collect(category, joined, &mut record);
        }
        drop(record);

        outcomes.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<IdentifierOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();
        let unique_emails: Vec<String> = outcomes
            .iter()
            .flat_map(|o| o.emails.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let duration = start.elapsed();
        let cancelled = cancel.is_cancelled();
        tracing::info!(
            target: "batch_task",
            "[{}] Batch finished in {:.2?}: {}/{} succeeded, {} unique emails{}",
            category,
            duration,
            stats.succeeded,
            stats.attempted,
            unique_emails.len(),
            if cancelled { " (cancelled)" } else { "" }
        );

        BatchReport {
            category: category.to_string(),
            outcomes,
            stats,
            unique_emails,
            duration,
            cancelled,
        }
    }

    async fn harvest_url(
        &self,
        category: &str,
        identifier: &str,
        url: String,
        cancel: &CancellationToken,
    ) -> Result<IdentifierOutcome> {
        tracing::info!(target: "batch_task", "[{}] Fetching {}", identifier, url);
        let mut outcome = IdentifierOutcome {
            identifier: identifier.to_string(),
            category: category.to_string(),
            url: Some(url),
            entity_name: String::new(),
            emails: Vec::new(),
            status: IdentifierStatus::NoEmails,
        };
        let url = outcome.url.as_deref().unwrap_or_default();

        let html = match self.fetcher.fetch_with_cancel(url, cancel).await {
            Ok(html) => html,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(AppError::FetchBlocked { status, .. }) => {
                tracing::warn!(target: "batch_task", "[{}] Access blocked (HTTP {})", identifier, status);
                outcome.status = IdentifierStatus::Blocked(status);
                return Ok(outcome);
            }
            Err(AppError::FetchExhausted { last_error, .. }) => {
                tracing::warn!(target: "batch_task", "[{}] No content: {}", identifier, last_error);
                outcome.status = IdentifierStatus::Exhausted(last_error);
                return Ok(outcome);
            }
            Err(e) => {
                tracing::error!(target: "batch_task", "[{}] Fetch failed: {}", identifier, e);
                outcome.status = IdentifierStatus::Exhausted(e.to_string());
                return Ok(outcome);
            }
        };

        match self.rules.extract(&html) {
            Ok(result) => {
                outcome.entity_name = result.entity_name;
                outcome.emails = result.emails.into_iter().collect();
                if outcome.emails.is_empty() {
                    tracing::info!(target: "batch_task", "[{}] No emails on page ({})", identifier, outcome.entity_name);
                } else {
                    tracing::info!(
                        target: "batch_task",
                        "[{}] Found {} emails for {}",
                        identifier,
                        outcome.emails.len(),
                        outcome.entity_name
                    );
                    outcome.status = IdentifierStatus::Succeeded;
                }
            }
            Err(e) => {
                tracing::warn!(target: "batch_task", "[{}] Could not parse page: {}", identifier, e);
                outcome.status = IdentifierStatus::ParseFailed(e.to_string());
            }
        }
        Ok(outcome)
    }
}

fn skipped(category: &str, identifier: &str, error: &AppError) -> IdentifierOutcome {
    tracing::warn!(target: "batch_task", "[{}] Skipping: {}", identifier, error);
    IdentifierOutcome {
        identifier: identifier.to_string(),
        category: category.to_string(),
        url: None,
        entity_name: String::new(),
        emails: Vec::new(),
        status: IdentifierStatus::Skipped(error.to_string()),
    }
}

fn collect<F>(category: &str, joined: TaskResult, record: &mut F)
where
    F: FnMut(usize, IdentifierOutcome),
{
    match joined {
        Ok(Some((index, outcome))) => record(index, outcome),
        Ok(None) => tracing::debug!(target: "batch_task", "[{}] Identifier dropped after cancellation", category),
        Err(e) => tracing::error!(target: "batch_task", "[{}] A harvesting task failed to join: {}", category, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{ProxyEndpoint, DEFAULT_CATEGORY};
    use crate::network::client::{PageClient, PageResponse};
    use crate::network::ProxyPool;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use reqwest::header::HeaderMap;
    use std::collections::HashMap;

    /// Serves fixed pages by URL; unknown URLs fail at the transport level.
    struct SiteMap {
        pages: HashMap<String, PageResponse>,
        requested: Mutex<Vec<String>>,
    }

    impl SiteMap {
        fn new(pages: &[(&str, u16, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, status, body)| {
                        (
                            url.to_string(),
                            PageResponse {
                                status: *status,
                                body: body.to_string(),
                            },
                        )
                    })
                    .collect(),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PageClient for SiteMap {
        async fn get(
            &self,
            url: &str,
            _headers: HeaderMap,
            _proxy: Option<&ProxyEndpoint>,
            _timeout: Duration,
        ) -> Result<PageResponse> {
            self.requested.lock().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| AppError::FetchTransient {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    fn harvester(site: Arc<SiteMap>, config: Config) -> Harvester {
        let fetcher = Fetcher::with_rng(
            site,
            Arc::new(ProxyPool::empty()),
            &config,
            StdRng::seed_from_u64(3),
        );
        Harvester::new(Arc::new(config), fetcher).unwrap()
    }

    fn config(delay_secs: u64, concurrency: usize) -> Config {
        Config {
            max_retries: 1,
            delay_between_requests: Duration::from_secs(delay_secs),
            max_concurrency: concurrency,
            ..Config::default()
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    const PAGE_A: &str = r#"<html><head><title>Alpha</title></head><body>
        <a href="mailto:info@alpha.test">mail</a> sales@alpha.test</body></html>"#;
    const PAGE_C: &str = r#"<html><head><title>Gamma</title></head><body>
        <p class="email">hello@gamma.test</p> info@alpha.test</body></html>"#;

    #[tokio::test(start_paused = true)]
    async fn failing_identifier_does_not_abort_batch() {
        let site = SiteMap::new(&[
            ("https://a.test", 200, PAGE_A),
            ("https://b.test", 500, "oops"),
            ("https://c.test", 200, PAGE_C),
        ]);
        let harvester = harvester(site, config(2, 1));

        let start = Instant::now();
        let report = harvester
            .run_batch(DEFAULT_CATEGORY, ids(&["a.test", "b.test", "c.test"]), CancellationToken::new())
            .await;
        let elapsed = start.elapsed();

        assert_eq!(report.stats.attempted, 3);
        assert_eq!(report.stats.succeeded, 2);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(
            report.unique_emails,
            vec!["hello@gamma.test", "info@alpha.test", "sales@alpha.test"]
        );
        let order: Vec<&str> = report.outcomes.iter().map(|o| o.identifier.as_str()).collect();
        assert_eq!(order, vec!["a.test", "b.test", "c.test"]);
        assert!(matches!(report.outcomes[1].status, IdentifierStatus::Exhausted(_)));
        assert_eq!(report.outcomes[0].entity_name, "Alpha");
        assert!(!report.cancelled);

        // Two gaps between three starts, nothing after the last one.
        assert!(elapsed >= Duration::from_secs(4), "took {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_and_blocked_identifiers_are_counted() {
        let site = SiteMap::new(&[("https://walled.test", 403, "denied")]);
        let harvester = harvester(site.clone(), config(0, 1));

        let report = harvester
            .run_batch("shops", ids(&["12345", "walled.test"]), CancellationToken::new())
            .await;

        assert_eq!(report.stats.attempted, 2);
        assert_eq!(report.stats.failed, 2);
        assert_eq!(report.stats.skipped, 1);
        assert_eq!(report.stats.blocked, 1);
        assert_eq!(report.stats.categories["shops"].failed, 2);
        assert!(report.outcomes[0].url.is_none());
        assert_eq!(site.requested.lock().as_slice(), ["https://walled.test"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_new_identifiers() {
        let site = SiteMap::new(&[
            ("https://a.test", 200, PAGE_A),
            ("https://c.test", 200, PAGE_C),
        ]);
        let harvester = harvester(site.clone(), config(10, 1));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let report = harvester
            .run_batch(DEFAULT_CATEGORY, ids(&["a.test", "c.test"]), cancel)
            .await;

        assert!(report.cancelled);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.stats.attempted, 1);
        assert_eq!(site.requested.lock().len(), 1);
    }

    #[tokio::test]
    async fn already_cancelled_batch_does_nothing() {
        let site = SiteMap::new(&[("https://a.test", 200, PAGE_A)]);
        let harvester = harvester(site.clone(), config(0, 1));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = harvester.run_batch(DEFAULT_CATEGORY, ids(&["a.test"]), cancel).await;
        assert!(report.cancelled);
        assert!(report.outcomes.is_empty());
        assert!(site.requested.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_workers_keep_input_order() {
        let pages: Vec<(String, String)> = (0..6)
            .map(|i| {
                (
                    format!("https://site{}.test", i),
                    format!("<html><body>contact{}@site.test</body></html>", i),
                )
            })
            .collect();
        let table: Vec<(&str, u16, &str)> = pages
            .iter()
            .map(|(url, body)| (url.as_str(), 200, body.as_str()))
            .collect();
        let harvester = harvester(SiteMap::new(&table), config(0, 3));

        let identifiers: Vec<String> = (0..6).map(|i| format!("site{}.test", i)).collect();
        let mut seen = 0;
        let report = harvester
            .run_batch_with_progress(DEFAULT_CATEGORY, identifiers.clone(), CancellationToken::new(), |_| {
                seen += 1
            })
            .await;

        assert_eq!(seen, 6);
        assert_eq!(report.stats.succeeded, 6);
        let order: Vec<String> = report.outcomes.iter().map(|o| o.identifier.clone()).collect();
        assert_eq!(order, identifiers);
        assert_eq!(report.unique_emails.len(), 6);
    }

    #[tokio::test]
    async fn single_identifier_without_emails_keeps_name() {
        let site = SiteMap::new(&[(
            "https://companium.ru/id/1027700132195/contacts",
            200,
            "<html><head><title>OOO Romashka</title></head><body>No emails</body></html>",
        )]);
        let harvester = harvester(site, config(0, 1));

        let outcome = harvester
            .process_identifier(DEFAULT_CATEGORY, "1027700132195", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.status, IdentifierStatus::NoEmails);
        assert_eq!(outcome.entity_name, "OOO Romashka");
    }

    #[tokio::test]
    async fn blank_page_is_a_parse_failure() {
        let site = SiteMap::new(&[("https://blank.test", 200, "  ")]);
        let harvester = harvester(site, config(0, 1));

        let outcome = harvester
            .process_identifier(DEFAULT_CATEGORY, "blank.test", &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome.status, IdentifierStatus::ParseFailed(_)));
        assert!(outcome.entity_name.is_empty());
        assert!(outcome.emails.is_empty());
    }
}
