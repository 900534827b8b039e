//! Proxy vetting: a candidate survives only if it relays traffic and
//! behaves as a forwarding proxy.

use super::ProxyPool;
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::ProxyEndpoint;
use crate::network::client::build_client;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// The two checks a candidate has to pass.
#[async_trait]
pub trait ProxyProbe: Send + Sync {
    /// Relays a request to a known-reachable host.
    async fn relays(&self, proxy: &ProxyEndpoint) -> Result<()>;
    /// Reports an origin that is not our own address.
    async fn forwards(&self, proxy: &ProxyEndpoint) -> Result<()>;
}

/// Probes over real HTTP.
///
/// `forwards` asks a judge endpoint (httpbin-style `{"origin": "..."}`)
/// which address the request came from, and rejects the proxy if that is
/// the address seen on a direct connection.
#[derive(Debug)]
pub struct HttpProxyProbe {
    probe_url: String,
    judge_url: String,
    timeout: Duration,
    direct_origin: OnceCell<Option<String>>,
}

impl HttpProxyProbe {
    pub fn new(probe_url: impl Into<String>, judge_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            probe_url: probe_url.into(),
            judge_url: judge_url.into(),
            timeout,
            direct_origin: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.proxy_probe_url.clone(),
            config.proxy_judge_url.clone(),
            config.proxy_probe_timeout,
        )
    }

    async fn origin_via(&self, proxy: Option<&ProxyEndpoint>) -> Result<String> {
        let client = build_client(proxy, Some(self.timeout))?;
        let unusable = |reason: String| AppError::ProxyUnusable {
            proxy: proxy.map(ToString::to_string).unwrap_or_else(|| "direct".to_string()),
            reason,
        };

        let response = client
            .get(&self.judge_url)
            .send()
            .await
            .map_err(|e| unusable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unusable(format!("judge answered HTTP {}", response.status().as_u16())));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| unusable(format!("judge response is not JSON: {}", e)))?;
        body.get("origin")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| unusable("judge response has no origin".to_string()))
    }

    async fn direct_origin(&self) -> Option<&str> {
        self.direct_origin
            .get_or_init(|| async {
                match self.origin_via(None).await {
                    Ok(origin) => Some(origin),
                    Err(e) => {
                        tracing::warn!(target: "proxy_vetting", "Could not determine direct origin: {}", e);
                        None
                    }
                }
            })
            .await
            .as_deref()
    }
}

#[async_trait]
impl ProxyProbe for HttpProxyProbe {
    async fn relays(&self, proxy: &ProxyEndpoint) -> Result<()> {
        let client = build_client(Some(proxy), Some(self.timeout))?;
        let response = client
            .get(&self.probe_url)
            .send()
            .await
            .map_err(|e| AppError::ProxyUnusable {
                proxy: proxy.to_string(),
                reason: e.to_string(),
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::ProxyUnusable {
                proxy: proxy.to_string(),
                reason: format!("probe answered HTTP {}", response.status().as_u16()),
            })
        }
    }

    async fn forwards(&self, proxy: &ProxyEndpoint) -> Result<()> {
        let seen = self.origin_via(Some(proxy)).await?;
        match self.direct_origin().await {
            Some(direct) if seen.split(',').any(|part| part.trim() == direct) => {
                Err(AppError::ProxyUnusable {
                    proxy: proxy.to_string(),
                    reason: "transparent: judge saw our own address".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Runs both probes over every candidate, a bounded number at a time.
pub struct ProxyVetter {
    probe: Arc<dyn ProxyProbe>,
    timeout: Duration,
    concurrency: usize,
}

impl ProxyVetter {
    pub fn new(probe: Arc<dyn ProxyProbe>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            probe,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Filters `candidates` down to the usable ones, keeping their order.
    /// Individual failures never abort the pass.
    pub async fn vet(&self, candidates: Vec<ProxyEndpoint>) -> ProxyPool {
        let total = candidates.len();
        let start = Instant::now();
        tracing::info!(target: "proxy_vetting", "Vetting {} proxy candidates (concurrency {})", total, self.concurrency);

        let checked: Vec<(ProxyEndpoint, Result<()>)> = stream::iter(candidates)
            .map(|proxy| {
                let probe = Arc::clone(&self.probe);
                let timeout = self.timeout;
                async move {
                    let verdict = check_candidate(probe.as_ref(), &proxy, timeout).await;
                    (proxy, verdict)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut usable = Vec::new();
        for (proxy, verdict) in checked {
            match verdict {
                Ok(()) => {
                    tracing::debug!(target: "proxy_vetting", "[{}] accepted", proxy);
                    usable.push(proxy);
                }
                Err(e) => tracing::debug!(target: "proxy_vetting", "[{}] rejected: {}", proxy, e),
            }
        }

        tracing::info!(
            target: "proxy_vetting",
            "{} of {} proxies usable (vetting took {:.2?})",
            usable.len(),
            total,
            start.elapsed()
        );
        ProxyPool::new(usable)
    }
}

async fn check_candidate(probe: &dyn ProxyProbe, proxy: &ProxyEndpoint, timeout: Duration) -> Result<()> {
    let bounded = |reason: &str| AppError::ProxyUnusable {
        proxy: proxy.to_string(),
        reason: format!("{} timed out after {:?}", reason, timeout),
    };
    tokio::time::timeout(timeout, probe.relays(proxy))
        .await
        .map_err(|_| bounded("reachability probe"))??;
    tokio::time::timeout(timeout, probe.forwards(proxy))
        .await
        .map_err(|_| bounded("forwarding check"))??;
    Ok(())
}

/// Vets `candidates` over HTTP with the configured probe settings.
pub async fn vet_proxies(config: &Config, candidates: Vec<ProxyEndpoint>) -> ProxyPool {
    let probe = Arc::new(HttpProxyProbe::from_config(config));
    ProxyVetter::new(probe, config.proxy_probe_timeout, config.proxy_vet_concurrency)
        .vet(candidates)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ProxyScheme;
    use std::collections::HashSet;

    /// Decides by host name: `dead-*` refuse, `hang-*` never answer,
    /// `glass-*` are transparent.
    struct ScriptedProbe;

    #[async_trait]
    impl ProxyProbe for ScriptedProbe {
        async fn relays(&self, proxy: &ProxyEndpoint) -> Result<()> {
            if proxy.host.starts_with("dead") {
                return Err(AppError::ProxyUnusable {
                    proxy: proxy.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            if proxy.host.starts_with("hang") {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn forwards(&self, proxy: &ProxyEndpoint) -> Result<()> {
            if proxy.host.starts_with("glass") {
                return Err(AppError::ProxyUnusable {
                    proxy: proxy.to_string(),
                    reason: "transparent".to_string(),
                });
            }
            Ok(())
        }
    }

    fn endpoint(host: &str) -> ProxyEndpoint {
        ProxyEndpoint::new(ProxyScheme::Http, host, 8080)
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_only_candidates_passing_both_checks() {
        let candidates = vec![
            endpoint("good-a"),
            endpoint("dead-b"),
            endpoint("glass-c"),
            endpoint("hang-d"),
            endpoint("good-e"),
        ];
        let vetter = ProxyVetter::new(Arc::new(ScriptedProbe), Duration::from_secs(5), 4);
        let pool = vetter.vet(candidates).await;

        let hosts: HashSet<&str> = pool.iter().map(|p| p.host.as_str()).collect();
        assert_eq!(pool.len(), 2);
        assert_eq!(hosts, HashSet::from(["good-a", "good-e"]));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probe_is_bounded_by_timeout() {
        let vetter = ProxyVetter::new(Arc::new(ScriptedProbe), Duration::from_secs(3), 1);
        let start = tokio::time::Instant::now();
        let pool = vetter.vet(vec![endpoint("hang-x")]).await;
        assert!(pool.is_empty());
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn empty_candidate_list_gives_empty_pool() {
        let vetter = ProxyVetter::new(Arc::new(ScriptedProbe), Duration::from_secs(1), 0);
        assert!(vetter.vet(Vec::new()).await.is_empty());
    }
}
