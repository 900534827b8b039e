//! HTTP transport behind a trait so the fetcher can be driven by fakes.

use crate::core::error::{AppError, Result};
use crate::core::models::ProxyEndpoint;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Status and body of a completed request, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One GET request. Transport failures (connect, TLS, timeout, body read)
/// are returned as `AppError::FetchTransient`; HTTP error statuses are not
/// errors at this layer.
#[async_trait]
pub trait PageClient: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> Result<PageResponse>;
}

/// `reqwest`-backed client. Keeps one connection pool per proxy.
#[derive(Debug, Default)]
pub struct ReqwestPageClient {
    clients: RwLock<HashMap<Option<ProxyEndpoint>, Client>>,
}

impl ReqwestPageClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, proxy: Option<&ProxyEndpoint>) -> Result<Client> {
        let key = proxy.cloned();
        if let Some(client) = self.clients.read().get(&key) {
            return Ok(client.clone());
        }

        let client = build_client(proxy, None)?;
        self.clients.write().entry(key).or_insert(client.clone());
        Ok(client)
    }
}

/// Builds a client routed through `proxy`, optionally with a whole-request timeout.
pub(crate) fn build_client(proxy: Option<&ProxyEndpoint>, timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(proxy) = proxy {
        let route = reqwest::Proxy::all(proxy.url()).map_err(|e| AppError::ProxyUnusable {
            proxy: proxy.to_string(),
            reason: e.to_string(),
        })?;
        builder = builder.proxy(route);
    }
    builder
        .build()
        .map_err(|e| AppError::Initialization(format!("Failed to build HTTP client: {}", e)))
}

#[async_trait]
impl PageClient for ReqwestPageClient {
    async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> Result<PageResponse> {
        let client = self.client_for(proxy)?;
        let transient = |e: reqwest::Error| AppError::FetchTransient {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = client
            .get(url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(transient)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transient)?;
        Ok(PageResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ProxyScheme;

    #[test]
    fn clients_are_cached_per_proxy() {
        let client = ReqwestPageClient::new();
        let proxy = ProxyEndpoint::new(ProxyScheme::Http, "127.0.0.1", 8080);
        client.client_for(None).unwrap();
        client.client_for(Some(&proxy)).unwrap();
        client.client_for(Some(&proxy)).unwrap();
        assert_eq!(client.clients.read().len(), 2);
    }

    #[test]
    fn success_range() {
        let page = |status| PageResponse {
            status,
            body: String::new(),
        };
        assert!(page(200).is_success());
        assert!(page(204).is_success());
        assert!(!page(301).is_success());
        assert!(!page(403).is_success());
    }
}
