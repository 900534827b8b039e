//! Proxy list parsing and gathering from the configured sources.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{ProxyEndpoint, ProxyScheme};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const LIST_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Parses one list line.
///
/// Accepts `scheme://host:port` and bare `host:port` (taken as http). Blank
/// lines and `#` comments yield `Ok(None)`.
pub fn parse_proxy_line(line: &str) -> Result<Option<ProxyEndpoint>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (scheme, address) = match line.split_once("://") {
        Some((name, rest)) => {
            let scheme = ProxyScheme::from_name(name)
                .ok_or_else(|| AppError::ProxyParse(format!("unsupported scheme in '{}'", line)))?;
            (scheme, rest)
        }
        None => (ProxyScheme::Http, line),
    };

    let address = address.trim_end_matches('/');
    if address.contains(['/', '@']) {
        return Err(AppError::ProxyParse(format!(
            "expected host:port, got '{}'",
            line
        )));
    }
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| AppError::ProxyParse(format!("missing port in '{}'", line)))?;
    if host.is_empty() {
        return Err(AppError::ProxyParse(format!("missing host in '{}'", line)));
    }
    let port: u16 = port
        .parse()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| AppError::ProxyParse(format!("invalid port in '{}'", line)))?;

    Ok(Some(ProxyEndpoint::new(scheme, host, port)))
}

/// Parses a whole list, skipping bad lines with a warning.
pub fn parse_proxy_list(text: &str) -> Vec<ProxyEndpoint> {
    text.lines()
        .filter_map(|line| match parse_proxy_line(line) {
            Ok(proxy) => proxy,
            Err(e) => {
                tracing::warn!(target: "proxy_vetting", "Skipping proxy line: {}", e);
                None
            }
        })
        .collect()
}

/// Concatenates lists keeping the first occurrence of each endpoint.
pub fn merge_proxy_lists<I>(lists: I) -> Vec<ProxyEndpoint>
where
    I: IntoIterator<Item = Vec<ProxyEndpoint>>,
{
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|proxy| seen.insert(proxy.clone()))
        .collect()
}

pub fn load_proxy_file(path: impl AsRef<Path>) -> Result<Vec<ProxyEndpoint>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    Ok(parse_proxy_list(&text))
}

pub async fn fetch_proxy_list(url: &str) -> Result<Vec<ProxyEndpoint>> {
    let client = crate::network::client::build_client(None, Some(LIST_FETCH_TIMEOUT))?;
    let transient = |e: reqwest::Error| AppError::FetchTransient {
        url: url.to_string(),
        message: e.to_string(),
    };
    let response = client.get(url).send().await.map_err(transient)?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::FetchTransient {
            url: url.to_string(),
            message: format!("HTTP {}", status.as_u16()),
        });
    }
    let text = response.text().await.map_err(transient)?;
    Ok(parse_proxy_list(&text))
}

/// Loads every configured source and merges them. An unavailable source is
/// logged and contributes nothing.
pub async fn gather_candidates(config: &Config) -> Vec<ProxyEndpoint> {
    let mut lists = Vec::new();

    if let Some(path) = &config.proxy_file {
        match load_proxy_file(path) {
            Ok(list) => {
                tracing::info!(target: "proxy_vetting", "Loaded {} proxies from '{}'", list.len(), path);
                lists.push(list);
            }
            Err(e) => {
                tracing::warn!(target: "proxy_vetting", "Could not read proxy file '{}': {}", path, e)
            }
        }
    }

    if let Some(url) = &config.proxy_list_url {
        match fetch_proxy_list(url).await {
            Ok(list) => {
                tracing::info!(target: "proxy_vetting", "Fetched {} proxies from {}", list.len(), url);
                lists.push(list);
            }
            Err(e) => {
                tracing::warn!(target: "proxy_vetting", "Could not fetch proxy list {}: {}", url, e)
            }
        }
    }

    let merged = merge_proxy_lists(lists);
    tracing::info!(target: "proxy_vetting", "{} unique proxy candidates", merged.len());
    merged
}
