//! Proxy sourcing, vetting and the resulting read-only pool.

mod pool;
pub mod sources;
pub mod vetting;

pub use pool::ProxyPool;
pub use sources::{gather_candidates, merge_proxy_lists, parse_proxy_line, parse_proxy_list};
pub use vetting::{vet_proxies, HttpProxyProbe, ProxyProbe, ProxyVetter};
