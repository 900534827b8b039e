//! Everything that touches the network: the page client, the retrying
//! fetcher and the proxy pipeline.

pub mod client;
pub mod fetcher;
pub mod proxy;

pub use client::{PageClient, PageResponse, ReqwestPageClient};
pub use fetcher::Fetcher;
pub use proxy::{ProxyPool, ProxyProbe, ProxyVetter};
