use crate::core::models::ProxyEndpoint;
use rand::seq::SliceRandom;
use rand::Rng;

/// Vetted proxies. Built once before a batch and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyPool {
    proxies: Vec<ProxyEndpoint>,
}

impl ProxyPool {
    pub fn new(proxies: Vec<ProxyEndpoint>) -> Self {
        Self { proxies }
    }

    /// A pool that makes every request go direct.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyEndpoint> {
        self.proxies.iter()
    }

    /// Uniformly random proxy, or `None` for a direct connection.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&ProxyEndpoint> {
        self.proxies.choose(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ProxyScheme;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_pool_goes_direct() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(ProxyPool::empty().choose(&mut rng).is_none());
    }

    #[test]
    fn choice_covers_the_pool() {
        let pool = ProxyPool::new(
            (1..=3)
                .map(|i| ProxyEndpoint::new(ProxyScheme::Http, format!("10.0.0.{}", i), 8080))
                .collect(),
        );
        let mut rng = StdRng::seed_from_u64(5);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            seen.insert(pool.choose(&mut rng).unwrap().host.clone());
        }
        assert_eq!(seen.len(), 3);
    }
}
