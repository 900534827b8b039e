//! Browser-like request headers, re-rolled for every attempt.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

/// Used when the generated pool is empty or yields an unusable value.
pub const FALLBACK_USER_AGENTS: [&str; 7] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:90.0) Gecko/20100101 Firefox/90.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
];

const DESKTOP_PLATFORMS: [&str; 4] = [
    "Windows NT 10.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
];

const FIXED_HEADERS: [(&str, &str); 13] = [
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    ),
    ("accept-language", "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    ("priority", "u=0, i"),
    (
        "sec-ch-ua",
        "\"Chromium\";v=\"130\", \"Google Chrome\";v=\"130\", \"Not?A_Brand\";v=\"99\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
];

const CROSS_SITE_HEADERS: [(&str, &str); 4] = [
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "cross-site"),
    ("sec-fetch-user", "?1"),
];

/// Rotating pool of User-Agent strings.
#[derive(Debug, Clone, Default)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl UserAgentPool {
    /// Generates `size` plausible desktop browser User-Agents.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, size: usize) -> Self {
        let agents = (0..size).map(|_| generate_user_agent(rng)).collect();
        Self { agents }
    }

    /// Uses a caller-supplied list. An empty list means every pick falls back.
    pub fn from_list(agents: Vec<String>) -> Self {
        Self { agents }
    }

    /// Custom agents when configured, generated ones otherwise.
    pub fn from_config<R: Rng + ?Sized>(rng: &mut R, custom: &[String]) -> Self {
        if custom.is_empty() {
            Self::generate(rng, 64)
        } else {
            Self::from_list(custom.to_vec())
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Picks an agent at random. Never fails: falls back to the static list.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        match self.agents.choose(rng) {
            Some(agent) if !agent.trim().is_empty() => agent.as_str(),
            _ => fallback_user_agent(rng),
        }
    }
}

fn fallback_user_agent<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    FALLBACK_USER_AGENTS
        .choose(rng)
        .copied()
        .unwrap_or(FALLBACK_USER_AGENTS[0])
}

fn generate_user_agent<R: Rng + ?Sized>(rng: &mut R) -> String {
    let platform = DESKTOP_PLATFORMS[rng.gen_range(0..DESKTOP_PLATFORMS.len())];
    match rng.gen_range(0..3) {
        0 => {
            let major = rng.gen_range(118..=131);
            let build = rng.gen_range(5000..=6800);
            let patch = rng.gen_range(50..=200);
            format!(
                "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.{}.{} Safari/537.36",
                platform, major, build, patch
            )
        }
        1 => {
            let major = rng.gen_range(115..=132);
            format!(
                "Mozilla/5.0 ({}; rv:{}.0) Gecko/20100101 Firefox/{}.0",
                platform, major, major
            )
        }
        _ => {
            let major = rng.gen_range(118..=131);
            let build = rng.gen_range(2000..=2900);
            format!(
                "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36 Edg/{}.0.{}.0",
                platform, major, major, build
            )
        }
    }
}

/// Builds one header set: a User-Agent from `agents`, the fixed browser
/// fingerprint, and with probability 0.5 a cross-site navigation profile.
pub fn synthesize_headers<R: Rng + ?Sized>(rng: &mut R, agents: &UserAgentPool) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(FIXED_HEADERS.len() + 2);
    for (name, value) in FIXED_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    let agent = agents.pick(rng);
    let agent_value = HeaderValue::from_str(agent).unwrap_or_else(|_| {
        tracing::debug!("Discarding malformed User-Agent '{}'", agent);
        HeaderValue::from_static(FALLBACK_USER_AGENTS[0])
    });
    headers.insert(USER_AGENT, agent_value);

    if rng.gen_bool(0.5) {
        for (name, value) in CROSS_SITE_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn headers_are_complete_and_well_formed() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = UserAgentPool::generate(&mut rng, 8);
        let headers = synthesize_headers(&mut rng, &pool);

        for (name, _) in FIXED_HEADERS {
            assert!(headers.contains_key(name), "missing {}", name);
        }
        let agent = headers.get(USER_AGENT).unwrap().to_str().unwrap();
        assert!(agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn same_seed_gives_same_headers() {
        let pool = UserAgentPool::generate(&mut StdRng::seed_from_u64(1), 16);
        let a = synthesize_headers(&mut StdRng::seed_from_u64(42), &pool);
        let b = synthesize_headers(&mut StdRng::seed_from_u64(42), &pool);
        assert_eq!(a, b);
    }

    #[test]
    fn both_navigation_profiles_occur() {
        let mut rng = StdRng::seed_from_u64(3);
        let pool = UserAgentPool::from_list(vec!["agent/1.0".to_string()]);
        let mut cross_site = 0;
        let mut same_origin = 0;
        for _ in 0..200 {
            let headers = synthesize_headers(&mut rng, &pool);
            match headers.get("sec-fetch-site").unwrap().to_str().unwrap() {
                "cross-site" => cross_site += 1,
                "same-origin" => same_origin += 1,
                other => panic!("unexpected sec-fetch-site {}", other),
            }
        }
        assert!(cross_site > 50 && same_origin > 50);
    }

    #[test]
    fn empty_or_broken_pool_falls_back() {
        let mut rng = StdRng::seed_from_u64(9);
        let empty = UserAgentPool::from_list(Vec::new());
        let picked = empty.pick(&mut rng);
        assert!(FALLBACK_USER_AGENTS.iter().any(|a| *a == picked));

        let broken = UserAgentPool::from_list(vec!["bad\nagent".to_string()]);
        let headers = synthesize_headers(&mut rng, &broken);
        assert_eq!(headers.get(USER_AGENT).unwrap(), FALLBACK_USER_AGENTS[0]);
    }
}
