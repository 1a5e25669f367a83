//! Polite HTTP retrieval: robots gate → per-domain rate limit → cache →
//! GET with retry/backoff → cache write.
//!
//! The fetch path never raises for network trouble. Its only failure signal
//! is `None`, after robots rejection (logged, never retried) or retry
//! exhaustion (each failure logged with its attempt number). Configuration
//! problems — an unusable cache directory, an unbuildable client — are
//! surfaced at construction instead, where they are fatal.
//!
//! # Ordering
//!
//! The rate-limit wait happens before the cache check, so a burst of cached
//! URLs still paces itself against the domain: cache state can never cause
//! a politeness violation.

pub mod cache;
pub mod rate_limit;
pub mod robots;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::CollectionConfig;
use crate::error::FetchError;
use cache::ContentCache;
use rate_limit::LimiterMap;
use robots::RobotsGate;

/// Upper bound on a single retry backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Rate-limited, robots-compliant, cached, retrying HTTP fetcher.
///
/// One instance serves the whole run; all internal state (robots cache,
/// per-domain limiters) is safe to share across concurrent fetches.
#[derive(Debug)]
pub struct Fetcher {
    user_agent: String,
    max_retries: u32,
    respect_robots_txt: bool,
    client: Client,
    /// Anti-bot client profile; `None` when construction failed, in which
    /// case requests asking for it fall back to the primary client.
    alternate: Option<Client>,
    warned_alternate: AtomicBool,
    robots: RobotsGate,
    limiters: LimiterMap,
    cache: Option<ContentCache>,
}

impl Fetcher {
    /// Build the fetch stack from collection configuration.
    ///
    /// Fails when the cache directory cannot be created or the primary HTTP
    /// client cannot be built.
    pub fn new(config: &CollectionConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(config.timeout);
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()?;

        let alternate = Self::build_alternate_client(timeout);
        if alternate.is_none() {
            warn!("alternate client profile unavailable");
        }

        let cache = if config.cache_enabled {
            Some(ContentCache::new(std::path::Path::new(&config.cache_dir))?)
        } else {
            None
        };

        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            respect_robots_txt: config.respect_robots_txt,
            robots: RobotsGate::new(client.clone()),
            client,
            alternate,
            warned_alternate: AtomicBool::new(false),
            limiters: LimiterMap::new(),
            cache,
        })
    }

    /// The cache, when enabled. The dump reader shares its directory.
    pub fn cache(&self) -> Option<&ContentCache> {
        self.cache.as_ref()
    }

    /// Configured user agent string.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The primary HTTP client, for callers doing their own streaming
    /// transfers (the dump downloader).
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// A client with browser-like headers for sources behind bot checks.
    /// Best-effort: `None` simply disables the profile.
    fn build_alternate_client(timeout: Duration) -> Option<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        Client::builder()
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            )
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .ok()
    }

    /// Fetch `url` politely. Returns the response body as text, or `None`
    /// after robots rejection or retry exhaustion.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(
        &self,
        url: &str,
        rate_limit: f64,
        use_alternate_client: bool,
    ) -> Option<String> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(%url, error = %e, "unfetchable URL");
                return None;
            }
        };

        if self.respect_robots_txt && !self.robots.allowed(&parsed, &self.user_agent).await {
            info!(%url, "blocked by robots.txt");
            return None;
        }

        let domain = parsed.host_str().unwrap_or_default().to_string();
        let limiter = self.limiters.get(&domain, rate_limit);
        limiter.lock().await.wait().await;

        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(url) {
                return Some(body);
            }
        }

        let client = self.select_client(use_alternate_client);

        for attempt in 1..=self.max_retries {
            match Self::get_text(client, url).await {
                Ok(body) => {
                    if let Some(cache) = &self.cache {
                        cache.put(url, &body);
                    }
                    debug!(%url, bytes = body.len(), "fetched");
                    return Some(body);
                }
                Err(e) => {
                    warn!(
                        %url,
                        attempt,
                        max = self.max_retries,
                        error = %e,
                        "fetch failed"
                    );
                    if attempt < self.max_retries {
                        let backoff =
                            Duration::from_secs(1 << attempt.min(4)).min(MAX_BACKOFF);
                        sleep(backoff).await;
                    }
                }
            }
        }
        None
    }

    fn select_client(&self, use_alternate_client: bool) -> &Client {
        if !use_alternate_client {
            return &self.client;
        }
        match &self.alternate {
            Some(alternate) => alternate,
            None => {
                if !self.warned_alternate.swap(true, Ordering::Relaxed) {
                    warn!("alternate client requested but unavailable; using primary client");
                }
                &self.client
            }
        }
    }

    async fn get_text(client: &Client, url: &str) -> Result<String, reqwest::Error> {
        let response = client.get(url).send().await?;
        let response = response.error_for_status()?;
        response.text().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> CollectionConfig {
        CollectionConfig {
            cache_dir: dir.display().to_string(),
            respect_robots_txt: false,
            ..CollectionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_cached_url_is_served_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(&test_config(dir.path())).unwrap();
        // Seed the cache directly; the URL's host does not resolve, so a
        // network attempt would fail and return None.
        let url = "https://no-such-host.invalid/article";
        fetcher.cache().unwrap().put(url, "cached body");

        let first = fetcher.fetch(url, 1000.0, false).await;
        let second = fetcher.fetch(url, 1000.0, false).await;
        assert_eq!(first.as_deref(), Some("cached body"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unparsable_url_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(&test_config(dir.path())).unwrap();
        assert!(fetcher.fetch("not a url", 1000.0, false).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_disabled_skips_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.cache_enabled = false;
        let fetcher = Fetcher::new(&config).unwrap();
        assert!(fetcher.cache().is_none());
    }

    #[test]
    fn test_unusable_cache_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("occupied");
        std::fs::write(&file_path, b"x").unwrap();
        let config = test_config(&file_path);
        assert!(matches!(
            Fetcher::new(&config),
            Err(FetchError::CacheDir { .. })
        ));
    }
}
