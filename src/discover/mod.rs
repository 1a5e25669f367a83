//! URL and content discovery for configured sources.
//!
//! A news source is discovered through its sitemaps and RSS feeds (explicit
//! URLs from the source descriptor, or the conventional default paths),
//! with an optional `since` cutoff for incremental crawls. Sources whose
//! feeds carry full article bodies skip page fetching entirely and read
//! entries through the [`feed::FeedReader`] capability.
//!
//! Discovery never aborts a crawl: unreachable sitemaps, malformed XML, and
//! feeds that fail to parse each degrade to an empty contribution for that
//! node.
//!
//! The final URL set is filtered to the source's allowed domains and
//! deduplicated preserving first-seen order — order matters downstream,
//! where the deduplicator keeps the first document of each duplicate
//! cluster.

pub mod dates;
pub mod feed;
pub mod sitemap;

use chrono::NaiveDateTime;
use itertools::Itertools;
use tracing::{info, instrument, warn};
use url::Url;

use crate::fetch::Fetcher;
use crate::sources::Source;
use feed::FeedReader;

/// Rate used for discovery fetches; per-source rates apply to article
/// pages, not sitemap/feed documents.
pub const DISCOVERY_RATE: f64 = 1.0;

/// Minimal fetch seam used by the walkers, so traversal logic is
/// exercisable without a network.
pub trait TextFetch: Sync {
    async fn fetch_text(&self, url: &str) -> Option<String>;
}

impl TextFetch for Fetcher {
    async fn fetch_text(&self, url: &str) -> Option<String> {
        self.fetch(url, DISCOVERY_RATE, false).await
    }
}

/// Conventional sitemap locations for a source without explicit ones.
pub fn default_sitemap_urls(base_url: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    vec![format!("{base}/sitemap.xml"), format!("{base}/sitemap_index.xml")]
}

/// Conventional feed locations for a source without explicit ones.
pub fn default_rss_urls(base_url: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    vec![format!("{base}/rss"), format!("{base}/feed")]
}

/// Whether `url`'s host falls under any of the allowed domain suffixes.
pub fn is_allowed_domain(url: &str, allowed: &[String]) -> bool {
    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
    else {
        return false;
    };
    allowed
        .iter()
        .filter(|domain| !domain.is_empty())
        .any(|domain| host.ends_with(domain.as_str()))
}

/// Discover page URLs for a news source: sitemaps, then feeds, then the
/// base URL as a last resort; allowed-domain filtered, order-preserving
/// deduplicated.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
pub async fn discover_urls<F: TextFetch>(
    source: &Source,
    fetcher: &F,
    since: Option<NaiveDateTime>,
) -> Vec<String> {
    let sitemaps = source
        .sitemaps
        .clone()
        .unwrap_or_else(|| default_sitemap_urls(&source.url));
    let feeds = source
        .rss
        .clone()
        .unwrap_or_else(|| default_rss_urls(&source.url));

    let mut urls: Vec<String> = Vec::new();
    for sitemap_url in &sitemaps {
        urls.extend(sitemap::collect_sitemap_urls(fetcher, sitemap_url, since).await);
    }
    for feed_url in &feeds {
        if let Some(xml) = fetcher.fetch_text(feed_url).await {
            urls.extend(feed::collect_feed_urls(&xml, since));
        }
    }

    if urls.is_empty() {
        urls.push(source.url.clone());
    }

    let allowed = source.allowed_domains();
    let urls: Vec<String> = urls
        .into_iter()
        .filter(|url| is_allowed_domain(url, &allowed))
        .unique()
        .collect();
    info!(count = urls.len(), "discovered URLs");
    urls
}

/// A full-content feed entry ready to become a document.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub text: String,
    pub title: Option<String>,
    pub url: String,
    pub date: Option<NaiveDateTime>,
}

/// Full-content mode: read entry bodies straight from the source's feeds.
///
/// Requires the [`FeedReader`] capability; without one the source is
/// skipped with a warning and the crawl goes on.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
pub async fn collect_rss_entries<F: TextFetch>(
    source: &Source,
    fetcher: &F,
    since: Option<NaiveDateTime>,
    reader: Option<&dyn FeedReader>,
) -> Vec<RawEntry> {
    let Some(reader) = reader else {
        warn!(
            source = %source.name,
            "no feed reader available; skipping full-content source"
        );
        return Vec::new();
    };

    let feeds = source
        .rss
        .clone()
        .unwrap_or_else(|| default_rss_urls(&source.url));
    let allowed = source.allowed_domains();

    let mut entries = Vec::new();
    for feed_url in &feeds {
        let Some(xml) = fetcher.fetch_text(feed_url).await else {
            continue;
        };
        for item in reader.parse(&xml) {
            let Some(link) = item.link.clone() else {
                continue;
            };
            if !is_allowed_domain(&link, &allowed) {
                continue;
            }
            let date = item.published.as_deref().and_then(dates::parse_flexible);
            if let (Some(since), Some(date)) = (since, date) {
                if date < since {
                    continue;
                }
            }
            let Some(text) = item.body() else {
                continue;
            };
            entries.push(RawEntry {
                text,
                title: item.title.clone(),
                url: link,
                date,
            });
        }
    }
    info!(count = entries.len(), "collected full-content entries");
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Offline fetcher: URL → body.
    struct MapFetch(HashMap<String, String>);

    impl TextFetch for MapFetch {
        async fn fetch_text(&self, url: &str) -> Option<String> {
            self.0.get(url).cloned()
        }
    }

    fn source_with(sitemaps: Option<Vec<String>>, rss: Option<Vec<String>>) -> Source {
        Source {
            name: "example".to_string(),
            url: "https://example.com".to_string(),
            kind: "news".to_string(),
            enabled: true,
            language: Some("sr".to_string()),
            rss,
            sitemaps,
            allowed_domains: None,
            rate_limit: None,
            use_alternate_client: false,
            rss_use_content: false,
            dump_url: None,
            dump_file: None,
            group: "news".to_string(),
        }
    }

    fn urlset(urls: &[(&str, Option<&str>)]) -> String {
        let mut xml = String::from(
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
        );
        for (loc, lastmod) in urls {
            xml.push_str("<url><loc>");
            xml.push_str(loc);
            xml.push_str("</loc>");
            if let Some(lastmod) = lastmod {
                xml.push_str("<lastmod>");
                xml.push_str(lastmod);
                xml.push_str("</lastmod>");
            }
            xml.push_str("</url>");
        }
        xml.push_str("</urlset>");
        xml
    }

    #[test]
    fn test_default_urls() {
        assert_eq!(
            default_sitemap_urls("https://example.com/"),
            vec![
                "https://example.com/sitemap.xml".to_string(),
                "https://example.com/sitemap_index.xml".to_string(),
            ]
        );
        assert_eq!(
            default_rss_urls("https://example.com"),
            vec![
                "https://example.com/rss".to_string(),
                "https://example.com/feed".to_string(),
            ]
        );
    }

    #[test]
    fn test_is_allowed_domain_suffix_match() {
        let allowed = vec!["example.com".to_string()];
        assert!(is_allowed_domain("https://example.com/a", &allowed));
        assert!(is_allowed_domain("https://news.example.com/a", &allowed));
        assert!(!is_allowed_domain("https://example.org/a", &allowed));
        assert!(!is_allowed_domain("not a url", &allowed));
    }

    #[tokio::test]
    async fn test_sitemap_index_end_to_end() {
        // Index with two children, each listing 3 URLs; `since` excludes one
        // by lastmod; discovery returns the remaining 5 in document order.
        let index = r#"<sitemapindex>
            <sitemap><loc>https://example.com/s1.xml</loc></sitemap>
            <sitemap><loc>https://example.com/s2.xml</loc></sitemap>
        </sitemapindex>"#;
        let s1 = urlset(&[
            ("https://example.com/a", Some("2025-05-01")),
            ("https://example.com/b", None),
            ("https://example.com/c", Some("2019-01-01")),
        ]);
        let s2 = urlset(&[
            ("https://example.com/d", None),
            ("https://example.com/e", Some("2025-05-02")),
            ("https://example.com/f", None),
        ]);
        let fetcher = MapFetch(HashMap::from([
            ("https://example.com/map.xml".to_string(), index.to_string()),
            ("https://example.com/s1.xml".to_string(), s1),
            ("https://example.com/s2.xml".to_string(), s2),
        ]));
        let source = source_with(
            Some(vec!["https://example.com/map.xml".to_string()]),
            Some(vec![]),
        );
        let since = dates::parse_flexible("2024-01-01");

        let urls = discover_urls(&source, &fetcher, since).await;
        assert_eq!(
            urls,
            vec![
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string(),
                "https://example.com/d".to_string(),
                "https://example.com/e".to_string(),
                "https://example.com/f".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_discovery_filters_domains_and_dedupes() {
        let map = urlset(&[
            ("https://example.com/a", None),
            ("https://other.org/x", None),
            ("https://example.com/a", None),
            ("https://example.com/b", None),
        ]);
        let fetcher = MapFetch(HashMap::from([(
            "https://example.com/map.xml".to_string(),
            map,
        )]));
        let source = source_with(
            Some(vec!["https://example.com/map.xml".to_string()]),
            Some(vec![]),
        );
        let urls = discover_urls(&source, &fetcher, None).await;
        assert_eq!(
            urls,
            vec![
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_sitemap_cycle_stops_at_depth_bound() {
        // a → b → c → a: the cycle is cut by the depth bound, and the
        // urlsets reachable within it are each collected once per visit.
        let cycle = |next: &str| {
            format!(
                "<sitemapindex><sitemap><loc>{next}</loc></sitemap>\
                 <sitemap><loc>https://example.com/leaf.xml</loc></sitemap></sitemapindex>"
            )
        };
        let fetcher = MapFetch(HashMap::from([
            (
                "https://example.com/a.xml".to_string(),
                cycle("https://example.com/b.xml"),
            ),
            (
                "https://example.com/b.xml".to_string(),
                cycle("https://example.com/c.xml"),
            ),
            (
                "https://example.com/c.xml".to_string(),
                cycle("https://example.com/a.xml"),
            ),
            (
                "https://example.com/leaf.xml".to_string(),
                urlset(&[("https://example.com/page", None)]),
            ),
        ]));

        let urls =
            sitemap::collect_sitemap_urls(&fetcher, "https://example.com/a.xml", None).await;
        // Depths 0..=2 are indices a, b, c; the leaf at depths 1 and 2 is
        // reached, the one behind c (depth 3) is not, and the walk ends.
        assert_eq!(urls.len(), 2);
        assert!(urls.iter().all(|u| u == "https://example.com/page"));
    }

    #[tokio::test]
    async fn test_discovery_falls_back_to_base_url() {
        let fetcher = MapFetch(HashMap::new());
        let source = source_with(None, None);
        let urls = discover_urls(&source, &fetcher, None).await;
        assert_eq!(urls, vec!["https://example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_full_content_entries() {
        let feed = r#"<rss><channel>
            <item>
              <title>One</title>
              <link>https://example.com/one</link>
              <pubDate>Tue, 06 May 2025 10:00:00 GMT</pubDate>
              <description><![CDATA[<p>Body one</p>]]></description>
            </item>
            <item>
              <title>Offsite</title>
              <link>https://elsewhere.org/x</link>
              <description>ignored</description>
            </item>
            <item>
              <title>Empty</title>
              <link>https://example.com/empty</link>
            </item>
        </channel></rss>"#;
        let fetcher = MapFetch(HashMap::from([(
            "https://example.com/rss".to_string(),
            feed.to_string(),
        )]));
        let mut source = source_with(None, Some(vec!["https://example.com/rss".to_string()]));
        source.rss_use_content = true;

        let reader = feed::RssContentReader;
        let entries = collect_rss_entries(&source, &fetcher, None, Some(&reader)).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://example.com/one");
        assert_eq!(entries[0].text, "Body one");
        assert!(entries[0].date.is_some());
    }

    #[tokio::test]
    async fn test_full_content_without_reader_is_skipped() {
        let fetcher = MapFetch(HashMap::new());
        let source = source_with(None, None);
        let entries = collect_rss_entries(&source, &fetcher, None, None).await;
        assert!(entries.is_empty());
    }
}
