//! Source descriptors loaded from `sources.yaml`.
//!
//! The file groups sources under arbitrary section names:
//!
//! ```yaml
//! news:
//!   - name: politika
//!     url: https://www.politika.rs
//!     type: news
//!     enabled: true
//!     language: sr
//! wikipedia:
//!   - name: srwiki
//!     url: https://sr.wikipedia.org
//!     type: wiki
//!     enabled: true
//!     language: sr
//!     dump_url: https://dumps.wikimedia.org/srwiki/latest/
//!     dump_file: srwiki-latest-pages-articles.xml.bz2
//! ```
//!
//! The section name is carried on each source as its `group`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::PipelineError;

/// One crawlable source from `sources.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    pub name: String,
    /// Base URL of the source. Required for news sources.
    #[serde(default)]
    pub url: String,
    /// Category tag (`news`, `wiki`, ...) copied onto documents as `domain`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub enabled: bool,
    /// Language tag copied onto documents.
    #[serde(default)]
    pub language: Option<String>,
    /// Explicit RSS feed URLs. Defaults to `{base}/rss` and `{base}/feed`.
    #[serde(default)]
    pub rss: Option<Vec<String>>,
    /// Explicit sitemap URLs. Defaults to `{base}/sitemap.xml` and
    /// `{base}/sitemap_index.xml`.
    #[serde(default)]
    pub sitemaps: Option<Vec<String>>,
    /// Domain suffixes discovered URLs must match. Defaults to the source's
    /// own host.
    #[serde(default)]
    pub allowed_domains: Option<Vec<String>>,
    /// Requests per second for this source; falls back to the collection
    /// default.
    #[serde(default)]
    pub rate_limit: Option<f64>,
    /// Fetch through the anti-bot client profile.
    #[serde(default)]
    pub use_alternate_client: bool,
    /// Take article bodies straight from the feed instead of fetching pages.
    #[serde(default)]
    pub rss_use_content: bool,
    /// Wikipedia dump directory URL (wiki sources).
    #[serde(default)]
    pub dump_url: Option<String>,
    /// Wikipedia dump file name (wiki sources).
    #[serde(default)]
    pub dump_file: Option<String>,
    /// Section name from `sources.yaml`; filled in by [`load_sources`].
    #[serde(default)]
    pub group: String,
}

impl Source {
    /// Host of the source's base URL; empty when the URL is unparsable.
    pub fn host(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Domain suffixes a discovered URL must end with to be kept.
    pub fn allowed_domains(&self) -> Vec<String> {
        match &self.allowed_domains {
            Some(domains) if !domains.is_empty() => domains.clone(),
            _ => vec![self.host()],
        }
    }
}

/// Load all sources from a grouped YAML file, tagging each with its group.
pub fn load_sources(path: &Path) -> Result<Vec<Source>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::Config(format!(
            "sources file not found: {}",
            path.display()
        )));
    }
    let raw = std::fs::read_to_string(path)?;
    let groups: HashMap<String, Vec<Source>> = serde_yaml::from_str(&raw)?;

    let mut sources = Vec::new();
    for (group, entries) in groups {
        for mut source in entries {
            source.group = group.clone();
            sources.push(source);
        }
    }
    // HashMap order is arbitrary; keep runs reproducible.
    sources.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sources)
}

/// Keep enabled sources, further narrowed to `names` when given.
pub fn filter_sources(sources: Vec<Source>, names: Option<&[String]>) -> Vec<Source> {
    let enabled = sources.into_iter().filter(|s| s.enabled);
    match names {
        None => enabled.collect(),
        Some(names) if names.is_empty() => enabled.collect(),
        Some(names) => {
            let wanted: Vec<&str> = names.iter().map(|n| n.trim()).collect();
            enabled.filter(|s| wanted.contains(&s.name.as_str())).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SOURCES_YAML: &str = r#"
news:
  - name: beta
    url: https://beta.example.com
    type: news
    enabled: true
    language: sr
  - name: alpha
    url: https://alpha.example.com
    type: news
    enabled: false
    language: sr
wikipedia:
  - name: srwiki
    url: https://sr.wikipedia.org
    type: wiki
    enabled: true
    language: sr
    dump_url: https://dumps.wikimedia.org/srwiki/latest/
    dump_file: srwiki-latest-pages-articles.xml.bz2
"#;

    fn write_sources() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SOURCES_YAML.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_sources_assigns_groups() {
        let file = write_sources();
        let sources = load_sources(file.path()).unwrap();
        assert_eq!(sources.len(), 3);
        let wiki = sources.iter().find(|s| s.name == "srwiki").unwrap();
        assert_eq!(wiki.group, "wikipedia");
        assert_eq!(wiki.kind, "wiki");
        assert_eq!(wiki.dump_file.as_deref(), Some("srwiki-latest-pages-articles.xml.bz2"));
    }

    #[test]
    fn test_filter_sources_enabled_only() {
        let file = write_sources();
        let sources = load_sources(file.path()).unwrap();
        let filtered = filter_sources(sources, None);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|s| s.enabled));
    }

    #[test]
    fn test_filter_sources_by_name() {
        let file = write_sources();
        let sources = load_sources(file.path()).unwrap();
        let names = vec!["srwiki".to_string()];
        let filtered = filter_sources(sources, Some(&names));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "srwiki");
    }

    #[test]
    fn test_allowed_domains_defaults_to_host() {
        let file = write_sources();
        let sources = load_sources(file.path()).unwrap();
        let beta = sources.iter().find(|s| s.name == "beta").unwrap();
        assert_eq!(beta.allowed_domains(), vec!["beta.example.com".to_string()]);
    }

    #[test]
    fn test_missing_sources_file_is_fatal() {
        let err = load_sources(Path::new("/nonexistent/sources.yaml")).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
