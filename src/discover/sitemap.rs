//! Recursive sitemap traversal with a bounded-depth worklist.
//!
//! A sitemap root may be a `<urlset>` of page URLs or a `<sitemapindex>`
//! pointing at child sitemaps. Children are walked depth-first in document
//! order so discovery order matches the index order, but through an explicit
//! `(url, depth)` stack rather than recursion; anything deeper than
//! [`MAX_DEPTH`] is dropped silently, which also terminates index cycles.
//!
//! Malformed XML yields an empty result for that node only — one broken
//! child sitemap never aborts the crawl.

use chrono::NaiveDateTime;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, instrument};

use super::{TextFetch, dates};

/// Deepest sitemap-index nesting that is still followed.
pub const MAX_DEPTH: u8 = 2;

/// One `<url>` entry of a urlset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
}

/// Parsed shape of a single sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapNode {
    /// `<sitemapindex>`: child sitemap locations.
    Index(Vec<String>),
    /// `<urlset>`: page entries.
    Urls(Vec<SitemapEntry>),
}

/// Parse one sitemap document. `None` for malformed or unrecognized XML.
pub fn parse_sitemap(xml: &str) -> Option<SitemapNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut is_index: Option<bool> = None;
    let mut children: Vec<String> = Vec::new();
    let mut entries: Vec<SitemapEntry> = Vec::new();

    // Current <sitemap>/<url> element state.
    let mut loc: Option<String> = None;
    let mut lastmod: Option<String> = None;
    // Name of the leaf element whose text we are inside.
    let mut field: Option<&'static str> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = Some(true),
                b"urlset" => is_index = Some(false),
                b"sitemap" | b"url" => {
                    loc = None;
                    lastmod = None;
                }
                b"loc" => field = Some("loc"),
                b"lastmod" => field = Some("lastmod"),
                _ => field = None,
            },
            Ok(Event::Text(t)) => {
                if let Some(name) = field {
                    let text = t.xml_content().ok()?.trim().to_string();
                    match name {
                        "loc" => loc = Some(text),
                        "lastmod" => lastmod = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                match e.local_name().as_ref() {
                    b"sitemap" => {
                        if let Some(loc) = loc.take() {
                            children.push(loc);
                        }
                    }
                    b"url" => {
                        if let Some(loc) = loc.take() {
                            entries.push(SitemapEntry {
                                loc,
                                lastmod: lastmod.take(),
                            });
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }

    match is_index? {
        true => Some(SitemapNode::Index(children)),
        false => Some(SitemapNode::Urls(entries)),
    }
}

/// Keep an entry given the incremental cutoff: entries whose `<lastmod>`
/// parses and falls before `since` are excluded; missing or unparsable
/// dates pass.
fn entry_is_recent(entry: &SitemapEntry, since: Option<NaiveDateTime>) -> bool {
    let Some(since) = since else {
        return true;
    };
    match entry.lastmod.as_deref().and_then(dates::parse_flexible) {
        Some(lastmod) => lastmod >= since,
        None => true,
    }
}

/// Walk a sitemap tree from `root`, collecting page URLs in document order.
#[instrument(level = "debug", skip(fetcher, since))]
pub async fn collect_sitemap_urls<F: TextFetch>(
    fetcher: &F,
    root: &str,
    since: Option<NaiveDateTime>,
) -> Vec<String> {
    let mut urls = Vec::new();
    let mut stack: Vec<(String, u8)> = vec![(root.to_string(), 0)];

    while let Some((sitemap_url, depth)) = stack.pop() {
        if depth > MAX_DEPTH {
            continue;
        }
        let Some(xml) = fetcher.fetch_text(&sitemap_url).await else {
            continue;
        };
        match parse_sitemap(&xml) {
            Some(SitemapNode::Index(children)) => {
                debug!(url = %sitemap_url, children = children.len(), "sitemap index");
                // Reverse so the stack pops children in document order.
                for child in children.into_iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
            Some(SitemapNode::Urls(entries)) => {
                debug!(url = %sitemap_url, entries = entries.len(), "urlset");
                urls.extend(
                    entries
                        .into_iter()
                        .filter(|entry| entry_is_recent(entry, since))
                        .map(|entry| entry.loc),
                );
            }
            None => {
                debug!(url = %sitemap_url, "malformed sitemap; skipping node");
            }
        }
    }
    urls
}
