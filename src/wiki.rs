//! Wikipedia dump ingestion: one-time download, streaming decompression,
//! and page extraction.
//!
//! Dumps are multi-gigabyte `pages-articles.xml.bz2` archives, so nothing
//! here buffers a whole body: the download streams response chunks to disk,
//! and [`DumpPages`] pulls pages out of a bzip2 stream one XML event at a
//! time. The iterator is single-pass; reading the dump again means opening
//! it again.
//!
//! A page's text is the last revision in the page's revision stream —
//! stream order, not revision-id or timestamp order, decides "latest".
//! Main-namespace pages only; pages with no revision text are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use futures::StreamExt;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::error::PipelineError;

/// One extracted article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiPage {
    pub title: String,
    pub text: String,
}

/// Download a dump file once, streaming chunks straight to disk.
///
/// Returns the local path; an existing file is reused without touching the
/// network, so re-runs are free.
#[instrument(level = "info", skip(client))]
pub async fn download_dump(
    client: &reqwest::Client,
    dump_url: &str,
    dump_file: &str,
    cache_dir: &Path,
) -> Result<PathBuf, PipelineError> {
    tokio::fs::create_dir_all(cache_dir).await?;
    let dump_path = cache_dir.join(dump_file);
    if dump_path.exists() {
        info!(path = %dump_path.display(), "using cached dump");
        return Ok(dump_path);
    }

    let url = format!("{dump_url}{dump_file}");
    info!(%url, "downloading dump");
    let response = client.get(&url).send().await?.error_for_status()?;

    let mut file = tokio::fs::File::create(&dump_path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(dump_path)
}

/// Open a `.bz2` dump for page iteration.
pub fn open_dump(path: &Path) -> Result<DumpPages<BufReader<MultiBzDecoder<File>>>, PipelineError> {
    let file = File::open(path)?;
    let decoder = MultiBzDecoder::new(file);
    Ok(DumpPages::new(BufReader::new(decoder)))
}

/// Lazy iterator over the main-namespace pages of a MediaWiki XML export.
pub struct DumpPages<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> DumpPages<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }

    /// Pull the next main-namespace page with revision text.
    fn next_page(&mut self) -> Option<WikiPage> {
        let mut title = String::new();
        let mut ns = String::new();
        let mut latest_text: Option<String> = None;
        let mut in_page = false;
        let mut in_revision = false;
        // Leaf element currently collecting text: title, ns, or text.
        let mut field: Option<&'static str> = None;
        let mut text_buf = String::new();

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"page" => {
                        in_page = true;
                        title.clear();
                        ns.clear();
                        latest_text = None;
                    }
                    b"revision" if in_page => in_revision = true,
                    b"title" if in_page && !in_revision => {
                        field = Some("title");
                        text_buf.clear();
                    }
                    b"ns" if in_page && !in_revision => {
                        field = Some("ns");
                        text_buf.clear();
                    }
                    b"text" if in_revision => {
                        field = Some("text");
                        text_buf.clear();
                    }
                    _ => field = None,
                },
                Ok(Event::Text(t)) => {
                    if field.is_some() {
                        if let Ok(text) = t.xml_content() {
                            text_buf.push_str(&text);
                        }
                    }
                }
                Ok(Event::CData(t)) => {
                    if field.is_some() {
                        text_buf.push_str(&String::from_utf8_lossy(t.as_ref()));
                    }
                }
                Ok(Event::End(e)) => {
                    match e.local_name().as_ref() {
                        b"title" => {
                            if field == Some("title") {
                                title = text_buf.trim().to_string();
                            }
                        }
                        b"ns" => {
                            if field == Some("ns") {
                                ns = text_buf.trim().to_string();
                            }
                        }
                        b"text" => {
                            if field == Some("text") {
                                // Stream order decides "latest": every
                                // revision's text overwrites the previous.
                                latest_text = Some(text_buf.clone());
                            }
                        }
                        b"revision" => in_revision = false,
                        b"page" => {
                            in_page = false;
                            let is_main = ns.is_empty() || ns == "0";
                            if is_main {
                                if let Some(text) = latest_text.take() {
                                    let cleaned = strip_wiki_markup(&text);
                                    if !cleaned.is_empty() {
                                        return Some(WikiPage {
                                            title: title.clone(),
                                            text: cleaned,
                                        });
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                    field = None;
                }
                Ok(Event::Eof) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "dump XML parse error; stopping iteration");
                    return None;
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for DumpPages<R> {
    type Item = WikiPage;

    fn next(&mut self) -> Option<WikiPage> {
        if self.done {
            return None;
        }
        match self.next_page() {
            Some(page) => Some(page),
            None => {
                self.done = true;
                None
            }
        }
    }
}

static REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<ref[^>/]*/>|<ref[^>]*>.*?</ref>").unwrap());
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static TABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{\|.*?\|\}").unwrap());
static TEMPLATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{[^{}]*\}\}").unwrap());
static FILE_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(?:File|Image|Datoteka|Слика):[^\[\]]*\]\]").unwrap());
static PIPED_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[[^\[\]|]*\|([^\[\]]*)\]\]").unwrap());
static PLAIN_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\[\]]*)\]\]").unwrap());
static EXT_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:https?|ftp)://[^\s\]]*(?:\s+([^\]]*))?\]").unwrap());
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^=+\s*(.*?)\s*=+\s*$").unwrap());
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static BLANK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Reduce wiki markup to plain text.
///
/// Covers the constructs that dominate article bodies: templates (nested,
/// innermost-out), tables, refs, comments, file and wiki links, external
/// links, bold/italic quotes, headings, and leftover HTML tags. This is a
/// plain-text reduction, not a renderer; obscure constructs degrade to
/// their raw text.
pub fn strip_wiki_markup(text: &str) -> String {
    let mut text = REF_RE.replace_all(text, "").into_owned();
    text = COMMENT_RE.replace_all(&text, "").into_owned();
    text = TABLE_RE.replace_all(&text, "").into_owned();
    // Innermost-out so nested templates unwind; bounded for pathological input.
    for _ in 0..10 {
        let replaced = TEMPLATE_RE.replace_all(&text, "").into_owned();
        if replaced == text {
            break;
        }
        text = replaced;
    }
    text = FILE_LINK_RE.replace_all(&text, "").into_owned();
    text = PIPED_LINK_RE.replace_all(&text, "$1").into_owned();
    text = PLAIN_LINK_RE.replace_all(&text, "$1").into_owned();
    text = EXT_LINK_RE.replace_all(&text, "$1").into_owned();
    text = text.replace("'''", "").replace("''", "");
    text = HEADING_RE.replace_all(&text, "$1").into_owned();
    text = HTML_TAG_RE.replace_all(&text, "").into_owned();
    text = BLANK_RE.replace_all(&text, "\n\n").into_owned();
    text.trim().to_string()
}

/// Canonical article URL for a page title.
pub fn page_url(base_url: &str, title: &str) -> String {
    format!(
        "{}/wiki/{}",
        base_url.trim_end_matches('/'),
        title.replace(' ', "_")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DUMP: &str = r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/">
  <page>
    <title>Beograd</title>
    <ns>0</ns>
    <revision><id>1</id><text>Old text about {{grad}} Beograd.</text></revision>
    <revision><id>2</id><text>'''Beograd''' je glavni grad [[Srbija|Srbije]].</text></revision>
  </page>
  <page>
    <title>Talk:Beograd</title>
    <ns>1</ns>
    <revision><id>3</id><text>Discussion page.</text></revision>
  </page>
  <page>
    <title>Prazno</title>
    <ns>0</ns>
    <revision><id>4</id><text></text></revision>
  </page>
  <page>
    <title>Novi Sad</title>
    <ns>0</ns>
    <revision><id>5</id><text>Novi Sad je grad u [[Vojvodina|Vojvodini]].</text></revision>
  </page>
</mediawiki>"#;

    #[test]
    fn test_dump_pages_main_namespace_last_revision() {
        let pages: Vec<WikiPage> = DumpPages::new(Cursor::new(DUMP)).collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].title, "Beograd");
        // Second revision wins by stream order.
        assert_eq!(pages[0].text, "Beograd je glavni grad Srbije.");
        assert_eq!(pages[1].title, "Novi Sad");
    }

    #[test]
    fn test_dump_pages_via_bz2() {
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mini.xml.bz2");
        let file = File::create(&path).unwrap();
        let mut encoder = BzEncoder::new(file, Compression::default());
        encoder.write_all(DUMP.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let pages: Vec<WikiPage> = open_dump(&path).unwrap().collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].title, "Beograd");
    }

    #[test]
    fn test_strip_templates_nested() {
        assert_eq!(strip_wiki_markup("A {{outer|{{inner}}}} B"), "A  B");
        assert_eq!(strip_wiki_markup("{{infobox|name=X}}Samo tekst."), "Samo tekst.");
    }

    #[test]
    fn test_strip_links() {
        assert_eq!(
            strip_wiki_markup("[[Srbija|Srbije]] i [[Beograd]]"),
            "Srbije i Beograd"
        );
        assert_eq!(
            strip_wiki_markup("Vidi [https://example.com zvanični sajt]."),
            "Vidi zvanični sajt."
        );
    }

    #[test]
    fn test_strip_refs_and_files() {
        assert_eq!(
            strip_wiki_markup("Tekst<ref>izvor</ref> i još<ref name=\"a\"/>."),
            "Tekst i još."
        );
        assert_eq!(strip_wiki_markup("[[File:slika.jpg|thumb|opis]]Tekst"), "Tekst");
    }

    #[test]
    fn test_strip_headings_and_quotes() {
        assert_eq!(strip_wiki_markup("== Istorija ==\n'''Grad''' je star."), "Istorija\nGrad je star.");
    }

    #[test]
    fn test_page_url() {
        assert_eq!(
            page_url("https://sr.wikipedia.org", "Novi Sad"),
            "https://sr.wikipedia.org/wiki/Novi_Sad"
        );
    }
}
