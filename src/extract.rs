//! HTML article extraction behind an injectable trait.
//!
//! Extraction quality is a moving target and the right engine differs per
//! deployment, so the pipeline depends only on [`ArticleExtractor`].
//! [`CssExtractor`] is the built-in implementation: paragraph text from the
//! article-ish containers, `<title>`/OpenGraph title, and a publication
//! date from the usual meta tags.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::discover::dates;

/// What extraction produces from one HTML page.
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    pub text: String,
    pub title: Option<String>,
    pub date: Option<NaiveDateTime>,
}

/// Capability: pull clean article text out of an HTML page.
pub trait ArticleExtractor: Send + Sync {
    /// `None` when the page has no extractable text.
    fn extract(&self, html: &str, url: &str) -> Option<ExtractedArticle>;
}

static PARAGRAPHS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article p, main p, .article-body p").unwrap());
static ANY_PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("body p").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static META_DATES: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"meta[property="article:published_time"], meta[name="date"], meta[name="pubdate"]"#,
    )
    .unwrap()
});
static TIME_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());

/// Default CSS-selector extractor.
#[derive(Debug, Default)]
pub struct CssExtractor;

impl ArticleExtractor for CssExtractor {
    fn extract(&self, html: &str, _url: &str) -> Option<ExtractedArticle> {
        if html.trim().is_empty() {
            return None;
        }
        let document = Html::parse_document(html);

        let mut paragraphs: Vec<String> = document
            .select(&PARAGRAPHS)
            .map(|element| element.text().collect::<Vec<_>>().join(" "))
            .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|text| !text.is_empty())
            .collect();
        if paragraphs.is_empty() {
            paragraphs = document
                .select(&ANY_PARAGRAPH)
                .map(|element| element.text().collect::<Vec<_>>().join(" "))
                .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|text| !text.is_empty())
                .collect();
        }
        let text = paragraphs.join("\n\n");
        if text.is_empty() {
            return None;
        }

        let title = document
            .select(&OG_TITLE)
            .filter_map(|element| element.value().attr("content"))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| {
                document
                    .select(&TITLE)
                    .map(|element| element.text().collect::<String>().trim().to_string())
                    .find(|value| !value.is_empty())
            });

        let date = document
            .select(&META_DATES)
            .filter_map(|element| element.value().attr("content"))
            .chain(
                document
                    .select(&TIME_TAG)
                    .filter_map(|element| element.value().attr("datetime")),
            )
            .find_map(dates::parse_flexible);

        Some(ExtractedArticle { text, title, date })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Naslov | Sajt</title>
  <meta property="og:title" content="Pravi naslov" />
  <meta property="article:published_time" content="2025-05-06T10:00:00+02:00" />
</head>
<body>
  <nav><p></p></nav>
  <article>
    <p>Prvi   pasus teksta.</p>
    <p>Drugi pasus.</p>
  </article>
</body>
</html>"#;

    #[test]
    fn test_extracts_paragraphs_title_and_date() {
        let article = CssExtractor.extract(PAGE, "https://example.com/a").unwrap();
        assert_eq!(article.text, "Prvi pasus teksta.\n\nDrugi pasus.");
        assert_eq!(article.title.as_deref(), Some("Pravi naslov"));
        let date = article.date.unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M").to_string(), "2025-05-06 08:00");
    }

    #[test]
    fn test_falls_back_to_body_paragraphs_and_title_tag() {
        let html = "<html><head><title>T</title></head>\
                    <body><div><p>Samo jedan pasus.</p></div></body></html>";
        let article = CssExtractor.extract(html, "https://example.com/a").unwrap();
        assert_eq!(article.text, "Samo jedan pasus.");
        assert_eq!(article.title.as_deref(), Some("T"));
        assert!(article.date.is_none());
    }

    #[test]
    fn test_empty_page_is_none() {
        assert!(CssExtractor.extract("", "https://example.com/a").is_none());
        assert!(
            CssExtractor
                .extract("<html><body></body></html>", "https://example.com/a")
                .is_none()
        );
    }
}
