//! Data models for documents, samples, and dataset splits.
//!
//! These are the records that cross stage boundaries:
//! - [`Document`]: one fetched-and-extracted text, from the scrape stage
//!   through cleaning, dedup, and splitting to export
//! - [`Sample`]: one span drawn from a clean document for the
//!   language-identification dataset
//! - [`SplitSet`]: the train/validation/test partition produced by the
//!   splitter
//!
//! Field names match the JSONL records consumed by downstream training
//! tooling, so renames here are wire-format changes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single text document flowing through the pipeline.
///
/// Produced by discovery + fetch + extraction, mutated in place by the
/// cleaning stage, and immutable from deduplication onward.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Document {
    /// The document body. Cleaned and normalized before dedup.
    pub text: String,
    /// Title, when the extractor found one.
    pub title: Option<String>,
    /// Publication date as an ISO `YYYY-MM-DD` string, when known.
    pub date: Option<String>,
    /// The URL this document was fetched from. Never empty.
    pub url: String,
    /// The source domain the document came from (e.g. `text.npr.org`).
    pub source: String,
    /// Language tag assigned from the source configuration.
    pub language: Option<String>,
    /// Category tag of the source (e.g. `news`, `wiki`).
    pub domain: Option<String>,
    /// Stable opaque identifier, assigned after cleaning.
    pub id: Option<String>,
}

impl Document {
    /// Assign the stable identifier: a digest of URL and text, so re-runs
    /// over identical content produce identical ids.
    pub fn assign_id(&mut self) {
        let mut hasher = Sha256::new();
        hasher.update(self.url.as_bytes());
        hasher.update(self.text.as_bytes());
        let digest = hasher.finalize();
        self.id = Some(format!("{digest:x}")[..32].to_string());
    }

    /// Look up a stratification field by name.
    ///
    /// Used by the splitter, which stratifies on a configurable tuple of
    /// field names. Unknown names resolve to `None` and stratify together.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "url" => Some(self.url.as_str()),
            "source" => Some(self.source.as_str()),
            "language" => self.language.as_deref(),
            "domain" => self.domain.as_deref(),
            "title" => self.title.as_deref(),
            "date" => self.date.as_deref(),
            "id" => self.id.as_deref(),
            _ => None,
        }
    }
}

/// A labeled text span extracted from a [`Document`] for the
/// language-identification dataset.
///
/// Samples are independent records once extracted; `source_doc_id` is the
/// only link back to the originating document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Sample {
    /// Stable opaque identifier.
    pub id: String,
    /// The sampled span, units joined with single spaces.
    pub text: String,
    /// Classification label (language code).
    pub label: String,
    /// Source domain the originating document came from.
    pub source: String,
    /// Character length of `text`.
    pub length: usize,
    /// Name of the matched length bucket, when buckets are configured.
    pub length_bucket: Option<String>,
    /// `id` of the originating document.
    pub source_doc_id: Option<String>,
}

impl Sample {
    /// Look up a stratification field by name (see [`Document::field`]).
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(self.id.as_str()),
            "label" => Some(self.label.as_str()),
            "source" => Some(self.source.as_str()),
            "length_bucket" => self.length_bucket.as_deref(),
            "source_doc_id" => self.source_doc_id.as_deref(),
            _ => None,
        }
    }
}

/// A train/validation/test partition of records.
#[derive(Debug)]
pub struct SplitSet<T> {
    pub train: Vec<T>,
    pub validation: Vec<T>,
    pub test: Vec<T>,
}

impl<T> Default for SplitSet<T> {
    fn default() -> Self {
        SplitSet {
            train: Vec::new(),
            validation: Vec::new(),
            test: Vec::new(),
        }
    }
}

impl<T> SplitSet<T> {
    /// Total record count across all three splits.
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(name, records)` pairs in the fixed split order.
    pub fn iter_named(&self) -> impl Iterator<Item = (&'static str, &Vec<T>)> {
        [
            ("train", &self.train),
            ("validation", &self.validation),
            ("test", &self.test),
        ]
        .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document {
            text: "Some article text.".to_string(),
            title: Some("A title".to_string()),
            date: Some("2025-05-06".to_string()),
            url: "https://example.com/a".to_string(),
            source: "example.com".to_string(),
            language: Some("sr".to_string()),
            domain: Some("news".to_string()),
            id: None,
        }
    }

    #[test]
    fn test_document_roundtrip() {
        let json = serde_json::to_string(&doc()).unwrap();
        assert!(json.contains("\"source\":\"example.com\""));
        let parsed: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.url, "https://example.com/a");
        assert_eq!(parsed.language.as_deref(), Some("sr"));
    }

    #[test]
    fn test_assign_id_is_stable() {
        let mut a = doc();
        let mut b = doc();
        a.assign_id();
        b.assign_id();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.as_ref().unwrap().len(), 32);

        b.text.push('!');
        b.assign_id();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_document_field_lookup() {
        let d = doc();
        assert_eq!(d.field("language"), Some("sr"));
        assert_eq!(d.field("source"), Some("example.com"));
        assert_eq!(d.field("id"), None);
        assert_eq!(d.field("no_such_field"), None);
    }

    #[test]
    fn test_sample_serialization_field_names() {
        let sample = Sample {
            id: "abc".to_string(),
            text: "Kratka rečenica.".to_string(),
            label: "sr".to_string(),
            source: "example.com".to_string(),
            length: 16,
            length_bucket: Some("short".to_string()),
            source_doc_id: Some("doc-1".to_string()),
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"length_bucket\":\"short\""));
        assert!(json.contains("\"source_doc_id\":\"doc-1\""));
    }

    #[test]
    fn test_split_set_len() {
        let splits = SplitSet {
            train: vec![1, 2, 3],
            validation: vec![4],
            test: vec![],
        };
        assert_eq!(splits.len(), 4);
        let names: Vec<&str> = splits.iter_named().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["train", "validation", "test"]);
    }
}
