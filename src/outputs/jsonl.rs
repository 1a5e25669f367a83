//! JSONL reading and writing, with optional gzip.
//!
//! One JSON object per line. With `gzip` compression the writer appends
//! `.gz` to the target path, so `train.jsonl` becomes `train.jsonl.gz`;
//! the reader dispatches on the extension it finds.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

use crate::error::PipelineError;

/// Write records as JSONL, returning the path actually written.
#[instrument(level = "info", skip(items), fields(count = items.len(), path = %path.display()))]
pub async fn export_jsonl<T: Serialize>(
    items: &[T],
    path: &Path,
    compression: Option<&str>,
) -> Result<PathBuf, PipelineError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        lines.push(serde_json::to_string(item)?);
    }
    let body = lines.join("\n") + if lines.is_empty() { "" } else { "\n" };

    let target = if compression == Some("gzip") {
        let mut name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(".gz");
        let target = path.with_file_name(name);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body.as_bytes())?;
        let compressed = encoder.finish()?;
        tokio::fs::write(&target, compressed).await?;
        target
    } else {
        tokio::fs::write(path, body).await?;
        path.to_path_buf()
    };

    info!(path = %target.display(), "wrote JSONL");
    Ok(target)
}

/// Load records from a `.jsonl` or `.jsonl.gz` file. Blank lines are
/// skipped; any other format is a configuration error.
pub fn load_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::Config(format!(
            "missing input file: {}",
            path.display()
        )));
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let file = std::fs::File::open(path)?;
    let reader: Box<dyn Read> = match extension {
        "gz" => Box::new(GzDecoder::new(file)),
        "jsonl" => Box::new(file),
        _ => {
            return Err(PipelineError::Config(format!(
                "unsupported input format: {}",
                path.display()
            )));
        }
    };

    let mut records = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        records.push(serde_json::from_str(line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;

    fn doc(id: usize) -> Document {
        Document {
            text: format!("tekst {id}"),
            title: None,
            date: None,
            url: format!("https://example.com/{id}"),
            source: "example.com".to_string(),
            language: Some("sr".to_string()),
            domain: Some("news".to_string()),
            id: Some(format!("doc-{id}")),
        }
    }

    #[tokio::test]
    async fn test_roundtrip_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        let docs: Vec<Document> = (0..3).map(doc).collect();

        let written = export_jsonl(&docs, &path, None).await.unwrap();
        assert_eq!(written, path);
        let loaded: Vec<Document> = load_jsonl(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].url, "https://example.com/2");
    }

    #[tokio::test]
    async fn test_roundtrip_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        let docs: Vec<Document> = (0..2).map(doc).collect();

        let written = export_jsonl(&docs, &path, Some("gzip")).await.unwrap();
        assert_eq!(written, dir.path().join("train.jsonl.gz"));
        let loaded: Vec<Document> = load_jsonl(&written).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        let docs: Vec<Document> = Vec::new();
        export_jsonl(&docs, &path, None).await.unwrap();
        let loaded: Vec<Document> = load_jsonl(&path).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_unsupported_format_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        std::fs::write(&path, b"PAR1").unwrap();
        let err = load_jsonl::<Document>(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_jsonl::<Document>(Path::new("/nonexistent.jsonl")).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
