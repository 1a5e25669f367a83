//! Per-split dataset statistics.
//!
//! One small JSON file per split (`train_stats.json`, ...) with record
//! count, per-language counts, and average text length — enough for an
//! operator to sanity-check a run without loading the data.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};

use crate::error::PipelineError;
use crate::models::{Document, SplitSet};

/// Statistics for one split.
#[derive(Debug, Serialize)]
pub struct SplitStats {
    pub count: usize,
    pub languages: BTreeMap<String, usize>,
    pub average_length: f64,
}

impl SplitStats {
    pub fn for_documents(documents: &[Document]) -> Self {
        let mut languages: BTreeMap<String, usize> = BTreeMap::new();
        for document in documents {
            let language = document
                .language
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            *languages.entry(language).or_insert(0) += 1;
        }
        let total_length: usize = documents.iter().map(|d| d.text.chars().count()).sum();
        let average_length = if documents.is_empty() {
            0.0
        } else {
            total_length as f64 / documents.len() as f64
        };
        Self {
            count: documents.len(),
            languages,
            average_length,
        }
    }
}

/// Write `{split}_stats.json` for each split under `stats_dir`.
#[instrument(level = "info", skip(splits), fields(dir = %stats_dir.display()))]
pub async fn save_split_stats(
    splits: &SplitSet<Document>,
    stats_dir: &Path,
) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(stats_dir).await?;
    for (name, items) in splits.iter_named() {
        let stats = SplitStats::for_documents(items);
        let path = stats_dir.join(format!("{name}_stats.json"));
        let body = serde_json::to_string_pretty(&stats)?;
        tokio::fs::write(&path, body).await?;
        info!(split = name, count = stats.count, "wrote statistics");
    }
    Ok(())
}
