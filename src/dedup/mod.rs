//! Duplicate elimination: exact content hashing, then MinHash/LSH
//! near-duplicate detection.
//!
//! Both stages keep the *first* document of each duplicate cluster, so
//! input order is part of the contract — callers must pass documents in the
//! order they want survivors chosen, or shuffle deliberately beforehand.
//!
//! The near stage is approximate and order-dependent by nature; its
//! parameters come from [`DedupConfig`]. Parameters that would make the
//! stage meaningless (threshold outside `(0, 1)`, zero permutations) skip
//! the stage with a warning rather than poisoning the run.

pub mod minhash;

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::config::DedupConfig;
use crate::models::Document;
use minhash::{LshIndex, MinHasher};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

/// Hex SHA-256 of a text, the exact-dedup identity.
pub fn sha256_text(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{digest:x}")
}

/// Lowercased word-boundary tokens used for near-duplicate shingles.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(&text.to_lowercase())
        .map(|token| token.as_str().to_string())
        .collect()
}

/// Exact stage: first occurrence of each unique text survives.
fn dedup_exact(documents: Vec<Document>) -> Vec<Document> {
    let mut seen: HashSet<String> = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| seen.insert(sha256_text(&doc.text)))
        .collect()
}

/// Near stage: first document of each near-duplicate cluster survives.
/// Documents with no tokens are dropped.
fn dedup_near(documents: Vec<Document>, threshold: f64, num_perm: usize) -> Vec<Document> {
    let hasher = MinHasher::new(num_perm);
    let mut index = LshIndex::new(threshold, num_perm);
    let mut unique = Vec::new();

    for doc in documents {
        let tokens = tokenize(&doc.text);
        if tokens.is_empty() {
            continue;
        }
        let signature = hasher.signature(&tokens);
        if index.query(&signature) {
            continue;
        }
        index.insert(signature);
        unique.push(doc);
    }
    unique
}

/// Run the configured dedup stages in fixed order: exact, then near.
#[instrument(level = "info", skip_all, fields(input = documents.len()))]
pub fn deduplicate_documents(documents: Vec<Document>, config: &DedupConfig) -> Vec<Document> {
    let mut documents = documents;

    if config.use_exact_dedup {
        let before = documents.len();
        documents = dedup_exact(documents);
        info!(before, after = documents.len(), "exact dedup");
    }

    if config.use_near_dup {
        let usable = config.near_dup_threshold > 0.0
            && config.near_dup_threshold < 1.0
            && config.near_dup_permutations > 0;
        if !usable {
            warn!(
                threshold = config.near_dup_threshold,
                permutations = config.near_dup_permutations,
                "near-duplicate stage skipped: unusable parameters"
            );
        } else {
            let before = documents.len();
            documents = dedup_near(
                documents,
                config.near_dup_threshold,
                config.near_dup_permutations,
            );
            info!(before, after = documents.len(), "near-duplicate dedup");
        }
    }

    documents
}
