//! Stratified train/validation/test splitting.
//!
//! Records are grouped by a configurable tuple of field values, each group
//! is shuffled with the configured seed, and cut at `floor(n × train)` and
//! `floor(n × train) + floor(n × validation)`. Ratios apply per group, so
//! tiny or lopsided groups make the global proportions approximate — that
//! is the cost of guaranteeing every stratum appears in every split it can.
//!
//! Grouping is an ordered map and a single RNG is threaded through the
//! groups in key order, so a fixed seed always produces the same partition.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, instrument};

use crate::config::SplitConfig;
use crate::models::{Document, Sample, SplitSet};

/// Field lookup used to build stratification keys.
pub trait Stratifiable {
    fn field(&self, name: &str) -> Option<&str>;
}

impl Stratifiable for Document {
    fn field(&self, name: &str) -> Option<&str> {
        Document::field(self, name)
    }
}

impl Stratifiable for Sample {
    fn field(&self, name: &str) -> Option<&str> {
        Sample::field(self, name)
    }
}

/// Partition records into train/validation/test.
#[instrument(level = "info", skip_all, fields(input = records.len()))]
pub fn split_dataset<T: Stratifiable>(records: Vec<T>, config: &SplitConfig) -> SplitSet<T> {
    let mut rng = StdRng::seed_from_u64(config.random_seed);

    let mut grouped: BTreeMap<Vec<String>, Vec<T>> = BTreeMap::new();
    for record in records {
        let key: Vec<String> = config
            .stratify_by
            .iter()
            .map(|field| record.field(field).unwrap_or("").to_string())
            .collect();
        grouped.entry(key).or_default().push(record);
    }

    let mut splits = SplitSet::default();
    for mut items in grouped.into_values() {
        items.shuffle(&mut rng);
        let total = items.len();
        let train_count = (total as f64 * config.train) as usize;
        let val_count = (total as f64 * config.validation) as usize;

        let mut items = items.into_iter();
        splits.train.extend(items.by_ref().take(train_count));
        splits.validation.extend(items.by_ref().take(val_count));
        splits.test.extend(items);
    }

    info!(
        train = splits.train.len(),
        validation = splits.validation.len(),
        test = splits.test.len(),
        "split complete"
    );
    splits
}
