//! Pipeline configuration loaded from YAML.
//!
//! One [`PipelineConfig`] drives both the clean-text and language-id runs.
//! Every section and knob has a serde default, so a minimal config file is
//! valid; a missing config *file* is fatal before any work starts.
//!
//! String values support `${VAR}` environment expansion (applied to the
//! parsed YAML tree before the typed deserialize), so paths like
//! `cache_dir: ${SCRATCH}/cache` resolve at load time. Unset variables are
//! left verbatim.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::PipelineError;

static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub collection: CollectionConfig,
    pub cleaning: CleaningConfig,
    pub quality: QualityConfig,
    pub language_assignment: LanguageAssignmentConfig,
    pub deduplication: DedupConfig,
    pub extraction: ExtractionConfig,
    pub labeling: LabelingConfig,
    pub balancing: BalancingConfig,
    pub dataset: DatasetConfig,
    pub splits: SplitConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub source: SourceDatasetConfig,
}

/// Fetch-stage knobs: politeness, caching, retries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub user_agent: String,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub max_retries: u32,
    pub respect_robots_txt: bool,
    pub cache_enabled: bool,
    pub cache_dir: String,
    /// Requests per second used when a source does not set its own rate.
    pub default_rate_limit: f64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("corpus_mill/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: 30,
            max_retries: 3,
            respect_robots_txt: true,
            cache_enabled: true,
            cache_dir: "./cache".to_string(),
            default_rate_limit: 1.0,
        }
    }
}

/// Document cleaning and normalization knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub min_length: usize,
    pub max_length: usize,
    /// Literal substrings removed from every document (boilerplate lines).
    pub exclude_patterns: Vec<String>,
    /// Unicode normalization form: `NFC` or `NFKC`.
    pub unicode_normalization: String,
    pub normalize_quotes: bool,
    pub normalize_dashes: bool,
    pub normalize_whitespace: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            min_length: 0,
            max_length: usize::MAX,
            exclude_patterns: Vec::new(),
            unicode_normalization: "NFC".to_string(),
            normalize_quotes: true,
            normalize_dashes: true,
            normalize_whitespace: true,
        }
    }
}

/// Whole-document quality gates applied after cleaning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub min_words_per_document: usize,
    pub max_words_per_document: usize,
    pub max_digit_ratio: Option<f64>,
    pub max_special_char_ratio: Option<f64>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_words_per_document: 0,
            max_words_per_document: usize::MAX,
            max_digit_ratio: None,
            max_special_char_ratio: None,
        }
    }
}

/// Language-validation knobs (classifier is injected, see `langcheck`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LanguageAssignmentConfig {
    pub use_classifier_validation: bool,
    /// A document is rejected only when the classifier disagrees with the
    /// source's language tag at or above this confidence.
    pub min_confidence_for_override: f64,
}

impl Default for LanguageAssignmentConfig {
    fn default() -> Self {
        Self {
            use_classifier_validation: false,
            min_confidence_for_override: 0.95,
        }
    }
}

/// Deduplication stage toggles and MinHash parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub use_exact_dedup: bool,
    pub use_near_dup: bool,
    /// Estimated Jaccard similarity above which a document is a duplicate.
    pub near_dup_threshold: f64,
    /// Number of MinHash permutations.
    pub near_dup_permutations: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            use_exact_dedup: true,
            use_near_dup: false,
            near_dup_threshold: 0.9,
            near_dup_permutations: 128,
        }
    }
}

/// Sample-extraction knobs for the language-id dataset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// `random_sentences` or `random_paragraphs`.
    pub method: String,
    pub min_sentences: usize,
    pub max_sentences: usize,
    /// Ordered: the first bucket whose range contains the sample length wins.
    pub length_buckets: Vec<LengthBucket>,
    pub quality: SampleQualityConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            method: "random_sentences".to_string(),
            min_sentences: 2,
            max_sentences: 5,
            length_buckets: Vec::new(),
            quality: SampleQualityConfig::default(),
        }
    }
}

/// One length bucket with its balancing quota.
#[derive(Debug, Clone, Deserialize)]
pub struct LengthBucket {
    pub name: String,
    #[serde(default)]
    pub min_chars: usize,
    #[serde(default = "max_chars_default")]
    pub max_chars: usize,
    /// Target share of a label's samples during length balancing.
    #[serde(default)]
    pub percentage: f64,
}

fn max_chars_default() -> usize {
    usize::MAX
}

/// Per-sample quality gates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SampleQualityConfig {
    pub min_words: usize,
    pub max_words: usize,
    pub reject_if_contains: Vec<String>,
    pub max_digit_ratio: Option<f64>,
    pub max_punctuation_ratio: Option<f64>,
}

impl Default for SampleQualityConfig {
    fn default() -> Self {
        Self {
            min_words: 0,
            max_words: usize::MAX,
            reject_if_contains: Vec::new(),
            max_digit_ratio: None,
            max_punctuation_ratio: None,
        }
    }
}

/// Label assignment: per-source overrides, falling back to document language.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    pub source_mappings: HashMap<String, String>,
}

/// Which balancing passes run, in the fixed language → source → length order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BalancingConfig {
    pub balance_languages: bool,
    pub balance_sources: bool,
    pub balance_lengths: bool,
}

/// Dataset-level size targets applied after balancing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub target_size: TargetSizeConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetSizeConfig {
    pub min_samples: Option<usize>,
    pub max_samples: Option<usize>,
}

/// Stratified split ratios and seed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Field names forming the stratification key.
    pub stratify_by: Vec<String>,
    pub train: f64,
    pub validation: f64,
    pub random_seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            stratify_by: Vec::new(),
            train: 0.8,
            validation: 0.1,
            random_seed: 42,
        }
    }
}

/// Export location and compression.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: String,
    /// `gzip` to write `.jsonl.gz`, anything else for plain `.jsonl`.
    pub compression: Option<String>,
    pub save_statistics: bool,
    pub statistics_dir: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: "./output".to_string(),
            compression: None,
            save_statistics: true,
            statistics_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Input location for the language-id run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceDatasetConfig {
    pub source_dataset_path: Option<String>,
}

/// Load a [`PipelineConfig`] from a YAML file.
///
/// The file must exist; everything inside it is optional. `${VAR}` references
/// in string values are expanded from the process environment before the
/// typed deserialize.
pub fn load_config(path: &Path) -> Result<PipelineConfig, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::Config(format!(
            "config not found: {}",
            path.display()
        )));
    }
    let raw = std::fs::read_to_string(path)?;
    let mut value: serde_yaml::Value = serde_yaml::from_str(&raw)?;
    expand_env(&mut value);
    let config: PipelineConfig = serde_yaml::from_value(value)?;
    Ok(config)
}

/// Expand `${VAR}` in every string leaf of a YAML tree.
fn expand_env(value: &mut serde_yaml::Value) {
    match value {
        serde_yaml::Value::String(s) => {
            if ENV_VAR_RE.is_match(s) {
                *s = ENV_VAR_RE
                    .replace_all(s, |caps: &regex::Captures| {
                        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
                    })
                    .into_owned();
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for item in seq {
                expand_env(item);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                expand_env(item);
            }
        }
        _ => {}
    }
}
