//! Sample extraction and quota balancing for the language-identification
//! dataset.
//!
//! Extraction draws one random contiguous span of sentence or paragraph
//! units per clean document, gated by word-count, substring, digit-ratio,
//! and punctuation-ratio checks, then bucketed by character length and
//! labeled through the source→label override map (falling back to the
//! document's language tag).
//!
//! Balancing runs in a fixed order — languages, then sources within each
//! language, then length buckets within each language — and every step is
//! truncation of an already-shuffled list, not re-sampling. A seeded
//! shuffle brackets the whole thing so truncation order cannot introduce
//! systematic bias, and grouping uses ordered maps so a fixed seed always
//! produces the same output set.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use crate::clean::{digit_ratio, punctuation_ratio, word_count};
use crate::config::{BalancingConfig, ExtractionConfig, LengthBucket, SampleQualityConfig};
use crate::models::{Document, Sample};

/// Split on sentence-terminal punctuation followed by whitespace; the
/// punctuation stays with its sentence, a trailing fragment without
/// terminal punctuation is kept.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        if matches!(chars[i].1, '.' | '!' | '?') {
            let mut j = i;
            while j + 1 < chars.len() && matches!(chars[j + 1].1, '.' | '!' | '?') {
                j += 1;
            }
            if j + 1 < chars.len() && chars[j + 1].1.is_whitespace() {
                let end = chars[j].0 + chars[j].1.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = end;
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Split on blank lines.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(str::to_string)
        .collect()
}

/// First bucket whose `[min_chars, max_chars]` contains `length`, in
/// configuration order.
pub fn assign_length_bucket(length: usize, buckets: &[LengthBucket]) -> Option<&str> {
    buckets
        .iter()
        .find(|bucket| length >= bucket.min_chars && length <= bucket.max_chars)
        .map(|bucket| bucket.name.as_str())
}

/// Per-sample quality gates.
pub fn passes_sample_quality(text: &str, quality: &SampleQualityConfig) -> bool {
    let words = word_count(text);
    if words < quality.min_words || words > quality.max_words {
        return false;
    }
    if quality
        .reject_if_contains
        .iter()
        .any(|needle| !needle.is_empty() && text.contains(needle.as_str()))
    {
        return false;
    }
    if let Some(max_digit) = quality.max_digit_ratio {
        if digit_ratio(text) > max_digit {
            return false;
        }
    }
    if let Some(max_punct) = quality.max_punctuation_ratio {
        if punctuation_ratio(text) > max_punct {
            return false;
        }
    }
    true
}

/// Draw one sample from a document, or `None` when the document is too
/// short, the span fails quality, no bucket matches, or no label resolves.
pub fn extract_sample(
    document: &Document,
    config: &ExtractionConfig,
    label_mapping: &HashMap<String, String>,
    rng: &mut StdRng,
) -> Option<Sample> {
    if document.text.is_empty() {
        return None;
    }

    let units = if config.method == "random_paragraphs" {
        split_paragraphs(&document.text)
    } else {
        split_sentences(&document.text)
    };
    if units.len() < config.min_sentences {
        return None;
    }

    let count = rng
        .random_range(config.min_sentences..=config.max_sentences.max(config.min_sentences))
        .min(units.len());
    let start = rng.random_range(0..=units.len() - count);
    let text = units[start..start + count].join(" ");

    if !passes_sample_quality(&text, &config.quality) {
        return None;
    }

    let length = text.chars().count();
    let bucket = assign_length_bucket(length, &config.length_buckets);
    if !config.length_buckets.is_empty() && bucket.is_none() {
        return None;
    }

    let label = label_mapping
        .get(&document.source)
        .cloned()
        .or_else(|| document.language.clone())
        .filter(|label| !label.is_empty())?;

    Some(Sample {
        id: sample_id(document, &text),
        text,
        label,
        source: document.source.clone(),
        length,
        length_bucket: bucket.map(str::to_string),
        source_doc_id: document.id.clone(),
    })
}

/// Opaque sample identifier derived from the span and its origin.
fn sample_id(document: &Document, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.url.as_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    format!("{digest:x}")[..32].to_string()
}

/// Truncate every label group to the size of the smallest.
pub fn balance_languages(samples: Vec<Sample>) -> Vec<Sample> {
    let mut by_label: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
    for sample in samples {
        by_label.entry(sample.label.clone()).or_default().push(sample);
    }
    let Some(min_count) = by_label.values().map(Vec::len).min() else {
        return Vec::new();
    };
    by_label
        .into_values()
        .flat_map(|mut group| {
            group.truncate(min_count);
            group
        })
        .collect()
}

/// Within each label, truncate every source group to that label's smallest
/// source group.
pub fn balance_sources(samples: Vec<Sample>) -> Vec<Sample> {
    let mut by_label: BTreeMap<String, BTreeMap<String, Vec<Sample>>> = BTreeMap::new();
    for sample in samples {
        by_label
            .entry(sample.label.clone())
            .or_default()
            .entry(sample.source.clone())
            .or_default()
            .push(sample);
    }
    let mut balanced = Vec::new();
    for sources in by_label.into_values() {
        let min_count = sources.values().map(Vec::len).min().unwrap_or(0);
        for mut group in sources.into_values() {
            group.truncate(min_count);
            balanced.extend(group);
        }
    }
    balanced
}

/// Within each label, keep `floor(total × percentage)` samples per
/// configured bucket — truncation of the shuffled list, not re-sampling.
/// Samples without a bucket are dropped.
pub fn balance_lengths(samples: Vec<Sample>, buckets: &[LengthBucket]) -> Vec<Sample> {
    let mut by_label: BTreeMap<String, BTreeMap<String, Vec<Sample>>> = BTreeMap::new();
    for sample in samples {
        let Some(bucket) = sample.length_bucket.clone() else {
            continue;
        };
        by_label
            .entry(sample.label.clone())
            .or_default()
            .entry(bucket)
            .or_default()
            .push(sample);
    }
    let mut balanced = Vec::new();
    for bucket_map in by_label.into_values() {
        let total: usize = bucket_map.values().map(Vec::len).sum();
        for bucket in buckets {
            let target = (total as f64 * bucket.percentage) as usize;
            if let Some(group) = bucket_map.get(&bucket.name) {
                balanced.extend(group.iter().take(target).cloned());
            }
        }
    }
    balanced
}

/// Run the configured balancing passes, bracketed by seeded shuffles.
#[instrument(level = "info", skip_all, fields(input = samples.len()))]
pub fn apply_balancing(
    mut samples: Vec<Sample>,
    balancing: &BalancingConfig,
    buckets: &[LengthBucket],
    rng: &mut StdRng,
) -> Vec<Sample> {
    samples.shuffle(rng);
    if balancing.balance_languages {
        samples = balance_languages(samples);
    }
    if balancing.balance_sources {
        samples = balance_sources(samples);
    }
    if balancing.balance_lengths {
        samples = balance_lengths(samples, buckets);
    }
    samples.shuffle(rng);
    info!(output = samples.len(), "balancing complete");
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn sample(label: &str, source: &str, bucket: Option<&str>) -> Sample {
        Sample {
            id: format!("{label}-{source}-{}", rand_suffix()),
            text: "tekst uzorka za test".to_string(),
            label: label.to_string(),
            source: source.to_string(),
            length: 20,
            length_bucket: bucket.map(str::to_string),
            source_doc_id: None,
        }
    }

    fn rand_suffix() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(0);
        NEXT.fetch_add(1, Ordering::Relaxed)
    }

    fn doc(text: &str) -> Document {
        Document {
            text: text.to_string(),
            title: None,
            date: None,
            url: "https://example.com/a".to_string(),
            source: "example.com".to_string(),
            language: Some("sr".to_string()),
            domain: None,
            id: Some("doc-1".to_string()),
        }
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("Prva rečenica. Druga! Treća? I ostatak"),
            vec!["Prva rečenica.", "Druga!", "Treća?", "I ostatak"]
        );
        assert_eq!(split_sentences("Dr. Ana je došla."), vec!["Dr.", "Ana je došla."]);
        assert!(split_sentences("").is_empty());
    }

    #[test]
    fn test_split_paragraphs() {
        assert_eq!(
            split_paragraphs("Prvi pasus.\n\nDrugi pasus.\n\n\n\nTreći."),
            vec!["Prvi pasus.", "Drugi pasus.", "Treći."]
        );
    }

    #[test]
    fn test_assign_length_bucket_first_match_wins() {
        let buckets = vec![
            LengthBucket {
                name: "short".to_string(),
                min_chars: 0,
                max_chars: 100,
                percentage: 0.5,
            },
            LengthBucket {
                name: "all".to_string(),
                min_chars: 0,
                max_chars: usize::MAX,
                percentage: 0.5,
            },
        ];
        assert_eq!(assign_length_bucket(50, &buckets), Some("short"));
        assert_eq!(assign_length_bucket(500, &buckets), Some("all"));
        assert_eq!(assign_length_bucket(50, &[]), None);
    }

    #[test]
    fn test_extract_sample_happy_path() {
        let text = "Prva rečenica ovde. Druga rečenica sledi. Treća rečenica. \
                    Četvrta rečenica. Peta rečenica na kraju.";
        let config = ExtractionConfig {
            min_sentences: 2,
            max_sentences: 3,
            ..ExtractionConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let sample = extract_sample(&doc(text), &config, &HashMap::new(), &mut rng).unwrap();
        assert_eq!(sample.label, "sr");
        assert_eq!(sample.source, "example.com");
        assert_eq!(sample.source_doc_id.as_deref(), Some("doc-1"));
        assert_eq!(sample.length, sample.text.chars().count());
        // The span is contiguous text from the document.
        assert!(text.contains(sample.text.split(' ').next().unwrap()));
    }

    #[test]
    fn test_extract_sample_too_few_units() {
        let config = ExtractionConfig {
            min_sentences: 3,
            ..ExtractionConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert!(extract_sample(&doc("Jedna. Dve."), &config, &HashMap::new(), &mut rng).is_none());
    }

    #[test]
    fn test_extract_sample_label_mapping_overrides() {
        let config = ExtractionConfig {
            min_sentences: 1,
            max_sentences: 2,
            ..ExtractionConfig::default()
        };
        let mapping = HashMap::from([("example.com".to_string(), "sr-lat".to_string())]);
        let mut rng = StdRng::seed_from_u64(7);
        let sample =
            extract_sample(&doc("Neka rečenica. Još jedna."), &config, &mapping, &mut rng)
                .unwrap();
        assert_eq!(sample.label, "sr-lat");
    }

    #[test]
    fn test_extract_sample_no_label_rejects() {
        let config = ExtractionConfig {
            min_sentences: 1,
            ..ExtractionConfig::default()
        };
        let mut document = doc("Neka rečenica. Još jedna.");
        document.language = None;
        let mut rng = StdRng::seed_from_u64(7);
        assert!(extract_sample(&document, &config, &HashMap::new(), &mut rng).is_none());
    }

    #[test]
    fn test_extract_sample_bucket_miss_rejects() {
        let config = ExtractionConfig {
            min_sentences: 1,
            length_buckets: vec![LengthBucket {
                name: "tiny".to_string(),
                min_chars: 0,
                max_chars: 3,
                percentage: 1.0,
            }],
            ..ExtractionConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert!(
            extract_sample(&doc("Duga rečenica preko tri znaka. Još."), &config, &HashMap::new(), &mut rng)
                .is_none()
        );
    }

    #[test]
    fn test_sample_quality_rejects() {
        let quality = SampleQualityConfig {
            min_words: 2,
            reject_if_contains: vec!["spam".to_string()],
            max_digit_ratio: Some(0.3),
            ..SampleQualityConfig::default()
        };
        assert!(passes_sample_quality("dobar tekst", &quality));
        assert!(!passes_sample_quality("kratko", &quality));
        assert!(!passes_sample_quality("ovo je spam tekst", &quality));
        assert!(!passes_sample_quality("12345 67890 1", &quality));
    }

    #[test]
    fn test_balance_languages_equalizes_to_minimum() {
        let mut samples = Vec::new();
        for _ in 0..10 {
            samples.push(sample("en", "a.com", None));
        }
        for _ in 0..4 {
            samples.push(sample("sr", "b.com", None));
        }
        let balanced = balance_languages(samples);
        let en = balanced.iter().filter(|s| s.label == "en").count();
        let sr = balanced.iter().filter(|s| s.label == "sr").count();
        assert_eq!(en, 4);
        assert_eq!(sr, 4);
    }

    #[test]
    fn test_balance_sources_within_label() {
        let mut samples = Vec::new();
        for _ in 0..6 {
            samples.push(sample("sr", "a.com", None));
        }
        for _ in 0..2 {
            samples.push(sample("sr", "b.com", None));
        }
        for _ in 0..5 {
            samples.push(sample("en", "c.com", None));
        }
        let balanced = balance_sources(samples);
        let a = balanced.iter().filter(|s| s.source == "a.com").count();
        let b = balanced.iter().filter(|s| s.source == "b.com").count();
        let c = balanced.iter().filter(|s| s.source == "c.com").count();
        assert_eq!((a, b), (2, 2));
        // en has a single source, so it keeps everything.
        assert_eq!(c, 5);
    }

    #[test]
    fn test_balance_lengths_applies_percentages() {
        let buckets = vec![
            LengthBucket {
                name: "short".to_string(),
                min_chars: 0,
                max_chars: 100,
                percentage: 0.5,
            },
            LengthBucket {
                name: "long".to_string(),
                min_chars: 101,
                max_chars: usize::MAX,
                percentage: 0.5,
            },
        ];
        let mut samples = Vec::new();
        for _ in 0..8 {
            samples.push(sample("sr", "a.com", Some("short")));
        }
        for _ in 0..2 {
            samples.push(sample("sr", "a.com", Some("long")));
        }
        let balanced = balance_lengths(samples, &buckets);
        let short = balanced.iter().filter(|s| s.length_bucket.as_deref() == Some("short")).count();
        let long = balanced.iter().filter(|s| s.length_bucket.as_deref() == Some("long")).count();
        // total 10 per label → target 5 per bucket, capped by availability.
        assert_eq!(short, 5);
        assert_eq!(long, 2);
    }

    #[test]
    fn test_apply_balancing_languages_only() {
        let mut samples = Vec::new();
        for _ in 0..10 {
            samples.push(sample("en", "a.com", None));
        }
        for _ in 0..4 {
            samples.push(sample("sr", "b.com", None));
        }
        let balancing = BalancingConfig {
            balance_languages: true,
            ..BalancingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        let balanced = apply_balancing(samples, &balancing, &[], &mut rng);
        assert_eq!(balanced.len(), 8);
        assert_eq!(balanced.iter().filter(|s| s.label == "en").count(), 4);
        assert_eq!(balanced.iter().filter(|s| s.label == "sr").count(), 4);
    }

    #[test]
    fn test_apply_balancing_deterministic_for_seed() {
        let build = || {
            let mut samples = Vec::new();
            for i in 0..20 {
                let label = if i % 3 == 0 { "sr" } else { "en" };
                let mut s = sample(label, "a.com", None);
                s.id = format!("s{i}");
                samples.push(s);
            }
            samples
        };
        let balancing = BalancingConfig {
            balance_languages: true,
            ..BalancingConfig::default()
        };
        let run = |samples: Vec<Sample>| {
            let mut rng = StdRng::seed_from_u64(1234);
            apply_balancing(samples, &balancing, &[], &mut rng)
                .into_iter()
                .map(|s| s.id)
                .collect::<Vec<_>>()
        };
        let first = run(build());
        let second = run(build());
        assert_eq!(first, second);
        let distinct: HashSet<&String> = first.iter().collect();
        assert_eq!(distinct.len(), first.len());
    }
}
