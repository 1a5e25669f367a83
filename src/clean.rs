//! Document cleaning, normalization, and quality gates.
//!
//! Cleaning happens between extraction and deduplication: boilerplate
//! patterns are cut, personal data is masked, Unicode and typography are
//! normalized, and documents failing the quality gates are dropped (with
//! the drop logged by the caller). Dedup hashes the *cleaned* text, so this
//! stage also decides what counts as "identical".

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::config::{CleaningConfig, QualityConfig};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\+\d{3}|0)\d{8,10}\b").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse all whitespace runs to single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

/// Map typographic double quotes to ASCII.
pub fn normalize_quotes(text: &str) -> String {
    text.replace(['\u{201c}', '\u{201d}', '\u{201e}'], "\"")
}

/// Map en/em dashes to ASCII hyphens.
pub fn normalize_dashes(text: &str) -> String {
    text.replace(['\u{2013}', '\u{2014}'], "-")
}

/// Whitespace-delimited word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Share of characters that are ASCII digits.
pub fn digit_ratio(text: &str) -> f64 {
    ratio_of(text, |c| c.is_ascii_digit())
}

/// Share of characters that are neither alphanumeric nor whitespace.
pub fn special_char_ratio(text: &str) -> f64 {
    ratio_of(text, |c| !c.is_alphanumeric() && !c.is_whitespace())
}

/// Share of characters that are ASCII punctuation.
pub fn punctuation_ratio(text: &str) -> f64 {
    ratio_of(text, |c| c.is_ascii_punctuation())
}

fn ratio_of(text: &str, predicate: impl Fn(char) -> bool) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let hits = text.chars().filter(|&c| predicate(c)).count();
    hits as f64 / total as f64
}

/// Whether the text contains an email address or phone number.
pub fn contains_pii(text: &str) -> bool {
    EMAIL_RE.is_match(text) || PHONE_RE.is_match(text)
}

/// Mask emails and phone numbers with placeholder tokens.
pub fn anonymize_text(text: &str) -> String {
    let text = EMAIL_RE.replace_all(text, "[EMAIL]");
    PHONE_RE.replace_all(&text, "[PHONE]").into_owned()
}

/// Remove configured boilerplate substrings and mask personal data.
pub fn clean_document(text: &str, config: &CleaningConfig) -> String {
    let mut text = text.to_string();
    for pattern in &config.exclude_patterns {
        if !pattern.is_empty() {
            text = text.replace(pattern.as_str(), "");
        }
    }
    if contains_pii(&text) {
        text = anonymize_text(&text);
    }
    text.trim().to_string()
}

/// Unicode + typography + whitespace normalization.
pub fn normalize_document(text: &str, config: &CleaningConfig) -> String {
    let mut text: String = if config.unicode_normalization.eq_ignore_ascii_case("nfkc") {
        text.nfkc().collect()
    } else {
        text.nfc().collect()
    };
    if config.normalize_quotes {
        text = normalize_quotes(&text);
    }
    if config.normalize_dashes {
        text = normalize_dashes(&text);
    }
    if config.normalize_whitespace {
        text = normalize_whitespace(&text);
    }
    text
}

/// Whole-document quality gates: length, word count, digit and
/// special-character ratios.
pub fn passes_quality_checks(
    text: &str,
    cleaning: &CleaningConfig,
    quality: &QualityConfig,
) -> bool {
    if text.is_empty() {
        return false;
    }
    let length = text.chars().count();
    if length < cleaning.min_length || length > cleaning.max_length {
        return false;
    }
    let words = word_count(text);
    if words < quality.min_words_per_document || words > quality.max_words_per_document {
        return false;
    }
    if let Some(max_digit) = quality.max_digit_ratio {
        if digit_ratio(text) > max_digit {
            return false;
        }
    }
    if let Some(max_special) = quality.max_special_char_ratio {
        if special_char_ratio(text) > max_special {
            return false;
        }
    }
    true
}
