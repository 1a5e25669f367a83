//! Language validation against an injected classifier.
//!
//! The classifier itself (a fastText-style model, an API, anything that can
//! do `predict(text) → (label, confidence)`) is out of scope; the pipeline
//! sees only the [`LanguageClassifier`] trait. Construction and teardown of
//! the model happen once at the pipeline boundary — no lazy global loading.
//!
//! Validation is deliberately conservative: a document is rejected only
//! when the classifier *confidently disagrees* with the language tag its
//! source was configured with. Absent classifier, absent capability, or an
//! indecisive prediction all let the document through.

use tracing::{debug, warn};

use crate::config::LanguageAssignmentConfig;
use crate::models::Document;

/// Capability: predict the language of a text with a confidence score.
pub trait LanguageClassifier: Send + Sync {
    /// `None` when the classifier cannot produce a prediction.
    fn predict(&self, text: &str) -> Option<(String, f64)>;
}

/// Whether `document` passes language validation.
///
/// With validation disabled this always passes. With validation enabled but
/// no classifier injected, the stage degrades to a pass with a warning
/// (once per call site is fine; runs configure this once).
pub fn validate_language(
    document: &Document,
    config: &LanguageAssignmentConfig,
    classifier: Option<&dyn LanguageClassifier>,
) -> bool {
    if !config.use_classifier_validation {
        return true;
    }
    let Some(classifier) = classifier else {
        warn!("language validation enabled but no classifier available; skipping");
        return true;
    };
    if document.text.is_empty() {
        return false;
    }

    let flattened = document.text.replace('\n', " ");
    let Some((predicted, confidence)) = classifier.predict(&flattened) else {
        return false;
    };
    let expected = document.language.as_deref().unwrap_or("");
    if predicted != expected && confidence >= config.min_confidence_for_override {
        debug!(
            url = %document.url,
            expected,
            predicted,
            confidence,
            "classifier override rejects document"
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClassifier {
        label: &'static str,
        confidence: f64,
    }

    impl LanguageClassifier for FixedClassifier {
        fn predict(&self, _text: &str) -> Option<(String, f64)> {
            Some((self.label.to_string(), self.confidence))
        }
    }

    struct SilentClassifier;

    impl LanguageClassifier for SilentClassifier {
        fn predict(&self, _text: &str) -> Option<(String, f64)> {
            None
        }
    }

    fn doc(language: &str) -> Document {
        Document {
            text: "Neki tekst na srpskom jeziku.".to_string(),
            title: None,
            date: None,
            url: "https://example.com/a".to_string(),
            source: "example.com".to_string(),
            language: Some(language.to_string()),
            domain: None,
            id: None,
        }
    }

    fn enabled() -> LanguageAssignmentConfig {
        LanguageAssignmentConfig {
            use_classifier_validation: true,
            min_confidence_for_override: 0.95,
        }
    }

    #[test]
    fn test_disabled_validation_passes() {
        let config = LanguageAssignmentConfig::default();
        assert!(validate_language(&doc("sr"), &config, None));
    }

    #[test]
    fn test_missing_classifier_degrades_to_pass() {
        assert!(validate_language(&doc("sr"), &enabled(), None));
    }

    #[test]
    fn test_agreeing_prediction_passes() {
        let classifier = FixedClassifier { label: "sr", confidence: 0.99 };
        assert!(validate_language(&doc("sr"), &enabled(), Some(&classifier)));
    }

    #[test]
    fn test_confident_disagreement_rejects() {
        let classifier = FixedClassifier { label: "hr", confidence: 0.99 };
        assert!(!validate_language(&doc("sr"), &enabled(), Some(&classifier)));
    }

    #[test]
    fn test_unconfident_disagreement_passes() {
        let classifier = FixedClassifier { label: "hr", confidence: 0.6 };
        assert!(validate_language(&doc("sr"), &enabled(), Some(&classifier)));
    }

    #[test]
    fn test_no_prediction_rejects() {
        assert!(!validate_language(&doc("sr"), &enabled(), Some(&SilentClassifier)));
    }

    #[test]
    fn test_empty_text_rejects() {
        let mut document = doc("sr");
        document.text.clear();
        let classifier = FixedClassifier { label: "sr", confidence: 0.99 };
        assert!(!validate_language(&document, &enabled(), Some(&classifier)));
    }
}
