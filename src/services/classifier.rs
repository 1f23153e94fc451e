// src/services/classifier.rs

//! Message content classification.
//!
//! A message is flagged when any one of three independent signals fires:
//!
//! 1. a keyword appears verbatim (case-insensitive)
//! 2. a keyword fuzzily matches part of the text above the threshold
//! 3. the text contains any named entity at all, regardless of keywords
//!
//! Signal 3 trades precision for recall and can be switched off through
//! `classifier.entity_signal`.

use std::fmt;
use std::sync::Arc;

use crate::models::{ClassifierConfig, Keywords};
use crate::services::entities::{EntityRecognizer, RuleRecognizer};
use crate::services::fuzzy::partial_ratio;

/// Which classifier signal matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Keyword,
    Fuzzy,
    Entity,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::Keyword => "keyword",
            Signal::Fuzzy => "fuzzy",
            Signal::Entity => "entity",
        };
        f.write_str(name)
    }
}

/// Case-insensitive substring containment of any keyword.
pub fn contains_keywords(text: &str, keywords: &Keywords) -> bool {
    let text = text.to_lowercase();
    keywords
        .iter()
        .any(|keyword| text.contains(&keyword.to_lowercase()))
}

/// Fuzzy partial similarity of any keyword strictly above `threshold`.
pub fn fuzzy_contains_keywords(text: &str, keywords: &Keywords, threshold: u8) -> bool {
    keywords
        .iter()
        .any(|keyword| partial_ratio(keyword, text) > threshold)
}

/// OR-composition of the three signals.
#[derive(Clone)]
pub struct ContentClassifier {
    fuzzy_threshold: u8,
    recognizer: Option<Arc<dyn EntityRecognizer>>,
}

impl ContentClassifier {
    /// Classifier with an explicit recognizer (`None` disables signal 3).
    pub fn new(fuzzy_threshold: u8, recognizer: Option<Arc<dyn EntityRecognizer>>) -> Self {
        Self {
            fuzzy_threshold,
            recognizer,
        }
    }

    /// Classifier using the rule-based recognizer when enabled in config.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let recognizer = config
            .entity_signal
            .then(|| Arc::new(RuleRecognizer) as Arc<dyn EntityRecognizer>);
        Self::new(config.fuzzy_threshold, recognizer)
    }

    /// First signal that fires for `text`, checked cheapest first.
    pub fn matching_signal(&self, text: &str, keywords: &Keywords) -> Option<Signal> {
        if text.trim().is_empty() {
            return None;
        }
        if contains_keywords(text, keywords) {
            return Some(Signal::Keyword);
        }
        if fuzzy_contains_keywords(text, keywords, self.fuzzy_threshold) {
            return Some(Signal::Fuzzy);
        }
        match &self.recognizer {
            Some(recognizer) if recognizer.has_entity(text) => Some(Signal::Entity),
            _ => None,
        }
    }

    pub fn classify(&self, text: &str, keywords: &Keywords) -> bool {
        self.matching_signal(text, keywords).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::entities::EntitySpan;

    /// Recognizer with a fixed answer.
    struct Always(bool);

    impl EntityRecognizer for Always {
        fn entities(&self, text: &str) -> Vec<EntitySpan> {
            if self.0 {
                vec![EntitySpan {
                    start: 0,
                    end: text.len(),
                    label: crate::services::entities::EntityLabel::Name,
                }]
            } else {
                Vec::new()
            }
        }
    }

    fn classifier(entities: bool) -> ContentClassifier {
        ContentClassifier::new(70, Some(Arc::new(Always(entities))))
    }

    #[test]
    fn verbatim_keyword_wins_regardless_of_other_signals() {
        let keywords = Keywords::new(["mdma"]);
        let text = "looking for clean MDMA batches";
        assert!(classifier(false).classify(text, &keywords));
        assert_eq!(
            classifier(true).matching_signal(text, &keywords),
            Some(Signal::Keyword)
        );
    }

    #[test]
    fn fuzzy_alone_is_enough() {
        let keywords = Keywords::new(["mdma"]);
        assert_eq!(
            classifier(false).matching_signal("fresh mdna in stock", &keywords),
            Some(Signal::Fuzzy)
        );
    }

    #[test]
    fn entity_alone_is_enough_and_ignores_keywords() {
        let keywords = Keywords::new(["cocaine"]);
        assert_eq!(
            classifier(true).matching_signal("weather is nice today", &keywords),
            Some(Signal::Entity)
        );
    }

    #[test]
    fn no_signal_means_negative() {
        let keywords = Keywords::new(["cocaine"]);
        assert!(!classifier(false).classify("weather is nice today", &keywords));
    }

    #[test]
    fn empty_text_is_never_flagged() {
        let keywords = Keywords::new(["a"]);
        assert!(!classifier(true).classify("   ", &keywords));
    }

    #[test]
    fn config_can_disable_entity_signal() {
        let keywords = Keywords::new(["cocaine"]);
        let config = ClassifierConfig {
            fuzzy_threshold: 70,
            entity_signal: false,
        };
        let strict = ContentClassifier::from_config(&config);
        assert!(!strict.classify("meet me in Berlin tonight", &keywords));

        let lenient = ContentClassifier::from_config(&ClassifierConfig::default());
        assert!(lenient.classify("meet me in Berlin tonight", &keywords));
    }
}
