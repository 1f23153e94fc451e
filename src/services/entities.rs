//! Named-entity detection.
//!
//! The classifier only needs to know whether a text mentions *any* named
//! entity, so the recognizer sits behind a small trait. The built-in
//! [`RuleRecognizer`] is a rule-based tagger:
//!
//! - `Name`: capitalized words that do not merely start a sentence, and
//!   runs of two or more capitalized words anywhere
//! - `Acronym`: all-caps tokens of two or more letters
//! - `Quantity`: numbers, prices and amounts

use std::sync::LazyLock;

use regex::Regex;

static TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'’\-]*").ok());

const NOT_ACRONYMS: &[&str] = &["OK", "LOL", "OMG"];

/// Kind of entity a span was tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLabel {
    Name,
    Acronym,
    Quantity,
}

/// Byte range of a recognized entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub label: EntityLabel,
}

impl EntitySpan {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Extracts named-entity spans from free text.
pub trait EntityRecognizer: Send + Sync {
    fn entities(&self, text: &str) -> Vec<EntitySpan>;

    fn has_entity(&self, text: &str) -> bool {
        !self.entities(text).is_empty()
    }
}

/// Rule-based recognizer for mixed-case Latin-script text.
#[derive(Debug, Default, Clone)]
pub struct RuleRecognizer;

struct Token<'a> {
    start: usize,
    end: usize,
    text: &'a str,
    sentence_start: bool,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let Some(token) = TOKEN.as_ref() else {
        return tokens;
    };
    let mut last_end = 0;
    for m in token.find_iter(text) {
        let gap = &text[last_end..m.start()];
        let sentence_start = tokens.is_empty()
            || gap.contains(['.', '!', '?', '\n'])
            || gap.trim().ends_with(':');
        tokens.push(Token {
            start: m.start(),
            end: m.end(),
            text: m.as_str(),
            sentence_start,
        });
        last_end = m.end();
    }
    tokens
}

fn is_quantity(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn is_acronym(token: &str) -> bool {
    let letters = token.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2
        && token.chars().all(|c| !c.is_lowercase())
        && !NOT_ACRONYMS.contains(&token)
}

fn is_capitalized(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next().is_some_and(|c| c.is_uppercase()) && chars.any(|c| c.is_lowercase())
}

impl EntityRecognizer for RuleRecognizer {
    fn entities(&self, text: &str) -> Vec<EntitySpan> {
        let tokens = tokenize(text);
        let mut spans = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];

            if is_quantity(token.text) {
                spans.push(EntitySpan {
                    start: token.start,
                    end: token.end,
                    label: EntityLabel::Quantity,
                });
                i += 1;
                continue;
            }
            if is_acronym(token.text) {
                spans.push(EntitySpan {
                    start: token.start,
                    end: token.end,
                    label: EntityLabel::Acronym,
                });
                i += 1;
                continue;
            }
            if is_capitalized(token.text) {
                // Extend over following capitalized words on the same line.
                let mut j = i + 1;
                while j < tokens.len()
                    && is_capitalized(tokens[j].text)
                    && text[tokens[j - 1].end..tokens[j].start].trim().is_empty()
                    && !tokens[j].sentence_start
                {
                    j += 1;
                }
                let run = j - i;
                if run > 1 || !token.sentence_start {
                    spans.push(EntitySpan {
                        start: token.start,
                        end: tokens[j - 1].end,
                        label: EntityLabel::Name,
                    });
                }
                i = j;
                continue;
            }
            i += 1;
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(text: &str) -> Vec<(String, EntityLabel)> {
        RuleRecognizer
            .entities(text)
            .into_iter()
            .map(|span| (span.text(text).to_string(), span.label))
            .collect()
    }

    #[test]
    fn lowercase_chatter_has_no_entities() {
        assert!(!RuleRecognizer.has_entity("looking for clean batches, dm me"));
        assert!(!RuleRecognizer.has_entity(""));
    }

    #[test]
    fn sentence_initial_word_alone_is_not_a_name() {
        assert!(!RuleRecognizer.has_entity("Hello there. Anyone around?"));
    }

    #[test]
    fn mid_sentence_capitals_are_names() {
        assert_eq!(
            labelled("meet me in Berlin tonight"),
            vec![("Berlin".to_string(), EntityLabel::Name)]
        );
    }

    #[test]
    fn capitalized_runs_merge() {
        assert_eq!(
            labelled("New York shipping only"),
            vec![("New York".to_string(), EntityLabel::Name)]
        );
    }

    #[test]
    fn acronyms_and_quantities() {
        assert_eq!(
            labelled("clean MDMA, 50 per gram"),
            vec![
                ("MDMA".to_string(), EntityLabel::Acronym),
                ("50".to_string(), EntityLabel::Quantity),
            ]
        );
    }

    #[test]
    fn chat_acronyms_are_ignored() {
        assert!(!RuleRecognizer.has_entity("ok OK lol"));
    }
}
