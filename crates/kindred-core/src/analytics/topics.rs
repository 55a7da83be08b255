//! Keyword topic detection over a configurable lexicon.

use std::collections::{BTreeMap, BTreeSet};

use super::words;

/// Matches message words against topic keywords.
///
/// A keyword matches a whole word or its plural with a trailing "s".
#[derive(Debug, Clone)]
pub struct TopicDetector {
    topics: BTreeMap<String, Vec<String>>,
}

impl TopicDetector {
    pub fn new(topics: &BTreeMap<String, Vec<String>>) -> Self {
        let topics = topics
            .iter()
            .map(|(topic, keywords)| {
                (
                    topic.clone(),
                    keywords.iter().map(|k| k.to_lowercase()).collect(),
                )
            })
            .collect();
        Self { topics }
    }

    /// Size of the lexicon.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Topics mentioned in `text`, in name order.
    pub fn detect(&self, text: &str) -> BTreeSet<String> {
        let words = words(text);
        self.topics
            .iter()
            .filter(|(_, keywords)| {
                words.iter().any(|w| {
                    keywords
                        .iter()
                        .any(|k| w == k || w.strip_suffix('s') == Some(k.as_str()))
                })
            })
            .map(|(topic, _)| topic.clone())
            .collect()
    }
}
