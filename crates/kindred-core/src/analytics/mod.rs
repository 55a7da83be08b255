//! Engagement analytics: lexicon sentiment, topic detection and the
//! per-conversation aggregator.

pub mod aggregator;
pub mod repository;
pub mod sentiment;
pub mod topics;

/// Lowercased words of `text`, split on anything that is not alphanumeric or
/// an apostrophe.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}
