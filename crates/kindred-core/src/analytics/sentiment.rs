//! Lexicon sentiment analysis.
//!
//! Counts positive and negative words, flipping a word's polarity when one of
//! the two preceding words is a negator. The score is the polarity balance
//! damped for messages with fewer than three sentiment words.

use kindred_types::chat::{Sentiment, SentimentLabel};

use super::words;

const POSITIVE: &[&str] = &[
    "love", "loved", "lovely", "like", "liked", "happy", "glad", "great", "good", "nice",
    "awesome", "amazing", "wonderful", "fun", "excited", "exciting", "beautiful", "best",
    "thanks", "thank", "enjoy", "enjoyed", "cool", "sweet", "proud", "calm", "hope",
    "laugh", "smile", "fantastic", "perfect", "cute", "yay", "haha",
];

const NEGATIVE: &[&str] = &[
    "hate", "hated", "sad", "angry", "upset", "bad", "awful", "terrible", "horrible",
    "lonely", "tired", "bored", "boring", "worried", "anxious", "scared", "afraid", "hurt",
    "cry", "crying", "stress", "stressed", "annoyed", "annoying", "worst", "sick", "miss",
    "alone", "depressed", "ugh",
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "don't", "didn't", "isn't", "wasn't", "can't", "won't", "hardly",
    "dont", "didnt", "isnt", "cant", "wont",
];

/// Score above which a message counts as positive (and below the negation
/// of which it counts as negative).
const LABEL_THRESHOLD: f32 = 0.2;

#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, text: &str) -> Sentiment {
        let words = words(text);
        let (mut positive, mut negative) = (0u32, 0u32);

        for (i, word) in words.iter().enumerate() {
            let polarity = if POSITIVE.contains(&word.as_str()) {
                1
            } else if NEGATIVE.contains(&word.as_str()) {
                -1
            } else {
                continue;
            };
            let negated = words[i.saturating_sub(2)..i]
                .iter()
                .any(|w| NEGATORS.contains(&w.as_str()));
            match (polarity, negated) {
                (1, false) | (-1, true) => positive += 1,
                _ => negative += 1,
            }
        }

        let total = positive + negative;
        if total == 0 {
            return Sentiment::default();
        }

        let balance = (positive as f32 - negative as f32) / total as f32;
        let score = (balance * total.min(3) as f32 / 3.0).clamp(-1.0, 1.0);
        let label = if score > LABEL_THRESHOLD {
            SentimentLabel::Positive
        } else if score < -LABEL_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };
        Sentiment { label, score }
    }
}
