//! Configuration types for Kindred.
//!
//! `KindredConfig` is the top-level `config.toml`. Every section and field
//! has a default, so an empty file (or no file at all) yields a working setup.
//! Stage labels, thresholds and intimacy weighting are all tunable here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from `~/.kindred/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KindredConfig {
    pub progression: ProgressionConfig,
    pub context: ContextConfig,
    pub orchestrator: OrchestratorConfig,
    pub analytics: AnalyticsConfig,
    pub validation: ValidationConfig,
}

/// One rung of the relationship ladder.
///
/// A pair reaches this stage once both its intimacy level and its message
/// count meet the minimums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,
    pub min_intimacy: u32,
    #[serde(default)]
    pub min_messages: u32,
    /// Tone hint handed to the model while the pair is at this stage.
    #[serde(default)]
    pub guidance: String,
}

impl StageDefinition {
    pub fn new(name: &str, min_intimacy: u32, min_messages: u32, guidance: &str) -> Self {
        Self {
            name: name.to_string(),
            min_intimacy,
            min_messages,
            guidance: guidance.to_string(),
        }
    }
}

/// Relationship progression tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Ordered stages, lowest first. The first stage must start at zero.
    pub stages: Vec<StageDefinition>,
    /// Upper bound of the intimacy level.
    pub max_intimacy: u32,
    /// Intimacy gained by every qualifying exchange.
    pub base_delta: u32,
    /// Extra intimacy for exchanges whose quality or sentiment clears a threshold.
    pub bonus_delta: u32,
    pub quality_bonus_threshold: f32,
    pub sentiment_bonus_threshold: f32,
    /// User text at or below this many characters (trimmed) earns no intimacy.
    pub degenerate_max_chars: usize,
    /// Idle days before decay starts.
    pub decay_grace_days: i64,
    /// Intimacy lost per idle day past the grace period.
    pub decay_per_day: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            stages: vec![
                StageDefinition::new(
                    "acquaintance",
                    0,
                    0,
                    "You are just getting to know each other. Be warm, curious and a little reserved.",
                ),
                StageDefinition::new(
                    "friend",
                    10,
                    8,
                    "You are friends. Be relaxed, playful and reference things you have talked about.",
                ),
                StageDefinition::new(
                    "close",
                    30,
                    25,
                    "You are close. Be open about feelings and follow up on what matters to them.",
                ),
                StageDefinition::new(
                    "intimate",
                    60,
                    60,
                    "You share a deep bond. Be affectionate, attentive and emotionally present.",
                ),
            ],
            max_intimacy: 100,
            base_delta: 1,
            bonus_delta: 1,
            quality_bonus_threshold: 0.75,
            sentiment_bonus_threshold: 0.6,
            degenerate_max_chars: 1,
            decay_grace_days: 7,
            decay_per_day: 1,
        }
    }
}

/// Prompt assembly tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Token budget for the whole prompt, system segment included.
    pub max_tokens: u32,
    /// How many recent messages to load before budgeting.
    pub history_window: u32,
    /// Characters per token used by the estimator.
    pub chars_per_token: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4_000,
            history_window: 60,
            chars_per_token: 4,
        }
    }
}

/// Provider call tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: Option<f64>,
    /// Hard timeout for a single completion attempt.
    pub request_timeout_ms: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Timeout for the secondary quality-scoring call.
    pub quality_timeout_ms: u64,
    pub quality_scoring: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_output_tokens: 512,
            temperature: Some(0.8),
            request_timeout_ms: 20_000,
            max_retries: 2,
            backoff_base_ms: 250,
            backoff_max_ms: 4_000,
            quality_timeout_ms: 5_000,
            quality_scoring: true,
        }
    }
}

/// Engagement analytics tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Idle gap that closes a session.
    pub session_gap_minutes: i64,
    /// Number of sentiment points kept per record.
    pub sentiment_window: usize,
    pub preferred_topic_count: usize,
    /// Topic name to trigger keywords.
    pub topics: BTreeMap<String, Vec<String>>,
    /// Phrases that mark a user message as self-disclosing.
    pub vulnerability_markers: Vec<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        let topics = [
            ("work", &["work", "job", "boss", "office", "career", "meeting", "project"][..]),
            ("family", &["family", "mom", "dad", "mother", "father", "sister", "brother", "kids"][..]),
            ("music", &["music", "song", "album", "concert", "band", "guitar", "playlist"][..]),
            ("movies", &["movie", "film", "cinema", "series", "episode", "show"][..]),
            ("travel", &["travel", "trip", "flight", "vacation", "beach", "city", "abroad"][..]),
            ("food", &["food", "cook", "dinner", "lunch", "recipe", "restaurant", "coffee"][..]),
            ("health", &["health", "gym", "workout", "run", "sleep", "tired", "doctor"][..]),
            ("books", &["book", "novel", "read", "reading", "author", "story"][..]),
            ("games", &["game", "gaming", "play", "console", "level", "quest"][..]),
            ("feelings", &["feel", "feeling", "lonely", "happy", "sad", "anxious", "love"][..]),
        ]
        .into_iter()
        .map(|(topic, words)| {
            (
                topic.to_string(),
                words.iter().map(|w| w.to_string()).collect(),
            )
        })
        .collect();

        Self {
            session_gap_minutes: 30,
            sentiment_window: 20,
            preferred_topic_count: 3,
            topics,
            vulnerability_markers: [
                "i feel",
                "i'm scared",
                "i am scared",
                "honestly",
                "to be honest",
                "i've never told",
                "i never told",
                "lonely",
                "i'm afraid",
                "i struggle",
                "i miss",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Inbound message limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub max_text_chars: usize,
    pub max_media_ref_chars: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 4_000,
            max_media_ref_chars: 512,
        }
    }
}
