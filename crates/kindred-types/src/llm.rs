//! Provider-facing types: prompt segments, model parameters, replies and errors.
//!
//! The provider itself is a black box with a prompt-in/text-out contract;
//! these types are the provider-agnostic side of that contract.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chat::Sentiment;

/// Role of a prompt segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentRole {
    System,
    User,
    Companion,
}

impl fmt::Display for SegmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentRole::System => write!(f, "system"),
            SegmentRole::User => write!(f, "user"),
            SegmentRole::Companion => write!(f, "companion"),
        }
    }
}

/// One ordered piece of the prompt sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSegment {
    pub role: SegmentRole,
    pub content: String,
    pub token_estimate: u32,
}

/// Generation parameters passed through to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// The exchange handed to the quality scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProbe {
    pub user_text: String,
    pub reply_text: String,
    pub stage: String,
}

/// A reply produced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReply {
    pub text: String,
    pub sentiment: Sentiment,
    /// Absent when quality scoring failed or is disabled.
    pub quality_score: Option<f32>,
    /// Completion attempts made, including the successful one.
    pub attempts: u32,
    pub latency_ms: u64,
}

/// Errors from provider calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider call timed out after {0}ms")]
    Timeout(u64),

    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("provider returned an empty reply")]
    EmptyReply,
}

impl ProviderError {
    /// Whether a retry might succeed.
    ///
    /// Network failures, timeouts, rate limits, 5xx statuses and empty replies
    /// are transient. 4xx statuses and explicit rejections are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout(_)
            | ProviderError::RateLimited { .. }
            | ProviderError::EmptyReply => true,
            ProviderError::Status { status, .. } => *status >= 500 || *status == 408,
            ProviderError::Rejected(_) | ProviderError::Deserialization(_) => false,
        }
    }
}
