//! CompanionModel trait definition.
//!
//! The abstraction every language-model backend implements. Uses RPITIT like
//! the repository traits. Implementations live in kindred-infra (e.g.,
//! `AnthropicModel`).

use kindred_types::llm::{ModelParams, PromptSegment, ProviderError, QualityProbe};

/// A prompt-in/text-out language model.
pub trait CompanionModel: Send + Sync {
    /// Human-readable backend name (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Generate a reply for the ordered prompt segments.
    fn complete(
        &self,
        segments: &[PromptSegment],
        params: &ModelParams,
    ) -> impl std::future::Future<Output = Result<String, ProviderError>> + Send;

    /// Rate a finished exchange in `[0.0, 1.0]`.
    fn score_quality(
        &self,
        probe: &QualityProbe,
    ) -> impl std::future::Future<Output = Result<f32, ProviderError>> + Send;
}
