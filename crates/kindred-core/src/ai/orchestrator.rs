//! Reply orchestration: provider call with timeout, retries and backoff,
//! followed by best-effort quality scoring.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kindred_types::config::OrchestratorConfig;
use kindred_types::llm::{
    GeneratedReply, ModelParams, PromptSegment, ProviderError, QualityProbe, SegmentRole,
};
use kindred_types::pipeline::ReplyFailure;
use tracing::{debug, info, warn};

use super::backoff::BackoffPolicy;
use super::provider::CompanionModel;
use crate::analytics::sentiment::SentimentAnalyzer;

/// Drives one reply through the provider.
///
/// Cheap to share: the coordinator holds it in an `Arc` so the provider call
/// can run in its own task.
pub struct ReplyOrchestrator<M: CompanionModel> {
    model: Arc<M>,
    config: OrchestratorConfig,
    backoff: BackoffPolicy,
    sentiment: SentimentAnalyzer,
}

impl<M: CompanionModel> ReplyOrchestrator<M> {
    pub fn new(model: Arc<M>, config: OrchestratorConfig) -> Self {
        let backoff = BackoffPolicy::from_config(&config);
        Self {
            model,
            config,
            backoff,
            sentiment: SentimentAnalyzer::new(),
        }
    }

    pub fn params(&self) -> ModelParams {
        ModelParams {
            model: self.config.model.clone(),
            max_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Generate, analyse and score a reply for the assembled context.
    ///
    /// Transient failures are retried up to `max_retries` times; anything else
    /// fails immediately. Quality scoring never fails the reply.
    pub async fn generate_reply(
        &self,
        segments: &[PromptSegment],
        stage: &str,
    ) -> Result<GeneratedReply, ReplyFailure> {
        let started = Instant::now();
        let params = self.params();
        let timeout_ms = self.config.request_timeout_ms;
        let mut attempts = 0u32;

        let text = loop {
            attempts += 1;
            let result = match tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                self.model.complete(segments, &params),
            )
            .await
            {
                Ok(Ok(text)) if text.trim().is_empty() => Err(ProviderError::EmptyReply),
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout_ms)),
            };

            match result {
                Ok(text) => break text.trim().to_string(),
                Err(err) if !err.is_transient() => {
                    warn!(provider = self.model.name(), error = %err, "provider rejected request");
                    return Err(ReplyFailure::ProviderRejected {
                        reason: err.to_string(),
                    });
                }
                Err(err) if attempts > self.config.max_retries => {
                    warn!(
                        provider = self.model.name(),
                        attempts,
                        error = %err,
                        "provider retries exhausted"
                    );
                    return Err(ReplyFailure::ProviderUnavailable {
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    let delay = self.backoff.delay_for(attempts - 1, &err);
                    debug!(
                        provider = self.model.name(),
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };

        let sentiment = self.sentiment.analyze(&text);
        let quality_score = self.score(segments, &text, stage).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            provider = self.model.name(),
            attempts,
            latency_ms,
            quality = ?quality_score,
            "reply generated"
        );

        Ok(GeneratedReply {
            text,
            sentiment,
            quality_score,
            attempts,
            latency_ms,
        })
    }

    /// Best-effort quality score: `None` when disabled, failed or timed out.
    async fn score(&self, segments: &[PromptSegment], reply: &str, stage: &str) -> Option<f32> {
        if !self.config.quality_scoring {
            return None;
        }
        let user_text = segments
            .iter()
            .rev()
            .find(|s| s.role == SegmentRole::User)
            .map(|s| s.content.clone())
            .unwrap_or_default();
        let probe = QualityProbe {
            user_text,
            reply_text: reply.to_string(),
            stage: stage.to_string(),
        };

        match tokio::time::timeout(
            Duration::from_millis(self.config.quality_timeout_ms),
            self.model.score_quality(&probe),
        )
        .await
        {
            Ok(Ok(score)) if score.is_finite() => Some(score.clamp(0.0, 1.0)),
            Ok(Ok(score)) => {
                warn!(score, "discarding non-finite quality score");
                None
            }
            Ok(Err(err)) => {
                warn!(error = %err, "quality scoring failed");
                None
            }
            Err(_) => {
                warn!(timeout_ms = self.config.quality_timeout_ms, "quality scoring timed out");
                None
            }
        }
    }
}
