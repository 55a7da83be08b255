//! AnthropicModel -- concrete [`CompanionModel`] implementation for Anthropic Claude.
//!
//! Sends requests to the Anthropic Messages API (`/v1/messages`) with the
//! usual authentication headers and maps HTTP failures onto
//! [`ProviderError`] so the orchestrator can tell transient failures from
//! rejections.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use kindred_core::ai::provider::CompanionModel;
use kindred_types::llm::{ModelParams, PromptSegment, ProviderError, QualityProbe, SegmentRole};

use super::types::{AnthropicErrorBody, AnthropicMessage, AnthropicRequest, AnthropicResponse};

/// Attempts are bounded by the orchestrator; this is only a backstop.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Placeholder opening turn when the history window starts with a reply.
const RESUMED_TURN: &str = "[earlier conversation omitted]";

/// Anthropic Claude companion model.
///
/// # API Key Security
///
/// The API key is stored as a [`SecretString`] and is only exposed when
/// constructing HTTP request headers.
pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    /// Model used for quality scoring; usually a small, fast one.
    scoring_model: String,
}

impl AnthropicModel {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(api_key: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            scoring_model: "claude-3-5-haiku-20241022".to_string(),
        }
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_scoring_model(mut self, model: String) -> Self {
        self.scoring_model = model;
        self
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert ordered prompt segments into an [`AnthropicRequest`].
    ///
    /// System segments become the `system` field. The remaining turns are
    /// merged so roles alternate and the conversation opens with a user turn,
    /// as the Messages API requires.
    fn to_anthropic_request(&self, segments: &[PromptSegment], params: &ModelParams) -> AnthropicRequest {
        let system: Vec<&str> = segments
            .iter()
            .filter(|s| s.role == SegmentRole::System)
            .map(|s| s.content.as_str())
            .collect();

        let mut messages: Vec<AnthropicMessage> = Vec::new();
        for segment in segments.iter().filter(|s| s.role != SegmentRole::System) {
            let role = match segment.role {
                SegmentRole::Companion => "assistant",
                _ => "user",
            };
            match messages.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&segment.content);
                }
                _ => messages.push(AnthropicMessage {
                    role: role.to_string(),
                    content: segment.content.clone(),
                }),
            }
        }
        if messages.first().is_some_and(|m| m.role == "assistant") {
            messages.insert(
                0,
                AnthropicMessage {
                    role: "user".to_string(),
                    content: RESUMED_TURN.to_string(),
                },
            );
        }

        AnthropicRequest {
            model: params.model.clone(),
            max_tokens: params.max_tokens,
            messages,
            system: if system.is_empty() {
                None
            } else {
                Some(system.join("\n\n"))
            },
            temperature: params.temperature,
        }
    }

    fn quality_request(&self, probe: &QualityProbe) -> AnthropicRequest {
        let prompt = format!(
            "Rate how well the companion's reply fits the conversation. Consider warmth, \
             relevance and whether it suits a relationship at the '{}' stage.\n\n\
             User: {}\n\nCompanion: {}\n\n\
             Answer with a single number between 0 and 1 and nothing else.",
            probe.stage, probe.user_text, probe.reply_text
        );

        AnthropicRequest {
            model: self.scoring_model.clone(),
            max_tokens: 8,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            system: None,
            temperature: Some(0.0),
        }
    }

    async fn send(&self, body: &AnthropicRequest) -> Result<AnthropicResponse, ProviderError> {
        let response = self
            .client
            .post(self.url("/v1/messages"))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(CLIENT_TIMEOUT.as_millis() as u64)
                } else {
                    ProviderError::Network(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), &error_body, retry_after_ms));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Deserialization(format!("failed to parse response: {e}")))
    }
}

// AnthropicModel intentionally does NOT derive Debug.

impl CompanionModel for AnthropicModel {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        segments: &[PromptSegment],
        params: &ModelParams,
    ) -> Result<String, ProviderError> {
        let body = self.to_anthropic_request(segments, params);
        let response = self.send(&body).await?;

        tracing::debug!(
            id = %response.id,
            model = %response.model,
            stop_reason = ?response.stop_reason,
            "anthropic completion finished"
        );

        Ok(response.text())
    }

    async fn score_quality(&self, probe: &QualityProbe) -> Result<f32, ProviderError> {
        let body = self.quality_request(probe);
        let response = self.send(&body).await?;
        parse_score(&response.text())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a non-2xx status onto a provider error.
fn map_status(status: u16, body: &str, retry_after_ms: Option<u64>) -> ProviderError {
    let message = serde_json::from_str::<AnthropicErrorBody>(body)
        .map(|b| format!("{}: {}", b.error.error_type, b.error.message))
        .unwrap_or_else(|_| body.to_string());

    match status {
        401 | 403 => ProviderError::Rejected(format!("authentication failed ({status}): {message}")),
        429 => ProviderError::RateLimited { retry_after_ms },
        _ => ProviderError::Status { status, message },
    }
}

/// `retry-after` is given in whole seconds.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|secs| secs * 1_000)
}

/// First number in the scorer's answer.
fn parse_score(text: &str) -> Result<f32, ProviderError> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .find(|token| !token.is_empty() && token.chars().any(|c| c.is_ascii_digit()))
        .and_then(|token| token.parse::<f32>().ok())
        .ok_or_else(|| ProviderError::Deserialization(format!("no score in '{}'", text.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_model() -> AnthropicModel {
        AnthropicModel::new(SecretString::from("test-key-not-real"))
    }

    fn segment(role: SegmentRole, content: &str) -> PromptSegment {
        PromptSegment {
            role,
            content: content.to_string(),
            token_estimate: 1,
        }
    }

    fn params() -> ModelParams {
        ModelParams {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 256,
            temperature: Some(0.8),
        }
    }

    #[test]
    fn test_model_name() {
        assert_eq!(make_model().name(), "anthropic");
    }

    #[test]
    fn test_system_segment_becomes_system_field() {
        let request = make_model().to_anthropic_request(
            &[
                segment(SegmentRole::System, "<persona>Ava</persona>"),
                segment(SegmentRole::User, "Hi"),
            ],
            &params(),
        );
        assert_eq!(request.system.as_deref(), Some("<persona>Ava</persona>"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.model, "claude-sonnet-4-20250514");
        assert_eq!(request.max_tokens, 256);
    }

    #[test]
    fn test_consecutive_turns_are_merged() {
        let request = make_model().to_anthropic_request(
            &[
                segment(SegmentRole::System, "s"),
                segment(SegmentRole::User, "are you there?"),
                segment(SegmentRole::User, "hello?"),
                segment(SegmentRole::Companion, "Sorry, here now!"),
                segment(SegmentRole::User, "yay"),
            ],
            &params(),
        );
        let roles: Vec<&str> = request.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(request.messages[0].content, "are you there?\n\nhello?");
    }

    #[test]
    fn test_history_opening_with_reply_gets_user_turn() {
        let request = make_model().to_anthropic_request(
            &[
                segment(SegmentRole::Companion, "Welcome back!"),
                segment(SegmentRole::User, "thanks"),
            ],
            &params(),
        );
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[0].content, RESUMED_TURN);
        assert_eq!(request.messages.len(), 3);
        assert!(request.system.is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(map_status(401, "", None), ProviderError::Rejected(_)));
        assert!(matches!(
            map_status(429, "", Some(2_000)),
            ProviderError::RateLimited {
                retry_after_ms: Some(2_000)
            }
        ));

        let overloaded = map_status(
            529,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            None,
        );
        assert!(overloaded.is_transient());
        assert_eq!(
            overloaded,
            ProviderError::Status {
                status: 529,
                message: "overloaded_error: Overloaded".to_string()
            }
        );
        assert!(!map_status(400, "bad request", None).is_transient());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("3"), Some(3_000));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("0.85").unwrap(), 0.85);
        assert_eq!(parse_score("Score: 0.4").unwrap(), 0.4);
        assert_eq!(parse_score(" 1 ").unwrap(), 1.0);
        assert!(parse_score("great reply").is_err());
    }

    #[test]
    fn test_base_url_override() {
        let model = make_model().with_base_url("http://localhost:8080".to_string());
        assert_eq!(model.url("/v1/messages"), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_quality_request_uses_scoring_model() {
        let model = make_model().with_scoring_model("claude-haiku".to_string());
        let request = model.quality_request(&QualityProbe {
            user_text: "I got the job!".to_string(),
            reply_text: "That's amazing, congrats!".to_string(),
            stage: "friend".to_string(),
        });
        assert_eq!(request.model, "claude-haiku");
        assert!(request.messages[0].content.contains("'friend' stage"));
        assert!(request.messages[0].content.contains("I got the job!"));
    }
}
