//! Companion model implementations.
//!
//! Contains concrete implementations of the
//! [`CompanionModel`](kindred_core::ai::provider::CompanionModel) trait
//! defined in `kindred-core`, plus [`create_model`], which builds the
//! configured model from an API key.

pub mod anthropic;

use secrecy::SecretString;

use kindred_types::llm::ProviderError;

use self::anthropic::AnthropicModel;

/// Environment variable holding the Anthropic API key.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Build the Anthropic model from an API key.
///
/// A missing or blank key is a rejection: no retry will fix it.
pub fn create_model(api_key: Option<&str>, base_url: Option<&str>) -> Result<AnthropicModel, ProviderError> {
    let key = api_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ProviderError::Rejected(format!("{API_KEY_VAR} is not set")))?;

    let model = AnthropicModel::new(SecretString::from(key.to_string()));
    Ok(match base_url {
        Some(url) => model.with_base_url(url.trim_end_matches('/').to_string()),
        None => model,
    })
}

/// Read the API key from the environment.
///
/// Invalid Unicode is treated as absent.
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_VAR).ok()
}
