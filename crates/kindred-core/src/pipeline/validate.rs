//! Inbound message validation.

use kindred_types::chat::MessagePayload;
use kindred_types::config::ValidationConfig;
use kindred_types::error::PipelineError;

/// Check a payload before anything is persisted.
///
/// Text must be non-blank and within the length limit. Media references must
/// be non-blank, within their limit and free of whitespace.
pub fn validate_payload(payload: &MessagePayload, config: &ValidationConfig) -> Result<(), PipelineError> {
    match payload {
        MessagePayload::Text { content } => {
            if content.trim().is_empty() {
                return Err(PipelineError::Validation(
                    "message text cannot be empty".to_string(),
                ));
            }
            let chars = content.chars().count();
            if chars > config.max_text_chars {
                return Err(PipelineError::Validation(format!(
                    "message text is {chars} characters, limit is {}",
                    config.max_text_chars
                )));
            }
        }
        MessagePayload::Photo { media_ref }
        | MessagePayload::Voice { media_ref }
        | MessagePayload::Sticker { media_ref } => {
            if media_ref.trim().is_empty() {
                return Err(PipelineError::Validation(format!(
                    "{} message requires a media reference",
                    payload.kind()
                )));
            }
            if media_ref.chars().count() > config.max_media_ref_chars {
                return Err(PipelineError::Validation(format!(
                    "media reference exceeds {} characters",
                    config.max_media_ref_chars
                )));
            }
            if media_ref.chars().any(char::is_whitespace) {
                return Err(PipelineError::Validation(
                    "media reference cannot contain whitespace".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(payload: MessagePayload) -> Result<(), PipelineError> {
        validate_payload(&payload, &ValidationConfig::default())
    }

    #[test]
    fn accepts_ordinary_messages() {
        assert!(check(MessagePayload::text("Hi")).is_ok());
        assert!(check(MessagePayload::Sticker {
            media_ref: "stickers/wave.webp".into()
        })
        .is_ok());
    }

    #[test]
    fn rejects_blank_text() {
        assert!(matches!(check(MessagePayload::text("")), Err(PipelineError::Validation(_))));
        assert!(matches!(check(MessagePayload::text(" \n\t")), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn rejects_oversized_text() {
        let long = "a".repeat(ValidationConfig::default().max_text_chars + 1);
        assert!(matches!(check(MessagePayload::text(long)), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn rejects_bad_media_refs() {
        assert!(check(MessagePayload::Photo { media_ref: " ".into() }).is_err());
        assert!(check(MessagePayload::Voice { media_ref: "a b.ogg".into() }).is_err());
        assert!(check(MessagePayload::Photo { media_ref: "x".repeat(513) }).is_err());
    }
}
