//! Conversation and message types for Kindred.
//!
//! These types model the document-store side of the system: conversations
//! between a user and a companion, and the append-only messages within them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// A conversation thread between one user and one companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub companion_id: Uuid,
    /// Archived conversations are hidden from the active list but stay readable.
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Denormalized time of the most recent message in the thread.
    pub last_activity_at: Option<DateTime<Utc>>,
    pub message_count: u32,
}

impl Conversation {
    /// Start a new, empty, active conversation.
    pub fn new(user_id: Uuid, companion_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            companion_id,
            archived: false,
            created_at: now,
            updated_at: now,
            last_activity_at: None,
            message_count: 0,
        }
    }

    /// Whether the given user owns this conversation.
    pub fn is_owned_by(&self, user_id: &Uuid) -> bool {
        self.user_id == *user_id
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    User,
    Companion,
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderKind::User => write!(f, "user"),
            SenderKind::Companion => write!(f, "companion"),
        }
    }
}

impl FromStr for SenderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(SenderKind::User),
            "companion" => Ok(SenderKind::Companion),
            other => Err(format!("invalid sender kind: '{other}'")),
        }
    }
}

/// The kind of a message, derived from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Photo,
    Voice,
    Sticker,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Photo => write!(f, "photo"),
            MessageKind::Voice => write!(f, "voice"),
            MessageKind::Sticker => write!(f, "sticker"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageKind::Text),
            "photo" => Ok(MessageKind::Photo),
            "voice" => Ok(MessageKind::Voice),
            "sticker" => Ok(MessageKind::Sticker),
            other => Err(format!("invalid message kind: '{other}'")),
        }
    }
}

/// The body of a message.
///
/// Text messages carry content; every other kind carries an opaque media
/// reference that is resolved outside this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePayload {
    Text { content: String },
    Photo { media_ref: String },
    Voice { media_ref: String },
    Sticker { media_ref: String },
}

impl MessagePayload {
    pub fn text(content: impl Into<String>) -> Self {
        MessagePayload::Text {
            content: content.into(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            MessagePayload::Text { .. } => MessageKind::Text,
            MessagePayload::Photo { .. } => MessageKind::Photo,
            MessagePayload::Voice { .. } => MessageKind::Voice,
            MessagePayload::Sticker { .. } => MessageKind::Sticker,
        }
    }

    /// Text content, if this is a text message.
    pub fn content(&self) -> Option<&str> {
        match self {
            MessagePayload::Text { content } => Some(content),
            _ => None,
        }
    }

    /// Media reference, if this is a media message.
    pub fn media_ref(&self) -> Option<&str> {
        match self {
            MessagePayload::Text { .. } => None,
            MessagePayload::Photo { media_ref }
            | MessagePayload::Voice { media_ref }
            | MessagePayload::Sticker { media_ref } => Some(media_ref),
        }
    }

    /// Text used for prompts, sentiment and topic analysis.
    ///
    /// Media messages are rendered as a short placeholder.
    pub fn render(&self) -> String {
        match self {
            MessagePayload::Text { content } => content.clone(),
            MessagePayload::Photo { .. } => "[shared a photo]".to_string(),
            MessagePayload::Voice { .. } => "[sent a voice message]".to_string(),
            MessagePayload::Sticker { .. } => "[sent a sticker]".to_string(),
        }
    }
}

/// Coarse sentiment classification of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl Default for SentimentLabel {
    fn default() -> Self {
        SentimentLabel::Neutral
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Neutral => write!(f, "neutral"),
            SentimentLabel::Negative => write!(f, "negative"),
        }
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            other => Err(format!("invalid sentiment label: '{other}'")),
        }
    }
}

/// Sentiment label plus a signed score in `[-1.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f32,
}

/// A single, immutable turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: SenderKind,
    pub payload: MessagePayload,
    pub sentiment: Sentiment,
    /// Estimated token count of the rendered payload.
    pub token_count: u32,
    pub read: bool,
    /// Reply quality in `[0.0, 1.0]` (companion messages only, best-effort).
    pub quality_score: Option<f32>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}

/// A message that has been validated but not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender: SenderKind,
    pub payload: MessagePayload,
    pub sentiment: Sentiment,
    pub token_count: u32,
    pub quality_score: Option<f32>,
}

/// Position in a conversation's message order.
///
/// `seq` is the store-assigned insertion sequence and breaks ties between
/// messages created in the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageCursor {
    pub created_at: DateTime<Utc>,
    pub seq: i64,
}

/// One page of messages in ascending creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Opaque cursor for the next page, absent on the last page.
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kind_and_fields_agree() {
        let text = MessagePayload::text("Hi");
        assert_eq!(text.kind(), MessageKind::Text);
        assert_eq!(text.content(), Some("Hi"));
        assert_eq!(text.media_ref(), None);

        let photo = MessagePayload::Photo {
            media_ref: "media/abc.jpg".to_string(),
        };
        assert_eq!(photo.kind(), MessageKind::Photo);
        assert_eq!(photo.content(), None);
        assert_eq!(photo.media_ref(), Some("media/abc.jpg"));
        assert_eq!(photo.render(), "[shared a photo]");
    }

    #[test]
    fn test_payload_serde_is_tagged() {
        let payload = MessagePayload::Sticker {
            media_ref: "sticker:wave".to_string(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"type":"sticker","media_ref":"sticker:wave"}"#);

        let parsed: MessagePayload = serde_json::from_str(r#"{"type":"text","content":"Hi"}"#).unwrap();
        assert_eq!(parsed, MessagePayload::text("Hi"));
    }

    #[test]
    fn test_payload_rejects_mismatched_fields() {
        let parsed = serde_json::from_str::<MessagePayload>(r#"{"type":"photo","content":"Hi"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_sender_kind_parse() {
        assert_eq!("Companion".parse::<SenderKind>().unwrap(), SenderKind::Companion);
        assert!("bot".parse::<SenderKind>().is_err());
    }

    #[test]
    fn test_conversation_ownership() {
        let user = Uuid::now_v7();
        let convo = Conversation::new(user, Uuid::now_v7());
        assert!(convo.is_owned_by(&user));
        assert!(!convo.is_owned_by(&Uuid::now_v7()));
        assert!(!convo.archived);
        assert_eq!(convo.message_count, 0);
    }
}
