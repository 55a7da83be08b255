//! Results returned by the public pipeline operations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::{Conversation, Message, MessagePayload, Sentiment};
use crate::engagement::{EngagementRecord, Milestone};
use crate::relationship::{RelationshipState, StageProgress, StageTransition};

/// An inbound message from an authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub user_id: Uuid,
    pub conversation_id: Uuid,
    pub payload: MessagePayload,
}

/// Why no reply was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyFailure {
    /// Retries exhausted; the client may ask for the reply again.
    ProviderUnavailable { reason: String },
    /// The provider refused the request; retrying unchanged will not help.
    ProviderRejected { reason: String },
    /// A reply was generated but could not be stored; the user message is
    /// safe and the reply can be requested again.
    ReplyNotStored { reason: String },
}

impl ReplyFailure {
    pub fn reason(&self) -> &str {
        match self {
            ReplyFailure::ProviderUnavailable { reason }
            | ReplyFailure::ProviderRejected { reason }
            | ReplyFailure::ReplyNotStored { reason } => reason,
        }
    }

    /// Whether asking for the reply again may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ReplyFailure::ProviderRejected { .. })
    }
}

/// The companion side of a send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplyOutcome {
    Delivered {
        message: Message,
        relationship: RelationshipState,
        transition: Option<StageTransition>,
    },
    Failed(ReplyFailure),
}

/// Result of `send_message`: the stored user message plus the reply outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub user_message: Message,
    pub reply: ReplyOutcome,
}

impl SendOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self.reply, ReplyOutcome::Delivered { .. })
    }

    pub fn companion_message(&self) -> Option<&Message> {
        match &self.reply {
            ReplyOutcome::Delivered { message, .. } => Some(message),
            ReplyOutcome::Failed(_) => None,
        }
    }
}

/// Snapshot of everything known about a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationIntelligence {
    pub conversation: Conversation,
    pub relationship: Option<RelationshipState>,
    pub stage_progress: Option<StageProgress>,
    pub engagement: Option<EngagementRecord>,
    pub milestones: Vec<Milestone>,
    pub dominant_tone: Option<String>,
    pub suggested_topic: TopicSuggestion,
}

/// Where a topic suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    PersonaInterest,
    PreferredTopic,
    StageDefault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSuggestion {
    pub topic: String,
    pub prompt: String,
    pub source: SuggestionSource,
}

/// Quality details for one companion message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseQuality {
    pub message_id: Uuid,
    pub quality_score: Option<f32>,
    pub sentiment: Sentiment,
    pub token_count: u32,
}
