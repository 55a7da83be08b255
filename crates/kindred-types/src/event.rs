//! Events broadcast by the message pipeline.
//!
//! All variants are Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::relationship::StageTransition;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A user message was persisted.
    UserMessageStored {
        conversation_id: Uuid,
        message_id: Uuid,
    },

    /// A companion reply was persisted and the exchange applied.
    ExchangeCompleted {
        conversation_id: Uuid,
        exchange_id: Uuid,
        intimacy_level: u32,
        stage: String,
    },

    /// No reply could be produced for a user message.
    ReplyFailed {
        conversation_id: Uuid,
        user_message_id: Uuid,
        reason: String,
        retryable: bool,
    },

    /// A relationship changed stage.
    StageChanged(StageTransition),
}
