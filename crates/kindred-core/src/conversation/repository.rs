//! ConversationStore trait definition.
//!
//! Conversations and their append-only messages. Follows the same RPITIT
//! pattern as the other repositories in this crate.

use chrono::{DateTime, Utc};
use kindred_types::chat::{Conversation, Message, MessageCursor, NewMessage};
use kindred_types::error::RepositoryError;
use uuid::Uuid;

/// A slice of a conversation's messages in ascending order.
#[derive(Debug, Clone, Default)]
pub struct MessageSlice {
    pub messages: Vec<Message>,
    /// Position of the last returned message when more messages follow.
    pub next: Option<MessageCursor>,
}

/// Repository trait for conversation and message documents.
///
/// Messages are ordered by `created_at`, ties broken by the store's insertion
/// sequence. Implementations live in kindred-infra (e.g., `SqliteConversationStore`).
pub trait ConversationStore: Send + Sync {
    /// Persist a new conversation.
    fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Get a conversation by id.
    fn get_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// The newest non-archived conversation between a user and a companion.
    fn find_active_conversation(
        &self,
        user_id: &Uuid,
        companion_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// List a user's conversations, most recently active first.
    fn list_conversations(
        &self,
        user_id: &Uuid,
        include_archived: bool,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Archive or reactivate a conversation.
    fn set_archived(
        &self,
        conversation_id: &Uuid,
        archived: bool,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append a message, assigning its id, timestamp and insertion sequence.
    ///
    /// Also increments the conversation's message count.
    fn create_message(
        &self,
        conversation_id: &Uuid,
        message: NewMessage,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// Messages strictly after `after` (or from the start), oldest first.
    fn list_messages(
        &self,
        conversation_id: &Uuid,
        after: Option<&MessageCursor>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<MessageSlice, RepositoryError>> + Send;

    /// The newest `limit` messages, returned oldest first.
    fn recent_messages(
        &self,
        conversation_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Get a single message by id.
    fn get_message(
        &self,
        message_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Message>, RepositoryError>> + Send;

    /// Mark companion messages as read, up to and including `up_to` (or all).
    ///
    /// Returns the number of messages that changed state.
    fn mark_read(
        &self,
        conversation_id: &Uuid,
        up_to: Option<&Uuid>,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;

    /// Record activity on a conversation.
    fn touch_activity(
        &self,
        conversation_id: &Uuid,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
