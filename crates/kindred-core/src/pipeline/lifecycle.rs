//! Conversation lifecycle and explicit relationship decay.

use chrono::{DateTime, Utc};
use kindred_types::chat::Conversation;
use kindred_types::error::PipelineError;
use kindred_types::event::PipelineEvent;
use kindred_types::relationship::RelationshipUpdate;
use tracing::{info, warn};
use uuid::Uuid;

use super::coordinator::MessagePipeline;
use crate::ai::provider::CompanionModel;
use crate::analytics::repository::EngagementRepository;
use crate::conversation::repository::ConversationStore;
use crate::persona::PersonaDirectory;
use crate::relationship::repository::RelationshipRepository;

impl<C, R, E, P, M> MessagePipeline<C, R, E, P, M>
where
    C: ConversationStore,
    R: RelationshipRepository,
    E: EngagementRepository,
    P: PersonaDirectory,
    M: CompanionModel + 'static,
{
    /// Return the active conversation with a companion, creating one if
    /// there is none.
    pub async fn start_conversation(
        &self,
        user_id: Uuid,
        companion_id: Uuid,
    ) -> Result<Conversation, PipelineError> {
        self.persona(&companion_id).await?;
        let _guard = self.start_locks.lock(&(user_id, companion_id)).await;

        if let Some(existing) = self
            .conversations
            .find_active_conversation(&user_id, &companion_id)
            .await?
        {
            return Ok(existing);
        }

        let conversation = self
            .conversations
            .create_conversation(&Conversation::new(user_id, companion_id))
            .await?;
        info!(conversation_id = %conversation.id, %user_id, %companion_id, "conversation started");
        Ok(conversation)
    }

    /// Hide a conversation from the active list. It stays readable.
    pub async fn archive_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Conversation, PipelineError> {
        self.set_archived(user_id, conversation_id, true).await
    }

    /// Bring an archived conversation back.
    ///
    /// Fails with a conflict if the pair already has another active
    /// conversation.
    pub async fn reactivate_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Conversation, PipelineError> {
        let conversation = self.owned_conversation(&user_id, &conversation_id).await?;
        let _guard = self
            .start_locks
            .lock(&(user_id, conversation.companion_id))
            .await;
        if let Some(active) = self
            .conversations
            .find_active_conversation(&user_id, &conversation.companion_id)
            .await?
        {
            if active.id != conversation.id {
                return Err(PipelineError::Conflict(format!(
                    "conversation {} is already active with this companion",
                    active.id
                )));
            }
        }
        self.set_archived(user_id, conversation_id, false).await
    }

    /// A user's conversations, most recently active first.
    pub async fn list_conversations(
        &self,
        user_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Conversation>, PipelineError> {
        Ok(self
            .conversations
            .list_conversations(&user_id, include_archived)
            .await?)
    }

    /// Decay a relationship for idle time up to `now`.
    ///
    /// A stage drop is recorded as a milestone (best-effort) and published.
    pub async fn apply_decay(
        &self,
        user_id: Uuid,
        companion_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RelationshipUpdate, PipelineError> {
        let update = self
            .relationships
            .decay(user_id, companion_id, now)
            .await?
            .ok_or(PipelineError::NotFound("relationship"))?;

        if let Some(transition) = &update.transition {
            if let Err(e) = self.analytics.record_transition(transition).await {
                warn!(%user_id, %companion_id, error = %e, "failed to record decay milestone");
            }
            self.events
                .publish(PipelineEvent::StageChanged(transition.clone()));
        }
        Ok(update)
    }

    async fn set_archived(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        archived: bool,
    ) -> Result<Conversation, PipelineError> {
        let mut conversation = self.owned_conversation(&user_id, &conversation_id).await?;
        if conversation.archived == archived {
            return Ok(conversation);
        }
        let now = Utc::now();
        self.conversations
            .set_archived(&conversation.id, archived, now)
            .await?;
        conversation.archived = archived;
        conversation.updated_at = now;
        info!(conversation_id = %conversation.id, archived, "conversation archive state changed");
        Ok(conversation)
    }
}
