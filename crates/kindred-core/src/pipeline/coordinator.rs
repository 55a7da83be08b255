//! Message pipeline coordinator.
//!
//! Sequences one send: validate, persist the user message, assemble context,
//! call the provider, then persist the reply and apply its side effects. The
//! two stores are written in a fixed order instead of inside one transaction:
//! the user message write is the only step without a retry or skip path, and
//! analytics are idempotent per exchange so a re-run cannot double count.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use kindred_types::chat::{
    Conversation, Message, MessagePage, MessagePayload, NewMessage, SenderKind,
};
use kindred_types::config::KindredConfig;
use kindred_types::engagement::Exchange;
use kindred_types::error::PipelineError;
use kindred_types::event::PipelineEvent;
use kindred_types::llm::GeneratedReply;
use kindred_types::persona::CompanionPersona;
use kindred_types::pipeline::{ReplyFailure, ReplyOutcome, SendMessageRequest, SendOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::locks::KeyedLocks;
use super::validate::validate_payload;
use crate::ai::orchestrator::ReplyOrchestrator;
use crate::ai::provider::CompanionModel;
use crate::analytics::aggregator::EngagementAggregator;
use crate::analytics::repository::EngagementRepository;
use crate::analytics::sentiment::SentimentAnalyzer;
use crate::context::assembler::{ContextAssembler, ContextInput};
use crate::conversation::cursor::{decode_cursor, encode_cursor};
use crate::conversation::repository::ConversationStore;
use crate::event::bus::EventBus;
use crate::persona::PersonaDirectory;
use crate::relationship::engine::{ExchangeSignal, ProgressionEngine};
use crate::relationship::repository::RelationshipRepository;
use crate::relationship::tracker::RelationshipTracker;

/// Largest page `list_messages` will return.
pub const MAX_PAGE_SIZE: u32 = 100;

/// The companion message pipeline.
///
/// Generic over its stores and model so kindred-core never depends on
/// kindred-infra.
pub struct MessagePipeline<C, R, E, P, M>
where
    C: ConversationStore,
    R: RelationshipRepository,
    E: EngagementRepository,
    P: PersonaDirectory,
    M: CompanionModel + 'static,
{
    pub(crate) conversations: C,
    pub(crate) personas: P,
    pub(crate) relationships: RelationshipTracker<R>,
    pub(crate) analytics: EngagementAggregator<E>,
    pub(crate) orchestrator: Arc<ReplyOrchestrator<M>>,
    pub(crate) assembler: ContextAssembler,
    pub(crate) sentiment: SentimentAnalyzer,
    pub(crate) config: KindredConfig,
    pub(crate) events: EventBus,
    conversation_locks: KeyedLocks<Uuid>,
    pub(crate) start_locks: KeyedLocks<(Uuid, Uuid)>,
}

impl<C, R, E, P, M> MessagePipeline<C, R, E, P, M>
where
    C: ConversationStore,
    R: RelationshipRepository,
    E: EngagementRepository,
    P: PersonaDirectory,
    M: CompanionModel + 'static,
{
    /// Wire up a pipeline. Fails if the configured stage ladder is invalid.
    pub fn new(
        config: KindredConfig,
        conversations: C,
        relationships: R,
        engagement: E,
        personas: P,
        model: Arc<M>,
    ) -> Result<Self, PipelineError> {
        let engine = ProgressionEngine::new(config.progression.clone())?;
        Ok(Self {
            conversations,
            personas,
            relationships: RelationshipTracker::new(relationships, engine),
            analytics: EngagementAggregator::new(engagement, config.analytics.clone()),
            orchestrator: Arc::new(ReplyOrchestrator::new(model, config.orchestrator.clone())),
            assembler: ContextAssembler::new(&config.context),
            sentiment: SentimentAnalyzer::new(),
            config,
            events: EventBus::default(),
            conversation_locks: KeyedLocks::new(),
            start_locks: KeyedLocks::new(),
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &KindredConfig {
        &self.config
    }

    pub fn conversations(&self) -> &C {
        &self.conversations
    }

    pub fn relationships(&self) -> &RelationshipTracker<R> {
        &self.relationships
    }

    pub fn analytics(&self) -> &EngagementAggregator<E> {
        &self.analytics
    }

    /// Send a user message and produce the companion's reply.
    ///
    /// A provider failure is not an error: the user message stays persisted and
    /// the outcome carries `ReplyOutcome::Failed`, leaving relationship and
    /// analytics untouched. If `cancel` fires while the provider call is in
    /// flight, the call finishes in its own task, its result is discarded and
    /// `PipelineError::Cancelled` is returned.
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
        cancel: CancellationToken,
    ) -> Result<SendOutcome, PipelineError> {
        validate_payload(&request.payload, &self.config.validation)?;

        let conversation = self
            .writable_conversation(&request.user_id, &request.conversation_id)
            .await?;
        let _guard = self.conversation_locks.lock(&conversation.id).await;

        let persona = self.persona(&conversation.companion_id).await?;
        let user_message = self
            .store_user_message(&conversation, request.payload)
            .await?;

        if cancel.is_cancelled() {
            info!(conversation_id = %conversation.id, "send cancelled before reply");
            return Err(PipelineError::Cancelled);
        }

        let reply = self
            .reply_to(&conversation, &persona, &user_message, &cancel)
            .await?;
        Ok(SendOutcome {
            user_message,
            reply,
        })
    }

    /// Produce a reply for the newest user message without resending it.
    ///
    /// Fails with a validation error when the newest message already has a
    /// reply.
    pub async fn retry_reply(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        cancel: CancellationToken,
    ) -> Result<SendOutcome, PipelineError> {
        let conversation = self.writable_conversation(&user_id, &conversation_id).await?;
        let _guard = self.conversation_locks.lock(&conversation.id).await;

        let latest = self
            .conversations
            .recent_messages(&conversation.id, 1)
            .await?
            .pop()
            .ok_or_else(|| PipelineError::Validation("conversation has no messages".to_string()))?;
        if latest.sender != SenderKind::User {
            return Err(PipelineError::Validation(
                "latest message already has a reply".to_string(),
            ));
        }

        let persona = self.persona(&conversation.companion_id).await?;
        info!(conversation_id = %conversation.id, message_id = %latest.id, "retrying reply");
        let reply = self
            .reply_to(&conversation, &persona, &latest, &cancel)
            .await?;
        Ok(SendOutcome {
            user_message: latest,
            reply,
        })
    }

    /// A page of messages in ascending creation order.
    ///
    /// `limit` is clamped to `1..=100`. Reads never wait on sends.
    pub async fn list_messages(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<MessagePage, PipelineError> {
        let conversation = self.owned_conversation(&user_id, &conversation_id).await?;
        let after = cursor
            .map(decode_cursor)
            .transpose()
            .map_err(|e| PipelineError::Validation(format!("invalid cursor: {e}")))?;

        let slice = self
            .conversations
            .list_messages(&conversation.id, after.as_ref(), limit.clamp(1, MAX_PAGE_SIZE))
            .await?;
        Ok(MessagePage {
            messages: slice.messages,
            next_cursor: slice.next.as_ref().map(encode_cursor),
        })
    }

    /// A single message, if it belongs to one of the user's conversations.
    pub async fn get_message(&self, user_id: Uuid, message_id: Uuid) -> Result<Message, PipelineError> {
        let message = self
            .conversations
            .get_message(&message_id)
            .await?
            .ok_or(PipelineError::NotFound("message"))?;
        self.owned_conversation(&user_id, &message.conversation_id)
            .await
            .map_err(|_| PipelineError::NotFound("message"))?;
        Ok(message)
    }

    /// Mark companion messages read, up to and including `up_to` (or all).
    pub async fn mark_read(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        up_to: Option<Uuid>,
    ) -> Result<u32, PipelineError> {
        let conversation = self.owned_conversation(&user_id, &conversation_id).await?;
        if let Some(message_id) = up_to {
            let message = self
                .conversations
                .get_message(&message_id)
                .await?
                .filter(|m| m.conversation_id == conversation.id);
            if message.is_none() {
                return Err(PipelineError::NotFound("message"));
            }
        }
        let changed = self
            .conversations
            .mark_read(&conversation.id, up_to.as_ref())
            .await?;
        debug!(conversation_id = %conversation.id, changed, "messages marked read");
        Ok(changed)
    }

    // --- Internals ---

    /// Load a conversation the user owns. Unknown and foreign conversations
    /// are indistinguishable.
    pub(crate) async fn owned_conversation(
        &self,
        user_id: &Uuid,
        conversation_id: &Uuid,
    ) -> Result<Conversation, PipelineError> {
        self.conversations
            .get_conversation(conversation_id)
            .await?
            .filter(|c| c.is_owned_by(user_id))
            .ok_or(PipelineError::NotFound("conversation"))
    }

    async fn writable_conversation(
        &self,
        user_id: &Uuid,
        conversation_id: &Uuid,
    ) -> Result<Conversation, PipelineError> {
        let conversation = self.owned_conversation(user_id, conversation_id).await?;
        if conversation.archived {
            return Err(PipelineError::Validation(
                "conversation is archived".to_string(),
            ));
        }
        Ok(conversation)
    }

    pub(crate) async fn persona(&self, companion_id: &Uuid) -> Result<CompanionPersona, PipelineError> {
        self.personas
            .get_persona(companion_id)
            .await?
            .ok_or(PipelineError::NotFound("companion"))
    }

    async fn store_user_message(
        &self,
        conversation: &Conversation,
        payload: MessagePayload,
    ) -> Result<Message, PipelineError> {
        let rendered = payload.render();
        let new_message = NewMessage {
            sender: SenderKind::User,
            sentiment: self.sentiment.analyze(&rendered),
            token_count: self.assembler.estimator().estimate(&rendered),
            payload,
            quality_score: None,
        };

        let message = self
            .conversations
            .create_message(&conversation.id, new_message)
            .await
            .map_err(|e| PipelineError::Storage(format!("failed to store user message: {e}")))?;

        debug!(conversation_id = %conversation.id, message_id = %message.id, "user message stored");
        self.events.publish(PipelineEvent::UserMessageStored {
            conversation_id: conversation.id,
            message_id: message.id,
        });
        Ok(message)
    }

    /// Generate, persist and apply a reply to `user_message`.
    async fn reply_to(
        &self,
        conversation: &Conversation,
        persona: &CompanionPersona,
        user_message: &Message,
        cancel: &CancellationToken,
    ) -> Result<ReplyOutcome, PipelineError> {
        let user_id = conversation.user_id;
        let companion_id = conversation.companion_id;

        let relationship = self.relationships.snapshot(user_id, companion_id).await?;
        let ladder = self.relationships.engine().ladder();
        let stage = ladder
            .stage_for(relationship.intimacy_level, relationship.message_count)
            .clone();

        let history = self
            .conversations
            .recent_messages(&conversation.id, self.config.context.history_window.max(1))
            .await?;
        let segments = self.assembler.build_context(ContextInput {
            history: &history,
            persona,
            relationship: &relationship,
            stage: &stage,
            max_tokens: self.config.context.max_tokens,
        })?;

        let orchestrator = Arc::clone(&self.orchestrator);
        let stage_name = stage.name.clone();
        let call = tokio::spawn(async move { orchestrator.generate_reply(&segments, &stage_name).await });

        let generated = tokio::select! {
            _ = cancel.cancelled() => {
                info!(
                    conversation_id = %conversation.id,
                    "request cancelled; in-flight reply will be discarded"
                );
                return Err(PipelineError::Cancelled);
            }
            joined = call => joined.unwrap_or_else(|e| {
                Err(ReplyFailure::ProviderUnavailable {
                    reason: format!("reply task failed: {e}"),
                })
            }),
        };

        match generated {
            Ok(reply) => self.deliver(conversation, user_message, reply).await,
            Err(failure) => Ok(self.reply_failed(conversation, user_message, failure).await),
        }
    }

    /// Report a send that ends without a stored reply. Relationship and
    /// analytics are left untouched.
    async fn reply_failed(
        &self,
        conversation: &Conversation,
        user_message: &Message,
        failure: ReplyFailure,
    ) -> ReplyOutcome {
        let retryable = failure.is_retryable();
        warn!(
            conversation_id = %conversation.id,
            user_message_id = %user_message.id,
            retryable,
            reason = %failure.reason(),
            "no reply produced"
        );
        self.events.publish(PipelineEvent::ReplyFailed {
            conversation_id: conversation.id,
            user_message_id: user_message.id,
            reason: failure.reason().to_string(),
            retryable,
        });
        self.touch(conversation, user_message.created_at).await;
        ReplyOutcome::Failed(failure)
    }

    /// Persist a generated reply and apply its relationship and analytics
    /// effects.
    async fn deliver(
        &self,
        conversation: &Conversation,
        user_message: &Message,
        reply: GeneratedReply,
    ) -> Result<ReplyOutcome, PipelineError> {
        let user_id = conversation.user_id;
        let companion_id = conversation.companion_id;

        let stored = self
            .conversations
            .create_message(
                &conversation.id,
                NewMessage {
                    sender: SenderKind::Companion,
                    token_count: self.assembler.estimator().estimate(&reply.text),
                    payload: MessagePayload::text(reply.text),
                    sentiment: reply.sentiment,
                    quality_score: reply.quality_score,
                },
            )
            .await;
        let companion_message = match stored {
            Ok(message) => message,
            Err(e) => {
                let failure = ReplyFailure::ReplyNotStored {
                    reason: format!("failed to store reply: {e}"),
                };
                return Ok(self.reply_failed(conversation, user_message, failure).await);
            }
        };
        let exchange_id = companion_message.id;

        let signal = ExchangeSignal {
            user_text_chars: user_message
                .payload
                .content()
                .map(|c| c.trim().chars().count()),
            quality_score: reply.quality_score,
            sentiment_score: user_message.sentiment.score,
        };
        let at = companion_message.created_at;
        let update = retry_once("relationship update", || {
            self.relationships
                .record_exchange(user_id, companion_id, exchange_id, &signal, at)
        })
        .await;

        let (relationship, transition) = match update {
            Some(update) => (update.state, update.transition),
            None => (self.relationships.snapshot(user_id, companion_id).await?, None),
        };
        let progress = self.relationships.engine().ladder().progress(&relationship);

        let exchange = Exchange {
            id: exchange_id,
            user_id,
            companion_id,
            conversation_id: conversation.id,
            user_message: user_message.clone(),
            companion_message: companion_message.clone(),
            transition: transition.clone(),
            intimacy_level: relationship.intimacy_level,
            stage_progress: progress.progress,
        };
        retry_once("engagement analytics", || self.analytics.record_exchange(&exchange)).await;

        self.touch(conversation, at).await;

        if let Some(transition) = &transition {
            self.events
                .publish(PipelineEvent::StageChanged(transition.clone()));
        }
        self.events.publish(PipelineEvent::ExchangeCompleted {
            conversation_id: conversation.id,
            exchange_id,
            intimacy_level: relationship.intimacy_level,
            stage: relationship.stage.clone(),
        });
        info!(
            conversation_id = %conversation.id,
            exchange_id = %exchange_id,
            intimacy = relationship.intimacy_level,
            stage = %relationship.stage,
            attempts = reply.attempts,
            latency_ms = reply.latency_ms,
            "exchange completed"
        );

        Ok(ReplyOutcome::Delivered {
            message: companion_message,
            relationship,
            transition,
        })
    }

    /// Best-effort activity bump.
    async fn touch(&self, conversation: &Conversation, at: chrono::DateTime<Utc>) {
        if let Err(e) = self.conversations.touch_activity(&conversation.id, at).await {
            warn!(conversation_id = %conversation.id, error = %e, "failed to touch conversation activity");
        }
    }
}

/// Run a post-reply step, retrying once. A second failure is logged and the
/// step is skipped.
async fn retry_once<T, F, Fut>(step: &str, mut run: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    match run().await {
        Ok(value) => return Some(value),
        Err(e) => debug!(step, error = %e, "step failed, retrying once"),
    }
    match run().await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(step, error = %e, "step failed twice, skipping");
            None
        }
    }
}
