//! In-memory fakes and fixtures shared by this crate's tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use kindred_types::chat::{
    Conversation, Message, MessageCursor, MessagePayload, NewMessage, SenderKind,
};
use kindred_types::engagement::{EngagementRecord, Exchange, Milestone};
use kindred_types::error::RepositoryError;
use kindred_types::llm::{ModelParams, PromptSegment, ProviderError, QualityProbe};
use kindred_types::persona::CompanionPersona;
use kindred_types::relationship::RelationshipState;
use uuid::Uuid;

use crate::ai::provider::CompanionModel;
use crate::analytics::repository::EngagementRepository;
use crate::analytics::sentiment::SentimentAnalyzer;
use crate::conversation::repository::{ConversationStore, MessageSlice};
use crate::persona::PersonaDirectory;
use crate::relationship::repository::RelationshipRepository;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn persona(name: &str) -> CompanionPersona {
    CompanionPersona {
        companion_id: Uuid::now_v7(),
        name: name.to_string(),
        traits: vec!["curious".to_string(), "warm".to_string()],
        style: "playful".to_string(),
        interests: vec!["astronomy".to_string(), "music".to_string()],
        quirks: vec!["hums when thinking".to_string()],
        backstory: "Grew up in a lighthouse.".to_string(),
    }
}

pub fn message(sender: SenderKind, text: &str) -> Message {
    Message {
        id: Uuid::now_v7(),
        conversation_id: Uuid::nil(),
        sender,
        payload: MessagePayload::text(text),
        sentiment: SentimentAnalyzer::new().analyze(text),
        token_count: 0,
        read: false,
        quality_score: None,
        created_at: Utc::now(),
    }
}

/// An exchange whose reply arrives `response_ms` after the user message.
pub fn exchange_at(user_text: &str, at: DateTime<Utc>, response_ms: i64) -> Exchange {
    let conversation_id = Uuid::now_v7();
    let mut user_message = message(SenderKind::User, user_text);
    user_message.conversation_id = conversation_id;
    user_message.created_at = at;
    let mut companion_message = message(SenderKind::Companion, "That sounds lovely!");
    companion_message.conversation_id = conversation_id;
    companion_message.created_at = at + chrono::Duration::milliseconds(response_ms);

    Exchange {
        id: companion_message.id,
        user_id: Uuid::now_v7(),
        companion_id: Uuid::now_v7(),
        conversation_id,
        user_message,
        companion_message,
        transition: None,
        intimacy_level: 1,
        stage_progress: 0.1,
    }
}

// ---------------------------------------------------------------------------
// Conversation store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ConversationState {
    conversations: HashMap<Uuid, Conversation>,
    /// (seq, message), in insertion order.
    messages: Vec<(i64, Message)>,
    next_seq: i64,
}

#[derive(Default)]
pub struct MemoryConversations {
    state: Mutex<ConversationState>,
    fail_writes: AtomicBool,
    fail_companion_writes: AtomicBool,
}

impl MemoryConversations {
    /// Make every subsequent message write fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Toggle failing companion message writes; user messages still land.
    pub fn fail_companion_writes(&self, fail: bool) {
        self.fail_companion_writes.store(fail, Ordering::SeqCst);
    }

    pub fn message_count(&self, conversation_id: &Uuid) -> usize {
        let state = self.state.lock().unwrap();
        state
            .messages
            .iter()
            .filter(|(_, m)| m.conversation_id == *conversation_id)
            .count()
    }

    fn ordered(state: &ConversationState, conversation_id: &Uuid) -> Vec<(MessageCursor, Message)> {
        let mut out: Vec<(MessageCursor, Message)> = state
            .messages
            .iter()
            .filter(|(_, m)| m.conversation_id == *conversation_id)
            .map(|(seq, m)| {
                (
                    MessageCursor {
                        created_at: m.created_at,
                        seq: *seq,
                    },
                    m.clone(),
                )
            })
            .collect();
        out.sort_by_key(|(c, _)| *c);
        out
    }
}

impl ConversationStore for MemoryConversations {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<Conversation, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation.clone())
    }

    async fn get_conversation(&self, conversation_id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.state.lock().unwrap().conversations.get(conversation_id).cloned())
    }

    async fn find_active_conversation(
        &self,
        user_id: &Uuid,
        companion_id: &Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .conversations
            .values()
            .filter(|c| c.user_id == *user_id && c.companion_id == *companion_id && !c.archived)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn list_conversations(
        &self,
        user_id: &Uuid,
        include_archived: bool,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut list: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.user_id == *user_id && (include_archived || !c.archived))
            .cloned()
            .collect();
        list.sort_by_key(|c| std::cmp::Reverse(c.last_activity_at.unwrap_or(c.created_at)));
        Ok(list)
    }

    async fn set_archived(
        &self,
        conversation_id: &Uuid,
        archived: bool,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let conversation = state
            .conversations
            .get_mut(conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.archived = archived;
        conversation.updated_at = at;
        Ok(())
    }

    async fn create_message(&self, conversation_id: &Uuid, message: NewMessage) -> Result<Message, RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst)
            || (message.sender == SenderKind::Companion
                && self.fail_companion_writes.load(Ordering::SeqCst))
        {
            return Err(RepositoryError::Connection);
        }
        let mut state = self.state.lock().unwrap();
        let conversation = state
            .conversations
            .get_mut(conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.message_count += 1;

        let stored = Message {
            id: Uuid::now_v7(),
            conversation_id: *conversation_id,
            sender: message.sender,
            payload: message.payload,
            sentiment: message.sentiment,
            token_count: message.token_count,
            read: message.sender == SenderKind::User,
            quality_score: message.quality_score,
            created_at: Utc::now(),
        };
        state.next_seq += 1;
        let seq = state.next_seq;
        state.messages.push((seq, stored.clone()));
        Ok(stored)
    }

    async fn list_messages(
        &self,
        conversation_id: &Uuid,
        after: Option<&MessageCursor>,
        limit: u32,
    ) -> Result<MessageSlice, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<(MessageCursor, Message)> = Self::ordered(&state, conversation_id)
            .into_iter()
            .filter(|(c, _)| after.is_none_or(|a| c > a))
            .take(limit as usize + 1)
            .collect();
        let more = rows.len() > limit as usize;
        rows.truncate(limit as usize);
        let next = if more { rows.last().map(|(c, _)| *c) } else { None };
        Ok(MessageSlice {
            messages: rows.into_iter().map(|(_, m)| m).collect(),
            next,
        })
    }

    async fn recent_messages(&self, conversation_id: &Uuid, limit: u32) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let ordered = Self::ordered(&state, conversation_id);
        let skip = ordered.len().saturating_sub(limit as usize);
        Ok(ordered.into_iter().skip(skip).map(|(_, m)| m).collect())
    }

    async fn get_message(&self, message_id: &Uuid) -> Result<Option<Message>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .find(|(_, m)| m.id == *message_id)
            .map(|(_, m)| m.clone()))
    }

    async fn mark_read(&self, conversation_id: &Uuid, up_to: Option<&Uuid>) -> Result<u32, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let limit = match up_to {
            Some(id) => Some(
                Self::ordered(&state, conversation_id)
                    .into_iter()
                    .find(|(_, m)| m.id == *id)
                    .map(|(c, _)| c)
                    .ok_or(RepositoryError::NotFound)?,
            ),
            None => None,
        };
        let mut changed = 0;
        for (seq, m) in state.messages.iter_mut() {
            let cursor = MessageCursor {
                created_at: m.created_at,
                seq: *seq,
            };
            if m.conversation_id == *conversation_id
                && m.sender == SenderKind::Companion
                && !m.read
                && limit.is_none_or(|l| cursor <= l)
            {
                m.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn touch_activity(&self, conversation_id: &Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.conversations.get_mut(conversation_id) {
            c.last_activity_at = Some(at);
            c.updated_at = at;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Relationship repository
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRelationships {
    states: Mutex<HashMap<(Uuid, Uuid), RelationshipState>>,
    failing_saves: AtomicU32,
}

impl MemoryRelationships {
    /// Make the next `n` saves fail.
    pub fn fail_next_saves(&self, n: u32) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }
}

impl RelationshipRepository for MemoryRelationships {
    async fn get(&self, user_id: &Uuid, companion_id: &Uuid) -> Result<Option<RelationshipState>, RepositoryError> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .get(&(*user_id, *companion_id))
            .cloned())
    }

    async fn save(&self, state: &RelationshipState) -> Result<(), RepositoryError> {
        if take_failure(&self.failing_saves) {
            return Err(RepositoryError::Connection);
        }
        // Yield so concurrent callers interleave if they are not serialized.
        tokio::task::yield_now().await;
        self.states
            .lock()
            .unwrap()
            .insert((state.user_id, state.companion_id), state.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engagement repository
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EngagementState {
    records: HashMap<Uuid, EngagementRecord>,
    ledger: HashSet<Uuid>,
    milestones: Vec<Milestone>,
}

#[derive(Default)]
pub struct MemoryEngagement {
    state: Mutex<EngagementState>,
    failing_commits: AtomicU32,
}

impl MemoryEngagement {
    /// Make the next `n` commits fail.
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }
}

impl EngagementRepository for MemoryEngagement {
    async fn get_record(&self, conversation_id: &Uuid) -> Result<Option<EngagementRecord>, RepositoryError> {
        Ok(self.state.lock().unwrap().records.get(conversation_id).cloned())
    }

    async fn list_records(&self, user_id: &Uuid, companion_id: &Uuid) -> Result<Vec<EngagementRecord>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<EngagementRecord> = state
            .records
            .values()
            .filter(|r| r.user_id == *user_id && r.companion_id == *companion_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.conversation_id);
        Ok(records)
    }

    async fn is_recorded(&self, exchange_id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().unwrap().ledger.contains(exchange_id))
    }

    async fn commit_exchange(
        &self,
        exchange_id: &Uuid,
        record: &EngagementRecord,
        milestones: &[Milestone],
    ) -> Result<bool, RepositoryError> {
        if take_failure(&self.failing_commits) {
            return Err(RepositoryError::Connection);
        }
        let mut state = self.state.lock().unwrap();
        if !state.ledger.insert(*exchange_id) {
            return Ok(false);
        }
        state.records.insert(record.conversation_id, record.clone());
        state.milestones.extend_from_slice(milestones);
        Ok(true)
    }

    async fn record_milestone(&self, milestone: &Milestone) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().milestones.push(milestone.clone());
        Ok(())
    }

    async fn list_milestones(&self, user_id: &Uuid, companion_id: &Uuid) -> Result<Vec<Milestone>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .milestones
            .iter()
            .filter(|m| m.user_id == *user_id && m.companion_id == *companion_id)
            .cloned()
            .collect())
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

// ---------------------------------------------------------------------------
// Personas
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryPersonas {
    personas: Mutex<HashMap<Uuid, CompanionPersona>>,
}

impl MemoryPersonas {
    pub fn with(persona: CompanionPersona) -> Self {
        let personas = Self::default();
        personas.insert(persona);
        personas
    }

    pub fn insert(&self, persona: CompanionPersona) {
        self.personas
            .lock()
            .unwrap()
            .insert(persona.companion_id, persona);
    }
}

impl PersonaDirectory for MemoryPersonas {
    async fn get_persona(&self, companion_id: &Uuid) -> Result<Option<CompanionPersona>, RepositoryError> {
        Ok(self.personas.lock().unwrap().get(companion_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Scripted model
// ---------------------------------------------------------------------------

/// A model whose replies are scripted ahead of time.
///
/// Queued outcomes are consumed first; afterwards every call gets the
/// default outcome.
pub struct ScriptedModel {
    default: Result<String, ProviderError>,
    queue: Mutex<VecDeque<Result<String, ProviderError>>>,
    delay: Mutex<Option<Duration>>,
    quality: Mutex<Result<f32, ProviderError>>,
    calls: AtomicU32,
    last_probe: Mutex<Option<QualityProbe>>,
    last_segments: Mutex<Vec<PromptSegment>>,
}

impl ScriptedModel {
    pub fn replying(text: &str) -> Self {
        Self::with_default(Ok(text.to_string()))
    }

    pub fn failing(err: ProviderError) -> Self {
        Self::with_default(Err(err))
    }

    fn with_default(default: Result<String, ProviderError>) -> Self {
        Self {
            default,
            queue: Mutex::new(VecDeque::new()),
            delay: Mutex::new(None),
            quality: Mutex::new(Ok(0.6)),
            calls: AtomicU32::new(0),
            last_probe: Mutex::new(None),
            last_segments: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, text: &str) {
        self.queue.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_error(&self, err: ProviderError) {
        self.queue.lock().unwrap().push_back(Err(err));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_quality(&self, err: ProviderError) {
        *self.quality.lock().unwrap() = Err(err);
    }

    pub fn complete_calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_probe(&self) -> Option<QualityProbe> {
        self.last_probe.lock().unwrap().clone()
    }

    pub fn last_segments(&self) -> Vec<PromptSegment> {
        self.last_segments.lock().unwrap().clone()
    }
}

impl CompanionModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, segments: &[PromptSegment], _params: &ModelParams) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_segments.lock().unwrap() = segments.to_vec();
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.queue.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.default.clone())
    }

    async fn score_quality(&self, probe: &QualityProbe) -> Result<f32, ProviderError> {
        *self.last_probe.lock().unwrap() = Some(probe.clone());
        self.quality.lock().unwrap().clone()
    }
}
