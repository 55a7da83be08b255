//! Read-side insights: conversation intelligence, topic suggestions,
//! engagement analysis and response quality.

use std::collections::BTreeSet;

use kindred_types::chat::{Conversation, SenderKind};
use kindred_types::config::StageDefinition;
use kindred_types::engagement::{EngagementAnalysis, EngagementRecord};
use kindred_types::error::PipelineError;
use kindred_types::persona::CompanionPersona;
use kindred_types::pipeline::{
    ConversationIntelligence, ResponseQuality, SuggestionSource, TopicSuggestion,
};
use uuid::Uuid;

use super::coordinator::MessagePipeline;
use crate::ai::provider::CompanionModel;
use crate::analytics::aggregator::{dominant_tone, mentioned_topics};
use crate::analytics::repository::EngagementRepository;
use crate::conversation::repository::ConversationStore;
use crate::persona::PersonaDirectory;
use crate::relationship::repository::RelationshipRepository;

/// Messages considered "recent" when avoiding repeated topics.
const RECENT_WINDOW: u32 = 6;

/// Conversation starters used when nothing better is available, by stage
/// position on the ladder.
const STAGE_DEFAULTS: &[(&str, &str)] = &[
    (
        "getting to know you",
        "Ask what they like to do on a free weekend.",
    ),
    (
        "plans",
        "Ask what they are looking forward to this week.",
    ),
    (
        "feelings",
        "Ask how they have really been feeling lately.",
    ),
    (
        "dreams",
        "Ask about a dream they have not told anyone about.",
    ),
];

impl<C, R, E, P, M> MessagePipeline<C, R, E, P, M>
where
    C: ConversationStore,
    R: RelationshipRepository,
    E: EngagementRepository,
    P: PersonaDirectory,
    M: CompanionModel + 'static,
{
    /// Everything known about a conversation in one snapshot.
    pub async fn get_conversation_intelligence(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<ConversationIntelligence, PipelineError> {
        let conversation = self.owned_conversation(&user_id, &conversation_id).await?;
        let relationship = self
            .relationships
            .repo()
            .get(&user_id, &conversation.companion_id)
            .await?;
        let stage_progress = relationship
            .as_ref()
            .map(|state| self.relationships.engine().ladder().progress(state));
        let engagement = self.analytics.repo().get_record(&conversation.id).await?;
        let milestones = self
            .analytics
            .repo()
            .list_milestones(&user_id, &conversation.companion_id)
            .await?;
        let suggested_topic = self
            .suggest_for(&conversation, engagement.as_ref())
            .await?;

        Ok(ConversationIntelligence {
            dominant_tone: engagement.as_ref().and_then(dominant_tone),
            conversation,
            relationship,
            stage_progress,
            engagement,
            milestones,
            suggested_topic,
        })
    }

    /// A topic the companion could bring up next.
    pub async fn suggest_next_topic(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<TopicSuggestion, PipelineError> {
        let conversation = self.owned_conversation(&user_id, &conversation_id).await?;
        let engagement = self.analytics.repo().get_record(&conversation.id).await?;
        self.suggest_for(&conversation, engagement.as_ref()).await
    }

    /// Engagement roll-up across every conversation of a pair.
    pub async fn analyze_engagement(
        &self,
        user_id: Uuid,
        companion_id: Uuid,
    ) -> Result<EngagementAnalysis, PipelineError> {
        self.analytics.analyze(user_id, companion_id).await
    }

    /// Stored quality details of a companion message.
    pub async fn get_response_quality(
        &self,
        user_id: Uuid,
        message_id: Uuid,
    ) -> Result<ResponseQuality, PipelineError> {
        let message = self.get_message(user_id, message_id).await?;
        if message.sender != SenderKind::Companion {
            return Err(PipelineError::Validation(
                "only companion messages have a response quality".to_string(),
            ));
        }
        Ok(ResponseQuality {
            message_id: message.id,
            quality_score: message.quality_score,
            sentiment: message.sentiment,
            token_count: message.token_count,
        })
    }

    async fn suggest_for(
        &self,
        conversation: &Conversation,
        engagement: Option<&EngagementRecord>,
    ) -> Result<TopicSuggestion, PipelineError> {
        let persona = self.persona(&conversation.companion_id).await?;
        let recent = self
            .conversations
            .recent_messages(&conversation.id, RECENT_WINDOW)
            .await?;
        let rendered: Vec<String> = recent.iter().map(|m| m.payload.render()).collect();
        let recent_topics = mentioned_topics(
            self.analytics.topics(),
            rendered.iter().map(String::as_str),
        );
        let recent_text = rendered.join(" ").to_lowercase();

        let relationship = self
            .relationships
            .snapshot(conversation.user_id, conversation.companion_id)
            .await?;
        let ladder = self.relationships.engine().ladder();
        let stage_index = ladder.index_for(relationship.intimacy_level, relationship.message_count);

        Ok(suggest_topic(
            &persona,
            engagement.map(|e| e.preferred_topics.as_slice()).unwrap_or_default(),
            &recent_topics,
            &recent_text,
            &ladder.stages()[stage_index],
            stage_index,
        ))
    }
}

/// Pick the next topic deterministically.
///
/// The user's preferred topics come first, then the persona's interests, in
/// their stored order; anything mentioned in the recent messages is skipped.
/// With nothing left, fall back to a starter for the current stage.
pub fn suggest_topic(
    persona: &CompanionPersona,
    preferred_topics: &[String],
    recent_topics: &BTreeSet<String>,
    recent_text: &str,
    stage: &StageDefinition,
    stage_index: usize,
) -> TopicSuggestion {
    let fresh = |topic: &str| {
        let lowered = topic.trim().to_lowercase();
        !lowered.is_empty() && !recent_topics.contains(&lowered) && !recent_text.contains(&lowered)
    };

    if let Some(topic) = preferred_topics.iter().find(|t| fresh(t)) {
        return TopicSuggestion {
            topic: topic.clone(),
            prompt: format!("Ask how things have been going with {topic} lately."),
            source: SuggestionSource::PreferredTopic,
        };
    }

    if let Some(interest) = persona.interests.iter().find(|t| fresh(t)) {
        return TopicSuggestion {
            topic: interest.clone(),
            prompt: format!(
                "Share something {} loves about {interest} and ask if they are into it too.",
                persona.name
            ),
            source: SuggestionSource::PersonaInterest,
        };
    }

    let (topic, prompt) = STAGE_DEFAULTS[stage_index.min(STAGE_DEFAULTS.len() - 1)];
    TopicSuggestion {
        topic: topic.to_string(),
        prompt: if stage.guidance.is_empty() {
            prompt.to_string()
        } else {
            format!("{prompt} {}", stage.guidance)
        },
        source: SuggestionSource::StageDefault,
    }
}
