//! Context assembly.
//!
//! Builds the ordered prompt for one reply: the system segment, as much
//! recent history as fits the token budget, and the newest user message.

use kindred_types::chat::{Message, SenderKind};
use kindred_types::config::{ContextConfig, StageDefinition};
use kindred_types::error::PipelineError;
use kindred_types::llm::{PromptSegment, SegmentRole};
use kindred_types::persona::CompanionPersona;
use kindred_types::relationship::RelationshipState;

use super::prompt::SystemPromptBuilder;
use super::tokens::TokenEstimator;

/// Everything a single context build reads.
#[derive(Debug, Clone, Copy)]
pub struct ContextInput<'a> {
    /// Recent messages, oldest first.
    pub history: &'a [Message],
    pub persona: &'a CompanionPersona,
    pub relationship: &'a RelationshipState,
    pub stage: &'a StageDefinition,
    pub max_tokens: u32,
}

/// Deterministic, budgeted prompt builder.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    estimator: TokenEstimator,
}

impl ContextAssembler {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            estimator: TokenEstimator::new(config.chars_per_token),
        }
    }

    pub fn estimator(&self) -> TokenEstimator {
        self.estimator
    }

    /// Build the prompt segments for a reply to the newest user message.
    ///
    /// The system segment and the newest user message are always present, even
    /// if together they exceed the budget. Older history is added newest-first
    /// while each whole message fits; the first message that does not fit ends
    /// the walk, so included history is always contiguous. Messages after the
    /// newest user message are ignored.
    pub fn build_context(&self, input: ContextInput<'_>) -> Result<Vec<PromptSegment>, PipelineError> {
        let newest_user = input
            .history
            .iter()
            .rposition(|m| m.sender == SenderKind::User)
            .ok_or_else(|| {
                PipelineError::Validation("no user message to reply to".to_string())
            })?;

        let system = self.segment(
            SegmentRole::System,
            SystemPromptBuilder::build(input.persona, input.relationship, input.stage),
        );
        let latest = self.message_segment(&input.history[newest_user]);

        let mut remaining = input
            .max_tokens
            .saturating_sub(system.token_estimate)
            .saturating_sub(latest.token_estimate);

        let mut older = Vec::new();
        for message in input.history[..newest_user].iter().rev() {
            let segment = self.message_segment(message);
            if segment.token_estimate > remaining {
                break;
            }
            remaining -= segment.token_estimate;
            older.push(segment);
        }

        let mut segments = Vec::with_capacity(older.len() + 2);
        segments.push(system);
        segments.extend(older.into_iter().rev());
        segments.push(latest);
        Ok(segments)
    }

    fn message_segment(&self, message: &Message) -> PromptSegment {
        let role = match message.sender {
            SenderKind::User => SegmentRole::User,
            SenderKind::Companion => SegmentRole::Companion,
        };
        self.segment(role, message.payload.render())
    }

    fn segment(&self, role: SegmentRole, content: String) -> PromptSegment {
        PromptSegment {
            role,
            token_estimate: self.estimator.estimate(&content),
            content,
        }
    }
}
