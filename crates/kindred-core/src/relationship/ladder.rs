//! The stage ladder: a monotonic step function from (intimacy, message count)
//! to a relationship stage.

use kindred_types::config::StageDefinition;
use kindred_types::error::PipelineError;
use kindred_types::relationship::{RelationshipState, StageProgress};

/// Validated, ordered list of relationship stages.
#[derive(Debug, Clone)]
pub struct StageLadder {
    stages: Vec<StageDefinition>,
}

impl StageLadder {
    /// Build a ladder from configuration.
    ///
    /// The first stage must start at zero intimacy and zero messages, names
    /// must be unique, intimacy thresholds strictly increasing and message
    /// thresholds non-decreasing.
    pub fn new(stages: Vec<StageDefinition>) -> Result<Self, PipelineError> {
        let first = stages
            .first()
            .ok_or_else(|| PipelineError::Config("at least one stage is required".to_string()))?;
        if first.min_intimacy != 0 || first.min_messages != 0 {
            return Err(PipelineError::Config(format!(
                "first stage '{}' must start at zero",
                first.name
            )));
        }

        for pair in stages.windows(2) {
            if pair[1].min_intimacy <= pair[0].min_intimacy {
                return Err(PipelineError::Config(format!(
                    "stage '{}' must require more intimacy than '{}'",
                    pair[1].name, pair[0].name
                )));
            }
            if pair[1].min_messages < pair[0].min_messages {
                return Err(PipelineError::Config(format!(
                    "stage '{}' requires fewer messages than '{}'",
                    pair[1].name, pair[0].name
                )));
            }
        }

        for (i, stage) in stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(PipelineError::Config("stage names cannot be empty".to_string()));
            }
            if stages[..i].iter().any(|s| s.name == stage.name) {
                return Err(PipelineError::Config(format!(
                    "duplicate stage '{}'",
                    stage.name
                )));
            }
        }

        Ok(Self { stages })
    }

    pub fn initial(&self) -> &StageDefinition {
        &self.stages[0]
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Index of the highest stage whose minimums are both met.
    pub fn index_for(&self, intimacy: u32, messages: u32) -> usize {
        self.stages
            .iter()
            .rposition(|s| intimacy >= s.min_intimacy && messages >= s.min_messages)
            .unwrap_or(0)
    }

    /// The stage for the given intimacy level and message count.
    pub fn stage_for(&self, intimacy: u32, messages: u32) -> &StageDefinition {
        &self.stages[self.index_for(intimacy, messages)]
    }

    /// How far a relationship is from its next stage.
    pub fn progress(&self, state: &RelationshipState) -> StageProgress {
        let idx = self.index_for(state.intimacy_level, state.message_count);
        let current = &self.stages[idx];

        match self.stages.get(idx + 1) {
            None => StageProgress {
                current_stage: current.name.clone(),
                next_stage: None,
                intimacy_needed: 0,
                messages_needed: 0,
                progress: 1.0,
            },
            Some(next) => {
                let span = (next.min_intimacy - current.min_intimacy) as f64;
                let gained = state.intimacy_level.saturating_sub(current.min_intimacy) as f64;
                StageProgress {
                    current_stage: current.name.clone(),
                    next_stage: Some(next.name.clone()),
                    intimacy_needed: next.min_intimacy.saturating_sub(state.intimacy_level),
                    messages_needed: next.min_messages.saturating_sub(state.message_count),
                    progress: (gained / span).clamp(0.0, 1.0),
                }
            }
        }
    }
}
