//! Relationship progression engine.
//!
//! Pure state transitions over `RelationshipState`. The engine never touches
//! storage; [`RelationshipTracker`](super::tracker::RelationshipTracker) runs
//! it inside a load -> compute -> store cycle.

use chrono::{DateTime, Duration, Utc};
use kindred_types::config::ProgressionConfig;
use kindred_types::error::PipelineError;
use kindred_types::relationship::{
    RelationshipState, RelationshipUpdate, StageTransition, TransitionCause,
};
use uuid::Uuid;

use super::ladder::StageLadder;

/// Quality signal attached to a completed exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeSignal {
    /// Trimmed character count of the user's text, `None` for media messages.
    pub user_text_chars: Option<usize>,
    pub quality_score: Option<f32>,
    /// Sentiment score of the user message in `[-1.0, 1.0]`.
    pub sentiment_score: f32,
}

/// Computes intimacy deltas and stage changes.
#[derive(Debug, Clone)]
pub struct ProgressionEngine {
    ladder: StageLadder,
    config: ProgressionConfig,
}

impl ProgressionEngine {
    pub fn new(config: ProgressionConfig) -> Result<Self, PipelineError> {
        let ladder = StageLadder::new(config.stages.clone())?;
        Ok(Self { ladder, config })
    }

    pub fn ladder(&self) -> &StageLadder {
        &self.ladder
    }

    /// A fresh relationship at the initial stage.
    pub fn initial_state(&self, user_id: Uuid, companion_id: Uuid, now: DateTime<Utc>) -> RelationshipState {
        RelationshipState::initial(user_id, companion_id, &self.ladder.initial().name, now)
    }

    /// Intimacy earned by an exchange.
    ///
    /// Degenerate exchanges (empty or near-empty text) earn nothing. Others
    /// earn the base delta, plus the bonus when either the quality score or
    /// the user's sentiment clears its threshold.
    pub fn delta_for(&self, signal: &ExchangeSignal) -> u32 {
        if let Some(chars) = signal.user_text_chars {
            if chars <= self.config.degenerate_max_chars {
                return 0;
            }
        }

        let quality_bonus = signal
            .quality_score
            .is_some_and(|q| q >= self.config.quality_bonus_threshold);
        let sentiment_bonus = signal.sentiment_score >= self.config.sentiment_bonus_threshold;

        if quality_bonus || sentiment_bonus {
            self.config.base_delta + self.config.bonus_delta
        } else {
            self.config.base_delta
        }
    }

    /// Apply one completed exchange.
    ///
    /// Message count always grows by one, intimacy by [`Self::delta_for`]
    /// (capped at `max_intimacy`), and the stage is re-derived from both. An
    /// exchange id equal to the last applied one is a replay and changes nothing.
    pub fn apply_exchange(
        &self,
        state: RelationshipState,
        exchange_id: Uuid,
        signal: &ExchangeSignal,
        at: DateTime<Utc>,
    ) -> RelationshipUpdate {
        if state.last_exchange_id == Some(exchange_id) {
            return RelationshipUpdate {
                state,
                intimacy_delta: 0,
                transition: None,
                replayed: true,
            };
        }

        let delta = self.delta_for(signal);
        let previous_stage = state.stage.clone();
        let previous_intimacy = state.intimacy_level;
        let intimacy_level = state
            .intimacy_level
            .saturating_add(delta)
            .min(self.config.max_intimacy)
            .max(state.intimacy_level);
        let message_count = state.message_count.saturating_add(1);
        let stage = self.ladder.stage_for(intimacy_level, message_count).name.clone();

        let next = RelationshipState {
            stage,
            intimacy_level,
            message_count,
            last_interaction_at: Some(at),
            last_exchange_id: Some(exchange_id),
            updated_at: at,
            ..state
        };

        let transition = self.transition(&previous_stage, &next, TransitionCause::Exchange, at);
        RelationshipUpdate {
            intimacy_delta: i64::from(next.intimacy_level) - i64::from(previous_intimacy),
            state: next,
            transition,
            replayed: false,
        }
    }

    /// Apply idle decay as of `now`.
    ///
    /// Each full idle day past the grace period costs `decay_per_day`
    /// intimacy, floored at zero. Days already decayed are not charged twice.
    /// The stage is re-derived and may move down.
    pub fn apply_decay(&self, state: RelationshipState, now: DateTime<Utc>) -> RelationshipUpdate {
        let unchanged = |state| RelationshipUpdate {
            state,
            intimacy_delta: 0,
            transition: None,
            replayed: false,
        };

        let Some(last) = state.last_interaction_at else {
            return unchanged(state);
        };
        if self.config.decay_per_day == 0 {
            return unchanged(state);
        }

        let grace_end = last + Duration::days(self.config.decay_grace_days.max(0));
        let from = match state.decayed_through {
            Some(through) if through > grace_end => through,
            _ => grace_end,
        };
        let idle_days = (now - from).num_days();
        if idle_days <= 0 {
            return unchanged(state);
        }

        let loss = u32::try_from(idle_days)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.config.decay_per_day);
        let previous_stage = state.stage.clone();
        let intimacy_level = state.intimacy_level.saturating_sub(loss);
        let lost = state.intimacy_level - intimacy_level;
        let stage = self.ladder.stage_for(intimacy_level, state.message_count).name.clone();

        let next = RelationshipState {
            stage,
            intimacy_level,
            decayed_through: Some(from + Duration::days(idle_days)),
            updated_at: now,
            ..state
        };

        let transition = self.transition(&previous_stage, &next, TransitionCause::Decay, now);
        RelationshipUpdate {
            state: next,
            intimacy_delta: -i64::from(lost),
            transition,
            replayed: false,
        }
    }

    fn transition(
        &self,
        previous_stage: &str,
        next: &RelationshipState,
        cause: TransitionCause,
        at: DateTime<Utc>,
    ) -> Option<StageTransition> {
        (previous_stage != next.stage).then(|| StageTransition {
            user_id: next.user_id,
            companion_id: next.companion_id,
            previous_stage: previous_stage.to_string(),
            new_stage: next.stage.clone(),
            intimacy_level: next.intimacy_level,
            cause,
            at,
        })
    }
}
