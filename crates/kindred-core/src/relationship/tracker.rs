//! Serialized relationship updates.
//!
//! Relationships outlive conversations, so two conversations with the same
//! companion can finish exchanges at the same moment. The tracker holds a
//! per-pair lock around every load -> compute -> store cycle so no update is
//! lost.

use chrono::{DateTime, Utc};
use kindred_types::error::PipelineError;
use kindred_types::relationship::{RelationshipState, RelationshipUpdate};
use tracing::{debug, info};
use uuid::Uuid;

use super::engine::{ExchangeSignal, ProgressionEngine};
use super::repository::RelationshipRepository;
use crate::pipeline::locks::KeyedLocks;

pub struct RelationshipTracker<R: RelationshipRepository> {
    repo: R,
    engine: ProgressionEngine,
    pub(crate) locks: KeyedLocks<(Uuid, Uuid)>,
}

impl<R: RelationshipRepository> RelationshipTracker<R> {
    pub fn new(repo: R, engine: ProgressionEngine) -> Self {
        Self {
            repo,
            engine,
            locks: KeyedLocks::new(),
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn engine(&self) -> &ProgressionEngine {
        &self.engine
    }

    /// Current state of a pair, or the initial state if they have never talked.
    ///
    /// Does not persist anything.
    pub async fn snapshot(
        &self,
        user_id: Uuid,
        companion_id: Uuid,
    ) -> Result<RelationshipState, PipelineError> {
        self.load_or_initial(user_id, companion_id, Utc::now()).await
    }

    /// Apply a completed exchange and persist the result.
    pub async fn record_exchange(
        &self,
        user_id: Uuid,
        companion_id: Uuid,
        exchange_id: Uuid,
        signal: &ExchangeSignal,
        at: DateTime<Utc>,
    ) -> Result<RelationshipUpdate, PipelineError> {
        let _guard = self.locks.lock(&(user_id, companion_id)).await;

        let current = self.load_or_initial(user_id, companion_id, at).await?;
        let update = self.engine.apply_exchange(current, exchange_id, signal, at);
        if update.replayed {
            debug!(%user_id, %companion_id, %exchange_id, "exchange already applied");
            return Ok(update);
        }

        self.repo.save(&update.state).await?;
        if let Some(transition) = &update.transition {
            info!(
                %user_id,
                %companion_id,
                from = %transition.previous_stage,
                to = %transition.new_stage,
                intimacy = transition.intimacy_level,
                "relationship stage changed"
            );
        }
        Ok(update)
    }

    /// Apply idle decay for a pair as of `now`.
    ///
    /// A pair with no stored state has nothing to decay.
    pub async fn decay(
        &self,
        user_id: Uuid,
        companion_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<RelationshipUpdate>, PipelineError> {
        let _guard = self.locks.lock(&(user_id, companion_id)).await;

        let Some(current) = self.repo.get(&user_id, &companion_id).await? else {
            return Ok(None);
        };
        let update = self.engine.apply_decay(current, now);
        if update.intimacy_delta != 0 || update.state.decayed_through.is_some() {
            self.repo.save(&update.state).await?;
        }
        if update.intimacy_delta != 0 {
            info!(
                %user_id,
                %companion_id,
                lost = -update.intimacy_delta,
                stage = %update.state.stage,
                "relationship decayed"
            );
        }
        Ok(Some(update))
    }

    async fn load_or_initial(
        &self,
        user_id: Uuid,
        companion_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<RelationshipState, PipelineError> {
        Ok(self
            .repo
            .get(&user_id, &companion_id)
            .await?
            .unwrap_or_else(|| self.engine.initial_state(user_id, companion_id, at)))
    }
}
