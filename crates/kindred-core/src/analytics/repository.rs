//! EngagementRepository trait definition.

use kindred_types::engagement::{EngagementRecord, Milestone};
use kindred_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for engagement records, the processed-exchange ledger and
/// milestones.
///
/// Implementations live in kindred-infra (e.g., `SqliteEngagementRepository`).
pub trait EngagementRepository: Send + Sync {
    /// The record for one conversation.
    fn get_record(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<EngagementRecord>, RepositoryError>> + Send;

    /// Every record of a (user, companion) pair.
    fn list_records(
        &self,
        user_id: &Uuid,
        companion_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<EngagementRecord>, RepositoryError>> + Send;

    /// Whether an exchange has already been folded into a record.
    fn is_recorded(
        &self,
        exchange_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Atomically mark the exchange processed, upsert the record and insert
    /// its milestones.
    ///
    /// Returns `false`, writing nothing, if the exchange was already processed.
    fn commit_exchange(
        &self,
        exchange_id: &Uuid,
        record: &EngagementRecord,
        milestones: &[Milestone],
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Insert a milestone outside an exchange (e.g., a stage lost to decay).
    fn record_milestone(
        &self,
        milestone: &Milestone,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Milestones of a pair, oldest first.
    fn list_milestones(
        &self,
        user_id: &Uuid,
        companion_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Milestone>, RepositoryError>> + Send;
}
