//! RelationshipRepository trait definition.

use kindred_types::error::RepositoryError;
use kindred_types::relationship::RelationshipState;
use uuid::Uuid;

/// Repository trait for per-pair relationship state.
///
/// Implementations live in kindred-infra (e.g., `SqliteRelationshipRepository`).
pub trait RelationshipRepository: Send + Sync {
    /// Get the state for a (user, companion) pair, if one exists.
    fn get(
        &self,
        user_id: &Uuid,
        companion_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<RelationshipState>, RepositoryError>> + Send;

    /// Insert or replace the state for its pair.
    fn save(
        &self,
        state: &RelationshipState,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
