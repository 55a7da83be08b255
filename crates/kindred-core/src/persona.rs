//! PersonaDirectory trait definition.
//!
//! Companions are managed by an external catalogue; the pipeline only reads
//! their personas. Implementations live in kindred-infra (e.g.,
//! `FsPersonaDirectory`).

use kindred_types::error::RepositoryError;
use kindred_types::persona::CompanionPersona;
use uuid::Uuid;

pub trait PersonaDirectory: Send + Sync {
    /// Look up a companion's persona. `None` if the companion is unknown.
    fn get_persona(
        &self,
        companion_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<CompanionPersona>, RepositoryError>> + Send;
}
