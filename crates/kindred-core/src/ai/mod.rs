//! Provider abstraction and the reply orchestrator.

pub mod backoff;
pub mod orchestrator;
pub mod provider;
