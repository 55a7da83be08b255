//! Relationship progression: the stage ladder, the pure engine and the
//! serialized tracker that persists its results.

pub mod engine;
pub mod ladder;
pub mod repository;
pub mod tracker;
