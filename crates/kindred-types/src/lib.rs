//! Shared domain types for Kindred.
//!
//! This crate contains the core domain types used across the Kindred companion
//! chat backend: conversations and messages, relationship state, engagement
//! analytics, provider contracts, configuration, and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod engagement;
pub mod error;
pub mod event;
pub mod llm;
pub mod persona;
pub mod pipeline;
pub mod relationship;
