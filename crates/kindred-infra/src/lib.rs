//! Infrastructure layer for Kindred.
//!
//! Contains implementations of the traits defined in `kindred-core`: the
//! SQLite document and relational stores, the Anthropic companion model,
//! filesystem personas, and configuration loading.

pub mod config;
pub mod llm;
pub mod persona;
pub mod sqlite;
