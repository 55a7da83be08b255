//! Business logic and trait definitions for Kindred.
//!
//! This crate defines the "ports" (store, persona and model traits) that the
//! infrastructure layer implements, plus every algorithm of the message
//! pipeline. It depends only on `kindred-types` -- never on `kindred-infra`
//! or any database/IO crate.

pub mod ai;
pub mod analytics;
pub mod context;
pub mod conversation;
pub mod event;
pub mod persona;
pub mod pipeline;
pub mod relationship;

#[cfg(test)]
pub(crate) mod testing;
