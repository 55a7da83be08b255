//! Conversation and message persistence abstractions.
//!
//! `ConversationStore` is implemented by the document store in kindred-infra.
//! `cursor` turns store positions into opaque pagination tokens.

pub mod cursor;
pub mod repository;
