//! Anthropic Claude companion model.
//!
//! This module provides [`AnthropicModel`], which implements the
//! [`CompanionModel`](kindred_core::ai::provider::CompanionModel) trait for
//! the Anthropic Messages API.

pub mod client;
pub mod types;

pub use client::AnthropicModel;
