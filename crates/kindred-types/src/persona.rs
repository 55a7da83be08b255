//! Companion persona, owned by an external companion catalogue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only personality profile of a companion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionPersona {
    pub companion_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub traits: Vec<String>,
    /// Speaking style, e.g. "warm and teasing".
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub quirks: Vec<String>,
    #[serde(default)]
    pub backstory: String,
}
