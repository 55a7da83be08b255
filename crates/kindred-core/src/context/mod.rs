//! Bounded prompt construction from history, persona and relationship stage.

pub mod assembler;
pub mod prompt;
pub mod tokens;
