//! Filesystem-backed companion personas.
//!
//! Each companion is a Markdown file at `{data_dir}/companions/{id}.md`
//! with YAML frontmatter for the structured fields and the body as the
//! backstory:
//!
//! ```text
//! ---
//! name: Ava
//! traits: [curious, warm]
//! style: playful and teasing
//! interests: [astronomy, jazz]
//! quirks: [hums when thinking]
//! ---
//! Ava grew up in a lighthouse...
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use uuid::Uuid;

use kindred_core::persona::PersonaDirectory;
use kindred_types::error::RepositoryError;
use kindred_types::persona::CompanionPersona;

/// Parsed persona frontmatter fields.
#[derive(Debug, Clone, Deserialize)]
struct PersonaFrontmatter {
    name: String,
    #[serde(default)]
    traits: Vec<String>,
    #[serde(default)]
    style: String,
    #[serde(default)]
    interests: Vec<String>,
    #[serde(default)]
    quirks: Vec<String>,
}

/// Split a Markdown document into its frontmatter and body.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let trimmed = content.trim_start();
    let after_opening = trimmed.strip_prefix("---")?;
    let closing_pos = after_opening.find("\n---")?;
    let frontmatter = after_opening[..closing_pos].trim();
    let body = after_opening[closing_pos + 4..].trim_start_matches(['\n', '\r']);

    Some((frontmatter, body))
}

/// Parse a persona document for the given companion.
pub fn parse_persona(companion_id: Uuid, content: &str) -> Result<CompanionPersona, RepositoryError> {
    let (yaml, body) = split_frontmatter(content)
        .ok_or_else(|| RepositoryError::Query("persona file has no frontmatter".to_string()))?;
    let fm: PersonaFrontmatter = serde_yaml_ng::from_str(yaml)
        .map_err(|e| RepositoryError::Query(format!("invalid persona frontmatter: {e}")))?;

    Ok(CompanionPersona {
        companion_id,
        name: fm.name,
        traits: fm.traits,
        style: fm.style,
        interests: fm.interests,
        quirks: fm.quirks,
        backstory: body.trim().to_string(),
    })
}

/// Reads personas from `{root}/{companion_id}.md`.
pub struct FsPersonaDirectory {
    root: PathBuf,
}

impl FsPersonaDirectory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The conventional location inside a data directory.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("companions"))
    }

    pub fn persona_path(&self, companion_id: &Uuid) -> PathBuf {
        self.root.join(format!("{companion_id}.md"))
    }
}

impl PersonaDirectory for FsPersonaDirectory {
    async fn get_persona(&self, companion_id: &Uuid) -> Result<Option<CompanionPersona>, RepositoryError> {
        let path = self.persona_path(companion_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(RepositoryError::Query(format!(
                    "failed to read {}: {err}",
                    path.display()
                )));
            }
        };

        parse_persona(*companion_id, &content).map(Some)
    }
}
