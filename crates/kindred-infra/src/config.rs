//! Configuration loading for Kindred.
//!
//! Reads `config.toml` from the data directory (`~/.kindred/` in production)
//! and deserializes it into [`KindredConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use kindred_types::config::KindredConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_VAR: &str = "KINDRED_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `KINDRED_DATA_DIR` environment variable
/// 2. `~/.kindred`
/// 3. `./.kindred`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_VAR) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".kindred");
    }

    PathBuf::from(".kindred")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`KindredConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and
///   returns the default.
pub async fn load_config(data_dir: &Path) -> KindredConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return KindredConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return KindredConfig::default();
        }
    };

    match toml::from_str::<KindredConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            KindredConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.progression.stages.len(), 4);
        assert_eq!(config.orchestrator.max_retries, 2);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[progression]
max_intimacy = 50

[[progression.stages]]
name = "stranger"
min_intimacy = 0

[[progression.stages]]
name = "pal"
min_intimacy = 5
min_messages = 5

[orchestrator]
max_retries = 4
quality_scoring = false
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.progression.max_intimacy, 50);
        assert_eq!(config.progression.stages[1].name, "pal");
        assert_eq!(config.orchestrator.max_retries, 4);
        assert!(!config.orchestrator.quality_scoring);
        // Untouched sections keep their defaults.
        assert_eq!(config.context.max_tokens, 4_000);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.progression.max_intimacy, 100);
    }

    #[test]
    fn resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var(DATA_DIR_VAR, "/tmp/test-kindred");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-kindred"));
        unsafe {
            std::env::remove_var(DATA_DIR_VAR);
        }
    }
}
