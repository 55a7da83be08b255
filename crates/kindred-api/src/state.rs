//! Application state wiring the pipeline to concrete infrastructure.
//!
//! The pipeline is generic over its stores, persona directory and model;
//! AppState pins them to the SQLite, filesystem and Anthropic implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;

use kindred_core::pipeline::MessagePipeline;
use kindred_infra::config::{load_config, resolve_data_dir};
use kindred_infra::llm::anthropic::AnthropicModel;
use kindred_infra::llm::{API_KEY_VAR, api_key_from_env, create_model};
use kindred_infra::persona::FsPersonaDirectory;
use kindred_infra::sqlite::conversation::SqliteConversationStore;
use kindred_infra::sqlite::engagement::SqliteEngagementRepository;
use kindred_infra::sqlite::pool::{DatabasePool, documents_url, relational_url};
use kindred_infra::sqlite::relationship::SqliteRelationshipRepository;

/// Concrete pipeline pinned to infra implementations.
pub type ConcretePipeline = MessagePipeline<
    SqliteConversationStore,
    SqliteRelationshipRepository,
    SqliteEngagementRepository,
    FsPersonaDirectory,
    AnthropicModel,
>;

/// Optional override of the Anthropic endpoint (proxies, local mocks).
const BASE_URL_VAR: &str = "ANTHROPIC_BASE_URL";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ConcretePipeline>,
    pub data_dir: PathBuf,
    model_ready: bool,
}

impl AppState {
    /// Initialize the application state: open both stores, load config,
    /// wire the pipeline.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;

        let documents = DatabasePool::documents(&documents_url(&data_dir))
            .await
            .context("Failed to open the document store")?;
        let relational = DatabasePool::relational(&relational_url(&data_dir))
            .await
            .context("Failed to open the relational store")?;

        let base_url = std::env::var(BASE_URL_VAR).ok();
        let (model, model_ready) = match create_model(api_key_from_env().as_deref(), base_url.as_deref()) {
            Ok(model) => (model, true),
            Err(err) => {
                // Read-only commands still work; send and retry refuse to run.
                tracing::debug!(error = %err, "companion model not configured");
                (AnthropicModel::new(SecretString::from(String::new())), false)
            }
        };

        let pipeline = MessagePipeline::new(
            config,
            SqliteConversationStore::new(documents),
            SqliteRelationshipRepository::new(relational.clone()),
            SqliteEngagementRepository::new(relational),
            FsPersonaDirectory::in_data_dir(&data_dir),
            Arc::new(model),
        )?;

        Ok(Self {
            pipeline: Arc::new(pipeline),
            data_dir,
            model_ready,
        })
    }

    /// Fail early when a command needs the companion model but no key is set.
    pub fn ensure_model(&self) -> anyhow::Result<()> {
        if self.model_ready {
            Ok(())
        } else {
            anyhow::bail!("{API_KEY_VAR} is not set; export it to talk to companions")
        }
    }
}
