//! Database pools with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. A `DatabasePool` pairs a
//! multi-connection reader pool for concurrent reads with a single-connection
//! writer pool for serialized writes. Both use WAL journal mode and enforce
//! foreign keys.
//!
//! Kindred keeps two independent databases: the document store
//! (conversations and messages) and the relational store (relationships,
//! engagement records and milestones). Each has its own migration set.

use std::path::Path;
use std::str::FromStr;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

static DOCUMENT_MIGRATIONS: Migrator = sqlx::migrate!("../../migrations/documents");
static RELATIONAL_MIGRATIONS: Migrator = sqlx::migrate!("../../migrations/relational");

/// Split read/write pool for SQLite with WAL mode.
///
/// - `reader`: Multi-connection pool (up to 8) for concurrent SELECT queries.
/// - `writer`: Single-connection pool for serialized INSERT/UPDATE/DELETE.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open the document store, running its migrations.
    pub async fn documents(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::open(database_url, &DOCUMENT_MIGRATIONS).await
    }

    /// Open the relational store, running its migrations.
    pub async fn relational(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::open(database_url, &RELATIONAL_MIGRATIONS).await
    }

    async fn open(database_url: &str, migrator: &Migrator) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);
        let write_opts = base_opts;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(write_opts)
            .await?;

        // Run migrations on writer before opening reader pool
        migrator.run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(read_opts)
            .await?;

        Ok(Self { reader, writer })
    }
}

/// Document store URL inside the data directory.
pub fn documents_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("documents.db").display())
}

/// Relational store URL inside the data directory.
pub fn relational_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("relational.db").display())
}
