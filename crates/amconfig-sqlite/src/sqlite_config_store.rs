//! SqliteConfigStore - AlertConfigStore trait implementation for a single SQLite file

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use amconfig_core::{
    AlertConfigStore, AlertConfiguration, Error, OrgId, Result, SaveCallback,
    SaveConfigurationCmd, StoreConfig, StoreMetrics,
};

use crate::migrations;

const SELECT_COLUMNS: &str = "SELECT id, org_id, configuration, configuration_hash, configuration_version, is_default FROM alert_configuration";

const INSERT_SQL: &str = r#"
    INSERT INTO alert_configuration
        (org_id, configuration, configuration_hash, configuration_version, is_default)
    VALUES (?, ?, ?, ?, ?)
"#;

// Inserts only while the org's tip row still carries the expected hash.
const COMPARE_AND_SWAP_SQL: &str = r#"
    INSERT INTO alert_configuration
        (org_id, configuration, configuration_hash, configuration_version, is_default)
    SELECT ?, ?, ?, ?, ?
    WHERE EXISTS (
        SELECT 1
        FROM alert_configuration
        WHERE org_id = ?
          AND id = (SELECT MAX(id) FROM alert_configuration WHERE org_id = ?)
          AND configuration_hash = ?
    )
"#;

#[derive(sqlx::FromRow)]
struct ConfigurationRow {
    id: i64,
    org_id: i64,
    configuration: String,
    configuration_hash: String,
    configuration_version: String,
    is_default: bool,
}

impl From<ConfigurationRow> for AlertConfiguration {
    fn from(row: ConfigurationRow) -> Self {
        Self {
            id: row.id,
            org_id: OrgId::new(row.org_id),
            configuration: row.configuration,
            configuration_hash: row.configuration_hash,
            configuration_version: row.configuration_version,
            default: row.is_default,
        }
    }
}

/// SQLite-backed alert configuration store
///
/// SQLite admits one writer at a time, so the conditional insert used for
/// compare-and-swap runs under the database write lock and cannot interleave
/// with another writer's insert.
#[derive(Clone)]
pub struct SqliteConfigStore {
    /// SQLite connection pool
    pool: SqlitePool,
    /// Optional Prometheus metrics
    metrics: Option<Arc<StoreMetrics>>,
}

impl SqliteConfigStore {
    /// Open (creating if needed) the database at `db_path` with default pool settings
    ///
    /// A leading `~` is expanded to the home directory.
    ///
    /// # Errors
    /// - `Error::Database` if the connection or a schema migration fails
    /// - `Error::Config` if the home directory cannot be determined
    pub async fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(db_path, StoreConfig::default()).await
    }

    /// Open the database at `db_path` with custom pool settings
    pub async fn with_config(db_path: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let db_path = expand_tilde(db_path.into())?;

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Config(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect_with(connect_options(&db_path))
            .await
            .map_err(|e| Error::Database(format!("Failed to open SQLite database: {}", e)))?;

        let store = Self::from_pool(pool);
        store.run_migrations().await?;

        info!("Opened alert configuration store at {}", db_path.display());

        Ok(store)
    }

    /// Create from an existing pool (useful for testing)
    ///
    /// Migrations are not run; call `run_migrations` when the schema may be missing.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            metrics: None,
        }
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<StoreMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Apply pending schema migrations
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn observe<T>(&self, operation: &str, started: Instant, result: &Result<T>) {
        if let Some(metrics) = &self.metrics {
            metrics.record(operation, started, result);
        }
    }

    async fn fetch_latest(&self, org_id: OrgId) -> Result<AlertConfiguration> {
        // The id is an autoincrement column, so the highest one is the latest revision.
        let row: Option<ConfigurationRow> =
            sqlx::query_as(&format!("{} WHERE org_id = ? ORDER BY id DESC LIMIT 1", SELECT_COLUMNS))
                .bind(org_id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(format!("Failed to query alert configuration: {}", e))
                })?;

        row.map(AlertConfiguration::from)
            .ok_or(Error::ConfigNotFound(org_id))
    }

    async fn fetch_all_latest(&self) -> Result<Vec<AlertConfiguration>> {
        let rows: Vec<ConfigurationRow> = sqlx::query_as(&format!(
            "{} WHERE id IN (SELECT MAX(id) FROM alert_configuration GROUP BY org_id) ORDER BY org_id",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(format!("Failed to query latest alert configurations: {}", e))
        })?;

        Ok(rows.into_iter().map(AlertConfiguration::from).collect())
    }

    async fn insert_with_callback(
        &self,
        cmd: SaveConfigurationCmd,
        callback: SaveCallback<'_>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to start transaction: {}", e)))?;

        let result = sqlx::query(INSERT_SQL)
            .bind(cmd.org_id.as_i64())
            .bind(&cmd.configuration)
            .bind(&cmd.configuration_hash)
            .bind(&cmd.configuration_version)
            .bind(cmd.default)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to insert alert configuration: {}", e)))?;

        let id = result.last_insert_rowid();

        if let Err(e) = callback().await {
            warn!(
                org_id = %cmd.org_id,
                "Save callback failed, rolling back alert configuration {}: {}", id, e
            );
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Failed to roll back transaction: {}", rollback_err);
            }
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit transaction: {}", e)))?;

        debug!(org_id = %cmd.org_id, id, "Saved alert configuration");

        Ok(())
    }

    async fn conditional_insert(
        &self,
        cmd: SaveConfigurationCmd,
        expected_hash: &str,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to start transaction: {}", e)))?;

        let result = sqlx::query(COMPARE_AND_SWAP_SQL)
            .bind(cmd.org_id.as_i64())
            .bind(&cmd.configuration)
            .bind(&cmd.configuration_hash)
            .bind(&cmd.configuration_version)
            .bind(cmd.default)
            .bind(cmd.org_id.as_i64())
            .bind(cmd.org_id.as_i64())
            .bind(expected_hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to update alert configuration: {}", e)))?;

        if result.rows_affected() == 0 {
            debug!(
                org_id = %cmd.org_id,
                expected_hash,
                "Alert configuration changed concurrently, rejecting update"
            );
            return Err(Error::ConcurrencyConflict(cmd.org_id));
        }

        let id = result.last_insert_rowid();

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit transaction: {}", e)))?;

        debug!(org_id = %cmd.org_id, id, "Updated alert configuration");

        Ok(())
    }
}

#[async_trait]
impl AlertConfigStore for SqliteConfigStore {
    async fn get_latest(&self, org_id: OrgId) -> Result<AlertConfiguration> {
        let started = Instant::now();
        let result = self.fetch_latest(org_id).await;
        self.observe("get_latest", started, &result);
        result
    }

    async fn get_all_latest(&self) -> Result<Vec<AlertConfiguration>> {
        let started = Instant::now();
        let result = self.fetch_all_latest().await;
        self.observe("get_all_latest", started, &result);
        result
    }

    async fn save_with_callback(
        &self,
        cmd: SaveConfigurationCmd,
        callback: SaveCallback<'_>,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.insert_with_callback(cmd, callback).await;
        self.observe("save", started, &result);
        result
    }

    async fn compare_and_swap_update(
        &self,
        cmd: SaveConfigurationCmd,
        expected_hash: &str,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.conditional_insert(cmd, expected_hash).await;
        self.observe("compare_and_swap_update", started, &result);
        result
    }
}

fn connect_options(db_path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
}

/// Expand tilde (~) in path to home directory
fn expand_tilde(path: PathBuf) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir().ok_or_else(|| {
                Error::Config("Could not determine home directory".to_string())
            })?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path),
    }
}
