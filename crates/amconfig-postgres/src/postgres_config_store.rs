//! PostgresConfigStore - AlertConfigStore trait implementation for PostgreSQL

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use amconfig_core::{
    AlertConfigStore, AlertConfiguration, Error, OrgId, Result, SaveCallback,
    SaveConfigurationCmd, StoreConfig, StoreMetrics,
};

use crate::migrations;

// Transaction-scoped, released on commit or rollback.
const LOCK_ORG_SQL: &str = "SELECT pg_advisory_xact_lock($1)";

const SELECT_COLUMNS: &str = "SELECT id, org_id, configuration, configuration_hash, configuration_version, is_default FROM alert_configuration";

const INSERT_SQL: &str = r#"
    INSERT INTO alert_configuration
        (org_id, configuration, configuration_hash, configuration_version, is_default)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING id
"#;

// Inserts only while the org's tip row still carries the expected hash.
const COMPARE_AND_SWAP_SQL: &str = r#"
    INSERT INTO alert_configuration
        (org_id, configuration, configuration_hash, configuration_version, is_default)
    SELECT $1, $2, $3, $4, $5
    WHERE EXISTS (
        SELECT 1
        FROM alert_configuration
        WHERE org_id = $1
          AND id = (SELECT MAX(id) FROM alert_configuration WHERE org_id = $1)
          AND configuration_hash = $6
    )
    RETURNING id
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

/// PostgreSQL-backed alert configuration store
///
/// Every write takes a transaction-scoped advisory lock keyed by the org
/// before touching the table. Writers to one org therefore queue up, and the
/// conditional insert of a compare-and-swap (a fresh `READ COMMITTED`
/// statement snapshot taken after the lock is granted) always sees the tip
/// left by whichever writer committed before it. Writers to different orgs
/// never wait on each other.
#[derive(Clone)]
pub struct PostgresConfigStore {
    /// PostgreSQL connection pool
    pool: Arc<PgPool>,
    /// Optional Prometheus metrics
    metrics: Option<Arc<StoreMetrics>>,
}

impl PostgresConfigStore {
    /// Create a new PostgreSQL configuration store with default configuration
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    ///
    /// # Errors
    /// - `Error::Database` if connection fails or schema migration fails
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_config(database_url, StoreConfig::default()).await
    }

    /// Create a new PostgreSQL configuration store with custom configuration
    ///
    /// # Example
    /// ```no_run
    /// # use amconfig_postgres::PostgresConfigStore;
    /// # use amconfig_core::StoreConfig;
    /// # async fn example() -> amconfig_core::Result<()> {
    /// let config = StoreConfig::default()
    ///     .with_max_connections(50)
    ///     .with_min_connections(5);
    /// let store = PostgresConfigStore::with_config("postgres://localhost/alerting", config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_config(database_url: &str, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect(database_url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        let store = Self {
            pool: Arc::new(pool),
            metrics: None,
        };

        store.run_migrations().await?;

        Ok(store)
    }

    /// Create from an existing pool (useful for testing)
    ///
    /// Migrations are not run; call `run_migrations` when the schema may be missing.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
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
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn observe<T>(&self, operation: &str, started: Instant, result: &Result<T>) {
        if let Some(metrics) = &self.metrics {
            metrics.record(operation, started, result);
        }
    }

    async fn fetch_latest(&self, org_id: OrgId) -> Result<AlertConfiguration> {
        // BIGSERIAL ids only grow, so the highest one is the latest revision.
        let row: Option<ConfigurationRow> = sqlx::query_as(&format!(
            "{} WHERE org_id = $1 ORDER BY id DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(org_id.as_i64())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to query alert configuration: {}", e)))?;

        row.map(AlertConfiguration::from)
            .ok_or(Error::ConfigNotFound(org_id))
    }

    async fn fetch_all_latest(&self) -> Result<Vec<AlertConfiguration>> {
        let rows: Vec<ConfigurationRow> = sqlx::query_as(&format!(
            "{} WHERE id IN (SELECT MAX(id) FROM alert_configuration GROUP BY org_id) ORDER BY org_id",
            SELECT_COLUMNS
        ))
        .fetch_all(&*self.pool)
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

        lock_org(&mut tx, cmd.org_id).await?;

        let id: i64 = sqlx::query_scalar(INSERT_SQL)
            .bind(cmd.org_id.as_i64())
            .bind(&cmd.configuration)
            .bind(&cmd.configuration_hash)
            .bind(&cmd.configuration_version)
            .bind(cmd.default)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to insert alert configuration: {}", e)))?;

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

        lock_org(&mut tx, cmd.org_id).await?;

        let id: Option<i64> = sqlx::query_scalar(COMPARE_AND_SWAP_SQL)
            .bind(cmd.org_id.as_i64())
            .bind(&cmd.configuration)
            .bind(&cmd.configuration_hash)
            .bind(&cmd.configuration_version)
            .bind(cmd.default)
            .bind(expected_hash)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to update alert configuration: {}", e)))?;

        let Some(id) = id else {
            debug!(
                org_id = %cmd.org_id,
                expected_hash,
                "Alert configuration changed concurrently, rejecting update"
            );
            return Err(Error::ConcurrencyConflict(cmd.org_id));
        };

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit transaction: {}", e)))?;

        debug!(org_id = %cmd.org_id, id, "Updated alert configuration");

        Ok(())
    }
}

/// Serialize writers of one org until the transaction ends
async fn lock_org(tx: &mut Transaction<'_, Postgres>, org_id: OrgId) -> Result<()> {
    sqlx::query(LOCK_ORG_SQL)
        .bind(org_id.as_i64())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            Error::Database(format!("Failed to lock alert configuration of org {}: {}", org_id, e))
        })?;
    Ok(())
}

#[async_trait]
impl AlertConfigStore for PostgresConfigStore {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_transaction_scoped() {
        // Session-level locks would outlive a rolled back callback
        assert!(LOCK_ORG_SQL.contains("pg_advisory_xact_lock"));
    }

    #[test]
    fn test_compare_and_swap_sql_targets_org_tip() {
        assert!(COMPARE_AND_SWAP_SQL.contains("SELECT MAX(id) FROM alert_configuration WHERE org_id = $1"));
        assert!(COMPARE_AND_SWAP_SQL.contains("configuration_hash = $6"));
        assert!(COMPARE_AND_SWAP_SQL.contains("RETURNING id"));
    }
}
