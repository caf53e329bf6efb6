//! Alert configuration store trait
//!
//! The `AlertConfigStore` trait abstracts over the relational backends that
//! keep the append-only revision history of every org's alert configuration.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{
    Result,
    revision::{AlertConfiguration, SaveConfigurationCmd},
    tenant::OrgId,
};

/// Callback run after a revision is inserted and before the transaction commits
///
/// Returning an error rolls back the transaction, insert included, and the
/// error is handed back to the caller unchanged.
pub type SaveCallback<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<()>> + Send + 'a>;

/// A callback that always succeeds
pub fn noop_callback<'a>() -> SaveCallback<'a> {
    Box::new(|| Box::pin(async { Ok(()) }))
}

/// Box an async closure into a `SaveCallback`
///
/// # Example
/// ```
/// # use amconfig_core::{callback, Error};
/// let cb = callback(|| async { Err(Error::Callback("subscriber unavailable".to_string())) });
/// ```
pub fn callback<'a, F, Fut>(f: F) -> SaveCallback<'a>
where
    F: FnOnce() -> Fut + Send + 'a,
    Fut: std::future::Future<Output = Result<()>> + Send + 'a,
{
    Box::new(move || Box::pin(f()))
}

/// Alert configuration store trait
///
/// Implementations:
/// - `SqliteConfigStore`: SQLite file (single node)
/// - `PostgresConfigStore`: PostgreSQL (shared by many nodes)
///
/// # Example
/// ```no_run
/// # use amconfig_core::{AlertConfigStore, OrgId, SaveConfigurationCmd};
/// # async fn example(store: &dyn AlertConfigStore) -> amconfig_core::Result<()> {
/// let org = OrgId::new(1);
/// let current = store.get_latest(org).await?;
///
/// let cmd = SaveConfigurationCmd::new(org, "{\"route\":{}}", "new-hash");
/// match store.compare_and_swap_update(cmd, &current.configuration_hash).await {
///     Ok(()) => {}
///     Err(e) if e.is_conflict() => { /* re-read and retry */ }
///     Err(e) => return Err(e),
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait AlertConfigStore: Send + Sync {
    /// Get the latest revision for an org
    ///
    /// # Errors
    /// - `Error::ConfigNotFound` if the org has no revisions
    /// - `Error::Database` for database errors
    async fn get_latest(&self, org_id: OrgId) -> Result<AlertConfiguration>;

    /// Get the latest revision of every org that has one, ordered by org
    ///
    /// Resolved by one set-oriented query. An empty vec is a valid result.
    ///
    /// # Errors
    /// - `Error::Database` for database errors
    async fn get_all_latest(&self) -> Result<Vec<AlertConfiguration>>;

    /// Append a revision unconditionally
    async fn save(&self, cmd: SaveConfigurationCmd) -> Result<()> {
        self.save_with_callback(cmd, noop_callback()).await
    }

    /// Append a revision and run `callback` inside the same transaction
    ///
    /// # Errors
    /// - `Error::Database` for database errors
    /// - whatever `callback` returns; the insert is rolled back in that case
    async fn save_with_callback(
        &self,
        cmd: SaveConfigurationCmd,
        callback: SaveCallback<'_>,
    ) -> Result<()>;

    /// Append a revision only if the org's latest revision still has `expected_hash`
    ///
    /// The check and the insert happen in a single statement.
    ///
    /// # Errors
    /// - `Error::ConcurrencyConflict` if no row was inserted: either the org has
    ///   no revisions or its latest hash differs from `expected_hash`
    /// - `Error::Database` for database errors
    async fn compare_and_swap_update(
        &self,
        cmd: SaveConfigurationCmd,
        expected_hash: &str,
    ) -> Result<()>;
}
