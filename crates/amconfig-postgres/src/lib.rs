//! PostgreSQL-backed alert configuration storage for multi-node deployments
//!
//! This crate implements the `AlertConfigStore` trait on PostgreSQL. All orgs
//! share one append-only `alert_configuration` table; many server nodes can
//! write to it concurrently.
//!
//! # Features
//! - `BIGSERIAL` identity as the only ordering primitive
//! - Compare-and-swap updates as one conditional `INSERT ... SELECT`
//! - Per-org transaction advisory locks, so a compare-and-swap never slips
//!   past a concurrent save
//! - Versioned schema migrations
//!
//! # Example
//! ```no_run
//! # use amconfig_postgres::PostgresConfigStore;
//! # use amconfig_core::AlertConfigStore;
//! # async fn example() -> amconfig_core::Result<()> {
//! let store = PostgresConfigStore::new("postgres://localhost/alerting").await?;
//! let all = store.get_all_latest().await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;
mod postgres_config_store;

pub use postgres_config_store::PostgresConfigStore;
