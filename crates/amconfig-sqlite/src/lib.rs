//! SQLite-backed alert configuration storage for single-node deployments
//!
//! This crate implements the `AlertConfigStore` trait on top of a single
//! SQLite database file holding the append-only `alert_configuration` table.
//!
//! # Features
//! - WAL journal for concurrent readers alongside the writer
//! - Compare-and-swap updates as one conditional `INSERT ... SELECT`
//! - Versioned schema migrations
//!
//! # Example
//! ```no_run
//! # use amconfig_sqlite::SqliteConfigStore;
//! # use amconfig_core::{AlertConfigStore, OrgId};
//! # async fn example() -> amconfig_core::Result<()> {
//! let store = SqliteConfigStore::new("~/.amconfig/alerting.db").await?;
//! let latest = store.get_latest(OrgId::new(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;
mod sqlite_config_store;

pub use sqlite_config_store::SqliteConfigStore;
