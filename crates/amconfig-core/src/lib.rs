//! amconfig Core Types and Traits
//!
//! This crate provides the fundamental types and traits shared by the
//! alert configuration store backends:
//! - Tenant and revision types
//! - The `AlertConfigStore` trait and its save callbacks
//! - Core error types
//! - Connection pool configuration and store metrics

pub mod config;
pub mod config_store;
pub mod error;
pub mod metrics;
pub mod revision;
pub mod tenant;

pub use config::StoreConfig;
pub use config_store::{AlertConfigStore, SaveCallback, callback, noop_callback};
pub use error::{Error, Result};
pub use metrics::StoreMetrics;
pub use revision::{AlertConfiguration, SaveConfigurationCmd};
pub use tenant::OrgId;
