//! Connection pool settings shared by the SQLite and PostgreSQL stores

use std::time::Duration;

use crate::{Error, Result};

/// Pool settings handed to `with_config` on either backend
///
/// Store operations are short request-scoped transactions, so the pool only
/// needs to cover the number of concurrent writers plus readers.
/// `min_connections` defaults to 0 for both backends. With SQLite an idle
/// connection holds a file handle and WAL read mark for nothing. With
/// PostgreSQL every node of a deployment would otherwise pin server
/// backends while no configuration traffic is flowing.
///
/// # Example
/// ```
/// use amconfig_core::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_max_connections(50)
///     .with_acquire_timeout(Duration::from_secs(2));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Upper bound on open connections
    pub max_connections: u32,

    /// Connections kept open while idle
    pub min_connections: u32,

    /// How long an operation waits for a free connection before failing
    /// with `Error::Database`
    pub acquire_timeout: Duration,

    /// Idle connections above `min_connections` are closed after this long
    pub idle_timeout: Duration,

    /// Connections are recycled after this long regardless of use
    pub max_lifetime: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(10 * 60),
            max_lifetime: Duration::from_secs(30 * 60),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = min_connections;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Reject settings the pool cannot honor
    ///
    /// # Errors
    /// - `Error::Config` when `max_connections` is 0, `min_connections`
    ///   exceeds it, or `acquire_timeout` is zero
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(Error::Config(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.acquire_timeout.is_zero() {
            return Err(Error::Config(
                "acquire_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
