//! Alert configuration revisions
//!
//! A revision is one immutable row of the `alert_configuration` relation.
//! Updates never modify a row; they append a new one, and the row with the
//! greatest `id` for an org is that org's latest configuration.

use serde::{Deserialize, Serialize};

use crate::tenant::OrgId;

/// A stored alert configuration revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfiguration {
    /// Storage-assigned identifier, globally monotonic and never reused
    pub id: i64,

    /// Owning organization
    pub org_id: OrgId,

    /// Serialized configuration document
    pub configuration: String,

    /// Caller-computed fingerprint of `configuration`
    pub configuration_hash: String,

    /// Format version tag, carried as-is
    pub configuration_version: String,

    /// Whether this revision is a fallback/default configuration
    pub default: bool,
}

/// Command describing a revision to append
///
/// Carries everything but the identifier, which storage assigns on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveConfigurationCmd {
    pub org_id: OrgId,
    pub configuration: String,
    pub configuration_hash: String,
    #[serde(default)]
    pub configuration_version: String,
    #[serde(default)]
    pub default: bool,
}

impl SaveConfigurationCmd {
    pub fn new(
        org_id: OrgId,
        configuration: impl Into<String>,
        configuration_hash: impl Into<String>,
    ) -> Self {
        Self {
            org_id,
            configuration: configuration.into(),
            configuration_hash: configuration_hash.into(),
            configuration_version: String::new(),
            default: false,
        }
    }

    /// Set the format version tag
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.configuration_version = version.into();
        self
    }

    /// Mark the revision as a default configuration
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}
