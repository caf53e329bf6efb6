//! Organization identifiers used to partition configuration history

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Identifier of the organization (tenant) a configuration belongs to.
///
/// Every org owns an independent revision chain inside the shared
/// `alert_configuration` relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(i64);

impl OrgId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw database value
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Parse an org ID from a string
    pub fn from_string(s: &str) -> Result<Self> {
        let id = s
            .trim()
            .parse::<i64>()
            .map_err(|e| Error::InvalidOrg(format!("Invalid org ID format '{}': {}", s, e)))?;
        Ok(Self(id))
    }
}

impl From<i64> for OrgId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrgId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_id_from_string() {
        let org_id = OrgId::from_string("42").unwrap();
        assert_eq!(org_id, OrgId::new(42));
        assert_eq!(org_id.to_string(), "42");
    }

    #[test]
    fn test_org_id_invalid_string() {
        let result = "not-a-number".parse::<OrgId>();
        assert!(matches!(result, Err(Error::InvalidOrg(_))));
    }

    #[test]
    fn test_org_id_serializes_as_number() {
        let json = serde_json::to_string(&OrgId::new(3)).unwrap();
        assert_eq!(json, "3");

        let parsed: OrgId = serde_json::from_str("3").unwrap();
        assert_eq!(parsed.as_i64(), 3);
    }

    #[test]
    fn test_org_id_ordering() {
        let mut ids = vec![OrgId::new(3), OrgId::new(1), OrgId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![OrgId::new(1), OrgId::new(2), OrgId::new(3)]);
    }
}
