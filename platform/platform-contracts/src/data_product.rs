//! Versioned wrapper for durable business records carried in an envelope

use serde::{Deserialize, Serialize};

/// Version stamped on every data product this workspace produces
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Major version consumers accept; minor/patch bumps are additive
pub const SUPPORTED_MAJOR: u64 = 1;

/// Record kinds (`name` field)
pub mod names {
    pub const CLIENT_COMMUNICATION: &str = "client-communication";
    pub const PROJECT_MANAGEMENT: &str = "project-management";
    pub const TESTING_RESULT: &str = "testing-result";
    pub const DEPLOYMENT_INFO: &str = "deployment-info";
    pub const INTERNAL_COMMUNICATION: &str = "internal-communication";
}

/// A typed, versioned, timestamped business record
///
/// Wire shape:
/// ```json
/// {"name": "client-communication", "schemaVersion": "1.0.0",
///  "timestamp": 1717171717000, "payload": {...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProduct<T> {
    pub name: String,
    pub schema_version: String,
    /// Creation instant, epoch milliseconds
    pub timestamp: i64,
    pub payload: T,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaVersionError {
    #[error("schemaVersion '{0}' is not a semantic version")]
    Malformed(String),

    #[error("schemaVersion '{found}' is not supported (expected major {supported})")]
    Unsupported { found: String, supported: u64 },
}

impl<T> DataProduct<T> {
    /// Wrap a payload at the current schema version, stamped now
    pub fn new(name: impl Into<String>, payload: T) -> Self {
        Self {
            name: name.into(),
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp: crate::now_millis(),
            payload,
        }
    }

    /// Check `schemaVersion` before trusting the payload shape
    pub fn check_schema_version(&self) -> Result<(), SchemaVersionError> {
        check_schema_version(&self.schema_version)
    }
}

/// Accepts `MAJOR.MINOR.PATCH` whose major equals [`SUPPORTED_MAJOR`]
pub fn check_schema_version(version: &str) -> Result<(), SchemaVersionError> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.parse::<u64>().is_err()) {
        return Err(SchemaVersionError::Malformed(version.to_string()));
    }

    let major: u64 = parts[0]
        .parse()
        .map_err(|_| SchemaVersionError::Malformed(version.to_string()))?;

    if major != SUPPORTED_MAJOR {
        return Err(SchemaVersionError::Unsupported {
            found: version.to_string(),
            supported: SUPPORTED_MAJOR,
        });
    }

    Ok(())
}
