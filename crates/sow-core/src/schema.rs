//! JSON serialization and version handling for scheme files.

use crate::model::Scheme;
use anyhow::{Context, Result};

pub const CURRENT_VERSION: &str = "1.0.0";

/// Validate a scheme's schema version.
pub fn validate_version(scheme: &Scheme) -> Result<()> {
    if scheme.version != CURRENT_VERSION {
        anyhow::bail!(
            "scheme version mismatch: expected {}, found {}",
            CURRENT_VERSION,
            scheme.version
        );
    }
    Ok(())
}

/// Serialize a scheme to a pretty-printed JSON string.
pub fn to_json(scheme: &Scheme) -> Result<String> {
    serde_json::to_string_pretty(scheme).context("failed to serialize scheme to JSON")
}

/// Deserialize a scheme from a JSON string.
pub fn from_json(json: &str) -> Result<Scheme> {
    let scheme: Scheme =
        serde_json::from_str(json).context("failed to deserialize scheme from JSON")?;
    validate_version(&scheme)?;
    Ok(scheme)
}
