//! Catalog errors

use std::path::PathBuf;

/// Errors that can occur when loading, validating or querying a catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate site handle: '{0}'")]
    DuplicateSite(String),

    #[error("Record '{record}': missing required field '{field}'")]
    MissingField { record: String, field: String },

    #[error("Record '{record}': invalid value for '{field}': {reason}")]
    InvalidValue {
        record: String,
        field: String,
        reason: String,
    },

    #[error("Catalog file not found: {0}")]
    NotFound(PathBuf),
}
