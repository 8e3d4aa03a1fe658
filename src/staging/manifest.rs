//! Staging manifest (staging_manifest.json)
//!
//! Ordered record of every placement the staging mapper handed out during a
//! planning pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use site_catalog::FileServerOperation;

use super::allocator::RelativeDir;

/// Schema version for staging_manifest.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "site-resolver/staging_manifest@1";

/// One placed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    pub task_id: String,
    pub site: String,
    pub lfn: String,
    pub operation: FileServerOperation,

    /// Directory below the site's work directory
    pub add_on: RelativeDir,

    /// Externally reachable URL
    pub url: String,
}

/// Staging manifest artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingManifest {
    pub schema_version: u32,
    pub schema_id: String,

    /// When the manifest was started
    pub created_at: DateTime<Utc>,

    /// Placements in the order they were handed out
    #[serde(default)]
    pub files: Vec<StagedFile>,
}

impl Default for StagingManifest {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            files: Vec::new(),
        }
    }
}

impl StagingManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file: StagedFile) {
        self.files.push(file);
    }

    /// Placements for one task
    pub fn for_task<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a StagedFile> + 'a {
        self.files.iter().filter(move |f| f.task_id == task_id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file atomically (write-then-rename)
    pub fn write_to_file(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "No parent directory")
        })?;

        let temp_path = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        std::fs::write(&temp_path, &json)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }
}
