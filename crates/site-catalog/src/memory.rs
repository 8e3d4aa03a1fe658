//! In-memory catalogs
//!
//! Load-once snapshots of the transformation and site catalogs, parsed from
//! TOML. They back the query traits in [`crate::query`] for planning runs
//! and tests.
//!
//! ```toml
//! [[transformation]]
//! namespace = "pegasus"
//! name = "keg"
//! version = "1.0"
//! site = "isi"
//! pfn = "/usr/bin/pegasus-keg"
//! type = "INSTALLED"
//! platform = { arch = "x86_64", os = "linux" }
//! ```

use std::collections::HashMap;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::entry::{Container, ExecutableEntry, ExecutableKind, TransformationKey};
use crate::error::CatalogError;
use crate::platform::PlatformDescriptor;
use crate::query::{SiteCatalog, TransformationCatalog};
use crate::site::{external_work_directory, FileServer, FileServerOperation, SiteEntry};

fn default_schema_version() -> u32 {
    1
}

fn default_kind() -> ExecutableKind {
    ExecutableKind::Installed
}

/// One `[[transformation]]` record as written in TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TransformationRecord {
    #[serde(default)]
    namespace: Option<String>,

    name: String,

    #[serde(default)]
    version: Option<String>,

    site: String,

    pfn: String,

    #[serde(default = "default_kind", rename = "type")]
    kind: ExecutableKind,

    #[serde(default)]
    platform: PlatformDescriptor,

    #[serde(default)]
    container: Option<Container>,
}

impl TransformationRecord {
    fn validate(&self) -> Result<(), CatalogError> {
        if self.name.is_empty() {
            return Err(CatalogError::MissingField {
                record: "(unnamed transformation)".to_string(),
                field: "name".to_string(),
            });
        }

        for (field, value) in [("site", &self.site), ("pfn", &self.pfn)] {
            if value.is_empty() {
                return Err(CatalogError::MissingField {
                    record: self.name.clone(),
                    field: field.to_string(),
                });
            }
        }

        if let Some(container) = &self.container {
            if container.image_url.is_empty() {
                return Err(CatalogError::InvalidValue {
                    record: self.name.clone(),
                    field: "container.image_url".to_string(),
                    reason: "image URL cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    fn into_entry(self) -> ExecutableEntry {
        ExecutableEntry {
            key: TransformationKey {
                namespace: self.namespace,
                name: self.name,
                version: self.version,
            },
            site: self.site,
            physical_path: self.pfn,
            kind: self.kind,
            platform: self.platform,
            container: self.container,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransformationFile {
    #[serde(default = "default_schema_version")]
    schema_version: u32,

    #[serde(default, rename = "transformation")]
    transformations: Vec<TransformationRecord>,
}

/// Transformation catalog held in memory
#[derive(Debug, Clone)]
pub struct MemoryTransformationCatalog {
    pub schema_version: u32,
    entries: Vec<ExecutableEntry>,
}

impl Default for MemoryTransformationCatalog {
    fn default() -> Self {
        Self {
            schema_version: 1,
            entries: Vec::new(),
        }
    }
}

impl MemoryTransformationCatalog {
    /// Build from already constructed entries
    pub fn from_entries(entries: impl IntoIterator<Item = ExecutableEntry>) -> Self {
        Self {
            schema_version: 1,
            entries: entries.into_iter().collect(),
        }
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse from a TOML string
    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let file: TransformationFile = toml::from_str(content)?;

        for record in &file.transformations {
            record.validate()?;
        }

        let entries: Vec<ExecutableEntry> = file
            .transformations
            .into_iter()
            .map(TransformationRecord::into_entry)
            .collect();
        debug!("Loaded {} transformation catalog entries", entries.len());

        Ok(Self {
            schema_version: file.schema_version,
            entries,
        })
    }

    pub fn add(&mut self, entry: ExecutableEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ExecutableEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl TransformationCatalog for MemoryTransformationCatalog {
    fn lookup(
        &self,
        key: &TransformationKey,
        site: Option<&str>,
        kind: Option<ExecutableKind>,
    ) -> Result<Vec<ExecutableEntry>, CatalogError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| &e.key == key)
            .filter(|e| site.map_or(true, |s| e.site == s))
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SiteFile {
    #[serde(default = "default_schema_version")]
    schema_version: u32,

    #[serde(default)]
    work_dir: String,

    #[serde(default)]
    run_dir: Option<String>,

    #[serde(default, rename = "site")]
    sites: Vec<SiteEntry>,
}

/// Site catalog held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySiteCatalog {
    pub schema_version: u32,

    /// Planner work directory, relative to each server's mount point unless
    /// absolute
    pub work_dir: String,

    /// Per-run directory appended to the work directory
    pub run_dir: Option<String>,

    sites: Vec<SiteEntry>,
    index: HashMap<String, usize>,
}

impl MemorySiteCatalog {
    /// Build from site entries, rejecting duplicate handles
    pub fn from_sites(sites: impl IntoIterator<Item = SiteEntry>) -> Result<Self, CatalogError> {
        let mut catalog = Self {
            schema_version: 1,
            ..Default::default()
        };
        for site in sites {
            catalog.add(site)?;
        }
        Ok(catalog)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse from a TOML string
    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let file: SiteFile = toml::from_str(content)?;

        let mut catalog = Self::from_sites(file.sites)?;
        catalog.schema_version = file.schema_version;
        catalog.work_dir = file.work_dir;
        catalog.run_dir = file.run_dir.filter(|d| !d.is_empty());
        debug!("Loaded {} site catalog entries", catalog.sites.len());

        Ok(catalog)
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<String>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_run_dir(mut self, run_dir: impl Into<String>) -> Self {
        self.run_dir = Some(run_dir.into());
        self
    }

    /// Add a site after validating it
    pub fn add(&mut self, site: SiteEntry) -> Result<(), CatalogError> {
        Self::validate_site(&site)?;
        if self.index.contains_key(&site.handle) {
            return Err(CatalogError::DuplicateSite(site.handle));
        }
        self.index.insert(site.handle.clone(), self.sites.len());
        self.sites.push(site);
        Ok(())
    }

    fn validate_site(site: &SiteEntry) -> Result<(), CatalogError> {
        if site.handle.is_empty() {
            return Err(CatalogError::MissingField {
                record: "(unnamed site)".to_string(),
                field: "handle".to_string(),
            });
        }

        for server in &site.shared_scratch {
            if server.url_prefix.is_empty() {
                return Err(CatalogError::InvalidValue {
                    record: site.handle.clone(),
                    field: "file_server.url_prefix".to_string(),
                    reason: "URL prefix cannot be empty".to_string(),
                });
            }
            if server.mount_point.is_empty() {
                return Err(CatalogError::InvalidValue {
                    record: site.handle.clone(),
                    field: "file_server.mount_point".to_string(),
                    reason: "mount point cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get a site by handle
    pub fn get(&self, handle: &str) -> Option<&SiteEntry> {
        self.index.get(handle).map(|&i| &self.sites[i])
    }

    pub fn sites(&self) -> &[SiteEntry] {
        &self.sites
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }
}

impl SiteCatalog for MemorySiteCatalog {
    fn platform_of(&self, site: &str) -> Option<PlatformDescriptor> {
        self.get(site).map(|s| s.platform.clone())
    }

    fn select_shared_scratch_file_server(
        &self,
        site: &str,
        operation: FileServerOperation,
    ) -> Option<FileServer> {
        self.get(site)?
            .select_shared_scratch_file_server(operation)
            .cloned()
    }

    fn external_work_directory(&self, server: &FileServer, site: &str) -> String {
        let work_dir = self
            .get(site)
            .and_then(|s| s.work_directory.as_deref())
            .unwrap_or(&self.work_dir);
        external_work_directory(server, work_dir, self.run_dir.as_deref())
    }
}
