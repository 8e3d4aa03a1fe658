//! Staging Location Mapper
//!
//! Resolves where a task's file lives on a site's shared scratch area and
//! the URL it is reached through:
//!
//! ```text
//! <url prefix><external work dir>/<add-on>/<lfn>
//! ```
//!
//! The add-on comes from one of two strategies:
//! - `flat`: every file of a site goes to the work directory itself
//! - `bucketed`: each task gets a bucket directory from a bounded fan-out
//!   allocator, reused for all of the task's files
//!
//! ## Caller contract
//!
//! Bucketed placement remembers only the last task it saw. Calls for one
//! task must not be interleaved with calls for another; [`TaskScope`] makes
//! that explicit by holding the mapper borrowed until the task is done.

mod allocator;
mod bucketed;
mod flat;
mod manifest;

pub use allocator::{
    levels_for_capacity, AllocatorError, BucketAllocator, RelativeDir, DEFAULT_LEVELS,
    DEFAULT_MULTIPLICATOR, FILES_PER_DIRECTORY, TOP_LEVEL_OFFSET,
};
pub use bucketed::{BucketedPlacement, SiteLfnAddOnMap};
pub use flat::FlatPlacement;
pub use manifest::{StagedFile, StagingManifest, SCHEMA_ID, SCHEMA_VERSION};

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use site_catalog::{FileServerOperation, SiteCatalog};

/// Addressing strategy, chosen at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingStrategy {
    /// Single directory per site
    Flat,
    /// Bounded fan-out bucket per task
    #[default]
    #[serde(alias = "hashed")]
    Bucketed,
}

impl StagingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Bucketed => "bucketed",
        }
    }
}

impl fmt::Display for StagingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StagingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "bucketed" | "hashed" => Ok(Self::Bucketed),
            _ => Err(format!("unknown staging strategy: {}", s)),
        }
    }
}

/// Staging mapper options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingOptions {
    pub strategy: StagingStrategy,

    /// Entries per bucket directory
    pub multiplicator: u32,

    /// Bucket tree depth
    pub levels: usize,
}

impl Default for StagingOptions {
    fn default() -> Self {
        Self {
            strategy: StagingStrategy::default(),
            multiplicator: DEFAULT_MULTIPLICATOR,
            levels: DEFAULT_LEVELS,
        }
    }
}

impl StagingOptions {
    /// Size the bucket tree for `expected_files` tasks instead of a fixed
    /// depth. Uses the current multiplicator.
    pub fn with_expected_files(mut self, expected_files: u64) -> Self {
        self.levels = levels_for_capacity(
            expected_files,
            u64::from(self.multiplicator),
            FILES_PER_DIRECTORY,
            TOP_LEVEL_OFFSET,
        );
        self
    }
}

/// Staging errors
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// The site advertises no shared-scratch server for the operation
    #[error("Task {task_id}: site '{site}' has no shared scratch file server for '{operation}'")]
    MissingFileServer {
        task_id: String,
        site: String,
        operation: FileServerOperation,
    },

    #[error("Invalid bucket allocator: {0}")]
    Allocator(#[from] AllocatorError),
}

#[derive(Debug, Clone)]
enum Placement {
    Flat(FlatPlacement),
    Bucketed(BucketedPlacement),
}

impl Placement {
    fn begin_task(&mut self, task_id: &str) {
        if let Self::Bucketed(bucketed) = self {
            bucketed.begin_task(task_id);
        }
    }

    fn end_task(&mut self) {
        if let Self::Bucketed(bucketed) = self {
            bucketed.end_task();
        }
    }

    fn add_on(&mut self, task_id: &str, site: &str, lfn: &str) -> RelativeDir {
        match self {
            Self::Flat(flat) => flat.add_on(site, lfn),
            Self::Bucketed(bucketed) => bucketed.add_on(task_id, site, lfn),
        }
    }
}

/// Maps (task, lfn, site, operation) to a staging URL
pub struct StagingMapper<S> {
    sites: S,
    strategy: StagingStrategy,
    placement: Placement,
    manifest: Option<StagingManifest>,
}

impl<S: SiteCatalog> StagingMapper<S> {
    pub fn new(sites: S, options: StagingOptions) -> Result<Self, StagingError> {
        let placement = match options.strategy {
            StagingStrategy::Flat => Placement::Flat(FlatPlacement::new()),
            StagingStrategy::Bucketed => Placement::Bucketed(BucketedPlacement::new(
                BucketAllocator::new(options.multiplicator, options.levels)?,
            )),
        };

        Ok(Self {
            sites,
            strategy: options.strategy,
            placement,
            manifest: None,
        })
    }

    /// Record every placement in a [`StagingManifest`]
    pub fn with_manifest(mut self) -> Self {
        self.manifest = Some(StagingManifest::new());
        self
    }

    pub fn strategy(&self) -> StagingStrategy {
        self.strategy
    }

    pub fn manifest(&self) -> Option<&StagingManifest> {
        self.manifest.as_ref()
    }

    pub fn take_manifest(&mut self) -> Option<StagingManifest> {
        self.manifest.take().map(|m| {
            self.manifest = Some(StagingManifest::new());
            m
        })
    }

    /// Bucketed placement state, if that strategy is in use
    pub fn bucketed(&self) -> Option<&BucketedPlacement> {
        match &self.placement {
            Placement::Bucketed(bucketed) => Some(bucketed),
            Placement::Flat(_) => None,
        }
    }

    /// URL for `lfn` of `task_id` on `site`.
    ///
    /// Calls must be grouped by task; see the module docs.
    pub fn map(
        &mut self,
        task_id: &str,
        lfn: &str,
        site: &str,
        operation: FileServerOperation,
    ) -> Result<String, StagingError> {
        self.place(task_id, lfn, site, operation)
    }

    /// Add-on for `lfn` of `task_id` on `site`, without building a URL
    pub fn add_on(&mut self, task_id: &str, lfn: &str, site: &str) -> RelativeDir {
        self.placement.add_on(task_id, site, lfn)
    }

    /// Open a scope for one task's files
    pub fn begin_task(&mut self, task_id: &str) -> TaskScope<'_, S> {
        self.placement.begin_task(task_id);
        TaskScope {
            mapper: self,
            task_id: task_id.to_string(),
        }
    }

    fn place(
        &mut self,
        task_id: &str,
        lfn: &str,
        site: &str,
        operation: FileServerOperation,
    ) -> Result<String, StagingError> {
        let server = self
            .sites
            .select_shared_scratch_file_server(site, operation)
            .ok_or_else(|| StagingError::MissingFileServer {
                task_id: task_id.to_string(),
                site: site.to_string(),
                operation,
            })?;

        let add_on = self.placement.add_on(task_id, site, lfn);
        let work_dir = self.sites.external_work_directory(&server, site);

        let mut url = format!(
            "{}{}/",
            server.url_prefix,
            work_dir.strip_suffix('/').unwrap_or(&work_dir)
        );
        if !add_on.is_root() {
            url.push_str(add_on.as_str());
            url.push('/');
        }
        url.push_str(lfn);
        debug!("Task {}: {} '{}' on '{}' -> {}", task_id, operation, lfn, site, url);

        if let Some(manifest) = self.manifest.as_mut() {
            manifest.record(StagedFile {
                task_id: task_id.to_string(),
                site: site.to_string(),
                lfn: lfn.to_string(),
                operation,
                add_on,
                url: url.clone(),
            });
        }

        Ok(url)
    }
}

/// Placement scope for one task.
///
/// The task ends when the scope is dropped or [`TaskScope::end`] is called.
pub struct TaskScope<'a, S: SiteCatalog> {
    mapper: &'a mut StagingMapper<S>,
    task_id: String,
}

impl<S: SiteCatalog> TaskScope<'_, S> {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// URL for `lfn` of this task on `site`
    pub fn map(
        &mut self,
        lfn: &str,
        site: &str,
        operation: FileServerOperation,
    ) -> Result<String, StagingError> {
        self.mapper.place(&self.task_id, lfn, site, operation)
    }

    /// Add-on for `lfn` of this task on `site`
    pub fn add_on(&mut self, lfn: &str, site: &str) -> RelativeDir {
        self.mapper.placement.add_on(&self.task_id, site, lfn)
    }

    pub fn end(self) {}
}

impl<S: SiteCatalog> Drop for TaskScope<'_, S> {
    fn drop(&mut self) {
        self.mapper.placement.end_task();
    }
}
