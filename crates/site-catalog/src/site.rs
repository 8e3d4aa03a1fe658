//! Site entries and shared-scratch file servers

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entry::SiteId;
use crate::platform::PlatformDescriptor;

/// Operation a file server is advertised for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileServerOperation {
    Get,
    Put,
    /// Serves both gets and puts
    #[default]
    All,
}

impl FileServerOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::All => "all",
        }
    }

    /// True if a server advertised for `self` can honor `requested`
    pub fn satisfies(&self, requested: FileServerOperation) -> bool {
        *self == Self::All || *self == requested
    }
}

impl fmt::Display for FileServerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file server fronting a site's shared scratch filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileServer {
    #[serde(default)]
    pub operation: FileServerOperation,

    /// URL prefix, e.g. `gsiftp://isi.edu`
    pub url_prefix: String,

    /// Mount point of the scratch filesystem as seen through the server
    pub mount_point: String,
}

impl FileServer {
    pub fn new(
        operation: FileServerOperation,
        url_prefix: impl Into<String>,
        mount_point: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            url_prefix: url_prefix.into(),
            mount_point: mount_point.into(),
        }
    }
}

/// A compute site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEntry {
    pub handle: SiteId,

    #[serde(default)]
    pub platform: PlatformDescriptor,

    /// Head-node shared scratch file servers
    #[serde(default, rename = "file_server")]
    pub shared_scratch: Vec<FileServer>,

    /// Work directory for this site, overriding the catalog-wide one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_directory: Option<String>,
}

impl SiteEntry {
    pub fn new(handle: impl Into<SiteId>, platform: PlatformDescriptor) -> Self {
        Self {
            handle: handle.into(),
            platform,
            shared_scratch: Vec::new(),
            work_directory: None,
        }
    }

    pub fn with_file_server(mut self, server: FileServer) -> Self {
        self.shared_scratch.push(server);
        self
    }

    pub fn with_work_directory(mut self, work_directory: impl Into<String>) -> Self {
        self.work_directory = Some(work_directory.into());
        self
    }

    /// Select the shared-scratch file server for an operation.
    ///
    /// A server advertised for exactly `operation` wins over one advertised
    /// for all operations; declaration order breaks ties.
    pub fn select_shared_scratch_file_server(
        &self,
        operation: FileServerOperation,
    ) -> Option<&FileServer> {
        self.shared_scratch
            .iter()
            .find(|fs| fs.operation == operation)
            .or_else(|| {
                self.shared_scratch
                    .iter()
                    .find(|fs| fs.operation.satisfies(operation))
            })
    }
}

/// Compute the work directory on a server as seen from outside the site.
///
/// An empty `work_dir` yields the mount point; a relative one is appended
/// to the mount point; an absolute one is used as is. `run_dir`, when set,
/// is appended last.
pub fn external_work_directory(server: &FileServer, work_dir: &str, run_dir: Option<&str>) -> String {
    let mut path = String::new();

    if work_dir.is_empty() {
        path.push_str(&server.mount_point);
    } else if !work_dir.starts_with('/') {
        path.push_str(&server.mount_point);
        if !server.mount_point.ends_with('/') {
            path.push('/');
        }
    }
    path.push_str(work_dir);

    if let Some(run_dir) = run_dir {
        path.push('/');
        path.push_str(run_dir);
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Architecture, OsFamily};

    fn site() -> SiteEntry {
        SiteEntry::new("isi", PlatformDescriptor::new(Architecture::X86_64, OsFamily::Linux))
            .with_file_server(FileServer::new(FileServerOperation::All, "gsiftp://isi.edu", "/scratch"))
            .with_file_server(FileServer::new(FileServerOperation::Put, "scp://isi.edu", "/scratch"))
    }

    #[test]
    fn test_exact_operation_preferred() {
        let site = site();
        let put = site.select_shared_scratch_file_server(FileServerOperation::Put).unwrap();
        assert_eq!(put.url_prefix, "scp://isi.edu");

        let get = site.select_shared_scratch_file_server(FileServerOperation::Get).unwrap();
        assert_eq!(get.url_prefix, "gsiftp://isi.edu");
    }

    #[test]
    fn test_no_server_for_operation() {
        let site = SiteEntry::new("lonely", PlatformDescriptor::default())
            .with_file_server(FileServer::new(FileServerOperation::Get, "http://lonely", "/data"));
        assert!(site.select_shared_scratch_file_server(FileServerOperation::Put).is_none());
    }

    #[test]
    fn test_external_work_directory_variants() {
        let fs = FileServer::new(FileServerOperation::All, "gsiftp://isi.edu", "/scratch");
        assert_eq!(external_work_directory(&fs, "", None), "/scratch");
        assert_eq!(external_work_directory(&fs, "runs", None), "/scratch/runs");
        assert_eq!(external_work_directory(&fs, "/abs/work", None), "/abs/work");
        assert_eq!(
            external_work_directory(&fs, "runs", Some("run0001")),
            "/scratch/runs/run0001"
        );

        let trailing = FileServer::new(FileServerOperation::All, "gsiftp://isi.edu", "/scratch/");
        assert_eq!(external_work_directory(&trailing, "runs", None), "/scratch/runs");
    }
}
