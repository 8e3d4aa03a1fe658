//! Read-only query surfaces consumed by the mappers
//!
//! Both traits are implemented for shared references, so a caller can hand
//! a mapper `&catalog` and keep using the catalog elsewhere.

use crate::entry::{ExecutableEntry, ExecutableKind, TransformationKey};
use crate::error::CatalogError;
use crate::platform::PlatformDescriptor;
use crate::site::{FileServer, FileServerOperation};

/// Transformation catalog lookup
pub trait TransformationCatalog {
    /// All entries for `key`, optionally restricted to one site and/or one
    /// executable kind. Entries are returned in catalog order.
    fn lookup(
        &self,
        key: &TransformationKey,
        site: Option<&str>,
        kind: Option<ExecutableKind>,
    ) -> Result<Vec<ExecutableEntry>, CatalogError>;
}

/// Site catalog lookup
pub trait SiteCatalog {
    /// Platform of a site, `None` if the site is unknown
    fn platform_of(&self, site: &str) -> Option<PlatformDescriptor>;

    /// Head-node shared-scratch file server honoring `operation`
    fn select_shared_scratch_file_server(
        &self,
        site: &str,
        operation: FileServerOperation,
    ) -> Option<FileServer>;

    /// Work directory on `server` as seen from outside the site
    fn external_work_directory(&self, server: &FileServer, site: &str) -> String;
}

impl<T: TransformationCatalog + ?Sized> TransformationCatalog for &T {
    fn lookup(
        &self,
        key: &TransformationKey,
        site: Option<&str>,
        kind: Option<ExecutableKind>,
    ) -> Result<Vec<ExecutableEntry>, CatalogError> {
        (**self).lookup(key, site, kind)
    }
}

impl<S: SiteCatalog + ?Sized> SiteCatalog for &S {
    fn platform_of(&self, site: &str) -> Option<PlatformDescriptor> {
        (**self).platform_of(site)
    }

    fn select_shared_scratch_file_server(
        &self,
        site: &str,
        operation: FileServerOperation,
    ) -> Option<FileServer> {
        (**self).select_shared_scratch_file_server(site, operation)
    }

    fn external_work_directory(&self, server: &FileServer, site: &str) -> String {
        (**self).external_work_directory(server, site)
    }
}
