//! Site Catalog Types
//!
//! Data model for transformation and site catalogs, the read-only query
//! surfaces the planner's mappers consume, and in-memory catalogs loaded
//! from TOML.

pub mod entry;
pub mod error;
pub mod memory;
pub mod platform;
pub mod query;
pub mod site;

pub use entry::{Container, ContainerKind, ExecutableEntry, ExecutableKind, SiteId, TransformationKey};
pub use error::CatalogError;
pub use memory::{MemorySiteCatalog, MemoryTransformationCatalog};
pub use platform::{matches, Architecture, OsFamily, PlatformDescriptor, PlatformParseError};
pub use query::{SiteCatalog, TransformationCatalog};
pub use site::{external_work_directory, FileServer, FileServerOperation, SiteEntry};

/// Site handle of the submit host
pub const LOCAL_SITE: &str = "local";
