//! Site Resolver - execution-resource and data-placement resolution
//!
//! This crate answers two questions a workflow planner asks for every task:
//! which physical executables of a logical transformation may run on each
//! candidate site ([`mapper`]), and where on a site's shared scratch
//! filesystem each of the task's files lives ([`staging`]).
//!
//! Catalog types and query traits live in the `site-catalog` crate.

pub mod config;
pub mod mapper;
pub mod resolver;
pub mod staging;

pub use config::{ConfigError, EffectiveConfig};
pub use mapper::{MappingError, MappingMode, SiteMap, SiteMapCache, TransformationMapper};
pub use resolver::{Resolver, ResolverError, ResolverSettings};
pub use staging::{
    BucketAllocator, RelativeDir, StagingError, StagingManifest, StagingMapper, StagingOptions,
    StagingStrategy, TaskScope,
};

pub use site_catalog;
