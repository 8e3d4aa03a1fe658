//! Resolver facade
//!
//! Wires a [`TransformationMapper`] and a [`StagingMapper`] over the same
//! site catalog so a planner holds a single object per planning pass.

use log::debug;
use serde::{Deserialize, Serialize};

use site_catalog::{
    FileServerOperation, SiteCatalog, SiteId, TransformationCatalog, TransformationKey, LOCAL_SITE,
};

use crate::config::{ConfigError, EffectiveConfig};
use crate::mapper::{MappingError, MappingMode, SiteMap, TransformationMapper};
use crate::staging::{RelativeDir, StagingError, StagingMapper, StagingOptions, TaskScope};

/// Typed settings for both mappers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
    pub mode: MappingMode,
    pub submit_site: SiteId,
    pub staging: StagingOptions,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            mode: MappingMode::default(),
            submit_site: LOCAL_SITE.to_string(),
            staging: StagingOptions::default(),
        }
    }
}

/// Errors building a resolver
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Staging(#[from] StagingError),
}

/// Transformation and staging resolution for one planning pass
pub struct Resolver<T, S> {
    settings: ResolverSettings,
    mapper: TransformationMapper<T, S>,
    staging: StagingMapper<S>,
}

impl<T, S> Resolver<T, S>
where
    T: TransformationCatalog,
    S: SiteCatalog + Clone,
{
    pub fn new(transformations: T, sites: S, settings: ResolverSettings) -> Result<Self, StagingError> {
        let staging = StagingMapper::new(sites.clone(), settings.staging)?;
        let mapper = TransformationMapper::new(transformations, sites, settings.mode)
            .with_submit_site(settings.submit_site.clone());
        debug!(
            "Resolver ready: mode={}, staging={}",
            settings.mode, settings.staging.strategy
        );

        Ok(Self {
            settings,
            mapper,
            staging,
        })
    }

    /// Build from an effective configuration
    pub fn from_config(
        transformations: T,
        sites: S,
        config: &EffectiveConfig,
    ) -> Result<Self, ResolverError> {
        let settings = config.settings()?;
        Ok(Self::new(transformations, sites, settings)?)
    }

    /// Record every staging placement in a manifest
    pub fn with_manifest(mut self) -> Self {
        self.staging = self.staging.with_manifest();
        self
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Eligible executables for `key` on each of `sites`
    pub fn resolve<I>(&mut self, key: &TransformationKey, sites: I) -> Result<SiteMap, MappingError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.mapper.resolve(key, sites)
    }

    /// Staging URL for `lfn` of `task_id` on `site`
    pub fn map(
        &mut self,
        task_id: &str,
        lfn: &str,
        site: &str,
        operation: FileServerOperation,
    ) -> Result<String, StagingError> {
        self.staging.map(task_id, lfn, site, operation)
    }

    pub fn add_on(&mut self, task_id: &str, lfn: &str, site: &str) -> RelativeDir {
        self.staging.add_on(task_id, lfn, site)
    }

    pub fn begin_task(&mut self, task_id: &str) -> TaskScope<'_, S> {
        self.staging.begin_task(task_id)
    }

    pub fn mapper(&self) -> &TransformationMapper<T, S> {
        &self.mapper
    }

    pub fn staging(&self) -> &StagingMapper<S> {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut StagingMapper<S> {
        &mut self.staging
    }
}
