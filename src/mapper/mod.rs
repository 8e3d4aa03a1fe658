//! Transformation-to-Site Mapper
//!
//! For a logical transformation and a set of candidate sites, decides which
//! physical executables may run on each site.
//!
//! Mapping algorithm:
//! 1. Serve from the cache if every requested site has already been decided
//! 2. Query the transformation catalog (restricted by site/kind in some modes)
//! 3. Fail if the catalog knows no entry for the key
//! 4. For every candidate site with a resolvable platform, keep the entries
//!    that match the site platform and are eligible under the mode
//! 5. Replace the cached entry for the key as a whole
//!
//! Sites with an unknown platform are left out of the result. That is not
//! an error: the caller decides whether an unmapped site blocks the task.

mod cache;

pub use cache::{SiteMapCache, SiteMapEntry};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use site_catalog::{
    matches, CatalogError, ExecutableEntry, ExecutableKind, PlatformDescriptor, SiteCatalog,
    SiteId, TransformationCatalog, TransformationKey, LOCAL_SITE,
};

/// Site-to-executables resolution for one transformation
pub type SiteMap = BTreeMap<SiteId, Vec<ExecutableEntry>>;

/// Eligibility mode, chosen at deployment time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// Only executables installed on the candidate site
    Installed,
    /// Only executables that can be shipped to the site, including
    /// containerized ones whose image can be pulled
    Staged,
    /// Executables installed on the site, plus stageable ones
    #[default]
    All,
    /// Only stageable executables from the submit site
    Submit,
}

impl MappingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Staged => "staged",
            Self::All => "all",
            Self::Submit => "submit",
        }
    }
}

impl fmt::Display for MappingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MappingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "installed" => Ok(Self::Installed),
            "staged" => Ok(Self::Staged),
            "all" => Ok(Self::All),
            "submit" => Ok(Self::Submit),
            _ => Err(format!("unknown mapping mode: {}", s)),
        }
    }
}

/// Mapping errors
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// The catalog has no entry at all for the transformation
    #[error("No transformation catalog entries for '{key}' (mode: {mode})")]
    UnresolvableTransformation {
        key: TransformationKey,
        mode: MappingMode,
    },

    /// The catalog query itself failed
    #[error("Transformation catalog query failed: {0}")]
    Catalog(#[from] CatalogError),
}

/// Maps logical transformations to eligible executables per site
pub struct TransformationMapper<T, S> {
    transformations: T,
    sites: S,
    mode: MappingMode,
    submit_site: SiteId,
    cache: SiteMapCache,
}

impl<T, S> TransformationMapper<T, S>
where
    T: TransformationCatalog,
    S: SiteCatalog,
{
    /// Create a mapper with an empty cache
    pub fn new(transformations: T, sites: S, mode: MappingMode) -> Self {
        Self::with_cache(transformations, sites, mode, SiteMapCache::new())
    }

    /// Create a mapper around an existing cache
    pub fn with_cache(transformations: T, sites: S, mode: MappingMode, cache: SiteMapCache) -> Self {
        Self {
            transformations,
            sites,
            mode,
            submit_site: LOCAL_SITE.to_string(),
            cache,
        }
    }

    /// Set the site Submit mode stages executables from
    pub fn with_submit_site(mut self, site: impl Into<SiteId>) -> Self {
        self.submit_site = site.into();
        self
    }

    pub fn mode(&self) -> MappingMode {
        self.mode
    }

    pub fn submit_site(&self) -> &str {
        &self.submit_site
    }

    pub fn cache(&self) -> &SiteMapCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut SiteMapCache {
        &mut self.cache
    }

    pub fn into_cache(self) -> SiteMapCache {
        self.cache
    }

    /// Resolve eligible executables for `key` on each of `sites`.
    ///
    /// Returns only sites with at least one eligible entry.
    pub fn resolve<I>(&mut self, key: &TransformationKey, sites: I) -> Result<SiteMap, MappingError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let sites: Vec<I::Item> = sites.into_iter().collect();

        if let Some(cached) = self.cache.get(key) {
            if cached.covers(sites.iter().map(|s| s.as_ref())) {
                trace!("Site map cache hit for {}", key);
                return Ok(cached.project(sites.iter().map(|s| s.as_ref())));
            }
            debug!("Partial site map cache hit for {}, recomputing", key);
        }

        let candidates = self.query_catalog(key)?;
        if candidates.is_empty() {
            return Err(MappingError::UnresolvableTransformation {
                key: key.clone(),
                mode: self.mode,
            });
        }

        let mut computed = SiteMapEntry::default();
        for site in &sites {
            let site = site.as_ref();
            let Some(platform) = self.sites.platform_of(site) else {
                debug!("No platform known for site '{}', skipping for {}", site, key);
                computed.unresolved.insert(site.to_string());
                continue;
            };

            let eligible: Vec<ExecutableEntry> = candidates
                .iter()
                .filter(|e| self.is_eligible(e, site, &platform))
                .cloned()
                .collect();
            trace!("{} eligible entries of {} on '{}'", eligible.len(), key, site);
            computed.sites.insert(site.to_string(), eligible);
        }

        let result = computed.project(sites.iter().map(|s| s.as_ref()));
        self.cache.replace(key.clone(), computed);
        Ok(result)
    }

    /// Catalog query for the configured mode
    fn query_catalog(&self, key: &TransformationKey) -> Result<Vec<ExecutableEntry>, CatalogError> {
        match self.mode {
            MappingMode::Installed => {
                self.transformations
                    .lookup(key, None, Some(ExecutableKind::Installed))
            }
            MappingMode::Staged | MappingMode::All => self.transformations.lookup(key, None, None),
            MappingMode::Submit => self.transformations.lookup(
                key,
                Some(&self.submit_site),
                Some(ExecutableKind::Stageable),
            ),
        }
    }

    /// Whether `entry` may run on `site` whose platform is `platform`
    fn is_eligible(&self, entry: &ExecutableEntry, site: &str, platform: &PlatformDescriptor) -> bool {
        if !matches(&entry.platform, platform) {
            return false;
        }

        match (self.mode, entry.kind) {
            (MappingMode::Installed, ExecutableKind::Installed) => entry.site == site,
            (MappingMode::Installed, _) => false,

            (MappingMode::All, ExecutableKind::Installed) => entry.site == site,
            (MappingMode::All, ExecutableKind::Stageable) => true,
            (
                MappingMode::All,
                ExecutableKind::StaticBinary
                | ExecutableKind::DynamicBinary
                | ExecutableKind::Source
                | ExecutableKind::Script
                | ExecutableKind::PacmanPackage,
            ) => false,

            (MappingMode::Staged, ExecutableKind::Stageable) => true,
            (MappingMode::Staged, _) => entry.has_pullable_container(),

            (MappingMode::Submit, ExecutableKind::Stageable) => entry.site == self.submit_site,
            (MappingMode::Submit, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_catalog::{
        Architecture, Container, ContainerKind, MemorySiteCatalog, MemoryTransformationCatalog,
        OsFamily, SiteEntry,
    };

    fn linux() -> PlatformDescriptor {
        PlatformDescriptor::new(Architecture::X86_64, OsFamily::Linux)
    }

    fn key() -> TransformationKey {
        TransformationKey::new("pegasus", "keg", "1.0")
    }

    fn entry(site: &str, kind: ExecutableKind, platform: PlatformDescriptor) -> ExecutableEntry {
        ExecutableEntry::new(key(), site, format!("/{}/keg", site), kind, platform)
    }

    fn sites() -> MemorySiteCatalog {
        MemorySiteCatalog::from_sites([
            SiteEntry::new("isi", linux()),
            SiteEntry::new("condorpool", linux()),
            SiteEntry::new("local", linux()),
            SiteEntry::new("arm", PlatformDescriptor::new(Architecture::Aarch64, OsFamily::Linux)),
        ])
        .unwrap()
    }

    #[test]
    fn test_all_mode_installed_only_on_own_site() {
        let tc = MemoryTransformationCatalog::from_entries([
            entry("isi", ExecutableKind::Installed, linux()),
            entry("local", ExecutableKind::Stageable, linux()),
        ]);
        let sc = sites();
        let mut mapper = TransformationMapper::new(&tc, &sc, MappingMode::All);

        let map = mapper.resolve(&key(), ["isi", "condorpool"]).unwrap();
        assert_eq!(map["isi"].len(), 2);
        assert_eq!(map["isi"][0].kind, ExecutableKind::Installed);
        assert_eq!(map["condorpool"].len(), 1);
        assert_eq!(map["condorpool"][0].kind, ExecutableKind::Stageable);
    }

    #[test]
    fn test_platform_mismatch_excludes_site() {
        let tc = MemoryTransformationCatalog::from_entries([entry(
            "local",
            ExecutableKind::Stageable,
            linux(),
        )]);
        let sc = sites();
        let mut mapper = TransformationMapper::new(&tc, &sc, MappingMode::All);

        let map = mapper.resolve(&key(), ["arm", "isi"]).unwrap();
        assert!(!map.contains_key("arm"));
        assert!(map.contains_key("isi"));
    }

    #[test]
    fn test_installed_mode() {
        let tc = MemoryTransformationCatalog::from_entries([
            entry("isi", ExecutableKind::Installed, linux()),
            entry("local", ExecutableKind::Stageable, linux()),
        ]);
        let sc = sites();
        let mut mapper = TransformationMapper::new(&tc, &sc, MappingMode::Installed);

        let map = mapper.resolve(&key(), ["isi", "condorpool"]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["isi"].len(), 1);
        assert_eq!(map["isi"][0].kind, ExecutableKind::Installed);
    }

    #[test]
    fn test_staged_mode_accepts_pullable_container() {
        let pulled = entry("isi", ExecutableKind::Installed, linux()).with_container(Container {
            name: "base".to_string(),
            kind: ContainerKind::Docker,
            image_url: "docker:///centos:7".to_string(),
            image_site: None,
        });
        let local_image = entry("isi", ExecutableKind::Installed, linux()).with_container(Container {
            name: "local".to_string(),
            kind: ContainerKind::Singularity,
            image_url: "file:///images/local.sif".to_string(),
            image_site: Some("isi".to_string()),
        });
        let installed = entry("isi", ExecutableKind::Installed, linux());

        let tc = MemoryTransformationCatalog::from_entries([pulled.clone(), local_image, installed]);
        let sc = sites();
        let mut mapper = TransformationMapper::new(&tc, &sc, MappingMode::Staged);

        let map = mapper.resolve(&key(), ["condorpool"]).unwrap();
        assert_eq!(map["condorpool"], vec![pulled]);
    }

    #[test]
    fn test_submit_mode_restricts_query() {
        let tc = MemoryTransformationCatalog::from_entries([
            entry("local", ExecutableKind::Installed, linux()),
            entry("isi", ExecutableKind::Stageable, linux()),
            entry("local", ExecutableKind::Stageable, linux()),
        ]);
        let sc = sites();
        let mut mapper = TransformationMapper::new(&tc, &sc, MappingMode::Submit);

        let map = mapper.resolve(&key(), ["local", "condorpool"]).unwrap();
        for entries in map.values() {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].site, "local");
            assert_eq!(entries[0].kind, ExecutableKind::Stageable);
        }
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_custom_submit_site() {
        let tc = MemoryTransformationCatalog::from_entries([entry(
            "isi",
            ExecutableKind::Stageable,
            linux(),
        )]);
        let sc = sites();
        let mut mapper =
            TransformationMapper::new(&tc, &sc, MappingMode::Submit).with_submit_site("isi");

        let map = mapper.resolve(&key(), ["condorpool"]).unwrap();
        assert_eq!(map["condorpool"][0].site, "isi");
    }

    #[test]
    fn test_unresolvable_transformation() {
        let tc = MemoryTransformationCatalog::default();
        let sc = sites();
        let mut mapper = TransformationMapper::new(&tc, &sc, MappingMode::All);

        let err = mapper.resolve(&key(), ["isi"]).unwrap_err();
        assert!(matches!(
            err,
            MappingError::UnresolvableTransformation { ref key, mode: MappingMode::All }
                if key.name == "keg"
        ));
        assert!(err.to_string().contains("pegasus::keg:1.0"));
    }

    #[test]
    fn test_unknown_site_is_not_fatal() {
        let tc = MemoryTransformationCatalog::from_entries([entry(
            "local",
            ExecutableKind::Stageable,
            linux(),
        )]);
        let sc = sites();
        let mut mapper = TransformationMapper::new(&tc, &sc, MappingMode::All);

        let map = mapper.resolve(&key(), ["nowhere", "isi"]).unwrap();
        assert_eq!(map.len(), 1);
        assert!(mapper.cache().get(&key()).unwrap().unresolved.contains("nowhere"));
    }

    #[test]
    fn test_partial_hit_replaces_entry() {
        let tc = MemoryTransformationCatalog::from_entries([entry(
            "local",
            ExecutableKind::Stageable,
            linux(),
        )]);
        let sc = sites();
        let mut mapper = TransformationMapper::new(&tc, &sc, MappingMode::All);

        mapper.resolve(&key(), ["isi"]).unwrap();
        mapper.resolve(&key(), ["condorpool"]).unwrap();

        let cached = mapper.cache().get(&key()).unwrap();
        assert!(cached.sites.contains_key("condorpool"));
        assert!(!cached.sites.contains_key("isi"));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Staged".parse::<MappingMode>().unwrap(), MappingMode::Staged);
        assert!("sometimes".parse::<MappingMode>().is_err());
        assert_eq!(MappingMode::default(), MappingMode::All);
    }
}
