//! Per-transformation site map cache
//!
//! The cache is an owned structure handed to the mapper. It has no internal
//! locking: callers that resolve from several threads wrap the mapper in a
//! mutex or keep one mapper per shard.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use site_catalog::{ExecutableEntry, SiteId, TransformationKey};

/// Cached resolution for one transformation key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteMapEntry {
    /// Eligible entries per resolvable site (possibly empty)
    pub sites: BTreeMap<SiteId, Vec<ExecutableEntry>>,

    /// Sites whose platform could not be resolved
    pub unresolved: BTreeSet<SiteId>,
}

impl SiteMapEntry {
    /// True if every requested site has already been decided
    pub fn covers<'s>(&self, sites: impl IntoIterator<Item = &'s str>) -> bool {
        sites
            .into_iter()
            .all(|s| self.sites.contains_key(s) || self.unresolved.contains(s))
    }

    /// Non-empty entry lists for the requested sites
    pub fn project<'s>(
        &self,
        sites: impl IntoIterator<Item = &'s str>,
    ) -> BTreeMap<SiteId, Vec<ExecutableEntry>> {
        sites
            .into_iter()
            .filter_map(|s| {
                self.sites
                    .get(s)
                    .filter(|entries| !entries.is_empty())
                    .map(|entries| (s.to_string(), entries.clone()))
            })
            .collect()
    }
}

/// Transformation key to site map
#[derive(Debug, Clone, Default)]
pub struct SiteMapCache {
    entries: HashMap<TransformationKey, SiteMapEntry>,
}

impl SiteMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &TransformationKey) -> Option<&SiteMapEntry> {
        self.entries.get(key)
    }

    /// Replace the whole entry for `key`
    pub fn replace(&mut self, key: TransformationKey, entry: SiteMapEntry) {
        self.entries.insert(key, entry);
    }

    /// Drop the cached entry for `key`, returning it
    pub fn invalidate(&mut self, key: &TransformationKey) -> Option<SiteMapEntry> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
