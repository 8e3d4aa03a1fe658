//! Bucketed placement
//!
//! Gives each task its own bucket directory from a [`BucketAllocator`] and
//! reuses it for all files of the task. A single "current task" slot tracks
//! which task the bucket belongs to, so calls must arrive grouped by task.
//!
//! Inputs shared between tasks are placed once per site: the first task to
//! stage an lfn on a site fixes its add-on for every later task.

use std::collections::HashMap;

use log::{debug, trace};

use site_catalog::SiteId;

use super::allocator::{BucketAllocator, RelativeDir};

/// Site to lfn to add-on
#[derive(Debug, Clone, Default)]
pub struct SiteLfnAddOnMap {
    sites: HashMap<SiteId, HashMap<String, RelativeDir>>,
}

impl SiteLfnAddOnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, site: &str, lfn: &str) -> Option<&RelativeDir> {
        self.sites.get(site)?.get(lfn)
    }

    /// Record an add-on; the first record for a (site, lfn) pair wins
    pub fn insert(&mut self, site: &str, lfn: &str, add_on: RelativeDir) -> &RelativeDir {
        self.sites
            .entry(site.to_string())
            .or_default()
            .entry(lfn.to_string())
            .or_insert(add_on)
    }

    /// Number of (site, lfn) pairs recorded
    pub fn len(&self) -> usize {
        self.sites.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Slot for the task whose files are being placed
#[derive(Debug, Clone)]
struct TaskSlot {
    task_id: String,
    add_on: Option<RelativeDir>,
}

/// Bucketed placement state
#[derive(Debug, Clone, Default)]
pub struct BucketedPlacement {
    allocator: BucketAllocator,
    current: Option<TaskSlot>,
    site_lfns: SiteLfnAddOnMap,
}

impl BucketedPlacement {
    pub fn new(allocator: BucketAllocator) -> Self {
        Self {
            allocator,
            current: None,
            site_lfns: SiteLfnAddOnMap::new(),
        }
    }

    /// Make `task_id` the current task. Re-entering the current task keeps
    /// its bucket.
    pub fn begin_task(&mut self, task_id: &str) {
        if self.current_task() == Some(task_id) {
            return;
        }
        self.current = Some(TaskSlot {
            task_id: task_id.to_string(),
            add_on: None,
        });
    }

    /// Forget the current task
    pub fn end_task(&mut self) {
        self.current = None;
    }

    pub fn current_task(&self) -> Option<&str> {
        self.current.as_ref().map(|slot| slot.task_id.as_str())
    }

    /// Add-on for `lfn` of `task_id` on `site`
    pub fn add_on(&mut self, task_id: &str, site: &str, lfn: &str) -> RelativeDir {
        self.begin_task(task_id);
        let task_add_on = self.task_add_on();

        if let Some(existing) = self.site_lfns.get(site, lfn) {
            trace!("'{}' already placed on '{}' under '{}'", lfn, site, existing);
            return existing.clone();
        }

        self.site_lfns.insert(site, lfn, task_add_on).clone()
    }

    /// Bucket of the current task, allocated on first use
    fn task_add_on(&mut self) -> RelativeDir {
        let Some(slot) = self.current.as_mut() else {
            return RelativeDir::root();
        };

        if let Some(add_on) = &slot.add_on {
            return add_on.clone();
        }

        let add_on = self.allocator.next();
        debug!("Allocated staging bucket '{}' for task {}", add_on, slot.task_id);
        slot.add_on = Some(add_on.clone());
        add_on
    }

    pub fn allocator(&self) -> &BucketAllocator {
        &self.allocator
    }

    pub fn site_lfns(&self) -> &SiteLfnAddOnMap {
        &self.site_lfns
    }
}
