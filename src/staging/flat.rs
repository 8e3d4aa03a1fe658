//! Flat placement: every file of a site lands in the staging root

use log::trace;

use super::allocator::RelativeDir;

/// Flat placement. Holds no state; the add-on is recomputed per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatPlacement;

impl FlatPlacement {
    pub fn new() -> Self {
        Self
    }

    /// Add-on for `lfn` on `site`.
    ///
    /// A logical filename may carry its own directory structure
    /// (`a/b/f.txt`). The file's relative path is walked up once per
    /// component, collapsing it back onto the staging root.
    pub fn add_on(&self, site: &str, lfn: &str) -> RelativeDir {
        let relative = RelativeDir::from(lfn);
        let mut add_on = relative.clone();
        for _ in 0..relative.depth() {
            add_on = add_on.parent().unwrap_or_default();
        }
        trace!("Flat add-on for '{}' on '{}': '{}'", lfn, site, add_on);
        add_on
    }
}
