//! Bounded fan-out directory allocator
//!
//! Hands out relative directories from a tree with a fixed number of levels,
//! placing at most `multiplicator` entries into each leaf. It is a
//! round-robin bucket counter: the directory an entry lands in depends only
//! on how many entries were allocated before it, never on the entry's name
//! or content.
//!
//! ```text
//! multiplicator=2, levels=2
//! next() -> 00/00   next() -> 00/00
//! next() -> 00/01   next() -> 00/01
//! next() -> 01/00   ...
//! ```
//!
//! Inner digits wrap at `multiplicator` and carry outward, so every non-root
//! directory has at most `multiplicator` children. The outermost digit is
//! unbounded and grows the tree breadth-first.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default number of entries per leaf directory
///
/// One task contributes its submit file, stdout, stderr, a prescript log and
/// a partition directory to its staging directory.
pub const DEFAULT_MULTIPLICATOR: u32 = 5;

/// Default tree depth
pub const DEFAULT_LEVELS: usize = 2;

/// Directory entries that keep an ext2/ext3 lookup fast, less `.` and `..`
pub const FILES_PER_DIRECTORY: u64 = 254;

/// Entries expected in the top-level directory besides the buckets
pub const TOP_LEVEL_OFFSET: u64 = 30;

/// Allocator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocatorError {
    #[error("multiplicator must be at least 1")]
    ZeroMultiplicator,
}

/// A relative directory below a staging root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativeDir(String);

impl RelativeDir {
    /// The staging root itself
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Render a bucket path, each level as zero padded upper-case hex
    pub fn from_levels(levels: &[u32]) -> Self {
        Self(
            levels
                .iter()
                .map(|d| format!("{:02X}", d))
                .collect::<Vec<_>>()
                .join("/"),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of path components
    pub fn depth(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            self.0.split('/').count()
        }
    }

    /// Parent directory, or `None` at the root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rsplit_once('/') {
            Some((parent, _)) => Self(parent.to_string()),
            None => Self::root(),
        })
    }
}

impl From<&str> for RelativeDir {
    fn from(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|c| !c.is_empty() && *c != ".")
                .collect::<Vec<_>>()
                .join("/"),
        )
    }
}

impl fmt::Display for RelativeDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Round-robin bucket allocator with a bounded fan-out
#[derive(Debug, Clone)]
pub struct BucketAllocator {
    multiplicator: u32,
    path: Vec<u32>,
    leaf_count: u32,
    allocated: u64,
}

impl Default for BucketAllocator {
    fn default() -> Self {
        Self {
            multiplicator: DEFAULT_MULTIPLICATOR,
            path: vec![0; DEFAULT_LEVELS],
            leaf_count: 0,
            allocated: 0,
        }
    }
}

impl BucketAllocator {
    /// Create an allocator placing at most `multiplicator` entries per leaf
    /// in a tree `levels` deep
    pub fn new(multiplicator: u32, levels: usize) -> Result<Self, AllocatorError> {
        if multiplicator == 0 {
            return Err(AllocatorError::ZeroMultiplicator);
        }
        Ok(Self {
            multiplicator,
            path: vec![0; levels],
            leaf_count: 0,
            allocated: 0,
        })
    }

    /// Allocate the directory for the next entry
    pub fn next(&mut self) -> RelativeDir {
        if self.leaf_count == self.multiplicator {
            self.advance();
            self.leaf_count = 0;
        }
        self.leaf_count += 1;
        self.allocated += 1;
        RelativeDir::from_levels(&self.path)
    }

    /// Increment the path as a counter, innermost level first
    fn advance(&mut self) {
        for (i, digit) in self.path.iter_mut().enumerate().rev() {
            *digit += 1;
            // The outermost level never wraps
            if i == 0 || *digit < self.multiplicator {
                return;
            }
            *digit = 0;
        }
        // Zero levels: the single leaf is the root and keeps filling
    }

    /// Entries allocated so far
    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    /// Entries in the current leaf
    pub fn leaf_count(&self) -> u32 {
        self.leaf_count
    }

    pub fn multiplicator(&self) -> u32 {
        self.multiplicator
    }

    pub fn levels(&self) -> usize {
        self.path.len()
    }
}

/// Number of directory levels needed to hold an expected number of files.
///
/// `total_files * multiplicator + offset` entries are spread over
/// directories of `files_per_directory` entries each; the result is the
/// floor of the logarithm of that total to base `files_per_directory`.
pub fn levels_for_capacity(
    total_files: u64,
    multiplicator: u64,
    files_per_directory: u64,
    offset: u64,
) -> usize {
    if files_per_directory < 2 {
        return 0;
    }

    let mut total = total_files.saturating_mul(multiplicator).saturating_add(offset);
    let mut levels = 0;
    while total > files_per_directory {
        levels += 1;
        total /= files_per_directory;
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_layout() {
        let mut alloc = BucketAllocator::default();
        assert_eq!(alloc.multiplicator(), 5);
        assert_eq!(alloc.levels(), 2);

        for _ in 0..5 {
            assert_eq!(alloc.next().as_str(), "00/00");
        }
        assert_eq!(alloc.next().as_str(), "00/01");
        assert_eq!(alloc.leaf_count(), 1);
    }

    #[test]
    fn test_carry_to_outer_level() {
        let mut alloc = BucketAllocator::new(2, 2).unwrap();
        let dirs: Vec<String> = (0..10).map(|_| alloc.next().to_string()).collect();
        assert_eq!(
            dirs,
            vec![
                "00/00", "00/00", "00/01", "00/01", "01/00", "01/00", "01/01", "01/01", "02/00",
                "02/00"
            ]
        );
    }

    #[test]
    fn test_three_levels() {
        let mut alloc = BucketAllocator::new(1, 3).unwrap();
        let dirs: Vec<String> = (0..5).map(|_| alloc.next().to_string()).collect();
        assert_eq!(dirs, vec!["00/00/00", "01/00/00", "02/00/00", "03/00/00", "04/00/00"]);

        let mut alloc = BucketAllocator::new(2, 3).unwrap();
        let dirs: Vec<String> = (0..10).map(|_| alloc.next().to_string()).collect();
        assert_eq!(dirs[8], "01/00/00");
    }

    #[test]
    fn test_fan_out_bound() {
        let m = 4u32;
        let k = 37u64;
        let r = 3u64;
        let mut alloc = BucketAllocator::new(m, 2).unwrap();

        let mut leaves: HashMap<String, u64> = HashMap::new();
        let mut children: HashMap<String, std::collections::HashSet<String>> = HashMap::new();
        for _ in 0..(m as u64 * k + r) {
            let dir = alloc.next();
            *leaves.entry(dir.to_string()).or_default() += 1;
            if let Some(parent) = dir.parent() {
                children.entry(parent.to_string()).or_default().insert(dir.to_string());
            }
        }

        let full = leaves.values().filter(|&&n| n == m as u64).count() as u64;
        let partial: Vec<u64> = leaves.values().copied().filter(|&n| n != m as u64).collect();
        assert_eq!(full, k);
        assert_eq!(partial, vec![r]);
        assert!(leaves.values().all(|&n| n <= m as u64));

        for (parent, kids) in &children {
            if !parent.is_empty() {
                assert!(kids.len() <= m as usize, "{} has {} children", parent, kids.len());
            }
        }
        assert_eq!(alloc.allocated(), m as u64 * k + r);
    }

    #[test]
    fn test_zero_levels_is_root() {
        let mut alloc = BucketAllocator::new(3, 0).unwrap();
        for _ in 0..7 {
            assert!(alloc.next().is_root());
        }
    }

    #[test]
    fn test_zero_multiplicator_rejected() {
        assert_eq!(
            BucketAllocator::new(0, 2).unwrap_err(),
            AllocatorError::ZeroMultiplicator
        );
    }

    #[test]
    fn test_wide_digits() {
        let dir = RelativeDir::from_levels(&[0x1F3, 7]);
        assert_eq!(dir.as_str(), "1F3/07");
        assert_eq!(dir.depth(), 2);
        assert_eq!(dir.parent().unwrap().as_str(), "1F3");
        assert!(dir.parent().unwrap().parent().unwrap().is_root());
        assert!(RelativeDir::root().parent().is_none());
    }

    #[test]
    fn test_relative_dir_normalizes() {
        assert_eq!(RelativeDir::from("./a//b/").as_str(), "a/b");
        assert!(RelativeDir::from("").is_root());
    }

    #[test]
    fn test_levels_for_capacity() {
        assert_eq!(levels_for_capacity(15, 16, 254, 30), 1);
        assert_eq!(levels_for_capacity(4047, 16, 254, 30), 2);
        assert_eq!(levels_for_capacity(1_028_222, 16, 254, 30), 3);
        assert_eq!(levels_for_capacity(0, 16, 254, 30), 0);
        assert_eq!(levels_for_capacity(10, 16, 1, 30), 0);
    }
}
