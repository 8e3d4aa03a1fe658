//! Shared test fixtures: catalog files and a call-counting catalog stub

#![allow(dead_code)]

use std::cell::Cell;
use std::path::{Path, PathBuf};

use site_resolver::site_catalog::{
    CatalogError, ExecutableEntry, ExecutableKind, MemorySiteCatalog, MemoryTransformationCatalog,
    TransformationCatalog, TransformationKey,
};

/// Path to the transformation catalog fixture
pub fn transformations_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/catalogs/transformations.toml")
}

/// Path to the site catalog fixture
pub fn sites_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/catalogs/sites.toml")
}

pub fn load_transformations() -> MemoryTransformationCatalog {
    MemoryTransformationCatalog::load(&transformations_path()).expect("transformations fixture")
}

pub fn load_sites() -> MemorySiteCatalog {
    MemorySiteCatalog::load(&sites_path()).expect("sites fixture")
}

pub fn keg() -> TransformationKey {
    TransformationKey::new("pegasus", "keg", "1.0")
}

/// Transformation catalog that counts its lookups
pub struct CountingCatalog {
    inner: MemoryTransformationCatalog,
    lookups: Cell<usize>,
}

impl CountingCatalog {
    pub fn new(inner: MemoryTransformationCatalog) -> Self {
        Self {
            inner,
            lookups: Cell::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl TransformationCatalog for CountingCatalog {
    fn lookup(
        &self,
        key: &TransformationKey,
        site: Option<&str>,
        kind: Option<ExecutableKind>,
    ) -> Result<Vec<ExecutableEntry>, CatalogError> {
        self.lookups.set(self.lookups.get() + 1);
        self.inner.lookup(key, site, kind)
    }
}
