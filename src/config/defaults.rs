//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

use crate::mapper::MappingMode;
use crate::staging::{StagingStrategy, DEFAULT_LEVELS, DEFAULT_MULTIPLICATOR};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Transformation mapping mode (default: "all")
    pub mapper_mode: MappingMode,

    /// Site stageable executables are shipped from (default: "local")
    pub submit_site: String,

    /// Staging addressing strategy (default: "bucketed")
    pub staging_strategy: StagingStrategy,

    /// Entries per bucket directory (default: 5)
    pub multiplicator: u32,

    /// Bucket tree depth (default: 2)
    pub levels: usize,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            mapper_mode: MappingMode::default(),
            submit_site: site_catalog::LOCAL_SITE.to_string(),
            staging_strategy: StagingStrategy::default(),
            multiplicator: DEFAULT_MULTIPLICATOR,
            levels: DEFAULT_LEVELS,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "mapper": {
                "mode": self.mapper_mode.as_str(),
                "submit_site": self.submit_site
            },
            "staging": {
                "strategy": self.staging_strategy.as_str(),
                "multiplicator": self.multiplicator,
                "levels": self.levels
            }
        })
    }
}
