//! Configuration merge system
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Host config (e.g. ~/.config/site-resolver/config.toml)
//! 3. Project config
//! 4. Explicit overrides from the embedding planner

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, LEVELS_RANGE, MULTIPLICATOR_RANGE,
};
pub use merge::{deep_merge, merge_layers};
