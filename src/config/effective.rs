//! Effective configuration with full provenance
//!
//! The effective config captures the merged configuration plus information
//! about where each value came from.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::Path;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::mapper::MappingMode;
use crate::resolver::ResolverSettings;
use crate::staging::{StagingOptions, StagingStrategy};

/// Schema version for effective_config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "site-resolver/effective_config@1";

/// Accepted multiplicator range
pub const MULTIPLICATOR_RANGE: RangeInclusive<u64> = 1..=4096;

/// Accepted bucket depth range
pub const LEVELS_RANGE: RangeInclusive<u64> = 0..=8;

/// Accepted `staging.expected_files` range
pub const EXPECTED_FILES_RANGE: RangeInclusive<u64> = 1..=u32::MAX as u64;

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Project,
    Override,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/override)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/override)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Effective configuration with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,
    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// Planning run this config applies to (set later)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build effective config from layers
    pub fn build(
        host_config_path: Option<&Path>,
        project_config_path: Option<&Path>,
        overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        for (origin, path) in [
            (ConfigOrigin::Host, host_config_path),
            (ConfigOrigin::Project, project_config_path),
        ] {
            let Some(path) = path.filter(|p| p.exists()) else {
                continue;
            };
            let (value, digest) = Self::load_toml_file(path)?;
            debug!("Loaded {:?} config from {}", origin, path.display());
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(overrides) = overrides {
            layers.push(overrides);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Override,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        Self::validate_config(&merged)?;

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            run_id: None,
            config: merged,
            sources,
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    /// Validate configuration values
    fn validate_config(config: &Value) -> Result<(), ConfigError> {
        Self::typed_settings(config).map(|_| ())
    }

    /// Read typed settings out of a merged config value
    fn typed_settings(config: &Value) -> Result<ResolverSettings, ConfigError> {
        let mode: MappingMode = string_at(config, "mapper.mode")?
            .parse()
            .map_err(ConfigError::ValidationError)?;

        let submit_site = string_at(config, "mapper.submit_site")?;
        if submit_site.is_empty() {
            return Err(ConfigError::ValidationError(
                "mapper.submit_site cannot be empty".to_string(),
            ));
        }

        let strategy: StagingStrategy = string_at(config, "staging.strategy")?
            .parse()
            .map_err(ConfigError::ValidationError)?;

        // Both ranges fit their target types
        let multiplicator = integer_in(config, "staging.multiplicator", &MULTIPLICATOR_RANGE)? as u32;
        let levels = integer_in(config, "staging.levels", &LEVELS_RANGE)? as usize;

        let mut staging = StagingOptions {
            strategy,
            multiplicator,
            levels,
        };
        // An expected file count replaces the fixed depth
        if value_at(config, "staging.expected_files").is_some() {
            let expected = integer_in(config, "staging.expected_files", &EXPECTED_FILES_RANGE)?;
            staging = staging.with_expected_files(expected);
            debug!(
                "Sized bucket tree for {} files: {} levels",
                expected, staging.levels
            );
        }

        Ok(ResolverSettings {
            mode,
            submit_site: submit_site.to_string(),
            staging,
        })
    }

    /// Typed resolver settings
    pub fn settings(&self) -> Result<ResolverSettings, ConfigError> {
        Self::typed_settings(&self.config)
    }

    /// Set run context
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        value_at(&self.config, path)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }
}

fn value_at<'a>(config: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(config, |current, part| current.get(part))
}

fn string_at<'a>(config: &'a Value, path: &str) -> Result<&'a str, ConfigError> {
    value_at(config, path)
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::ValidationError(format!("{} must be a string", path)))
}

fn integer_in(
    config: &Value,
    path: &str,
    range: &RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    value_at(config, path)
        .and_then(Value::as_u64)
        .filter(|n| range.contains(n))
        .ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "{} must be an integer in [{}, {}]",
                path,
                range.start(),
                range.end()
            ))
        })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
