//! Transformation catalog entries
//!
//! An entry binds a logical transformation (namespace, name, version) to a
//! physical executable on one site, together with the platform it was built
//! for and how it may be used.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::platform::PlatformDescriptor;

/// Site identifier
pub type SiteId = String;

/// Logical transformation identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransformationKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl TransformationKey {
    /// Create a fully qualified key
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// Create a key with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
            version: None,
        }
    }
}

impl fmt::Display for TransformationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "{}::", ns)?;
        }
        f.write_str(&self.name)?;
        if let Some(version) = &self.version {
            write!(f, ":{}", version)?;
        }
        Ok(())
    }
}

impl FromStr for TransformationKey {
    type Err = String;

    /// Parse `[namespace::]name[:version]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = match s.split_once("::") {
            Some((ns, rest)) => (Some(ns), rest),
            None => (None, s),
        };
        let (name, version) = match rest.split_once(':') {
            Some((name, version)) => (name, Some(version)),
            None => (rest, None),
        };

        if name.is_empty() {
            return Err(format!("transformation key has no name: '{}'", s));
        }

        Ok(Self {
            namespace: namespace.filter(|n| !n.is_empty()).map(str::to_string),
            name: name.to_string(),
            version: version.filter(|v| !v.is_empty()).map(str::to_string),
        })
    }
}

/// How a physical executable may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutableKind {
    /// Already present on its site; runs only there
    Installed,
    /// Can be copied to any compatible site
    Stageable,
    StaticBinary,
    DynamicBinary,
    Source,
    Script,
    PacmanPackage,
}

impl ExecutableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "INSTALLED",
            Self::Stageable => "STAGEABLE",
            Self::StaticBinary => "STATIC_BINARY",
            Self::DynamicBinary => "DYNAMIC_BINARY",
            Self::Source => "SOURCE",
            Self::Script => "SCRIPT",
            Self::PacmanPackage => "PACMAN_PACKAGE",
        }
    }
}

impl fmt::Display for ExecutableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    #[default]
    Docker,
    Singularity,
    Shifter,
}

/// Container an executable runs inside
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,

    #[serde(default, rename = "type")]
    pub kind: ContainerKind,

    /// Where the image is pulled from
    pub image_url: String,

    /// Site the image resides on, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_site: Option<String>,
}

impl Container {
    /// True if the image only lives on a local filesystem
    pub fn is_local_image(&self) -> bool {
        match self.image_url.split_once("://") {
            Some((scheme, _)) => scheme.eq_ignore_ascii_case("file"),
            None => true,
        }
    }
}

/// A physical executable for a logical transformation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableEntry {
    pub key: TransformationKey,

    /// Site the executable resides on
    pub site: SiteId,

    /// Physical path or URL of the executable
    pub physical_path: String,

    pub kind: ExecutableKind,

    pub platform: PlatformDescriptor,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
}

impl ExecutableEntry {
    pub fn new(
        key: TransformationKey,
        site: impl Into<SiteId>,
        physical_path: impl Into<String>,
        kind: ExecutableKind,
        platform: PlatformDescriptor,
    ) -> Self {
        Self {
            key,
            site: site.into(),
            physical_path: physical_path.into(),
            kind,
            platform,
            container: None,
        }
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    /// True if the entry runs from a container image that can be pulled
    /// from a non-local location
    pub fn has_pullable_container(&self) -> bool {
        self.container.as_ref().is_some_and(|c| !c.is_local_image())
    }
}
