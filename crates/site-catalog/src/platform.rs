//! Platform descriptors and the system-info matcher
//!
//! A platform is the pair of CPU architecture and OS family, optionally
//! annotated with an OS release and a libc version. Only the first two take
//! part in compatibility matching.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// CPU architecture of an executable or a compute site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X86,
    #[default]
    #[serde(rename = "x86_64")]
    X86_64,
    Ppc,
    Ppc64le,
    Ia64,
    Sparcv7,
    Sparcv9,
    Amd64,
    Aarch64,
}

impl Architecture {
    /// Convert to the catalog spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X86_64 => "x86_64",
            Self::Ppc => "ppc",
            Self::Ppc64le => "ppc64le",
            Self::Ia64 => "ia64",
            Self::Sparcv7 => "sparcv7",
            Self::Sparcv9 => "sparcv9",
            Self::Amd64 => "amd64",
            Self::Aarch64 => "aarch64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86" => Ok(Self::X86),
            "x86_64" => Ok(Self::X86_64),
            "ppc" => Ok(Self::Ppc),
            "ppc64le" => Ok(Self::Ppc64le),
            "ia64" => Ok(Self::Ia64),
            "sparcv7" => Ok(Self::Sparcv7),
            "sparcv9" => Ok(Self::Sparcv9),
            "amd64" => Ok(Self::Amd64),
            "aarch64" => Ok(Self::Aarch64),
            _ => Err(PlatformParseError::Architecture(s.to_string())),
        }
    }
}

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    #[default]
    Linux,
    Sunos,
    Aix,
    #[serde(alias = "macos", alias = "darwin")]
    Macosx,
    Windows,
    Freebsd,
}

impl OsFamily {
    /// Convert to the catalog spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Sunos => "sunos",
            Self::Aix => "aix",
            Self::Macosx => "macosx",
            Self::Windows => "windows",
            Self::Freebsd => "freebsd",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsFamily {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "sunos" => Ok(Self::Sunos),
            "aix" => Ok(Self::Aix),
            "macosx" | "macos" | "darwin" => Ok(Self::Macosx),
            "windows" => Ok(Self::Windows),
            "freebsd" => Ok(Self::Freebsd),
            _ => Err(PlatformParseError::OsFamily(s.to_string())),
        }
    }
}

/// Errors from parsing platform strings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformParseError {
    #[error("unknown architecture: {0}")]
    Architecture(String),

    #[error("unknown OS family: {0}")]
    OsFamily(String),

    #[error("malformed platform descriptor: {0}")]
    Malformed(String),
}

/// Platform an executable was built for, or a site provides
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// CPU architecture
    #[serde(rename = "arch")]
    pub architecture: Architecture,

    /// OS family
    #[serde(rename = "os")]
    pub os_family: OsFamily,

    /// OS release (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,

    /// libc version (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glibc: Option<String>,
}

impl PlatformDescriptor {
    pub fn new(architecture: Architecture, os_family: OsFamily) -> Self {
        Self {
            architecture,
            os_family,
            os_version: None,
            glibc: None,
        }
    }

    pub fn with_os_version(mut self, version: impl Into<String>) -> Self {
        self.os_version = Some(version.into());
        self
    }

    pub fn with_glibc(mut self, glibc: impl Into<String>) -> Self {
        self.glibc = Some(glibc.into());
        self
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.architecture, self.os_family)?;
        match (&self.os_version, &self.glibc) {
            (Some(version), Some(glibc)) => write!(f, ":{}:{}", version, glibc),
            (Some(version), None) => write!(f, ":{}", version),
            // Empty version slot keeps glibc in its position
            (None, Some(glibc)) => write!(f, "::{}", glibc),
            (None, None) => Ok(()),
        }
    }
}

impl FromStr for PlatformDescriptor {
    type Err = PlatformParseError;

    /// Parse `arch::os[:version[:glibc]]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (arch, rest) = s
            .split_once("::")
            .ok_or_else(|| PlatformParseError::Malformed(s.to_string()))?;

        let mut parts = rest.split(':');
        let os = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PlatformParseError::Malformed(s.to_string()))?;

        let mut platform = Self::new(arch.parse()?, os.parse()?);
        platform.os_version = parts.next().filter(|p| !p.is_empty()).map(str::to_string);
        platform.glibc = parts.next().filter(|p| !p.is_empty()).map(str::to_string);
        Ok(platform)
    }
}

/// System-info matcher.
///
/// Two platforms are compatible iff architecture and OS family are equal.
/// OS version and libc are deliberately left out of the comparison.
pub fn matches(a: &PlatformDescriptor, b: &PlatformDescriptor) -> bool {
    a.architecture == b.architecture && a.os_family == b.os_family
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_same_arch_and_os() {
        let a = PlatformDescriptor::new(Architecture::X86_64, OsFamily::Linux);
        let b = PlatformDescriptor::new(Architecture::X86_64, OsFamily::Linux);
        assert!(matches(&a, &b));
    }

    #[test]
    fn test_matches_ignores_version_and_glibc() {
        let a = PlatformDescriptor::new(Architecture::X86_64, OsFamily::Linux)
            .with_os_version("rhel7")
            .with_glibc("2.17");
        let b = PlatformDescriptor::new(Architecture::X86_64, OsFamily::Linux)
            .with_os_version("deb12")
            .with_glibc("2.36");
        assert!(matches(&a, &b));
    }

    #[test]
    fn test_mismatch_on_arch_or_os() {
        let linux = PlatformDescriptor::new(Architecture::X86_64, OsFamily::Linux);
        let arm = PlatformDescriptor::new(Architecture::Aarch64, OsFamily::Linux);
        let mac = PlatformDescriptor::new(Architecture::X86_64, OsFamily::Macosx);
        assert!(!matches(&linux, &arm));
        assert!(!matches(&linux, &mac));
    }

    #[test]
    fn test_parse_platform_string() {
        let p: PlatformDescriptor = "x86_64::linux:rhel7:2.17".parse().unwrap();
        assert_eq!(p.architecture, Architecture::X86_64);
        assert_eq!(p.os_family, OsFamily::Linux);
        assert_eq!(p.os_version.as_deref(), Some("rhel7"));
        assert_eq!(p.glibc.as_deref(), Some("2.17"));
        assert_eq!(p.to_string(), "x86_64::linux:rhel7:2.17");

        let bare: PlatformDescriptor = "AARCH64::Linux".parse().unwrap();
        assert_eq!(bare.architecture, Architecture::Aarch64);
        assert!(bare.os_version.is_none());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(
            "mips::linux".parse::<PlatformDescriptor>(),
            Err(PlatformParseError::Architecture(_))
        ));
        assert!(matches!(
            "x86_64".parse::<PlatformDescriptor>(),
            Err(PlatformParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_serde_spelling() {
        let p = PlatformDescriptor::new(Architecture::X86_64, OsFamily::Linux);
        let toml = toml::to_string(&p).unwrap();
        assert!(toml.contains("arch = \"x86_64\""));
        assert!(toml.contains("os = \"linux\""));
    }

    #[test]
    fn test_glibc_without_version_round_trips() {
        let p = PlatformDescriptor::new(Architecture::X86_64, OsFamily::Linux).with_glibc("2.17");
        assert_eq!(p.to_string(), "x86_64::linux::2.17");

        let parsed: PlatformDescriptor = p.to_string().parse().unwrap();
        assert_eq!(parsed, p);
        assert!(parsed.os_version.is_none());
    }

    #[test]
    fn test_macos_spellings_deserialize() {
        for os in ["macosx", "macos", "darwin"] {
            let text = format!("arch = \"x86_64\"\nos = \"{os}\"\n");
            let p: PlatformDescriptor = toml::from_str(&text).unwrap();
            assert_eq!(p.os_family, OsFamily::Macosx, "os = {os}");
        }

        let p = PlatformDescriptor::new(Architecture::X86_64, OsFamily::Macosx);
        assert!(toml::to_string(&p).unwrap().contains("os = \"macosx\""));
    }
}
