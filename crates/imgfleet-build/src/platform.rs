//! Build platform model and local platform detection.

use crate::error::{BuildError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An OS / CPU architecture pair, e.g. `linux/amd64` or `linux/arm/v7`.
///
/// Architecture aliases are normalized on construction, so `linux/x86_64`
/// and `linux/amd64` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Platform {
    os: String,
    architecture: String,
    variant: Option<String>,
}

impl Platform {
    pub fn new(os: &str, architecture: &str) -> Self {
        Self::with_variant(os, architecture, None)
    }

    pub fn with_variant(os: &str, architecture: &str, variant: Option<&str>) -> Self {
        let architecture = normalize_arch(architecture);
        // arm64 images are always v8; registries are inconsistent about spelling it out
        let variant = variant
            .filter(|v| !v.is_empty())
            .filter(|v| !(architecture == "arm64" && *v == "v8"))
            .map(str::to_string);

        Self {
            os: os.to_ascii_lowercase(),
            architecture: architecture.to_string(),
            variant,
        }
    }

    pub fn linux_amd64() -> Self {
        Self::new("linux", "amd64")
    }

    pub fn linux_arm64() -> Self {
        Self::new("linux", "arm64")
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

/// Map the architecture spellings used by Rust, uname and OCI to one name.
fn normalize_arch(arch: &str) -> &str {
    match arch {
        "x86_64" | "x86-64" | "amd64" => "amd64",
        "aarch64" | "arm64" => "arm64",
        "armv7l" | "arm" => "arm",
        "i386" | "i686" | "x86" | "386" => "386",
        "powerpc64le" | "ppc64le" => "ppc64le",
        other => other,
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

impl FromStr for Platform {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [os, arch] if !os.is_empty() && !arch.is_empty() => Ok(Platform::new(os, arch)),
            [os, arch, variant] if !os.is_empty() && !arch.is_empty() => {
                Ok(Platform::with_variant(os, arch, Some(variant)))
            }
            _ => Err(BuildError::InvalidPlatform(s.to_string())),
        }
    }
}

impl Serialize for Platform {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The configured set of platforms this fleet is published for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedPlatforms {
    platforms: Vec<Platform>,
}

impl SupportedPlatforms {
    pub fn new(platforms: impl IntoIterator<Item = Platform>) -> Result<Self> {
        let mut unique: Vec<Platform> = Vec::new();
        for platform in platforms {
            if !unique.contains(&platform) {
                unique.push(platform);
            }
        }

        if unique.is_empty() {
            return Err(BuildError::InvalidConfig(
                "supported platform list is empty".to_string(),
            ));
        }

        Ok(Self { platforms: unique })
    }

    /// Parse a comma separated list such as `linux/amd64,linux/arm64`.
    pub fn parse_list(list: &str) -> Result<Self> {
        let platforms = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Platform::from_str)
            .collect::<Result<Vec<_>>>()?;
        Self::new(platforms)
    }

    pub fn contains(&self, platform: &Platform) -> bool {
        self.platforms.contains(platform)
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.iter()
    }
}

impl Default for SupportedPlatforms {
    fn default() -> Self {
        Self {
            platforms: vec![Platform::linux_amd64(), Platform::linux_arm64()],
        }
    }
}

impl fmt::Display for SupportedPlatforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.platforms.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Detect the platform this machine builds for.
pub fn detect(supported: &SupportedPlatforms) -> Result<Platform> {
    detect_from(std::env::consts::OS, std::env::consts::ARCH, supported)
}

/// Map a host OS / architecture pair onto a supported Linux image platform.
///
/// Linux hosts are the normal case. macOS hosts build through the Linux VM of
/// Docker Desktop, which works but is unusual for fleet builds, so it only
/// warns. Anything else cannot produce Linux images here.
pub fn detect_from(os: &str, arch: &str, supported: &SupportedPlatforms) -> Result<Platform> {
    match os {
        "linux" => {}
        "macos" | "darwin" => {
            tracing::warn!(
                "Building on {} host; images are produced by the Docker Linux VM",
                os
            );
        }
        _ => {
            return Err(BuildError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            });
        }
    }

    let platform = Platform::new("linux", arch);
    if !supported.contains(&platform) {
        return Err(BuildError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        });
    }

    tracing::debug!("Detected build platform: {}", platform);
    Ok(platform)
}
