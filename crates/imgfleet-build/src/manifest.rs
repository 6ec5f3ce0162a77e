//! Registry manifest model
//!
//! Decodes the raw manifest served for a tag into a normalized list of
//! (platform, digest) entries.

use crate::error::{BuildError, Result};
use crate::platform::Platform;
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

/// Content address of an image, `algorithm:hex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| BuildError::InvalidDigest(s.to_string()))?;

        let algorithm_ok = !algorithm.is_empty()
            && algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c));
        let hex_ok = !hex.is_empty() && hex.chars().all(|c| c.is_ascii_alphanumeric());

        if !algorithm_ok || !hex_ok {
            return Err(BuildError::InvalidDigest(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }

    /// sha256 digest of raw manifest bytes, as the registry computes it.
    pub fn sha256_of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One architecture-specific image inside a manifest list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub platform: Platform,
    pub digest: Digest,
}

impl ManifestEntry {
    pub fn new(platform: Platform, digest: Digest) -> Self {
        Self { platform, digest }
    }
}

/// What a tag pointed at when it was inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSnapshot {
    /// The tag does not exist yet.
    Absent,
    Present(Vec<ManifestEntry>),
}

impl ManifestSnapshot {
    pub fn entries(&self) -> &[ManifestEntry] {
        match self {
            ManifestSnapshot::Absent => &[],
            ManifestSnapshot::Present(entries) => entries,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ManifestSnapshot::Absent)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    manifests: Option<Vec<RawDescriptor>>,
    /// Only present on schema 1 manifests.
    #[serde(default)]
    architecture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    digest: String,
    #[serde(default)]
    platform: Option<RawPlatform>,
}

#[derive(Debug, Deserialize)]
struct RawPlatform {
    os: String,
    architecture: String,
    #[serde(default)]
    variant: Option<String>,
}

/// Decode the raw bytes served for a tag.
///
/// A manifest list (or OCI index) yields one entry per platform descriptor.
/// A single manifest yields one entry whose digest is the hash of the bytes
/// themselves; its platform is `linux/amd64` unless the manifest names an
/// architecture.
pub fn decode_manifest(raw: &[u8]) -> Result<Vec<ManifestEntry>> {
    let manifest: RawManifest = serde_json::from_slice(raw)?;

    if let Some(descriptors) = manifest.manifests {
        let mut entries = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let digest = Digest::parse(&descriptor.digest)?;
            match descriptor.platform {
                Some(p) => {
                    let platform =
                        Platform::with_variant(&p.os, &p.architecture, p.variant.as_deref());
                    entries.push(ManifestEntry::new(platform, digest));
                }
                None => {
                    tracing::warn!("Skipping manifest {} without platform", digest);
                }
            }
        }
        return Ok(entries);
    }

    let platform = match manifest.architecture.as_deref() {
        Some(arch) if !arch.is_empty() => Platform::new("linux", arch),
        _ => {
            tracing::warn!(
                "Single-platform manifest ({}) carries no platform, assuming linux/amd64",
                manifest.media_type.as_deref().unwrap_or("unknown media type")
            );
            Platform::linux_amd64()
        }
    };

    Ok(vec![ManifestEntry::new(platform, Digest::sha256_of(raw))])
}
