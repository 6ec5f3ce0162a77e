//! Registry client seam
//!
//! The registry is only ever read through `inspect_raw` and written through
//! `create_tags`; both are implemented by [`crate::buildx::Buildx`].

use crate::error::Result;
use async_trait::async_trait;

/// Outcome of reading the manifest served for a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawManifestResponse {
    /// Raw manifest bytes exactly as served.
    Found(Vec<u8>),
    /// The registry affirmatively reported that the reference does not exist.
    NotFound,
}

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Read the raw manifest of `reference` (`image:tag`).
    ///
    /// Must return `NotFound` only on an affirmative not-found answer; any
    /// other failure is an error.
    async fn inspect_raw(&self, reference: &str) -> Result<RawManifestResponse>;

    /// Point every reference in `tags` (`image:tag`) at one manifest list
    /// assembled from `sources` (`image@digest`), in a single operation.
    async fn create_tags(&self, tags: &[String], sources: &[String]) -> Result<()>;
}

/// Whether the inspect tool's error output says the reference does not exist.
///
/// buildx reports a missing tag as `ERROR: <ref>: not found`. Auth failures,
/// missing repositories and network errors produce other messages and must
/// not be mistaken for a missing tag.
pub fn is_not_found(stderr: &str) -> bool {
    stderr.lines().map(str::trim).any(|line| {
        let line = line.strip_prefix("ERROR:").map(str::trim).unwrap_or(line);
        line.ends_with(": not found") && !line.contains("repository")
    })
}

/// Arguments after `docker` for one `imagetools create` call.
pub fn imagetools_create_args(tags: &[String], sources: &[String]) -> Vec<String> {
    let mut args = vec![
        "buildx".to_string(),
        "imagetools".to_string(),
        "create".to_string(),
    ];
    for tag in tags {
        args.push("--tag".to_string());
        args.push(tag.clone());
    }
    args.extend(sources.iter().cloned());
    args
}
