//! Tag publishing
//!
//! Points one or more tags at the manifest list assembled from a set of
//! per-platform digests.

use crate::error::{BuildError, Result};
use crate::manifest::Digest;
use crate::registry::RegistryClient;
use colored::Colorize;

/// Commits a reconciled digest set under a list of tags.
pub struct TagPublisher<'a> {
    registry: &'a dyn RegistryClient,
}

impl<'a> TagPublisher<'a> {
    pub fn new(registry: &'a dyn RegistryClient) -> Self {
        Self { registry }
    }

    /// Point every tag in `tags` at the manifest list made of `digests`.
    ///
    /// Both lists must be non-empty; this is checked before the registry is
    /// contacted. All tags are updated by one registry operation and receive
    /// the same manifest list.
    pub async fn publish(&self, image: &str, tags: &[String], digests: &[Digest]) -> Result<()> {
        if tags.is_empty() {
            return Err(BuildError::InvalidPublishRequest(format!(
                "no tags to publish for {}",
                image
            )));
        }
        if digests.is_empty() {
            return Err(BuildError::InvalidPublishRequest(format!(
                "no digests to publish for {}",
                image
            )));
        }
        for tag in tags {
            validate_tag(tag)?;
        }

        let references: Vec<String> = tags.iter().map(|t| format!("{}:{}", image, t)).collect();
        let sources: Vec<String> = digests.iter().map(|d| format!("{}@{}", image, d)).collect();

        for reference in &references {
            println!("  → {}", reference.cyan());
        }

        self.registry.create_tags(&references, &sources).await?;

        tracing::info!(
            "Published {} digest(s) under {} tag(s) of {}",
            sources.len(),
            references.len(),
            image
        );
        Ok(())
    }
}

/// A tag the registry accepts: `[A-Za-z0-9_][A-Za-z0-9_.-]*`, at most 128
/// characters.
pub fn validate_tag(tag: &str) -> Result<()> {
    let mut chars = tag.chars();
    let valid = match chars.next() {
        Some(first) => {
            tag.len() <= 128
                && (first.is_ascii_alphanumeric() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(BuildError::InvalidTag {
            tag: tag.to_string(),
        })
    }
}

/// Split `image[:tag]`, defaulting the tag to `latest`.
///
/// Only a colon in the last path component separates the tag, so the port
/// in `localhost:5000/hstream` stays part of the image.
pub fn split_image_tag(reference: &str) -> (String, String) {
    let name_start = reference.rfind('/').map_or(0, |slash| slash + 1);
    match reference[name_start..].rfind(':') {
        Some(colon) => {
            let split = name_start + colon;
            (
                reference[..split].to_string(),
                reference[split + 1..].to_string(),
            )
        }
        None => (reference.to_string(), "latest".to_string()),
    }
}
