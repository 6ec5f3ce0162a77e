//! Build target definition

use crate::error::{BuildError, Result};
use crate::publisher::validate_tag;
use std::path::{Path, PathBuf};

/// Everything needed to build and publish one image.
///
/// Constructed once at the CLI boundary and passed by reference through the
/// pipeline; there is no way to mutate a target after `build()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    name: String,
    image: String,
    dockerfile: PathBuf,
    stage: Option<String>,
    build_args: Vec<(String, String)>,
    tags: Vec<String>,
    context_dir: PathBuf,
    no_cache: bool,
}

impl BuildTarget {
    pub fn builder(
        name: impl Into<String>,
        image: impl Into<String>,
        dockerfile: impl Into<PathBuf>,
    ) -> BuildTargetBuilder {
        BuildTargetBuilder {
            name: name.into(),
            image: image.into(),
            dockerfile: dockerfile.into(),
            stage: None,
            build_args: Vec::new(),
            tags: Vec::new(),
            context_dir: PathBuf::from("."),
            no_cache: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image repository without tag, e.g. `hstreamdb/haskell`.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Dockerfile path, relative to the context directory.
    pub fn dockerfile(&self) -> &Path {
        &self.dockerfile
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    pub fn build_args(&self) -> &[(String, String)] {
        &self.build_args
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The tag whose manifest is reconciled against; all tags end up equal.
    pub fn probe_tag(&self) -> &str {
        &self.tags[0]
    }

    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    pub fn no_cache(&self) -> bool {
        self.no_cache
    }
}

pub struct BuildTargetBuilder {
    name: String,
    image: String,
    dockerfile: PathBuf,
    stage: Option<String>,
    build_args: Vec<(String, String)>,
    tags: Vec<String>,
    context_dir: PathBuf,
    no_cache: bool,
}

impl BuildTargetBuilder {
    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn build_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.build_args.push((key.into(), value.into()));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context_dir = dir.into();
        self
    }

    pub fn no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn build(self) -> Result<BuildTarget> {
        if self.image.is_empty() || self.image.contains('@') {
            return Err(BuildError::InvalidConfig(format!(
                "invalid image name for {}: '{}'",
                self.name, self.image
            )));
        }

        if self.tags.is_empty() {
            return Err(BuildError::InvalidConfig(format!(
                "target {} has no tags",
                self.name
            )));
        }

        for tag in &self.tags {
            validate_tag(tag)?;
        }

        for (key, _) in &self.build_args {
            if key.is_empty() || key.contains('=') {
                return Err(BuildError::InvalidConfig(format!(
                    "invalid build argument name '{}' for {}",
                    key, self.name
                )));
            }
            warn_sensitive_build_arg(key);
        }

        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Ok(BuildTarget {
            name: self.name,
            image: self.image,
            dockerfile: self.dockerfile,
            stage: self.stage,
            build_args: self.build_args,
            tags,
            context_dir: self.context_dir,
            no_cache: self.no_cache,
        })
    }
}

/// Build arguments end up in the image history.
fn warn_sensitive_build_arg(key: &str) {
    let sensitive_patterns = ["password", "token", "secret", "api_key", "private_key"];

    let key_lower = key.to_lowercase();
    if sensitive_patterns.iter().any(|p| key_lower.contains(p)) {
        tracing::warn!(
            "Build argument '{}' may contain a secret; build arguments are recorded in the image history",
            key
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_target() {
        let target = BuildTarget::builder("haskell904", "hstreamdb/haskell", "Dockerfile")
            .tags(["9.4.8", "9.4", "latest"])
            .build_arg("GHC", "9.4.8")
            .context_dir("./docker-haskell")
            .build()
            .unwrap();

        assert_eq!(target.probe_tag(), "9.4.8");
        assert_eq!(target.tags().len(), 3);
        assert_eq!(target.stage(), None);
        assert_eq!(
            target.build_args(),
            &[("GHC".to_string(), "9.4.8".to_string())]
        );
        assert_eq!(target.context_dir(), Path::new("./docker-haskell"));
    }

    #[test]
    fn test_build_target_requires_tags() {
        let result = BuildTarget::builder("x", "hstreamdb/x", "Dockerfile").build();
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_target_rejects_bad_tag() {
        let result = BuildTarget::builder("x", "hstreamdb/x", "Dockerfile")
            .tag("-bad")
            .build();
        assert!(matches!(result, Err(BuildError::InvalidTag { .. })));
    }

    #[test]
    fn test_build_target_rejects_digest_image() {
        let result = BuildTarget::builder("x", "hstreamdb/x@sha256:abc", "Dockerfile")
            .tag("latest")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_target_dedups_tags() {
        let target = BuildTarget::builder("x", "hstreamdb/x", "Dockerfile")
            .tags(["latest", "v1", "latest"])
            .build()
            .unwrap();
        assert_eq!(target.tags(), &["latest".to_string(), "v1".to_string()]);
    }
}
