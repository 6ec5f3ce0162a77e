//! Image build step
//!
//! Typed description of a `docker buildx build` invocation and the builder
//! trait the pipeline drives.

use crate::error::{BuildError, Result};
use crate::manifest::Digest;
use crate::platform::Platform;
use crate::target::BuildTarget;
use async_trait::async_trait;
use std::path::Path;

/// Metadata key buildx writes the resulting image digest under.
pub const DIGEST_METADATA_KEY: &str = "containerimage.digest";

/// Where the build result goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutput {
    /// Push to the registry addressed by digest only; no tag is written.
    PushByDigest,
    /// Build the image without pushing it anywhere.
    Unpushed,
    /// Load into the local docker image store under `image:tag`.
    Docker { tag: String },
}

impl BuildOutput {
    /// The `--output` value for this destination.
    pub fn to_output_arg(&self, image: &str) -> String {
        match self {
            BuildOutput::PushByDigest => format!(
                "type=image,name={},push-by-digest=true,name-canonical=true,push=true",
                image
            ),
            BuildOutput::Unpushed => {
                format!("type=image,name={},name-canonical=true,push=false", image)
            }
            BuildOutput::Docker { tag } => format!("type=docker,name={}:{}", image, tag),
        }
    }
}

/// Builds single-platform images.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build `target` for `platform` and return the content digest.
    ///
    /// With `push`, the image is pushed by digest and no tag is touched.
    async fn build(&self, target: &BuildTarget, platform: &Platform, push: bool) -> Result<Digest>;

    /// Materialize `target` as `image:tag` in the local image store.
    async fn write_to_docker(
        &self,
        target: &BuildTarget,
        platform: &Platform,
        tag: &str,
    ) -> Result<()>;
}

/// Arguments after `docker` for one build.
pub fn buildx_build_args(
    target: &BuildTarget,
    platform: &Platform,
    output: &BuildOutput,
    metadata_file: Option<&Path>,
) -> Vec<String> {
    let mut args = vec![
        "buildx".to_string(),
        "build".to_string(),
        "--file".to_string(),
        target.dockerfile().display().to_string(),
        "--platform".to_string(),
        platform.to_string(),
    ];

    if let Some(stage) = target.stage() {
        args.push("--target".to_string());
        args.push(stage.to_string());
    }

    for (key, value) in target.build_args() {
        args.push("--build-arg".to_string());
        args.push(format!("{}={}", key, value));
    }

    if target.no_cache() {
        args.push("--no-cache".to_string());
    }

    args.push("--output".to_string());
    args.push(output.to_output_arg(target.image()));

    if let Some(path) = metadata_file {
        args.push("--metadata-file".to_string());
        args.push(path.display().to_string());
    }

    args.push(".".to_string());
    args
}

/// Fail early when the working tree for `target` is missing.
pub fn check_build_context(target: &BuildTarget) -> Result<()> {
    let context = target.context_dir();
    if !context.exists() {
        return Err(BuildError::ContextNotFound(context.to_path_buf()));
    }
    if !context.is_dir() {
        return Err(BuildError::InvalidConfig(format!(
            "Build context is not a directory: {}",
            context.display()
        )));
    }

    let dockerfile = context.join(target.dockerfile());
    if !dockerfile.is_file() {
        return Err(BuildError::DockerfileNotFound(dockerfile));
    }

    Ok(())
}

/// Read the image digest from a buildx metadata file.
pub fn read_build_digest(metadata_file: &Path, image: &str) -> Result<Digest> {
    let content = std::fs::read_to_string(metadata_file)?;
    if content.trim().is_empty() {
        return Err(BuildError::MissingDigest {
            image: image.to_string(),
        });
    }

    let metadata: serde_json::Value = serde_json::from_str(&content)?;
    let digest = metadata
        .get(DIGEST_METADATA_KEY)
        .and_then(|v| v.as_str())
        .ok_or_else(|| BuildError::MissingDigest {
            image: image.to_string(),
        })?;

    Digest::parse(digest)
}
