//! docker buildx wrapper
//!
//! Implements [`ImageBuilder`] and [`RegistryClient`] by running the docker
//! CLI. Build output streams to the terminal; registry calls are captured.

use crate::builder::{
    BuildOutput, ImageBuilder, buildx_build_args, check_build_context, read_build_digest,
};
use crate::error::{BuildError, Result};
use crate::manifest::Digest;
use crate::platform::Platform;
use crate::registry::{RawManifestResponse, RegistryClient, imagetools_create_args, is_not_found};
use crate::target::BuildTarget;
use async_trait::async_trait;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

/// docker buildx CLI wrapper
#[derive(Debug, Clone)]
pub struct Buildx {
    docker: PathBuf,
}

impl Default for Buildx {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl Buildx {
    pub fn new(docker: impl Into<PathBuf>) -> Self {
        Self {
            docker: docker.into(),
        }
    }

    fn command(&self, args: &[String], cwd: Option<&Path>) -> Command {
        println!(
            "{}",
            format!("-> run: {} {}", self.docker.display(), args.join(" ")).cyan()
        );

        let mut cmd = Command::new(&self.docker);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> BuildError {
        if e.kind() == std::io::ErrorKind::NotFound {
            BuildError::CommandNotFound(self.docker.display().to_string())
        } else {
            BuildError::Io(e)
        }
    }

    /// Run with inherited stdio so build logs reach the operator.
    async fn run_streaming(&self, args: &[String], cwd: &Path, image: &str) -> Result<()> {
        let status = self
            .command(args, Some(cwd))
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !status.success() {
            return Err(BuildError::BuildFailed {
                image: image.to_string(),
                message: format!("docker buildx build exited with {}", status),
            });
        }

        Ok(())
    }

    /// Run and capture stdout / stderr.
    async fn run_captured(&self, args: &[String]) -> Result<Output> {
        self.command(args, None)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))
    }
}

#[async_trait]
impl ImageBuilder for Buildx {
    async fn build(&self, target: &BuildTarget, platform: &Platform, push: bool) -> Result<Digest> {
        check_build_context(target)?;

        let metadata = tempfile::Builder::new()
            .prefix("imgfleet-metadata-")
            .suffix(".json")
            .tempfile()?;

        let output = if push {
            BuildOutput::PushByDigest
        } else {
            BuildOutput::Unpushed
        };
        let args = buildx_build_args(target, platform, &output, Some(metadata.path()));

        tracing::info!("Building {} for {}", target.image(), platform);
        self.run_streaming(&args, target.context_dir(), target.image())
            .await?;

        let digest = read_build_digest(metadata.path(), target.image())?;
        println!(
            "{}",
            format!("-> {} digest: {}", target.image(), digest).cyan()
        );
        Ok(digest)
    }

    async fn write_to_docker(
        &self,
        target: &BuildTarget,
        platform: &Platform,
        tag: &str,
    ) -> Result<()> {
        check_build_context(target)?;

        let output = BuildOutput::Docker {
            tag: tag.to_string(),
        };
        let args = buildx_build_args(target, platform, &output, None);

        tracing::info!("Loading {}:{} into docker", target.image(), tag);
        self.run_streaming(&args, target.context_dir(), target.image())
            .await
    }
}

#[async_trait]
impl RegistryClient for Buildx {
    async fn inspect_raw(&self, reference: &str) -> Result<RawManifestResponse> {
        let args = vec![
            "buildx".to_string(),
            "imagetools".to_string(),
            "inspect".to_string(),
            "--raw".to_string(),
            reference.to_string(),
        ];

        let output = self.run_captured(&args).await?;

        if output.status.success() {
            tracing::debug!("Raw manifest of {}: {} bytes", reference, output.stdout.len());
            return Ok(RawManifestResponse::Found(output.stdout));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_found(&stderr) {
            tracing::debug!("{} does not exist yet", reference);
            return Ok(RawManifestResponse::NotFound);
        }

        Err(BuildError::RegistryQuery {
            reference: reference.to_string(),
            message: stderr.trim().to_string(),
        })
    }

    async fn create_tags(&self, tags: &[String], sources: &[String]) -> Result<()> {
        let args = imagetools_create_args(tags, sources);
        let output = self.run_captured(&args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::RegistryPublish(stderr.trim().to_string()));
        }

        Ok(())
    }
}
