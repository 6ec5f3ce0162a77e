//! Build and registry errors
//!
//! Each variant maps to one [`ErrorKind`] through [`BuildError::kind`].

use std::path::PathBuf;
use thiserror::Error;

/// Broad failure category, used by the CLI to pick a remediation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Build,
    RegistryQuery,
    RegistryPublish,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Invalid tag {tag:?}: expected [A-Za-z0-9_.-], at most 128 characters, not starting with . or -")]
    InvalidTag { tag: String },

    #[error("Invalid publish request: {0}")]
    InvalidPublishRequest(String),

    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Build failed for {image}: {message}")]
    BuildFailed { image: String, message: String },

    #[error("Build metadata for {image} has no containerimage.digest")]
    MissingDigest { image: String },

    #[error("Registry query failed for {reference}: {message}")]
    RegistryQuery { reference: String, message: String },

    #[error("Registry publish failed: {0}")]
    RegistryPublish(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::UnsupportedPlatform { .. }
            | BuildError::InvalidPlatform(_)
            | BuildError::InvalidDigest(_)
            | BuildError::InvalidTag { .. }
            | BuildError::InvalidPublishRequest(_)
            | BuildError::InvalidConfig(_)
            | BuildError::DockerfileNotFound(_)
            | BuildError::ContextNotFound(_)
            | BuildError::CommandNotFound(_) => ErrorKind::Configuration,
            BuildError::BuildFailed { .. }
            | BuildError::MissingDigest { .. }
            | BuildError::Json(_)
            | BuildError::Io(_) => ErrorKind::Build,
            BuildError::RegistryQuery { .. } => ErrorKind::RegistryQuery,
            BuildError::RegistryPublish(_) => ErrorKind::RegistryPublish,
        }
    }

    /// Operator-facing message with a hint on how to recover.
    pub fn user_message(&self) -> String {
        match self {
            BuildError::UnsupportedPlatform { os, arch } => {
                format!(
                    "This machine ({}/{}) is not a supported build platform.\n\
                     \n\
                     Either build on one of the configured platforms, or add the\n\
                     platform to `supported_platforms` in imgfleet.yaml\n\
                     (or IMGFLEET_PLATFORMS).",
                    os, arch
                )
            }
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfile not found: {}\n\
                     \n\
                     Check that the source repository is checked out and that\n\
                     the working directory option points at it.",
                    path.display()
                )
            }
            BuildError::ContextNotFound(path) => {
                format!(
                    "Build context directory not found: {}\n\
                     \n\
                     Clone the repository there or pass its path explicitly.",
                    path.display()
                )
            }
            BuildError::CommandNotFound(program) => {
                format!(
                    "`{}` was not found in PATH.\n\
                     \n\
                     Install it, or point imgfleet.yaml at the right binary.",
                    program
                )
            }
            BuildError::BuildFailed { image, message } => {
                format!(
                    "Build of {} failed: {}\n\
                     \n\
                     No tag was touched. Fix the build and re-run.",
                    image, message
                )
            }
            BuildError::RegistryQuery { reference, message } => {
                format!(
                    "Could not read the current manifest of {}:\n{}\n\
                     \n\
                     The tag was NOT updated. Check registry access\n\
                     (docker login) and network, then re-run.",
                    reference, message
                )
            }
            BuildError::RegistryPublish(message) => {
                format!(
                    "The registry rejected the tag update:\n{}\n\
                     \n\
                     The image was pushed by digest; re-run to retry the publish.",
                    message
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
