//! imgfleet multi-arch image build and publish
//!
//! This crate builds single-platform images pushed by digest, reads the
//! manifest list a tag currently points at, reconciles it with the fresh
//! build, and republishes the tag so other platforms' entries survive.

pub mod builder;
pub mod buildx;
pub mod error;
pub mod inspector;
pub mod manifest;
pub mod pipeline;
pub mod platform;
pub mod publisher;
pub mod reconcile;
pub mod registry;
pub mod target;

pub use builder::{BuildOutput, ImageBuilder};
pub use buildx::Buildx;
pub use error::{BuildError, ErrorKind, Result};
pub use inspector::ManifestInspector;
pub use manifest::{Digest, ManifestEntry, ManifestSnapshot};
pub use pipeline::{Pipeline, PipelineOptions, PipelineOutcome};
pub use platform::{Platform, SupportedPlatforms};
pub use publisher::{TagPublisher, split_image_tag, validate_tag};
pub use reconcile::{DropReason, PublishSet, reconcile};
pub use registry::{RawManifestResponse, RegistryClient};
pub use target::BuildTarget;
