//! Build → inspect → reconcile → publish, per target.

use crate::builder::ImageBuilder;
use crate::error::Result;
use crate::inspector::ManifestInspector;
use crate::manifest::Digest;
use crate::platform::{Platform, SupportedPlatforms};
use crate::publisher::TagPublisher;
use crate::reconcile::{DropReason, PublishSet, reconcile};
use crate::registry::RegistryClient;
use crate::target::BuildTarget;
use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Push by digest and reconcile the target's tags.
    pub push: bool,
    /// Also load the image into the local docker image store under every tag.
    pub write_to_docker: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            push: true,
            write_to_docker: true,
        }
    }
}

/// Result of one target's run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub target: String,
    pub digest: Digest,
    /// `None` when the run did not push.
    pub published: Option<PublishSet>,
}

pub struct Pipeline<'a> {
    builder: &'a dyn ImageBuilder,
    registry: &'a dyn RegistryClient,
    platform: Platform,
    supported: SupportedPlatforms,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        builder: &'a dyn ImageBuilder,
        registry: &'a dyn RegistryClient,
        platform: Platform,
        supported: SupportedPlatforms,
    ) -> Self {
        Self {
            builder,
            registry,
            platform,
            supported,
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Run one target. Any failure aborts before the tag is touched, except a
    /// failure of the final publish itself.
    pub async fn run(&self, target: &BuildTarget, options: PipelineOptions) -> Result<PipelineOutcome> {
        println!();
        println!(
            "{}",
            format!("🔨 {} ({}) for {}", target.name(), target.image(), self.platform)
                .green()
                .bold()
        );

        let digest = self
            .builder
            .build(target, &self.platform, options.push)
            .await?;

        if options.write_to_docker {
            for tag in target.tags() {
                self.builder
                    .write_to_docker(target, &self.platform, tag)
                    .await?;
            }
        }

        if !options.push {
            return Ok(PipelineOutcome {
                target: target.name().to_string(),
                digest,
                published: None,
            });
        }

        // inspect only after the build so the local entry is always superseded
        let snapshot = ManifestInspector::new(self.registry)
            .inspect(target.image(), target.probe_tag())
            .await?;

        let publish_set = reconcile(&snapshot, &digest, &self.platform, &self.supported);
        report(target, &publish_set);

        TagPublisher::new(self.registry)
            .publish(target.image(), target.tags(), &publish_set.digests())
            .await?;

        println!(
            "  {} {} published",
            "✓".green(),
            target.image().cyan()
        );

        Ok(PipelineOutcome {
            target: target.name().to_string(),
            digest,
            published: Some(publish_set),
        })
    }

    /// Run targets in order, stopping at the first failure. Targets already
    /// published stay published.
    pub async fn run_all(
        &self,
        targets: &[BuildTarget],
        options: PipelineOptions,
    ) -> Result<Vec<PipelineOutcome>> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.run(target, options).await?);
        }
        Ok(outcomes)
    }
}

fn report(target: &BuildTarget, publish_set: &PublishSet) {
    println!(
        "  {} {} ({})",
        "+".green(),
        publish_set.built(),
        publish_set.local_platform()
    );
    for entry in publish_set.retained() {
        println!("  {} {} ({})", "=".blue(), entry.digest, entry.platform);
    }
    for (entry, reason) in publish_set.dropped() {
        let why = match reason {
            DropReason::Superseded => "superseded",
            DropReason::Unsupported => "unsupported platform",
            DropReason::Duplicate => "duplicate platform entry",
        };
        println!(
            "  {} {} ({}, {})",
            "-".yellow(),
            entry.digest,
            entry.platform,
            why.dimmed()
        );
    }
    tracing::debug!(
        "{}: publishing {} digest(s) under {:?}",
        target.name(),
        publish_set.digests().len(),
        target.tags()
    );
}
