use crate::catalog::{self, HstreamParams, HstreamVersion, LogDeviceLine};
use crate::git::Git;
use crate::settings::Settings;
use colored::Colorize;
use imgfleet_build::{BuildTarget, Buildx, Pipeline, PipelineOptions, PipelineOutcome, Platform};
use std::path::Path;

/// Build and publish `targets` for `local` in order, stopping at the first
/// failure. `local` comes from `platform::detect`, which must run before any
/// other external command.
pub async fn run_targets(
    settings: &Settings,
    local: &Platform,
    targets: Vec<BuildTarget>,
    options: PipelineOptions,
) -> anyhow::Result<()> {
    tracing::info!(
        "Building for {} (supported: {})",
        local,
        settings.supported
    );

    let buildx = Buildx::new(&settings.docker);
    let pipeline = Pipeline::new(&buildx, &buildx, local.clone(), settings.supported.clone());

    let outcomes = pipeline.run_all(&targets, options).await?;
    print_summary(&outcomes);
    Ok(())
}

pub async fn logdevice_builder(
    settings: &Settings,
    local: &Platform,
    ld_dir: &Path,
    line: LogDeviceLine,
    no_cache: bool,
    options: PipelineOptions,
) -> anyhow::Result<()> {
    let target = catalog::logdevice_builder(ld_dir, line, no_cache)?;
    Git::new(&settings.git)
        .checkout(ld_dir, line.revision())
        .await?;
    run_targets(settings, local, vec![target], options).await
}

pub async fn logdevice(
    settings: &Settings,
    local: &Platform,
    ld_dir: &Path,
    line: LogDeviceLine,
    no_cache: bool,
    options: PipelineOptions,
) -> anyhow::Result<()> {
    let targets = catalog::logdevice(ld_dir, line, no_cache)?;
    Git::new(&settings.git)
        .checkout(ld_dir, line.revision())
        .await?;
    run_targets(settings, local, targets, options).await
}

/// Stamp the HStream checkout with its version, then build it.
pub async fn hstream(
    settings: &Settings,
    local: &Platform,
    dir: &Path,
    params: &HstreamParams,
    options: PipelineOptions,
) -> anyhow::Result<()> {
    let git = Git::new(&settings.git);
    let version = HstreamVersion {
        version: git.describe_tag(dir).await?,
        commit: git.head_commit(dir).await?,
    };
    println!(
        "{}",
        format!(
            "-> hstream version: {} ({})",
            version.version, version.commit
        )
        .cyan()
    );

    let target = catalog::hstream(dir, params, &version)?;
    run_targets(settings, local, vec![target], options).await
}

fn print_summary(outcomes: &[PipelineOutcome]) {
    println!();
    for outcome in outcomes {
        match &outcome.published {
            Some(set) => println!(
                "{} {} {} ({} platform(s))",
                "✓".green(),
                outcome.target.bold(),
                outcome.digest,
                set.digests().len()
            ),
            None => println!(
                "{} {} {} {}",
                "✓".green(),
                outcome.target.bold(),
                outcome.digest,
                "(not pushed)".dimmed()
            ),
        }
    }
}
