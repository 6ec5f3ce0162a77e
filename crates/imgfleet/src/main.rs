mod catalog;
mod commands;
mod git;
mod settings;

use catalog::{Ghc, HstreamParams, LogDeviceLine};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use imgfleet_build::{BuildError, PipelineOptions, Platform, platform};
use settings::Settings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imgfleet")]
#[command(version)]
#[command(about = "Build multi-arch images one platform at a time without losing the others", long_about = None)]
struct Cli {
    /// Config file (default: IMGFLEET_CONFIG_PATH, ./imgfleet.yaml, ~/.config/imgfleet/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Supported platforms, comma separated (e.g. linux/amd64,linux/arm64)
    #[arg(long, env = "IMGFLEET_PLATFORMS", global = true)]
    platforms: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Switches shared by every build target.
#[derive(Args, Debug, Clone, Copy)]
struct BuildFlags {
    /// Build only; do not push or touch any tag
    #[arg(long)]
    no_push: bool,
    /// Do not load the image into the local docker image store
    #[arg(long)]
    no_write_to_docker: bool,
    /// Build without the buildx cache
    #[arg(long)]
    no_cache: bool,
}

impl BuildFlags {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            push: !self.no_push,
            write_to_docker: !self.no_write_to_docker,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct LogDeviceArgs {
    /// LogDevice checkout
    #[arg(long, default_value = catalog::DEFAULT_LD_DIR)]
    ld_dir: PathBuf,
    #[command(flatten)]
    flags: BuildFlags,
}

#[derive(Args, Debug, Clone)]
struct HaskellArgs {
    /// docker-haskell checkout
    #[arg(long, default_value = catalog::DEFAULT_HS_DIR)]
    hs_dir: PathBuf,
    #[command(flatten)]
    flags: BuildFlags,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum BuildCache {
    Cache,
    NoCache,
}

impl BuildCache {
    fn as_arg(self) -> &'static str {
        match self {
            BuildCache::Cache => "cache",
            BuildCache::NoCache => "no_cache",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// hstreamdb/logdevice-builder:latest from the stable branch
    LogdeviceBuilder(LogDeviceArgs),
    /// hstreamdb/logdevice and hstreamdb/logdevice-client:latest from the stable branch
    Logdevice(LogDeviceArgs),
    /// hstreamdb/logdevice-builder:rqlite from the main branch
    LogdeviceBuilderRqlite(LogDeviceArgs),
    /// hstreamdb/logdevice and hstreamdb/logdevice-client:rqlite from the main branch
    LogdeviceRqlite(LogDeviceArgs),
    /// ghcr.io/hstreamdb/hsthrift
    Hsthrift(HaskellArgs),
    /// ghcr.io/hstreamdb/hadmin-store
    HadminStore(HaskellArgs),
    /// hstreamdb/haskell with GHC 8.10.7
    #[command(name = "haskell810")]
    Haskell810(HaskellArgs),
    /// hstreamdb/haskell with GHC 8.10.7 on the rqlite LogDevice client
    #[command(name = "haskell810-rqlite")]
    Haskell810Rqlite(HaskellArgs),
    /// hstreamdb/haskell with GHC 9.4.8
    #[command(name = "haskell904")]
    Haskell904(HaskellArgs),
    /// hstreamdb/haskell with GHC 9.4.8 on the rqlite LogDevice client
    #[command(name = "haskell904-rqlite")]
    Haskell904Rqlite(HaskellArgs),
    /// Every hstreamdb/haskell image, in order
    Haskell(HaskellArgs),
    /// hstreamdb/hstream application image
    Hstream {
        /// HStream checkout
        #[arg(long, default_value = catalog::DEFAULT_HSTREAM_DIR)]
        hstream_dir: PathBuf,
        /// Tag to publish (repeatable, the first one is probed)
        #[arg(long = "tag", default_value = "latest")]
        tags: Vec<String>,
        /// hstreamdb/haskell tag to build on
        #[arg(long, default_value = "9.4")]
        ghc: String,
        /// BUILD_CACHE mode passed to the Dockerfile
        #[arg(long, value_enum, default_value_t = BuildCache::Cache)]
        build_cache: BuildCache,
        #[command(flatten)]
        flags: BuildFlags,
    },
    /// List every build target
    Targets,
    /// Show the manifest entries a tag currently points at
    Inspect {
        /// Image reference, e.g. hstreamdb/haskell:9.4
        reference: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "✗".red().bold(), user_message(&err).red());
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new(default_level)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn user_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<BuildError>() {
        Some(build_err) if err.chain().count() == 1 => build_err.user_message(),
        _ => format!("{:#}", err),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if matches!(cli.command, Commands::Targets) {
        return commands::targets::handle();
    }

    let settings = Settings::load(cli.config.as_deref(), cli.platforms.as_deref())?;

    if let Commands::Inspect { reference } = &cli.command {
        return commands::inspect::handle(&settings, reference).await;
    }

    // before git or docker touch anything
    let local = platform::detect(&settings.supported)?;

    match cli.command {
        Commands::LogdeviceBuilder(args) => {
            commands::build::logdevice_builder(
                &settings,
                &local,
                &args.ld_dir,
                LogDeviceLine::Stable,
                args.flags.no_cache,
                args.flags.options(),
            )
            .await
        }
        Commands::Logdevice(args) => {
            commands::build::logdevice(
                &settings,
                &local,
                &args.ld_dir,
                LogDeviceLine::Stable,
                args.flags.no_cache,
                args.flags.options(),
            )
            .await
        }
        Commands::LogdeviceBuilderRqlite(args) => {
            commands::build::logdevice_builder(
                &settings,
                &local,
                &args.ld_dir,
                LogDeviceLine::Rqlite,
                args.flags.no_cache,
                args.flags.options(),
            )
            .await
        }
        Commands::LogdeviceRqlite(args) => {
            commands::build::logdevice(
                &settings,
                &local,
                &args.ld_dir,
                LogDeviceLine::Rqlite,
                args.flags.no_cache,
                args.flags.options(),
            )
            .await
        }
        Commands::Hsthrift(args) => {
            let target = catalog::hsthrift(&args.hs_dir, args.flags.no_cache)?;
            commands::build::run_targets(&settings, &local, vec![target], args.flags.options()).await
        }
        Commands::HadminStore(args) => {
            let target = catalog::hadmin_store(&args.hs_dir, args.flags.no_cache)?;
            commands::build::run_targets(&settings, &local, vec![target], args.flags.options()).await
        }
        Commands::Haskell810(args) => {
            haskell_one(&settings, &local, &args, Ghc::V8_10, LogDeviceLine::Stable).await
        }
        Commands::Haskell810Rqlite(args) => {
            haskell_one(&settings, &local, &args, Ghc::V8_10, LogDeviceLine::Rqlite).await
        }
        Commands::Haskell904(args) => {
            haskell_one(&settings, &local, &args, Ghc::V9_4, LogDeviceLine::Stable).await
        }
        Commands::Haskell904Rqlite(args) => {
            haskell_one(&settings, &local, &args, Ghc::V9_4, LogDeviceLine::Rqlite).await
        }
        Commands::Haskell(args) => {
            let targets = catalog::haskell_all(&args.hs_dir, args.flags.no_cache)?;
            commands::build::run_targets(&settings, &local, targets, args.flags.options()).await
        }
        Commands::Hstream {
            hstream_dir,
            tags,
            ghc,
            build_cache,
            flags,
        } => {
            let params = HstreamParams {
                tags,
                ghc,
                build_cache: build_cache.as_arg().to_string(),
                no_cache: flags.no_cache,
            };
            commands::build::hstream(&settings, &local, &hstream_dir, &params, flags.options()).await
        }
        Commands::Inspect { .. } | Commands::Targets => unreachable!("handled above"),
    }
}

async fn haskell_one(
    settings: &Settings,
    local: &Platform,
    args: &HaskellArgs,
    ghc: Ghc,
    line: LogDeviceLine,
) -> anyhow::Result<()> {
    let target = catalog::haskell(&args.hs_dir, ghc, line, args.flags.no_cache)?;
    commands::build::run_targets(settings, local, vec![target], args.flags.options()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_invert_into_options() {
        let cli = Cli::parse_from(["imgfleet", "haskell904", "--no-push", "--hs-dir", "/src/hs"]);
        match cli.command {
            Commands::Haskell904(args) => {
                assert_eq!(args.hs_dir, PathBuf::from("/src/hs"));
                let options = args.flags.options();
                assert!(!options.push);
                assert!(options.write_to_docker);
            }
            _ => panic!("expected haskell904"),
        }
    }

    #[test]
    fn test_hstream_tags() {
        let cli = Cli::parse_from([
            "imgfleet",
            "hstream",
            "--tag",
            "v0.19.0",
            "--tag",
            "latest",
            "--build-cache",
            "no-cache",
        ]);
        match cli.command {
            Commands::Hstream {
                tags,
                ghc,
                build_cache,
                ..
            } => {
                assert_eq!(tags, vec!["v0.19.0", "latest"]);
                assert_eq!(ghc, "9.4");
                assert_eq!(build_cache.as_arg(), "no_cache");
            }
            _ => panic!("expected hstream"),
        }
    }

    #[test]
    fn test_build_error_uses_user_message() {
        let err = anyhow::Error::new(BuildError::RegistryPublish("denied".to_string()));
        assert!(user_message(&err).contains("re-run to retry the publish"));
    }

    #[test]
    fn test_context_is_kept_in_message() {
        let err = anyhow::Error::new(BuildError::InvalidPlatform("amd64".to_string()))
            .context("Invalid --platforms value");
        assert_eq!(
            user_message(&err),
            "Invalid --platforms value: Invalid platform: amd64"
        );
    }
}
