use anyhow::Context;
use imgfleet_build::{Platform, SupportedPlatforms};
use imgfleet_config::FleetConfig;
use std::path::{Path, PathBuf};

/// Config file values with command line overrides applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub docker: PathBuf,
    pub git: PathBuf,
    pub supported: SupportedPlatforms,
}

impl Settings {
    pub fn load(config_path: Option<&Path>, platforms: Option<&str>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => imgfleet_config::load_config_file(path)?,
            None => imgfleet_config::load_config()?,
        };
        Self::from_config(config, platforms)
    }

    pub fn from_config(config: FleetConfig, platforms: Option<&str>) -> anyhow::Result<Self> {
        let supported = match platforms {
            Some(list) => SupportedPlatforms::parse_list(list)
                .with_context(|| format!("Invalid --platforms value: {:?}", list))?,
            None => {
                let parsed = config
                    .supported_platforms
                    .iter()
                    .map(|p| p.parse::<Platform>())
                    .collect::<Result<Vec<_>, _>>()
                    .context("Invalid supported_platforms in config")?;
                SupportedPlatforms::new(parsed)?
            }
        };

        tracing::debug!("Supported platforms: {}", supported);

        Ok(Self {
            docker: PathBuf::from(config.docker),
            git: PathBuf::from(config.git),
            supported,
        })
    }
}
