pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing directly at a config file.
pub const CONFIG_PATH_ENV: &str = "IMGFLEET_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["imgfleet.yaml", ".imgfleet.yaml"];

/// Process-wide settings shared by every target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetConfig {
    /// Platforms the fleet is published for, e.g. `linux/amd64`.
    pub supported_platforms: Vec<String>,
    /// docker CLI used for buildx.
    pub docker: String,
    /// git CLI used to prepare source checkouts.
    pub git: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            supported_platforms: vec!["linux/amd64".to_string(), "linux/arm64".to_string()],
            docker: "docker".to_string(),
            git: "git".to_string(),
        }
    }
}

impl FleetConfig {
    fn validate(&self) -> Result<()> {
        if self.supported_platforms.is_empty() {
            return Err(ConfigError::Invalid(
                "supported_platforms must not be empty".to_string(),
            ));
        }
        if self.docker.trim().is_empty() || self.git.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "docker and git must name an executable".to_string(),
            ));
        }
        Ok(())
    }
}

/// imgfleet's directory under the user config dir (`~/.config/imgfleet`).
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("imgfleet"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// Locate the config file.
///
/// Search order:
/// 1. `IMGFLEET_CONFIG_PATH` (must exist when set)
/// 2. current directory: imgfleet.yaml, .imgfleet.yaml
/// 3. `~/.config/imgfleet/config.yaml`
///
/// `Ok(None)` means no file exists and defaults apply.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.is_file() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.is_file() {
            return Ok(Some(path));
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join("config.yaml");
        if global.is_file() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

pub fn load_config_file(path: &Path) -> Result<FleetConfig> {
    if !path.is_file() {
        return Err(ConfigError::ConfigFileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let config: FleetConfig = if content.trim().is_empty() {
        FleetConfig::default()
    } else {
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };

    config.validate()?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Load the config found by [`find_config_file`], or the defaults.
pub fn load_config() -> Result<FleetConfig> {
    match find_config_file()? {
        Some(path) => load_config_file(&path),
        None => Ok(FleetConfig::default()),
    }
}
