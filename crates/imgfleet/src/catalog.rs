//! Build targets of the image fleet.
//!
//! Every image the fleet publishes is described here once. Working
//! directories and per-run switches come from the command line.

use imgfleet_build::{BuildTarget, Result};
use std::path::Path;

pub const DEFAULT_LD_DIR: &str = "./LogDevice";
pub const DEFAULT_HS_DIR: &str = "./docker-haskell";
pub const DEFAULT_HSTREAM_DIR: &str = "./hstream";

const LOGDEVICE_BUILDER_IMAGE: &str = "hstreamdb/logdevice-builder";
const LOGDEVICE_IMAGE: &str = "hstreamdb/logdevice";
const LOGDEVICE_CLIENT_IMAGE: &str = "hstreamdb/logdevice-client";
const HSTHRIFT_IMAGE: &str = "ghcr.io/hstreamdb/hsthrift";
const HADMIN_STORE_IMAGE: &str = "ghcr.io/hstreamdb/hadmin-store";
const HASKELL_IMAGE: &str = "hstreamdb/haskell";
const HSTREAM_IMAGE: &str = "hstreamdb/hstream";

/// LogDevice source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDeviceLine {
    /// `stable` branch, published as `latest`.
    Stable,
    /// `main` branch with the rqlite metadata store, published as `rqlite`.
    Rqlite,
}

impl LogDeviceLine {
    /// Git revision checked out before building.
    pub fn revision(self) -> &'static str {
        match self {
            LogDeviceLine::Stable => "stable",
            LogDeviceLine::Rqlite => "main",
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            LogDeviceLine::Stable => "latest",
            LogDeviceLine::Rqlite => "rqlite",
        }
    }
}

/// GHC release line of the Haskell base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ghc {
    V8_10,
    V9_4,
}

impl Ghc {
    pub fn version(self) -> &'static str {
        match self {
            Ghc::V8_10 => "8.10.7",
            Ghc::V9_4 => "9.4.8",
        }
    }

    pub fn short_version(self) -> &'static str {
        match self {
            Ghc::V8_10 => "8.10",
            Ghc::V9_4 => "9.4",
        }
    }

    /// The default line also carries the floating `latest` / `rqlite` tag.
    fn is_default(self) -> bool {
        self == Ghc::V9_4
    }
}

pub fn logdevice_builder(ld_dir: &Path, line: LogDeviceLine, no_cache: bool) -> Result<BuildTarget> {
    let name = match line {
        LogDeviceLine::Stable => "logdevice-builder",
        LogDeviceLine::Rqlite => "logdevice-builder-rqlite",
    };
    BuildTarget::builder(name, LOGDEVICE_BUILDER_IMAGE, "docker/Dockerfile.builder")
        .tag(line.tag())
        .context_dir(ld_dir)
        .no_cache(no_cache)
        .build()
}

/// Server image followed by the client stage of the same Dockerfile.
pub fn logdevice(ld_dir: &Path, line: LogDeviceLine, no_cache: bool) -> Result<Vec<BuildTarget>> {
    let (server, client) = match line {
        LogDeviceLine::Stable => ("logdevice", "logdevice-client"),
        LogDeviceLine::Rqlite => ("logdevice-rqlite", "logdevice-client-rqlite"),
    };

    Ok(vec![
        BuildTarget::builder(server, LOGDEVICE_IMAGE, "docker/Dockerfile")
            .tag(line.tag())
            .context_dir(ld_dir)
            .no_cache(no_cache)
            .build()?,
        BuildTarget::builder(client, LOGDEVICE_CLIENT_IMAGE, "docker/Dockerfile")
            .stage("client")
            .tag(line.tag())
            .context_dir(ld_dir)
            .no_cache(no_cache)
            .build()?,
    ])
}

pub fn hsthrift(hs_dir: &Path, no_cache: bool) -> Result<BuildTarget> {
    BuildTarget::builder("hsthrift", HSTHRIFT_IMAGE, "dockerfiles/hsthrift")
        .tag("latest")
        .context_dir(hs_dir)
        .no_cache(no_cache)
        .build()
}

pub fn hadmin_store(hs_dir: &Path, no_cache: bool) -> Result<BuildTarget> {
    BuildTarget::builder("hadmin-store", HADMIN_STORE_IMAGE, "dockerfiles/hadmin_store")
        .tag("latest")
        .context_dir(hs_dir)
        .no_cache(no_cache)
        .build()
}

/// Haskell base image for `ghc`, linked against the stable or rqlite
/// LogDevice client.
pub fn haskell(hs_dir: &Path, ghc: Ghc, line: LogDeviceLine, no_cache: bool) -> Result<BuildTarget> {
    let (name, prefix, client) = match (ghc, line) {
        (Ghc::V8_10, LogDeviceLine::Stable) => ("haskell810", "", LOGDEVICE_CLIENT_IMAGE.to_string()),
        (Ghc::V8_10, LogDeviceLine::Rqlite) => (
            "haskell810-rqlite",
            "rqlite_",
            format!("{}:rqlite", LOGDEVICE_CLIENT_IMAGE),
        ),
        (Ghc::V9_4, LogDeviceLine::Stable) => ("haskell904", "", LOGDEVICE_CLIENT_IMAGE.to_string()),
        (Ghc::V9_4, LogDeviceLine::Rqlite) => (
            "haskell904-rqlite",
            "rqlite_",
            format!("{}:rqlite", LOGDEVICE_CLIENT_IMAGE),
        ),
    };

    let mut tags = vec![
        format!("{}{}", prefix, ghc.version()),
        format!("{}{}", prefix, ghc.short_version()),
    ];
    if ghc.is_default() {
        tags.push(line.tag().to_string());
    }

    BuildTarget::builder(name, HASKELL_IMAGE, "Dockerfile")
        .tags(tags)
        .build_arg("GHC", ghc.version())
        .build_arg("LD_CLIENT_IMAGE", client)
        .context_dir(hs_dir)
        .no_cache(no_cache)
        .build()
}

/// Every Haskell base image, in publish order.
pub fn haskell_all(hs_dir: &Path, no_cache: bool) -> Result<Vec<BuildTarget>> {
    [
        (Ghc::V8_10, LogDeviceLine::Stable),
        (Ghc::V8_10, LogDeviceLine::Rqlite),
        (Ghc::V9_4, LogDeviceLine::Stable),
        (Ghc::V9_4, LogDeviceLine::Rqlite),
    ]
    .into_iter()
    .map(|(ghc, line)| haskell(hs_dir, ghc, line, no_cache))
    .collect()
}

/// Version stamp of an HStream checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HstreamVersion {
    pub version: String,
    pub commit: String,
}

/// Parameters of the HStream application image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HstreamParams {
    pub tags: Vec<String>,
    /// Tag of `hstreamdb/haskell` to build on, e.g. `9.4` or `rqlite_9.4`.
    pub ghc: String,
    /// Value of the `BUILD_CACHE` build argument.
    pub build_cache: String,
    pub no_cache: bool,
}

pub fn hstream(dir: &Path, params: &HstreamParams, version: &HstreamVersion) -> Result<BuildTarget> {
    BuildTarget::builder("hstream", HSTREAM_IMAGE, "Dockerfile")
        .tags(params.tags.iter().cloned())
        .build_arg("BUILDER_IMAGE", format!("{}:{}", HASKELL_IMAGE, params.ghc))
        .build_arg("HSTREAM_VERSION", &version.version)
        .build_arg("HSTREAM_VERSION_COMMIT", &version.commit)
        .build_arg("BUILD_CACHE", &params.build_cache)
        .context_dir(dir)
        .no_cache(params.no_cache)
        .build()
}

/// One catalog row for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub command: &'static str,
    pub images: Vec<String>,
    pub tags: Vec<String>,
}

/// Every fixed target with its default working directory.
///
/// `hstream` tags are chosen per run and are listed with their default.
pub fn entries() -> Result<Vec<CatalogEntry>> {
    let ld = Path::new(DEFAULT_LD_DIR);
    let hs = Path::new(DEFAULT_HS_DIR);

    let mut rows = Vec::new();
    let mut push = |command: &'static str, targets: Vec<BuildTarget>| {
        let mut images: Vec<String> = Vec::new();
        let mut tags: Vec<String> = Vec::new();
        for target in &targets {
            if !images.iter().any(|i| i == target.image()) {
                images.push(target.image().to_string());
            }
            for tag in target.tags() {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        rows.push(CatalogEntry {
            command,
            images,
            tags,
        });
    };

    push("logdevice-builder", vec![logdevice_builder(ld, LogDeviceLine::Stable, false)?]);
    push("logdevice", logdevice(ld, LogDeviceLine::Stable, false)?);
    push(
        "logdevice-builder-rqlite",
        vec![logdevice_builder(ld, LogDeviceLine::Rqlite, false)?],
    );
    push("logdevice-rqlite", logdevice(ld, LogDeviceLine::Rqlite, false)?);
    push("hsthrift", vec![hsthrift(hs, false)?]);
    push("hadmin-store", vec![hadmin_store(hs, false)?]);
    push("haskell810", vec![haskell(hs, Ghc::V8_10, LogDeviceLine::Stable, false)?]);
    push(
        "haskell810-rqlite",
        vec![haskell(hs, Ghc::V8_10, LogDeviceLine::Rqlite, false)?],
    );
    push("haskell904", vec![haskell(hs, Ghc::V9_4, LogDeviceLine::Stable, false)?]);
    push(
        "haskell904-rqlite",
        vec![haskell(hs, Ghc::V9_4, LogDeviceLine::Rqlite, false)?],
    );
    push("haskell", haskell_all(hs, false)?);
    push(
        "hstream",
        vec![hstream(
            Path::new(DEFAULT_HSTREAM_DIR),
            &HstreamParams {
                tags: vec!["latest".to_string()],
                ghc: Ghc::V9_4.short_version().to_string(),
                build_cache: "cache".to_string(),
                no_cache: false,
            },
            &HstreamVersion {
                version: "unknown".to_string(),
                commit: "unknown".to_string(),
            },
        )?],
    );

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(target: &BuildTarget) -> Vec<(&str, &str)> {
        target
            .build_args()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_logdevice_builder_lines() {
        let ld = Path::new(DEFAULT_LD_DIR);

        let stable = logdevice_builder(ld, LogDeviceLine::Stable, false).unwrap();
        assert_eq!(stable.image(), "hstreamdb/logdevice-builder");
        assert_eq!(stable.dockerfile(), Path::new("docker/Dockerfile.builder"));
        assert_eq!(stable.tags(), ["latest"]);
        assert_eq!(stable.context_dir(), ld);

        let rqlite = logdevice_builder(ld, LogDeviceLine::Rqlite, false).unwrap();
        assert_eq!(rqlite.tags(), ["rqlite"]);
        assert_eq!(LogDeviceLine::Rqlite.revision(), "main");
    }

    #[test]
    fn test_logdevice_builds_server_then_client() {
        let targets = logdevice(Path::new("/src/LogDevice"), LogDeviceLine::Stable, true).unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].image(), "hstreamdb/logdevice");
        assert_eq!(targets[0].stage(), None);
        assert_eq!(targets[1].image(), "hstreamdb/logdevice-client");
        assert_eq!(targets[1].stage(), Some("client"));
        assert!(targets.iter().all(|t| t.no_cache()));
    }

    #[test]
    fn test_haskell_tags_and_args() {
        let hs = Path::new(DEFAULT_HS_DIR);

        let h810 = haskell(hs, Ghc::V8_10, LogDeviceLine::Stable, false).unwrap();
        assert_eq!(h810.tags(), ["8.10.7", "8.10"]);
        assert_eq!(
            args(&h810),
            vec![
                ("GHC", "8.10.7"),
                ("LD_CLIENT_IMAGE", "hstreamdb/logdevice-client")
            ]
        );

        let h904 = haskell(hs, Ghc::V9_4, LogDeviceLine::Stable, false).unwrap();
        assert_eq!(h904.tags(), ["9.4.8", "9.4", "latest"]);
        assert_eq!(h904.probe_tag(), "9.4.8");

        let h904r = haskell(hs, Ghc::V9_4, LogDeviceLine::Rqlite, false).unwrap();
        assert_eq!(h904r.tags(), ["rqlite_9.4.8", "rqlite_9.4", "rqlite"]);
        assert_eq!(
            args(&h904r),
            vec![
                ("GHC", "9.4.8"),
                ("LD_CLIENT_IMAGE", "hstreamdb/logdevice-client:rqlite")
            ]
        );
    }

    #[test]
    fn test_haskell_all_order() {
        let names: Vec<String> = haskell_all(Path::new(DEFAULT_HS_DIR), false)
            .unwrap()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "haskell810",
                "haskell810-rqlite",
                "haskell904",
                "haskell904-rqlite"
            ]
        );
    }

    #[test]
    fn test_hstream_stamp() {
        let target = hstream(
            Path::new(DEFAULT_HSTREAM_DIR),
            &HstreamParams {
                tags: vec!["v0.19.0".to_string(), "latest".to_string()],
                ghc: "rqlite_9.4".to_string(),
                build_cache: "no_cache".to_string(),
                no_cache: false,
            },
            &HstreamVersion {
                version: "v0.19.0".to_string(),
                commit: "0123abc".to_string(),
            },
        )
        .unwrap();

        assert_eq!(target.image(), "hstreamdb/hstream");
        assert_eq!(target.probe_tag(), "v0.19.0");
        assert_eq!(
            args(&target),
            vec![
                ("BUILDER_IMAGE", "hstreamdb/haskell:rqlite_9.4"),
                ("HSTREAM_VERSION", "v0.19.0"),
                ("HSTREAM_VERSION_COMMIT", "0123abc"),
                ("BUILD_CACHE", "no_cache"),
            ]
        );
    }

    #[test]
    fn test_hstream_rejects_bad_tag() {
        let result = hstream(
            Path::new(DEFAULT_HSTREAM_DIR),
            &HstreamParams {
                tags: vec!["bad/tag".to_string()],
                ghc: "9.4".to_string(),
                build_cache: "cache".to_string(),
                no_cache: false,
            },
            &HstreamVersion {
                version: "v0.19.0".to_string(),
                commit: "0123abc".to_string(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_entries_cover_every_command() {
        let rows = entries().unwrap();
        assert_eq!(rows.len(), 12);

        let haskell = rows.iter().find(|r| r.command == "haskell").unwrap();
        assert_eq!(haskell.images, vec!["hstreamdb/haskell"]);
        assert_eq!(haskell.tags.len(), 10);

        let logdevice = rows.iter().find(|r| r.command == "logdevice").unwrap();
        assert_eq!(
            logdevice.images,
            vec!["hstreamdb/logdevice", "hstreamdb/logdevice-client"]
        );
    }
}
