//! git CLI wrapper used to prepare source checkouts.

use anyhow::{Context, bail};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct Git {
    program: PathBuf,
}

impl Git {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> anyhow::Result<String> {
        if !dir.is_dir() {
            bail!("Source checkout not found: {}", dir.display());
        }

        println!(
            "{}",
            format!("-> run: {} {}", self.program.display(), args.join(" ")).cyan()
        );

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run `{}`", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{} {}` failed in {}: {}",
                self.program.display(),
                args.join(" "),
                dir.display(),
                stderr.trim()
            );
        }

        Ok(first_line(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Switch the working tree at `dir` to `revision`.
    pub async fn checkout(&self, dir: &Path, revision: &str) -> anyhow::Result<()> {
        self.run(dir, &["checkout", revision]).await?;
        tracing::info!("{} is at {}", dir.display(), revision);
        Ok(())
    }

    /// Nearest tag reachable from HEAD.
    pub async fn describe_tag(&self, dir: &Path) -> anyhow::Result<String> {
        self.run(dir, &["describe", "--tags", "--abbrev=0"]).await
    }

    pub async fn head_commit(&self, dir: &Path) -> anyhow::Result<String> {
        self.run(dir, &["rev-parse", "HEAD"]).await
    }
}

fn first_line(stdout: &str) -> String {
    stdout.lines().next().unwrap_or_default().trim().to_string()
}
