use crate::settings::Settings;
use colored::Colorize;
use imgfleet_build::{Buildx, ManifestInspector, ManifestSnapshot, split_image_tag};

/// Print the manifest entries `reference` currently points at.
pub async fn handle(settings: &Settings, reference: &str) -> anyhow::Result<()> {
    let (image, tag) = split_image_tag(reference);
    let buildx = Buildx::new(&settings.docker);

    let snapshot = ManifestInspector::new(&buildx).inspect(&image, &tag).await?;

    println!("{}:{}", image.cyan(), tag.cyan());
    match snapshot {
        ManifestSnapshot::Absent => {
            println!("  {}", "(not published)".yellow());
        }
        ManifestSnapshot::Present(entries) => {
            for entry in entries {
                let marker = if settings.supported.contains(&entry.platform) {
                    "=".blue()
                } else {
                    "-".yellow()
                };
                println!("  {} {} ({})", marker, entry.digest, entry.platform);
            }
        }
    }
    Ok(())
}
