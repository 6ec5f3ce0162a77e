use crate::catalog;
use colored::Colorize;

pub fn handle() -> anyhow::Result<()> {
    println!("{}", "Targets:".bold());
    for entry in catalog::entries()? {
        println!("  {}", entry.command.cyan());
        for image in &entry.images {
            println!("    {}", image);
        }
        println!("    tags: {}", entry.tags.join(", ").dimmed());
    }
    Ok(())
}
