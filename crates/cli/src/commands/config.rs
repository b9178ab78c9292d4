//! Config command - configuration management

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

use crate::args::{ConfigArgs, ConfigCommands};
use crate::config::AppConfig;

pub async fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => init_config(&path, force).await,
    }
}

async fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, AppConfig::example_toml())
        .await
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    tracing::info!(path = %path.display(), "Wrote example configuration");

    println!("Created config file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Choose store, identity and rate limit providers");
    println!("  2. Export the secrets named by the *_env settings");
    println!("  3. Run 'chirp doctor' to validate your setup");
    println!("  4. Run 'chirp list' to see recent posts");

    Ok(())
}
