//! List command - recent posts with their authors

use anyhow::Result;
use std::path::PathBuf;

use crate::args::ListArgs;
use crate::commands::services::{build_service, posts_failure};
use crate::config::AppConfig;

pub async fn execute(args: ListArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let service = build_service(&config).await?;

    let posts = service.list_recent().await.map_err(posts_failure)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }

    if posts.is_empty() {
        println!("No posts yet.");
        return Ok(());
    }

    for entry in &posts {
        let created_at = entry
            .post
            .created_at
            .format(&time::format_description::well_known::Rfc3339)?;
        println!("{}  @{}", created_at, entry.author.username);
        println!("  {}", entry.post.content);
    }

    Ok(())
}
