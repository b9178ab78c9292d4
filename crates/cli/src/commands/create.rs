//! Create command - post as an authenticated actor

use anyhow::Result;
use std::path::PathBuf;

use crate::args::CreateArgs;
use crate::commands::services::{build_service, posts_failure};
use crate::config::AppConfig;

pub async fn execute(args: CreateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let service = build_service(&config).await?;

    let post = service
        .create_post(&args.actor, &args.content)
        .await
        .map_err(posts_failure)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&post)?);
    } else {
        println!("Created post {} as {}", post.id, post.author_id);
    }

    Ok(())
}
