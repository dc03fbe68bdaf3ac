//! Command line interface for archivebot using clap.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::MemoryArchive;
use crate::config::{load_settings, AUTH_ENV, DEFAULT_STORAGE_DIR};
use crate::core::CommandDispatcher;
use crate::telegram;

/// archivebot - archive feeds from a chat conversation.
#[derive(Parser, Debug, Clone)]
#[command(name = "archivebot")]
#[command(version)]
#[command(about = "Chat bot that adds, removes and reports on archived feeds", long_about = None)]
pub struct Args {
    /// Storage directory for the archive
    #[arg(short = 'd', long, default_value = DEFAULT_STORAGE_DIR)]
    pub cwd: PathBuf,

    /// PEM private key for the bot client
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// PEM certificate for the bot client
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Bot token
    #[arg(long, env = AUTH_ENV, hide_env_values = true)]
    pub auth: Option<String>,

    /// Name the bot answers to (`name: command`)
    #[arg(long)]
    pub name: Option<String>,

    /// Attempts to wait for a missing content feed during `status`
    #[arg(long)]
    pub status_retries: Option<u32>,

    /// Seconds to wait for a content feed update per attempt
    #[arg(long, value_name = "SECONDS")]
    pub update_timeout: Option<u64>,
}

impl Args {
    /// Run the bot until interrupted.
    pub async fn run(self) -> Result<()> {
        let settings = load_settings(&self)?;
        settings.validate()?;

        std::fs::create_dir_all(&settings.storage_dir)?;
        let archive = Arc::new(MemoryArchive::open(&settings.storage_dir)?);
        tracing::info!("Archive storage at {}", settings.storage_dir.display());

        // Handlers attach only after the platform handshake succeeds.
        let bot = telegram::connect(&settings).await?;

        let service = Arc::new(CommandDispatcher::from_settings(archive.clone(), &settings));
        let events = service.spawn_event_loop();
        archive.announce_changes();

        telegram::serve(bot, service).await;

        events.abort();
        tracing::info!("archivebot stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_storage_dir() {
        let args = Args::parse_from(["archivebot"]);
        assert_eq!(args.cwd, PathBuf::from("hypercore-archiver"));
        assert!(args.name.is_none());
    }

    #[test]
    fn test_flags() {
        let args = Args::parse_from([
            "archivebot",
            "-d",
            "/tmp/feeds",
            "--name",
            "archivebot",
            "--auth",
            "secret",
            "--key",
            "bot.key",
            "--cert",
            "bot.crt",
            "--update-timeout",
            "5",
        ]);
        assert_eq!(args.cwd, PathBuf::from("/tmp/feeds"));
        assert_eq!(args.name.as_deref(), Some("archivebot"));
        assert_eq!(args.auth.as_deref(), Some("secret"));
        assert_eq!(args.key, Some(PathBuf::from("bot.key")));
        assert_eq!(args.cert, Some(PathBuf::from("bot.crt")));
        assert_eq!(args.update_timeout, Some(5));
    }

    #[test]
    fn test_long_cwd() {
        let args = Args::parse_from(["archivebot", "--cwd", "store"]);
        assert_eq!(args.cwd, PathBuf::from("store"));
    }
}
