//! Configuration loading for archivebot.
//!
//! Settings come from an optional `settings.json` in the storage directory,
//! overridden by command line flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Args;
use crate::core::status::{StatusResolver, DEFAULT_MAX_ATTEMPTS, DEFAULT_UPDATE_TIMEOUT};
use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Settings file name inside the storage directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Environment variable holding the bot token.
pub const AUTH_ENV: &str = "ARCHIVEBOT_AUTH";

pub const DEFAULT_STORAGE_DIR: &str = "hypercore-archiver";

/// Get the settings file path for a storage directory.
pub fn get_settings_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join(SETTINGS_FILE)
}

/// Load settings for the given command line.
pub fn load_settings(args: &Args) -> Result<Settings> {
    let path = get_settings_path(&args.cwd);

    let mut settings = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        tracing::debug!("Loaded settings from {}", path.display());
        settings
    } else {
        Settings::default()
    };

    settings.apply_args(args);
    Ok(settings)
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_DIR)
}

fn default_status_retries() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_update_timeout() -> u64 {
    DEFAULT_UPDATE_TIMEOUT.as_secs()
}

/// archivebot settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    /// Always `--cwd`, which is also where the settings file is read from.
    #[serde(skip, default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// PEM private key for the bot's HTTPS client identity.
    pub key: Option<PathBuf>,

    /// PEM certificate for the bot's HTTPS client identity.
    pub cert: Option<PathBuf>,

    /// Bot token.
    pub auth: Option<String>,

    /// Name the bot answers to in `name: command` messages.
    pub name: Option<String>,

    #[serde(default = "default_status_retries")]
    pub status_retries: u32,

    #[serde(default = "default_update_timeout")]
    pub update_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            key: None,
            cert: None,
            auth: None,
            name: None,
            status_retries: default_status_retries(),
            update_timeout_secs: default_update_timeout(),
        }
    }
}

impl Settings {
    /// Command line flags win over the settings file.
    pub fn apply_args(&mut self, args: &Args) {
        self.storage_dir = args.cwd.clone();
        if args.key.is_some() {
            self.key = args.key.clone();
        }
        if args.cert.is_some() {
            self.cert = args.cert.clone();
        }
        if args.auth.is_some() {
            self.auth = args.auth.clone();
        }
        if args.name.is_some() {
            self.name = args.name.clone();
        }
        if let Some(retries) = args.status_retries {
            self.status_retries = retries;
        }
        if let Some(secs) = args.update_timeout {
            self.update_timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(format!(
                "No bot token configured. Pass --auth or set {}.",
                AUTH_ENV
            )));
        }

        if self.key.is_some() != self.cert.is_some() {
            return Err(Error::Config(
                "--key and --cert must be given together".to_string(),
            ));
        }

        if self.status_retries == 0 {
            return Err(Error::Config("status_retries must be at least 1".to_string()));
        }

        if self.name.is_none() {
            tracing::warn!("No --name configured, only '!' commands will be answered");
        }
        Ok(())
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }

    pub fn status_resolver(&self) -> StatusResolver {
        StatusResolver::new(self.status_retries, self.update_timeout())
    }
}
