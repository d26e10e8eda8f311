//! Client Configuration
//!
//! Two kinds of settings live here:
//! - [`ClientConfig`]: local configuration of this client (endpoints,
//!   timeouts, apply mode), persisted as `config.json`.
//! - [`RemoteSettings`]: the payload served by `GET /api/settings` at start.
//!
//! Storage location: {config_dir}/gamramstone/config.json

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use super::{CoreError, CoreResult};

/// Config schema version for migration support
pub const CONFIG_VERSION: u32 = 1;

/// Config file name
pub const CONFIG_FILE: &str = "config.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const CONFIG_LOCK_FILE: &str = "config.json.lock";

/// Delay standing in for the content push in simulated mode
pub const DEFAULT_SIMULATED_DELAY_MS: u64 = 2000;

const DEFAULT_API_BASE_URL: &str = "https://gamramstone.wesub.io";
const DEFAULT_YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const DEFAULT_YOUTUBE_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/youtube/v3";

// =============================================================================
// Apply Mode
// =============================================================================

/// How the content push of an apply is performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum ApplyMode {
    /// Push metadata and captions to the platform
    #[default]
    Live,
    /// Replace the push with a fixed delay; only reachable when set explicitly
    #[serde(rename_all = "camelCase")]
    Simulated {
        #[serde(default = "default_simulated_delay_ms")]
        delay_ms: u64,
    },
}

fn default_simulated_delay_ms() -> u64 {
    DEFAULT_SIMULATED_DELAY_MS
}

impl ApplyMode {
    pub fn simulated() -> Self {
        Self::Simulated {
            delay_ms: DEFAULT_SIMULATED_DELAY_MS,
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated { .. })
    }
}

// =============================================================================
// Client Config
// =============================================================================

/// Local client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Backend serving lists, stats, settings and status updates
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// YouTube Data API base
    #[serde(default = "default_youtube_api_base_url")]
    pub youtube_api_base_url: String,

    /// YouTube upload endpoint base
    #[serde(default = "default_youtube_upload_base_url")]
    pub youtube_upload_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Source language assigned to videos that declare none
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Apply mode; `live` unless explicitly configured otherwise
    #[serde(default)]
    pub apply_mode: ApplyMode,

    /// Default log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_youtube_api_base_url() -> String {
    DEFAULT_YOUTUBE_API_BASE_URL.to_string()
}

fn default_youtube_upload_base_url() -> String {
    DEFAULT_YOUTUBE_UPLOAD_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_language() -> String {
    "ko".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api_base_url: default_api_base_url(),
            youtube_api_base_url: default_youtube_api_base_url(),
            youtube_upload_base_url: default_youtube_upload_base_url(),
            request_timeout_secs: default_timeout_secs(),
            default_language: default_language(),
            apply_mode: ApplyMode::Live,
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Corrects bad values instead of failing, so a damaged file still loads.
    pub fn normalize(&mut self) {
        self.version = CONFIG_VERSION;

        self.api_base_url = normalize_base_url(&self.api_base_url, default_api_base_url());
        self.youtube_api_base_url =
            normalize_base_url(&self.youtube_api_base_url, default_youtube_api_base_url());
        self.youtube_upload_base_url = normalize_base_url(
            &self.youtube_upload_base_url,
            default_youtube_upload_base_url(),
        );

        self.request_timeout_secs = self.request_timeout_secs.clamp(5, 600);

        let language = self.default_language.trim().to_ascii_lowercase();
        self.default_language = if language.is_empty() {
            default_language()
        } else {
            language
        };

        if self.log_level.trim().is_empty() {
            self.log_level = default_log_level();
        }
    }

    /// Overlays endpoint and log settings from the environment.
    ///
    /// The apply mode is deliberately not read from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("GAMRAMSTONE_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(url) = lookup("GAMRAMSTONE_YOUTUBE_API_BASE_URL") {
            self.youtube_api_base_url = url;
        }
        if let Some(level) = lookup("GAMRAMSTONE_LOG_LEVEL") {
            self.log_level = level;
        }
        self.normalize();
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn normalize_base_url(value: &str, fallback: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        fallback
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Settings served by the backend at process start
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    /// Hides the automatic apply action from everyone but admins
    #[serde(default)]
    pub hide_apply_button: bool,

    /// Keys this client does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// Config Manager
// =============================================================================

/// Loads and saves [`ClientConfig`] on disk
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a manager storing `config.json` in `config_dir`
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_path: config_dir.join(CONFIG_FILE),
        }
    }

    /// Manager for an explicit config file path
    pub fn at_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Manager for the platform config directory
    pub fn platform_default() -> CoreResult<Self> {
        let base = dirs::config_dir().ok_or_else(|| {
            CoreError::ConfigError("No configuration directory on this platform".to_string())
        })?;
        Ok(Self::new(base.join("gamramstone")))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn lock_path(&self) -> PathBuf {
        self.config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONFIG_LOCK_FILE)
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock config lock file: {}", e);
        }

        result
    }

    /// Load config from disk, returning defaults if it is missing or unreadable
    pub fn load(&self) -> ClientConfig {
        let result = self.with_lock(false, || {
            if !self.config_path.exists() {
                info!("Config file not found, using defaults");
                return Ok(ClientConfig::default());
            }

            let content = fs::read_to_string(&self.config_path)?;
            let mut config = serde_json::from_str::<ClientConfig>(&content)?;

            if config.version < CONFIG_VERSION {
                info!(
                    "Migrating config from version {} to {}",
                    config.version, CONFIG_VERSION
                );
            }

            config.normalize();
            Ok(config)
        });

        match result {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config, using defaults: {}", e);
                ClientConfig::default()
            }
        }
    }

    /// Save config using an atomic write (temp file + rename)
    pub fn save(&self, config: &ClientConfig) -> CoreResult<ClientConfig> {
        self.with_lock(true, || {
            let mut normalized = config.clone();
            normalized.normalize();

            let content = serde_json::to_vec_pretty(&normalized)?;
            write_atomically(&self.config_path, &content)?;

            info!("Config saved to {:?}", self.config_path);
            Ok(normalized)
        })
    }

    /// Delete the config file and return defaults
    pub fn reset(&self) -> CoreResult<ClientConfig> {
        self.with_lock(true, || {
            if self.config_path.exists() {
                fs::remove_file(&self.config_path)?;
                info!("Config file deleted");
            }
            Ok(ClientConfig::default())
        })
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    if cfg!(windows) && path.exists() {
        // Windows: rename does not overwrite, so swap through a backup.
        let backup_path = path.with_extension("json.bak");
        if backup_path.exists() {
            let _ = fs::remove_file(&backup_path);
        }
        fs::rename(path, &backup_path)?;
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::rename(&backup_path, path);
            let _ = fs::remove_file(&temp_path);
            return Err(CoreError::IoError(e));
        }
        let _ = fs::remove_file(&backup_path);
        return Ok(());
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}
