//! govbot configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::DEFAULT_HEADER_ROWS;
use crate::vote::{DEFAULT_EXTENSION_POLICY, DEFAULT_MAX_RENEWALS, DEFAULT_OBJECTION_EMOJI, ExtensionPolicy, VoteRules};

/// Main govbot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Discord connection
    pub discord: DiscordSettings,

    /// Proposal store backend
    pub sheets: SheetsSettings,

    /// Vote rules and scheduling
    pub vote: VoteSettings,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the token environment variables the configured backends
    /// need are set. Call this early in startup to fail fast.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.discord.token_env).is_err() {
            return Err(eyre::eyre!(
                "Discord bot token not found. Set the {} environment variable.",
                self.discord.token_env
            ));
        }
        if self.sheets.backend == SheetsBackend::Google {
            if self.sheets.spreadsheet_id.is_empty() {
                return Err(eyre::eyre!("sheets.spreadsheet-id is required for the google backend"));
            }
            if std::env::var(&self.sheets.token_env).is_err() {
                return Err(eyre::eyre!(
                    "Google Sheets token not found. Set the {} environment variable.",
                    self.sheets.token_env
                ));
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .govbot.yml
        let local_config = PathBuf::from(".govbot.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/govbot/govbot.yml
        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => std::iter::once(PathBuf::from(".govbot.yml"))
                .chain(user_config_path())
                .collect(),
        };
        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("govbot").join("govbot.yml"))
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Discord connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordSettings {
    /// Environment variable containing the bot token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for DiscordSettings {
    fn default() -> Self {
        Self {
            token_env: "DISCORD_TOKEN".to_string(),
            base_url: "https://discord.com/api/v10".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl DiscordSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Where proposal rows live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SheetsBackend {
    /// JSON workbook on local disk
    #[default]
    File,
    /// Google Sheets API
    Google,
}

/// Proposal store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    pub backend: SheetsBackend,

    /// Spreadsheet ID (google backend)
    #[serde(rename = "spreadsheet-id")]
    pub spreadsheet_id: String,

    /// Environment variable containing the OAuth2 access token (google backend)
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// API base URL (google backend)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Workbook path (file backend); `~/` is expanded
    #[serde(rename = "file-path")]
    pub file_path: String,

    /// Rows above the first proposal row on each sheet
    #[serde(rename = "header-rows")]
    pub header_rows: usize,

    /// Request timeout in milliseconds (google backend)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        // XDG data directory (~/.local/share/govbot on Linux)
        let file_path = dirs::data_local_dir()
            .map(|d| d.join("govbot").join("proposals.json"))
            .unwrap_or_else(|| PathBuf::from("proposals.json"))
            .to_string_lossy()
            .into_owned();

        Self {
            backend: SheetsBackend::File,
            spreadsheet_id: String::new(),
            token_env: "GOOGLE_SHEETS_TOKEN".to_string(),
            base_url: "https://sheets.googleapis.com/v4".to_string(),
            file_path,
            header_rows: DEFAULT_HEADER_ROWS,
            timeout_ms: 30_000,
        }
    }
}

impl SheetsSettings {
    pub fn expanded_file_path(&self) -> PathBuf {
        expand_home(&self.file_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Vote rules and scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteSettings {
    /// Reaction that counts as an objection
    #[serde(rename = "objection-emoji")]
    pub objection_emoji: String,

    /// Reaction the proposer presses to withdraw; unset disables cancellation
    #[serde(rename = "cancel-emoji")]
    pub cancel_emoji: Option<String>,

    /// Extensions allowed before an objected vote fails
    #[serde(rename = "max-renewals")]
    pub max_renewals: u32,

    /// How extension length shrinks with each renewal
    #[serde(rename = "extension-policy")]
    pub extension_policy: ExtensionPolicy,

    /// Seconds between recovery sweeps while the daemon runs
    #[serde(rename = "sweep-interval-secs")]
    pub sweep_interval_secs: u64,
}

impl Default for VoteSettings {
    fn default() -> Self {
        Self {
            objection_emoji: DEFAULT_OBJECTION_EMOJI.to_string(),
            cancel_emoji: Some("❌".to_string()),
            max_renewals: DEFAULT_MAX_RENEWALS,
            extension_policy: DEFAULT_EXTENSION_POLICY,
            sweep_interval_secs: 60,
        }
    }
}

impl VoteSettings {
    /// Rules handed to the vote engine
    pub fn to_rules(&self) -> VoteRules {
        VoteRules {
            max_renewals: self.max_renewals,
            policy: self.extension_policy,
            objection_emoji: self.objection_emoji.clone(),
            cancel_emoji: self.cancel_emoji.clone().filter(|e| !e.is_empty()),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
