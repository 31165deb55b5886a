//! SkillSwap configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main SkillSwap configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pairing search behavior
    pub matching: MatchingConfig,

    /// Automated reply scheduling
    pub assistant: AssistantConfig,

    /// Store actor channel sizes
    pub store: StoreConfig,

    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: skillswap.yml
        let local_config = PathBuf::from("skillswap.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/skillswap/skillswap.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("skillswap").join("skillswap.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from the config file, read before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Pairing search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Candidates tried per search before falling back to waiting
    #[serde(rename = "claim-attempts")]
    pub claim_attempts: usize,

    /// Withdraw a Pending request after this long without a match
    #[serde(rename = "search-timeout-ms")]
    pub search_timeout_ms: Option<u64>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            claim_attempts: 3,
            search_timeout_ms: None,
        }
    }
}

impl MatchingConfig {
    pub fn search_timeout(&self) -> Option<Duration> {
        self.search_timeout_ms.map(Duration::from_millis)
    }
}

/// What to do with a Human message that arrives while a reply is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyPolicy {
    /// Cancel the pending reply and reschedule for the newest message
    #[default]
    Debounce,
    /// Keep the pending reply, schedule nothing for the new message
    DropWhileBusy,
}

impl std::fmt::Display for ReplyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debounce => write!(f, "debounce"),
            Self::DropWhileBusy => write!(f, "drop-while-busy"),
        }
    }
}

/// Automated reply configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Delay before the assistant replies
    #[serde(rename = "reply-delay-ms")]
    pub reply_delay_ms: u64,

    #[serde(rename = "reply-policy")]
    pub reply_policy: ReplyPolicy,

    /// Seed for the scripted tutor; random when unset
    pub seed: Option<u64>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            reply_delay_ms: 1500,
            reply_policy: ReplyPolicy::Debounce,
            seed: None,
        }
    }
}

impl AssistantConfig {
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }
}

/// Store actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Command queue capacity
    #[serde(rename = "channel-buffer")]
    pub channel_buffer: usize,

    /// Change broadcast capacity; slower subscribers resync
    #[serde(rename = "event-buffer")]
    pub event_buffer: usize,

    /// Result sets buffered per subscription
    #[serde(rename = "subscription-buffer")]
    pub subscription_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 256,
            event_buffer: 1024,
            subscription_buffer: 64,
        }
    }
}
