//! Startup configuration.
//!
//! Loaded once from a TOML file, then overridden by environment variables:
//! - `NEWS_RELAY_BOT_TOKEN` (or `TELEGRAM_BOT_TOKEN`): transport credential
//! - `NEWS_RELAY_CHANNEL_ID`: output channel
//!
//! Nothing here is reloaded while the process runs.

use crate::rss_utils::url::is_http_url;
use crate::sources::HtmlSelectors;
use crate::types::{FetchConfig, FlushFailurePolicy, RelayError, Result, SourceSpec};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Rss,
    Html,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub adapter: Option<AdapterKind>,
    #[serde(default)]
    pub selectors: Option<HtmlSelectors>,
}

impl SourceConfig {
    pub fn spec(&self) -> SourceSpec {
        SourceSpec {
            name: self.name.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from("published.json")
}

fn default_posting_hours() -> Vec<u32> {
    vec![8, 12, 16, 20]
}

fn default_send_interval_secs() -> u64 {
    5
}

fn default_max_items_per_source() -> usize {
    5
}

fn default_timezone() -> String {
    "Europe/Kyiv".to_string()
}

fn default_hashtags() -> String {
    "#Закарпаття #новини".to_string()
}

fn default_tick_secs() -> u64 {
    1
}

fn default_answer_commands() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default, skip_serializing)]
    pub bot_token: Option<String>,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_posting_hours")]
    pub posting_hours: Vec<u32>,
    #[serde(default = "default_send_interval_secs")]
    pub send_interval_secs: u64,
    #[serde(default = "default_max_items_per_source")]
    pub max_items_per_source: usize,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_hashtags")]
    pub hashtags: String,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Answer `/start`, `/news` and the other chat commands while `run` is waiting.
    #[serde(default = "default_answer_commands")]
    pub answer_commands: bool,
    #[serde(default)]
    pub on_flush_failure: FlushFailurePolicy,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file and apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    pub fn apply_env_overrides(&mut self) {
        let token = std::env::var("NEWS_RELAY_BOT_TOKEN").or_else(|_| std::env::var("TELEGRAM_BOT_TOKEN"));
        if let Ok(token) = token {
            if !token.is_empty() {
                self.bot_token = Some(token);
            }
        }

        if let Ok(channel) = std::env::var("NEWS_RELAY_CHANNEL_ID") {
            if !channel.is_empty() {
                self.channel_id = channel;
            }
        }
    }

    /// Reject configurations the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(RelayError::Config(
                "no sources configured; add at least one [[sources]] entry".to_string(),
            ));
        }

        if self.channel_id.trim().is_empty() {
            return Err(RelayError::Config(
                "channel_id is not set. Set it in the config file or via NEWS_RELAY_CHANNEL_ID".to_string(),
            ));
        }

        if let Some(hour) = self.posting_hours.iter().find(|h| **h > 23) {
            return Err(RelayError::Config(format!("posting hour {} is out of range 0..=23", hour)));
        }

        if self.max_items_per_source == 0 {
            return Err(RelayError::Config("max_items_per_source must be at least 1".to_string()));
        }

        if self.tick_secs == 0 {
            return Err(RelayError::Config("tick_secs must be at least 1".to_string()));
        }

        self.tz()?;

        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(RelayError::Config(format!("duplicate source name '{}'", source.name)));
            }
            if !is_http_url(&source.endpoint) {
                return Err(RelayError::Config(format!(
                    "source '{}' endpoint '{}' is not an http(s) url",
                    source.name, source.endpoint
                )));
            }
            if source.adapter == Some(AdapterKind::Html) && source.selectors.is_none() {
                return Err(RelayError::Config(format!(
                    "source '{}' uses the html adapter but has no [sources.selectors]",
                    source.name
                )));
            }
        }

        Ok(())
    }

    /// The transport credential, required only by commands that publish.
    pub fn require_bot_token(&self) -> Result<&str> {
        self.bot_token.as_deref().filter(|t| !t.is_empty()).ok_or_else(|| {
            RelayError::Config("bot token is not set. Export NEWS_RELAY_BOT_TOKEN".to_string())
        })
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| RelayError::Config(format!("unknown timezone '{}'", self.timezone)))
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn source_specs(&self) -> Vec<SourceSpec> {
        self.sources.iter().map(SourceConfig::spec).collect()
    }
}
