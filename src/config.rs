//! Configuration: parse .mailsift.toml (mailbox, ai, pipeline, watch, prompts).

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::RetryPolicy;
use crate::resolve;
use crate::util::resolve_secret;

/// Provider presets for common IMAP configurations.
pub fn provider_presets() -> HashMap<&'static str, ProviderDefaults> {
    let mut m = HashMap::new();
    m.insert(
        "gmail",
        ProviderDefaults {
            imap_host: "imap.gmail.com",
            imap_port: 993,
            imap_starttls: false,
            sent_folder: "[Gmail]/Sent Mail",
        },
    );
    m.insert(
        "protonmail-bridge",
        ProviderDefaults {
            imap_host: "127.0.0.1",
            imap_port: 1143,
            imap_starttls: true,
            sent_folder: "Sent",
        },
    );
    m
}

pub struct ProviderDefaults {
    pub imap_host: &'static str,
    pub imap_port: u16,
    pub imap_starttls: bool,
    pub sent_folder: &'static str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiftConfig {
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Per-kind prompt overrides, keyed by prompt kind (`classification`, ...).
    #[serde(default)]
    pub prompts: BTreeMap<String, PromptOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub provider: String,
    pub user: String,
    pub password: String,
    pub password_cmd: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub imap_starttls: bool,
    pub inbox_folder: String,
    pub sent_folder: String,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            provider: "imap".to_string(),
            user: String::new(),
            password: String::new(),
            password_cmd: String::new(),
            imap_host: String::new(),
            imap_port: 993,
            imap_starttls: false,
            inbox_folder: "INBOX".to_string(),
            sent_folder: "Sent".to_string(),
        }
    }
}

impl MailboxConfig {
    /// Apply provider preset defaults. Explicit values win over the preset.
    fn apply_preset(&mut self) {
        let presets = provider_presets();
        let Some(preset) = presets.get(self.provider.as_str()) else {
            return;
        };
        let defaults = MailboxConfig::default();
        if self.imap_host == defaults.imap_host {
            self.imap_host = preset.imap_host.to_string();
        }
        if self.imap_port == defaults.imap_port {
            self.imap_port = preset.imap_port;
        }
        if self.imap_starttls == defaults.imap_starttls && preset.imap_starttls {
            self.imap_starttls = preset.imap_starttls;
        }
        if self.sent_folder == defaults.sent_folder {
            self.sent_folder = preset.sent_folder.to_string();
        }
    }

    pub fn resolve_password(&self) -> Result<String> {
        resolve_secret(&self.password, &self.password_cmd, "password")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub api_key_cmd: String,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: String::new(),
            api_key_cmd: String::new(),
            timeout_secs: 60,
        }
    }
}

impl AiConfig {
    /// Inline key, then `MAILSIFT_API_KEY`, then `api_key_cmd`.
    pub fn resolve_api_key(&self) -> Result<String> {
        if self.api_key.is_empty() {
            if let Ok(env) = std::env::var("MAILSIFT_API_KEY") {
                if !env.is_empty() {
                    return Ok(env);
                }
            }
        }
        resolve_secret(&self.api_key, &self.api_key_cmd, "api key")
    }
}

/// Tunables of the classification, archive and memory pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scores at or above this are valid.
    pub valid_score_threshold: i64,
    /// Case-insensitive substrings of sender local parts never archived.
    pub no_reply_patterns: Vec<String>,
    pub retry_count: u32,
    pub retry_base_delay_ms: u64,
    /// Pause after each AI call in a batch loop.
    pub rate_limit_delay_ms: u64,
    pub digest_char_limit: usize,
    /// Body characters shown to the AI per message.
    pub body_char_limit: usize,
    /// Number of recent sent bodies used for the style digest.
    pub style_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            valid_score_threshold: 6,
            no_reply_patterns: ["noreply", "no-reply", "no_reply", "donotreply", "do-not-reply", "mailer-daemon"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            retry_count: 3,
            retry_base_delay_ms: 5000,
            rate_limit_delay_ms: 4000,
            digest_char_limit: 3000,
            body_char_limit: 1000,
            style_window: 5,
        }
    }
}

impl PipelineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_count,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// Whether a sender local part matches the no-reply denylist.
    pub fn is_no_reply(&self, local_part: &str) -> bool {
        let local = local_part.to_lowercase();
        self.no_reply_patterns
            .iter()
            .filter(|p| !p.is_empty())
            .any(|p| local.contains(&p.to_lowercase()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 {
    300
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "error", "warn", "info", "debug" or "trace".
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Replacement text for one prompt kind. Empty fields keep the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptOverride {
    pub system: String,
    pub task: String,
    pub response_format: String,
}

/// Parse config text, applying provider presets.
pub fn parse_config(content: &str) -> Result<SiftConfig> {
    let mut config: SiftConfig = toml::from_str(content)?;
    config.mailbox.apply_preset();
    Ok(config)
}

/// Load .mailsift.toml from a given path or the resolved location.
pub fn load_config(path: Option<&Path>) -> Result<SiftConfig> {
    let path = path
        .map(PathBuf::from)
        .unwrap_or_else(resolve::config_file);
    if !path.exists() {
        bail!(
            ".mailsift.toml not found at {}.\nRun 'mailsift init' to create it.",
            path.display()
        );
    }
    let content = std::fs::read_to_string(&path)?;
    parse_config(&content)
}

/// Load config if present, else built-in defaults.
pub fn load_config_or_default(path: Option<&Path>) -> Result<SiftConfig> {
    let path = path
        .map(PathBuf::from)
        .unwrap_or_else(resolve::config_file);
    if !path.exists() {
        return Ok(SiftConfig::default());
    }
    load_config(Some(&path))
}
