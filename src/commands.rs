//! Command entry points behind the CLI.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::ai::AiGateway;
use crate::ai::gemini::GeminiBackend;
use crate::archive::ConversationStore;
use crate::config::{self, SiftConfig};
use crate::pipeline::{self, BatchReport};
use crate::reputation::ReputationStore;
use crate::resolve::{self, DataPaths};
use crate::source::ImapSource;
use crate::types::{Address, Direction};
use crate::util::truncate_chars;

/// Config plus store locations for one data directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub config: SiftConfig,
    pub paths: DataPaths,
}

impl Workspace {
    /// Open `data_dir`, or the resolved data directory. The config file
    /// must exist when `require_config` is set.
    pub fn open(data_dir: Option<&Path>, require_config: bool) -> Result<Self> {
        let root = data_dir
            .map(PathBuf::from)
            .unwrap_or_else(resolve::data_dir);
        let config_path = resolve::config_file_in(&root);
        let config = if require_config {
            config::load_config(Some(&config_path))?
        } else {
            config::load_config_or_default(Some(&config_path))?
        };
        debug!(data_dir = %root.display(), "Opened workspace");
        Ok(Self {
            config,
            paths: DataPaths::new(root),
        })
    }

    pub fn gateway(&self) -> Result<AiGateway> {
        let backend = GeminiBackend::from_config(&self.config.ai)?;
        Ok(AiGateway::new(backend, self.config.pipeline.retry_policy()))
    }

    /// Connect to the mailbox and run one batch.
    pub fn run_batch(&self) -> Result<BatchReport> {
        let gateway = self.gateway()?;
        let mut source = ImapSource::connect(&self.config.mailbox)?;
        std::fs::create_dir_all(&self.paths.root)
            .with_context(|| format!("cannot create {}", self.paths.root.display()))?;
        pipeline::run_batch(&mut source, &gateway, &self.config, &self.paths)
    }
}

/// mailsift run
pub fn run(data_dir: Option<&Path>) -> Result<()> {
    let ws = Workspace::open(data_dir, true)?;
    let report = ws.run_batch()?;
    report.print();
    Ok(())
}

/// mailsift refresh [ADDRESS...]
pub fn refresh(data_dir: Option<&Path>, addresses: &[String]) -> Result<()> {
    let ws = Workspace::open(data_dir, true)?;
    let gateway = ws.gateway()?;
    let report = pipeline::refresh_conversations(&gateway, &ws.config, &ws.paths, addresses)?;
    println!(
        "Refreshed {} conversation(s) ({} summary failures, {} style failures)",
        report.refreshed, report.summary_failures, report.style_failures
    );
    Ok(())
}

/// mailsift reputation ADDRESS
pub fn reputation(data_dir: Option<&Path>, address: &str) -> Result<()> {
    let ws = Workspace::open(data_dir, false)?;
    let addr = Address::parse(address)?;
    let store = ReputationStore::load(&ws.paths.reputation());
    match store.lookup(&addr.domain, &addr.local) {
        Some(score) => {
            let verdict = if score >= ws.config.pipeline.valid_score_threshold {
                "valid"
            } else {
                "invalid"
            };
            println!("{}: {} ({})", addr, score, verdict);
        }
        None => println!("{}: no reputation yet", addr),
    }
    Ok(())
}

/// mailsift show ADDRESS
pub fn show(data_dir: Option<&Path>, address: &str, limit: usize) -> Result<()> {
    let ws = Workspace::open(data_dir, false)?;
    let addr = Address::parse(address)?;
    let store = ConversationStore::load(&ws.paths.conversations());
    let Some(record) = store.get(&addr.key()) else {
        bail!("No conversation with {}", addr);
    };

    println!("Conversation with {}", addr);
    println!("  Messages: {}", record.messages.len());
    println!("  Summary:  {}", record.general_summary);
    match &record.style_profile {
        Some(style) => {
            println!("  Style:");
            println!("    formality: {}", style.formality);
            println!("    tone:      {}", style.tone_description);
            println!("    greeting:  {}", style.greeting_template);
            println!("    sign-off:  {}", style.sign_off_template);
        }
        None => println!("  Style:    (no sent messages yet)"),
    }

    let start = record.messages.len().saturating_sub(limit);
    if start < record.messages.len() {
        println!();
    }
    for msg in &record.messages[start..] {
        let arrow = match msg.direction {
            Direction::Sent => "->",
            Direction::Received => "<-",
        };
        let summary = msg.summary.as_deref().unwrap_or("");
        println!("  {} {} | {}", arrow, msg.subject, truncate_chars(summary, 100));
    }
    Ok(())
}
