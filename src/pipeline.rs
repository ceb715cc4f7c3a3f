//! One batch: fetch, classify, log, archive, refresh memory.

use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{info, warn};

use crate::ai::prompts::PromptSet;
use crate::ai::{AiContext, AiGateway};
use crate::archive::{ArchiveReport, Archiver, ConversationStore};
use crate::classify::Classifier;
use crate::config::SiftConfig;
use crate::journal::Journal;
use crate::memory::{Memory, RefreshReport};
use crate::reputation::ReputationStore;
use crate::resolve::DataPaths;
use crate::source::MailboxSource;
use crate::store;
use crate::types::{Direction, Message};
use crate::util::Pacer;

#[derive(Debug, Default)]
pub struct BatchReport {
    pub fetched: usize,
    pub valid: usize,
    pub invalid: usize,
    pub ai_scored: usize,
    pub ai_failed: usize,
    pub sent_captured: usize,
    pub archive: ArchiveReport,
    pub memory: RefreshReport,
    pub judgments: usize,
}

impl BatchReport {
    pub fn print(&self) {
        println!(
            "Fetched {} unread: {} valid, {} invalid ({} AI-scored, {} AI failures)",
            self.fetched, self.valid, self.invalid, self.ai_scored, self.ai_failed
        );
        println!("Captured {} new sent message(s)", self.sent_captured);
        println!(
            "Archived {} message(s) across {} conversation(s); {} vetted, {} rejected, {} skipped as no-reply",
            self.archive.filed,
            self.archive.touched.len(),
            self.archive.vetted,
            self.archive.rejected,
            self.archive.no_reply
        );
        if self.memory.refreshed > 0 {
            println!(
                "Refreshed {} conversation summar{} ({} summary failures, {} style failures)",
                self.memory.refreshed,
                if self.memory.refreshed == 1 { "y" } else { "ies" },
                self.memory.summary_failures,
                self.memory.style_failures
            );
        }
    }
}

/// Run one full batch against `source`.
///
/// Received messages are committed only after both logs are written. A
/// failure on any single message is recorded inline and never stops the
/// rest of the batch.
pub fn run_batch(
    source: &mut dyn MailboxSource,
    gateway: &AiGateway,
    config: &SiftConfig,
    paths: &DataPaths,
) -> Result<BatchReport> {
    let started = Instant::now();
    let prompts = PromptSet::with_overrides(&config.prompts);
    let pacer = Pacer::new(config.pipeline.rate_limit_delay());
    let ctx = AiContext {
        gateway,
        prompts: &prompts,
        config: &config.pipeline,
        pacer: &pacer,
    };
    let mut journal = Journal::new();
    let mut report = BatchReport::default();

    let received = source.fetch_unread().context("fetching unread messages")?;
    report.fetched = received.len();
    info!(count = received.len(), "Fetched unread messages");

    // Classification
    let classifier = Classifier::new(ctx);
    let mut reputation = ReputationStore::load(&paths.reputation());
    let classified = classifier.classify(received, &mut reputation, &mut journal);
    report.valid = classified.valid.len();
    report.invalid = classified.invalid.len();
    report.ai_scored = classified.ai_scored;
    report.ai_failed = classified.ai_failed;

    reputation.save(&paths.reputation())?;
    store::append_messages(&paths.valid_log(), &classified.valid)?;
    store::append_messages(&paths.invalid_log(), &classified.invalid)?;
    for msg in classified.valid.iter().chain(&classified.invalid) {
        if let Err(e) = source.commit(msg) {
            warn!(id = %msg.id, error = %e, "Could not mark message consumed");
        }
    }

    // Sent capture
    let sent = capture_sent(source, &classifier, config, paths, &mut journal);
    report.sent_captured = sent.len();

    // Archive and memory
    let conversations_path = paths.conversations();
    let mut conversations = ConversationStore::load(&conversations_path);
    report.archive = Archiver::new(ctx).fold(&mut conversations, &classified.valid, &sent, &mut journal);
    report.memory = Memory::new(ctx).refresh(&mut conversations, &report.archive.touched);
    conversations.save(&conversations_path)?;

    report.judgments = journal.len();
    if let Err(e) = journal.flush(&paths.judgments()) {
        warn!(error = %e, "Could not write judgment journal");
    }

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        valid = report.valid,
        invalid = report.invalid,
        touched = report.archive.touched.len(),
        "Batch complete"
    );
    Ok(report)
}

/// Fetch sent messages not yet logged, summarize them and append them to
/// the sent log. Fetch or log failures only cost this batch's sent capture.
fn capture_sent(
    source: &mut dyn MailboxSource,
    classifier: &Classifier,
    config: &SiftConfig,
    paths: &DataPaths,
    journal: &mut Journal,
) -> Vec<Message> {
    let known = store::logged_ids(&paths.sent_log());
    let folder = &config.mailbox.sent_folder;
    let mut sent = match source.fetch_all(folder, Direction::Sent, &known) {
        Ok(sent) => sent,
        Err(e) => {
            warn!(folder = %folder, error = %e, "Could not fetch sent folder");
            return Vec::new();
        }
    };
    sent.retain(|m| !known.contains(&m.id));
    if sent.is_empty() {
        return sent;
    }
    info!(count = sent.len(), "Captured new sent messages");
    classifier.summarize_missing(&mut sent, journal);
    if let Err(e) = store::append_messages(&paths.sent_log(), &sent) {
        warn!(error = %e, "Could not append to sent log");
    }
    sent
}

/// Rerun the summary/style pipeline for `addresses`, or, when empty, for
/// every conversation whose summary is pending or a failure marker.
pub fn refresh_conversations(
    gateway: &AiGateway,
    config: &SiftConfig,
    paths: &DataPaths,
    addresses: &[String],
) -> Result<RefreshReport> {
    let prompts = PromptSet::with_overrides(&config.prompts);
    let pacer = Pacer::new(config.pipeline.rate_limit_delay());
    let ctx = AiContext {
        gateway,
        prompts: &prompts,
        config: &config.pipeline,
        pacer: &pacer,
    };

    let path = paths.conversations();
    let mut conversations = ConversationStore::load(&path);
    let targets: Vec<String> = if addresses.is_empty() {
        conversations
            .records()
            .iter()
            .filter(|(_, record)| record.needs_refresh())
            .map(|(address, _)| address.clone())
            .collect()
    } else {
        addresses.iter().map(|a| a.trim().to_lowercase()).collect()
    };
    if targets.is_empty() {
        info!("No conversations need a refresh");
        return Ok(RefreshReport::default());
    }

    let report = Memory::new(ctx).refresh(&mut conversations, &targets);
    conversations.save(&path)?;
    Ok(report)
}
