//! Inbound triage: reputation fast path, AI escalation for unknown senders.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{info, warn};

use crate::ai::AiContext;
use crate::error::Result;
use crate::journal::{Journal, Judgment, JudgmentKind};
use crate::reputation::{ReputationStore, clamp_score};
use crate::types::{Message, SCORE_MAX, failure_summary};

/// Score stamped when the AI cannot score a message. Maximal, so a failure
/// never discards mail.
pub const FAILURE_SCORE: i64 = SCORE_MAX;

/// Boundary-inclusive validity test.
pub fn is_valid(score: i64, threshold: i64) -> bool {
    score >= threshold
}

#[derive(Debug, Default)]
pub struct Partition {
    pub valid: Vec<Message>,
    pub invalid: Vec<Message>,
    pub uncertain: Vec<Message>,
}

/// Split received messages by what the reputation store already knows.
/// Unparseable senders and unknown senders are uncertain.
pub fn partition(messages: Vec<Message>, reputation: &ReputationStore, threshold: i64) -> Partition {
    let mut out = Partition::default();
    for mut msg in messages {
        let known = msg
            .sender_address()
            .ok()
            .and_then(|addr| reputation.lookup(&addr.domain, &addr.local));
        match known {
            None => out.uncertain.push(msg),
            Some(score) => {
                msg.score = Some(score);
                if is_valid(score, threshold) {
                    out.valid.push(msg);
                } else {
                    out.invalid.push(msg);
                }
            }
        }
    }
    out
}

fn lenient_score<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let value = Value::deserialize(d)?;
    let parsed = match &value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        _ => None,
    };
    parsed.ok_or_else(|| serde::de::Error::custom(format!("score is not a number: {}", value)))
}

#[derive(Debug, Deserialize)]
struct ScoreReply {
    #[serde(deserialize_with = "lenient_score")]
    score: i64,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryReply {
    summary: String,
}

#[derive(Debug, Default)]
pub struct Classified {
    pub valid: Vec<Message>,
    pub invalid: Vec<Message>,
    /// Messages the AI scored.
    pub ai_scored: usize,
    /// Messages stamped with the failure default.
    pub ai_failed: usize,
}

pub struct Classifier<'a> {
    ctx: AiContext<'a>,
}

impl<'a> Classifier<'a> {
    pub fn new(ctx: AiContext<'a>) -> Self {
        Self { ctx }
    }

    /// Ask the AI for `{score, summary}`.
    pub fn score(&self, msg: &Message) -> Result<(i64, String)> {
        let cfg = self.ctx.config;
        let prompt = self
            .ctx
            .prompts
            .classification(&msg.subject, &msg.body, cfg.body_char_limit);
        let reply: ScoreReply = self.ctx.call(&prompt)?;
        let summary = reply
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "No summary provided.".to_string());
        Ok((clamp_score(reply.score), summary))
    }

    /// Ask the AI for `{summary}`.
    pub fn summarize(&self, msg: &Message) -> Result<String> {
        let cfg = self.ctx.config;
        let prompt = self.ctx.prompts.summary(&msg.subject, &msg.body, cfg.body_char_limit);
        let reply: SummaryReply = self.ctx.call(&prompt)?;
        Ok(reply.summary)
    }

    /// Partition a received batch, escalate uncertain messages, and fold every
    /// AI-observed score into `reputation`. Valid messages leave with a summary.
    pub fn classify(
        &self,
        received: Vec<Message>,
        reputation: &mut ReputationStore,
        journal: &mut Journal,
    ) -> Classified {
        let threshold = self.ctx.config.valid_score_threshold;
        let Partition {
            mut valid,
            mut invalid,
            uncertain,
        } = partition(received, reputation, threshold);
        info!(
            valid = valid.len(),
            invalid = invalid.len(),
            uncertain = uncertain.len(),
            "Reputation pass done"
        );

        let mut out = Classified::default();
        for mut msg in uncertain {
            let mut judgment = match self.score(&msg) {
                Ok((score, summary)) => {
                    msg.score = Some(score);
                    msg.summary = Some(summary);
                    match msg.sender_address() {
                        Ok(addr) => {
                            let stored = reputation.record(&addr.domain, &addr.local, score);
                            info!(address = %addr, score, stored, "AI scored sender");
                        }
                        Err(e) => warn!(id = %msg.id, error = %e, "Scored message has no usable sender"),
                    }
                    out.ai_scored += 1;
                    Judgment::for_message(JudgmentKind::Classification, &msg)
                }
                Err(e) => {
                    warn!(id = %msg.id, error = %e, "Classification failed, keeping message");
                    msg.score = Some(FAILURE_SCORE);
                    msg.summary = Some(failure_summary(&e));
                    out.ai_failed += 1;
                    let mut j = Judgment::for_message(JudgmentKind::Classification, &msg);
                    j.error = Some(e.to_string());
                    j
                }
            };
            judgment.score = msg.score;
            journal.push(judgment);

            if is_valid(msg.score.unwrap_or(FAILURE_SCORE), threshold) {
                valid.push(msg);
            } else {
                invalid.push(msg);
            }
        }

        self.summarize_missing(&mut valid, journal);
        out.valid = valid;
        out.invalid = invalid;
        out
    }

    /// Summarize every message lacking a summary. Failures stamp a failure
    /// marker. Returns the number of AI calls made.
    pub fn summarize_missing(&self, messages: &mut [Message], journal: &mut Journal) -> usize {
        let mut calls = 0;
        for msg in messages.iter_mut().filter(|m| m.summary.is_none()) {
            calls += 1;
            let mut judgment = match self.summarize(msg) {
                Ok(summary) => {
                    msg.summary = Some(summary);
                    Judgment::for_message(JudgmentKind::Summary, msg)
                }
                Err(e) => {
                    warn!(id = %msg.id, error = %e, "Summary failed");
                    msg.summary = Some(failure_summary(&e));
                    let mut j = Judgment::for_message(JudgmentKind::Summary, msg);
                    j.error = Some(e.to_string());
                    j
                }
            };
            judgment.score = msg.score;
            journal.push(judgment);
        }
        calls
    }
}
