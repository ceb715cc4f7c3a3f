//! Conversation memory: rolling summary and style profile per correspondent.
//!
//! Only records touched by the current batch are revisited, so AI cost
//! follows batch size rather than archive size.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::ai::AiContext;
use crate::archive::ConversationStore;
use crate::error::Result;
use crate::types::{ConversationRecord, Direction, StyleProfile, failure_summary};
use crate::util::{tail_chars, truncate_chars};

pub const EMPTY_HISTORY: &str = "Empty conversation history.";
const STYLE_SEPARATOR: &str = "\n---\n";

/// Join `parts` oldest first, keeping only the newest ones that fit in
/// `limit` characters. A newest part longer than `limit` keeps its tail.
fn join_newest<S: AsRef<str>>(parts: &[S], separator: &str, limit: usize) -> String {
    let sep_len = separator.chars().count();
    let mut used = 0;
    let mut start = parts.len();
    for (i, part) in parts.iter().enumerate().rev() {
        let len = part.as_ref().chars().count() + if start < parts.len() { sep_len } else { 0 };
        if used + len > limit {
            break;
        }
        used += len;
        start = i;
    }
    if start == parts.len() {
        return parts
            .last()
            .map(|p| tail_chars(p.as_ref(), limit).to_string())
            .unwrap_or_default();
    }
    parts[start..]
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<&str>>()
        .join(separator)
}

/// Chronological `[self]`/`[other]` digest of a record. When it exceeds
/// `limit` characters the oldest lines are dropped.
pub fn build_digest(record: &ConversationRecord, limit: usize) -> String {
    let lines: Vec<String> = record
        .messages
        .iter()
        .map(|m| {
            let tag = match m.direction {
                Direction::Sent => "[self]",
                Direction::Received => "[other]",
            };
            format!(
                "{} (subject: {}): {}",
                tag,
                m.subject,
                m.summary.as_deref().unwrap_or("(no summary)")
            )
        })
        .collect();
    join_newest(&lines, "\n", limit)
}

/// The owner's last `window` sent bodies, oldest first.
pub fn style_digest(record: &ConversationRecord, window: usize, body_limit: usize, limit: usize) -> String {
    let sent: Vec<&str> = record
        .messages
        .iter()
        .filter(|m| m.direction == Direction::Sent)
        .map(|m| truncate_chars(m.body.trim(), body_limit))
        .collect();
    let start = sent.len().saturating_sub(window);
    join_newest(&sent[start..], STYLE_SEPARATOR, limit)
}

type StyleDecoder = fn(&Value, &StyleProfile) -> Option<StyleProfile>;

/// Tried in order; the first that recognises the reply wins.
const STYLE_DECODERS: [StyleDecoder; 2] = [decode_nested, decode_flat];

const STYLE_FIELDS: [&str; 4] = [
    "formality",
    "tone_description",
    "greeting_template",
    "sign_off_template",
];

fn decode_nested(value: &Value, base: &StyleProfile) -> Option<StyleProfile> {
    let inner = value.get("style_profile")?.as_object()?;
    Some(fill_profile(inner, base))
}

fn decode_flat(value: &Value, base: &StyleProfile) -> Option<StyleProfile> {
    let obj = value.as_object()?;
    if !STYLE_FIELDS.iter().any(|f| obj.contains_key(*f)) {
        return None;
    }
    Some(fill_profile(obj, base))
}

fn fill_profile(obj: &Map<String, Value>, base: &StyleProfile) -> StyleProfile {
    let field = |name: &str, fallback: &String| -> String {
        obj.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback.clone())
    };
    StyleProfile {
        formality: field("formality", &base.formality),
        tone_description: field("tone_description", &base.tone_description),
        greeting_template: field("greeting_template", &base.greeting_template),
        sign_off_template: field("sign_off_template", &base.sign_off_template),
    }
}

/// Decode a style reply, nested or flat. Missing fields come from `base`;
/// an unrecognised reply yields the all-unknown default.
pub fn decode_style(value: &Value, base: &StyleProfile) -> StyleProfile {
    STYLE_DECODERS
        .iter()
        .find_map(|decode| decode(value, base))
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct HistoryReply {
    general_summary: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub summary_failures: usize,
    pub style_failures: usize,
}

pub struct Memory<'a> {
    ctx: AiContext<'a>,
}

impl<'a> Memory<'a> {
    pub fn new(ctx: AiContext<'a>) -> Self {
        Self { ctx }
    }

    /// New general summary for `record`: update when a usable summary
    /// exists, create otherwise.
    pub fn summarize(&self, record: &ConversationRecord) -> Result<String> {
        if record.messages.is_empty() {
            return Ok(EMPTY_HISTORY.to_string());
        }
        let digest = build_digest(record, self.ctx.config.digest_char_limit);
        let prompt = match record.usable_summary() {
            Some(old) => self.ctx.prompts.history_update(old, &digest),
            None => self.ctx.prompts.history_create(&digest),
        };
        let reply: HistoryReply = self.ctx.call(&prompt)?;
        Ok(reply.general_summary)
    }

    /// New style profile, or None when the owner never wrote in this
    /// conversation.
    pub fn profile(&self, record: &ConversationRecord) -> Result<Option<StyleProfile>> {
        if !record.has_sent() {
            return Ok(None);
        }
        let cfg = self.ctx.config;
        let digest = style_digest(
            record,
            cfg.style_window,
            cfg.body_char_limit,
            cfg.digest_char_limit,
        );
        let previous = record.style_profile.as_ref().filter(|p| p.is_established());
        let prompt = match previous {
            Some(old) => self.ctx.prompts.style_update(old, &digest),
            None => self.ctx.prompts.style_create(&digest),
        };
        let value = self.ctx.call_value(&prompt)?;
        let base = previous.cloned().unwrap_or_default();
        Ok(Some(decode_style(&value, &base)))
    }

    /// Recompute summary and style for one record in place. Failures leave a
    /// marker or the default profile behind, never an error.
    pub fn refresh_record(&self, address: &str, record: &mut ConversationRecord, report: &mut RefreshReport) {
        record.general_summary = match self.summarize(record) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(address, error = %e, "Conversation summary failed");
                report.summary_failures += 1;
                failure_summary(&e)
            }
        };
        match self.profile(record) {
            Ok(Some(profile)) => record.style_profile = Some(profile),
            Ok(None) => {}
            Err(e) => {
                warn!(address, error = %e, "Style profile failed, using default");
                report.style_failures += 1;
                record.style_profile = Some(StyleProfile::default());
            }
        }
        report.refreshed += 1;
    }

    /// Refresh the named records. Unknown addresses are skipped.
    pub fn refresh<'s, I>(&self, store: &mut ConversationStore, addresses: I) -> RefreshReport
    where
        I: IntoIterator<Item = &'s String>,
    {
        let mut report = RefreshReport::default();
        for address in addresses {
            match store.get_mut(address) {
                Some(record) => self.refresh_record(address, record, &mut report),
                None => warn!(address = %address, "No conversation to refresh"),
            }
        }
        info!(
            refreshed = report.refreshed,
            summary_failures = report.summary_failures,
            style_failures = report.style_failures,
            "Memory refresh done"
        );
        report
    }
}
