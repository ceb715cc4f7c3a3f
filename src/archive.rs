//! Conversation archive: per-correspondent, append-only message memory.
//!
//! Messages are filed under every other party (fan-out). Correspondents
//! already known go straight in; unknown senders are first vetted by the AI
//! as real conversations.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::ai::AiContext;
use crate::error::Result;
use crate::journal::{Journal, Judgment, JudgmentKind};
use crate::store;
use crate::types::{Address, ConversationRecord, Direction, Message, sort_messages};

/// On-disk form of one record. Older stores kept a bare message list.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Legacy(Vec<Message>),
    Record(ConversationRecord),
}

impl From<StoredRecord> for ConversationRecord {
    fn from(stored: StoredRecord) -> Self {
        match stored {
            StoredRecord::Record(record) => record,
            StoredRecord::Legacy(mut messages) => {
                sort_messages(&mut messages);
                ConversationRecord {
                    messages,
                    ..Default::default()
                }
            }
        }
    }
}

/// All conversation records, keyed by correspondent address.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConversationStore {
    records: BTreeMap<String, ConversationRecord>,
}

impl ConversationStore {
    pub fn load(path: &Path) -> Self {
        let raw: BTreeMap<String, StoredRecord> = store::load_or_default(path);
        Self {
            records: raw.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        store::save(path, self)
    }

    pub fn get(&self, address: &str) -> Option<&ConversationRecord> {
        self.records.get(address)
    }

    pub fn get_mut(&mut self, address: &str) -> Option<&mut ConversationRecord> {
        self.records.get_mut(address)
    }

    pub fn records(&self) -> &BTreeMap<String, ConversationRecord> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(direction, id)` of every filed message.
    pub fn existing_ids(&self) -> HashSet<(Direction, String)> {
        self.records
            .values()
            .flat_map(|r| r.messages.iter().map(Message::key))
            .collect()
    }

    pub fn known_addresses(&self) -> HashSet<String> {
        self.records.keys().cloned().collect()
    }

    /// File a copy of `msg` under `address`, creating the record if needed.
    /// Returns false when the record already holds this message.
    pub fn file(&mut self, address: &str, msg: &Message) -> bool {
        let record = self.records.entry(address.to_string()).or_default();
        if record.contains(msg.direction, &msg.id) {
            return false;
        }
        record.messages.push(msg.clone());
        true
    }

    pub fn sort_record(&mut self, address: &str) {
        if let Some(record) = self.records.get_mut(address) {
            sort_messages(&mut record.messages);
        }
    }
}

fn yes() -> bool {
    true
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    let value = Value::deserialize(d)?;
    match &value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => Ok(s.trim().eq_ignore_ascii_case("true")),
        Value::Null => Ok(true),
        _ => Err(serde::de::Error::custom(format!(
            "is_conversation is not a boolean: {}",
            value
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct ConversationReply {
    #[serde(default = "yes", deserialize_with = "lenient_bool")]
    is_conversation: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Correspondents that received at least one new message.
    pub touched: BTreeSet<String>,
    /// Messages filed under at least one correspondent.
    pub filed: usize,
    /// Already archived before this run.
    pub duplicates: usize,
    /// Dropped for a missing or unparseable address.
    pub dropped: usize,
    /// Dropped by the no-reply denylist.
    pub no_reply: usize,
    /// Sent to AI vetting.
    pub vetted: usize,
    /// Judged not to be a conversation.
    pub rejected: usize,
}

/// A message ready for filing together with the correspondents it goes to.
struct Formatted<'m> {
    msg: &'m Message,
    parties: Vec<Address>,
}

pub struct Archiver<'a> {
    ctx: AiContext<'a>,
}

impl<'a> Archiver<'a> {
    pub fn new(ctx: AiContext<'a>) -> Self {
        Self { ctx }
    }

    /// Ask whether `msg` is part of a real back-and-forth conversation.
    pub fn is_conversation(&self, msg: &Message) -> Result<(bool, String)> {
        let cfg = self.ctx.config;
        let prompt = self
            .ctx
            .prompts
            .conversation(&msg.subject, &msg.body, cfg.body_char_limit);
        let reply: ConversationReply = self.ctx.call(&prompt)?;
        Ok((
            reply.is_conversation,
            reply.reason.unwrap_or_else(|| "no reason given".to_string()),
        ))
    }

    /// False if the message is already archived or appeared earlier in
    /// this batch.
    fn first_sighting(
        existing: &HashSet<(Direction, String)>,
        seen: &mut HashSet<(Direction, String)>,
        msg: &Message,
    ) -> bool {
        let key = msg.key();
        !existing.contains(&key) && seen.insert(key)
    }

    /// Fold valid received and sent messages into `conversations`.
    ///
    /// Sent messages are formatted first and make their recipients known
    /// before received messages are routed, so a reply from an address the
    /// owner wrote to in this same batch takes the fast path.
    pub fn fold(
        &self,
        conversations: &mut ConversationStore,
        received: &[Message],
        sent: &[Message],
        journal: &mut Journal,
    ) -> ArchiveReport {
        let mut report = ArchiveReport::default();
        let mut existing = conversations.existing_ids();
        let mut known = conversations.known_addresses();
        let mut seen: HashSet<(Direction, String)> = HashSet::new();

        let mut fast: Vec<Formatted> = Vec::new();
        for msg in sent {
            if !Self::first_sighting(&existing, &mut seen, msg) {
                report.duplicates += 1;
                continue;
            }
            match msg.other_parties() {
                Ok(parties) => {
                    known.extend(parties.iter().map(Address::key));
                    fast.push(Formatted { msg, parties });
                }
                Err(e) => {
                    warn!(id = %msg.id, error = %e, "Dropping sent message");
                    report.dropped += 1;
                }
            }
        }

        let mut slow: Vec<Formatted> = Vec::new();
        for msg in received {
            if !Self::first_sighting(&existing, &mut seen, msg) {
                report.duplicates += 1;
                continue;
            }
            let sender = match msg.sender_address() {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(id = %msg.id, error = %e, "Dropping received message");
                    report.dropped += 1;
                    continue;
                }
            };
            if self.ctx.config.is_no_reply(&sender.local) {
                debug!(address = %sender, "Skipping no-reply sender");
                report.no_reply += 1;
                continue;
            }
            let entry = Formatted {
                msg,
                parties: vec![sender.clone()],
            };
            if known.contains(&sender.key()) {
                fast.push(entry);
            } else {
                slow.push(entry);
            }
        }

        for entry in slow {
            report.vetted += 1;
            let mut judgment = Judgment::for_message(JudgmentKind::ConversationCheck, entry.msg);
            let keep = match self.is_conversation(entry.msg) {
                Ok((keep, reason)) => {
                    info!(id = %entry.msg.id, keep, reason = %reason, "Conversation check");
                    judgment.reason = Some(reason);
                    keep
                }
                Err(e) => {
                    warn!(id = %entry.msg.id, error = %e, "Conversation check failed, keeping message");
                    judgment.reason = Some("conversation check failed".to_string());
                    judgment.error = Some(e.to_string());
                    true
                }
            };
            judgment.is_conversation = Some(keep);
            journal.push(judgment);
            if keep {
                fast.push(entry);
            } else {
                report.rejected += 1;
            }
        }

        for entry in &fast {
            if !existing.insert(entry.msg.key()) {
                report.duplicates += 1;
                continue;
            }
            let mut filed_any = false;
            for party in &entry.parties {
                let key = party.key();
                if conversations.file(&key, entry.msg) {
                    report.touched.insert(key);
                    filed_any = true;
                }
            }
            if filed_any {
                report.filed += 1;
            }
        }

        for address in &report.touched {
            conversations.sort_record(address);
        }

        info!(
            filed = report.filed,
            touched = report.touched.len(),
            duplicates = report.duplicates,
            rejected = report.rejected,
            "Archive pass done"
        );
        report
    }
}
