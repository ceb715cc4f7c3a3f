//! Core data types: Message, Address, ConversationRecord, StyleProfile.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SiftError};
use crate::util::bare_address;

/// Lowest and highest trust score a sender can hold.
pub const SCORE_MIN: i64 = 1;
pub const SCORE_MAX: i64 = 10;

/// Summary placed on a new conversation until the first one is computed.
pub const PENDING_SUMMARY: &str = "New conversation, summary pending.";
/// Prefix of every summary recorded in place of a failed AI call.
pub const FAILURE_MARKER: &str = "AI processing failed";
/// Value of every style field that has not been derived yet.
pub const UNKNOWN: &str = "unknown";

pub fn failure_summary(reason: impl fmt::Display) -> String {
    format!("{}: {}", FAILURE_MARKER, reason)
}

pub fn is_failure_summary(summary: &str) -> bool {
    summary.contains(FAILURE_MARKER)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Received,
    Sent,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Received => write!(f, "received"),
            Direction::Sent => write!(f, "sent"),
        }
    }
}

/// A parsed `local@domain` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub local: String,
    pub domain: String,
}

impl Address {
    pub fn parse(raw: &str) -> Result<Self> {
        let addr = bare_address(raw)
            .ok_or_else(|| SiftError::Parse(format!("not an email address: {:?}", raw)))?;
        // bare_address guarantees exactly one usable split point
        let (local, domain) = addr
            .rsplit_once('@')
            .ok_or_else(|| SiftError::Parse(format!("not an email address: {:?}", raw)))?;
        Ok(Self {
            local: local.to_string(),
            domain: domain.to_string(),
        })
    }

    /// The conversation key for this address.
    pub fn key(&self) -> String {
        format!("{}@{}", self.local, self.domain)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

/// When a message was sent, as it was captured.
///
/// Stores may hold an RFC 3339 string, a raw header string that never parsed,
/// or epoch seconds; all three deserialize and sort without failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SentTime {
    Parsed(DateTime<FixedOffset>),
    Epoch(i64),
    Raw(String),
}

impl SentTime {
    /// Parse a Date header, keeping the raw text when it doesn't parse.
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        match parse_datetime(value) {
            Some(dt) => Some(SentTime::Parsed(dt)),
            None => Some(SentTime::Raw(value.to_string())),
        }
    }
}

fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .ok()
        .or_else(|| {
            mailparse::dateparse(value)
                .ok()
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.fixed_offset())
        })
}

/// Sortable instant for an optional timestamp. Missing or malformed values
/// sort before everything else.
pub fn sort_key(sent_time: Option<&SentTime>) -> DateTime<Utc> {
    match sent_time {
        Some(SentTime::Parsed(dt)) => dt.with_timezone(&Utc),
        Some(SentTime::Epoch(secs)) => {
            DateTime::from_timestamp(*secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
        }
        Some(SentTime::Raw(text)) => parse_datetime(text)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
        None => DateTime::<Utc>::MIN_UTC,
    }
}

/// Stable ascending sort by send time.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by_key(|m| sort_key(m.sent_time.as_ref()));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub sent_time: Option<SentTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Message {
    /// Dedup key: ids are only unique within one folder.
    pub fn key(&self) -> (Direction, String) {
        (self.direction, self.id.clone())
    }

    pub fn sender_address(&self) -> Result<Address> {
        match &self.sender {
            Some(raw) => Address::parse(raw),
            None => Err(SiftError::Parse(format!("message {} has no sender", self.id))),
        }
    }

    /// The correspondents this message is filed under: the sender of a
    /// received message, every recipient of a sent one.
    pub fn other_parties(&self) -> Result<Vec<Address>> {
        match self.direction {
            Direction::Received => Ok(vec![self.sender_address()?]),
            Direction::Sent => {
                if self.recipients.is_empty() {
                    return Err(SiftError::Parse(format!(
                        "sent message {} has no recipients",
                        self.id
                    )));
                }
                let mut parties: Vec<Address> = Vec::new();
                for raw in &self.recipients {
                    let addr = Address::parse(raw)?;
                    if !parties.contains(&addr) {
                        parties.push(addr);
                    }
                }
                Ok(parties)
            }
        }
    }
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// How the mailbox owner writes to one correspondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleProfile {
    #[serde(default = "unknown")]
    pub formality: String,
    #[serde(default = "unknown")]
    pub tone_description: String,
    #[serde(default = "unknown")]
    pub greeting_template: String,
    #[serde(default = "unknown")]
    pub sign_off_template: String,
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self {
            formality: unknown(),
            tone_description: unknown(),
            greeting_template: unknown(),
            sign_off_template: unknown(),
        }
    }
}

impl StyleProfile {
    /// A profile worth updating rather than recreating.
    pub fn is_established(&self) -> bool {
        !self.formality.trim().is_empty() && self.formality != UNKNOWN
    }
}

fn pending() -> String {
    PENDING_SUMMARY.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    #[serde(default = "pending")]
    pub general_summary: String,
    #[serde(default)]
    pub style_profile: Option<StyleProfile>,
    #[serde(default, alias = "emails")]
    pub messages: Vec<Message>,
}

impl Default for ConversationRecord {
    fn default() -> Self {
        Self {
            general_summary: pending(),
            style_profile: None,
            messages: Vec::new(),
        }
    }
}

impl ConversationRecord {
    pub fn contains(&self, direction: Direction, id: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.direction == direction && m.id == id)
    }

    pub fn has_sent(&self) -> bool {
        self.messages.iter().any(|m| m.direction == Direction::Sent)
    }

    /// The existing summary, if it can seed an update.
    pub fn usable_summary(&self) -> Option<&str> {
        let s = self.general_summary.trim();
        if s.is_empty() || s == PENDING_SUMMARY || is_failure_summary(s) {
            None
        } else {
            Some(s)
        }
    }

    pub fn needs_refresh(&self) -> bool {
        self.usable_summary().is_none()
    }
}
