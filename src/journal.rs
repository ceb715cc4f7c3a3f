//! Audit log of every AI judgment made during a batch.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::store;
use crate::types::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgmentKind {
    Classification,
    Summary,
    ConversationCheck,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub kind: JudgmentKind,
    pub judged_at: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_conversation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Judgment {
    pub fn for_message(kind: JudgmentKind, msg: &Message) -> Self {
        let address = match msg.direction {
            crate::types::Direction::Received => msg.sender.clone(),
            crate::types::Direction::Sent => msg.recipients.first().cloned(),
        };
        Self {
            kind,
            judged_at: Utc::now().to_rfc3339(),
            message_id: msg.id.clone(),
            address,
            score: msg.score,
            summary: msg.summary.clone(),
            is_conversation: None,
            reason: None,
            error: None,
        }
    }
}

/// Judgments collected during one batch, flushed once at the end.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<Judgment>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, judgment: Judgment) {
        self.entries.push(judgment);
    }

    pub fn entries(&self) -> &[Judgment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append collected judgments to the journal file and clear them.
    /// On a failed write the judgments stay buffered.
    pub fn flush(&mut self, path: &Path) -> Result<usize> {
        if self.entries.is_empty() {
            return Ok(0);
        }
        let mut all: Vec<Judgment> = store::load_or_default(path);
        all.extend(self.entries.iter().cloned());
        store::save(path, &all)?;
        let n = self.entries.len();
        self.entries.clear();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    #[test]
    fn test_flush_appends_and_clears() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("judgments.json");
        let msg = Message {
            id: "7".to_string(),
            direction: Direction::Received,
            sender: Some("a@b.com".to_string()),
            recipients: vec![],
            cc: vec![],
            subject: "s".to_string(),
            body: String::new(),
            sent_time: None,
            score: Some(4),
            summary: None,
        };
        let mut journal = Journal::new();
        journal.push(Judgment::for_message(JudgmentKind::Classification, &msg));
        assert_eq!(journal.flush(&path).unwrap(), 1);
        assert!(journal.is_empty());
        journal.push(Judgment::for_message(JudgmentKind::Summary, &msg));
        journal.flush(&path).unwrap();

        let all: Vec<Judgment> = store::load_or_default(&path);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, JudgmentKind::Classification);
        assert_eq!(all[0].score, Some(4));
        assert_eq!(all[1].address.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_failed_flush_keeps_entries() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a dir").unwrap();
        let msg = Message {
            id: "9".to_string(),
            direction: Direction::Received,
            sender: None,
            recipients: vec![],
            cc: vec![],
            subject: "s".to_string(),
            body: String::new(),
            sent_time: None,
            score: None,
            summary: None,
        };
        let mut journal = Journal::new();
        journal.push(Judgment::for_message(JudgmentKind::Classification, &msg));

        assert!(journal.flush(&blocker.join("judgments.json")).is_err());
        assert_eq!(journal.len(), 1);

        let good = tmp.path().join("judgments.json");
        assert_eq!(journal.flush(&good).unwrap(), 1);
        assert!(journal.is_empty());
    }
}
