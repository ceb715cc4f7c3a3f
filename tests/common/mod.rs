//! Shared test fixtures and helpers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use mailsift::ai::prompts::PromptSet;
use mailsift::ai::{AiContext, AiGateway, Generate, RetryPolicy};
use mailsift::config::{PipelineConfig, SiftConfig};
use mailsift::resolve::DataPaths;
use mailsift::source::MailboxSource;
use mailsift::types::{Direction, Message, SentTime};
use mailsift::util::Pacer;

/// Create a temporary data directory.
pub fn temp_data_dir() -> (TempDir, DataPaths) {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let paths = DataPaths::new(tmp.path());
    (tmp, paths)
}

/// Create a minimal .mailsift.toml for testing.
pub fn write_config_toml(dir: &Path, user: &str) {
    let content = format!(
        r#"[mailbox]
provider = "gmail"
user = "{user}"
password = "testpassword"

[ai]
api_key = "test-key"

[pipeline]
retry_base_delay_ms = 0
rate_limit_delay_ms = 0
"#,
        user = user,
    );
    std::fs::write(dir.join(".mailsift.toml"), content).unwrap();
}

/// Defaults with every delay removed.
pub fn test_config() -> SiftConfig {
    let mut config = SiftConfig::default();
    config.pipeline.retry_base_delay_ms = 0;
    config.pipeline.rate_limit_delay_ms = 0;
    config
}

/// Run `f` with an AI context over `gateway` and `pipeline`.
pub fn with_ctx<R>(gateway: &AiGateway, pipeline: &PipelineConfig, f: impl FnOnce(AiContext) -> R) -> R {
    let prompts = PromptSet::default();
    let pacer = Pacer::new(pipeline.rate_limit_delay());
    f(AiContext {
        gateway,
        prompts: &prompts,
        config: pipeline,
        pacer: &pacer,
    })
}

pub fn received(id: &str, sender: &str, subject: &str, body: &str) -> Message {
    Message {
        id: id.to_string(),
        direction: Direction::Received,
        sender: Some(sender.to_string()),
        recipients: vec!["me@example.com".to_string()],
        cc: vec![],
        subject: subject.to_string(),
        body: body.to_string(),
        sent_time: None,
        score: None,
        summary: None,
    }
}

pub fn sent(id: &str, recipients: &[&str], subject: &str, body: &str) -> Message {
    Message {
        id: id.to_string(),
        direction: Direction::Sent,
        sender: Some("me@example.com".to_string()),
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
        cc: vec![],
        subject: subject.to_string(),
        body: body.to_string(),
        sent_time: None,
        score: None,
        summary: None,
    }
}

pub fn at(mut msg: Message, rfc3339: &str) -> Message {
    msg.sent_time = SentTime::from_header(rfc3339);
    msg
}

// ---------------------------------------------------------------------------
// Scripted AI backend
// ---------------------------------------------------------------------------

/// Which prompt a call carried, recognised from its response format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Classify,
    Summary,
    Conversation,
    HistoryCreate,
    HistoryUpdate,
    StyleCreate,
    StyleUpdate,
}

pub fn call_kind(prompt: &str) -> Call {
    if prompt.contains("\"score\"") {
        Call::Classify
    } else if prompt.contains("\"is_conversation\"") {
        Call::Conversation
    } else if prompt.contains("\"general_summary\"") {
        if prompt.contains("Previous summary:") {
            Call::HistoryUpdate
        } else {
            Call::HistoryCreate
        }
    } else if prompt.contains("\"style_profile\"") {
        if prompt.contains("Previous style description:") {
            Call::StyleUpdate
        } else {
            Call::StyleCreate
        }
    } else {
        Call::Summary
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

#[derive(Default)]
struct Script {
    queued: HashMap<Call, VecDeque<Reply>>,
    fallback: HashMap<Call, Reply>,
    log: Vec<(Call, String)>,
}

/// A `Generate` backend answering from per-call-kind scripts. Clones share
/// the script, so a test keeps one handle after giving another away.
#[derive(Clone, Default)]
pub struct ScriptedAi(Arc<Mutex<Script>>);

impl ScriptedAi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next `call` with `text`.
    pub fn reply(&self, call: Call, text: &str) -> &Self {
        let mut s = self.0.lock().unwrap();
        s.queued
            .entry(call)
            .or_default()
            .push_back(Reply::Text(text.to_string()));
        self
    }

    /// Fail the next `times` attempts of `call`.
    pub fn fail(&self, call: Call, times: usize) -> &Self {
        let mut s = self.0.lock().unwrap();
        let q = s.queued.entry(call).or_default();
        for _ in 0..times {
            q.push_back(Reply::Fail("503 model overloaded".to_string()));
        }
        self
    }

    /// Answer every otherwise unscripted `call` with `text`.
    pub fn always(&self, call: Call, text: &str) -> &Self {
        let mut s = self.0.lock().unwrap();
        s.fallback.insert(call, Reply::Text(text.to_string()));
        self
    }

    /// Call kinds in the order they arrived, one per attempt.
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().log.iter().map(|(c, _)| *c).collect()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    pub fn prompts(&self, call: Call) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|(c, _)| *c == call)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// A gateway over this script retrying three times without delay.
    pub fn gateway(&self) -> AiGateway {
        AiGateway::new(self.clone(), RetryPolicy::immediate(3))
    }
}

impl Generate for ScriptedAi {
    fn generate(&self, prompt: &str, _expects_json: bool) -> anyhow::Result<String> {
        let call = call_kind(prompt);
        let mut s = self.0.lock().unwrap();
        s.log.push((call, prompt.to_string()));
        let queued = s.queued.get_mut(&call).and_then(VecDeque::pop_front);
        let reply = queued.or_else(|| s.fallback.get(&call).cloned());
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(reason)) => anyhow::bail!(reason),
            None => anyhow::bail!("no scripted reply for {:?}", call),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory mailbox
// ---------------------------------------------------------------------------

/// Inbox and sent folder held in memory; commit marks inbox messages read.
#[derive(Default)]
pub struct MemoryMailbox {
    pub inbox: Vec<Message>,
    pub sent: Vec<Message>,
    pub seen: HashSet<String>,
    pub fail_sent_fetch: bool,
}

impl MemoryMailbox {
    pub fn new(inbox: Vec<Message>, sent: Vec<Message>) -> Self {
        Self {
            inbox,
            sent,
            ..Default::default()
        }
    }
}

impl MailboxSource for MemoryMailbox {
    fn fetch_unread(&mut self) -> anyhow::Result<Vec<Message>> {
        Ok(self
            .inbox
            .iter()
            .filter(|m| !self.seen.contains(&m.id))
            .cloned()
            .collect())
    }

    fn fetch_all(&mut self, _folder: &str, direction: Direction, known: &HashSet<String>) -> anyhow::Result<Vec<Message>> {
        if self.fail_sent_fetch {
            anyhow::bail!("folder not found");
        }
        Ok(self
            .sent
            .iter()
            .filter(|m| !known.contains(&m.id))
            .cloned()
            .map(|mut m| {
                m.direction = direction;
                m
            })
            .collect())
    }

    fn commit(&mut self, msg: &Message) -> anyhow::Result<()> {
        self.seen.insert(msg.id.clone());
        Ok(())
    }
}
