//! Prompt templates for every AI call the pipelines make.
//!
//! Each prompt is `system`, `task`, the call's inputs, then the response
//! format instruction. Defaults can be replaced per kind from config.

use std::collections::BTreeMap;

use crate::config::PromptOverride;
use crate::types::StyleProfile;
use crate::util::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Classification,
    Summary,
    Conversation,
    HistoryCreate,
    HistoryUpdate,
    StyleCreate,
    StyleUpdate,
}

impl PromptKind {
    pub const ALL: [PromptKind; 7] = [
        PromptKind::Classification,
        PromptKind::Summary,
        PromptKind::Conversation,
        PromptKind::HistoryCreate,
        PromptKind::HistoryUpdate,
        PromptKind::StyleCreate,
        PromptKind::StyleUpdate,
    ];

    /// Key under `[prompts.*]` in config.
    pub fn config_key(self) -> &'static str {
        match self {
            PromptKind::Classification => "classification",
            PromptKind::Summary => "summary",
            PromptKind::Conversation => "conversation",
            PromptKind::HistoryCreate => "history_create",
            PromptKind::HistoryUpdate => "history_update",
            PromptKind::StyleCreate => "style_create",
            PromptKind::StyleUpdate => "style_update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub task: String,
    pub response_format: String,
}

impl PromptTemplate {
    fn new(system: &str, task: &str, response_format: &str) -> Self {
        Self {
            system: system.to_string(),
            task: task.to_string(),
            response_format: response_format.to_string(),
        }
    }

    fn apply(&mut self, o: &PromptOverride) {
        if !o.system.is_empty() {
            self.system = o.system.clone();
        }
        if !o.task.is_empty() {
            self.task = o.task.clone();
        }
        if !o.response_format.is_empty() {
            self.response_format = o.response_format.clone();
        }
    }

    fn render(&self, inputs: &str) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\n{}",
            self.system, self.task, inputs, self.response_format
        )
    }
}

const SCORE_RUBRIC: &[(&str, u8)] = &[
    ("Personal message from a real person expecting a reply", 10),
    ("Work or school correspondence", 9),
    ("Account, order or appointment notice that needs attention", 7),
    ("Newsletter the reader subscribed to", 4),
    ("Automated notification or report", 3),
    ("Marketing or promotion", 2),
    ("Spam, phishing or scam", 1),
];

fn default_template(kind: PromptKind) -> PromptTemplate {
    const JSON_ONLY: &str = "Reply with a single JSON object and nothing else.";
    match kind {
        PromptKind::Classification => {
            let rubric: Vec<String> = SCORE_RUBRIC
                .iter()
                .map(|(label, score)| format!("- {}: {}", label, score))
                .collect();
            PromptTemplate::new(
                "You triage an email inbox and judge how much each message matters to its owner.",
                &format!(
                    "Score the email from 1 (worthless) to 10 (must read) using this rubric, \
                     then summarize it in one sentence.\n{}",
                    rubric.join("\n")
                ),
                &format!(r#"{} Format: {{"score": <integer 1-10>, "summary": "<one sentence>"}}"#, JSON_ONLY),
            )
        }
        PromptKind::Summary => PromptTemplate::new(
            "You summarize emails for their owner.",
            "Summarize the email in one or two sentences, keeping names, dates and requests.",
            &format!(r#"{} Format: {{"summary": "<summary>"}}"#, JSON_ONLY),
        ),
        PromptKind::Conversation => PromptTemplate::new(
            "You decide whether an email belongs to a real back-and-forth conversation.",
            "Answer true if a person wrote this email to the reader and a reply or ongoing \
             exchange is plausible. Answer false for notifications, reports, receipts, \
             newsletters and other automated mail.",
            &format!(
                r#"{} Format: {{"is_conversation": true|false, "reason": "<short reason>"}}"#,
                JSON_ONLY
            ),
        ),
        PromptKind::HistoryCreate => PromptTemplate::new(
            "You keep a running memory of the owner's conversation with one correspondent.",
            "Write a concise overall summary of the relationship and the open topics, \
             based on the chronological digest. [self] is the owner, [other] the correspondent.",
            &format!(r#"{} Format: {{"general_summary": "<summary>"}}"#, JSON_ONLY),
        ),
        PromptKind::HistoryUpdate => PromptTemplate::new(
            "You keep a running memory of the owner's conversation with one correspondent.",
            "Update the previous summary with what the digest adds. Keep facts that still \
             hold, drop resolved topics. [self] is the owner, [other] the correspondent.",
            &format!(r#"{} Format: {{"general_summary": "<summary>"}}"#, JSON_ONLY),
        ),
        PromptKind::StyleCreate => PromptTemplate::new(
            "You describe how a person writes emails to one correspondent.",
            "From the owner's own emails below, describe their formality, tone, usual \
             greeting and usual sign-off.",
            &format!(
                r#"{} Format: {{"style_profile": {{"formality": "...", "tone_description": "...", "greeting_template": "...", "sign_off_template": "..."}}}}"#,
                JSON_ONLY
            ),
        ),
        PromptKind::StyleUpdate => PromptTemplate::new(
            "You describe how a person writes emails to one correspondent.",
            "Refine the previous style description using the owner's latest emails. Change a \
             field only when the new emails clearly show something different.",
            &format!(
                r#"{} Format: {{"style_profile": {{"formality": "...", "tone_description": "...", "greeting_template": "...", "sign_off_template": "..."}}}}"#,
                JSON_ONLY
            ),
        ),
    }
}

/// The full set of templates in use.
#[derive(Debug, Clone)]
pub struct PromptSet {
    templates: BTreeMap<&'static str, PromptTemplate>,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::with_overrides(&BTreeMap::new())
    }
}

impl PromptSet {
    pub fn with_overrides(overrides: &BTreeMap<String, PromptOverride>) -> Self {
        let mut templates = BTreeMap::new();
        for kind in PromptKind::ALL {
            let mut template = default_template(kind);
            if let Some(o) = overrides.get(kind.config_key()) {
                template.apply(o);
            }
            templates.insert(kind.config_key(), template);
        }
        Self { templates }
    }

    pub fn template(&self, kind: PromptKind) -> PromptTemplate {
        self.templates
            .get(kind.config_key())
            .cloned()
            .unwrap_or_else(|| default_template(kind))
    }

    fn render(&self, kind: PromptKind, inputs: &str) -> String {
        self.template(kind).render(inputs)
    }

    pub fn classification(&self, subject: &str, body: &str, body_limit: usize) -> String {
        self.render(PromptKind::Classification, &message_inputs(subject, body, body_limit))
    }

    pub fn summary(&self, subject: &str, body: &str, body_limit: usize) -> String {
        self.render(PromptKind::Summary, &message_inputs(subject, body, body_limit))
    }

    pub fn conversation(&self, subject: &str, body: &str, body_limit: usize) -> String {
        self.render(PromptKind::Conversation, &message_inputs(subject, body, body_limit))
    }

    pub fn history_create(&self, digest: &str) -> String {
        self.render(
            PromptKind::HistoryCreate,
            &format!("Conversation digest (chronological):\n{}", digest),
        )
    }

    pub fn history_update(&self, old_summary: &str, digest: &str) -> String {
        self.render(
            PromptKind::HistoryUpdate,
            &format!(
                "Previous summary:\n{}\n\nConversation digest (chronological):\n{}",
                old_summary, digest
            ),
        )
    }

    pub fn style_create(&self, digest: &str) -> String {
        self.render(
            PromptKind::StyleCreate,
            &format!("Emails written by the owner (chronological):\n{}", digest),
        )
    }

    pub fn style_update(&self, old: &StyleProfile, digest: &str) -> String {
        let old_json = serde_json::to_string(old).unwrap_or_default();
        self.render(
            PromptKind::StyleUpdate,
            &format!(
                "Previous style description:\n{}\n\nLatest emails written by the owner (chronological):\n{}",
                old_json, digest
            ),
        )
    }
}

fn message_inputs(subject: &str, body: &str, body_limit: usize) -> String {
    format!(
        "Subject: {}\nBody (first {} characters): {}",
        subject,
        body_limit,
        truncate_chars(body, body_limit)
    )
}
