//! Integration tests for conversation memory: summary create/update, style
//! profile decoding and failure defaults, refresh persistence.

mod common;

use common::{Call, ScriptedAi, received, sent, temp_data_dir, test_config, with_ctx};
use mailsift::archive::ConversationStore;
use mailsift::memory::{EMPTY_HISTORY, Memory, RefreshReport};
use mailsift::pipeline::refresh_conversations;
use mailsift::types::{ConversationRecord, Message, StyleProfile, failure_summary, is_failure_summary};
use pretty_assertions::assert_eq;

fn record(messages: Vec<Message>) -> ConversationRecord {
    ConversationRecord {
        messages,
        ..Default::default()
    }
}

fn with_summary(mut m: Message, summary: &str) -> Message {
    m.summary = Some(summary.to_string());
    m
}

fn refresh_one(ai: &ScriptedAi, rec: &mut ConversationRecord) -> RefreshReport {
    let gateway = ai.gateway();
    let config = test_config();
    let mut report = RefreshReport::default();
    with_ctx(&gateway, &config.pipeline, |ctx| {
        Memory::new(ctx).refresh_record("a@x.com", rec, &mut report)
    });
    report
}

const STYLE_REPLY: &str = r#"{"style_profile": {"formality": "casual", "tone_description": "warm", "greeting_template": "Hey {name}!", "sign_off_template": "Cheers"}}"#;

#[test]
fn test_pending_summary_uses_create_prompt() {
    let ai = ScriptedAi::new();
    ai.reply(Call::HistoryCreate, r#"{"general_summary": "Ann asked about lunch."}"#);
    let mut rec = record(vec![with_summary(
        received("1", "a@x.com", "Lunch", "Free?"),
        "Asks about lunch.",
    )]);

    let report = refresh_one(&ai, &mut rec);

    assert_eq!(rec.general_summary, "Ann asked about lunch.");
    assert_eq!(report.summary_failures, 0);
    let prompt = &ai.prompts(Call::HistoryCreate)[0];
    assert!(prompt.contains("[other] (subject: Lunch): Asks about lunch."));
    // Received-only conversations get no style profile.
    assert_eq!(rec.style_profile, None);
    assert_eq!(ai.count(Call::StyleCreate), 0);
}

#[test]
fn test_existing_summary_uses_update_prompt() {
    let ai = ScriptedAi::new();
    ai.reply(Call::HistoryUpdate, r#"{"general_summary": "Lunch moved to Friday."}"#);
    let mut rec = record(vec![received("1", "a@x.com", "Re: Lunch", "Friday then")]);
    rec.general_summary = "Planning lunch.".to_string();

    refresh_one(&ai, &mut rec);

    assert_eq!(rec.general_summary, "Lunch moved to Friday.");
    assert!(ai.prompts(Call::HistoryUpdate)[0].contains("Planning lunch."));
}

#[test]
fn test_long_history_update_keeps_newest_messages() {
    let ai = ScriptedAi::new();
    ai.reply(Call::HistoryUpdate, r#"{"general_summary": "Still talking."}"#);
    let mut messages: Vec<Message> = (0..80)
        .map(|i| {
            with_summary(
                received(&i.to_string(), "a@x.com", "Old thread", "old"),
                "An older exchange about the quarterly planning offsite.",
            )
        })
        .collect();
    messages.push(with_summary(
        received("80", "a@x.com", "New thread", "new"),
        "Latest: asks to move the call to Monday.",
    ));
    let mut rec = record(messages);
    rec.general_summary = "Long running planning thread.".to_string();

    refresh_one(&ai, &mut rec);

    let prompt = &ai.prompts(Call::HistoryUpdate)[0];
    assert!(prompt.contains("Latest: asks to move the call to Monday."));
    assert!(prompt.contains("Long running planning thread."));
}

#[test]
fn test_failure_marker_summary_is_recreated() {
    let ai = ScriptedAi::new();
    ai.reply(Call::HistoryCreate, r#"{"general_summary": "Fresh."}"#);
    let mut rec = record(vec![received("1", "a@x.com", "x", "y")]);
    rec.general_summary = failure_summary("timeout");

    refresh_one(&ai, &mut rec);

    assert_eq!(rec.general_summary, "Fresh.");
    assert_eq!(ai.count(Call::HistoryUpdate), 0);
}

#[test]
fn test_summary_failure_stamps_marker() {
    let ai = ScriptedAi::new();
    ai.fail(Call::HistoryCreate, 3);
    let mut rec = record(vec![received("1", "a@x.com", "x", "y")]);

    let report = refresh_one(&ai, &mut rec);

    assert!(is_failure_summary(&rec.general_summary));
    assert_eq!(report.summary_failures, 1);
    assert_eq!(rec.messages.len(), 1);
}

#[test]
fn test_empty_record_needs_no_call() {
    let ai = ScriptedAi::new();
    let mut rec = record(vec![]);
    refresh_one(&ai, &mut rec);
    assert_eq!(rec.general_summary, EMPTY_HISTORY);
    assert!(ai.calls().is_empty());
}

#[test]
fn test_style_created_from_sent_messages() {
    let ai = ScriptedAi::new();
    ai.always(Call::HistoryCreate, r#"{"general_summary": "s"}"#)
        .reply(Call::StyleCreate, STYLE_REPLY);
    let mut rec = record(vec![sent("1", &["a@x.com"], "Hi", "Hey Ann! See you soon. Cheers")]);

    refresh_one(&ai, &mut rec);

    let style = rec.style_profile.unwrap();
    assert_eq!(style.formality, "casual");
    assert_eq!(style.sign_off_template, "Cheers");
    assert!(ai.prompts(Call::StyleCreate)[0].contains("Hey Ann! See you soon."));
}

#[test]
fn test_established_style_uses_update_and_flat_reply() {
    let ai = ScriptedAi::new();
    ai.always(Call::HistoryUpdate, r#"{"general_summary": "s"}"#)
        .reply(Call::StyleUpdate, r#"{"formality": "formal", "tone_description": "reserved"}"#);
    let mut rec = record(vec![sent("1", &["a@x.com"], "Report", "Dear Ann, attached. Regards")]);
    rec.general_summary = "Work thread.".to_string();
    rec.style_profile = Some(StyleProfile {
        formality: "casual".to_string(),
        tone_description: "warm".to_string(),
        greeting_template: "Hey {name}!".to_string(),
        sign_off_template: "Cheers".to_string(),
    });

    refresh_one(&ai, &mut rec);

    let style = rec.style_profile.unwrap();
    assert_eq!(style.formality, "formal");
    assert_eq!(style.tone_description, "reserved");
    // Fields the reply left out carry over.
    assert_eq!(style.greeting_template, "Hey {name}!");
    assert!(ai.prompts(Call::StyleUpdate)[0].contains("casual"));
}

#[test]
fn test_unknown_style_profile_is_recreated() {
    let ai = ScriptedAi::new();
    ai.always(Call::HistoryCreate, r#"{"general_summary": "s"}"#)
        .reply(Call::StyleCreate, STYLE_REPLY);
    let mut rec = record(vec![sent("1", &["a@x.com"], "Hi", "Hi")]);
    rec.style_profile = Some(StyleProfile::default());

    refresh_one(&ai, &mut rec);

    assert_eq!(ai.count(Call::StyleUpdate), 0);
    assert_eq!(rec.style_profile.unwrap().formality, "casual");
}

#[test]
fn test_unrecognised_style_reply_is_default() {
    let ai = ScriptedAi::new();
    ai.always(Call::HistoryCreate, r#"{"general_summary": "s"}"#)
        .reply(Call::StyleCreate, r#"{"vibe": "chill"}"#);
    let mut rec = record(vec![sent("1", &["a@x.com"], "Hi", "Hi")]);

    let report = refresh_one(&ai, &mut rec);

    assert_eq!(rec.style_profile, Some(StyleProfile::default()));
    assert_eq!(report.style_failures, 0);
}

#[test]
fn test_style_failure_defaults_and_record_persists() {
    let (_tmp, paths) = temp_data_dir();
    let mut store = ConversationStore::default();
    store.file("a@x.com", &sent("1", &["a@x.com"], "Hi", "Hello Ann"));
    store.save(&paths.conversations()).unwrap();

    let ai = ScriptedAi::new();
    ai.always(Call::HistoryCreate, r#"{"general_summary": "Owner greeted Ann."}"#)
        .fail(Call::StyleCreate, 3);
    let config = test_config();

    let report = refresh_conversations(&ai.gateway(), &config, &paths, &["a@x.com".to_string()]).unwrap();

    assert_eq!(report.style_failures, 1);
    assert_eq!(ai.count(Call::StyleCreate), 3);
    let reloaded = ConversationStore::load(&paths.conversations());
    let rec = reloaded.get("a@x.com").unwrap();
    assert_eq!(rec.style_profile, Some(StyleProfile::default()));
    assert_eq!(rec.general_summary, "Owner greeted Ann.");
    assert_eq!(rec.messages.len(), 1);
}

#[test]
fn test_refresh_without_addresses_picks_pending_and_failed() {
    let (_tmp, paths) = temp_data_dir();
    let mut store = ConversationStore::default();
    store.file("pending@x.com", &received("1", "pending@x.com", "a", "a"));
    store.file("failed@x.com", &received("2", "failed@x.com", "b", "b"));
    store.file("done@x.com", &received("3", "done@x.com", "c", "c"));
    store.get_mut("failed@x.com").unwrap().general_summary = failure_summary("timeout");
    store.get_mut("done@x.com").unwrap().general_summary = "All good.".to_string();
    store.save(&paths.conversations()).unwrap();

    let ai = ScriptedAi::new();
    ai.always(Call::HistoryCreate, r#"{"general_summary": "Recovered."}"#);
    let report = refresh_conversations(&ai.gateway(), &test_config(), &paths, &[]).unwrap();

    assert_eq!(report.refreshed, 2);
    let reloaded = ConversationStore::load(&paths.conversations());
    assert_eq!(reloaded.get("pending@x.com").unwrap().general_summary, "Recovered.");
    assert_eq!(reloaded.get("failed@x.com").unwrap().general_summary, "Recovered.");
    assert_eq!(reloaded.get("done@x.com").unwrap().general_summary, "All good.");
    assert_eq!(ai.count(Call::HistoryUpdate), 0);
}
