//! Mailbox sources: where batches of messages come from.

pub mod imap;

use anyhow::Result;
use std::collections::HashSet;

use crate::types::{Direction, Message, SentTime};
use crate::util::bare_address;

pub use self::imap::ImapSource;

/// A mailbox the pipeline reads from.
///
/// `commit` marks a received message consumed; it is called once per
/// message after the message has been written to a log.
pub trait MailboxSource {
    fn fetch_unread(&mut self) -> Result<Vec<Message>>;
    /// Every message in `folder` whose id is not in `known`.
    fn fetch_all(&mut self, folder: &str, direction: Direction, known: &HashSet<String>) -> Result<Vec<Message>>;
    fn commit(&mut self, msg: &Message) -> Result<()>;
}

/// Wrap width for rendered HTML bodies.
const HTML_WIDTH: usize = 100;

/// Reduce an HTML body to readable plain text, one blank line at most
/// between blocks.
pub fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), HTML_WIDTH)
        .unwrap_or_else(|_| html.to_string());

    let mut cleaned = String::with_capacity(text.len());
    let mut prev_blank = false;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            if !prev_blank && !cleaned.is_empty() {
                cleaned.push('\n');
            }
            prev_blank = true;
        } else {
            cleaned.push_str(line);
            cleaned.push('\n');
            prev_blank = false;
        }
    }
    cleaned.trim().to_string()
}

/// Body text of a parsed message: the first inline `text/plain` part, else
/// the first `text/html` part reduced to text.
pub fn extract_body(parsed: &mailparse::ParsedMail) -> String {
    if let Some(plain) = find_part(parsed, "text/plain") {
        return plain;
    }
    find_part(parsed, "text/html")
        .map(|html| html_to_text(&html))
        .unwrap_or_default()
}

fn find_part(parsed: &mailparse::ParsedMail, mimetype: &str) -> Option<String> {
    if parsed.subparts.is_empty() {
        if parsed.ctype.mimetype.eq_ignore_ascii_case(mimetype) && !is_attachment(parsed) {
            return parsed.get_body().ok();
        }
        return None;
    }
    parsed.subparts.iter().find_map(|part| find_part(part, mimetype))
}

fn is_attachment(part: &mailparse::ParsedMail) -> bool {
    matches!(
        part.get_content_disposition().disposition,
        mailparse::DispositionType::Attachment
    )
}

fn header(parsed: &mailparse::ParsedMail, name: &str) -> Option<String> {
    parsed
        .headers
        .iter()
        .find(|h| h.get_key_ref().eq_ignore_ascii_case(name))
        .map(|h| h.get_value())
}

/// Bare addresses from an address-list header (To, Cc).
fn address_list(parsed: &mailparse::ParsedMail, name: &str) -> Vec<String> {
    let Some(h) = parsed
        .headers
        .iter()
        .find(|h| h.get_key_ref().eq_ignore_ascii_case(name))
    else {
        return Vec::new();
    };
    match mailparse::addrparse_header(h) {
        Ok(list) => list
            .iter()
            .flat_map(|addr| match addr {
                mailparse::MailAddr::Single(info) => vec![info.addr.clone()],
                mailparse::MailAddr::Group(group) => {
                    group.addrs.iter().map(|info| info.addr.clone()).collect()
                }
            })
            .filter_map(|a| bare_address(&a))
            .collect(),
        Err(_) => h
            .get_value()
            .split(',')
            .filter_map(bare_address)
            .collect(),
    }
}

/// Normalize a raw RFC 822 message into a `Message`.
pub fn parse_message(id: &str, raw: &[u8], direction: Direction) -> Result<Message> {
    let parsed = mailparse::parse_mail(raw)?;
    Ok(Message {
        id: id.to_string(),
        direction,
        sender: header(&parsed, "From").filter(|s| !s.trim().is_empty()),
        recipients: address_list(&parsed, "To"),
        cc: address_list(&parsed, "Cc"),
        subject: header(&parsed, "Subject").unwrap_or_else(|| "(no subject)".to_string()),
        body: extract_body(&parsed),
        sent_time: header(&parsed, "Date").and_then(|d| SentTime::from_header(&d)),
        score: None,
        summary: None,
    })
}
