use anyhow::bail;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::Cell;
use std::process::Command;
use std::time::{Duration, Instant};

static ANGLE_ADDR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^>]+)>").unwrap());

/// The first `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// The last `max` characters of `text`.
pub fn tail_chars(text: &str, max: usize) -> &str {
    if max == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

/// Reduce a header-style address (`Alice <alice@example.com>`) to its bare,
/// lowercased `local@domain` form. Returns None when no `@` is present.
pub fn bare_address(raw: &str) -> Option<String> {
    let inner = ANGLE_ADDR_RE
        .captures(raw)
        .map(|cap| cap[1].to_string())
        .unwrap_or_else(|| raw.to_string());
    let addr = inner.trim().trim_matches('"').to_lowercase();
    let (local, domain) = addr.rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() || local.contains(char::is_whitespace) {
        return None;
    }
    Some(addr)
}

/// Run a shell command, returning (stdout, stderr, exit_code).
pub fn run_cmd(args: &[&str]) -> anyhow::Result<(String, String, i32)> {
    let output = Command::new(args[0]).args(&args[1..]).output()?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    Ok((stdout, stderr, code))
}

/// Resolve a secret: inline value if set, else the trimmed stdout of `cmd`.
pub fn resolve_secret(inline: &str, cmd: &str, what: &str) -> anyhow::Result<String> {
    if !inline.is_empty() {
        return Ok(inline.to_string());
    }
    if !cmd.is_empty() {
        let (stdout, stderr, code) = run_cmd(&["sh", "-c", cmd])?;
        if code != 0 {
            bail!("{} command failed: {}", what, stderr.trim());
        }
        return Ok(stdout.trim().to_string());
    }
    bail!("No {} or {} command configured", what, what)
}

/// Spaces out independently scheduled calls by at least `delay`.
///
/// The first call goes through at once; later calls sleep only for whatever
/// part of the delay has not already elapsed.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    last: Cell<Option<Instant>>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Cell::new(None),
        }
    }

    pub fn wait(&self) {
        if let Some(last) = self.last.get() {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
        self.last.set(Some(Instant::now()));
    }
}
