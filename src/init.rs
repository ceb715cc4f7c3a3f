//! Initialize a data directory with a starter .mailsift.toml.

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use crate::config::{PipelineConfig, WatchConfig, provider_presets};

/// Generate .mailsift.toml content.
pub fn generate_config_toml(user: &str, provider: &str, password_cmd: &str, api_key_cmd: &str) -> String {
    let mut doc = toml_edit::DocumentMut::new();

    let mut mailbox = toml_edit::Table::new();
    mailbox.insert("provider", toml_edit::value(provider));
    mailbox.insert("user", toml_edit::value(user));
    if !password_cmd.is_empty() {
        mailbox.insert("password_cmd", toml_edit::value(password_cmd));
    }
    if !provider_presets().contains_key(provider) {
        mailbox.insert("imap_host", toml_edit::value(""));
        mailbox.insert("imap_port", toml_edit::value(993i64));
    }
    mailbox
        .decor_mut()
        .set_prefix("# Mailbox to triage. Presets: gmail, protonmail-bridge.\n");
    doc.insert("mailbox", toml_edit::Item::Table(mailbox));

    let mut ai = toml_edit::Table::new();
    if !api_key_cmd.is_empty() {
        ai.insert("api_key_cmd", toml_edit::value(api_key_cmd));
    }
    ai.insert("model", toml_edit::value(crate::config::AiConfig::default().model));
    ai.decor_mut()
        .set_prefix("\n# api_key, api_key_cmd, or MAILSIFT_API_KEY in the environment.\n");
    doc.insert("ai", toml_edit::Item::Table(ai));

    let defaults = PipelineConfig::default();
    let mut pipeline = toml_edit::Table::new();
    pipeline.insert(
        "valid_score_threshold",
        toml_edit::value(defaults.valid_score_threshold),
    );
    let mut patterns = toml_edit::Array::new();
    for p in &defaults.no_reply_patterns {
        patterns.push(p.as_str());
    }
    pipeline.insert("no_reply_patterns", toml_edit::value(patterns));
    pipeline.insert("retry_count", toml_edit::value(defaults.retry_count as i64));
    pipeline.insert(
        "rate_limit_delay_ms",
        toml_edit::value(defaults.rate_limit_delay_ms as i64),
    );
    pipeline.decor_mut().set_prefix("\n");
    doc.insert("pipeline", toml_edit::Item::Table(pipeline));

    let mut watch = toml_edit::Table::new();
    watch.insert(
        "poll_interval",
        toml_edit::value(WatchConfig::default().poll_interval as i64),
    );
    watch.decor_mut().set_prefix("\n");
    doc.insert("watch", toml_edit::Item::Table(watch));

    doc.to_string()
}

/// Find the git repo root containing `start`.
fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(".git").exists() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Ensure an entry exists in .gitignore at the repo root.
fn ensure_gitignore_entry(repo_root: &Path, entry: &str) -> Result<()> {
    let gitignore = repo_root.join(".gitignore");
    if gitignore.exists() {
        let content = std::fs::read_to_string(&gitignore)?;
        if content.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
        let suffix = if content.ends_with('\n') || content.is_empty() {
            format!("{}\n", entry)
        } else {
            format!("\n{}\n", entry)
        };
        std::fs::write(&gitignore, format!("{}{}", content, suffix))?;
    } else {
        std::fs::write(&gitignore, format!("{}\n", entry))?;
    }
    println!("Added '{}' to {}", entry, gitignore.display());
    Ok(())
}

/// mailsift init [PATH] --user ADDRESS
pub fn run(path: &Path, user: &str, provider: &str, password_cmd: &str, api_key_cmd: &str, force: bool) -> Result<()> {
    let path = if path.starts_with("~") {
        crate::resolve::expand_tilde(&path.to_string_lossy())
    } else {
        path.to_path_buf()
    };
    std::fs::create_dir_all(&path)?;
    let path = path.canonicalize()?;

    let config_path = path.join(".mailsift.toml");
    if config_path.exists() && !force {
        bail!(
            ".mailsift.toml already exists at {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    let content = generate_config_toml(user, provider, password_cmd, api_key_cmd);
    std::fs::write(&config_path, &content)?;
    println!("Created {}", config_path.display());

    // Stores hold mail content; keep them out of version control.
    if let Some(parent) = path.parent() {
        if let Some(repo_root) = find_git_root(parent) {
            if let Some(name) = path.file_name() {
                if path.starts_with(&repo_root) {
                    ensure_gitignore_entry(&repo_root, &name.to_string_lossy())?;
                }
            }
        }
    }

    println!();
    println!("Done! Next steps:");
    println!("  - Edit {} with your credentials", config_path.display());
    if provider == "gmail" && password_cmd.is_empty() {
        println!("  - Gmail needs an app password: https://myaccount.google.com/apppasswords");
    }
    if !provider_presets().contains_key(provider) {
        println!("  - Set imap_host in [mailbox]");
    }
    println!("  - Run: mailsift run");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_parses() {
        let content = generate_config_toml("me@gmail.com", "gmail", "pass email", "");
        let config = crate::config::parse_config(&content).unwrap();
        assert_eq!(config.mailbox.user, "me@gmail.com");
        assert_eq!(config.mailbox.password_cmd, "pass email");
        assert_eq!(config.mailbox.imap_host, "imap.gmail.com");
        assert_eq!(config.pipeline.valid_score_threshold, 6);
        assert_eq!(config.watch.poll_interval, 300);
    }

    #[test]
    fn test_generic_imap_gets_host_placeholder() {
        let content = generate_config_toml("me@example.com", "imap", "", "pass gemini");
        assert!(content.contains("imap_host = \"\""));
        assert!(content.contains("api_key_cmd = \"pass gemini\""));
    }
}
