//! Path resolution for mailsift data and config.
//!
//! Resolution order for the data directory:
//!   1. mailsift-data/ in cwd (developer workflow)
//!   2. MAILSIFT_DATA environment variable
//!   3. OS-native data directory
//!   4. ~/Documents/mailsift

use std::path::{Path, PathBuf};

/// Return the data directory path.
pub fn data_dir() -> PathBuf {
    let local = PathBuf::from("mailsift-data");
    if local.is_dir() {
        return local;
    }
    if let Ok(env) = std::env::var("MAILSIFT_DATA") {
        if !env.is_empty() {
            return expand_tilde(&env);
        }
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "mailsift") {
        return proj_dirs.data_dir().to_path_buf();
    }
    home_dir().join("Documents").join("mailsift")
}

/// Resolve .mailsift.toml: check .mailsift.toml then mailsift.toml in data_dir().
pub fn config_file() -> PathBuf {
    config_file_in(&data_dir())
}

pub fn config_file_in(dir: &Path) -> PathBuf {
    let dotfile = dir.join(".mailsift.toml");
    if dotfile.exists() {
        return dotfile;
    }
    let plain = dir.join("mailsift.toml");
    if plain.exists() {
        return plain;
    }
    dotfile
}

/// Locations of every durable store under one data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn reputation(&self) -> PathBuf {
        self.root.join("reputation.json")
    }

    pub fn valid_log(&self) -> PathBuf {
        self.root.join("valid_messages.json")
    }

    pub fn invalid_log(&self) -> PathBuf {
        self.root.join("invalid_messages.json")
    }

    pub fn sent_log(&self) -> PathBuf {
        self.root.join("sent_messages.json")
    }

    pub fn conversations(&self) -> PathBuf {
        self.root.join("conversations.json")
    }

    pub fn judgments(&self) -> PathBuf {
        self.root.join("judgments.json")
    }
}

/// Get the user's home directory.
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Expand ~ to home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else if path == "~" {
        home_dir()
    } else {
        PathBuf::from(path)
    }
}
