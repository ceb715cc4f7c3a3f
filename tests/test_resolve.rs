//! Integration tests for path resolution (src/resolve.rs).

mod common;

use std::path::PathBuf;

use mailsift::resolve::{self, DataPaths};

#[test]
fn test_expand_tilde_with_prefix() {
    let home = resolve::home_dir();
    let result = resolve::expand_tilde("~/Documents/test");
    assert_eq!(result, home.join("Documents").join("test"));
}

#[test]
fn test_expand_tilde_bare() {
    let home = resolve::home_dir();
    assert_eq!(resolve::expand_tilde("~"), home);
}

#[test]
fn test_expand_tilde_relative() {
    let result = resolve::expand_tilde("relative/path");
    assert_eq!(result, PathBuf::from("relative/path"));
}

#[test]
fn test_store_files_are_distinct() {
    let (_tmp, paths) = common::temp_data_dir();
    let files = [
        paths.reputation(),
        paths.valid_log(),
        paths.invalid_log(),
        paths.sent_log(),
        paths.conversations(),
        paths.judgments(),
    ];
    for (i, a) in files.iter().enumerate() {
        assert!(a.starts_with(&paths.root));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("json"));
        for b in &files[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_config_file_defaults_to_dotfile() {
    let (tmp, _paths) = common::temp_data_dir();
    assert_eq!(resolve::config_file_in(tmp.path()), tmp.path().join(".mailsift.toml"));
}

#[test]
fn test_data_paths_new_keeps_root() {
    let paths = DataPaths::new("/srv/mail");
    assert_eq!(paths.root, PathBuf::from("/srv/mail"));
    assert_eq!(paths.sent_log().parent(), Some(std::path::Path::new("/srv/mail")));
}
