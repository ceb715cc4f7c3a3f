use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mailsift",
    version,
    about = "Triage incoming email by sender reputation and keep per-correspondent conversation memory"
)]
pub struct Cli {
    /// Data directory (default: mailsift-data/, $MAILSIFT_DATA, or the OS data dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a data directory with a starter .mailsift.toml
    Init {
        /// Data directory to create
        #[arg(value_name = "PATH", default_value = "mailsift-data")]
        path: PathBuf,

        /// Mailbox login (email address)
        #[arg(long)]
        user: String,

        /// Mailbox provider
        #[arg(long, default_value = "gmail", value_parser = ["gmail", "protonmail-bridge", "imap"])]
        provider: String,

        /// Shell command that prints the mailbox password
        #[arg(long, default_value = "")]
        password_cmd: String,

        /// Shell command that prints the AI API key
        #[arg(long, default_value = "")]
        api_key_cmd: String,

        /// Overwrite an existing .mailsift.toml
        #[arg(long)]
        force: bool,
    },

    /// Run one batch: fetch, classify, archive, summarize
    Run,

    /// Run a batch every interval until Ctrl-C
    Watch {
        /// Poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Recompute conversation summaries and style profiles
    Refresh {
        /// Correspondent addresses (default: every pending or failed conversation)
        addresses: Vec<String>,
    },

    /// Show the stored reputation of a sender
    Reputation {
        /// Sender address
        address: String,
    },

    /// Show the conversation memory for a correspondent
    Show {
        /// Correspondent address
        address: String,

        /// Number of recent messages to list
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}
