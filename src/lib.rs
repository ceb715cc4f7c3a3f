pub mod ai;
pub mod archive;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod init;
pub mod journal;
pub mod memory;
pub mod pipeline;
pub mod reputation;
pub mod resolve;
pub mod source;
pub mod store;
pub mod types;
pub mod util;
pub mod watch;

pub use error::{Result, SiftError};
