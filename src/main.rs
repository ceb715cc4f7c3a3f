use anyhow::Result;
use clap::Parser;

use mailsift::cli::{Cli, Commands};

/// Install the stderr tracing subscriber. `RUST_LOG` wins over `-v`, which
/// wins over the `[logging]` level in config.
fn setup_logging(verbose: u8, configured: &str) {
    let level = match verbose {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.as_deref();

    let configured = mailsift::commands::Workspace::open(data_dir, false)
        .map(|ws| ws.config.logging.level)
        .unwrap_or_else(|_| "warn".to_string());
    setup_logging(cli.verbose, &configured);

    match cli.command {
        Commands::Init {
            path,
            user,
            provider,
            password_cmd,
            api_key_cmd,
            force,
        } => mailsift::init::run(&path, &user, &provider, &password_cmd, &api_key_cmd, force),
        Commands::Run => mailsift::commands::run(data_dir),
        Commands::Watch { interval } => mailsift::watch::run(cli.data_dir.clone(), interval),
        Commands::Refresh { addresses } => mailsift::commands::refresh(data_dir, &addresses),
        Commands::Reputation { address } => mailsift::commands::reputation(data_dir, &address),
        Commands::Show { address, limit } => mailsift::commands::show(data_dir, &address, limit),
    }
}
