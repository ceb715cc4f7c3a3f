//! Polling daemon: run one batch per interval until Ctrl-C.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::commands::Workspace;

/// One batch, isolated: errors are logged and the loop keeps going.
fn poll_once(ws: &Workspace) {
    match ws.run_batch() {
        Ok(report) => report.print(),
        Err(e) => error!(error = %format!("{:#}", e), "Batch failed"),
    }
}

/// Sleep for `interval`, then run `batch` on a blocking thread; repeat until
/// `shutdown` is set. A signal on `wake_rx` cuts the sleep short. Returns the
/// number of batches run.
pub async fn run_loop<F>(
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    mut wake_rx: watch::Receiver<bool>,
    batch: F,
) -> Result<usize>
where
    F: Fn() + Clone + Send + 'static,
{
    let mut batches = 0;
    loop {
        info!(seconds = interval.as_secs(), "Sleeping until next batch");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = wake_rx.changed() => {}
        }
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        let run = batch.clone();
        tokio::task::spawn_blocking(move || run()).await?;
        batches += 1;
    }
    Ok(batches)
}

/// mailsift watch [--interval N]
#[tokio::main]
pub async fn run(data_dir: Option<PathBuf>, interval_override: Option<u64>) -> Result<()> {
    let ws = Workspace::open(data_dir.as_deref(), true)?;
    let interval = interval_override.unwrap_or(ws.config.watch.poll_interval).max(1);

    let shutdown = Arc::new(AtomicBool::new(false));
    let (wake_tx, wake_rx) = watch::channel(false);

    // Ctrl-C stops the loop between batches; a running batch finishes first.
    let flag = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        println!("\nReceived signal, shutting down...");
        flag.store(true, Ordering::Relaxed);
        let _ = wake_tx.send(true);
    });

    println!("mailsift watch: polling every {}s (Ctrl-C to stop)", interval);

    let batches = run_loop(Duration::from_secs(interval), shutdown, wake_rx, move || {
        poll_once(&ws)
    })
    .await?;

    println!("mailsift watch: stopped after {} batch(es)", batches);
    Ok(())
}
