pub mod utils;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::time::timeout;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::companion::{self, Companion, CompanionError};
use crate::console;

const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),
    #[error("startup failed: {0}")]
    Startup(#[from] CompanionError),
    #[error("failed to shut down within {} seconds", FINAL_SHUTDOWN_TIMEOUT.as_secs())]
    ShutdownTimeout,
}

/// Initialize logging, panic handler, and build info reporting.
/// Returns guards that must be kept alive for the duration of the program.
pub fn init_logging(
    log_level: tracing::Level,
    log_dir: Option<&Path>,
) -> Vec<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::fmt::format::FmtSpan;

    let mut guards = Vec::new();

    // Stdout layer
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);

    let stdout_env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(stdout_env_filter);

    // File layer (if log_dir is set)
    if let Some(log_dir) = log_dir {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Failed to create log directory {:?}: {}",
                log_dir, e
            );
        }

        let file_appender = tracing_appender::rolling::daily(log_dir, "tz-vertex.log");
        let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        guards.push(file_guard);

        let file_env_filter = EnvFilter::builder()
            .with_default_directive(log_level.into())
            .from_env_lossy();

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(file_env_filter);

        tracing_subscriber::registry()
            .with(stdout_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry().with(stdout_layer).init();
    }

    utils::register_panic_logger();
    utils::report_build_info();

    guards
}

/// Start the companion and block until SIGINT/SIGTERM or, with
/// `with_console` set, until the user quits the console.
///
/// A failed startup is returned as an error; the daemon has already been
/// stopped by then.
pub async fn run(config: &companion::Config, with_console: bool) -> Result<(), RunError> {
    let (graceful_waiter, shutdown_tx, mut shutdown_rx) = utils::graceful_shutdown_blocker()?;

    let companion = match Companion::start(config, shutdown_rx.clone()).await {
        Ok(companion) => Arc::new(companion),
        Err(e) if e.is_cancelled() => {
            tracing::info!("shutdown requested during startup");
            let _ = graceful_waiter.await;
            return Ok(());
        }
        Err(e) => {
            graceful_waiter.abort();
            return Err(e.into());
        }
    };
    tracing::info!(
        "pin list at {}, {} pins",
        companion.pin_list_path().display(),
        companion.get_pin_list().await.len()
    );

    let console_handle = with_console.then(|| {
        let companion = companion.clone();
        let console_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = console::run(&companion, stdin, tokio::io::stdout(), console_tx).await {
                tracing::error!("console error: {}", e);
            }
        })
    });

    utils::cancelled(&mut shutdown_rx).await;
    tracing::info!("shutting down");

    if let Some(handle) = console_handle {
        handle.abort();
    }

    let result = match timeout(FINAL_SHUTDOWN_TIMEOUT, companion.shutdown()).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tracing::error!(
                "Failed to shut down within {} seconds",
                FINAL_SHUTDOWN_TIMEOUT.as_secs()
            );
            Err(RunError::ShutdownTimeout)
        }
    };

    let _ = graceful_waiter.await;
    result
}
