use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Spawns a task that listens for SIGINT and SIGTERM and sends a shutdown signal via a watch.
///
/// Returns the join handle, the sender (for programmatic shutdown, e.g. the
/// console's `quit`), and the receiver.
pub fn graceful_shutdown_blocker(
) -> std::io::Result<(JoinHandle<()>, watch::Sender<()>, watch::Receiver<()>)> {
    let (tx, rx) = watch::channel(());
    let signal_tx = tx.clone();
    let mut quit_rx = rx.clone();

    #[cfg(unix)]
    let handle = {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::debug!("gracefully exiting on SIGINT");
                }
                _ = sigterm.recv() => {
                    tracing::debug!("gracefully exiting on SIGTERM");
                }
                // someone else already asked for shutdown
                _ = cancelled(&mut quit_rx) => return,
            }

            let _ = signal_tx.send(());
        })
    };

    #[cfg(not(unix))]
    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("gracefully exiting on ctrl-c");
            }
            _ = cancelled(&mut quit_rx) => return,
        }

        let _ = signal_tx.send(());
    });

    Ok((handle, tx, rx))
}

/// Resolves once a shutdown has been sent on `rx`.
///
/// If every sender is gone no shutdown can ever arrive, so this pends forever
/// instead of firing spuriously.
pub async fn cancelled(rx: &mut watch::Receiver<()>) {
    if rx.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Registers a panic hook that logs panics using the `tracing` crate
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

pub fn report_build_info() {
    let build = common::build_info!();

    tracing::info!(
        build_profile = ?build.build_profile,
        features = ?build.build_features,
        version = ?build.version,
        "tz-vertex starting up"
    );
}
