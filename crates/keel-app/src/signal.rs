//! OS signal handling.
//!
//! A single async helper that completes when the process receives a
//! termination signal.
//!
//! ## Unix
//! **SIGINT** (Ctrl-C in terminal) and **SIGTERM** (default kill signal,
//! used by systemd/Kubernetes) are handled, with
//! [`tokio::signal::ctrl_c`] awaited as a fallback.
//!
//! ## Other platforms
//! Only [`tokio::signal::ctrl_c`] is awaited.

/// Completes when a termination signal arrives.
///
/// # Errors
///
/// Returns an error when signal listeners cannot be installed.
#[cfg(unix)]
pub async fn wait_for_termination() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

/// Completes when a termination signal arrives.
///
/// # Errors
///
/// Returns an error when signal listeners cannot be installed.
#[cfg(not(unix))]
pub async fn wait_for_termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
