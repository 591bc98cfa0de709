//! Termination-signal wiring and the process-exit seam.
//!
//! Signals are routed through a single awaitable future rather than a handler
//! that mutates lock state directly; the heartbeat loop and the main flow
//! both observe channels, never signal-handler side effects.

use tracing::warn;

/// Resolves when the process receives SIGINT (Ctrl-C) or, on Unix, SIGTERM.
///
/// The underlying handlers stay installed for the life of the process, so a
/// second signal arriving while release is in flight is absorbed instead of
/// killing the process mid-delete.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install ctrl-c handler; waiting forever");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler; waiting forever");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Terminal exit path used when the lock must take the process down: a lost
/// lease, or an exhausted active-wait ceiling.
///
/// Injected so tests can observe the termination path instead of dying; the
/// default implementation exits the process.
pub trait ExitHandler: Send + Sync {
    fn exit(&self, code: i32);
}

/// Default [`ExitHandler`]: `std::process::exit`.
#[derive(Debug, Default)]
pub struct ProcessExit;

impl ExitHandler for ProcessExit {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}
