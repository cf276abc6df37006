use tokio::sync::watch;

/// Sender side held by the application orchestrator.
/// Call `trigger()` to broadcast shutdown to all listeners.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Receiver side distributed to subsystems that must honor shutdown.
/// Clone freely; each clone independently observes the signal.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Construct a linked handle/signal pair.
pub fn new_pair() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

impl ShutdownHandle {
    /// Broadcast the shutdown signal to all outstanding [`ShutdownSignal`]
    /// receivers. Errors only if every receiver is gone, which is harmless.
    pub fn trigger(self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownSignal {
    /// Wait until the shutdown signal has been triggered. Resolves
    /// immediately if it was triggered before this call.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|&v| v).await;
    }
}

/// Wait for `SIGINT` (Ctrl-C) or `SIGTERM` (container stop).
pub async fn wait_for_os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");

    tokio::select! {
        _ = sigint.recv()  => tracing::info!("🔔 SIGINT received"),
        _ = sigterm.recv() => tracing::info!("🔔 SIGTERM received"),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_all_clones() {
        let (handle, signal) = new_pair();
        let mut a = signal.clone();
        let mut b = signal;

        handle.trigger();

        a.wait().await;
        b.wait().await;
    }

    #[tokio::test]
    async fn wait_resolves_when_triggered_before_the_call() {
        let (handle, mut signal) = new_pair();
        handle.trigger();
        signal.wait().await;
    }
}
