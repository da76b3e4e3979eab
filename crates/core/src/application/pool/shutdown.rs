// Graceful shutdown signalling
//
// One sender in the daemon, one token per background loop (lifecycle event
// loop, retention sweeper). A token handed out after the signal fired still
// resolves immediately, and a dropped sender releases all waiters so loops
// never hang on daemon teardown.

use tokio::sync::watch;

/// Receiving side of the shutdown signal
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Resolve once shutdown has been requested
    ///
    /// Returns immediately if the signal already fired or the sender is
    /// gone.
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Sender dropped without signalling; treat as shutdown
                return;
            }
        }
    }
}

/// Sending side of the shutdown signal
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to every token
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }

    /// Mint an additional token
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}
