//! Cancellation signalling
//!
//! A cancel signal delivered to a running session transitions it to
//! `Done(FAILED, "cancelled")` from whatever state it occupies. The
//! machine checks the signal between states and while sleeping in
//! backoff; an in-flight collaborator call is allowed to complete or
//! time out and its result is discarded.

use tokio::sync::watch;

/// Sender half held by the dispatcher
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Deliver the cancel signal. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half threaded through the state machine
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Signal that can never fire, for callers without a cancel path
    pub fn none() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// True once the cancel signal has been delivered
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when the cancel signal is delivered; pends forever when the
    /// sender is gone without having fired.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a linked handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}
