use std::future::Future;

use aski_core::CancellationToken;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Cancels one in-flight request when a signal arrives.
///
/// The listener task lives as long as the guard, so a signal after the
/// request finished does not reach a later request.
pub struct Interrupt {
    token: CancellationToken,
    listener: JoinHandle<()>,
}

impl Interrupt {
    /// Listens for Ctrl-C.
    pub fn ctrl_c() -> Self {
        Self::on(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
    }

    /// Cancels the token once `signal` completes.
    pub fn on<F>(signal: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let listener = tokio::spawn(async move {
            signal.await;
            info!("interrupt received; cancelling request");
            child.cancel();
        });
        Self { token, listener }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Interrupt {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn signal_cancels_token() {
        let (tx, rx) = oneshot::channel::<()>();
        let interrupt = Interrupt::on(async {
            let _ = rx.await;
        });
        assert!(!interrupt.token().is_cancelled());

        tx.send(()).unwrap();
        interrupt.token().cancelled().await;
    }

    #[tokio::test]
    async fn dropped_guard_ignores_later_signal() {
        let (tx, rx) = oneshot::channel::<()>();
        let interrupt = Interrupt::on(async {
            let _ = rx.await;
        });
        let token = interrupt.token().clone();
        drop(interrupt);
        for _ in 0..10 {
            if tx.is_closed() {
                break;
            }
            tokio::task::yield_now().await;
        }

        // the listener is gone, so the receiver was dropped with it
        assert!(tx.send(()).is_err());
        assert!(!token.is_cancelled());
    }
}
