//! Tokio-backed reconnect timer.
//!
//! [`TokioTimer`] implements [`Timer`] by spawning a sleep task per arming.
//! Expired tokens are delivered over an unbounded channel to the loop that
//! owns the connection, which passes them to `on_reconnect_timer`.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::core::{Timer, TimerToken};

/// [`Timer`] backed by `tokio::time::sleep`.
///
/// Must be armed from within a tokio runtime.
#[derive(Debug)]
pub struct TokioTimer {
    fired: mpsc::UnboundedSender<TimerToken>,
    pending: Option<JoinHandle<()>>,
}

impl TokioTimer {
    /// Create a timer and the receiver its expirations are delivered on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerToken>) {
        let (fired, rx) = mpsc::unbounded_channel();
        (
            Self {
                fired,
                pending: None,
            },
            rx,
        )
    }

    /// Whether an arming is still waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Timer for TokioTimer {
    fn arm(&mut self, timeout: Duration, token: TimerToken) {
        self.cancel();
        let fired = self.fired.clone();
        trace!(?timeout, token = token.0, "timer armed");
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // Receiver gone means the owning loop shut down
            let _ = fired.send(token);
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_timeout() {
        let (mut timer, mut rx) = TokioTimer::new();
        timer.arm(Duration::from_millis(1000), TimerToken(3));
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.recv().await, Some(TimerToken(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_delivery() {
        let (mut timer, mut rx) = TokioTimer::new();
        timer.arm(Duration::from_millis(500), TimerToken(1));
        timer.cancel();
        assert!(!timer.is_pending());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending() {
        let (mut timer, mut rx) = TokioTimer::new();
        timer.arm(Duration::from_millis(500), TimerToken(1));
        timer.arm(Duration::from_millis(800), TimerToken(2));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.recv().await, Some(TimerToken(2)));
        assert!(rx.try_recv().is_err());
    }
}
