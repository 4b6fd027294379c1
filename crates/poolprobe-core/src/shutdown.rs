//! Process shutdown signalling
//!
//! The outcome lives in a shared slot, the channel only wakes the main task.
//! Posting never blocks. A pending `Requested` is upgraded by a later
//! `Fatal`; every other later post is dropped.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Why the process is going down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    /// `/stop` was requested
    Requested,
    /// Unrecoverable error (profiling I/O, dead accept loop)
    Fatal(String),
}

impl Shutdown {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            Shutdown::Requested => 0,
            Shutdown::Fatal(_) => 1,
        }
    }

    pub fn is_graceful(&self) -> bool {
        matches!(self, Shutdown::Requested)
    }
}

/// Sending half, cloned into every component that may stop the process
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    outcome: Arc<Mutex<Option<Shutdown>>>,
    wake: mpsc::Sender<()>,
}

/// Receiving half, owned by the main task
#[derive(Debug)]
pub struct ShutdownListener {
    outcome: Arc<Mutex<Option<Shutdown>>>,
    wake: mpsc::Receiver<()>,
}

/// Create a connected signal/listener pair
pub fn channel() -> (ShutdownSignal, ShutdownListener) {
    let outcome = Arc::new(Mutex::new(None));
    let (tx, rx) = mpsc::channel(1);
    (
        ShutdownSignal {
            outcome: outcome.clone(),
            wake: tx,
        },
        ShutdownListener { outcome, wake: rx },
    )
}

impl ShutdownSignal {
    /// Post a shutdown request. Returns false if it was dropped because an
    /// equal or stronger outcome is already pending.
    pub fn trigger(&self, reason: Shutdown) -> bool {
        let mut outcome = self.outcome.lock();
        match (&*outcome, &reason) {
            (None, _) => {
                *outcome = Some(reason);
                // The slot is empty only before the first post, so the wake-up
                // buffer is free; a closed listener has nothing left to wake
                let _ = self.wake.try_send(());
                true
            }
            (Some(Shutdown::Requested), Shutdown::Fatal(_)) => {
                *outcome = Some(reason);
                true
            }
            _ => false,
        }
    }
}

impl ShutdownListener {
    /// Wait for a posted signal and return the strongest outcome seen
    pub async fn wait(&mut self) -> Shutdown {
        // An empty slot here means every sender dropped without posting
        let _ = self.wake.recv().await;
        self.outcome
            .lock()
            .clone()
            .unwrap_or_else(|| Shutdown::Fatal("shutdown channel closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_signal_wins() {
        let (signal, mut listener) = channel();
        assert!(signal.trigger(Shutdown::Fatal("first".to_string())));
        assert!(!signal.trigger(Shutdown::Fatal("second".to_string())));
        assert!(!signal.trigger(Shutdown::Requested));
        assert_eq!(listener.wait().await, Shutdown::Fatal("first".to_string()));
    }

    #[tokio::test]
    async fn test_fatal_overrides_pending_stop() {
        let (signal, mut listener) = channel();
        assert!(signal.trigger(Shutdown::Requested));
        assert!(signal.trigger(Shutdown::Fatal("late".to_string())));
        assert!(!signal.trigger(Shutdown::Requested));
        assert_eq!(listener.wait().await.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_senders_never_block() {
        let (signal, mut listener) = channel();
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.trigger(Shutdown::Requested) })
            })
            .collect();

        let mut delivered = 0;
        for task in tasks {
            if task.await.unwrap() {
                delivered += 1;
            }
        }
        assert_eq!(delivered, 1);
        assert!(listener.wait().await.is_graceful());
    }

    #[tokio::test]
    async fn test_closed_channel_is_fatal() {
        let (signal, mut listener) = channel();
        drop(signal);
        assert_eq!(listener.wait().await.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Shutdown::Requested.exit_code(), 0);
        assert_eq!(Shutdown::Fatal("x".to_string()).exit_code(), 1);
    }
}
