//! Cooperative stop signal shared by the scheduler, retries and the server.

use std::time::Duration;

use tokio::sync::watch;

/// The sending half. Triggering it stops every [`StopSignal`] cloned from it.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// The receiving half, checked between cycles and raced against sleeps.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Create a linked shutdown trigger and stop signal.
    pub fn new() -> (Self, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, StopSignal { rx })
    }

    /// Request a stop. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal linked to this trigger.
    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl StopSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// True once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when a stop is requested. Pends forever if the trigger was
    /// dropped without firing.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration` unless stopped first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if interrupted.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.stopped() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn trigger_interrupts_sleep() {
        let (shutdown, stop) = Shutdown::new();
        let sleeper = tokio::spawn(async move { stop.sleep(Duration::from_secs(30)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        let completed = tokio::time::timeout(Duration::from_secs(2), sleeper)
            .await
            .unwrap()
            .unwrap();
        assert!(!completed);
    }

    #[tokio::test]
    async fn sleep_completes_without_trigger() {
        let (_shutdown, stop) = Shutdown::new();
        let start = Instant::now();
        assert!(stop.sleep(Duration::from_millis(10)).await);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn already_stopped_returns_immediately() {
        let (shutdown, stop) = Shutdown::new();
        shutdown.trigger();
        assert!(stop.is_stopped());
        assert!(!stop.sleep(Duration::from_secs(30)).await);
        stop.stopped().await;
    }

    #[tokio::test]
    async fn linked_signals_all_fire() {
        let (shutdown, first) = Shutdown::new();
        let second = shutdown.signal();
        let third = first.clone();

        shutdown.trigger();
        assert!(first.is_stopped());
        assert!(second.is_stopped());
        assert!(third.is_stopped());
    }

    #[tokio::test]
    async fn never_does_not_fire() {
        let stop = StopSignal::never();
        assert!(!stop.is_stopped());
        assert!(stop.sleep(Duration::from_millis(5)).await);
    }
}
