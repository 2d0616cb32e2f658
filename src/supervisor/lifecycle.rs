//! Process lifecycle shared by the supervisor and the transports

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Running,
    Draining,
    Stopped,
}

/// Cloneable handle onto the process lifecycle
///
/// Only moves forward: `Running → Draining → Stopped`.
#[derive(Clone, Debug)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Running);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Ask everything to wind down. Returns false if already draining or stopped.
    pub fn begin_drain(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == LifecycleState::Running {
                *state = LifecycleState::Draining;
                true
            } else {
                false
            }
        })
    }

    pub fn stop(&self) {
        self.tx.send_replace(LifecycleState::Stopped);
    }

    /// Resolves once the lifecycle has left `Running`
    pub async fn draining(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|state| *state != LifecycleState::Running).await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_lifecycle_only_moves_forward() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.is_running());
        assert!(lifecycle.begin_drain());
        assert!(!lifecycle.begin_drain());
        assert_eq!(lifecycle.state(), LifecycleState::Draining);

        lifecycle.stop();
        assert!(!lifecycle.begin_drain());
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_draining_wakes_waiters() {
        let lifecycle = Lifecycle::new();
        let waiter = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.draining().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        lifecycle.begin_drain();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }
}
