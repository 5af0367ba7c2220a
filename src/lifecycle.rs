//! Host application lifecycle signals.
//!
//! The embedding app forwards its foreground/background transitions here;
//! interested components subscribe to react, e.g. flushing queued events
//! when the app is about to be suspended.

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    DidEnterBackground,
    WillEnterForeground,
}

pub struct AppLifecycle {
    event_tx: broadcast::Sender<LifecycleEvent>,
}

impl AppLifecycle {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self { event_tx }
    }

    pub fn did_enter_background(&self) {
        tracing::debug!("App entered background");
        let _ = self.event_tx.send(LifecycleEvent::DidEnterBackground);
    }

    pub fn will_enter_foreground(&self) {
        tracing::debug!("App will enter foreground");
        let _ = self.event_tx.send(LifecycleEvent::WillEnterForeground);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_tx.subscribe()
    }
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_transitions() {
        let lifecycle = AppLifecycle::new();
        let mut rx = lifecycle.subscribe();

        lifecycle.did_enter_background();
        lifecycle.will_enter_foreground();

        assert_eq!(rx.recv().await.unwrap(), LifecycleEvent::DidEnterBackground);
        assert_eq!(rx.recv().await.unwrap(), LifecycleEvent::WillEnterForeground);
    }

    #[tokio::test]
    async fn test_send_without_subscribers_is_harmless() {
        let lifecycle = AppLifecycle::new();
        lifecycle.did_enter_background();
    }
}
