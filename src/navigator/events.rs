use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use super::backfill::BackfillEvent;

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel shared by publishers and any number of optional subscribers.
///
/// Publishing with nobody listening is not an error.
#[derive(Clone)]
pub struct EventBus<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<T: Clone> EventBus<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: T) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }
}

/// Everything already queued on `rx`, without waiting. Lagged gaps are skipped.
pub fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    out
}

/// State changes elsewhere in the console that the navigator may react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppSignal {
    VaultLocked,
    VaultUnlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

/// Operator-facing message; `ttl` of `None` keeps it until replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub ttl: Option<Duration>,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Notice { level: NoticeLevel::Info, text: text.into(), ttl: None }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Notice { level: NoticeLevel::Warn, text: text.into(), ttl: None }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notice { level: NoticeLevel::Error, text: text.into(), ttl: None }
    }

    pub fn expiring(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigatorEvent {
    Notice(Notice),
    QuotaChanged { limited: bool },
    Backfill(BackfillEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let bus: EventBus<AppSignal> = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(AppSignal::VaultLocked);
        assert_eq!(a.recv().await.unwrap(), AppSignal::VaultLocked);
        assert_eq!(b.recv().await.unwrap(), AppSignal::VaultLocked);
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus: EventBus<NavigatorEvent> = EventBus::new(0);
        bus.publish(NavigatorEvent::QuotaChanged { limited: true });
    }
}
