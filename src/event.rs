//! Typed pub/sub buses for pane coordination.
//!
//! Two closed event unions replace ad-hoc string events: [`GlobalEvent`]
//! crosses pane boundaries (every open pane subscribes and reconciles its
//! own state), [`PaneEvent`] stays within one pane. Panes never share
//! mutable state directly — coordination happens only through these events.

use std::time::{Duration, Instant};

use log::warn;
use tokio::sync::broadcast;

use crate::fs::node::FileNode;

/// Cross-pane events. Scoped by `loc` (the source/destination directory) so
/// receivers can ignore events for directories they are not showing.
#[derive(Debug, Clone)]
pub enum GlobalEvent {
    /// Files were removed (deleted or moved away) from `loc`.
    RemoveFiles { paths: Vec<String>, loc: String },
    /// Files appeared (copied or moved in) under `loc`.
    AddFiles { files: Vec<FileNode>, loc: String },
}

/// Pane-local events.
#[derive(Debug, Clone)]
pub enum PaneEvent {
    /// The viewport wants more data; run the fill loop.
    LoadNextDir,
    /// Re-list the current view.
    Refresh,
    /// Select every rendered item.
    SelectAll,
    /// Reset the scroll position to the top.
    ScrollToTop,
    /// The visible window (plus overscan) changed; batch-fetch metadata.
    ViewableAreaChange {
        files: Vec<FileNode>,
        start_idx: usize,
    },
}

const BUS_CAPACITY: usize = 256;

/// Broadcast bus for one event union. Emitting with no subscribers is fine;
/// slow subscribers that lag are skipped forward with a warning.
#[derive(Debug, Clone)]
pub struct EventBus<E: Clone> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: E) {
        // send only fails when there are no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> EventReceiver<E> {
        EventReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving end of an [`EventBus`]. Panes drain it explicitly from their
/// update loop rather than spawning per-event tasks.
pub struct EventReceiver<E: Clone> {
    rx: broadcast::Receiver<E>,
}

impl<E: Clone> EventReceiver<E> {
    /// Drain all queued events without blocking.
    pub fn try_drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(e) => events.push(e),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("event receiver lagged, {} events dropped", n);
                }
                Err(_) => break,
            }
        }
        events
    }

    /// Wait for the next event (test helper and task-driven consumers).
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.rx.recv().await {
                Ok(e) => return Some(e),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("event receiver lagged, {} events dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Leading-edge debounce: the first call fires, further calls within the
/// window are suppressed.
#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Whether the caller should act now. Updates the window on `true`.
    pub fn should_fire(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Forget the last firing so the next call fires immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_without_subscribers_is_ok() {
        let bus: EventBus<PaneEvent> = EventBus::new();
        bus.emit(PaneEvent::Refresh);
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus: EventBus<GlobalEvent> = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(GlobalEvent::RemoveFiles {
            paths: vec!["/a/x.png".into()],
            loc: "/a".into(),
        });
        let events = rx.try_drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], GlobalEvent::RemoveFiles { loc, .. } if loc == "/a"));
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let bus: EventBus<PaneEvent> = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.emit(PaneEvent::SelectAll);
        assert_eq!(a.try_drain().len(), 1);
        assert_eq!(b.try_drain().len(), 1);
    }

    #[tokio::test]
    async fn subscription_starts_after_past_events() {
        let bus: EventBus<PaneEvent> = EventBus::new();
        bus.emit(PaneEvent::Refresh);
        let mut rx = bus.subscribe();
        assert!(rx.try_drain().is_empty());
    }

    #[test]
    fn debounce_suppresses_within_window() {
        let mut d = Debounce::new(Duration::from_secs(60));
        assert!(d.should_fire());
        assert!(!d.should_fire());
        d.reset();
        assert!(d.should_fire());
    }

    #[test]
    fn debounce_zero_window_always_fires() {
        let mut d = Debounce::new(Duration::ZERO);
        assert!(d.should_fire());
        assert!(d.should_fire());
    }
}
