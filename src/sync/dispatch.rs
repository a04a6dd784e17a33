//! Per-client outbound delivery with two priority tiers
//!
//! Messages and events go through an unbounded FIFO: they are delivered in
//! order, exactly once, and never dropped. State diffs go through a watch
//! slot that only keeps the newest value, and are released to the socket
//! no faster than the movement sync rate. A slow client therefore only
//! delays its own diffs and never applies backpressure to the session.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use uuid::Uuid;

use crate::util::time::movement_sync_interval;
use crate::ws::protocol::ServerMsg;

use super::diff::StateDiff;

/// Next thing to write to a client socket
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Always sent immediately, in causal order
    Message(ServerMsg),
    /// Throttled and coalesced, last value wins
    Diff(Arc<StateDiff>),
}

/// Sending half of one client connection, held by whoever needs to talk to
/// that client (the socket reader, the queue, the session).
#[derive(Clone)]
pub struct ClientLink {
    /// Connection identity, distinct across reconnects of the same user
    pub id: Uuid,
    events: mpsc::UnboundedSender<ServerMsg>,
    diffs: Arc<watch::Sender<Option<Arc<StateDiff>>>>,
}

impl std::fmt::Debug for ClientLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientLink").field("id", &self.id).finish()
    }
}

impl ClientLink {
    /// New link plus the feed the connection's writer task drains
    pub fn channel() -> (Self, ClientFeed) {
        Self::with_interval(movement_sync_interval())
    }

    pub fn with_interval(min_diff_interval: Duration) -> (Self, ClientFeed) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (diffs_tx, diffs_rx) = watch::channel(None);

        let link = Self {
            id: Uuid::new_v4(),
            events: events_tx,
            diffs: Arc::new(diffs_tx),
        };
        let feed = ClientFeed {
            events: events_rx,
            diffs: diffs_rx,
            diffs_open: true,
            diff_pending: false,
            min_diff_interval,
            next_diff_at: Instant::now(),
        };
        (link, feed)
    }

    /// Queue a critical message; false once the connection is gone
    pub fn send(&self, msg: ServerMsg) -> bool {
        self.events.send(msg).is_ok()
    }

    /// Replace the pending diff; false once the connection is gone
    pub fn offer_diff(&self, diff: Arc<StateDiff>) -> bool {
        self.diffs.send(Some(diff)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Receiving half of a client connection
pub struct ClientFeed {
    events: mpsc::UnboundedReceiver<ServerMsg>,
    diffs: watch::Receiver<Option<Arc<StateDiff>>>,
    diffs_open: bool,
    diff_pending: bool,
    min_diff_interval: Duration,
    next_diff_at: Instant,
}

impl ClientFeed {
    /// Pop a queued critical message without waiting
    pub fn try_message(&mut self) -> Option<ServerMsg> {
        self.events.try_recv().ok()
    }

    /// Newest diff offered so far, ignoring the throttle
    pub fn latest_diff(&self) -> Option<Arc<StateDiff>> {
        self.diffs.borrow().clone()
    }

    /// Wait for the next outbound item. Pending critical messages always
    /// go first. Returns None once every link clone has been dropped.
    pub async fn next(&mut self) -> Option<Outbound> {
        loop {
            if self.diff_pending {
                tokio::select! {
                    biased;
                    msg = self.events.recv() => return msg.map(Outbound::Message),
                    _ = tokio::time::sleep_until(self.next_diff_at) => {
                        self.diff_pending = false;
                        let latest = self.diffs.borrow_and_update().clone();
                        if let Some(diff) = latest {
                            self.next_diff_at = Instant::now() + self.min_diff_interval;
                            return Some(Outbound::Diff(diff));
                        }
                    }
                }
            } else {
                tokio::select! {
                    biased;
                    msg = self.events.recv() => return msg.map(Outbound::Message),
                    changed = self.diffs.changed(), if self.diffs_open => {
                        match changed {
                            Ok(()) => self.diff_pending = true,
                            Err(_) => self.diffs_open = false,
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(version: u64) -> Arc<StateDiff> {
        Arc::new(StateDiff {
            version,
            baseline_version: 0,
            tick: version,
            entities_changed: Vec::new(),
            entities_removed: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_critical_messages_go_first() {
        let (link, mut feed) = ClientLink::channel();
        link.offer_diff(diff(1));
        link.send(ServerMsg::Pong { t: 1 });
        link.send(ServerMsg::Pong { t: 2 });

        assert!(matches!(feed.next().await, Some(Outbound::Message(ServerMsg::Pong { t: 1 }))));
        assert!(matches!(feed.next().await, Some(Outbound::Message(ServerMsg::Pong { t: 2 }))));
        match feed.next().await {
            Some(Outbound::Diff(d)) => assert_eq!(d.version, 1),
            other => panic!("expected diff, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_diffs_coalesce_within_interval() {
        let (link, mut feed) = ClientLink::with_interval(Duration::from_millis(50));
        link.offer_diff(diff(1));
        match feed.next().await {
            Some(Outbound::Diff(d)) => assert_eq!(d.version, 1),
            other => panic!("expected diff, got {other:?}"),
        }

        // Three ticks land inside one throttle window
        link.offer_diff(diff(2));
        link.offer_diff(diff(3));
        link.offer_diff(diff(4));

        let before = Instant::now();
        match feed.next().await {
            Some(Outbound::Diff(d)) => assert_eq!(d.version, 4),
            other => panic!("expected diff, got {other:?}"),
        }
        assert!(Instant::now() - before >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_preempts_throttled_diff() {
        let (link, mut feed) = ClientLink::with_interval(Duration::from_millis(50));
        link.offer_diff(diff(1));
        feed.next().await;

        link.offer_diff(diff(2));
        let sender = link.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sender.send(ServerMsg::MatchStarted { tick: 3 });
        });

        assert!(matches!(
            feed.next().await,
            Some(Outbound::Message(ServerMsg::MatchStarted { tick: 3 }))
        ));
        match feed.next().await {
            Some(Outbound::Diff(d)) => assert_eq!(d.version, 2),
            other => panic!("expected diff, got {other:?}"),
        }
    }

    #[test]
    fn test_idle_feed_is_pending() {
        let (link, mut feed) = ClientLink::channel();
        let mut next = tokio_test::task::spawn(feed.next());
        tokio_test::assert_pending!(next.poll());

        link.send(ServerMsg::Pong { t: 9 });
        assert!(next.is_woken());
    }

    #[tokio::test]
    async fn test_feed_ends_when_links_drop() {
        let (link, mut feed) = ClientLink::channel();
        link.send(ServerMsg::QueueCancelled);
        drop(link);

        assert!(matches!(feed.next().await, Some(Outbound::Message(ServerMsg::QueueCancelled))));
        assert!(feed.next().await.is_none());
    }
}
