//! Matchmaking queue implementation

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::sync::dispatch::ClientLink;

/// Seconds of expected wait per pair ahead in the queue
const WAIT_SECS_PER_PAIR: u32 = 5;

/// Receipt for a queued identity, needed to cancel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTicket {
    pub id: Uuid,
    pub user_id: Uuid,
}

/// Player in the matchmaking queue
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub ticket: QueueTicket,
    /// Connection that queued, handed to the session on pairing
    pub link: ClientLink,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn user_id(&self) -> Uuid {
        self.ticket.user_id
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("already waiting in the matchmaking queue")]
    AlreadyQueued,

    #[error("already playing in a session")]
    AlreadyInSession,

    #[error("no such queue ticket")]
    UnknownTicket,
}

impl QueueError {
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::AlreadyQueued => "already_queued",
            QueueError::AlreadyInSession => "already_in_session",
            QueueError::UnknownTicket => "unknown_ticket",
        }
    }
}

/// FIFO of identities waiting for an opponent
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queue: VecDeque<QueuedPlayer>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player to the back of the queue. An entry whose connection has
    /// already gone away is replaced instead of rejected.
    pub fn enqueue(&mut self, user_id: Uuid, link: ClientLink) -> Result<QueueTicket, QueueError> {
        if let Some(pos) = self.queue.iter().position(|p| p.user_id() == user_id) {
            if !self.queue[pos].link.is_closed() {
                return Err(QueueError::AlreadyQueued);
            }
            self.queue.remove(pos);
        }

        let ticket = QueueTicket {
            id: Uuid::new_v4(),
            user_id,
        };
        self.queue.push_back(QueuedPlayer {
            ticket,
            link,
            queued_at: Instant::now(),
        });
        Ok(ticket)
    }

    /// Withdraw a ticket
    pub fn cancel(&mut self, ticket_id: Uuid) -> Result<QueuedPlayer, QueueError> {
        let pos = self
            .queue
            .iter()
            .position(|p| p.ticket.id == ticket_id)
            .ok_or(QueueError::UnknownTicket)?;
        self.queue.remove(pos).ok_or(QueueError::UnknownTicket)
    }

    /// Dequeue the two longest-waiting players
    pub fn take_pair(&mut self) -> Option<[QueuedPlayer; 2]> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some([first, second])
    }

    /// Drop entries whose connection has closed
    pub fn prune_disconnected(&mut self) -> Vec<QueuedPlayer> {
        let (gone, live): (Vec<_>, Vec<_>) =
            self.queue.drain(..).partition(|p| p.link.is_closed());
        self.queue = live.into();
        gone
    }

    /// 1-based position of a player in the queue
    pub fn position(&self, user_id: Uuid) -> Option<usize> {
        self.queue
            .iter()
            .position(|p| p.user_id() == user_id)
            .map(|i| i + 1)
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.queue.iter().any(|p| p.user_id() == user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedPlayer> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Rough wait estimate for a 1-based queue position
pub fn estimate_wait_secs(position: usize) -> u32 {
    (position / 2) as u32 * WAIT_SECS_PER_PAIR
}
