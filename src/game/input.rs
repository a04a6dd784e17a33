//! Inbound session events and the per-player input queue

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::sync::dispatch::ClientLink;
use crate::ws::protocol::{ClientMsg, InputAction};

use super::grid::Direction;
use super::session::SessionError;

/// Default per-player queue depth (about two seconds of 30 Hz input)
pub const DEFAULT_INPUT_CAPACITY: usize = 64;

/// Something a player (or their connection) did between two ticks
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Ready,
    /// Hold a direction, or stop on None
    Move(Option<Direction>),
    PlaceBomb,
    Ack(u64),
    Leave,
    /// A (re)connected socket for this player
    Attach(ClientLink),
    /// The socket identified by `connection` went away
    Disconnected { connection: Uuid },
}

impl SessionEvent {
    /// Inputs that may be shed under backpressure
    pub fn is_droppable(&self) -> bool {
        matches!(self, SessionEvent::Move(_) | SessionEvent::Ack(_))
    }

    /// Connection lifecycle events bypass the capacity limit
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            SessionEvent::Leave | SessionEvent::Attach(_) | SessionEvent::Disconnected { .. }
        )
    }
}

impl TryFrom<ClientMsg> for SessionEvent {
    type Error = SessionError;

    fn try_from(msg: ClientMsg) -> Result<Self, Self::Error> {
        match msg {
            ClientMsg::Ready => Ok(SessionEvent::Ready),
            ClientMsg::Input {
                action: InputAction::Move,
                direction,
                ..
            } => Ok(SessionEvent::Move(direction)),
            ClientMsg::Input {
                action: InputAction::PlaceBomb,
                ..
            } => Ok(SessionEvent::PlaceBomb),
            ClientMsg::Ack { version } => Ok(SessionEvent::Ack(version)),
            ClientMsg::Leave => Ok(SessionEvent::Leave),
            ClientMsg::Join { .. } | ClientMsg::Cancel | ClientMsg::Ping { .. } => Err(
                SessionError::InvalidInput("not a session message".to_string()),
            ),
        }
    }
}

/// Player input received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub user_id: Uuid,
    pub event: SessionEvent,
    pub tick_hint: Option<u64>,
    pub received_at: u64,
}

#[derive(Debug)]
struct QueueInner {
    items: VecDeque<PlayerInput>,
    capacity: usize,
    closed: bool,
}

/// Bounded queue between one connection's reader and the session tick.
/// Producers never block; the session drains it once per tick.
#[derive(Debug, Clone)]
pub struct InputQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl InputQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity.min(256)),
                capacity: capacity.max(1),
                closed: false,
            })),
        }
    }

    /// Queue an input. When full, the oldest droppable input is evicted to
    /// make room; a droppable input with nothing to evict is itself dropped
    /// (returns Ok(false)).
    pub fn push(&self, input: PlayerInput) -> Result<bool, SessionError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SessionError::SessionClosed);
        }

        if inner.items.len() >= inner.capacity && !input.event.is_control() {
            match inner.items.iter().position(|i| i.event.is_droppable()) {
                Some(oldest) => {
                    inner.items.remove(oldest);
                }
                None if input.event.is_droppable() => return Ok(false),
                None => {
                    return Err(SessionError::InvalidInput("input queue is full".to_string()));
                }
            }
        }

        inner.items.push_back(input);
        Ok(true)
    }

    /// Take everything queued since the last drain
    pub fn drain(&self) -> Vec<PlayerInput> {
        self.inner.lock().items.drain(..).collect()
    }

    /// Reject all further input and discard what is pending
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.items.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
