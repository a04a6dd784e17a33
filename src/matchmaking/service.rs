//! Matchmaking service - manages the queue and session creation

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::{GameSession, SessionConfig, SessionRegistry};
use crate::sync::dispatch::ClientLink;
use crate::ws::protocol::{MatchSummary, ServerMsg};

use super::queue::{estimate_wait_secs, MatchmakingQueue, QueueError, QueueTicket, QueuedPlayer};

/// How often queued players get a status update
const STATUS_INTERVAL_SECS: u64 = 1;

/// Where a player currently stands
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MatchmakingStatus {
    pub queued: bool,
    pub position: Option<usize>,
    pub queue_size: usize,
    pub estimated_wait_secs: Option<u32>,
    pub session_id: Option<Uuid>,
}

/// Matchmaking service
#[derive(Clone)]
pub struct MatchmakingService {
    queue: Arc<Mutex<MatchmakingQueue>>,
    registry: Arc<SessionRegistry>,
    session_config: SessionConfig,
    summary_tx: mpsc::UnboundedSender<MatchSummary>,
}

impl MatchmakingService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        session_config: SessionConfig,
        summary_tx: mpsc::UnboundedSender<MatchSummary>,
    ) -> Self {
        Self {
            queue: Arc::new(Mutex::new(MatchmakingQueue::new())),
            registry,
            session_config,
            summary_tx,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Queue a player. If this makes a pair, the session is created right
    /// away and both players receive `session_started`.
    pub async fn enqueue(&self, user_id: Uuid, link: ClientLink) -> Result<QueueTicket, QueueError> {
        if self.registry.contains_player(user_id) {
            return Err(QueueError::AlreadyInSession);
        }

        let (ticket, pair) = {
            let mut queue = self.queue.lock().await;
            let ticket = queue.enqueue(user_id, link.clone())?;
            let position = queue.position(user_id).unwrap_or(queue.len());
            info!(user_id = %user_id, queue_size = queue.len(), "Player joined matchmaking queue");

            link.send(ServerMsg::Queued {
                ticket: ticket.id,
                position,
                queue_size: queue.len(),
                estimated_wait_secs: estimate_wait_secs(position),
            });
            (ticket, queue.take_pair())
        };

        if let Some(pair) = pair {
            self.start_session(pair);
        }
        Ok(ticket)
    }

    /// Withdraw a ticket and confirm to the player
    pub async fn cancel(&self, ticket: QueueTicket) -> Result<(), QueueError> {
        let player = self.queue.lock().await.cancel(ticket.id)?;
        player.link.send(ServerMsg::QueueCancelled);
        info!(user_id = %ticket.user_id, "Player left matchmaking queue");
        Ok(())
    }

    /// Create a session for a pair and spawn its tick loop
    fn start_session(&self, pair: [QueuedPlayer; 2]) -> Uuid {
        let session_id = Uuid::new_v4();
        let seed = rand::random::<u64>();
        let [first, second] = pair;
        let waited_ms = first.wait_time().as_millis() as u64;

        let (session, handle) = GameSession::new(
            session_id,
            [(first.user_id(), first.link), (second.user_id(), second.link)],
            seed,
            self.session_config.clone(),
            self.summary_tx.clone(),
        );
        self.registry.insert(handle);

        info!(
            session_id = %session_id,
            first = %first.ticket.user_id,
            second = %second.ticket.user_id,
            waited_ms,
            "Created new session"
        );

        let registry = self.registry.clone();
        tokio::spawn(async move {
            session.run().await;
            registry.remove(&session_id);
            info!(session_id = %session_id, "Session removed from registry");
        });

        session_id
    }

    /// Periodic queue upkeep: prune dead connections, pair whoever is
    /// left, and send everyone still waiting a status update
    pub async fn run(&self) {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(STATUS_INTERVAL_SECS));

        loop {
            interval.tick().await;

            let pairs = {
                let mut queue = self.queue.lock().await;

                for gone in queue.prune_disconnected() {
                    warn!(user_id = %gone.user_id(), "Dropping queue entry with closed connection");
                }

                let mut pairs = Vec::new();
                while let Some(pair) = queue.take_pair() {
                    pairs.push(pair);
                }

                let queue_size = queue.len();
                for (i, player) in queue.iter().enumerate() {
                    let position = i + 1;
                    player.link.send(ServerMsg::Queued {
                        ticket: player.ticket.id,
                        position,
                        queue_size,
                        estimated_wait_secs: estimate_wait_secs(position),
                    });
                }
                if queue_size > 0 {
                    debug!(queue_size, "Sent queue status updates");
                }
                pairs
            };

            for pair in pairs {
                self.start_session(pair);
            }
        }
    }

    /// Get current queue size
    pub async fn queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// 1-based queue position of a player
    pub async fn position(&self, user_id: Uuid) -> Option<usize> {
        self.queue.lock().await.position(user_id)
    }

    pub async fn status(&self, user_id: Uuid) -> MatchmakingStatus {
        let queue = self.queue.lock().await;
        let position = queue.position(user_id);
        MatchmakingStatus {
            queued: position.is_some(),
            position,
            queue_size: queue.len(),
            estimated_wait_secs: position.map(estimate_wait_secs),
            session_id: self.registry.session_for(user_id).map(|s| s.id),
        }
    }
}
