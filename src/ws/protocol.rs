//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::entity::EntityId;
use crate::game::grid::{Cell, Direction, Grid};
use crate::sync::diff::StateDiff;

/// Kind of in-session input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputAction {
    /// Hold a direction, or stop when no direction is given
    Move,
    PlaceBomb,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Authenticate and enter matchmaking (or rejoin a running session)
    Join {
        /// Identity token issued by the auth service
        token: String,
    },

    /// Ready to start once the session has been created
    Ready,

    /// Gameplay input, applied on the next tick
    Input {
        action: InputAction,
        #[serde(default)]
        direction: Option<Direction>,
        /// Client's estimate of the server tick, informational only
        #[serde(default)]
        tick_hint: Option<u64>,
    },

    /// Highest snapshot version the client has applied
    Ack { version: u64 },

    /// Leave the matchmaking queue
    Cancel,

    /// Leave the current session (forfeits a running match)
    Leave,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { server_time: u64 },

    /// Waiting in the matchmaking queue
    Queued {
        ticket: Uuid,
        /// 1-based position in the queue
        position: usize,
        queue_size: usize,
        estimated_wait_secs: u32,
    },

    QueueCancelled,

    /// Paired with an opponent; the session waits for both to be ready
    SessionStarted {
        session_id: Uuid,
        your_identity: Uuid,
        opponent_identity: Uuid,
        spawn_cell: Cell,
        /// Map layout as of sending
        grid: Grid,
        tick_rate: u32,
    },

    /// Both players ready, simulation is running
    MatchStarted { tick: u64 },

    /// High-priority gameplay event, never throttled
    Event(GameEvent),

    /// Terminal result, sent even on forfeit
    MatchEnded {
        winner_identity: Option<Uuid>,
        summary: MatchSummary,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Why a player died
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Blast,
    /// Left the match or never came back after disconnecting
    Forfeit,
}

/// Gameplay events (explosions, deaths, block destruction)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEvent {
    Explosion {
        explosion_id: EntityId,
        bomb_id: EntityId,
        owner: Uuid,
        origin: Cell,
        cells: Vec<Cell>,
        tick: u64,
    },

    Death {
        victim: Uuid,
        /// Bomb owner for blast deaths (may equal the victim)
        killer: Option<Uuid>,
        cause: DeathCause,
        tick: u64,
    },

    Destruction { cells: Vec<Cell>, tick: u64 },
}

/// How a match came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Exactly one player left alive
    LastStanding,
    /// The opponent left or did not reconnect in time
    Forfeit,
    /// Nobody survived
    Draw,
    /// Match-duration ceiling reached, no winner
    DurationCeiling,
}

/// Terminal summary, sent to both clients and handed to persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub session_id: Uuid,
    pub winner: Option<Uuid>,
    pub reason: EndReason,
    pub duration_ticks: u64,
    pub duration_secs: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub user_id: Uuid,
    pub bombs_placed: u32,
    pub players_killed: u32,
    pub is_winner: bool,
}

/// JSON text form of a state diff, tagged like every other server message
#[derive(Serialize)]
struct TaggedDiff<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    diff: &'a StateDiff,
}

pub fn diff_json(diff: &StateDiff) -> serde_json::Result<String> {
    serde_json::to_string(&TaggedDiff {
        kind: "state_diff",
        diff,
    })
}
