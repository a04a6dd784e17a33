//! Session lifecycle and the authoritative tick loop

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::sync::dispatch::ClientLink;
use crate::sync::snapshot::capture;
use crate::sync::Synchronizer;
use crate::util::time::{secs_to_ticks, tick_duration, ticks_to_secs, unix_millis, SIMULATION_TPS};
use crate::ws::protocol::{
    DeathCause, EndReason, GameEvent, MatchSummary, PlayerSummary, ServerMsg,
};

use super::grid::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use super::input::{InputQueue, PlayerInput, SessionEvent, DEFAULT_INPUT_CAPACITY};
use super::simulation;
use super::state::{ArenaState, Rules};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("players did not get ready in time")]
    SetupTimeout,

    #[error("session is closed")]
    SessionClosed,

    #[error("player disconnected")]
    Disconnected,
}

impl SessionError {
    /// Error code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidInput(_) => "invalid_input",
            SessionError::SetupTimeout => "setup_timeout",
            SessionError::SessionClosed => "session_closed",
            SessionError::Disconnected => "disconnected",
        }
    }
}

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, waiting for both players to be connected and ready
    WaitingForPlayers,
    /// Simulation in progress
    Running,
    /// Outcome decided, summary being emitted
    Ending,
    /// Terminal; all input is rejected
    Closed,
}

/// Timings and limits for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub rules: Rules,
    pub width: i32,
    pub height: i32,
    pub setup_timeout_ticks: u64,
    pub reconnect_grace_ticks: u64,
    pub max_duration_ticks: u64,
    pub input_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rules: Rules::default(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            setup_timeout_ticks: secs_to_ticks(30.0) as u64,
            reconnect_grace_ticks: secs_to_ticks(10.0) as u64,
            max_duration_ticks: secs_to_ticks(180.0) as u64,
            input_capacity: DEFAULT_INPUT_CAPACITY,
        }
    }
}

/// Handle to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    /// Player ids in slot order
    pub players: [Uuid; 2],
    inputs: BTreeMap<Uuid, InputQueue>,
}

impl SessionHandle {
    /// Queue an event for the next tick. Returns Ok(false) if the event was
    /// shed under backpressure.
    pub fn submit(
        &self,
        user_id: Uuid,
        event: SessionEvent,
        tick_hint: Option<u64>,
    ) -> Result<bool, SessionError> {
        let queue = self
            .inputs
            .get(&user_id)
            .ok_or_else(|| SessionError::InvalidInput("not a member of this session".into()))?;
        queue.push(PlayerInput {
            user_id,
            event,
            tick_hint,
            received_at: unix_millis(),
        })
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.inputs.contains_key(&user_id)
    }

    pub fn opponent_of(&self, user_id: Uuid) -> Option<Uuid> {
        self.players.iter().copied().find(|p| *p != user_id)
    }
}

/// Registry of all active sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
    /// Player -> session they belong to
    by_player: DashMap<Uuid, Uuid>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            by_player: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn insert(&self, handle: SessionHandle) {
        for user_id in handle.players {
            self.by_player.insert(user_id, handle.id);
        }
        self.sessions.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        let (_, handle) = self.sessions.remove(id)?;
        for user_id in handle.players {
            self.by_player.remove_if(&user_id, |_, session_id| session_id == id);
        }
        Some(handle)
    }

    /// Session a player currently belongs to
    pub fn session_for(&self, user_id: Uuid) -> Option<SessionHandle> {
        let session_id = *self.by_player.get(&user_id)?;
        self.get(&session_id)
    }

    pub fn contains_player(&self, user_id: Uuid) -> bool {
        self.by_player.contains_key(&user_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn total_players(&self) -> usize {
        self.by_player.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative game session
pub struct GameSession {
    id: Uuid,
    phase: SessionPhase,
    config: SessionConfig,
    state: ArenaState,
    sync: Synchronizer,
    /// Input queues in slot order
    inputs: Vec<(Uuid, InputQueue)>,
    ready: BTreeSet<Uuid>,
    /// Ticks spent in WaitingForPlayers
    setup_ticks: u64,
    /// Player -> tick their connection dropped
    disconnected_at: BTreeMap<Uuid, u64>,
    forfeited: BTreeSet<Uuid>,
    outcome: Option<(Option<Uuid>, EndReason)>,
    started_at: Option<DateTime<Utc>>,
    summary_tx: mpsc::UnboundedSender<MatchSummary>,
    summary: Option<MatchSummary>,
}

impl GameSession {
    /// Create a session for two paired players and tell both about it
    pub fn new(
        id: Uuid,
        players: [(Uuid, ClientLink); 2],
        seed: u64,
        config: SessionConfig,
        summary_tx: mpsc::UnboundedSender<MatchSummary>,
    ) -> (Self, SessionHandle) {
        let ids = [players[0].0, players[1].0];
        let state = ArenaState::new(seed, config.width, config.height, ids, config.rules.clone());

        let inputs: Vec<(Uuid, InputQueue)> = ids
            .iter()
            .map(|&user_id| (user_id, InputQueue::new(config.input_capacity)))
            .collect();
        let handle = SessionHandle {
            id,
            players: ids,
            inputs: inputs.iter().cloned().collect(),
        };

        let mut sync = Synchronizer::new();
        for (user_id, link) in players {
            sync.attach(user_id, link);
        }

        let session = Self {
            id,
            phase: SessionPhase::WaitingForPlayers,
            config,
            state,
            sync,
            inputs,
            ready: BTreeSet::new(),
            setup_ticks: 0,
            disconnected_at: BTreeMap::new(),
            forfeited: BTreeSet::new(),
            outcome: None,
            started_at: None,
            summary_tx,
            summary: None,
        };
        for user_id in ids {
            session.announce(user_id);
        }

        info!(session_id = %id, players = ?ids, seed, "Session created");
        (session, handle)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &ArenaState {
        &self.state
    }

    pub fn summary(&self) -> Option<&MatchSummary> {
        self.summary.as_ref()
    }

    /// Run the authoritative tick loop until the session closes
    pub async fn run(mut self) -> Option<MatchSummary> {
        info!(session_id = %self.id, "Session loop started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            if self.step() == SessionPhase::Closed {
                break;
            }
        }

        info!(session_id = %self.id, ticks = self.state.tick, "Session loop finished");
        self.summary
    }

    /// Process one tick boundary: drain inputs, then advance the phase
    pub fn step(&mut self) -> SessionPhase {
        match self.phase {
            SessionPhase::WaitingForPlayers => self.step_waiting(),
            SessionPhase::Running => self.step_running(),
            SessionPhase::Ending | SessionPhase::Closed => {}
        }
        if self.phase == SessionPhase::Ending {
            self.finish();
        }
        self.phase
    }

    /// Inputs from every player, slot 0 first
    fn drain_inputs(&self) -> Vec<PlayerInput> {
        self.inputs
            .iter()
            .flat_map(|(_, queue)| queue.drain())
            .collect()
    }

    fn step_waiting(&mut self) {
        self.setup_ticks += 1;

        for input in self.drain_inputs() {
            let user_id = input.user_id;
            match input.event {
                SessionEvent::Ready => {
                    debug!(session_id = %self.id, user_id = %user_id, "Player ready");
                    self.ready.insert(user_id);
                }
                SessionEvent::Leave => {
                    info!(session_id = %self.id, user_id = %user_id, "Player left before start");
                    self.sync.broadcast(ServerMsg::error(
                        "session_abandoned",
                        "A player left before the match started",
                    ));
                    self.close();
                    return;
                }
                SessionEvent::Move(_) | SessionEvent::PlaceBomb => {
                    debug!(session_id = %self.id, user_id = %user_id, "Gameplay input before start dropped");
                }
                event => self.handle_connection(user_id, event),
            }
        }

        let all_ready = self
            .inputs
            .iter()
            .all(|(user_id, _)| self.ready.contains(user_id) && self.sync.is_connected(*user_id));
        if all_ready {
            self.start();
        } else if self.setup_ticks >= self.config.setup_timeout_ticks {
            warn!(session_id = %self.id, ready = self.ready.len(), "Session setup timed out");
            let err = SessionError::SetupTimeout;
            self.sync.broadcast(ServerMsg::error(err.code(), err.to_string()));
            self.close();
        }
    }

    fn start(&mut self) {
        self.phase = SessionPhase::Running;
        self.started_at = Some(Utc::now());
        self.sync.broadcast(ServerMsg::MatchStarted {
            tick: self.state.tick,
        });
        self.sync.commit(self.state.tick, capture(&self.state));
        info!(session_id = %self.id, "Match started");
    }

    fn step_running(&mut self) {
        let tick = self.state.tick + 1;
        let mut events = Vec::new();

        for input in self.drain_inputs() {
            let user_id = input.user_id;
            match input.event {
                event @ (SessionEvent::Move(_) | SessionEvent::PlaceBomb) => {
                    simulation::apply_input(&mut self.state, user_id, &event);
                }
                SessionEvent::Leave => {
                    info!(session_id = %self.id, user_id = %user_id, "Player left, forfeiting");
                    events.extend(self.forfeit(user_id, tick));
                }
                SessionEvent::Ready => {}
                event => self.handle_connection(user_id, event),
            }
        }

        let grace = self.config.reconnect_grace_ticks;
        let expired: Vec<Uuid> = self
            .disconnected_at
            .iter()
            .filter(|(_, since)| tick.saturating_sub(**since) >= grace)
            .map(|(user_id, _)| *user_id)
            .collect();
        for user_id in expired {
            warn!(session_id = %self.id, user_id = %user_id, "Reconnect grace expired, forfeiting");
            events.extend(self.forfeit(user_id, tick));
        }

        events.extend(simulation::advance(&mut self.state));

        self.sync.publish_events(&events);
        self.sync.commit(self.state.tick, capture(&self.state));

        self.outcome = self.check_end();
        if self.outcome.is_some() {
            self.phase = SessionPhase::Ending;
        }
    }

    /// Attach, disconnect and ack events, valid in any open phase
    fn handle_connection(&mut self, user_id: Uuid, event: SessionEvent) {
        match event {
            SessionEvent::Attach(link) => {
                info!(session_id = %self.id, user_id = %user_id, connection = %link.id, "Player reattached");
                self.sync.attach(user_id, link);
                self.disconnected_at.remove(&user_id);
                self.announce(user_id);
                if self.phase == SessionPhase::Running {
                    self.sync.send_to(
                        user_id,
                        ServerMsg::MatchStarted {
                            tick: self.state.tick,
                        },
                    );
                }
            }
            SessionEvent::Disconnected { connection } => {
                if self.sync.detach(user_id, connection) {
                    info!(session_id = %self.id, user_id = %user_id, "Player disconnected");
                    self.disconnected_at.insert(user_id, self.state.tick);
                }
            }
            SessionEvent::Ack(version) => {
                if let Err(err) = self.sync.acknowledge(user_id, version) {
                    debug!(session_id = %self.id, user_id = %user_id, error = %err, "Ack rejected");
                    self.sync
                        .send_to(user_id, ServerMsg::error(err.code(), err.to_string()));
                }
            }
            _ => {}
        }
    }

    /// Tell a player which session they are in and what the map looks like
    fn announce(&self, user_id: Uuid) {
        let Some(player) = self.state.players.get(&user_id) else {
            return;
        };
        let opponent = self
            .inputs
            .iter()
            .map(|(id, _)| *id)
            .find(|id| *id != user_id)
            .unwrap_or(user_id);

        self.sync.send_to(
            user_id,
            ServerMsg::SessionStarted {
                session_id: self.id,
                your_identity: user_id,
                opponent_identity: opponent,
                spawn_cell: super::grid::spawn_cells(self.config.width, self.config.height)
                    [player.slot.min(1)],
                grid: self.state.grid.clone(),
                tick_rate: SIMULATION_TPS,
            },
        );
    }

    /// Death-equivalent forfeit; no-op for players already dead
    fn forfeit(&mut self, user_id: Uuid, tick: u64) -> Option<GameEvent> {
        self.disconnected_at.remove(&user_id);
        let player = self.state.players.get_mut(&user_id)?;
        if !player.kill(tick) {
            return None;
        }
        self.forfeited.insert(user_id);
        Some(GameEvent::Death {
            victim: user_id,
            killer: None,
            cause: DeathCause::Forfeit,
            tick,
        })
    }

    fn check_end(&self) -> Option<(Option<Uuid>, EndReason)> {
        let alive: Vec<Uuid> = self.state.alive_players().map(|p| p.user_id).collect();
        // The ceiling wins over anything else decided on the same tick
        if self.state.tick >= self.config.max_duration_ticks {
            return Some((None, EndReason::DurationCeiling));
        }
        match alive.as_slice() {
            [] => Some((None, EndReason::Draw)),
            [winner] if !self.forfeited.is_empty() => Some((Some(*winner), EndReason::Forfeit)),
            [winner] => Some((Some(*winner), EndReason::LastStanding)),
            _ => None,
        }
    }

    /// Build the terminal summary, deliver it, and close
    fn finish(&mut self) {
        let (winner, reason) = self.outcome.unwrap_or((None, EndReason::Draw));
        let ended_at = Utc::now();
        let duration_ticks = self.state.tick;

        let players = self
            .state
            .slot_order()
            .into_iter()
            .filter_map(|user_id| self.state.players.get(&user_id))
            .map(|p| PlayerSummary {
                user_id: p.user_id,
                bombs_placed: p.bombs_placed,
                players_killed: p.kills,
                is_winner: Some(p.user_id) == winner,
            })
            .collect();

        let summary = MatchSummary {
            session_id: self.id,
            winner,
            reason,
            duration_ticks,
            duration_secs: ticks_to_secs(duration_ticks),
            started_at: self.started_at.unwrap_or(ended_at),
            ended_at,
            players,
        };

        info!(
            session_id = %self.id,
            winner = ?winner,
            reason = ?reason,
            ticks = duration_ticks,
            "Match ended"
        );

        self.sync.broadcast(ServerMsg::MatchEnded {
            winner_identity: winner,
            summary: summary.clone(),
        });
        if self.summary_tx.send(summary.clone()).is_err() {
            warn!(session_id = %self.id, "Summary receiver gone, result not persisted");
        }
        self.summary = Some(summary);
        self.close();
    }

    fn close(&mut self) {
        for (_, queue) in &self.inputs {
            queue.close();
        }
        self.phase = SessionPhase::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::Bomb;
    use crate::game::grid::{Cell, Direction};
    use crate::sync::dispatch::ClientFeed;

    struct Harness {
        session: GameSession,
        handle: SessionHandle,
        feeds: Vec<(Uuid, ClientFeed)>,
        summaries: mpsc::UnboundedReceiver<MatchSummary>,
    }

    impl Harness {
        fn new(config: SessionConfig) -> Self {
            let (a_link, a_feed) = ClientLink::channel();
            let (b_link, b_feed) = ClientLink::channel();
            let a = Uuid::new_v4();
            let b = Uuid::new_v4();
            let (summary_tx, summaries) = mpsc::unbounded_channel();
            let (session, handle) =
                GameSession::new(Uuid::new_v4(), [(a, a_link), (b, b_link)], 11, config, summary_tx);
            Self {
                session,
                handle,
                feeds: vec![(a, a_feed), (b, b_feed)],
                summaries,
            }
        }

        fn player(&self, slot: usize) -> Uuid {
            self.handle.players[slot]
        }

        fn submit(&self, slot: usize, event: SessionEvent) -> Result<bool, SessionError> {
            self.handle.submit(self.player(slot), event, None)
        }

        fn start(&mut self) {
            self.submit(0, SessionEvent::Ready).unwrap();
            self.submit(1, SessionEvent::Ready).unwrap();
            self.session.step();
            assert_eq!(self.session.phase(), SessionPhase::Running);
        }

        fn messages(&mut self, slot: usize) -> Vec<ServerMsg> {
            let feed = &mut self.feeds[slot].1;
            std::iter::from_fn(|| feed.try_message()).collect()
        }

        fn steps(&mut self, n: usize) -> SessionPhase {
            for _ in 0..n {
                self.session.step();
            }
            self.session.phase()
        }
    }

    #[test]
    fn test_both_ready_starts_match() {
        let mut h = Harness::new(SessionConfig::default());
        let opening = h.messages(0);
        assert!(matches!(
            opening[0],
            ServerMsg::SessionStarted { spawn_cell, .. } if spawn_cell == Cell::new(1, 1)
        ));

        h.submit(0, SessionEvent::Ready).unwrap();
        h.steps(3);
        assert_eq!(h.session.phase(), SessionPhase::WaitingForPlayers);

        h.submit(1, SessionEvent::Ready).unwrap();
        assert_eq!(h.steps(1), SessionPhase::Running);
        assert!(h
            .messages(1)
            .iter()
            .any(|m| matches!(m, ServerMsg::MatchStarted { .. })));
        assert!(h.feeds[0].1.latest_diff().is_some_and(|d| d.is_full()));
    }

    #[test]
    fn test_setup_timeout_discards_session() {
        let mut h = Harness::new(SessionConfig {
            setup_timeout_ticks: 5,
            ..SessionConfig::default()
        });
        h.submit(0, SessionEvent::Ready).unwrap();

        assert_eq!(h.steps(4), SessionPhase::WaitingForPlayers);
        assert_eq!(h.steps(1), SessionPhase::Closed);
        assert!(h.messages(1).iter().any(|m| matches!(
            m,
            ServerMsg::Error { code, .. } if code == "setup_timeout"
        )));
        assert!(h.summaries.try_recv().is_err());
        assert_eq!(h.submit(1, SessionEvent::Ready), Err(SessionError::SessionClosed));
    }

    #[test]
    fn test_leave_forfeits_to_opponent() {
        let mut h = Harness::new(SessionConfig::default());
        h.start();
        h.submit(0, SessionEvent::Leave).unwrap();

        assert_eq!(h.steps(1), SessionPhase::Closed);
        let summary = h.summaries.try_recv().unwrap();
        assert_eq!(summary.winner, Some(h.player(1)));
        assert_eq!(summary.reason, EndReason::Forfeit);
        assert!(summary.players[1].is_winner);

        let ended = h.messages(1);
        assert!(ended.iter().any(|m| matches!(
            m,
            ServerMsg::Event(GameEvent::Death { cause: DeathCause::Forfeit, .. })
        )));
        assert!(matches!(
            ended.last(),
            Some(ServerMsg::MatchEnded { winner_identity: Some(w), .. }) if *w == h.player(1)
        ));
        assert_eq!(
            h.submit(1, SessionEvent::Move(Some(Direction::Up))),
            Err(SessionError::SessionClosed)
        );
    }

    #[test]
    fn test_disconnect_grace_then_forfeit() {
        let mut h = Harness::new(SessionConfig {
            reconnect_grace_ticks: 10,
            ..SessionConfig::default()
        });
        h.start();
        let connection = h.session.sync.link(h.player(1)).unwrap().id;
        h.submit(1, SessionEvent::Disconnected { connection }).unwrap();

        assert_eq!(h.steps(9), SessionPhase::Running);
        assert_eq!(h.steps(1), SessionPhase::Closed);
        assert_eq!(h.session.summary().unwrap().winner, Some(h.player(0)));
    }

    #[test]
    fn test_reattach_within_grace_resyncs() {
        let mut h = Harness::new(SessionConfig {
            reconnect_grace_ticks: 10,
            ..SessionConfig::default()
        });
        h.start();
        h.submit(1, SessionEvent::Ack(h.session.sync.version())).unwrap();
        let connection = h.session.sync.link(h.player(1)).unwrap().id;
        h.submit(1, SessionEvent::Disconnected { connection }).unwrap();
        h.steps(5);

        let (link, mut feed) = ClientLink::channel();
        h.submit(1, SessionEvent::Attach(link)).unwrap();
        h.submit(0, SessionEvent::Move(Some(Direction::Right))).unwrap();
        assert_eq!(h.steps(20), SessionPhase::Running);

        let replayed: Vec<ServerMsg> = std::iter::from_fn(|| feed.try_message()).collect();
        assert!(matches!(replayed[0], ServerMsg::SessionStarted { .. }));
        assert!(feed.latest_diff().is_some_and(|d| d.is_full()));
        assert_eq!(h.session.sync.acked(h.player(1)), Some(0));
    }

    #[test]
    fn test_mutual_kill_is_draw() {
        let mut h = Harness::new(SessionConfig::default());
        h.start();
        let (a, b) = (h.player(0), h.player(1));

        // Put both players next to a bomb about to go off
        let state = &mut h.session.state;
        state.players.get_mut(&a).unwrap().x = 1.5;
        state.players.get_mut(&a).unwrap().y = 1.5;
        state.players.get_mut(&b).unwrap().x = 2.5;
        state.players.get_mut(&b).unwrap().y = 1.5;
        let id = state.alloc_id();
        let mut bomb = Bomb::new(id, a, Cell::new(1, 1), 0, 1, 2);
        bomb.fuse_remaining = 1;
        state.bombs.insert(id, bomb);

        assert_eq!(h.steps(1), SessionPhase::Closed);
        let summary = h.session.summary().unwrap();
        assert_eq!(summary.winner, None);
        assert_eq!(summary.reason, EndReason::Draw);
        assert_eq!(summary.players[0].players_killed, 1);
    }

    #[test]
    fn test_duration_ceiling_ends_without_winner() {
        let mut h = Harness::new(SessionConfig {
            max_duration_ticks: 6,
            ..SessionConfig::default()
        });
        h.start();

        assert_eq!(h.steps(5), SessionPhase::Running);
        assert_eq!(h.steps(1), SessionPhase::Closed);
        let summary = h.summaries.try_recv().unwrap();
        assert_eq!(summary.reason, EndReason::DurationCeiling);
        assert_eq!(summary.winner, None);
        assert_eq!(summary.duration_ticks, 6);
    }

    #[test]
    fn test_duration_ceiling_beats_last_tick_forfeit() {
        let mut h = Harness::new(SessionConfig {
            max_duration_ticks: 6,
            ..SessionConfig::default()
        });
        h.start();

        assert_eq!(h.steps(5), SessionPhase::Running);
        h.submit(0, SessionEvent::Leave).unwrap();
        assert_eq!(h.steps(1), SessionPhase::Closed);

        let summary = h.summaries.try_recv().unwrap();
        assert_eq!(summary.reason, EndReason::DurationCeiling);
        assert_eq!(summary.winner, None);
        assert!(summary.players.iter().all(|p| !p.is_winner));
    }

    #[test]
    fn test_registry_tracks_players() {
        let h = Harness::new(SessionConfig::default());
        let registry = SessionRegistry::new();
        registry.insert(h.handle.clone());

        assert_eq!(registry.active_sessions(), 1);
        assert_eq!(registry.total_players(), 2);
        assert_eq!(registry.session_for(h.player(1)).map(|s| s.id), Some(h.handle.id));

        registry.remove(&h.handle.id);
        assert!(!registry.contains_player(h.player(0)));
    }
}
