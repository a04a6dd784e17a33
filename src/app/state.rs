//! Application state shared across routes

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::game::SessionRegistry;
use crate::matchmaking::MatchmakingService;
use crate::ws::protocol::MatchSummary;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub matchmaking: Arc<MatchmakingService>,
}

impl AppState {
    /// Build the shared state. The returned receiver yields one summary per
    /// finished match and should be handed to the match recorder.
    pub fn new(config: Config) -> (Self, mpsc::UnboundedReceiver<MatchSummary>) {
        let config = Arc::new(config);
        let (summary_tx, summary_rx) = mpsc::unbounded_channel();

        let registry = Arc::new(SessionRegistry::new());
        let matchmaking = Arc::new(MatchmakingService::new(
            registry.clone(),
            config.session_config(),
            summary_tx,
        ));

        let state = Self {
            config,
            registry,
            matchmaking,
        };
        (state, summary_rx)
    }
}
