//! Matchmaking: FIFO pairing of waiting players into sessions

pub mod queue;
pub mod service;

pub use queue::{MatchmakingQueue, QueueError, QueueTicket};
pub use service::{MatchmakingService, MatchmakingStatus};
