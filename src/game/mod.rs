//! Arena model and the authoritative simulation

pub mod entity;
pub mod explosion;
pub mod grid;
pub mod input;
pub mod movement;
pub mod session;
pub mod simulation;
pub mod state;

pub use session::{GameSession, SessionConfig, SessionError, SessionHandle, SessionPhase, SessionRegistry};
