//! Bomb Arena - authoritative server for two-player grid bomb battles
//!
//! The engine (grid, entities, explosions, the per-session tick loop and
//! state synchronization) lives here together with the HTTP/WebSocket
//! surface, so every piece can be exercised from tests.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod store;
pub mod sync;
pub mod util;
pub mod ws;
