//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 30; // 30 ticks per second
pub const MOVEMENT_SYNC_HZ: u32 = 20; // movement-tier diffs per second, per client
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;
pub const MOVEMENT_SYNC_INTERVAL_MICROS: u64 = 1_000_000 / MOVEMENT_SYNC_HZ as u64;

/// Wall-clock period of one simulation tick
pub fn tick_duration() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

/// Minimum spacing between two movement-tier sends to one client
pub fn movement_sync_interval() -> Duration {
    Duration::from_micros(MOVEMENT_SYNC_INTERVAL_MICROS)
}

/// Calculate delta time for movement (in seconds)
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Convert a wall-clock span into a whole number of simulation ticks (at least 1)
pub fn secs_to_ticks(secs: f32) -> u32 {
    ((secs * SIMULATION_TPS as f32).round() as u32).max(1)
}

/// Convert a tick count back to whole seconds
pub fn ticks_to_secs(ticks: u64) -> u32 {
    (ticks / SIMULATION_TPS as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_conversions() {
        assert_eq!(secs_to_ticks(2.0), 60);
        assert_eq!(secs_to_ticks(0.5), 15);
        assert_eq!(secs_to_ticks(0.0), 1);
        assert_eq!(ticks_to_secs(95), 3);
    }

    #[test]
    fn test_movement_interval_is_independent_of_tick() {
        assert_eq!(movement_sync_interval(), Duration::from_millis(50));
        assert!(tick_duration() < movement_sync_interval());
    }
}
