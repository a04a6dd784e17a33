//! Client-side interpolation contract
//!
//! Clients render remote players a fixed delay behind the newest diff and
//! blend linearly between the two samples that bracket the render tick.
//! The server does not run this; it is the reference behaviour that test
//! clients (and the integration tests) use to consume diffs.

use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

use super::diff::StateDiff;
use super::snapshot::{EntityKey, EntityState};

/// Default render delay: two movement-tier sends at 20 Hz, in 30 Hz ticks
pub const DEFAULT_DELAY_TICKS: f64 = 3.0;

/// Samples kept per entity
pub const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub tick: u64,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone)]
pub struct Interpolator {
    delay_ticks: f64,
    capacity: usize,
    tracks: BTreeMap<Uuid, VecDeque<PositionSample>>,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_TICKS, DEFAULT_CAPACITY)
    }
}

impl Interpolator {
    pub fn new(delay_ticks: f64, capacity: usize) -> Self {
        Self {
            delay_ticks,
            capacity: capacity.max(2),
            tracks: BTreeMap::new(),
        }
    }

    /// Record a position. Samples at or before the newest known tick are
    /// ignored so a track never runs backwards.
    pub fn record(&mut self, user_id: Uuid, tick: u64, x: f32, y: f32) {
        let track = self.tracks.entry(user_id).or_default();
        if track.back().is_some_and(|last| last.tick >= tick) {
            return;
        }
        track.push_back(PositionSample { tick, x, y });
        while track.len() > self.capacity {
            track.pop_front();
        }
    }

    /// Feed a received diff. Players absent from the diff did not move, so
    /// their last position is repeated at the diff's tick.
    pub fn observe(&mut self, diff: &StateDiff) {
        if diff.is_full() {
            self.tracks.clear();
        }
        let mut seen = Vec::new();
        for entity in &diff.entities_changed {
            if let EntityState::Player(player) = entity {
                self.record(player.user_id, diff.tick, player.x, player.y);
                seen.push(player.user_id);
            }
        }
        for key in &diff.entities_removed {
            if let EntityKey::Player(user_id) = key {
                self.tracks.remove(user_id);
            }
        }

        let idle: Vec<(Uuid, PositionSample)> = self
            .tracks
            .iter()
            .filter(|(user_id, _)| !seen.contains(*user_id))
            .filter_map(|(user_id, track)| track.back().map(|s| (*user_id, *s)))
            .collect();
        for (user_id, last) in idle {
            self.record(user_id, diff.tick, last.x, last.y);
        }
    }

    /// Position to draw at `render_tick` (fractional ticks allowed)
    pub fn sample(&self, user_id: Uuid, render_tick: f64) -> Option<(f32, f32)> {
        let track = self.tracks.get(&user_id)?;
        let first = track.front()?;
        let target = render_tick - self.delay_ticks;

        if target <= first.tick as f64 {
            return Some((first.x, first.y));
        }
        for (from, to) in track.iter().zip(track.iter().skip(1)) {
            if target <= to.tick as f64 {
                let span = (to.tick - from.tick) as f64;
                let t = ((target - from.tick as f64) / span) as f32;
                return Some((lerp(from.x, to.x, t), lerp(from.y, to.y, t)));
            }
        }
        track.back().map(|last| (last.x, last.y))
    }

    pub fn forget(&mut self, user_id: Uuid) {
        self.tracks.remove(&user_id);
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::Direction;
    use crate::sync::snapshot::PlayerView;

    fn player(user_id: Uuid, x: f32) -> EntityState {
        EntityState::Player(PlayerView {
            user_id,
            x,
            y: 1.5,
            facing: Direction::Right,
            alive: true,
            active_bombs: 0,
            bomb_limit: 1,
            blast_radius: 1,
            speed: 4.0,
            kills: 0,
        })
    }

    #[test]
    fn test_blends_between_samples() {
        let user = Uuid::new_v4();
        let mut interp = Interpolator::new(0.0, 8);
        interp.record(user, 10, 1.0, 1.0);
        interp.record(user, 20, 3.0, 1.0);

        assert_eq!(interp.sample(user, 15.0), Some((2.0, 1.0)));
        assert_eq!(interp.sample(user, 5.0), Some((1.0, 1.0)));
        assert_eq!(interp.sample(user, 25.0), Some((3.0, 1.0)));
    }

    #[test]
    fn test_render_delay_applies() {
        let user = Uuid::new_v4();
        let mut interp = Interpolator::new(3.0, 8);
        interp.record(user, 0, 0.0, 0.0);
        interp.record(user, 6, 6.0, 0.0);

        assert_eq!(interp.sample(user, 6.0), Some((3.0, 0.0)));
    }

    #[test]
    fn test_out_of_order_samples_ignored() {
        let user = Uuid::new_v4();
        let mut interp = Interpolator::new(0.0, 8);
        interp.record(user, 10, 1.0, 1.0);
        interp.record(user, 8, 9.0, 9.0);

        assert_eq!(interp.sample(user, 10.0), Some((1.0, 1.0)));
    }

    #[test]
    fn test_idle_players_hold_position() {
        let mover = Uuid::new_v4();
        let idle = Uuid::new_v4();
        let mut interp = Interpolator::new(0.0, 8);

        interp.observe(&StateDiff {
            version: 1,
            baseline_version: 0,
            tick: 0,
            entities_changed: vec![player(mover, 1.5), player(idle, 9.5)],
            entities_removed: Vec::new(),
        });
        interp.observe(&StateDiff {
            version: 2,
            baseline_version: 1,
            tick: 30,
            entities_changed: vec![player(mover, 4.5)],
            entities_removed: Vec::new(),
        });

        assert_eq!(interp.sample(idle, 15.0), Some((9.5, 1.5)));
        assert_eq!(interp.sample(mover, 15.0), Some((3.0, 1.5)));
    }
}
