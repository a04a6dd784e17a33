//! One authoritative simulation step

use uuid::Uuid;

use crate::util::time::tick_delta;
use crate::ws::protocol::{DeathCause, GameEvent};

use super::explosion::{kill_player, resolve, Detonation};
use super::grid::Cell;
use super::input::SessionEvent;
use super::movement::step_player;
use super::state::ArenaState;

/// Fold one drained input into player intent. Intent is consumed by the
/// next `advance`; inputs from dead players are ignored.
pub fn apply_input(state: &mut ArenaState, user_id: Uuid, event: &SessionEvent) {
    let Some(player) = state.players.get_mut(&user_id) else {
        return;
    };
    if !player.alive {
        return;
    }
    match event {
        SessionEvent::Move(direction) => player.moving = *direction,
        SessionEvent::PlaceBomb => player.bomb_requested = true,
        _ => {}
    }
}

/// Advance the arena by one tick and return the gameplay events it produced,
/// in causal order.
pub fn advance(state: &mut ArenaState) -> Vec<GameEvent> {
    let mut events = Vec::new();
    state.tick += 1;

    update_movement(state);
    update_cooldowns(state);
    update_placements(state);
    update_explosions(state);

    for detonation in update_fuses(state) {
        push_detonation(&mut events, state, &detonation);
    }
    let hazards = update_hazards(state);
    push_detonation(&mut events, state, &hazards);

    collect_power_ups(state);
    events
}

fn update_movement(state: &mut ArenaState) {
    let dt = tick_delta();
    for user_id in state.slot_order() {
        let blockers: Vec<Cell> = state
            .alive_players()
            .filter(|p| p.user_id != user_id)
            .map(|p| p.cell())
            .collect();

        let Some(player) = state.players.get_mut(&user_id) else {
            continue;
        };
        if let Some(direction) = player.moving {
            step_player(&state.grid, &blockers, player, direction, dt);
        }
    }
}

fn update_cooldowns(state: &mut ArenaState) {
    for player in state.players.values_mut() {
        player.bomb_cooldown = player.bomb_cooldown.saturating_sub(1);
    }
}

/// Requests that fail validation (dead, on cooldown, at the bomb limit,
/// cell already holding a bomb) are dropped silently.
fn update_placements(state: &mut ArenaState) {
    for user_id in state.slot_order() {
        let Some(player) = state.players.get_mut(&user_id) else {
            continue;
        };
        if !std::mem::take(&mut player.bomb_requested) || !player.can_place_bomb() {
            continue;
        }
        let cell = player.cell();
        if state.bomb_at(cell).is_some() {
            continue;
        }

        if state.spawn_bomb(user_id).is_some() {
            let cooldown = state.rules.bomb_cooldown_ticks;
            if let Some(player) = state.players.get_mut(&user_id) {
                player.active_bombs += 1;
                player.bombs_placed += 1;
                player.bomb_cooldown = cooldown;
            }
        }
    }
}

fn update_explosions(state: &mut ArenaState) {
    state.explosions.retain(|_, explosion| {
        explosion.remaining_ticks = explosion.remaining_ticks.saturating_sub(1);
        explosion.remaining_ticks > 0
    });
}

/// Detonate every bomb whose fuse burns out this tick
fn update_fuses(state: &mut ArenaState) -> Vec<Detonation> {
    let tick = state.tick;
    let expired: Vec<_> = state
        .bombs
        .values_mut()
        .filter(|bomb| bomb.armed && bomb.placed_at_tick < tick)
        .filter_map(|bomb| bomb.tick_fuse().then_some(bomb.id))
        .collect();

    expired
        .into_iter()
        .map(|id| resolve(state, id))
        .filter(|detonation| !detonation.is_empty())
        .collect()
}

/// Lingering explosions stay lethal: they set off bombs placed into them
/// and kill players who walk in.
fn update_hazards(state: &mut ArenaState) -> Detonation {
    let mut result = Detonation::default();

    let ignited: Vec<_> = state
        .bombs
        .values()
        .filter(|bomb| bomb.armed && state.explosions.values().any(|e| e.covers(bomb.cell)))
        .map(|bomb| bomb.id)
        .collect();
    for id in ignited {
        let chained = resolve(state, id);
        result.explosions.extend(chained.explosions);
        result.kills.extend(chained.kills);
        result.destroyed.extend(chained.destroyed);
        result.chained.extend(chained.chained);
        result.burned.extend(chained.burned);
        result.dropped.extend(chained.dropped);
    }

    let burned: Vec<(Uuid, Uuid)> = state
        .alive_players()
        .filter_map(|player| {
            state
                .explosions
                .values()
                .find(|e| e.covers(player.cell()))
                .map(|e| (player.user_id, e.owner))
        })
        .collect();
    for (victim, owner) in burned {
        kill_player(state, victim, owner, &mut result);
    }

    result
}

fn collect_power_ups(state: &mut ArenaState) {
    let pickups: Vec<_> = state
        .power_ups
        .values()
        .filter_map(|power_up| {
            state
                .live_player_at(power_up.cell, None)
                .map(|player| (player.user_id, power_up.id, power_up.kind))
        })
        .collect();

    for (user_id, id, kind) in pickups {
        state.power_ups.remove(&id);
        if let Some(player) = state.players.get_mut(&user_id) {
            player.apply_power_up(kind);
        }
    }
}

fn push_detonation(events: &mut Vec<GameEvent>, state: &ArenaState, detonation: &Detonation) {
    let tick = state.tick;
    for id in &detonation.explosions {
        if let Some(explosion) = state.explosions.get(id) {
            events.push(GameEvent::Explosion {
                explosion_id: explosion.id,
                bomb_id: explosion.source,
                owner: explosion.owner,
                origin: explosion.origin,
                cells: explosion.cells.clone(),
                tick,
            });
        }
    }
    if !detonation.destroyed.is_empty() {
        events.push(GameEvent::Destruction {
            cells: detonation.destroyed.clone(),
            tick,
        });
    }
    for kill in &detonation.kills {
        events.push(GameEvent::Death {
            victim: kill.victim,
            killer: Some(kill.killer),
            cause: DeathCause::Blast,
            tick,
        });
    }
}
