/// The session tick: advances a GameSession by one fixed step.
///
/// Processing order:
///   1. Physics (actor against the tile grid)
///   2. Coin pickup
///   3. Spike contact (lose a life, respawn)
///   4. Flag contact (victory)
///   5. Fall out of the world (lose a life, respawn)
///   6. Camera follow
///
/// A tick that finishes the run stops there: later stages do not run and
/// further ticks are no-ops until `restart()` or `swap()`.
///
/// Contact uses strict box overlap (`Rect::intersects`). Touching edges is
/// not contact.

use std::sync::Arc;

use log::{debug, info};

use crate::domain::collision::CollisionWorld;
use crate::domain::entity::{EntityKind, FrameInput};
use crate::domain::physics;
use super::event::GameEvent;
use super::world::{GameSession, Phase};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn tick(session: &mut GameSession, input: FrameInput, dt: f32) -> Vec<GameEvent> {
    if session.phase != Phase::Playing { return vec![]; }

    let mut events: Vec<GameEvent> = Vec::new();
    session.tick += 1;
    session.elapsed += dt;

    resolve_physics(session, input, dt, &mut events);
    resolve_coins(session, &mut events);
    if resolve_spikes(session, &mut events) { return events; }
    if resolve_flag(session, &mut events) { return events; }
    if resolve_fall(session, &mut events) { return events; }
    session.follow_actor();

    events
}

// ══════════════════════════════════════════════════════════════
// Physics
// ══════════════════════════════════════════════════════════════

fn resolve_physics(session: &mut GameSession, input: FrameInput, dt: f32, events: &mut Vec<GameEvent>) {
    let blueprint = Arc::clone(&session.blueprint);
    let world = CollisionWorld::new(&blueprint.grid);
    let outcome = physics::step(&mut session.actor, &world, &session.profile, input, dt);

    if outcome.jumped { events.push(GameEvent::Jumped); }
    if outcome.landed { events.push(GameEvent::Landed); }
    if outcome.hit_ceiling { events.push(GameEvent::BumpedHead); }
}

// ══════════════════════════════════════════════════════════════
// Pickups and hazards
// ══════════════════════════════════════════════════════════════

fn resolve_coins(session: &mut GameSession, events: &mut Vec<GameEvent>) {
    let body = session.actor.bounds();
    let blueprint = Arc::clone(&session.blueprint);
    for (i, p) in blueprint.placements.iter().enumerate() {
        if p.kind != EntityKind::Coin || session.is_collected(i) { continue; }
        let Some(hit_box) = session.entity_bounds(p) else { continue };
        if body.intersects(&hit_box) {
            session.collected[i] = true;
            session.coins += 1;
            events.push(GameEvent::CoinCollected { index: i, total: session.coins });
        }
    }
}

/// Only the first spike touched in a tick counts.
fn resolve_spikes(session: &mut GameSession, events: &mut Vec<GameEvent>) -> bool {
    let body = session.actor.bounds();
    let hit = session
        .blueprint
        .placements
        .iter()
        .filter(|p| p.kind == EntityKind::Spike)
        .filter_map(|p| session.entity_bounds(p))
        .any(|b| body.intersects(&b));
    if !hit { return false; }

    events.push(GameEvent::SpikeHit);
    lose_life(session, events)
}

fn resolve_flag(session: &mut GameSession, events: &mut Vec<GameEvent>) -> bool {
    let body = session.actor.bounds();
    let reached = session
        .blueprint
        .flag()
        .and_then(|p| session.entity_bounds(p))
        .is_some_and(|b| body.intersects(&b));
    if !reached { return false; }

    finish(session, Phase::Won, events);
    true
}

/// Physics treats the bottom of the world as a floor, so this only catches
/// actors that were moved there by other means.
fn resolve_fall(session: &mut GameSession, events: &mut Vec<GameEvent>) -> bool {
    let limit = session.blueprint.grid.pixel_height() + session.tile_size();
    if session.actor.bounds().top <= limit { return false; }

    events.push(GameEvent::FellOut);
    lose_life(session, events)
}

// ══════════════════════════════════════════════════════════════
// Lives and finishing
// ══════════════════════════════════════════════════════════════

/// Returns true when that was the last life.
fn lose_life(session: &mut GameSession, events: &mut Vec<GameEvent>) -> bool {
    let lives_left = session.actor.lose_life();
    events.push(GameEvent::LifeLost { lives_left });
    if lives_left == 0 {
        finish(session, Phase::Lost, events);
        return true;
    }
    debug!("step: respawned with {} lives left", lives_left);
    session.snap_camera();
    false
}

fn finish(session: &mut GameSession, phase: Phase, events: &mut Vec<GameEvent>) {
    session.phase = phase;
    let result = session.result();
    info!(
        "run finished: {} after {:.2}s, {} coins, {} lives left",
        if result.victory { "victory" } else { "defeat" },
        result.elapsed_seconds,
        result.coins,
        result.lives_remaining
    );
    events.push(GameEvent::Finished(result));
}
