/// Actor physics: one fixed time slice against a CollisionWorld.
///
/// ## Architecture
///
/// Two layers:
///   1. PROFILE: `MovementProfile`, the tunable numbers plus the choice of
///      horizontal model (accelerate/friction vs. instant velocity).
///   2. SWEEP  : axis-separated sweep-and-resolve, shared by both models.
///
/// ## Per-step order
///
///   1. Horizontal intent (accel + friction, or flat speed)
///   2. Jump impulse (edge pulse, only while grounded)
///   3. Gravity, clamped to max fall speed
///   4. Vertical sweep
///   5. Horizontal sweep
///   6. World-bounds clamp
///
/// ## Grounded state
///
/// `grounded` drops to false whenever a vertical sweep moves the actor, and
/// comes back only when a downward sweep resolves against a tile (or the
/// floor of the world). Standing still still sweeps a fraction of a pixel
/// into the floor every step, which is what keeps `grounded` true.
///
/// Falling off the bottom of the level is not handled here: the bottom of
/// the world is a floor. Fall death is a session-level rule.

use super::collision::{CollisionWorld, Rect};
use super::entity::{Actor, Facing, FrameInput};

/// Default simulation step.
pub const FIXED_DT: f32 = 1.0 / 60.0;

/// Movement tuning. Select with `friction()` or `instant()`, then override
/// individual fields if needed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementProfile {
    /// Accelerate toward `move_speed` and decay with friction when idle.
    /// When false, vx is set directly to `±move_speed`.
    pub uses_friction: bool,
    pub move_accel: f32,
    /// Max horizontal speed (friction model) or the flat speed (instant model).
    pub move_speed: f32,
    pub ground_friction: f32,
    pub air_friction: f32,
    pub gravity: f32,
    pub max_fall_speed: f32,
    /// Negative: up.
    pub jump_velocity: f32,
}

impl MovementProfile {
    /// Accelerative model with ground/air friction.
    pub fn friction() -> Self {
        MovementProfile {
            uses_friction: true,
            move_accel: 780.0,
            move_speed: 260.0,
            ground_friction: 680.0,
            air_friction: 240.0,
            gravity: 2000.0,
            max_fall_speed: 720.0,
            jump_velocity: -690.0,
        }
    }

    /// Instant-velocity model.
    pub fn instant() -> Self {
        MovementProfile {
            uses_friction: false,
            move_accel: 0.0,
            move_speed: 200.0,
            ground_friction: 0.0,
            air_friction: 0.0,
            gravity: 1400.0,
            max_fall_speed: 900.0,
            jump_velocity: -520.0,
        }
    }
}

impl Default for MovementProfile {
    fn default() -> Self {
        MovementProfile::friction()
    }
}

/// What happened during one step, for event emission upstream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub jumped: bool,
    pub landed: bool,
    pub hit_ceiling: bool,
    pub hit_wall: bool,
}

// ══════════════════════════════════════════════════════════════
// Step
// ══════════════════════════════════════════════════════════════

/// Advance `actor` by `dt` seconds. Zero `dt` or a zero-size actor is a no-op.
pub fn step(
    actor: &mut Actor,
    world: &CollisionWorld,
    profile: &MovementProfile,
    input: FrameInput,
    dt: f32,
) -> StepOutcome {
    let mut outcome = StepOutcome::default();
    if !(dt > 0.0) || actor.is_degenerate() {
        return outcome;
    }
    let was_grounded = actor.grounded;

    apply_horizontal_intent(actor, profile, input, dt);

    if input.jump && actor.grounded {
        actor.vy = profile.jump_velocity;
        actor.grounded = false;
        outcome.jumped = true;
    }

    actor.vy = (actor.vy + profile.gravity * dt).min(profile.max_fall_speed);

    let mut hits = Vec::with_capacity(8);
    let vertical = sweep(actor, world, 0.0, actor.vy * dt, &mut hits);
    let horizontal = sweep(actor, world, actor.vx * dt, 0.0, &mut hits);
    outcome.hit_ceiling = vertical == Contact::Ceiling;
    outcome.hit_wall = horizontal == Contact::Wall;

    clamp_to_world(actor, world);

    outcome.landed = actor.grounded && !was_grounded;
    outcome
}

fn apply_horizontal_intent(actor: &mut Actor, profile: &MovementProfile, input: FrameInput, dt: f32) {
    // right wins when both are held
    if input.right {
        actor.facing = Facing::Right;
    } else if input.left {
        actor.facing = Facing::Left;
    }

    if !profile.uses_friction {
        actor.vx = match (input.left, input.right) {
            (true, false) => -profile.move_speed,
            (false, true) => profile.move_speed,
            _ => 0.0,
        };
        return;
    }

    if input.left {
        actor.vx -= profile.move_accel * dt;
    }
    if input.right {
        actor.vx += profile.move_accel * dt;
    }
    if !input.left && !input.right {
        let friction = if actor.grounded { profile.ground_friction } else { profile.air_friction };
        let decay = friction * dt;
        if actor.vx > 0.0 {
            actor.vx = (actor.vx - decay).max(0.0);
        } else if actor.vx < 0.0 {
            actor.vx = (actor.vx + decay).min(0.0);
        }
    }
    actor.vx = actor.vx.clamp(-profile.move_speed, profile.move_speed);
}

// ══════════════════════════════════════════════════════════════
// Sweep-and-resolve
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Contact {
    None,
    Floor,
    Ceiling,
    Wall,
}

/// Move along exactly one axis and snap against every solid tile the
/// displaced box still overlaps. Tiles are tested in row-major order,
/// each against the box as already corrected by earlier tiles.
fn sweep(actor: &mut Actor, world: &CollisionWorld, dx: f32, dy: f32, hits: &mut Vec<Rect>) -> Contact {
    if dx == 0.0 && dy == 0.0 {
        return Contact::None;
    }

    let mut rect = actor.bounds().offset(dx, dy);
    world.query_solid_into(&rect, hits);
    if dy != 0.0 {
        actor.grounded = false;
    }

    let (w, h) = (actor.width, actor.height);
    let mut contact = Contact::None;
    for tile in hits.iter() {
        if !rect.intersects(tile) {
            continue;
        }
        if dy > 0.0 {
            rect.bottom = tile.top;
            rect.top = tile.top - h;
            actor.vy = 0.0;
            actor.grounded = true;
            contact = Contact::Floor;
        } else if dy < 0.0 {
            rect.top = tile.bottom;
            rect.bottom = tile.bottom + h;
            actor.vy = 0.0;
            contact = Contact::Ceiling;
        } else if dx > 0.0 {
            rect.right = tile.left;
            rect.left = tile.left - w;
            actor.vx = 0.0;
            contact = Contact::Wall;
        } else {
            rect.left = tile.right;
            rect.right = tile.right + w;
            actor.vx = 0.0;
            contact = Contact::Wall;
        }
    }

    if dy != 0.0 {
        actor.y = rect.bottom;
    } else {
        actor.x = rect.left + w * 0.5;
    }
    contact
}

/// Keep the box inside `[0, pixel_width]` and the feet inside
/// `[height, pixel_height]`. The bottom of the world acts as a floor.
fn clamp_to_world(actor: &mut Actor, world: &CollisionWorld) {
    let half = actor.half_width();
    let max_x = world.pixel_width() - half;
    if actor.x < half {
        actor.x = half;
        actor.vx = 0.0;
    } else if actor.x > max_x {
        actor.x = max_x;
        actor.vx = 0.0;
    }

    let max_y = world.pixel_height();
    if actor.y < actor.height {
        actor.y = actor.height;
        actor.vy = actor.vy.max(0.0);
    } else if actor.y > max_y {
        actor.y = max_y;
        actor.vy = 0.0;
        actor.grounded = true;
    }
}
