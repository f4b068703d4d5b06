/// Keyboard state tracker.
///
/// Tracks which keys are currently held down, enabling:
///   - Continuous running while a direction key is held
///   - Edge-triggered jump (one pulse per press, via `JumpLatch`)
///   - One-shot meta keys (restart, next world, quit)
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::{FrameInput, JumpLatch};

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

const LEFT_KEYS: [KeyCode; 3] = [KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const RIGHT_KEYS: [KeyCode; 3] = [KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const JUMP_KEYS: [KeyCode; 4] = [KeyCode::Up, KeyCode::Char(' '), KeyCode::Char('w'), KeyCode::Char('W')];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetaAction {
    Restart,
    NextWorld,
    Quit,
}

pub struct KeyboardInput {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// `drain_events()` call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for Ctrl+C.
    raw_events: Vec<KeyEvent>,

    jump: JumpLatch,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl KeyboardInput {
    pub fn new() -> Self {
        KeyboardInput {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            jump: JumpLatch::default(),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events without blocking.
    /// Call this once per frame.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            let Ok(Event::Key(key)) = event::read() else { continue };
            self.raw_events.push(key);

            match key.kind {
                KeyEventKind::Release if self.honor_release => {
                    self.last_active.remove(&key.code);
                }
                // Without enhancement, releases are inferred from the timeout.
                KeyEventKind::Release => {}
                _ => {
                    let was_held = self.is_held(key.code);
                    self.last_active.insert(key.code, Instant::now());
                    if !was_held {
                        self.fresh_presses.push(key.code);
                    }
                }
            }
        }

        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    /// Movement intents for the simulation. `jump` fires once per press.
    pub fn frame_input(&mut self) -> FrameInput {
        let jump_held = self.any_held(&JUMP_KEYS);
        FrameInput {
            left: self.any_held(&LEFT_KEYS),
            right: self.any_held(&RIGHT_KEYS),
            jump: self.jump.pulse(jump_held),
        }
    }

    pub fn meta_action(&self) -> Option<MetaAction> {
        if self.ctrl_c_pressed() || self.any_pressed(&[KeyCode::Esc, KeyCode::Char('q'), KeyCode::Char('Q')]) {
            return Some(MetaAction::Quit);
        }
        if self.any_pressed(&[KeyCode::Char('r'), KeyCode::Char('R')]) {
            return Some(MetaAction::Restart);
        }
        if self.any_pressed(&[KeyCode::Char('n'), KeyCode::Char('N')]) {
            return Some(MetaAction::NextWorld);
        }
        None
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }

    fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.fresh_presses.contains(c))
    }

    fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}
