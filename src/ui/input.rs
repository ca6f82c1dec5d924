/// Input state tracker.
///
/// Tracks which keys are currently held down, enabling:
///   - Immediate step on the first press of a direction
///   - Repeat of the most recently pressed held direction
///   - Edge-triggered actions (bomb, restart) that fire once per press
///
/// When the renderer enables crossterm's keyboard enhancement, Release
/// events end a hold. Otherwise a key counts as released once no
/// Press/Repeat event has arrived for `HOLD_TIMEOUT`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::MoveDir;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

/// Direction bindings: arrows and WASD.
const DIRECTION_KEYS: [(KeyCode, MoveDir); 12] = [
    (KeyCode::Left, MoveDir::Left),
    (KeyCode::Right, MoveDir::Right),
    (KeyCode::Up, MoveDir::Up),
    (KeyCode::Down, MoveDir::Down),
    (KeyCode::Char('a'), MoveDir::Left),
    (KeyCode::Char('d'), MoveDir::Right),
    (KeyCode::Char('w'), MoveDir::Up),
    (KeyCode::Char('s'), MoveDir::Down),
    (KeyCode::Char('A'), MoveDir::Left),
    (KeyCode::Char('D'), MoveDir::Right),
    (KeyCode::Char('W'), MoveDir::Up),
    (KeyCode::Char('S'), MoveDir::Down),
];

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that transitioned from "not held" → "held" during the
    /// most recent drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for meta-key handling.
    pub raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl Default for InputState {
    fn default() -> Self {
        InputState::new()
    }
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation advances.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.record(key, Instant::now());
            }
        }

        // Expire keys that have timed out (fallback for terminals without Release)
        if !self.honor_release {
            let now = Instant::now();
            self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
        }
    }

    fn record(&mut self, key: KeyEvent, now: Instant) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {
                // Rely on timeout-based expiry instead
            }
            _ => {
                let was_held = self.is_held_at(key.code, now);
                self.last_active.insert(key.code, now);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    /// Is this key currently held down?
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.is_held_at(code, Instant::now())
    }

    /// Was this key freshly pressed this frame? (edge trigger)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    /// Convenience: was any of these keys freshly pressed?
    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Directions whose keys are held, in binding order.
    pub fn held_dirs(&self) -> Vec<MoveDir> {
        let mut dirs = vec![];
        for &(code, dir) in &DIRECTION_KEYS {
            if self.is_held(code) && !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }

    /// Directions first pressed during the last drain, in press order.
    pub fn fresh_dirs(&self) -> Vec<MoveDir> {
        let mut dirs = vec![];
        for code in &self.fresh_presses {
            if let Some(&(_, dir)) = DIRECTION_KEYS.iter().find(|(c, _)| c == code) {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }
        dirs
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    // ── Internal ──

    fn is_held_at(&self, code: KeyCode, now: Instant) -> bool {
        match self.last_active.get(&code) {
            Some(_) if self.honor_release => true,
            Some(t) => now.saturating_duration_since(*t) < HOLD_TIMEOUT,
            None => false,
        }
    }
}

/// Turns held / freshly pressed directions into discrete steps.
///
/// A fresh press steps at once and becomes the active direction. While
/// held, the active direction steps again every `interval`. Releasing it
/// falls back to the most recently pressed direction still held.
#[derive(Clone, Debug)]
pub struct DirectionRepeat {
    interval: Duration,
    /// Held directions, oldest press first.
    order: Vec<MoveDir>,
    last_step: Option<Instant>,
}

impl DirectionRepeat {
    pub fn new(interval: Duration) -> Self {
        DirectionRepeat { interval, order: vec![], last_step: None }
    }

    pub fn update(&mut self, held: &[MoveDir], fresh: &[MoveDir], now: Instant) -> Option<MoveDir> {
        self.order.retain(|d| held.contains(d) || fresh.contains(d));
        for &d in fresh {
            self.order.retain(|&o| o != d);
            self.order.push(d);
        }

        let active = *self.order.last()?;
        let due = match self.last_step {
            _ if !fresh.is_empty() => true,
            Some(t) => now.saturating_duration_since(t) >= self.interval,
            None => true,
        };
        if due {
            self.last_step = Some(now);
            Some(active)
        } else {
            None
        }
    }

    /// Forget held directions (level change, pause).
    pub fn reset(&mut self) {
        self.order.clear();
        self.last_step = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn first_press_steps_immediately_then_repeats() {
        let mut rep = DirectionRepeat::new(Duration::from_millis(100));
        let t0 = Instant::now();
        let right = [MoveDir::Right];

        assert_eq!(rep.update(&right, &right, t0), Some(MoveDir::Right));
        assert_eq!(rep.update(&right, &[], t0 + Duration::from_millis(50)), None);
        assert_eq!(rep.update(&right, &[], t0 + Duration::from_millis(100)), Some(MoveDir::Right));
        assert_eq!(rep.update(&[], &[], t0 + Duration::from_millis(300)), None);
    }

    #[test]
    fn newest_held_direction_wins() {
        let mut rep = DirectionRepeat::new(Duration::from_millis(100));
        let t0 = Instant::now();

        rep.update(&[MoveDir::Left], &[MoveDir::Left], t0);
        let both = [MoveDir::Left, MoveDir::Up];
        assert_eq!(rep.update(&both, &[MoveDir::Up], t0 + Duration::from_millis(10)), Some(MoveDir::Up));
        assert_eq!(rep.update(&both, &[], t0 + Duration::from_millis(110)), Some(MoveDir::Up));

        // Releasing Up falls back to the still-held Left.
        assert_eq!(
            rep.update(&[MoveDir::Left], &[], t0 + Duration::from_millis(210)),
            Some(MoveDir::Left),
        );
    }

    #[test]
    fn tap_shorter_than_a_frame_still_steps() {
        let mut rep = DirectionRepeat::new(Duration::from_millis(100));
        assert_eq!(rep.update(&[], &[MoveDir::Down], Instant::now()), Some(MoveDir::Down));
    }

    #[test]
    fn wasd_and_arrows_map_to_directions() {
        let mut input = InputState::new();
        let now = Instant::now();
        input.record(press(KeyCode::Char('a')), now);
        input.record(press(KeyCode::Up), now);
        input.record(press(KeyCode::Left), now);
        assert_eq!(input.fresh_dirs(), vec![MoveDir::Left, MoveDir::Up]);
        assert!(input.was_pressed(KeyCode::Up));
    }

    fn release(code: KeyCode) -> KeyEvent {
        KeyEvent { kind: KeyEventKind::Release, ..press(code) }
    }

    #[test]
    fn release_events_end_a_hold_only_when_reported() {
        let now = Instant::now();

        let mut input = InputState::new();
        input.honor_release = true;
        input.record(press(KeyCode::Left), now);
        // No timeout: the key stays held until its Release arrives.
        assert!(input.is_held_at(KeyCode::Left, now + Duration::from_secs(1)));
        input.record(release(KeyCode::Left), now + Duration::from_secs(1));
        assert!(!input.is_held_at(KeyCode::Left, now + Duration::from_secs(1)));

        let mut input = InputState::new();
        input.record(press(KeyCode::Left), now);
        input.record(release(KeyCode::Left), now);
        assert!(input.is_held_at(KeyCode::Left, now + Duration::from_millis(50)));
        assert!(!input.is_held_at(KeyCode::Left, now + HOLD_TIMEOUT));
    }

    #[test]
    fn repeated_press_of_held_key_is_not_fresh() {
        let mut input = InputState::new();
        let now = Instant::now();
        input.record(press(KeyCode::Char(' ')), now);
        input.fresh_presses.clear();
        input.record(press(KeyCode::Char(' ')), now + Duration::from_millis(30));
        assert!(!input.was_pressed(KeyCode::Char(' ')));
    }
}
