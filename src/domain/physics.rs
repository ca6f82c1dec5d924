/// Incremental gravity for rocks and gems.
///
/// ## Tracking
///
/// Only cells a prior mutation could have destabilized are examined.
/// Per-cell state lives in three index-keyed sets (index = `y * width + x`):
///   - `active` : faller must be reconsidered on the next tick
///   - `armed`  : faller resting directly above the player, suspended
///   - `fallen` : occupant has moved since it last came to rest
///
/// `active` and `armed` are disjoint. A cell in neither is Resting.
///
/// ## Fairness
///
/// A faller may only crush the player if it has already been in motion.
/// One resting on the player's head (from level start, or because the
/// player walked under it) is armed instead, and stays harmless until a
/// later event sets it moving again.
///
/// ## Tick order
///
/// The active set is snapshotted and processed bottom-up (descending y),
/// left-to-right within a row. A lower faller vacates its cell before the
/// one above it is examined, so a stacked column falls together in one
/// tick. Destinations are always on a lower row, hence already processed:
/// nothing moves twice per tick.
///
/// ## Per-entry decision
///
/// ┌──────────────────────────────┬──────────────────────────────────┐
/// │ Condition (priority order)    │ Result                           │
/// ├──────────────────────────────┼──────────────────────────────────┤
/// │ not a faller / no row below   │ forget → Resting                 │
/// │ below = Player, has fallen    │ crush, abort tick, return true   │
/// │ below = Player, never moved   │ Armed                            │
/// │ below = Empty                 │ fall straight down, stay Active  │
/// │ left shaft open               │ slide down-left, stay Active     │
/// │ right shaft open              │ slide down-right, stay Active    │
/// │ otherwise                     │ forget → Resting                 │
/// └──────────────────────────────┴──────────────────────────────────┘

use std::cmp::Reverse;
use std::collections::HashSet;

use super::grid::Grid;
use super::tile::Tile;

/// Tunables for the fall rule.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FallRules {
    /// Empty cells needed in a side column (from the faller's row down)
    /// before a blocked faller slides into it. Never less than 2.
    pub min_side_shaft_depth: usize,
    /// Whether a moving gem kills like a rock.
    pub gems_crush: bool,
}

impl Default for FallRules {
    fn default() -> Self {
        FallRules {
            min_side_shaft_depth: 2,
            gems_crush: true,
        }
    }
}

/// Observable tracking state of one cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FallState {
    Resting,
    Active,
    Armed,
}

#[derive(Clone, Debug, Default)]
pub struct Gravity {
    rules: FallRules,
    active: HashSet<usize>,
    armed: HashSet<usize>,
    fallen: HashSet<usize>,
}

impl Gravity {
    pub fn new(rules: FallRules) -> Self {
        Gravity {
            rules,
            ..Gravity::default()
        }
    }

    /// Drop all tracking and mark every faller Active.
    /// The only whole-grid scan: level start and restart.
    pub fn initialize(&mut self, grid: &Grid) {
        self.active.clear();
        self.armed.clear();
        self.fallen.clear();
        for (x, y) in grid.positions_where(Tile::can_fall) {
            if let Some(i) = grid.index(x, y) {
                self.active.insert(i);
            }
        }
    }

    // ── Notifications from player actions ──

    /// (x, y) just became empty: wake the faller above it and fallers
    /// resting against it on either side.
    pub fn cell_emptied(&mut self, grid: &Grid, x: i32, y: i32) {
        self.activate_faller_at(grid, x - 1, y);
        self.activate_faller_at(grid, x + 1, y);
        self.activate_faller_at(grid, x, y - 1);
    }

    /// The player now stands at (x, y): whatever was tracked there was
    /// dug or collected, and a faller overhead must be re-examined so it
    /// gets armed rather than resting untracked.
    pub fn player_entered(&mut self, grid: &Grid, x: i32, y: i32) {
        if let Some(i) = grid.index(x, y) {
            self.forget(i);
        }
        self.activate_faller_at(grid, x, y - 1);
    }

    pub fn player_moved(&mut self, grid: &Grid, from: (i32, i32), to: (i32, i32)) {
        self.cell_emptied(grid, from.0, from.1);
        self.player_entered(grid, to.0, to.1);
    }

    pub fn rock_pushed(&mut self, grid: &Grid, from: (i32, i32), to: (i32, i32)) {
        if let Some(i) = grid.index(from.0, from.1) {
            self.forget(i);
        }
        self.cell_emptied(grid, from.0, from.1);
        self.activate_faller_at(grid, to.0, to.1);
    }

    /// (x, y) was blasted to Empty.
    pub fn cell_cleared(&mut self, grid: &Grid, x: i32, y: i32) {
        if let Some(i) = grid.index(x, y) {
            self.forget(i);
        }
        self.cell_emptied(grid, x, y);
    }

    // ── Simulation step ──

    /// Advance one step. Returns true if a falling object crushed the
    /// player; the step stops at the first crush.
    pub fn tick(&mut self, grid: &mut Grid) -> bool {
        let width = grid.width();
        let len = width * grid.height();
        if len == 0 {
            self.active.clear();
            return false;
        }

        let mut order: Vec<usize> = self.active.iter().copied().collect();
        order.sort_unstable_by_key(|&i| (Reverse(i / width), i % width));

        for idx in order {
            // An earlier entry may have moved or settled this one.
            if !self.active.contains(&idx) {
                continue;
            }
            if idx >= len {
                self.forget(idx);
                continue;
            }

            let (x, y) = grid.position(idx);
            let faller = grid.cell_at(x, y);
            if !faller.can_fall() || !grid.in_bounds(x, y + 1) {
                self.forget(idx);
                continue;
            }

            match grid.cell_at(x, y + 1) {
                Tile::Player => {
                    let lethal = faller == Tile::Rock || self.rules.gems_crush;
                    if lethal && self.fallen.contains(&idx) {
                        grid.set_cell(x, y, Tile::Empty);
                        grid.set_cell(x, y + 1, faller);
                        self.forget(idx);
                        return true;
                    }
                    self.active.remove(&idx);
                    self.armed.insert(idx);
                }
                Tile::Empty => {
                    self.move_faller(grid, faller, (x, y), (x, y + 1));
                }
                _ => {
                    if self.side_shaft_open(grid, x - 1, y) {
                        self.move_faller(grid, faller, (x, y), (x - 1, y + 1));
                    } else if self.side_shaft_open(grid, x + 1, y) {
                        self.move_faller(grid, faller, (x, y), (x + 1, y + 1));
                    } else {
                        self.forget(idx);
                    }
                }
            }
        }

        false
    }

    // ── Queries ──

    pub fn state_at(&self, grid: &Grid, x: i32, y: i32) -> FallState {
        match grid.index(x, y) {
            Some(i) if self.active.contains(&i) => FallState::Active,
            Some(i) if self.armed.contains(&i) => FallState::Armed,
            _ => FallState::Resting,
        }
    }

    pub fn has_fallen(&self, grid: &Grid, x: i32, y: i32) -> bool {
        grid.index(x, y).map_or(false, |i| self.fallen.contains(&i))
    }

    /// Number of cells queued for the next tick.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// True when no faller can move without an outside notification.
    pub fn is_settled(&self) -> bool {
        self.active.is_empty()
    }

    // ── Internal ──

    fn forget(&mut self, idx: usize) {
        self.active.remove(&idx);
        self.armed.remove(&idx);
        self.fallen.remove(&idx);
    }

    fn activate_faller_at(&mut self, grid: &Grid, x: i32, y: i32) {
        let i = match grid.index(x, y) {
            Some(i) => i,
            None => return,
        };
        if !grid.cell_at(x, y).can_fall() {
            return;
        }
        self.armed.remove(&i);
        self.active.insert(i);
    }

    /// Move a faller and carry its in-motion state to the destination.
    fn move_faller(&mut self, grid: &mut Grid, faller: Tile, from: (i32, i32), to: (i32, i32)) {
        grid.set_cell(from.0, from.1, Tile::Empty);
        grid.set_cell(to.0, to.1, faller);

        if let Some(i) = grid.index(from.0, from.1) {
            self.forget(i);
        }
        if let Some(i) = grid.index(to.0, to.1) {
            self.armed.remove(&i);
            self.active.insert(i);
            self.fallen.insert(i);
        }

        self.cell_emptied(grid, from.0, from.1);
    }

    /// Column `x` is Empty for the configured depth starting at row `y`.
    fn side_shaft_open(&self, grid: &Grid, x: i32, y: i32) -> bool {
        let depth = self.rules.min_side_shaft_depth.max(2) as i32;
        (0..depth).all(|d| grid.cell_at(x, y + d) == Tile::Empty)
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
