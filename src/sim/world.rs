/// WorldState: the complete snapshot of a running game.
///
/// ## Grid Architecture
///
/// Two grids:
///   - `base_grid`: the level as loaded. **Never mutated** after `begin_level`.
///   - `grid`     : the live cells, mutated by moves, blasts and gravity.
///
/// `restart_level` resets `grid = base_grid.clone()` and re-seeds gravity
/// with its one full-grid scan.
///
/// ## Camera / Viewport
///
/// World coordinates and screen coordinates are separate:
///   - `camera`: viewport into the world (top-left corner + size)
///   - Renderer maps: `screen(sx, sy) = world(camera.x + sx, camera.y + sy)`
///   - Camera follows the player with a dead-zone approach
///   - Maps smaller than the viewport are centered

use std::time::Duration;

use crate::config::{RulesConfig, SpeedConfig};
use crate::domain::entity::Player;
use crate::domain::grid::Grid;
use crate::domain::physics::Gravity;
use crate::domain::tile::Tile;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Title,
    Playing,
    LevelComplete,
    GameComplete,
}

/// Camera: a viewport into the world.
///
/// `(x, y)` is the world coordinate of the top-left visible cell.
/// `(view_w, view_h)` is how many world cells fit in the viewport.
/// These are computed from terminal size and set during `render()`.
#[derive(Clone, Debug, Default)]
pub struct Camera {
    /// World X of the top-left visible cell (can be negative for centering)
    pub x: i32,
    /// World Y of the top-left visible cell
    pub y: i32,
    pub view_w: usize,
    pub view_h: usize,
}

impl Camera {
    pub fn new() -> Self {
        Camera::default()
    }

    /// Scroll only when the target leaves the inner dead zone
    /// (20% margin on each side).
    pub fn follow(&mut self, target: (i32, i32), world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = follow_axis(self.x, target.0, self.view_w, world_w);
        self.y = follow_axis(self.y, target.1, self.view_h, world_h);
    }

    /// Snap directly onto a position (no dead zone). Used on level load / restart.
    pub fn center_on(&mut self, target: (i32, i32), world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = center_axis(target.0, self.view_w, world_w);
        self.y = center_axis(target.1, self.view_h, world_h);
    }
}

fn follow_axis(pos: i32, target: i32, view: usize, world: usize) -> i32 {
    let (view, world) = (view as i32, world as i32);
    if world <= view {
        return -((view - world) / 2);
    }
    let margin = view / 5;
    let mut pos = pos;
    if target < pos + margin {
        pos = target - margin;
    } else if target > pos + view - margin - 1 {
        pos = target - view + margin + 1;
    }
    pos.clamp(0, world - view)
}

fn center_axis(target: i32, view: usize, world: usize) -> i32 {
    let (view, world) = (view as i32, world as i32);
    if world <= view {
        -((view - world) / 2)
    } else {
        (target - view / 2).clamp(0, world - view)
    }
}

pub struct WorldState {
    // ── Grid ──
    /// Level as loaded. Never mutated after `begin_level`.
    pub base_grid: Grid,
    /// Live cells.
    pub grid: Grid,
    pub gravity: Gravity,

    // ── Player / exit ──
    pub player: Player,
    pub player_spawn: (i32, i32),
    pub exit_pos: (i32, i32),

    // ── Session counters ──
    pub collected: u32,
    pub required: u32,
    /// Required count at level start; bombs may lower `required`.
    pub base_required: u32,
    pub bombs: u32,
    pub game_over: bool,
    pub won: bool,

    // ── Tuning ──
    pub rules: RulesConfig,
    pub speed: SpeedConfig,
    /// Unspent elapsed time, always < one quantum after `advance`.
    pub tick_acc: Duration,
    pub tick: u64,

    // ── Meta ──
    pub phase: Phase,
    pub current_level: usize,
    pub total_levels: usize,
    pub level_name: String,
    pub level_names: Vec<String>,
    pub debug_keys: bool,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
    pub paused: bool,
    pub camera: Camera,
}

// ── Construction ──

impl Default for WorldState {
    fn default() -> Self {
        WorldState::new()
    }
}

impl WorldState {
    pub fn new() -> Self {
        WorldState {
            base_grid: Grid::new(0, 0),
            grid: Grid::new(0, 0),
            gravity: Gravity::default(),
            player: Player::new(0, 0),
            player_spawn: (0, 0),
            exit_pos: (0, 0),
            collected: 0,
            required: 0,
            base_required: 0,
            bombs: 0,
            game_over: false,
            won: false,
            rules: RulesConfig::default(),
            speed: SpeedConfig::default(),
            tick_acc: Duration::ZERO,
            tick: 0,
            phase: Phase::Title,
            current_level: 0,
            total_levels: 0,
            level_name: String::new(),
            level_names: vec![],
            debug_keys: false,
            message: String::new(),
            message_timer: 0,
            paused: false,
            camera: Camera::new(),
        }
    }

    /// Seed a session from a decoded grid.
    ///
    /// The exit cell is forced to ExitClosed, or ExitOpen when no gems are
    /// required; the player cell is forced to the Player marker. The
    /// result becomes the restart snapshot.
    pub fn begin_level(
        &mut self,
        mut grid: Grid,
        player_start: (i32, i32),
        exit_pos: (i32, i32),
        required_gems: u32,
        rules: &RulesConfig,
    ) {
        let exit = if required_gems == 0 { Tile::ExitOpen } else { Tile::ExitClosed };
        grid.set_cell(exit_pos.0, exit_pos.1, exit);
        grid.set_cell(player_start.0, player_start.1, Tile::Player);
        grid.take_dirty();

        self.base_grid = grid;
        self.player_spawn = player_start;
        self.exit_pos = exit_pos;
        self.base_required = required_gems;
        self.rules = rules.clone();
        self.gravity = Gravity::new(rules.fall_rules());
        self.reset_session();
    }

    /// Restore the snapshot and every counter. The one full-grid scan.
    pub(crate) fn reset_session(&mut self) {
        self.grid = self.base_grid.clone();
        self.grid.mark_all_dirty();
        self.gravity.initialize(&self.grid);
        self.player = Player::new(self.player_spawn.0, self.player_spawn.1);
        self.collected = 0;
        self.required = self.base_required;
        self.bombs = self.rules.initial_bombs;
        self.game_over = false;
        self.won = false;
        self.tick_acc = Duration::ZERO;
        self.tick = 0;
        self.paused = false;
        self.camera.center_on(self.player_spawn, self.grid.width(), self.grid.height());
    }

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }
}

// ── Queries ──

impl WorldState {
    #[inline]
    pub fn cell_at(&self, x: i32, y: i32) -> Tile {
        self.grid.cell_at(x, y)
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn did_win(&self) -> bool {
        self.won
    }

    /// Either terminal flag: no further mutation is accepted.
    pub fn is_finished(&self) -> bool {
        self.game_over || self.won
    }

    pub fn collected_count(&self) -> u32 {
        self.collected
    }

    pub fn required_gems(&self) -> u32 {
        self.required
    }

    pub fn remaining_bombs(&self) -> u32 {
        self.bombs
    }

    /// Cells whose kind changed since the last call.
    pub fn take_dirty(&mut self) -> Vec<(i32, i32)> {
        self.grid.take_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::grid_from;
    use crate::domain::physics::FallState;

    #[test]
    fn begin_level_forces_exit_and_player_cells() {
        let mut w = WorldState::new();
        w.begin_level(grid_from(&["@ G O"]), (0, 0), (4, 0), 1, &RulesConfig::default());
        assert_eq!(w.cell_at(4, 0), Tile::ExitClosed);
        assert_eq!(w.cell_at(0, 0), Tile::Player);
        assert_eq!(w.remaining_bombs(), 3);
        assert_eq!(w.required_gems(), 1);
        assert!(!w.is_finished());
    }

    #[test]
    fn zero_required_gems_opens_exit_at_start() {
        let mut w = WorldState::new();
        w.begin_level(grid_from(&["@  E"]), (0, 0), (3, 0), 0, &RulesConfig::default());
        assert_eq!(w.cell_at(3, 0), Tile::ExitOpen);
    }

    #[test]
    fn fresh_level_marks_every_cell_dirty_and_seeds_gravity() {
        let mut w = WorldState::new();
        w.begin_level(grid_from(&["R ", "@E"]), (0, 1), (1, 1), 0, &RulesConfig::default());
        assert_eq!(w.take_dirty().len(), 4);
        assert!(w.take_dirty().is_empty());
        assert_eq!(w.gravity.state_at(&w.grid, 0, 0), FallState::Active);
    }

    #[test]
    fn camera_centers_small_maps() {
        let mut cam = Camera { x: 0, y: 0, view_w: 20, view_h: 10 };
        cam.center_on((1, 1), 10, 4);
        assert_eq!((cam.x, cam.y), (-5, -3));
    }

    #[test]
    fn camera_follow_respects_dead_zone() {
        let mut cam = Camera { x: 0, y: 0, view_w: 10, view_h: 10 };
        cam.follow((5, 5), 100, 100);
        assert_eq!((cam.x, cam.y), (0, 0));
        cam.follow((9, 5), 100, 100);
        assert_eq!(cam.x, 2);
        cam.follow((99, 5), 100, 100);
        assert_eq!(cam.x, 90);
    }
}
