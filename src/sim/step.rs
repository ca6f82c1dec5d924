/// Player actions and the fixed-timestep driver.
///
/// Two kinds of mutation reach the grid:
///   1. Player actions (`attempt_move`, `detonate`, `restart_level`):
///      instantaneous, run to completion, never accumulated.
///   2. Simulation ticks (`tick`): one gravity step per fixed quantum,
///      driven by `advance` from the caller's variable frame time.
///
/// Every action notifies `Gravity` synchronously, before returning, of the
/// cells it emptied or occupied. Once the game-over or win flag is set,
/// moves, bombs and ticks are no-ops until a restart.

use std::time::Duration;

use log::{debug, info};

use crate::domain::entity::{Intent, MoveDir};
use crate::domain::rules::{self, BlastEffect, MoveOutcome};
use crate::domain::tile::Tile;
use super::event::GameEvent;
use super::world::WorldState;

const MESSAGE_TICKS: u32 = 20;

// ══════════════════════════════════════════════════════════════
// Fixed-timestep driver
// ══════════════════════════════════════════════════════════════

/// Feed elapsed frame time. Runs `tick` once per whole quantum and keeps
/// the remainder for the next call. Paused sessions accumulate nothing.
pub fn advance(world: &mut WorldState, elapsed: Duration) -> Vec<GameEvent> {
    if world.paused { return vec![]; }

    let quantum = world.speed.tick_quantum();
    let mut events = Vec::new();
    world.tick_acc += elapsed;

    while world.tick_acc >= quantum {
        world.tick_acc -= quantum;
        if world.message_timer > 0 {
            world.message_timer -= 1;
            if world.message_timer == 0 { world.message.clear(); }
        }
        events.extend(tick(world));
    }

    events
}

/// One gravity step. A crush ends the session immediately.
pub fn tick(world: &mut WorldState) -> Vec<GameEvent> {
    if world.is_finished() { return vec![]; }
    world.tick += 1;

    if world.gravity.tick(&mut world.grid) {
        let (x, y) = world.player.pos();
        debug!("[Step] tick {}: player crushed at ({x}, {y})", world.tick);
        world.game_over = true;
        return vec![GameEvent::PlayerCrushed { x, y }];
    }

    vec![]
}

/// Dispatch one discrete intent from the input layer.
pub fn apply_intent(world: &mut WorldState, intent: Intent) -> Vec<GameEvent> {
    match intent {
        Intent::Move(dir) => attempt_move(world, dir),
        Intent::Bomb => detonate(world),
        Intent::Restart => restart_level(world),
    }
}

// ══════════════════════════════════════════════════════════════
// Movement: walk / dig / collect / push / exit
// ══════════════════════════════════════════════════════════════

pub fn attempt_move(world: &mut WorldState, dir: MoveDir) -> Vec<GameEvent> {
    if world.is_finished() { return vec![]; }

    let mut events = Vec::new();
    let from = world.player.pos();
    let (dx, dy) = dir.delta();
    let dest = (from.0 + dx, from.1 + dy);

    match rules::resolve_move(&world.grid, from, dir) {
        MoveOutcome::Blocked => {}
        MoveOutcome::Push { rock, to } => {
            // The push consumes the move; the player stays put.
            world.grid.set_cell(to.0, to.1, Tile::Rock);
            world.grid.set_cell(rock.0, rock.1, Tile::Empty);
            world.gravity.rock_pushed(&world.grid, rock, to);
            events.push(GameEvent::RockPushed { from: rock, to });
        }
        MoveOutcome::Collect => {
            world.collected += 1;
            events.push(GameEvent::GemCollected { x: dest.0, y: dest.1 });
            open_exit_if_ready(world, &mut events);
            walk_to(world, dest);
        }
        MoveOutcome::Enter => {
            info!("[Step] level won at ({}, {})", dest.0, dest.1);
            world.won = true;
            events.push(GameEvent::LevelWon);
        }
        MoveOutcome::Walk => walk_to(world, dest),
    }

    events
}

fn walk_to(world: &mut WorldState, dest: (i32, i32)) {
    let from = world.player.pos();
    world.grid.set_cell(from.0, from.1, Tile::Empty);
    world.grid.set_cell(dest.0, dest.1, Tile::Player);
    world.player.x = dest.0;
    world.player.y = dest.1;
    world.gravity.player_moved(&world.grid, from, dest);
}

// ══════════════════════════════════════════════════════════════
// Bomb
// ══════════════════════════════════════════════════════════════

/// Clear the 3×3 block around the player. The player's own cell is part
/// of the block, so the blast is fatal to the player.
pub fn detonate(world: &mut WorldState) -> Vec<GameEvent> {
    if world.is_finished() || world.bombs == 0 { return vec![]; }

    world.bombs -= 1;
    let centre = world.player.pos();
    let mut events = vec![GameEvent::BombDetonated { x: centre.0, y: centre.1 }];
    debug!("[Step] bomb at ({}, {}), {} left", centre.0, centre.1, world.bombs);

    for (x, y) in rules::blast_area(&world.grid, centre) {
        let tile = world.grid.cell_at(x, y);
        let effect = rules::blast_effect(tile, (x, y) == centre, world.rules.exit_blast_proof);
        if effect == BlastEffect::Immune { continue; }

        if tile != Tile::Empty {
            events.push(GameEvent::CellBlasted { x, y });
        }
        world.grid.set_cell(x, y, Tile::Empty);
        world.gravity.cell_cleared(&world.grid, x, y);

        match effect {
            BlastEffect::KillPlayer => {
                debug!("[Step] player caught in own blast");
                        world.game_over = true;
                events.push(GameEvent::PlayerBlasted);
            }
            BlastEffect::DestroyGem => {
                world.required = world.required.saturating_sub(1);
                open_exit_if_ready(world, &mut events);
            }
            _ => {}
        }
    }

    events
}

// ══════════════════════════════════════════════════════════════
// Session control
// ══════════════════════════════════════════════════════════════

pub fn restart_level(world: &mut WorldState) -> Vec<GameEvent> {
    world.reset_session();
    world.message.clear();
    world.message_timer = 0;
    info!("[Step] level {} restarted", world.current_level + 1);
    vec![GameEvent::LevelRestarted]
}

/// Debug cheat: mark the level won without reaching the exit.
pub fn skip_level(world: &mut WorldState) -> Vec<GameEvent> {
    if !world.debug_keys || world.is_finished() { return vec![]; }
    info!("[Step] level {} skipped", world.current_level + 1);
    world.won = true;
    vec![GameEvent::LevelWon]
}

// ══════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════

/// Open the exit once enough gems are in hand. Only a closed exit at the
/// known position is opened, so the transition happens at most once.
fn open_exit_if_ready(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    if world.collected < world.required { return; }
    let (x, y) = world.exit_pos;
    if world.grid.cell_at(x, y) != Tile::ExitClosed { return; }

    world.grid.set_cell(x, y, Tile::ExitOpen);
    debug!("[Step] exit opened at ({x}, {y})");
    world.set_message("The exit is open!", MESSAGE_TICKS);
    events.push(GameEvent::ExitOpened { x, y });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::domain::grid::{grid_from, rows_of};
    use crate::domain::physics::FallState;

    fn world_from(rows: &[&str], rules: RulesConfig) -> WorldState {
        let grid = grid_from(rows);
        let player = grid.positions_where(|t| t == Tile::Player)[0];
        let exit = grid.positions_where(Tile::is_exit)[0];
        let gems = grid.count(Tile::Gem) as u32;
        let mut w = WorldState::new();
        w.begin_level(grid, player, exit, gems, &rules);
        w.take_dirty();
        w
    }

    fn world(rows: &[&str]) -> WorldState {
        world_from(rows, RulesConfig::default())
    }

    fn ticks(w: &mut WorldState, n: usize) -> Vec<GameEvent> {
        (0..n).flat_map(|_| tick(w)).collect()
    }

    // ── Movement ──

    #[test]
    fn walking_digs_dirt_and_tracks_position() {
        let mut w = world(&["#@.E#"]);
        attempt_move(&mut w, MoveDir::Right);
        assert_eq!(w.player.pos(), (2, 0));
        assert_eq!(rows_of(&w.grid), vec!["# @O#"]);
        assert_eq!(w.take_dirty(), vec![(1, 0), (2, 0)]);
    }

    #[test]
    fn push_moves_rock_one_cell_and_player_stays() {
        let mut w = world(&["#@R  E#"]);
        let ev = attempt_move(&mut w, MoveDir::Right);
        assert_eq!(ev, vec![GameEvent::RockPushed { from: (2, 0), to: (3, 0) }]);
        assert_eq!(rows_of(&w.grid), vec!["#@ R O#"]);
        assert_eq!(w.player.pos(), (1, 0));
    }

    #[test]
    fn blocked_push_changes_nothing() {
        let mut w = world(&["#@R.E#"]);
        let ev = attempt_move(&mut w, MoveDir::Right);
        assert!(ev.is_empty());
        assert_eq!(rows_of(&w.grid), vec!["#@R.O#"]);
        assert_eq!(w.player.pos(), (1, 0));
        assert!(w.take_dirty().is_empty());
    }

    #[test]
    fn walls_and_closed_exit_reject_moves() {
        let mut w = world(&["#@EG"]);
        attempt_move(&mut w, MoveDir::Left);
        attempt_move(&mut w, MoveDir::Right);
        attempt_move(&mut w, MoveDir::Up);
        assert_eq!(w.player.pos(), (1, 0));
        assert!(w.take_dirty().is_empty());
    }

    #[test]
    fn last_gem_opens_exit_once_and_exit_wins() {
        let mut w = world(&["@GGO"]);
        assert_eq!(w.cell_at(3, 0), Tile::ExitClosed);

        let ev = attempt_move(&mut w, MoveDir::Right);
        assert_eq!(ev, vec![GameEvent::GemCollected { x: 1, y: 0 }]);
        assert_eq!(w.cell_at(3, 0), Tile::ExitClosed);

        let ev = attempt_move(&mut w, MoveDir::Right);
        assert_eq!(ev, vec![
            GameEvent::GemCollected { x: 2, y: 0 },
            GameEvent::ExitOpened { x: 3, y: 0 },
        ]);
        assert_eq!(w.collected_count(), 2);
        assert_eq!(w.cell_at(3, 0), Tile::ExitOpen);

        let ev = attempt_move(&mut w, MoveDir::Right);
        assert_eq!(ev, vec![GameEvent::LevelWon]);
        assert!(w.did_win());
        assert_eq!(w.player.pos(), (2, 0));

        w.take_dirty();
        assert!(attempt_move(&mut w, MoveDir::Left).is_empty());
        assert!(detonate(&mut w).is_empty());
        assert!(ticks(&mut w, 3).is_empty());
        assert!(w.take_dirty().is_empty());
        assert_eq!(w.remaining_bombs(), 3);
    }

    #[test]
    fn walking_under_resting_rock_is_safe() {
        let mut w = world(&[
            "#####",
            "##R##",
            "#@. #",
            "#####",
            "E    ",
        ]);
        ticks(&mut w, 2);
        attempt_move(&mut w, MoveDir::Right);
        assert!(ticks(&mut w, 10).is_empty());
        assert!(!w.is_game_over());
        assert_eq!(w.cell_at(2, 1), Tile::Rock);
    }

    // ── Gravity through the session ──

    #[test]
    fn rock_resting_on_player_only_crushes_after_moving_again() {
        let mut w = world(&[
            "# R #",
            "# @ #",
            "#   #",
            "#   #",
            "##E##",
        ]);
        // Resting on the player's head from level start: armed, harmless.
        assert!(ticks(&mut w, 20).is_empty());
        assert!(!w.is_game_over());

        // Step down out from under it; it drops a row and then lands on us.
        attempt_move(&mut w, MoveDir::Down);
        assert!(tick(&mut w).is_empty());
        assert_eq!(w.cell_at(2, 1), Tile::Rock);
        assert_eq!(tick(&mut w), vec![GameEvent::PlayerCrushed { x: 2, y: 2 }]);
        assert!(w.is_game_over());
        assert_eq!(w.cell_at(2, 2), Tile::Rock);
        assert_eq!(w.cell_at(2, 1), Tile::Empty);
    }

    #[test]
    fn advance_runs_whole_quanta_only() {
        let mut w = world(&[
            "@R E",
            "    ",
            "    ",
            "    ",
        ]);
        advance(&mut w, Duration::from_millis(250));
        assert_eq!(w.tick, 2);
        assert_eq!(w.cell_at(1, 2), Tile::Rock);
        assert_eq!(w.tick_acc, Duration::from_millis(10));

        advance(&mut w, Duration::from_millis(110));
        assert_eq!(w.tick, 3);
        assert_eq!(w.cell_at(1, 3), Tile::Rock);
        assert_eq!(w.tick_acc, Duration::ZERO);

        advance(&mut w, Duration::from_millis(50));
        assert_eq!(w.tick, 3);
    }

    #[test]
    fn paused_session_does_not_accumulate() {
        let mut w = world(&["@R E", "    "]);
        w.paused = true;
        advance(&mut w, Duration::from_secs(5));
        assert_eq!(w.tick, 0);
        assert_eq!(w.tick_acc, Duration::ZERO);
        assert_eq!(w.cell_at(1, 0), Tile::Rock);
    }

    // ── Bomb ──

    #[test]
    fn detonate_without_bombs_is_noop() {
        let rules = RulesConfig { initial_bombs: 0, ..RulesConfig::default() };
        let mut w = world_from(&["#.@.E"], rules);
        assert!(detonate(&mut w).is_empty());
        assert_eq!(rows_of(&w.grid), vec!["#.@.O"]);
        assert_eq!(w.remaining_bombs(), 0);
        assert!(!w.is_game_over());
        assert!(w.take_dirty().is_empty());
    }

    #[test]
    fn blast_clears_block_and_kills_player() {
        let mut w = world(&[
            "#####",
            "#.R.#",
            "#G@ #",
            "#.E.#",
            "#####",
        ]);
        assert_eq!(w.required_gems(), 1);

        let ev = detonate(&mut w);
        assert_eq!(rows_of(&w.grid), vec![
            "#####",
            "#   #",
            "#   #",
            "# O #",
            "#####",
        ]);
        assert_eq!(w.remaining_bombs(), 2);
        assert_eq!(w.required_gems(), 0);
        assert!(w.is_game_over());
        assert!(ev.contains(&GameEvent::PlayerBlasted));
        assert!(ev.contains(&GameEvent::ExitOpened { x: 2, y: 3 }));
        assert_eq!(ev[0], GameEvent::BombDetonated { x: 2, y: 2 });
    }

    #[test]
    fn closed_exit_blast_policy() {
        let rows = ["G    ", " .@. ", " .E. "];

        let mut w = world(&rows);
        detonate(&mut w);
        assert_eq!(w.cell_at(2, 2), Tile::ExitClosed);

        let rules = RulesConfig { exit_blast_proof: false, ..RulesConfig::default() };
        let mut w = world_from(&rows, rules);
        detonate(&mut w);
        assert_eq!(w.cell_at(2, 2), Tile::Empty);
    }

    #[test]
    fn blast_wakes_rock_above_cleared_cell() {
        let mut w = world(&[
            "#R#  ",
            "#.#  ",
            "#@  E",
        ]);
        ticks(&mut w, 1);
        assert_eq!(w.gravity.state_at(&w.grid, 1, 0), FallState::Resting);
        detonate(&mut w);
        assert_eq!(w.cell_at(1, 1), Tile::Empty);
        assert_eq!(w.gravity.state_at(&w.grid, 1, 0), FallState::Active);
    }

    // ── Restart ──

    #[test]
    fn restart_restores_snapshot_and_replays_identically() {
        let rows = [
            "#####",
            "#RGR#",
            "#   #",
            "#@ E#",
            "#####",
        ];
        let mut fresh = world(&rows);
        let mut w = world(&rows);

        detonate(&mut w);
        assert!(w.is_game_over());
        let ev = restart_level(&mut w);
        assert_eq!(ev, vec![GameEvent::LevelRestarted]);

        assert_eq!(rows_of(&w.grid), rows_of(&fresh.grid));
        assert_eq!(w.player.pos(), (1, 3));
        assert_eq!(w.collected_count(), 0);
        assert_eq!(w.required_gems(), 1);
        assert_eq!(w.remaining_bombs(), 3);
        assert!(!w.is_game_over() && !w.did_win());
        assert_eq!(w.take_dirty().len(), 25);

        for _ in 0..3 {
            assert_eq!(tick(&mut w), tick(&mut fresh));
            assert_eq!(rows_of(&w.grid), rows_of(&fresh.grid));
        }
        assert!(w.is_game_over() && fresh.is_game_over());
    }

    // ── Debug cheat ──

    #[test]
    fn skip_level_requires_debug_keys() {
        let mut w = world(&["@ E"]);
        assert!(skip_level(&mut w).is_empty());
        w.debug_keys = true;
        assert_eq!(skip_level(&mut w), vec![GameEvent::LevelWon]);
        assert!(w.did_win());
    }

    #[test]
    fn intents_dispatch_to_actions() {
        let mut w = world(&["#@ E"]);
        apply_intent(&mut w, Intent::Move(MoveDir::Right));
        assert_eq!(w.player.pos(), (2, 0));
        apply_intent(&mut w, Intent::Restart);
        assert_eq!(w.player.pos(), (1, 0));
    }
}
