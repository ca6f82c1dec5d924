/// Movement and blast rules: truth-table driven.
///
/// Pure functions over the grid: no side effects.
/// These encode "what is legal" without performing the action;
/// `sim::step` applies the outcome and notifies gravity.
///
/// ## Move Truth Table
///
/// Destination = player + direction. First matching row wins.
/// ┌──────────────────────────────┬──────────────┬──────────────────┐
/// │ Destination                   │ Outcome      │ Notes            │
/// ├──────────────────────────────┼──────────────┼──────────────────┤
/// │ Wall / ExitClosed / off-grid  │ Blocked      │ off-grid = Wall  │
/// │ Rock, horizontal, Empty beyond│ Push         │ player stays put │
/// │ Rock, otherwise               │ Blocked      │ no vertical push │
/// │ Gem                           │ Collect      │ then walk in     │
/// │ ExitOpen                      │ Enter        │ level won        │
/// │ Empty / Dirt                  │ Walk         │                  │
/// │ anything else                 │ Blocked      │                  │
/// └──────────────────────────────┴──────────────┴──────────────────┘
///
/// ## Blast Truth Table
///
/// 3×3 block centred on the player, clipped to the grid.
/// ┌──────────────────────────────┬──────────────┐
/// │ Cell                          │ Effect       │
/// ├──────────────────────────────┼──────────────┤
/// │ Wall / ExitOpen               │ Immune       │
/// │ ExitClosed (blast-proof exit) │ Immune       │
/// │ centre (player's own cell)    │ KillPlayer   │
/// │ Gem                           │ DestroyGem   │
/// │ anything else                 │ Clear        │
/// └──────────────────────────────┴──────────────┘

use super::entity::MoveDir;
use super::grid::Grid;
use super::tile::Tile;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveOutcome {
    Blocked,
    /// Rock at `rock` slides to `to`; the player does not move.
    Push { rock: (i32, i32), to: (i32, i32) },
    Collect,
    Enter,
    Walk,
}

/// Decide what a step from `from` in `dir` does.
pub fn resolve_move(grid: &Grid, from: (i32, i32), dir: MoveDir) -> MoveOutcome {
    let (dx, dy) = dir.delta();
    let dest = (from.0 + dx, from.1 + dy);
    let tile = grid.cell_at(dest.0, dest.1);

    if tile.is_immovable() {
        return MoveOutcome::Blocked;
    }

    match tile {
        Tile::Rock => {
            let beyond = (dest.0 + dx, dest.1 + dy);
            if dir.is_horizontal() && grid.cell_at(beyond.0, beyond.1) == Tile::Empty {
                MoveOutcome::Push { rock: dest, to: beyond }
            } else {
                MoveOutcome::Blocked
            }
        }
        Tile::Gem => MoveOutcome::Collect,
        Tile::ExitOpen => MoveOutcome::Enter,
        t if t.is_walkable() => MoveOutcome::Walk,
        _ => MoveOutcome::Blocked,
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlastEffect {
    Immune,
    KillPlayer,
    DestroyGem,
    Clear,
}

/// Effect of a blast on one cell.
pub fn blast_effect(tile: Tile, is_centre: bool, exit_blast_proof: bool) -> BlastEffect {
    match tile {
        Tile::Wall | Tile::ExitOpen => BlastEffect::Immune,
        Tile::ExitClosed if exit_blast_proof => BlastEffect::Immune,
        _ if is_centre => BlastEffect::KillPlayer,
        Tile::Gem => BlastEffect::DestroyGem,
        _ => BlastEffect::Clear,
    }
}

/// In-bounds cells of the 3×3 block around `centre`, row-major.
pub fn blast_area(grid: &Grid, centre: (i32, i32)) -> Vec<(i32, i32)> {
    let mut cells = Vec::with_capacity(9);
    for y in centre.1 - 1..=centre.1 + 1 {
        for x in centre.0 - 1..=centre.0 + 1 {
            if grid.in_bounds(x, y) {
                cells.push((x, y));
            }
        }
    }
    cells
}
