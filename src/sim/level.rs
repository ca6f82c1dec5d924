/// Level loader.
///
/// ## Sources (priority order):
///   1. `levels/` directory (individual `.txt` files, sorted by file name)
///   2. Built-in embedded levels
///
/// ## Single-level format (`.txt`):
///   Optional line 1: `; Level Name`
///   Lines: map rows, all the same width
///
/// ## Tile legend:
///   ' ' = Empty      '.' = Dirt        'R' = Rock       'G' = Gem
///   '#' = Wall       'E' = Exit        'O' = Exit (open) '@' = Player
///
/// A level needs exactly one player and exactly one exit. The exit
/// starts closed unless the level holds no gems at all.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::GameConfig;
use crate::domain::grid::Grid;
use crate::domain::tile::Tile;
use crate::sim::world::{Phase, WorldState};

/// A decoded, validated level.
#[derive(Clone, Debug)]
pub struct LevelDef {
    pub name: String,
    pub grid: Grid,
    pub player_start: (i32, i32),
    pub exit_pos: (i32, i32),
    pub required_gems: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelError {
    Empty,
    Ragged { row: usize, len: usize, expected: usize },
    UnknownGlyph { x: usize, y: usize, ch: char },
    PlayerCount(usize),
    ExitCount(usize),
    Io { path: PathBuf, message: String },
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelError::Empty => write!(f, "level has no rows"),
            LevelError::Ragged { row, len, expected } => {
                write!(f, "row {row} is {len} cells wide, expected {expected}")
            }
            LevelError::UnknownGlyph { x, y, ch } => {
                write!(f, "unknown cell {ch:?} at ({x}, {y})")
            }
            LevelError::PlayerCount(n) => {
                write!(f, "level must contain exactly 1 player start; found {n}")
            }
            LevelError::ExitCount(n) => {
                write!(f, "level must contain exactly 1 exit; found {n}")
            }
            LevelError::Io { path, message } => {
                write!(f, "could not read {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for LevelError {}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Load level `level_idx` into the world. Past the last level the
/// phase becomes `GameComplete`.
pub fn load_level(world: &mut WorldState, level_idx: usize, levels: &[LevelDef], config: &GameConfig) {
    let def = match levels.get(level_idx) {
        Some(def) => def,
        None => {
            world.phase = Phase::GameComplete;
            return;
        }
    };

    world.current_level = level_idx;
    world.total_levels = levels.len();
    world.level_name = def.name.clone();
    world.speed = config.speed.clone();
    world.debug_keys = config.debug_keys;
    world.begin_level(
        def.grid.clone(),
        def.player_start,
        def.exit_pos,
        def.required_gems,
        &config.rules,
    );
    world.phase = Phase::Playing;
    world.set_message(&def.name, 20);

    info!(
        "[Level] loaded {} \"{}\" ({}x{}, {} gems)",
        level_idx + 1,
        def.name,
        def.grid.width(),
        def.grid.height(),
        def.required_gems,
    );
}

/// Levels to play: `*.txt` from the levels directory when it holds any
/// valid file, otherwise the embedded set.
pub fn level_list(config: &GameConfig) -> Vec<LevelDef> {
    let from_dir = load_from_directory(&config.levels_dir);
    if from_dir.is_empty() {
        embedded_levels()
    } else {
        from_dir
    }
}

/// Decode one level from text.
pub fn parse_level(content: &str) -> Result<LevelDef, LevelError> {
    let mut lines = content.lines().peekable();
    let mut name = String::new();
    if let Some(first) = lines.peek() {
        if let Some(rest) = first.strip_prefix(';') {
            name = rest.trim().to_string();
            lines.next();
        }
    }

    let mut rows: Vec<&str> = lines.collect();
    while rows.last().map_or(false, |r| r.is_empty()) {
        rows.pop();
    }
    if rows.is_empty() {
        return Err(LevelError::Empty);
    }

    let expected = rows[0].chars().count();
    let mut cells = Vec::with_capacity(rows.len());
    let mut players = vec![];
    let mut exits = vec![];

    for (y, row) in rows.iter().enumerate() {
        let len = row.chars().count();
        if len != expected {
            return Err(LevelError::Ragged { row: y, len, expected });
        }
        let mut line = Vec::with_capacity(len);
        for (x, ch) in row.chars().enumerate() {
            let tile = Tile::from_glyph(ch).ok_or(LevelError::UnknownGlyph { x, y, ch })?;
            match tile {
                Tile::Player => players.push((x as i32, y as i32)),
                t if t.is_exit() => exits.push((x as i32, y as i32)),
                _ => {}
            }
            line.push(tile);
        }
        cells.push(line);
    }

    if players.len() != 1 {
        return Err(LevelError::PlayerCount(players.len()));
    }
    if exits.len() != 1 {
        return Err(LevelError::ExitCount(exits.len()));
    }

    let grid = Grid::from_rows(cells).ok_or(LevelError::Empty)?;
    let required_gems = grid.count(Tile::Gem) as u32;

    Ok(LevelDef {
        name,
        grid,
        player_start: players[0],
        exit_pos: exits[0],
        required_gems,
    })
}

pub fn load_level_file(path: &Path) -> Result<LevelDef, LevelError> {
    let content = std::fs::read_to_string(path).map_err(|e| LevelError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut def = parse_level(&content)?;
    if def.name.is_empty() {
        def.name = path.file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
    }
    Ok(def)
}

// ══════════════════════════════════════════════════════════════
// Directory loading (individual .txt files)
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<LevelDef> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return vec![],
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.extension().map_or(false, |e| e == "txt"))
        .collect();
    paths.sort();

    let mut levels = vec![];
    for path in paths {
        match load_level_file(&path) {
            Ok(def) => levels.push(def),
            Err(e) => warn!("[Level] skipping {}: {e}", path.display()),
        }
    }
    levels
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

fn embedded_levels() -> Vec<LevelDef> {
    [
        ("Level 1 - First Dig", &[
            "####################",
            "#@....R.....G......#",
            "#.....R....###.....#",
            "#..G..R.....R..G...#",
            "#.........R........#",
            "#...####....####...#",
            "#..G.......R.......#",
            "#.....G......R....E#",
            "####################",
        ][..]),
        ("Level 2 - Rockfall", &[
            "########################",
            "#@.....RRR........G....#",
            "#.........  ......R....#",
            "#..G...###  ###...G....#",
            "#......R.......R.......#",
            "#.....  G.R..G  .......#",
            "#..###########.....R...#",
            "#..G....R.......G......#",
            "#.................R...E#",
            "########################",
        ][..]),
        ("Level 3 - Deep Vault", &[
            "##############################",
            "#@....R...R....G....R...R....#",
            "#.###.#.###.####.###.#.###.#.#",
            "#..G....R.....R.....R....G...#",
            "#.RRR..........G.........RRR.#",
            "#.....####....###....####....#",
            "#..G.....R..........R.....G..#",
            "#....R......#....#......R....#",
            "#.####..G...#.GG.#...G..####.#",
            "#...........######...........#",
            "#..R....G..........G....R...E#",
            "##############################",
        ][..]),
    ]
    .iter()
    .filter_map(|(name, rows)| match parse_level(&rows.join("\n")) {
        Ok(mut def) => {
            def.name = name.to_string();
            Some(def)
        }
        Err(e) => {
            warn!("[Level] embedded level \"{name}\" is invalid: {e}");
            None
        }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_grid_and_positions() {
        let def = parse_level("; Tiny\n#@.G#\n# RE#\n").unwrap();
        assert_eq!(def.name, "Tiny");
        assert_eq!((def.grid.width(), def.grid.height()), (5, 2));
        assert_eq!(def.player_start, (1, 0));
        assert_eq!(def.exit_pos, (3, 1));
        assert_eq!(def.required_gems, 1);
        assert_eq!(def.grid.cell_at(2, 1), Tile::Rock);
    }

    #[test]
    fn rejects_malformed_levels() {
        assert_eq!(parse_level("").unwrap_err(), LevelError::Empty);
        assert_eq!(parse_level("; only a name\n\n").unwrap_err(), LevelError::Empty);
        assert_eq!(
            parse_level("#@E#\n##\n").unwrap_err(),
            LevelError::Ragged { row: 1, len: 2, expected: 4 },
        );
        assert_eq!(
            parse_level("#@xE\n").unwrap_err(),
            LevelError::UnknownGlyph { x: 2, y: 0, ch: 'x' },
        );
    }

    #[test]
    fn requires_one_player_and_one_exit() {
        assert_eq!(parse_level(" .E").unwrap_err(), LevelError::PlayerCount(0));
        assert_eq!(parse_level("@@E").unwrap_err(), LevelError::PlayerCount(2));
        assert_eq!(parse_level("@..").unwrap_err(), LevelError::ExitCount(0));
        assert_eq!(parse_level("@EO").unwrap_err(), LevelError::ExitCount(2));
    }

    #[test]
    fn crlf_and_trailing_blank_lines_are_accepted() {
        let def = parse_level("@ E\r\n...\r\n\r\n\n").unwrap();
        assert_eq!(def.grid.height(), 2);
    }

    #[test]
    fn embedded_levels_are_valid() {
        let levels = embedded_levels();
        assert_eq!(levels.len(), 3);
        for def in &levels {
            assert!(def.required_gems > 0, "{} has no gems", def.name);
            assert_eq!(def.grid.cell_at(def.player_start.0, def.player_start.1), Tile::Player);
        }
    }

    #[test]
    fn directory_levels_sorted_and_invalid_skipped() {
        let dir = std::env::temp_dir().join(format!("digdig-levels-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.txt"), "; Second\n@ E\n").unwrap();
        std::fs::write(dir.join("a.txt"), "@G E\n").unwrap();
        std::fs::write(dir.join("c.txt"), "@@\n").unwrap();
        std::fs::write(dir.join("notes.md"), "@ E\n").unwrap();

        let levels = load_from_directory(&dir);
        std::fs::remove_dir_all(&dir).unwrap();

        let names: Vec<&str> = levels.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "Second"]);
    }

    #[test]
    fn loading_past_last_level_completes_game() {
        let levels = embedded_levels();
        let config = GameConfig::default();
        let mut world = WorldState::new();

        load_level(&mut world, 1, &levels, &config);
        assert_eq!(world.phase, Phase::Playing);
        assert_eq!(world.current_level, 1);
        assert_eq!(world.remaining_bombs(), config.rules.initial_bombs);

        load_level(&mut world, 3, &levels, &config);
        assert_eq!(world.phase, Phase::GameComplete);
    }
}
