/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use log::{info, warn};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::physics::FallRules;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub rules: RulesConfig,
    pub gamepad: GamepadConfig,
    pub levels_dir: PathBuf,
    pub debug_keys: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpeedConfig {
    pub tick_ms: u64,         // fixed simulation quantum
    pub move_repeat_ms: u64,  // held-direction repeat interval
}

#[derive(Clone, Debug, PartialEq)]
pub struct RulesConfig {
    pub initial_bombs: u32,
    pub min_side_shaft_depth: usize,
    pub gems_crush: bool,
    pub exit_blast_proof: bool,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub bomb: Vec<String>,
    pub restart: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

impl SpeedConfig {
    pub fn tick_quantum(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn move_repeat(&self) -> Duration {
        Duration::from_millis(self.move_repeat_ms)
    }
}

impl RulesConfig {
    pub fn fall_rules(&self) -> FallRules {
        FallRules {
            min_side_shaft_depth: self.min_side_shaft_depth.max(2),
            gems_crush: self.gems_crush,
        }
    }
}

impl Default for SpeedConfig {
    fn default() -> Self {
        TomlSpeed::default().into()
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        TomlRules::default().into()
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    rules: TomlRules,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_tick_ms")]
    tick_ms: u64,
    #[serde(default = "default_move_repeat")]
    move_repeat_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlRules {
    #[serde(default = "default_bombs")]
    initial_bombs: u32,
    #[serde(default = "default_shaft_depth")]
    min_side_shaft_depth: usize,
    #[serde(default = "default_true")]
    gems_crush: bool,
    #[serde(default = "default_true")]
    exit_blast_proof: bool,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_bomb")]
    bomb: Vec<String>,
    #[serde(default = "default_restart")]
    restart: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default)]
    debug_keys: bool,
}

// ── Defaults ──

fn default_tick_ms() -> u64 { 120 }
fn default_move_repeat() -> u64 { 100 }
fn default_bombs() -> u32 { 3 }
fn default_shaft_depth() -> usize { 2 }
fn default_true() -> bool { true }

fn default_bomb() -> Vec<String> { vec!["A".into(), "X".into()] }
fn default_restart() -> Vec<String> { vec!["Y".into()] }
fn default_confirm() -> Vec<String> { vec!["Start".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }
fn default_levels_dir() -> String { "levels".into() }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed {
            tick_ms: default_tick_ms(),
            move_repeat_ms: default_move_repeat(),
        }
    }
}

impl Default for TomlRules {
    fn default() -> Self {
        TomlRules {
            initial_bombs: default_bombs(),
            min_side_shaft_depth: default_shaft_depth(),
            gems_crush: true,
            exit_blast_proof: true,
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            bomb: default_bomb(),
            restart: default_restart(),
            confirm: default_confirm(),
            cancel: default_cancel(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            debug_keys: false,
        }
    }
}

impl From<TomlSpeed> for SpeedConfig {
    fn from(t: TomlSpeed) -> Self {
        SpeedConfig { tick_ms: t.tick_ms, move_repeat_ms: t.move_repeat_ms }
    }
}

impl From<TomlRules> for RulesConfig {
    fn from(t: TomlRules) -> Self {
        RulesConfig {
            initial_bombs: t.initial_bombs,
            min_side_shaft_depth: t.min_side_shaft_depth,
            gems_crush: t.gems_crush,
            exit_blast_proof: t.exit_blast_proof,
        }
    }
}

// ── Loading ──

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[])
    }
}

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory,
    /// (3) ~/.local/share/digdig, (4) /usr/share/digdig.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse a config document directly. Parse errors fall back to defaults.
    pub fn parse(text: &str) -> Self {
        GameConfig::from_toml(parse_toml(text), &[])
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        // Resolve levels directory
        let levels_dir_str = &toml_cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        GameConfig {
            speed: toml_cfg.speed.into(),
            rules: toml_cfg.rules.into(),
            gamepad: GamepadConfig {
                bomb: toml_cfg.gamepad.bomb,
                restart: toml_cfg.gamepad.restart,
                confirm: toml_cfg.gamepad.confirm,
                cancel: toml_cfg.gamepad.cancel,
            },
            levels_dir,
            debug_keys: toml_cfg.general.debug_keys,
        }
    }
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/digdig");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory
    let sys = PathBuf::from("/usr/share/digdig");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    info!("[Config] loading {}", path.display());
                    return parse_toml(&text);
                }
                Err(e) => {
                    warn!("[Config] could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

fn parse_toml(text: &str) -> TomlConfig {
    match toml::from_str::<TomlConfig>(text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("[Config] config.toml parse error, using defaults: {e}");
            TomlConfig::default()
        }
    }
}
