/// Entry point and game loop.

use std::fs::File;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::KeyCode;
use log::info;

use digdig::config::GameConfig;
use digdig::domain::entity::{Intent, MoveDir};
use digdig::sim::event::GameEvent;
use digdig::sim::level::{self, LevelDef};
use digdig::sim::step;
use digdig::sim::world::{Phase, WorldState};
use digdig::ui::gamepad::GamepadState;
use digdig::ui::input::{DirectionRepeat, InputState};
use digdig::ui::renderer::Renderer;
use digdig::ui::sound::{play_events, SoundEngine};

const FRAME_SLEEP: Duration = Duration::from_millis(5);
const MESSAGE_TICKS: u32 = 30;

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = GameConfig::load();
    let levels = level::level_list(&config);
    info!("[Main] {} levels available", levels.len());

    let mut world = WorldState::new();
    world.level_names = levels.iter().map(|d| d.name.clone()).collect();
    world.total_levels = levels.len();

    let mut renderer = Renderer::new();
    renderer.init().context("terminal init failed")?;

    let sound = SoundEngine::new();

    let result = game_loop(&mut world, &mut renderer, sound.as_ref(), &config, &levels);
    let cleanup = renderer.cleanup();
    result?;
    cleanup.context("terminal cleanup failed")?;

    println!();
    println!("Thanks for playing DigDig!");
    Ok(())
}

/// Logging is opt-in via `RUST_LOG` and goes to `digdig.log`; the
/// alternate screen owns stdout and stderr.
fn init_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let file = match File::create("digdig.log") {
        Ok(f) => f,
        Err(_) => return,
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
    levels: &[LevelDef],
) -> anyhow::Result<()> {
    let mut kb = InputState::new();
    kb.honor_release = renderer.reports_key_release();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    let mut repeat = DirectionRepeat::new(config.speed.move_repeat());
    let mut last_frame = Instant::now();

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(last_frame);
        last_frame = now;

        match handle_meta(world, &kb, &gp, config, levels) {
            Flow::Quit => break,
            Flow::Reset => repeat.reset(),
            Flow::Continue => {}
        }

        if world.phase == Phase::Playing && !world.paused {
            let mut events = vec![];

            if kb.any_pressed(KEYS_BOMB) || gp.bomb_pressed() {
                let blast = step::apply_intent(world, Intent::Bomb);
                if blast.is_empty() && !world.is_finished() {
                    world.set_message("No bombs left", MESSAGE_TICKS);
                }
                events.extend(blast);
            }

            let held = merge_dirs(kb.held_dirs(), gp.held_dirs());
            let fresh = merge_dirs(kb.fresh_dirs(), gp.fresh_dirs());
            if let Some(dir) = repeat.update(&held, &fresh, now) {
                events.extend(step::apply_intent(world, Intent::Move(dir)));
            }

            events.extend(step::advance(world, elapsed));

            play_events(sound, &events);
            announce(world, &events);

            if world.did_win() {
                world.phase = Phase::LevelComplete;
                repeat.reset();
            }
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

fn merge_dirs(mut a: Vec<MoveDir>, b: Vec<MoveDir>) -> Vec<MoveDir> {
    for d in b {
        if !a.contains(&d) {
            a.push(d);
        }
    }
    a
}

/// Message-line text for the events that end a session.
fn announce(world: &mut WorldState, events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::PlayerCrushed { .. } => world.set_message("Crushed!", MESSAGE_TICKS),
            GameEvent::PlayerBlasted => world.set_message("Caught in the blast!", MESSAGE_TICKS),
            _ => {}
        }
    }
}

// ── Key Constants ──

const KEYS_BOMB: &[KeyCode] = &[KeyCode::Char(' ')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
const KEYS_SKIP: &[KeyCode] = &[KeyCode::Char('k'), KeyCode::Char('K')];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter];

/// Level index for a freshly pressed 1-9 key.
fn level_key(kb: &InputState) -> Option<usize> {
    ('1'..='9').position(|c| kb.was_pressed(KeyCode::Char(c)))
}

/// What the game loop should do after meta-key handling.
enum Flow {
    Continue,
    /// The session changed under the player; drop held directions.
    Reset,
    Quit,
}

/// Reset to title screen, preserving the level list.
fn return_to_title(world: &mut WorldState) {
    let names = std::mem::take(&mut world.level_names);
    *world = WorldState::new();
    world.total_levels = names.len();
    world.level_names = names;
}

fn jump_to_level(world: &mut WorldState, idx: usize, levels: &[LevelDef], config: &GameConfig) -> bool {
    if idx >= levels.len() {
        return false;
    }
    level::load_level(world, idx, levels, config);
    true
}

fn handle_meta(
    world: &mut WorldState,
    kb: &InputState,
    gp: &GamepadState,
    config: &GameConfig,
    levels: &[LevelDef],
) -> Flow {
    let confirm = kb.any_pressed(KEYS_CONFIRM) || gp.confirm_pressed();
    let esc = kb.any_pressed(&[KeyCode::Esc]) || gp.cancel_pressed();
    let restart = kb.any_pressed(KEYS_RESTART) || gp.restart_pressed();

    match world.phase {
        Phase::Title => {
            if esc {
                return Flow::Quit;
            }
            if confirm && jump_to_level(world, 0, levels, config) {
                return Flow::Reset;
            }
            if let Some(idx) = level_key(kb) {
                if jump_to_level(world, idx, levels, config) {
                    return Flow::Reset;
                }
            }
        }

        Phase::Playing => {
            // F1 / Start: Pause / Resume
            if kb.any_pressed(&[KeyCode::F(1)]) || gp.confirm_pressed() {
                world.paused = !world.paused;
                return Flow::Reset;
            }
            if esc {
                return_to_title(world);
                return Flow::Reset;
            }
            if restart {
                step::restart_level(world);
                world.set_message("Level restarted", MESSAGE_TICKS);
                return Flow::Reset;
            }
            // Everything else is blocked while paused
            if world.paused {
                return Flow::Continue;
            }
            if let Some(idx) = level_key(kb) {
                if jump_to_level(world, idx, levels, config) {
                    return Flow::Reset;
                }
            }
            if kb.any_pressed(KEYS_SKIP) {
                step::skip_level(world);
            }
        }

        Phase::LevelComplete => {
            if esc {
                return_to_title(world);
                return Flow::Reset;
            }
            if confirm {
                level::load_level(world, world.current_level + 1, levels, config);
                return Flow::Reset;
            }
        }

        Phase::GameComplete => {
            if confirm || esc {
                return_to_title(world);
                return Flow::Reset;
            }
        }
    }

    Flow::Continue
}
