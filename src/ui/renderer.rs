/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Refresh the cached map layer for the cells the grid reports dirty
///   2. Build the next frame into `front` buffer (array of Cell)
///   3. Compare each cell with `back` buffer (previous frame)
///   4. Only emit terminal commands for cells that changed
///   5. All commands are batched with `queue!`, flushed once at the end
///   6. Swap front/back
///
/// The map layer lives in world coordinates, so scrolling the camera
/// never re-reads the grid; it only changes which layer cells are copied.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::tile::Tile;
use crate::sim::world::{Phase, WorldState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells.
    ///
    /// On VTE-based terminals the inter-row gap pixels take the colour of
    /// the last Clear. Using the same RGB for `Clear(ClearType::All)` and
    /// every cell background keeps those gaps invisible.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    /// Normalize bg: Color::Reset → BASE_BG so that every cell gets an
    /// explicit background color (never terminal-default).
    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(ch: char, fg: Color, bg: Color) -> Self {
        Cell { ch, fg, bg: Self::norm_bg(bg) }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::from_char(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::from_char(' ', Color::White, bg));
        }
    }
}

// ── Tile glyphs ──

/// One world cell is drawn as two terminal columns.
const CELL_W: usize = 2;

const DIRT_BG: Color = Color::Rgb { r: 58, g: 40, b: 26 };
const WALL_BG: Color = Color::Rgb { r: 62, g: 62, b: 78 };

/// Both terminal columns of one world cell.
fn tile_cells(tile: Tile) -> [Cell; CELL_W] {
    let (glyph, fg, bg) = match tile {
        Tile::Empty => ("  ", Color::White, Cell::BASE_BG),
        Tile::Dirt => ("░░", Color::Rgb { r: 140, g: 100, b: 60 }, DIRT_BG),
        Tile::Rock => ("()", Color::Rgb { r: 200, g: 200, b: 210 }, Cell::BASE_BG),
        Tile::Gem => ("<>", Color::Rgb { r: 80, g: 230, b: 255 }, Cell::BASE_BG),
        Tile::Wall => ("▓▓", Color::Rgb { r: 120, g: 120, b: 140 }, WALL_BG),
        Tile::ExitClosed => ("[]", Color::Rgb { r: 160, g: 60, b: 60 }, Cell::BASE_BG),
        Tile::ExitOpen => ("[]", Color::Black, Color::Rgb { r: 80, g: 220, b: 80 }),
        Tile::Player => ("@@", Color::Rgb { r: 255, g: 220, b: 50 }, Cell::BASE_BG),
    };
    let mut chars = glyph.chars();
    let mut next = || Cell::from_char(chars.next().unwrap_or(' '), fg, bg);
    [next(), next()]
}

// ── MapLayer: cached tile cells in world coordinates ──

struct MapLayer {
    width: usize,
    height: usize,
    cells: Vec<[Cell; CELL_W]>,
}

impl MapLayer {
    fn new() -> Self {
        MapLayer { width: 0, height: 0, cells: vec![] }
    }

    /// Pull the grid's dirty cells into the layer. Returns how many
    /// cells were refreshed.
    ///
    /// A level load or restart marks every cell dirty, so a size change
    /// only needs a blank allocation here.
    fn sync(&mut self, world: &mut WorldState) -> usize {
        let (w, h) = (world.grid.width(), world.grid.height());
        if w != self.width || h != self.height {
            self.width = w;
            self.height = h;
            self.cells = vec![[Cell::BLANK; CELL_W]; w * h];
        }

        let dirty = world.take_dirty();
        for &(x, y) in &dirty {
            if let Some(idx) = world.grid.index(x, y) {
                self.cells[idx] = tile_cells(world.grid.cell_at(x, y));
            }
        }
        dirty.len()
    }

    fn get(&self, x: i32, y: i32) -> Option<[Cell; CELL_W]> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        self.cells.get(y as usize * self.width + x as usize).copied()
    }
}

// ── HUD text ──

fn hud_line(w: &WorldState) -> String {
    format!(" Gems: {}/{}   Bombs: {}", w.collected_count(), w.required_gems(), w.remaining_bombs())
}

fn status_text(w: &WorldState) -> Option<&'static str> {
    if w.is_game_over() {
        Some("GAME OVER (R to restart)")
    } else if w.did_win() {
        Some("YOU WIN!")
    } else {
        None
    }
}

// ── Renderer ──

/// Vertical offsets
const HUD_ROW: usize = 0;
const NAME_ROW: usize = 1;
const MAP_ROW: usize = 3;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const GOLD: Color = Color::Rgb { r: 255, g: 200, b: 50 };
const GREEN: Color = Color::Rgb { r: 80, g: 255, b: 80 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    map: MapLayer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
    /// The terminal reports key Release events.
    key_release: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            map: MapLayer::new(),
            term_w: 0,
            term_h: 0,
            last_phase: None,
            key_release: false,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                self.writer,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            self.key_release = true;
        }

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    /// Whether `init` turned on key Release reporting.
    pub fn reports_key_release(&self) -> bool {
        self.key_release
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.key_release {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
            self.key_release = false;
        }
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, world: &mut WorldState) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Viewport: terminal cols / CELL_W wide, terminal rows minus
        // HUD, name, message and help rows high; capped to the world.
        let reserved_rows = MAP_ROW + 4;
        let (world_w, world_h) = (world.grid.width(), world.grid.height());
        world.camera.view_w = (self.term_w / CELL_W).min(world_w.max(1));
        world.camera.view_h = self.term_h.saturating_sub(reserved_rows).max(1).min(world_h.max(1));

        let phase_changed = self.last_phase != Some(world.phase);
        if phase_changed {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
        }

        self.map.sync(world);

        match world.phase {
            Phase::Playing => world.camera.follow(world.player.pos(), world_w, world_h),
            Phase::LevelComplete => world.camera.center_on(world.player.pos(), world_w, world_h),
            Phase::Title | Phase::GameComplete => {}
        }

        self.front.clear();

        match world.phase {
            Phase::Title => self.compose_title(world),
            Phase::Playing => self.compose_game(world),
            Phase::LevelComplete => {
                self.compose_game(world);
                self.compose_level_complete(world);
            }
            Phase::GameComplete => self.compose_game_complete(world),
        }

        if world.paused && world.phase == Phase::Playing {
            self.compose_pause_overlay(world);
        }

        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);

        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        // Explicit base colours; ResetColor would fall back to the
        // terminal's own default and show line artifacts.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_game(&mut self, w: &WorldState) {
        let buf_w = self.front.width;
        let cam = &w.camera;

        // ── HUD row ──
        self.front.fill_row(HUD_ROW, HUD_BG);
        let hud = hud_line(w);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
        if let Some(status) = status_text(w) {
            let color = if w.did_win() { GREEN } else { Color::Rgb { r: 255, g: 80, b: 80 } };
            self.front.put_str(hud.chars().count() + 4, HUD_ROW, status, color, HUD_BG);
        }

        let name = format!(" Level {}/{}: {}", w.current_level + 1, w.total_levels, w.level_name);
        self.front.put_str(0, NAME_ROW, &name, GOLD, Color::Reset);

        // ── Map (camera viewport) ──
        for vy in 0..cam.view_h {
            let row = MAP_ROW + vy;
            if row >= self.front.height { break; }
            let wy = cam.y + vy as i32;

            for vx in 0..cam.view_w {
                let col = vx * CELL_W;
                if col + 1 >= buf_w { break; }
                let wx = cam.x + vx as i32;

                let pair = self.map.get(wx, wy).unwrap_or([Cell::BLANK; CELL_W]);
                self.front.set(col, row, pair[0]);
                self.front.set(col + 1, row, pair[1]);
            }
        }

        // ── Message bar ──
        let msg_row = MAP_ROW + cam.view_h + 1;
        if msg_row < self.front.height && w.message_timer > 0 && !w.message.is_empty() {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(0, msg_row, &format!(" ◈ {} ", w.message), Color::Black, MSG_BG);
        }

        // ── Help bar ──
        let help_row = MAP_ROW + cam.view_h + 2;
        if help_row < self.front.height {
            let help = " ←→↑↓/WASD:Move  Space:Bomb  R:Restart  F1:Pause  Esc:Title";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    fn compose_title(&mut self, w: &WorldState) {
        let title = [
            r"  ___   _        ___   _        ",
            r" |   \ (_) __ _ |   \ (_) __ _  ",
            r" | |) || |/ _` || |) || |/ _` | ",
            r" |___/ |_|\__, ||___/ |_|\__, | ",
            r"          |___/          |___/  ",
        ];
        for (i, line) in title.iter().enumerate() {
            self.front.put_str(2, 1 + i, line, GOLD, Color::Reset);
        }

        let tagline = "━━━ rocks fall, gems shine ━━━";
        let tx = 2 + title[1].len().saturating_sub(tagline.chars().count()) / 2;
        self.front.put_str(tx, 7, tagline, Color::Rgb { r: 180, g: 140, b: 50 }, Color::Reset);

        let menu_base = 9;
        self.front.put_str(6, menu_base, "ENTER   Start", GREEN, Color::Reset);
        self.front.put_str(6, menu_base + 1, " 1-9    Jump to level", Color::White, Color::Reset);
        self.front.put_str(6, menu_base + 2, " ESC    Quit", Color::White, Color::Reset);

        let list_base = menu_base + 4;
        let shown = w.level_names.len().min(9);
        for (i, name) in w.level_names.iter().take(shown).enumerate() {
            let line = format!("{:>3}. {}", i + 1, name);
            self.front.put_str(6, list_base + i, &line, Color::DarkGrey, Color::Reset);
        }
        if w.level_names.len() > shown {
            let more = format!("     … {} more", w.level_names.len() - shown);
            self.front.put_str(6, list_base + shown, &more, Color::DarkGrey, Color::Reset);
        }

        let help = [
            "Controls",
            "  ←→↑↓ / WASD  Move / dig / push",
            "  Space        Drop a bomb",
            "  R            Restart level",
            "  F1           Pause",
        ];
        let help_base = list_base + shown + 2;
        for (i, line) in help.iter().enumerate() {
            let color = if i == 0 { GOLD } else { Color::White };
            self.front.put_str(6, help_base + i, line, color, Color::Reset);
        }
    }

    /// Framed box centred on the map viewport.
    fn compose_box(&mut self, w: &WorldState, lines: &[(String, Color)], frame: Color) {
        let bg = Color::Rgb { r: 40, g: 40, b: 40 };
        let inner = lines.iter().map(|(s, _)| s.chars().count()).max().unwrap_or(0) + 4;
        let box_w = inner + 2;
        let box_h = lines.len() + 2;
        let view_cols = (w.camera.view_w * CELL_W).max(box_w);
        let box_x = (view_cols - box_w) / 2;
        let box_y = MAP_ROW + w.camera.view_h.saturating_sub(box_h) / 2;

        let rule = "═".repeat(inner);
        self.front.put_str(box_x, box_y, &format!("╔{rule}╗"), frame, bg);
        for (i, (text, color)) in lines.iter().enumerate() {
            let row = box_y + 1 + i;
            self.front.put_str(box_x, row, &format!("║{}║", " ".repeat(inner)), frame, bg);
            self.front.put_str(box_x + 3, row, text, *color, bg);
        }
        self.front.put_str(box_x, box_y + box_h - 1, &format!("╚{rule}╝"), frame, bg);
    }

    fn compose_level_complete(&mut self, w: &WorldState) {
        let next = if w.current_level + 1 < w.total_levels {
            "▸ ENTER: Next level"
        } else {
            "▸ ENTER: Finish"
        };
        let lines = [
            ("★ LEVEL CLEAR ★".to_string(), GOLD),
            (String::new(), Color::White),
            (w.level_name.clone(), Color::White),
            (format!("Gems: {}/{}", w.collected_count(), w.required_gems()), Color::White),
            (String::new(), Color::White),
            (next.to_string(), GREEN),
            ("▸ ESC:   Title".to_string(), Color::DarkGrey),
        ];
        self.compose_box(w, &lines, GOLD);
    }

    fn compose_game_complete(&mut self, w: &WorldState) {
        let box_art = [
            "╔══════════════════════════════════╗",
            "║   ★ ALL LEVELS CLEARED!  ★       ║",
            "╚══════════════════════════════════╝",
        ];
        for (i, l) in box_art.iter().enumerate() {
            self.front.put_str(4, 4 + i, l, Color::Rgb { r: 255, g: 220, b: 50 }, Color::Reset);
        }
        let levels = format!("◈ {} levels dug out", w.total_levels);
        self.front.put_str(6, 9, &levels, GREEN, Color::Reset);
        self.front.put_str(6, 11, "▸ ENTER / ESC: Back to Title", GREEN, Color::Reset);
    }

    fn compose_pause_overlay(&mut self, w: &WorldState) {
        let key_c = Color::Rgb { r: 100, g: 200, b: 255 };
        let lines = [
            ("PAUSED".to_string(), GOLD),
            (String::new(), Color::White),
            ("F1   Resume".to_string(), key_c),
            ("R    Restart level".to_string(), key_c),
            ("ESC  Back to title".to_string(), key_c),
        ];
        self.compose_box(w, &lines, GOLD);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::domain::entity::MoveDir;
    use crate::domain::grid::grid_from;
    use crate::sim::step::attempt_move;

    fn world(rows: &[&str], player: (i32, i32), exit: (i32, i32), gems: u32) -> WorldState {
        let mut w = WorldState::new();
        w.begin_level(grid_from(rows), player, exit, gems, &RulesConfig::default());
        w
    }

    #[test]
    fn every_tile_fills_both_columns() {
        for tile in Tile::ALL {
            let [a, b] = tile_cells(tile);
            assert_ne!(a.ch, '\0', "{tile:?}");
            assert_ne!(b.ch, '\0', "{tile:?}");
        }
        assert_ne!(tile_cells(Tile::ExitClosed), tile_cells(Tile::ExitOpen));
    }

    #[test]
    fn map_layer_refreshes_only_dirty_cells() {
        let mut w = world(&["@ GE"], (0, 0), (3, 0), 1);
        let mut layer = MapLayer::new();

        assert_eq!(layer.sync(&mut w), 4);
        assert_eq!(layer.get(0, 0), Some(tile_cells(Tile::Player)));
        assert_eq!(layer.get(3, 0), Some(tile_cells(Tile::ExitClosed)));
        assert_eq!(layer.sync(&mut w), 0);

        attempt_move(&mut w, MoveDir::Right);
        assert_eq!(layer.sync(&mut w), 2);
        assert_eq!(layer.get(0, 0), Some(tile_cells(Tile::Empty)));
        assert_eq!(layer.get(1, 0), Some(tile_cells(Tile::Player)));
        assert_eq!(layer.get(4, 0), None);
        assert_eq!(layer.get(-1, 0), None);
    }

    #[test]
    fn new_level_size_reallocates_layer() {
        let mut w = world(&["@ GE"], (0, 0), (3, 0), 1);
        let mut layer = MapLayer::new();
        layer.sync(&mut w);

        w.begin_level(grid_from(&["@.", ".E"]), (0, 0), (1, 1), 0, &RulesConfig::default());
        assert_eq!(layer.sync(&mut w), 4);
        assert_eq!((layer.width, layer.height), (2, 2));
        assert_eq!(layer.get(1, 1), Some(tile_cells(Tile::ExitOpen)));
    }

    #[test]
    fn hud_shows_counters_and_terminal_status() {
        let mut w = world(&["@G E"], (0, 0), (3, 0), 1);
        assert_eq!(hud_line(&w), " Gems: 0/1   Bombs: 3");
        assert_eq!(status_text(&w), None);

        w.game_over = true;
        assert_eq!(status_text(&w), Some("GAME OVER (R to restart)"));
        w.game_over = false;
        w.won = true;
        assert_eq!(status_text(&w), Some("YOU WIN!"));
    }

    #[test]
    fn put_str_clips_at_buffer_edge() {
        let mut fb = FrameBuffer::new(3, 1);
        fb.put_str(1, 0, "abc", Color::White, Color::Reset);
        assert_eq!(fb.get(1, 0).ch, 'a');
        assert_eq!(fb.get(2, 0).ch, 'b');
        assert_eq!(fb.get(2, 0).bg, Cell::BASE_BG);
        assert_eq!(fb.get(3, 0), Cell::BLANK);
    }
}
