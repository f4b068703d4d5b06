/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// One tile is drawn as `CELL_W` terminal columns. The camera works in
/// pixels; the view starts at the tile under `camera.(x, y)`.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::{EntityKind, Facing};
use crate::domain::tile::Tile;
use crate::sim::world::{GameSession, Phase};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel that differs from any real cell, forcing a full repaint.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        Cell { ch, fg, bg }
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
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
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

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Renderer ──

/// Terminal columns per tile.
const CELL_W: usize = 2;

/// Vertical layout
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// HUD + gap above the map, status + help below it.
const RESERVED_ROWS: usize = MAP_ROW + 3;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const BANNER_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    /// Tiles that fit a terminal of `cols` x `rows`.
    pub fn viewport_tiles(cols: u16, rows: u16) -> (usize, usize) {
        let w = (cols as usize / CELL_W).max(1);
        let h = (rows as usize).saturating_sub(RESERVED_ROWS).max(1);
        (w, h)
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
        self.sync_size()?;
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, session: &GameSession, title: &str) -> io::Result<()> {
        self.sync_size()?;

        // Phase change: clear for a clean transition
        if self.last_phase != Some(session.phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(session.phase);
        }

        self.front.clear();
        self.compose_game(session, title);
        match session.phase {
            Phase::Playing => {}
            Phase::Won => self.compose_banner(session, " COURSE CLEAR "),
            Phase::Lost => self.compose_banner(session, " OUT OF LIVES "),
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    fn sync_size(&mut self) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

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

    fn compose_game(&mut self, s: &GameSession, title: &str) {
        let ts = s.tile_size();
        let grid = &s.blueprint.grid;
        let (view_w, view_h) = Renderer::viewport_tiles(self.term_w as u16, self.term_h as u16);
        let origin_x = (s.camera.x / ts).floor() as i32;
        let origin_y = (s.camera.y / ts).floor() as i32;

        // ── HUD row ──
        let hud = format!(
            " {}  coins {}/{}  lives {}  time {:.1}s ",
            title,
            s.coins,
            s.coin_total(),
            s.actor.lives,
            s.elapsed
        );
        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);

        // ── Terrain ──
        for vy in 0..view_h.min(grid.height()) {
            for vx in 0..view_w.min(grid.width()) {
                let tile = grid.tile(origin_x + vx as i32, origin_y + vy as i32);
                let (ch, fg) = tile_glyph(tile);
                let cell = Cell::new(ch, fg, Cell::BASE_BG);
                self.front.set(vx * CELL_W, MAP_ROW + vy, cell);
                self.front.set(vx * CELL_W + 1, MAP_ROW + vy, cell);
            }
        }

        // ── Entities ──
        for (i, p) in s.blueprint.placements.iter().enumerate() {
            let glyph = match &p.kind {
                EntityKind::Coin if s.is_collected(i) => continue,
                EntityKind::Coin => ('o', Color::Yellow),
                EntityKind::Spike => ('^', Color::Red),
                EntityKind::Flag => ('P', Color::Green),
                EntityKind::Enemy(_) => ('x', Color::Magenta),
                EntityKind::Spawn => continue,
            };
            let (px, py) = p.pixel_pos(ts);
            // sample half a tile above the anchor so floor-anchored things land in their own row
            let sample_y = py - ts * (p.anchor.1 - 0.5);
            self.put_marker(s, px, sample_y, view_w, view_h, glyph);
        }

        // ── Actor ──
        let b = s.actor.bounds();
        let robot = match s.actor.facing {
            Facing::Left => ('<', Color::Cyan),
            Facing::Right => ('>', Color::Cyan),
        };
        self.put_marker(s, (b.left + b.right) * 0.5, (b.top + b.bottom) * 0.5, view_w, view_h, robot);

        // ── Help bar ──
        let help_row = MAP_ROW + view_h.min(grid.height()) + 1;
        let help = " A/D/←/→:Run  Space/W/↑:Jump  R:Restart  N:Next world  Q/Esc:Quit";
        self.front.put_str(0, help_row, help, Color::DarkGrey, Cell::BASE_BG);
    }

    /// Draw a one-tile marker at a world pixel, if it is in view.
    fn put_marker(&mut self, s: &GameSession, wx: f32, wy: f32, view_w: usize, view_h: usize, glyph: (char, Color)) {
        let ts = s.tile_size();
        let col = (wx / ts).floor() as i32 - (s.camera.x / ts).floor() as i32;
        let row = (wy / ts).floor() as i32 - (s.camera.y / ts).floor() as i32;
        if col < 0 || row < 0 || col as usize >= view_w || row as usize >= view_h {
            return;
        }
        let (col, row) = (col as usize * CELL_W, MAP_ROW + row as usize);
        self.front.set(col, row, Cell::new(glyph.0, glyph.1, Cell::BASE_BG));
        self.front.set(col + 1, row, Cell::new(' ', glyph.1, Cell::BASE_BG));
    }

    fn compose_banner(&mut self, s: &GameSession, headline: &str) {
        let row = MAP_ROW.saturating_sub(1);
        let r = s.result();
        let text = format!(
            "{headline} {:.1}s  {} coins  {} lives   R:Retry  N:Next world ",
            r.elapsed_seconds, r.coins, r.lives_remaining
        );
        self.front.fill_row(row, BANNER_BG);
        self.front.put_str(0, row, &text, Color::Black, BANNER_BG);
    }
}

fn tile_glyph(tile: Tile) -> (char, Color) {
    match tile {
        Tile::Empty => (' ', Color::White),
        Tile::Editor => ('█', Color::Green),
        Tile::Terminal => ('█', Color::Blue),
        Tile::Debug => ('▓', Color::Red),
        Tile::Custom { solid: true, .. } => ('▒', Color::Grey),
        Tile::Custom { solid: false, .. } => ('·', Color::DarkGrey),
    }
}
