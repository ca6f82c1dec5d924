/// The mutable cell grid.
///
/// Cells are stored row-major in one `Vec<Tile>`; `(x, y)` maps to
/// `y * width + x`. Coordinates are signed so callers can probe one
/// step past an edge without underflow:
///   - `cell_at()` outside the grid returns `Tile::Wall` (sentinel barrier)
///   - `set_cell()` outside the grid is a no-op
///
/// Every write that changes a cell's kind is recorded in a dirty list.
/// The renderer drains it with `take_dirty()` to redraw only changed tiles.

use super::tile::Tile;

#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Tile>,
    dirty: Vec<(i32, i32)>,
    dirty_mask: Vec<bool>,
}

impl Grid {
    /// All-empty grid.
    pub fn new(width: usize, height: usize) -> Self {
        Grid {
            width,
            height,
            cells: vec![Tile::Empty; width * height],
            dirty: Vec::new(),
            dirty_mask: vec![false; width * height],
        }
    }

    /// Build from rows of equal length. Returns None on ragged input.
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        let mut grid = Grid::new(width, height);
        grid.cells = rows.into_iter().flatten().collect();
        Some(grid)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Linear index of (x, y), or None when outside the grid.
    #[inline]
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.width + x as usize)
        } else {
            None
        }
    }

    /// Inverse of `index()`.
    #[inline]
    pub fn position(&self, idx: usize) -> (i32, i32) {
        ((idx % self.width) as i32, (idx / self.width) as i32)
    }

    /// Cell kind at (x, y). Out of bounds reads as Wall.
    #[inline]
    pub fn cell_at(&self, x: i32, y: i32) -> Tile {
        match self.index(x, y) {
            Some(i) => self.cells[i],
            None => Tile::Wall,
        }
    }

    /// Write a cell. Out of bounds is ignored; unchanged writes are not dirty.
    pub fn set_cell(&mut self, x: i32, y: i32, tile: Tile) {
        let i = match self.index(x, y) {
            Some(i) => i,
            None => return,
        };
        if self.cells[i] == tile {
            return;
        }
        self.cells[i] = tile;
        self.mark_dirty(i);
    }

    /// Cells whose kind changed since the last call, in change order.
    pub fn take_dirty(&mut self) -> Vec<(i32, i32)> {
        for &(x, y) in &self.dirty {
            let i = y as usize * self.width + x as usize;
            self.dirty_mask[i] = false;
        }
        std::mem::take(&mut self.dirty)
    }

    /// Flag every cell as changed (fresh load / restart).
    pub fn mark_all_dirty(&mut self) {
        for i in 0..self.cells.len() {
            self.mark_dirty(i);
        }
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Number of cells holding `tile`.
    pub fn count(&self, tile: Tile) -> usize {
        self.cells.iter().filter(|&&t| t == tile).count()
    }

    /// Positions of every cell matching `pred`, row-major.
    pub fn positions_where(&self, pred: impl Fn(Tile) -> bool) -> Vec<(i32, i32)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &t)| pred(t))
            .map(|(i, _)| self.position(i))
            .collect()
    }

    fn mark_dirty(&mut self, i: usize) {
        if !self.dirty_mask[i] {
            self.dirty_mask[i] = true;
            let pos = self.position(i);
            self.dirty.push(pos);
        }
    }
}

/// Build a grid from ASCII rows using the level glyphs. Test fixtures only.
#[cfg(test)]
pub(crate) fn grid_from(rows: &[&str]) -> Grid {
    let rows: Vec<Vec<Tile>> = rows
        .iter()
        .map(|r| r.chars().map(|c| Tile::from_glyph(c).unwrap_or(Tile::Empty)).collect())
        .collect();
    let mut g = Grid::from_rows(rows).expect("fixture rows must be equal length");
    g.take_dirty();
    g
}

/// Render a grid back to ASCII rows. Test assertions only.
#[cfg(test)]
pub(crate) fn rows_of(grid: &Grid) -> Vec<String> {
    (0..grid.height() as i32)
        .map(|y| (0..grid.width() as i32).map(|x| grid.cell_at(x, y).glyph()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reads_wall() {
        let g = grid_from(&["  ", "  "]);
        for &(x, y) in &[(-1, 0), (0, -1), (2, 0), (0, 2), (i32::MIN, i32::MAX)] {
            assert_eq!(g.cell_at(x, y), Tile::Wall);
            assert!(!g.in_bounds(x, y));
        }
    }

    #[test]
    fn out_of_bounds_write_is_ignored() {
        let mut g = grid_from(&["  ", "  "]);
        g.set_cell(-1, 0, Tile::Rock);
        g.set_cell(2, 1, Tile::Rock);
        g.set_cell(0, 5, Tile::Rock);
        assert_eq!(rows_of(&g), vec!["  ", "  "]);
        assert!(!g.has_dirty());
    }

    #[test]
    fn dirty_tracks_changed_cells_once() {
        let mut g = grid_from(&["...", "..."]);
        g.set_cell(1, 0, Tile::Empty);
        g.set_cell(1, 0, Tile::Rock);
        g.set_cell(2, 1, Tile::Dirt); // unchanged
        assert_eq!(g.take_dirty(), vec![(1, 0)]);
        assert!(g.take_dirty().is_empty());
        g.set_cell(1, 0, Tile::Empty);
        assert_eq!(g.take_dirty(), vec![(1, 0)]);
    }

    #[test]
    fn mark_all_dirty_covers_grid() {
        let mut g = grid_from(&["ab", "cd"]);
        g.mark_all_dirty();
        assert_eq!(g.take_dirty(), vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn ragged_rows_rejected() {
        let rows = vec![vec![Tile::Empty; 3], vec![Tile::Empty; 2]];
        assert!(Grid::from_rows(rows).is_none());
    }

    #[test]
    fn index_and_position_agree() {
        let g = Grid::new(4, 3);
        assert_eq!(g.index(3, 2), Some(11));
        assert_eq!(g.position(11), (3, 2));
        assert_eq!(g.index(4, 0), None);
    }
}
