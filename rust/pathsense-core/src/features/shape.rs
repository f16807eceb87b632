//! Stroke shape as counts of 3x3 raster patterns.
//!
//! The path is drawn onto a 43x25 grid with the stimulus near column 21,
//! row 3 and the answers near rows 21, leaving margin for drift outside the
//! unit box. Each 3x3 window with at least three lit cells is encoded
//! row-major as nine digits, `1` for an empty cell and `2` for a lit one, so
//! a lit main diagonal reads `211121112`.

use std::collections::BTreeMap;

use super::FeatureSet;
use crate::path::{NormalizedPath, NormalizedSample};

pub const GRID_COLS: usize = 43;
pub const GRID_ROWS: usize = 25;
/// Cells per unit of normalized distance.
pub const GRID_SCALE: f64 = 18.0;
pub const ORIGIN_COL: i64 = 21;
pub const ORIGIN_ROW: i64 = 3;
pub const WINDOW: usize = 3;
pub const MIN_LIT_CELLS: usize = 3;

/// A cell address, `(column, row)`.
pub type Cell = (usize, usize);

/// Boolean raster scoped to a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: [[bool; GRID_ROWS]; GRID_COLS],
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: [[false; GRID_ROWS]; GRID_COLS],
        }
    }

    /// Draws a path, joining consecutive samples that are more than one cell apart.
    pub fn rasterize(path: &NormalizedPath) -> Self {
        let mut grid = Self::new();
        let mut previous: Option<Cell> = None;

        for sample in path.samples() {
            let cell = Self::cell_for(sample);
            grid.mark(cell);
            if let Some(prev) = previous {
                grid.join(prev, cell);
            }
            previous = Some(cell);
        }

        grid
    }

    /// Grid cell of a normalized sample, clamped to the grid.
    pub fn cell_for(sample: &NormalizedSample) -> Cell {
        let axis = |v: f64, origin: i64, len: usize| {
            ((v * GRID_SCALE).round() + origin as f64).clamp(0.0, (len - 1) as f64) as usize
        };
        (
            axis(sample.x, ORIGIN_COL, GRID_COLS),
            axis(sample.y, ORIGIN_ROW, GRID_ROWS),
        )
    }

    pub fn mark(&mut self, (col, row): Cell) {
        self.cells[col][row] = true;
    }

    pub fn is_marked(&self, (col, row): Cell) -> bool {
        self.cells[col][row]
    }

    pub fn lit_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| **c).count()
    }

    /// Marks the cells strictly between `from` and `to`.
    ///
    /// Steps one cell at a time along the dominant axis; the other axis
    /// follows the rounded ratio of the two deltas.
    pub fn join(&mut self, from: Cell, to: Cell) {
        let d_col = to.0 as i64 - from.0 as i64;
        let d_row = to.1 as i64 - from.1 as i64;
        let steps = d_col.abs().max(d_row.abs());

        for step in 1..steps {
            let along = |start: usize, delta: i64| {
                let offset = (step as f64 * delta as f64 / steps as f64).round() as i64;
                (start as i64 + offset) as usize
            };
            self.mark((along(from.0, d_col), along(from.1, d_row)));
        }
    }

    /// Counts of each 3x3 pattern with enough lit cells.
    pub fn patterns(&self) -> BTreeMap<u64, u32> {
        let mut patterns = BTreeMap::new();

        for row in 0..=GRID_ROWS - WINDOW {
            for col in 0..=GRID_COLS - WINDOW {
                let mut id = 0u64;
                let mut lit = 0;
                for r in row..row + WINDOW {
                    for c in col..col + WINDOW {
                        let marked = self.cells[c][r];
                        id = id * 10 + if marked { 2 } else { 1 };
                        lit += usize::from(marked);
                    }
                }
                if lit >= MIN_LIT_CELLS {
                    *patterns.entry(id).or_insert(0) += 1;
                }
            }
        }

        patterns
    }
}

/// One class feature per observed pattern, labeled by its id, valued by its count.
pub fn analyze_shape(path: &NormalizedPath) -> FeatureSet {
    Grid::rasterize(path)
        .patterns()
        .into_iter()
        .map(|(id, count)| (id.to_string(), super::FeatureValue::Class(i64::from(count))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures::{diagonal_path, path};

    const DIAGONAL: &str = "211121112";

    #[test]
    fn test_cell_mapping_and_clamping() {
        let s = |x, y| NormalizedSample { x, y, t: 0.0 };
        assert_eq!(Grid::cell_for(&s(0.0, 0.0)), (21, 3));
        assert_eq!(Grid::cell_for(&s(1.0, 1.0)), (39, 21));
        assert_eq!(Grid::cell_for(&s(-1.0, 1.0)), (3, 21));
        assert_eq!(Grid::cell_for(&s(5.0, 5.0)), (42, 24));
        assert_eq!(Grid::cell_for(&s(-5.0, -1.0)), (0, 0));
    }

    #[test]
    fn test_join_straight_and_steep() {
        let mut grid = Grid::new();
        grid.join((0, 0), (5, 0));
        assert!((1..5).all(|c| grid.is_marked((c, 0))));
        assert!(!grid.is_marked((0, 0)) && !grid.is_marked((5, 0)));
        assert_eq!(grid.lit_count(), 4);

        let mut grid = Grid::new();
        grid.join((0, 0), (2, 6));
        for cell in [(0, 1), (1, 2), (1, 3), (1, 4), (2, 5)] {
            assert!(grid.is_marked(cell), "{cell:?} not marked");
        }
        assert_eq!(grid.lit_count(), 5);
    }

    #[test]
    fn test_join_adjacent_cells_is_noop() {
        let mut grid = Grid::new();
        grid.join((4, 4), (5, 5));
        grid.join((4, 4), (4, 4));
        assert_eq!(grid.lit_count(), 0);
    }

    #[test]
    fn test_straight_diagonal_single_pattern() {
        let features = analyze_shape(&diagonal_path(10, 100.0));
        assert_eq!(features.len(), 1);
        assert_eq!(features.class(DIAGONAL), Some(17));
    }

    #[test]
    fn test_sparse_path_has_no_patterns() {
        // Two lit cells never fill a window.
        let p = path(&[(0.0, 0.0, 0.0), (0.05, 0.05, 10.0)]);
        assert!(analyze_shape(&p).is_empty());
    }
}
