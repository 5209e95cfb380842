//! Dense power grid, coordinate axes, and color-scale bounds.

use crate::error::HeatmapError;

/// A cell counts as missing when it holds a sentinel (`NaN` or an infinity).
pub fn is_missing(value: f64) -> bool {
    !value.is_finite()
}

/// Largest grid the loaders and the simulator will allocate.
pub const MAX_CELLS: usize = 1 << 26;

/// Row-major grid of dBm values indexed `[row][col]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerGrid {
    rows: usize,
    cols: usize,
    cells: Vec<f64>,
}

impl PowerGrid {
    /// Cell count of a `rows × cols` grid, if it stays within [`MAX_CELLS`].
    pub fn checked_len(rows: usize, cols: usize) -> Result<usize, HeatmapError> {
        rows.checked_mul(cols)
            .filter(|len| *len <= MAX_CELLS)
            .ok_or(HeatmapError::TooLarge {
                rows,
                cols,
                max: MAX_CELLS,
            })
    }

    pub fn new(rows: usize, cols: usize, fill: f64) -> Result<Self, HeatmapError> {
        let len = Self::checked_len(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            cells: vec![fill; len],
        })
    }

    /// Wraps row-major `cells`; `None` when the length does not match the shape.
    pub fn from_cells(rows: usize, cols: usize, cells: Vec<f64>) -> Option<Self> {
        if rows.checked_mul(cols)? != cells.len() {
            return None;
        }
        Some(Self { rows, cols, cells })
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        Some(&self.cells[start..start + self.cols])
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.cells[row * self.cols + col])
    }

    /// Writes `value` into `(row, col)`; returns false when out of range.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> bool {
        if row >= self.rows || col >= self.cols {
            return false;
        }
        self.cells[row * self.cols + col] = value;
        true
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|v| is_missing(**v)).count()
    }

    /// Bounds over the non-missing cells, `None` if every cell is missing.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds_excluding(None)
    }

    /// Like [`bounds`](Self::bounds), also skipping cells equal to `marker`.
    pub fn bounds_excluding(&self, marker: Option<f64>) -> Option<Bounds> {
        let mut present = self
            .cells
            .iter()
            .copied()
            .filter(|v| !is_missing(*v) && Some(*v) != marker);
        let first = present.next()?;
        let (vmin, vmax) = present.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(Bounds { vmin, vmax })
    }

    /// Replaces every missing cell with `value`, returning how many changed.
    pub fn fill_missing(&mut self, value: f64) -> usize {
        let mut filled = 0;
        for cell in self.cells.iter_mut().filter(|v| is_missing(**v)) {
            *cell = value;
            filled += 1;
        }
        filled
    }
}

/// Color-scale limits taken from the non-missing cells before fill-in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub vmin: f64,
    pub vmax: f64,
}

impl Bounds {
    pub fn span(&self) -> f64 {
        self.vmax - self.vmin
    }

    pub fn contains(&self, value: f64) -> bool {
        self.vmin <= value && value <= self.vmax
    }
}

/// Deduplicated coordinate axes of a point cloud: X ascending, Y descending.
///
/// Column `c` holds `x[c]`, row `r` holds `y[r]`, so row 0 is the largest Y.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Axes {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Axes {
    /// Builds both axes from the same coordinate pairs used to fill the grid.
    pub fn from_coordinates<I>(coords: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (mut x, mut y): (Vec<f64>, Vec<f64>) = coords.into_iter().unzip();
        x.sort_unstable_by(f64::total_cmp);
        x.dedup_by(|a, b| a.total_cmp(b).is_eq());
        y.sort_unstable_by(|a, b| b.total_cmp(a));
        y.dedup_by(|a, b| a.total_cmp(b).is_eq());
        Self { x, y }
    }

    pub fn col_of(&self, x: f64) -> Option<usize> {
        self.x.binary_search_by(|probe| probe.total_cmp(&x)).ok()
    }

    pub fn row_of(&self, y: f64) -> Option<usize> {
        self.y.binary_search_by(|probe| y.total_cmp(probe)).ok()
    }

    /// `(rows, cols)` of the grid these axes describe.
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }
}

/// A grid ready for rendering: missing cells already replaced by `vmin`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub grid: PowerGrid,
    pub bounds: Bounds,
    pub axes: Option<Axes>,
    pub filled_cells: usize,
    /// Cells holding this value are obstacles, drawn apart from the scale.
    pub marker: Option<f64>,
}

impl Heatmap {
    /// Computes bounds over the observed cells, then fills the gaps with `vmin`.
    pub fn prepare(grid: PowerGrid, axes: Option<Axes>) -> Result<Self, HeatmapError> {
        Self::prepare_with_marker(grid, axes, None)
    }

    /// Same as [`prepare`](Self::prepare), but cells equal to `marker` stay
    /// out of the bounds and keep their value.
    pub fn prepare_with_marker(
        mut grid: PowerGrid,
        axes: Option<Axes>,
        marker: Option<f64>,
    ) -> Result<Self, HeatmapError> {
        if grid.is_empty() {
            return Err(HeatmapError::Empty);
        }
        let marker = marker.filter(|m| m.is_finite());
        let bounds = grid
            .bounds_excluding(marker)
            .ok_or(HeatmapError::AllMissing)?;
        let filled_cells = grid.fill_missing(bounds.vmin);
        tracing::debug!(
            vmin = bounds.vmin,
            vmax = bounds.vmax,
            filled_cells,
            "prepared grid for rendering"
        );
        Ok(Self {
            grid,
            bounds,
            axes,
            filled_cells,
            marker,
        })
    }

    pub fn is_marker(&self, value: f64) -> bool {
        self.marker == Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_ignore_sentinels() {
        let grid = PowerGrid::from_cells(
            2,
            2,
            vec![-40.0, f64::NAN, f64::NEG_INFINITY, -70.0],
        )
        .unwrap();
        let bounds = grid.bounds().unwrap();
        assert_eq!(bounds.vmin, -70.0);
        assert_eq!(bounds.vmax, -40.0);
        assert_eq!(grid.missing_count(), 2);
    }

    #[test]
    fn prepare_fills_missing_with_vmin() {
        let grid = PowerGrid::from_cells(1, 3, vec![-50.0, f64::NAN, -20.0]).unwrap();
        let heatmap = Heatmap::prepare(grid, None).unwrap();
        assert_eq!(heatmap.grid.cells(), &[-50.0, -50.0, -20.0]);
        assert_eq!(heatmap.filled_cells, 1);
        assert!(heatmap.grid.cells().iter().all(|v| heatmap.bounds.contains(*v)));
    }

    #[test]
    fn prepare_rejects_all_missing() {
        let grid = PowerGrid::new(2, 2, f64::NAN).unwrap();
        let err = Heatmap::prepare(grid, None).unwrap_err();
        assert!(matches!(err, HeatmapError::AllMissing));
    }

    #[test]
    fn oversized_grids_are_refused() {
        let err = PowerGrid::new(usize::MAX, 2, 0.0).unwrap_err();
        assert!(matches!(err, HeatmapError::TooLarge { .. }));
        assert!(PowerGrid::new(MAX_CELLS + 1, 1, 0.0).is_err());
        assert_eq!(PowerGrid::checked_len(MAX_CELLS, 1).unwrap(), MAX_CELLS);
    }

    #[test]
    fn marker_cells_stay_out_of_bounds() {
        let grid = PowerGrid::from_cells(1, 4, vec![-555.0, -40.0, f64::NAN, -70.0]).unwrap();
        let heatmap = Heatmap::prepare_with_marker(grid, None, Some(-555.0)).unwrap();
        assert_eq!(heatmap.bounds, Bounds { vmin: -70.0, vmax: -40.0 });
        assert_eq!(heatmap.grid.cells(), &[-555.0, -40.0, -70.0, -70.0]);
        assert!(heatmap.is_marker(-555.0));

        let only_markers = PowerGrid::from_cells(1, 2, vec![-555.0; 2]).unwrap();
        let err = Heatmap::prepare_with_marker(only_markers, None, Some(-555.0)).unwrap_err();
        assert!(matches!(err, HeatmapError::AllMissing));
    }

    #[test]
    fn axes_sort_and_lookup() {
        let axes = Axes::from_coordinates([(2.0, 0.0), (0.0, 1.0), (2.0, 1.0), (1.0, 5.0)]);
        assert_eq!(axes.x, vec![0.0, 1.0, 2.0]);
        assert_eq!(axes.y, vec![5.0, 1.0, 0.0]);
        assert_eq!(axes.col_of(1.0), Some(1));
        assert_eq!(axes.row_of(5.0), Some(0));
        assert_eq!(axes.row_of(0.0), Some(2));
        assert_eq!(axes.row_of(3.0), None);
        assert_eq!(axes.shape(), (3, 3));
    }

    #[test]
    fn from_cells_checks_shape() {
        assert!(PowerGrid::from_cells(2, 3, vec![0.0; 5]).is_none());
        let grid = PowerGrid::from_cells(2, 3, vec![0.0; 6]).unwrap();
        assert_eq!(grid.row(1).map(<[f64]>::len), Some(3));
        assert!(grid.row(2).is_none());
    }
}
