//! Source-target matrix engine: derive, filter, reorder, rasterize and
//! summarize an N x N pair of path-count grids.
//!
//! The raw grids are never modified. Filtering and sorting only rearrange
//! the `rows` and `cols` index arrays, which map view positions back to
//! original indices (and through `host_ids` to hosts).

mod order;
mod raster;

use std::sync::atomic::{AtomicU64, Ordering};

use eframe::egui::Color32;
use ndarray::Array2;
use tracing::{debug, warn};

use crate::error::MatrixError;
use crate::model::HostId;

pub use order::{ColumnReorderer, PrincipalComponentOrder, is_permutation};
pub use raster::{MatrixRaster, ramp_color};

/// Value written to diagonal cells of a derived grid.
pub const DIAGONAL_SENTINEL: f64 = -1.0;

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatrixMode {
    #[default]
    Absolute,
    Relative,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterAxis {
    #[default]
    None,
    Rows,
    Cols,
    Both,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    None,
    Rows,
    Cols,
    RowsAndCols,
    Pca,
}

impl MatrixMode {
    pub const ALL: [Self; 2] = [Self::Absolute, Self::Relative];

    pub fn label(self) -> &'static str {
        match self {
            Self::Absolute => "Absolute",
            Self::Relative => "Relative",
        }
    }
}

impl FilterAxis {
    pub const ALL: [Self; 4] = [Self::None, Self::Rows, Self::Cols, Self::Both];

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "No filter",
            Self::Rows => "Rows",
            Self::Cols => "Columns",
            Self::Both => "Rows and columns",
        }
    }
}

impl SortMode {
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::Rows,
        Self::Cols,
        Self::RowsAndCols,
        Self::Pca,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "Host order",
            Self::Rows => "By row sum",
            Self::Cols => "By column sum",
            Self::RowsAndCols => "By row and column sums",
            Self::Pca => "Principal component",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatrixOptions {
    pub mode: MatrixMode,
    pub squared: bool,
    pub filter: FilterAxis,
    /// In `[0, 1]`; indices whose marginal sum reaches this percentile of
    /// all marginal sums survive filtering.
    pub percentile: f64,
    pub sort: SortMode,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            mode: MatrixMode::Absolute,
            squared: false,
            filter: FilterAxis::None,
            percentile: 0.0,
            sort: SortMode::None,
        }
    }
}

/// Totals for a rectangular cell selection, computed on the raw grids.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionSummary {
    pub sources: Vec<HostId>,
    pub targets: Vec<HostId>,
    pub baseline_sum: f64,
    pub query_sum: f64,
    pub baseline_fraction: f64,
    pub query_fraction: f64,
}

impl SelectionSummary {
    pub fn row_count(&self) -> usize {
        self.sources.len()
    }

    pub fn col_count(&self) -> usize {
        self.targets.len()
    }
}

pub struct SourceTargetMatrix {
    baseline: Array2<f64>,
    query: Array2<f64>,
    host_ids: Vec<HostId>,
    options: MatrixOptions,
    derived: Array2<f64>,
    rows: Vec<usize>,
    cols: Vec<usize>,
    view: Array2<f64>,
    revision: u64,
    reorderer: Box<dyn ColumnReorderer>,
    diagonal_color: Color32,
    raster: Option<MatrixRaster>,
    rasterizations: u64,
}

fn check_square(grid: &Array2<f64>, name: &'static str) -> Result<usize, MatrixError> {
    let (rows, cols) = grid.dim();
    if rows != cols {
        return Err(MatrixError::NotSquare {
            grid: name,
            rows,
            row: 0,
            len: cols,
        });
    }
    Ok(rows)
}

/// Builds a grid from nested rows, rejecting ragged or non-square input.
pub fn grid_from_rows(rows: &[Vec<u64>], name: &'static str) -> Result<Array2<f64>, MatrixError> {
    let size = rows.len();
    if let Some((row, cells)) = rows.iter().enumerate().find(|(_, cells)| cells.len() != size) {
        return Err(MatrixError::NotSquare {
            grid: name,
            rows: size,
            row,
            len: cells.len(),
        });
    }
    Ok(Array2::from_shape_fn((size, size), |(i, j)| rows[i][j] as f64))
}

impl SourceTargetMatrix {
    pub fn new(
        baseline: Array2<f64>,
        query: Array2<f64>,
        host_ids: Vec<HostId>,
    ) -> Result<Self, MatrixError> {
        let size = check_square(&baseline, "baseline")?;
        let query_size = check_square(&query, "query")?;
        if size != query_size {
            return Err(MatrixError::SizeMismatch {
                baseline: size,
                query: query_size,
            });
        }
        if host_ids.len() != size {
            return Err(MatrixError::HostCount {
                size,
                hosts: host_ids.len(),
            });
        }

        let mut matrix = Self {
            baseline,
            query,
            host_ids,
            options: MatrixOptions::default(),
            derived: Array2::zeros((size, size)),
            rows: Vec::new(),
            cols: Vec::new(),
            view: Array2::zeros((0, 0)),
            revision: 0,
            reorderer: Box::new(PrincipalComponentOrder::default()),
            diagonal_color: Color32::from_rgb(128, 128, 128),
            raster: None,
            rasterizations: 0,
        };
        matrix.recompute();
        Ok(matrix)
    }

    pub fn from_counts(
        baseline: &[Vec<u64>],
        query: &[Vec<u64>],
        host_ids: Vec<HostId>,
    ) -> Result<Self, MatrixError> {
        Self::new(
            grid_from_rows(baseline, "baseline")?,
            grid_from_rows(query, "query")?,
            host_ids,
        )
    }

    pub fn with_reorderer(mut self, reorderer: Box<dyn ColumnReorderer>) -> Self {
        self.reorderer = reorderer;
        self.recompute();
        self
    }

    pub fn with_diagonal_color(mut self, color: Color32) -> Self {
        self.diagonal_color = color;
        self.raster = None;
        self
    }

    pub fn size(&self) -> usize {
        self.host_ids.len()
    }

    pub fn host_ids(&self) -> &[HostId] {
        &self.host_ids
    }

    pub fn options(&self) -> MatrixOptions {
        self.options
    }

    /// Changes whenever the view changes. Never shared between two matrices,
    /// so it can key caches that outlive a single matrix.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn derived(&self) -> &Array2<f64> {
        &self.derived
    }

    /// The filtered and reordered grid currently on screen.
    pub fn view(&self) -> &Array2<f64> {
        &self.view
    }

    pub fn row_hosts(&self) -> Vec<HostId> {
        self.rows.iter().map(|&index| self.host_ids[index]).collect()
    }

    pub fn col_hosts(&self) -> Vec<HostId> {
        self.cols.iter().map(|&index| self.host_ids[index]).collect()
    }

    pub fn set_options(&mut self, options: MatrixOptions) {
        if self.options != options {
            self.options = options;
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        self.derived = self.derive();
        let size = self.size();
        let mut rows: Vec<usize> = (0..size).collect();
        let mut cols: Vec<usize> = (0..size).collect();

        let percentile = self.options.percentile;
        if matches!(self.options.filter, FilterAxis::Rows | FilterAxis::Both) {
            rows = keep_percentile(&self.row_sums(&rows, &cols), percentile)
                .into_iter()
                .map(|position| rows[position])
                .collect();
        }
        if matches!(self.options.filter, FilterAxis::Cols | FilterAxis::Both) {
            let all_rows: Vec<usize> = (0..size).collect();
            cols = keep_percentile(&self.col_sums(&all_rows, &cols), percentile)
                .into_iter()
                .map(|position| cols[position])
                .collect();
        }

        match self.options.sort {
            SortMode::None => {}
            SortMode::Rows => rows = self.sorted_rows(&rows, &cols),
            SortMode::Cols => cols = self.sorted_cols(&rows, &cols),
            SortMode::RowsAndCols => {
                let sorted = self.sorted_rows(&rows, &cols);
                cols = self.sorted_cols(&rows, &cols);
                rows = sorted;
            }
            SortMode::Pca => {
                let grid = self.gather(&rows, &cols);
                let order = self.reorderer.reorder(&grid);
                if is_permutation(&order, cols.len()) {
                    cols = order.into_iter().map(|position| cols[position]).collect();
                } else {
                    warn!(
                        columns = cols.len(),
                        returned = order.len(),
                        "column reorderer returned an invalid permutation; keeping current order"
                    );
                }
            }
        }

        self.view = self.gather(&rows, &cols);
        self.rows = rows;
        self.cols = cols;
        self.revision = NEXT_REVISION.fetch_add(1, Ordering::Relaxed);
        debug!(
            rows = self.rows.len(),
            cols = self.cols.len(),
            revision = self.revision,
            "matrix view recomputed"
        );
    }

    fn derive(&self) -> Array2<f64> {
        let mut derived = match self.options.mode {
            MatrixMode::Absolute => {
                let max = self.query.iter().copied().fold(0.0, f64::max);
                if max > 0.0 {
                    self.query.mapv(|value| value / max)
                } else {
                    Array2::zeros(self.query.raw_dim())
                }
            }
            MatrixMode::Relative => {
                let query_sum = self.query.sum();
                let baseline_sum = self.baseline.sum();
                let share = |value: f64, total: f64| if total > 0.0 { value / total } else { 0.0 };

                let mut relative = Array2::from_shape_fn(self.query.raw_dim(), |index| {
                    (share(self.query[index], query_sum) - share(self.baseline[index], baseline_sum))
                        .max(0.0)
                });
                let max = relative.iter().copied().fold(0.0, f64::max);
                if max > 0.0 {
                    relative.mapv_inplace(|value| value / max);
                }
                relative
            }
        };

        if self.options.squared {
            derived.mapv_inplace(|value| value * value);
        }
        derived.diag_mut().fill(DIAGONAL_SENTINEL);
        derived
    }

    fn cell(&self, row: usize, col: usize) -> f64 {
        self.derived[(row, col)].max(0.0)
    }

    fn row_sums(&self, rows: &[usize], cols: &[usize]) -> Vec<f64> {
        rows.iter()
            .map(|&row| cols.iter().map(|&col| self.cell(row, col)).sum())
            .collect()
    }

    fn col_sums(&self, rows: &[usize], cols: &[usize]) -> Vec<f64> {
        cols.iter()
            .map(|&col| rows.iter().map(|&row| self.cell(row, col)).sum())
            .collect()
    }

    fn sorted_rows(&self, rows: &[usize], cols: &[usize]) -> Vec<usize> {
        sort_descending(rows, &self.row_sums(rows, cols))
    }

    fn sorted_cols(&self, rows: &[usize], cols: &[usize]) -> Vec<usize> {
        sort_descending(cols, &self.col_sums(rows, cols))
    }

    fn gather(&self, rows: &[usize], cols: &[usize]) -> Array2<f64> {
        Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| {
            self.derived[(rows[i], cols[j])]
        })
    }

    /// The raster of the current view, re-rendered only after the view
    /// changed.
    pub fn raster(&mut self) -> &MatrixRaster {
        let fresh = self
            .raster
            .as_ref()
            .is_some_and(|raster| raster.revision == self.revision);
        if !fresh {
            self.raster = None;
            self.rasterizations += 1;
        }
        let (view, color, revision) = (&self.view, self.diagonal_color, self.revision);
        self.raster
            .get_or_insert_with(|| MatrixRaster::render(view, color, revision))
    }

    /// Number of times the view has been rasterized.
    pub fn rasterizations(&self) -> u64 {
        self.rasterizations
    }

    /// Summarizes the inclusive view-cell rectangle spanned by `rows` and
    /// `cols`. Bounds may come in either order and are clamped to the view.
    /// Returns `None` for an empty view.
    pub fn summarize(&self, rows: (usize, usize), cols: (usize, usize)) -> Option<SelectionSummary> {
        let row_range = clamp_span(rows, self.rows.len())?;
        let col_range = clamp_span(cols, self.cols.len())?;
        let selected_rows = &self.rows[row_range.0..=row_range.1];
        let selected_cols = &self.cols[col_range.0..=col_range.1];

        let sum = |grid: &Array2<f64>| -> f64 {
            selected_rows
                .iter()
                .flat_map(|&row| selected_cols.iter().map(move |&col| (row, col)))
                .map(|index| grid[index])
                .sum()
        };
        let fraction = |part: f64, total: f64| {
            if total > 0.0 {
                (part / total).clamp(0.0, 1.0)
            } else {
                0.0
            }
        };

        let baseline_sum = sum(&self.baseline);
        let query_sum = sum(&self.query);
        Some(SelectionSummary {
            sources: selected_rows.iter().map(|&row| self.host_ids[row]).collect(),
            targets: selected_cols.iter().map(|&col| self.host_ids[col]).collect(),
            baseline_sum,
            query_sum,
            baseline_fraction: fraction(baseline_sum, self.baseline.sum()),
            query_fraction: fraction(query_sum, self.query.sum()),
        })
    }
}

fn clamp_span((a, b): (usize, usize), len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    Some((low.min(len - 1), high.min(len - 1)))
}

/// Positions (into `sums`) whose value reaches the nearest-rank percentile.
fn keep_percentile(sums: &[f64], percentile: f64) -> Vec<usize> {
    if percentile <= 0.0 || sums.is_empty() {
        return (0..sums.len()).collect();
    }
    let mut sorted = sums.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (percentile.min(1.0) * sorted.len() as f64).ceil() as usize;
    let threshold = sorted[rank.clamp(1, sorted.len()) - 1];

    sums.iter()
        .enumerate()
        .filter(|(_, sum)| **sum >= threshold)
        .map(|(position, _)| position)
        .collect()
}

fn sort_descending(indices: &[usize], sums: &[f64]) -> Vec<usize> {
    let mut paired: Vec<(usize, f64)> = indices.iter().copied().zip(sums.iter().copied()).collect();
    paired.sort_by(|a, b| b.1.total_cmp(&a.1));
    paired.into_iter().map(|(index, _)| index).collect()
}
