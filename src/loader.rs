//! CSV ingestion: dense matrices and labeled point clouds.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HeatmapError;
use crate::grid::{Axes, PowerGrid};

pub const COLUMN_X: &str = "X";
pub const COLUMN_Y: &str = "Y";
pub const COLUMN_POWER: &str = "Power_dBm";

/// Replacement for `-inf` readings when no finite reading exists at all.
pub const NO_FINITE_FALLBACK_DBM: f64 = -100.0;

/// How the input CSV is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Decide from the first data line.
    #[default]
    Auto,
    /// Header-less numeric matrix, rows are Y and columns are X.
    Dense,
    /// `X,Y,Power_dBm` samples scattered onto a derived grid.
    Points,
}

/// One labeled reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub power_dbm: f64,
}

/// Samples as read from a labeled CSV, plus the trimmed header names.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub columns: Vec<String>,
    pub samples: Vec<Sample>,
}

/// A point cloud rasterized onto its own coordinate axes.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizedPoints {
    pub grid: PowerGrid,
    pub axes: Axes,
    pub columns: Vec<String>,
    pub samples: usize,
    /// Value written in place of `-inf` readings, if any were present.
    pub neg_infinity_replacement: Option<f64>,
}

fn open(path: &Path) -> Result<File, HeatmapError> {
    File::open(path).map_err(|source| HeatmapError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_number(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok()
}

/// Resolves [`InputMode::Auto`] by sniffing the first data line of `path`.
pub fn resolve_mode(path: &Path, mode: InputMode) -> Result<InputMode, HeatmapError> {
    match mode {
        InputMode::Auto => {
            sniff_mode(BufReader::new(open(path)?)).map_err(|source| HeatmapError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
        other => Ok(other),
    }
}

/// A first line made only of numbers means a dense matrix, anything else is
/// taken to be a header. An input with no data line is treated as dense so
/// the dense loader reports it as empty.
pub fn sniff_mode<R: BufRead>(reader: R) -> std::io::Result<InputMode> {
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let numeric = trimmed.split(',').all(|field| parse_number(field).is_some());
        return Ok(if numeric {
            InputMode::Dense
        } else {
            InputMode::Points
        });
    }
    Ok(InputMode::Dense)
}

pub fn load_dense(path: &Path) -> Result<PowerGrid, HeatmapError> {
    let grid = parse_dense(open(path)?)?;
    tracing::debug!(path = %path.display(), shape = ?grid.shape(), "loaded dense grid");
    Ok(grid)
}

/// Reads a header-less rectangular matrix of numbers.
///
/// `nan`, `inf` and `-inf` are accepted and become missing cells later on.
pub fn parse_dense<R: Read>(input: R) -> Result<PowerGrid, HeatmapError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(input);

    let mut cells = Vec::new();
    let mut cols: Option<usize> = None;
    let mut rows = 0usize;

    for record in reader.records() {
        let record = record?;
        if record.len() == 1 && record.get(0).is_some_and(str::is_empty) {
            continue;
        }
        let line = record.position().map_or(0, |p| p.line());

        match cols {
            None => cols = Some(record.len()),
            Some(expected) if expected != record.len() => {
                return Err(HeatmapError::Ragged {
                    line,
                    expected,
                    found: record.len(),
                });
            }
            Some(_) => {}
        }

        for field in record.iter() {
            let value = parse_number(field).ok_or_else(|| HeatmapError::NotNumeric {
                line,
                value: field.to_string(),
            })?;
            cells.push(value);
        }
        rows += 1;
    }

    let cols = cols.unwrap_or(0);
    if rows == 0 || cols == 0 {
        return Err(HeatmapError::Empty);
    }
    PowerGrid::from_cells(rows, cols, cells).ok_or(HeatmapError::Empty)
}

pub fn load_points(path: &Path) -> Result<RasterizedPoints, HeatmapError> {
    let cloud = parse_points(open(path)?)?;
    let rasterized = rasterize_points(cloud)?;
    tracing::debug!(
        path = %path.display(),
        samples = rasterized.samples,
        shape = ?rasterized.grid.shape(),
        "loaded point cloud"
    );
    Ok(rasterized)
}

fn coerce(field: Option<&str>, column: &str, line: u64) -> Result<f64, HeatmapError> {
    let raw = field.unwrap_or("");
    parse_number(raw).ok_or_else(|| HeatmapError::Coercion {
        line,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

fn coerce_coordinate(field: Option<&str>, column: &str, line: u64) -> Result<f64, HeatmapError> {
    let value = coerce(field, column, line)?;
    if !value.is_finite() {
        return Err(HeatmapError::Coercion {
            line,
            column: column.to_string(),
            value: field.unwrap_or("").to_string(),
        });
    }
    // -0.0 and 0.0 must land on the same axis entry.
    Ok(value + 0.0)
}

fn coerce_power(field: Option<&str>, line: u64) -> Result<f64, HeatmapError> {
    match field {
        Some(raw) if !raw.trim().is_empty() => coerce(Some(raw), COLUMN_POWER, line),
        _ => Ok(f64::NAN),
    }
}

/// Reads `X,Y,Power_dBm` samples. Header names are trimmed before matching
/// and extra columns are ignored.
pub fn parse_points<R: Read>(input: R) -> Result<PointCloud, HeatmapError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let index_of = |name: &str| columns.iter().position(|c| c == name);

    let (Some(ix), Some(iy), Some(ip)) = (
        index_of(COLUMN_X),
        index_of(COLUMN_Y),
        index_of(COLUMN_POWER),
    ) else {
        let missing = [COLUMN_X, COLUMN_Y, COLUMN_POWER]
            .into_iter()
            .filter(|name| index_of(*name).is_none())
            .map(str::to_string)
            .collect();
        return Err(HeatmapError::MissingColumns {
            missing,
            found: columns,
        });
    };

    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        samples.push(Sample {
            x: coerce_coordinate(record.get(ix), COLUMN_X, line)?,
            y: coerce_coordinate(record.get(iy), COLUMN_Y, line)?,
            power_dbm: coerce_power(record.get(ip), line)?,
        });
    }

    if samples.is_empty() {
        return Err(HeatmapError::Empty);
    }
    Ok(PointCloud { columns, samples })
}

/// Minimum finite power across `samples`, or [`NO_FINITE_FALLBACK_DBM`].
pub fn neg_infinity_replacement(samples: &[Sample]) -> f64 {
    samples
        .iter()
        .map(|s| s.power_dbm)
        .filter(|v| v.is_finite())
        .reduce(f64::min)
        .unwrap_or(NO_FINITE_FALLBACK_DBM)
}

/// Rewrites every `-inf` reading; returns the replacement if one was needed.
pub fn replace_neg_infinity(samples: &mut [Sample]) -> Option<f64> {
    if !samples.iter().any(|s| s.power_dbm == f64::NEG_INFINITY) {
        return None;
    }
    let replacement = neg_infinity_replacement(samples);
    for sample in samples.iter_mut().filter(|s| s.power_dbm == f64::NEG_INFINITY) {
        sample.power_dbm = replacement;
    }
    Some(replacement)
}

/// Scatters samples onto a `(|Y|, |X|)` grid. Unobserved cells stay `NaN`;
/// repeated coordinates keep the last value in input order.
///
/// Fails with [`HeatmapError::TooLarge`] when the coordinate axes span more
/// cells than [`MAX_CELLS`](crate::grid::MAX_CELLS).
pub fn rasterize(samples: &[Sample]) -> Result<(PowerGrid, Axes), HeatmapError> {
    let axes = Axes::from_coordinates(samples.iter().map(|s| (s.x, s.y)));
    let (rows, cols) = axes.shape();
    let mut grid = PowerGrid::new(rows, cols, f64::NAN)?;

    for s in samples {
        let (Some(col), Some(row)) = (axes.col_of(s.x), axes.row_of(s.y)) else {
            continue;
        };
        grid.set(row, col, s.power_dbm);
    }

    Ok((grid, axes))
}

pub fn rasterize_points(cloud: PointCloud) -> Result<RasterizedPoints, HeatmapError> {
    let PointCloud {
        columns,
        mut samples,
    } = cloud;
    let neg_infinity_replacement = replace_neg_infinity(&mut samples);
    if let Some(value) = neg_infinity_replacement {
        tracing::info!(replacement = value, "replaced -inf readings");
    }
    let (grid, axes) = rasterize(&samples)?;
    Ok(RasterizedPoints {
        grid,
        axes,
        columns,
        samples: samples.len(),
        neg_infinity_replacement,
    })
}
