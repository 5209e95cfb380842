//! `load → validate → fill → render → save`, with console reporting.

use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, HeatmapError};
use crate::grid::{Axes, Bounds, Heatmap, PowerGrid};
use crate::loader::{self, InputMode};
use crate::render::{self, Preset, RenderOptions};
use crate::report;

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSummary {
    pub mode: InputMode,
    pub shape: (usize, usize),
    pub bounds: Bounds,
    pub filled_cells: usize,
    pub output: PathBuf,
    pub image_size: (u32, u32),
}

/// Console text for a failure the pipeline reports instead of returning.
fn failure_message(err: &HeatmapError) -> String {
    match err {
        HeatmapError::Empty => "No data was loaded from the CSV file".to_string(),
        HeatmapError::MissingColumns { missing, found } => {
            format!("Missing required columns {missing:?}. Detected columns: {found:?}")
        }
        other if other.kind() == ErrorKind::Parse => format!("Error loading CSV file: {other}"),
        other => other.to_string(),
    }
}

/// Prints the console message for a reportable error, or hands it back.
fn report_or_propagate(err: HeatmapError) -> Result<Option<PlotSummary>, HeatmapError> {
    if !err.is_reportable() {
        return Err(err);
    }
    report::failure(failure_message(&err));
    tracing::warn!(error = %err, "heatmap not produced");
    Ok(None)
}

fn load(input: &Path, mode: InputMode) -> Result<(PowerGrid, Option<Axes>), HeatmapError> {
    match mode {
        InputMode::Points => {
            let points = loader::load_points(input)?;
            report::info(format!("Detected columns: {:?}", points.columns));
            if let Some(value) = points.neg_infinity_replacement {
                report::info(format!("-inf readings replaced with {value} dBm"));
            }
            report::success(format!(
                "CSV file loaded successfully. {} points, grid shape: {:?}",
                points.samples,
                points.grid.shape()
            ));
            Ok((points.grid, Some(points.axes)))
        }
        InputMode::Dense | InputMode::Auto => {
            let grid = loader::load_dense(input)?;
            report::success(format!(
                "CSV file loaded successfully. Shape: {:?}",
                grid.shape()
            ));
            Ok((grid, None))
        }
    }
}

/// Loads `input`, renders it, and saves the image to `output`.
///
/// Unreadable, empty, malformed or all-missing input is reported on the
/// console and yields `Ok(None)` without touching `output`. Coercion
/// failures in point-cloud mode and output failures are returned as errors.
///
/// When `options` is `None` the preset matching the resolved mode is used.
pub fn plot_heatmap(
    input: &Path,
    output: &Path,
    mode: InputMode,
    options: Option<&RenderOptions>,
) -> Result<Option<PlotSummary>, HeatmapError> {
    let mode = match loader::resolve_mode(input, mode) {
        Ok(mode) => mode,
        Err(e) => return report_or_propagate(e),
    };
    tracing::debug!(input = %input.display(), ?mode, "plotting heatmap");

    let (grid, axes) = match load(input, mode) {
        Ok(loaded) => loaded,
        Err(e) => return report_or_propagate(e),
    };
    let shape = grid.shape();

    let preset;
    let options = match options {
        Some(options) => options,
        None => {
            preset = Preset::for_mode(mode).options();
            &preset
        }
    };

    let heatmap = match Heatmap::prepare_with_marker(grid, axes, options.marker_dbm) {
        Ok(heatmap) => heatmap,
        Err(e) => return report_or_propagate(e),
    };

    let rendered = render::render_heatmap(&heatmap, options, output)?;
    report::success(format!("Heatmap saved: {}", output.display()));

    Ok(Some(PlotSummary {
        mode,
        shape,
        bounds: heatmap.bounds,
        filled_cells: heatmap.filled_cells,
        output: rendered.path,
        image_size: (rendered.width, rendered.height),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages_name_the_problem() {
        assert_eq!(
            failure_message(&HeatmapError::Empty),
            "No data was loaded from the CSV file"
        );
        let schema = HeatmapError::MissingColumns {
            missing: vec!["Power_dBm".into()],
            found: vec!["X".into(), "Y".into(), "Signal".into()],
        };
        assert_eq!(
            failure_message(&schema),
            r#"Missing required columns ["Power_dBm"]. Detected columns: ["X", "Y", "Signal"]"#
        );
        let ragged = HeatmapError::Ragged { line: 2, expected: 3, found: 2 };
        assert!(failure_message(&ragged).starts_with("Error loading CSV file: line 2"));
    }

    #[test]
    fn only_reportable_errors_are_swallowed() {
        assert!(matches!(report_or_propagate(HeatmapError::AllMissing), Ok(None)));
        let coercion = HeatmapError::Coercion {
            line: 3,
            column: "Y".into(),
            value: "north".into(),
        };
        assert!(report_or_propagate(coercion).is_err());
        assert!(report_or_propagate(HeatmapError::Render("boom".into())).is_err());
    }
}
