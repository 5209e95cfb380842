use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HeatmapError;
use crate::grid::Bounds;
use crate::loader::InputMode;

/// Where the diverging scale is centered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Midpoint {
    /// `(vmin + vmax) / 2`.
    DataCenter,
    /// A fixed dBm value regardless of the data range.
    Fixed(f64),
}

impl Midpoint {
    pub fn resolve(&self, bounds: Bounds) -> f64 {
        match self {
            Midpoint::DataCenter => (bounds.vmin + bounds.vmax) / 2.0,
            Midpoint::Fixed(v) => *v,
        }
    }
}

/// How rows and columns are labeled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    /// Raw row/column indices, thinned to `count` evenly spaced ticks when a
    /// dimension has more than `thin_above` cells.
    Indices { thin_above: usize, count: usize },
    /// Every row/column labeled with its coordinate value. Falls back to
    /// indices when the grid has no coordinate axes.
    Coordinates,
}

/// Vertical placement of row 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    RowZeroBottom,
    RowZeroTop,
}

/// Named option sets reproducing the two historical outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Dense,
    Points,
}

impl Preset {
    pub fn options(self) -> RenderOptions {
        match self {
            Preset::Dense => RenderOptions::dense_matrix(),
            Preset::Points => RenderOptions::point_cloud(),
        }
    }

    /// Preset matching a resolved input mode; `Auto` falls back to dense.
    pub fn for_mode(mode: InputMode) -> Self {
        match mode {
            InputMode::Points => Preset::Points,
            InputMode::Dense | InputMode::Auto => Preset::Dense,
        }
    }
}

const MAX_CANVAS_SIDE: u32 = 20_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub midpoint: Midpoint,
    pub ticks: TickPolicy,
    pub orientation: Orientation,
    /// Thin gray lines between cells, skipped when cells are too small.
    pub cell_borders: bool,
    /// Draw title, ticks, and labels. Needs a usable font.
    pub labels: bool,
    pub dpi: u32,
    pub width_in: f64,
    pub height_in: f64,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub colorbar_label: String,
    /// TrueType font used for text; common system fonts are probed if unset.
    pub font_path: Option<PathBuf>,
    /// Cells holding exactly this value are obstacles: left out of the color
    /// scale and painted in a flat color.
    pub marker_dbm: Option<f64>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::dense_matrix()
    }
}

impl RenderOptions {
    pub fn dense_matrix() -> Self {
        Self {
            midpoint: Midpoint::DataCenter,
            ticks: TickPolicy::Indices {
                thin_above: 20,
                count: 10,
            },
            orientation: Orientation::RowZeroBottom,
            cell_borders: true,
            labels: true,
            dpi: 300,
            width_in: 10.0,
            height_in: 8.0,
            title: "WiFi signal heatmap (dBm)".to_string(),
            x_label: "Position X".to_string(),
            y_label: "Position Y".to_string(),
            colorbar_label: "Power (dBm)".to_string(),
            font_path: None,
            marker_dbm: None,
        }
    }

    pub fn point_cloud() -> Self {
        Self {
            midpoint: Midpoint::Fixed(0.0),
            ticks: TickPolicy::Coordinates,
            orientation: Orientation::RowZeroTop,
            cell_borders: false,
            ..Self::dense_matrix()
        }
    }

    /// Overlays the top-level keys of a JSON object onto these options.
    pub fn with_overrides(&self, overrides: serde_json::Value) -> Result<Self, HeatmapError> {
        let mut base = serde_json::to_value(self)?;
        if let (Some(base), serde_json::Value::Object(patch)) = (base.as_object_mut(), overrides) {
            for (key, value) in patch {
                base.insert(key, value);
            }
        }
        Ok(serde_json::from_value(base)?)
    }

    pub fn with_overrides_from_file(&self, path: &Path) -> Result<Self, HeatmapError> {
        let text = std::fs::read_to_string(path).map_err(|source| HeatmapError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.with_overrides(serde_json::from_str(&text)?)
    }

    /// Canvas size in pixels before cropping.
    pub fn canvas_size(&self) -> Result<(u32, u32), HeatmapError> {
        let side = |inches: f64| -> Result<u32, HeatmapError> {
            let px = (inches * self.dpi as f64).round();
            if !(px >= 1.0 && px <= MAX_CANVAS_SIDE as f64) {
                return Err(HeatmapError::Render(format!(
                    "canvas side of {inches} in at {} dpi is out of range",
                    self.dpi
                )));
            }
            Ok(px as u32)
        };
        Ok((side(self.width_in)?, side(self.height_in)?))
    }

    /// Pixels per typographic point.
    pub fn px_per_pt(&self) -> f64 {
        self.dpi as f64 / 72.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_in_policy() {
        let dense = RenderOptions::dense_matrix();
        let points = RenderOptions::point_cloud();
        assert_eq!(dense.midpoint, Midpoint::DataCenter);
        assert_eq!(points.midpoint, Midpoint::Fixed(0.0));
        assert_eq!(points.ticks, TickPolicy::Coordinates);
        assert_eq!(dense.orientation, Orientation::RowZeroBottom);
        assert_eq!(points.orientation, Orientation::RowZeroTop);
        assert_eq!(points.dpi, 300);
    }

    #[test]
    fn overrides_keep_unset_fields() {
        let base = RenderOptions::point_cloud();
        let patched = base
            .with_overrides(serde_json::json!({ "dpi": 72, "midpoint": { "fixed": -60.0 } }))
            .unwrap();
        assert_eq!(patched.dpi, 72);
        assert_eq!(patched.midpoint, Midpoint::Fixed(-60.0));
        assert_eq!(patched.ticks, TickPolicy::Coordinates);
        assert_eq!(patched.marker_dbm, None);

        let marked = base.with_overrides(serde_json::json!({ "marker_dbm": -555.0 })).unwrap();
        assert_eq!(marked.marker_dbm, Some(-555.0));
    }

    #[test]
    fn canvas_size_follows_dpi() {
        let opts = RenderOptions::dense_matrix();
        assert_eq!(opts.canvas_size().unwrap(), (3000, 2400));
        let tiny = RenderOptions {
            width_in: 0.0,
            ..RenderOptions::dense_matrix()
        };
        assert!(tiny.canvas_size().is_err());
    }

    #[test]
    fn midpoint_resolution() {
        let bounds = Bounds { vmin: -80.0, vmax: -20.0 };
        assert_eq!(Midpoint::DataCenter.resolve(bounds), -50.0);
        assert_eq!(Midpoint::Fixed(0.0).resolve(bounds), 0.0);
    }
}
