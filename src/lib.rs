//! WiFi signal-strength heatmaps from CSV power grids.
//!
//! Two input layouts are supported: a header-less dense matrix of dBm
//! readings, and labeled `X,Y,Power_dBm` samples that are scattered onto a
//! grid derived from their coordinates. Either way the grid is filled,
//! colored on a red-yellow-green scale, and saved as a single image.

pub mod colormap;
pub mod error;
pub mod grid;
pub mod loader;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod simulate;

pub use error::{ErrorKind, HeatmapError};
pub use grid::{Axes, Bounds, Heatmap, PowerGrid};
pub use loader::InputMode;
pub use pipeline::{PlotSummary, plot_heatmap};
pub use render::{Midpoint, Orientation, Preset, RenderOptions, TickPolicy};
