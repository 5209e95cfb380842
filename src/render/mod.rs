//! Heatmap rendering onto an in-memory bitmap, then cropped and saved.
//!
//! Everything is drawn on the root drawing area in pixel coordinates: cells
//! as filled rectangles, the color bar as one-pixel bands, and ticks/labels
//! as paths and text anchored next to the cells they describe.

pub mod fonts;
pub mod options;
pub mod png;
pub mod ticks;

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle, FontTransform};

use crate::colormap::ColorScale;
use crate::error::{HeatmapError, render_error};
use crate::grid::Heatmap;

pub use options::{Midpoint, Orientation, Preset, RenderOptions, TickPolicy};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const BORDER_GRAY: RGBColor = RGBColor(128, 128, 128);
const OBSTACLE: RGBColor = RGBColor(40, 40, 40);
/// Cells narrower than this many pixels get no border lines.
const MIN_BORDERED_CELL_PX: i32 = 4;
const COLORBAR_TICKS: usize = 6;

/// Result of a successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl Rect {
    fn width(&self) -> i32 {
        self.right - self.left
    }

    fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Pixel span of slot `i` out of `n` along an axis starting at `start`.
    fn span(start: i32, len: i32, i: usize, n: usize) -> (i32, i32) {
        let len = len as i64;
        let n = n.max(1) as i64;
        let a = start as i64 + (i as i64 * len) / n;
        let b = start as i64 + ((i as i64 + 1) * len) / n;
        (a as i32, b as i32)
    }
}

struct Layout {
    plot: Rect,
    colorbar: Rect,
}

impl Layout {
    fn new(width: u32, height: u32) -> Self {
        let w = width as f64;
        let h = height as f64;
        let top = (0.10 * h) as i32;
        let bottom = (0.88 * h) as i32;
        Self {
            plot: Rect {
                left: (0.12 * w) as i32,
                top,
                right: (0.78 * w) as i32,
                bottom,
            },
            colorbar: Rect {
                left: (0.81 * w) as i32,
                top,
                right: (0.835 * w) as i32,
                bottom,
            },
        }
    }
}

fn to_plotters(c: palette::Srgb<u8>) -> RGBColor {
    RGBColor(c.red, c.green, c.blue)
}

/// Vertical slot (0 = top) occupied by grid row `row`.
fn row_slot(row: usize, rows: usize, orientation: Orientation) -> usize {
    match orientation {
        Orientation::RowZeroTop => row,
        Orientation::RowZeroBottom => rows - 1 - row,
    }
}

/// Renders `heatmap` and writes it to `output`.
pub fn render_heatmap(
    heatmap: &Heatmap,
    options: &RenderOptions,
    output: &Path,
) -> Result<RenderedImage, HeatmapError> {
    let image = render_rgb(heatmap, options)?;
    let bytes = png::write_image(&image, output, options.dpi)?;
    tracing::info!(
        path = %output.display(),
        width = image.width(),
        height = image.height(),
        bytes,
        "heatmap written"
    );
    Ok(RenderedImage {
        path: output.to_path_buf(),
        width: image.width(),
        height: image.height(),
        bytes,
    })
}

/// Renders `heatmap` into a tightly cropped RGB image.
pub fn render_rgb(heatmap: &Heatmap, options: &RenderOptions) -> Result<RgbImage, HeatmapError> {
    let (rows, cols) = heatmap.grid.shape();
    if rows == 0 || cols == 0 {
        return Err(HeatmapError::Empty);
    }

    let (width, height) = options.canvas_size()?;
    let layout = Layout::new(width, height);
    let scale = ColorScale::new(heatmap.bounds, options.midpoint.resolve(heatmap.bounds));
    let with_text = options.labels && fonts::ensure_font(options.font_path.as_deref()).is_some();
    tracing::debug!(width, height, rows, cols, with_text, "rendering heatmap");

    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| HeatmapError::Render("width*height overflow".into()))?;
    let mut rgb = vec![255u8; pixel_count * 3];

    {
        let root = BitMapBackend::with_buffer(&mut rgb, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        draw_cells(&root, heatmap, options, &scale, &layout.plot)?;
        draw_colorbar(&root, &scale, &layout.colorbar)?;
        if with_text {
            let text = TextDrawer::new(&root, options);
            text.draw_grid_ticks(heatmap, options, &layout.plot)?;
            text.draw_colorbar_ticks(&scale, &layout.colorbar)?;
        }

        root.present().map_err(render_error)?;
    }

    let canvas = RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| HeatmapError::Render(format!("failed to build {width}x{height} image")))?;
    let pad = (0.1 * options.dpi as f64).round() as u32;
    Ok(png::tight_crop(&canvas, BACKGROUND, pad))
}

fn draw_cells<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    heatmap: &Heatmap,
    options: &RenderOptions,
    scale: &ColorScale,
    plot: &Rect,
) -> Result<(), HeatmapError>
where
    DB::ErrorType: 'static,
{
    let grid = &heatmap.grid;
    let (rows, cols) = grid.shape();

    for row in 0..rows {
        let Some(values) = grid.row(row) else {
            continue;
        };
        let slot = row_slot(row, rows, options.orientation);
        let (y0, y1) = Rect::span(plot.top, plot.height(), slot, rows);
        for (col, value) in values.iter().enumerate() {
            let (x0, x1) = Rect::span(plot.left, plot.width(), col, cols);
            let corners = [(x0, y0), ((x1 - 1).max(x0), (y1 - 1).max(y0))];
            let color = if heatmap.is_marker(*value) {
                OBSTACLE
            } else {
                to_plotters(scale.color(*value))
            };
            root.draw(&Rectangle::new(corners, color.filled()))
                .map_err(render_error)?;
        }
    }

    let borders = options.cell_borders
        && plot.width() / cols.max(1) as i32 >= MIN_BORDERED_CELL_PX
        && plot.height() / rows.max(1) as i32 >= MIN_BORDERED_CELL_PX;
    if borders {
        draw_cell_borders(root, plot, rows, cols)?;
    }
    Ok(())
}

/// One line per row and column boundary, so shared edges stay 1 px wide.
fn draw_cell_borders<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    plot: &Rect,
    rows: usize,
    cols: usize,
) -> Result<(), HeatmapError>
where
    DB::ErrorType: 'static,
{
    let style = BORDER_GRAY.stroke_width(1);
    let (right, bottom) = (plot.right - 1, plot.bottom - 1);
    for col in 0..=cols {
        let x = Rect::span(plot.left, plot.width(), col, cols).0.min(right);
        root.draw(&PathElement::new(vec![(x, plot.top), (x, bottom)], style))
            .map_err(render_error)?;
    }
    for row in 0..=rows {
        let y = Rect::span(plot.top, plot.height(), row, rows).0.min(bottom);
        root.draw(&PathElement::new(vec![(plot.left, y), (right, y)], style))
            .map_err(render_error)?;
    }
    Ok(())
}

fn draw_colorbar<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    scale: &ColorScale,
    bar: &Rect,
) -> Result<(), HeatmapError>
where
    DB::ErrorType: 'static,
{
    let bounds = scale.bounds;
    let steps = bar.height().max(1);
    for step in 0..steps {
        let y = bar.top + step;
        let frac = if steps > 1 {
            step as f64 / (steps - 1) as f64
        } else {
            0.5
        };
        let value = bounds.vmax - frac * bounds.span();
        let color = to_plotters(scale.color(value));
        root.draw(&Rectangle::new([(bar.left, y), (bar.right, y)], color.filled()))
            .map_err(render_error)?;
    }
    root.draw(&Rectangle::new(
        [(bar.left, bar.top), (bar.right, bar.bottom)],
        BLACK.stroke_width(1),
    ))
    .map_err(render_error)?;
    Ok(())
}

/// Text and tick marks, sized from the output DPI.
struct TextDrawer<'a, DB: DrawingBackend> {
    root: &'a DrawingArea<DB, Shift>,
    tick_font: f64,
    label_font: f64,
    title_font: f64,
    tick_len: i32,
    gap: i32,
    line_width: u32,
    title: String,
    x_label: String,
    y_label: String,
    colorbar_label: String,
}

impl<'a, DB: DrawingBackend> TextDrawer<'a, DB>
where
    DB::ErrorType: 'static,
{
    fn new(root: &'a DrawingArea<DB, Shift>, options: &RenderOptions) -> Self {
        let pt = options.px_per_pt();
        Self {
            root,
            tick_font: 10.0 * pt,
            label_font: 10.0 * pt,
            title_font: 12.0 * pt,
            tick_len: (3.5 * pt).round() as i32,
            gap: (3.5 * pt).round() as i32,
            line_width: (0.8 * pt).round().max(1.0) as u32,
            title: options.title.clone(),
            x_label: options.x_label.clone(),
            y_label: options.y_label.clone(),
            colorbar_label: options.colorbar_label.clone(),
        }
    }

    fn font(&self, size: f64) -> FontDesc<'static> {
        FontDesc::new(FontFamily::SansSerif, size, FontStyle::Normal)
    }

    fn text(&self, text: &str, pos: (i32, i32), font: FontDesc<'_>, anchor: Pos) -> Result<(), HeatmapError> {
        if text.is_empty() {
            return Ok(());
        }
        let style = font.color(&BLACK).pos(anchor);
        self.root.draw_text(text, &style, pos).map_err(render_error)
    }

    fn line(&self, from: (i32, i32), to: (i32, i32)) -> Result<(), HeatmapError> {
        self.root
            .draw(&PathElement::new(vec![from, to], BLACK.stroke_width(self.line_width)))
            .map_err(render_error)
    }

    fn widest(&self, labels: &[String], size: f64) -> Result<i32, HeatmapError> {
        let style = self.font(size).color(&BLACK);
        let mut widest = 0u32;
        for label in labels {
            let (w, _) = self
                .root
                .estimate_text_size(label, &style)
                .map_err(render_error)?;
            widest = widest.max(w);
        }
        Ok(widest as i32)
    }

    fn draw_grid_ticks(
        &self,
        heatmap: &Heatmap,
        options: &RenderOptions,
        plot: &Rect,
    ) -> Result<(), HeatmapError> {
        let (rows, cols) = heatmap.grid.shape();
        let (x_ticks, y_ticks) = ticks::grid_ticks(rows, cols, options.ticks, heatmap.axes.as_ref());

        for tick in &x_ticks {
            let (x0, x1) = Rect::span(plot.left, plot.width(), tick.index, cols);
            let x = (x0 + x1) / 2;
            self.line((x, plot.bottom), (x, plot.bottom + self.tick_len))?;
            self.text(
                &tick.label,
                (x, plot.bottom + self.tick_len + self.gap),
                self.font(self.tick_font),
                Pos::new(HPos::Center, VPos::Top),
            )?;
        }

        for tick in &y_ticks {
            let slot = row_slot(tick.index, rows, options.orientation);
            let (y0, y1) = Rect::span(plot.top, plot.height(), slot, rows);
            let y = (y0 + y1) / 2;
            self.line((plot.left - self.tick_len, y), (plot.left, y))?;
            self.text(
                &tick.label,
                (plot.left - self.tick_len - self.gap, y),
                self.font(self.tick_font),
                Pos::new(HPos::Right, VPos::Center),
            )?;
        }

        let center_x = (plot.left + plot.right) / 2;
        let center_y = (plot.top + plot.bottom) / 2;
        let tick_text_height = self.tick_font.round() as i32;

        self.text(
            &self.x_label,
            (center_x, plot.bottom + self.tick_len + 2 * self.gap + tick_text_height),
            self.font(self.label_font),
            Pos::new(HPos::Center, VPos::Top),
        )?;

        let y_labels: Vec<String> = y_ticks.iter().map(|t| t.label.clone()).collect();
        let y_label_x = plot.left
            - self.tick_len
            - 2 * self.gap
            - self.widest(&y_labels, self.tick_font)?
            - (self.label_font / 2.0).round() as i32;
        self.text(
            &self.y_label,
            (y_label_x, center_y),
            self.font(self.label_font).transform(FontTransform::Rotate270),
            Pos::new(HPos::Center, VPos::Center),
        )?;

        self.text(
            &self.title,
            (center_x, plot.top - 2 * self.gap),
            self.font(self.title_font),
            Pos::new(HPos::Center, VPos::Bottom),
        )
    }

    fn draw_colorbar_ticks(&self, scale: &ColorScale, bar: &Rect) -> Result<(), HeatmapError> {
        let bounds = scale.bounds;
        let values = ticks::nice_ticks(bounds.vmin, bounds.vmax, COLORBAR_TICKS);
        let span = bounds.span();
        let mut labels = Vec::with_capacity(values.len());

        for value in values {
            let frac = if span > 0.0 {
                (bounds.vmax - value) / span
            } else {
                0.5
            };
            let y = bar.top + (frac * (bar.height() - 1).max(0) as f64).round() as i32;
            let label = ticks::format_value(value);
            self.line((bar.right, y), (bar.right + self.tick_len, y))?;
            self.text(
                &label,
                (bar.right + self.tick_len + self.gap, y),
                self.font(self.tick_font),
                Pos::new(HPos::Left, VPos::Center),
            )?;
            labels.push(label);
        }

        let label_x = bar.right
            + self.tick_len
            + 2 * self.gap
            + self.widest(&labels, self.tick_font)?
            + (self.label_font / 2.0).round() as i32;
        self.text(
            &self.colorbar_label,
            (label_x, (bar.top + bar.bottom) / 2),
            self.font(self.label_font).transform(FontTransform::Rotate90),
            Pos::new(HPos::Center, VPos::Center),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::PowerGrid;

    fn heatmap(rows: usize, cols: usize) -> Heatmap {
        let cells = (0..rows * cols).map(|i| -90.0 + i as f64).collect();
        Heatmap::prepare(PowerGrid::from_cells(rows, cols, cells).unwrap(), None).unwrap()
    }

    fn small_options() -> RenderOptions {
        RenderOptions {
            dpi: 40,
            labels: false,
            ..RenderOptions::dense_matrix()
        }
    }

    #[test]
    fn spans_tile_the_axis() {
        let spans: Vec<(i32, i32)> = (0..3).map(|i| Rect::span(10, 100, i, 3)).collect();
        assert_eq!(spans, vec![(10, 43), (43, 76), (76, 110)]);
    }

    #[test]
    fn row_zero_placement() {
        assert_eq!(row_slot(0, 5, Orientation::RowZeroBottom), 4);
        assert_eq!(row_slot(0, 5, Orientation::RowZeroTop), 0);
    }

    /// Cells only, on an uncropped canvas.
    fn paint_cells(map: &Heatmap, options: &RenderOptions) -> (RgbImage, Layout) {
        let scale = ColorScale::new(map.bounds, options.midpoint.resolve(map.bounds));
        let (width, height) = options.canvas_size().unwrap();
        let layout = Layout::new(width, height);
        let mut buf = vec![255u8; (width * height * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
            draw_cells(&root, map, options, &scale, &layout.plot).unwrap();
            root.present().unwrap();
        }
        (RgbImage::from_raw(width, height, buf).unwrap(), layout)
    }

    #[test]
    fn bottom_left_cell_follows_orientation() {
        let map = heatmap(2, 2);
        let scale = ColorScale::new(map.bounds, Midpoint::DataCenter.resolve(map.bounds));

        let dense = small_options();
        let image = render_rgb(&map, &dense).unwrap();
        let (w, h) = image.dimensions();
        assert!(w > 0 && h > 0);

        // Row 0 holds the two lowest values; at the bottom it reads as red.
        let (full, layout) = paint_cells(&map, &dense);
        let spot = (layout.plot.left + 2, layout.plot.bottom - 3);
        let px = full.get_pixel(spot.0 as u32, spot.1 as u32);
        let expected = scale.color(-90.0);
        assert_eq!(px.0, [expected.red, expected.green, expected.blue]);
    }

    #[test]
    fn shared_cell_edges_are_one_pixel_wide() {
        let map = heatmap(2, 2);
        let (full, layout) = paint_cells(&map, &small_options());
        let plot = layout.plot;
        let x = Rect::span(plot.left, plot.width(), 1, 2).0 as u32;
        let y = (plot.top + plot.height() / 4) as u32;

        let gray = [BORDER_GRAY.0, BORDER_GRAY.1, BORDER_GRAY.2];
        assert_eq!(full.get_pixel(x, y).0, gray);
        assert_ne!(full.get_pixel(x - 1, y).0, gray);
        assert_ne!(full.get_pixel(x + 1, y).0, gray);
    }

    #[test]
    fn marker_cells_use_obstacle_color() {
        let grid = PowerGrid::from_cells(1, 2, vec![-555.0, -40.0]).unwrap();
        let map = Heatmap::prepare_with_marker(grid, None, Some(-555.0)).unwrap();
        let options = RenderOptions {
            cell_borders: false,
            ..small_options()
        };
        let (full, layout) = paint_cells(&map, &options);
        let px = full.get_pixel(
            (layout.plot.left + 2) as u32,
            ((layout.plot.top + layout.plot.bottom) / 2) as u32,
        );
        assert_eq!(px.0, [OBSTACLE.0, OBSTACLE.1, OBSTACLE.2]);
    }

    #[test]
    fn renders_without_text() {
        let image = render_rgb(&heatmap(30, 25), &small_options()).unwrap();
        let (width, height) = small_options().canvas_size().unwrap();
        assert!(image.width() <= width && image.height() <= height);
    }
}
