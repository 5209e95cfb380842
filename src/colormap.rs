//! Diverging red-yellow-green color scale.

use palette::{Mix, Srgb};

use crate::grid::Bounds;

/// ColorBrewer `RdYlGn`, low (red) to high (green).
const RD_YL_GN: [Srgb<u8>; 11] = [
    Srgb::new(0xa5, 0x00, 0x26),
    Srgb::new(0xd7, 0x30, 0x27),
    Srgb::new(0xf4, 0x6d, 0x43),
    Srgb::new(0xfd, 0xae, 0x61),
    Srgb::new(0xfe, 0xe0, 0x8b),
    Srgb::new(0xff, 0xff, 0xbf),
    Srgb::new(0xd9, 0xef, 0x8b),
    Srgb::new(0xa6, 0xd9, 0x6a),
    Srgb::new(0x66, 0xbd, 0x63),
    Srgb::new(0x1a, 0x98, 0x50),
    Srgb::new(0x00, 0x68, 0x37),
];

/// Samples the colormap at `t` in `[0, 1]`; out-of-range values are clamped.
pub fn rd_yl_gn(t: f64) -> Srgb<u8> {
    let t = if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) };
    let last = RD_YL_GN.len() - 1;
    let pos = t * last as f64;
    let lower = (pos.floor() as usize).min(last);
    let upper = (lower + 1).min(last);
    let frac = (pos - lower as f64) as f32;

    let a: Srgb<f32> = RD_YL_GN[lower].into_format();
    let b: Srgb<f32> = RD_YL_GN[upper].into_format();
    a.mix(b, frac).into_format()
}

/// Maps dBm values onto the colormap around a center value.
///
/// The scale is symmetric around `center`: with `r = max(vmax - c, c - vmin)`
/// a value `v` lands at `0.5 + (v - c) / 2r`. When the center is the data
/// midpoint this spans the whole colormap; a center outside the data range
/// only uses one side of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub bounds: Bounds,
    pub center: f64,
}

impl ColorScale {
    pub fn new(bounds: Bounds, center: f64) -> Self {
        Self { bounds, center }
    }

    pub fn position(&self, value: f64) -> f64 {
        let half_range = (self.bounds.vmax - self.center).max(self.center - self.bounds.vmin);
        if !(half_range > 0.0) {
            return 0.5;
        }
        (0.5 + (value - self.center) / (2.0 * half_range)).clamp(0.0, 1.0)
    }

    pub fn color(&self, value: f64) -> Srgb<u8> {
        rd_yl_gn(self.position(value))
    }
}
