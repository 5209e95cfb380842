//! Tick placement and label formatting.

use crate::grid::Axes;

use super::options::TickPolicy;

/// A tick at cell `index` with its text.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub index: usize,
    pub label: String,
}

/// Indices that get an index label along a dimension of `len` cells.
///
/// Above `thin_above` cells the ticks are `linspace(0, len - 1, count)`
/// truncated to integers.
pub fn index_positions(len: usize, thin_above: usize, count: usize) -> Vec<usize> {
    if len <= thin_above || count == 0 {
        return (0..len).collect();
    }
    if count == 1 {
        return vec![0];
    }
    let mut out: Vec<usize> = (0..count).map(|i| i * (len - 1) / (count - 1)).collect();
    out.dedup();
    out
}

/// Ticks for `len` cells whose coordinate values (if any) are `coords`.
pub fn axis_ticks(len: usize, policy: TickPolicy, coords: Option<&[f64]>) -> Vec<Tick> {
    match (policy, coords) {
        (TickPolicy::Coordinates, Some(values)) if values.len() == len => values
            .iter()
            .enumerate()
            .map(|(index, v)| Tick {
                index,
                label: format_value(*v),
            })
            .collect(),
        (TickPolicy::Indices { thin_above, count }, _) => index_positions(len, thin_above, count)
            .into_iter()
            .map(|index| Tick {
                index,
                label: index.to_string(),
            })
            .collect(),
        (TickPolicy::Coordinates, _) => (0..len)
            .map(|index| Tick {
                index,
                label: index.to_string(),
            })
            .collect(),
    }
}

/// Column ticks and row ticks for a grid.
pub fn grid_ticks(
    rows: usize,
    cols: usize,
    policy: TickPolicy,
    axes: Option<&Axes>,
) -> (Vec<Tick>, Vec<Tick>) {
    let x = axis_ticks(cols, policy, axes.map(|a| a.x.as_slice()));
    let y = axis_ticks(rows, policy, axes.map(|a| a.y.as_slice()));
    (x, y)
}

/// Short human-readable number: integers without decimals, others trimmed.
pub fn format_value(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{value:.0}");
    }
    let text = format!("{value:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Roughly `target` round tick values (1-2-5 steps) inside `[min, max]`.
pub fn nice_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite()) || target == 0 {
        return Vec::new();
    }
    if max <= min {
        return vec![min];
    }
    let raw = (max - min) / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);

    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}
