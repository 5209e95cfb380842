//! Free-space signal map of a room with emitters and attenuating obstacles.
//!
//! Cell `(x, y)` is both the grid index and the position used for distance
//! computations; `cells_per_meter` converts cell distances to meters.

use std::f64::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HeatmapError;
use crate::grid::PowerGrid;

const SPEED_OF_LIGHT: f64 = 3e8;
const EPSILON: f64 = 1e-6;
/// Below this distance (meters) the emitter power is returned unchanged.
const MIN_DISTANCE_M: f64 = 0.001;

fn default_cells_per_meter() -> f64 {
    100.0
}

fn default_floor_dbm() -> f64 {
    -100.0
}

fn default_marker_dbm() -> f64 {
    MARKER_DBM
}

/// Value stamped on obstacle and room-border cells when marking is enabled.
pub const MARKER_DBM: f64 = -555.0;
/// Width in cells of the marked room border.
const BORDER_CELLS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emitter {
    pub x: f64,
    pub y: f64,
    pub power_dbm: f64,
    pub frequency_hz: f64,
}

impl Emitter {
    /// Received power at `(x, y)` ignoring obstacles.
    pub fn received_power(&self, x: f64, y: f64, cells_per_meter: f64) -> f64 {
        let d = ((x - self.x) / cells_per_meter).hypot((y - self.y) / cells_per_meter);
        if d < MIN_DISTANCE_M {
            return self.power_dbm;
        }
        self.power_dbm - free_space_path_loss(d, self.frequency_hz)
    }
}

/// Free-space path loss in dB at `distance_m` meters.
pub fn free_space_path_loss(distance_m: f64, frequency_hz: f64) -> f64 {
    20.0 * distance_m.log10()
        + 20.0 * frequency_hz.log10()
        + 20.0 * (4.0 * PI / SPEED_OF_LIGHT).log10()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Obstacle {
    /// A thick segment from `(x1, y1)` to `(x2, y2)`.
    Wall {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        thickness: f64,
        attenuation_db: f64,
    },
    Circle {
        cx: f64,
        cy: f64,
        radius: f64,
        attenuation_db: f64,
    },
}

/// A wall expressed in its own frame: centered at `mid`, long axis `dir`.
struct WallFrame {
    mid: (f64, f64),
    dir: (f64, f64),
    half_length: f64,
    half_thickness: f64,
}

impl WallFrame {
    fn new(x1: f64, y1: f64, x2: f64, y2: f64, thickness: f64) -> Self {
        let (dx, dy) = (x2 - x1, y2 - y1);
        let length = dx.hypot(dy);
        let dir = if length < EPSILON {
            (1.0, 0.0)
        } else {
            (dx / length, dy / length)
        };
        Self {
            mid: ((x1 + x2) / 2.0, (y1 + y2) / 2.0),
            dir,
            half_length: length / 2.0,
            half_thickness: thickness / 2.0,
        }
    }

    fn is_degenerate(&self) -> bool {
        self.half_length < EPSILON / 2.0
    }

    /// `(along, across)` coordinates of a point.
    fn local(&self, x: f64, y: f64) -> (f64, f64) {
        let (dx, dy) = (x - self.mid.0, y - self.mid.1);
        (
            dx * self.dir.0 + dy * self.dir.1,
            -dx * self.dir.1 + dy * self.dir.0,
        )
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        if self.is_degenerate() {
            let (dx, dy) = (x - self.mid.0, y - self.mid.1);
            return dx * dx + dy * dy <= self.half_thickness * self.half_thickness + EPSILON;
        }
        let (along, across) = self.local(x, y);
        along.abs() <= self.half_length + EPSILON && across.abs() <= self.half_thickness + EPSILON
    }

    /// Slab test of segment `a → b` against the wall rectangle.
    fn crossed_by(&self, a: (f64, f64), b: (f64, f64)) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let start = self.local(a.0, a.1);
        let end = self.local(b.0, b.1);
        let slabs = [
            (start.0, end.0 - start.0, self.half_length),
            (start.1, end.1 - start.1, self.half_thickness),
        ];

        let mut t_enter: f64 = 0.0;
        let mut t_exit: f64 = 1.0;
        for (origin, delta, half) in slabs {
            if delta.abs() < EPSILON {
                if origin < -half - EPSILON || origin > half + EPSILON {
                    return false;
                }
                continue;
            }
            let (mut t1, mut t2) = ((-half - origin) / delta, (half - origin) / delta);
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_enter = t_enter.max(t1);
            t_exit = t_exit.min(t2);
            if t_enter > t_exit {
                return false;
            }
        }
        true
    }
}

impl Obstacle {
    pub fn attenuation_db(&self) -> f64 {
        match self {
            Obstacle::Wall { attenuation_db, .. } | Obstacle::Circle { attenuation_db, .. } => {
                *attenuation_db
            }
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        match *self {
            Obstacle::Wall {
                x1,
                y1,
                x2,
                y2,
                thickness,
                ..
            } => WallFrame::new(x1, y1, x2, y2, thickness).contains(x, y),
            Obstacle::Circle { cx, cy, radius, .. } => {
                let (dx, dy) = (x - cx, y - cy);
                dx * dx + dy * dy <= radius * radius + EPSILON
            }
        }
    }

    /// Whether the straight path from `from` to `to` passes through this
    /// obstacle, counting either endpoint being inside it.
    pub fn blocks(&self, from: (f64, f64), to: (f64, f64)) -> bool {
        if self.contains(from.0, from.1) || self.contains(to.0, to.1) {
            return true;
        }
        match *self {
            Obstacle::Wall {
                x1,
                y1,
                x2,
                y2,
                thickness,
                ..
            } => WallFrame::new(x1, y1, x2, y2, thickness).crossed_by(from, to),
            Obstacle::Circle { cx, cy, radius, .. } => {
                segment_hits_circle(from, to, (cx, cy), radius)
            }
        }
    }
}

fn segment_hits_circle(a: (f64, f64), b: (f64, f64), center: (f64, f64), radius: f64) -> bool {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (fx, fy) = (a.0 - center.0, a.1 - center.1);

    let qa = dx * dx + dy * dy;
    if qa < EPSILON * EPSILON {
        return false;
    }
    let qb = 2.0 * (fx * dx + fy * dy);
    let qc = fx * fx + fy * fy - radius * radius;
    let discriminant = qb * qb - 4.0 * qa * qc;
    if discriminant < 0.0 {
        return false;
    }
    let root = discriminant.sqrt();
    let t1 = (-qb - root) / (2.0 * qa);
    let t2 = (-qb + root) / (2.0 * qa);
    (0.0..=1.0).contains(&t1) || (0.0..=1.0).contains(&t2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub width: usize,
    pub height: usize,
    #[serde(default = "default_cells_per_meter")]
    pub cells_per_meter: f64,
    #[serde(default = "default_floor_dbm")]
    pub floor_dbm: f64,
    pub emitters: Vec<Emitter>,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    /// Stamp obstacle interiors and the room border with `marker_dbm`.
    #[serde(default)]
    pub mark_obstacles: bool,
    #[serde(default = "default_marker_dbm")]
    pub marker_dbm: f64,
}

impl Scene {
    pub fn from_json(text: &str) -> Result<Self, HeatmapError> {
        let scene: Scene = serde_json::from_str(text)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn load(path: &Path) -> Result<Self, HeatmapError> {
        let text = std::fs::read_to_string(path).map_err(|source| HeatmapError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), HeatmapError> {
        let fail = |msg: String| Err(HeatmapError::Scene(msg));
        if self.width == 0 || self.height == 0 {
            return fail(format!("room size {}x{} is empty", self.width, self.height));
        }
        if let Err(e) = PowerGrid::checked_len(self.height, self.width) {
            return fail(e.to_string());
        }
        if self.mark_obstacles && !self.marker_dbm.is_finite() {
            return fail("marker_dbm must be a finite number".to_string());
        }
        if !(self.cells_per_meter > 0.0) {
            return fail(format!("cells_per_meter must be positive, got {}", self.cells_per_meter));
        }
        if self.emitters.is_empty() {
            return fail("scene has no emitters".to_string());
        }
        for (i, e) in self.emitters.iter().enumerate() {
            if !(e.frequency_hz > 0.0) {
                return fail(format!("emitter {i}: frequency must be positive"));
            }
        }
        for (i, o) in self.obstacles.iter().enumerate() {
            let size = match o {
                Obstacle::Wall { thickness, .. } => *thickness,
                Obstacle::Circle { radius, .. } => *radius,
            };
            if !(size >= 0.0) {
                return fail(format!("obstacle {i}: size must not be negative"));
            }
        }
        Ok(())
    }

    /// Power at one cell: the strongest emitter after obstacle losses,
    /// never below `floor_dbm`.
    pub fn power_at(&self, x: f64, y: f64) -> f64 {
        self.emitters
            .iter()
            .map(|e| {
                let losses: f64 = self
                    .obstacles
                    .iter()
                    .filter(|o| o.blocks((x, y), (e.x, e.y)))
                    .map(Obstacle::attenuation_db)
                    .sum();
                e.received_power(x, y, self.cells_per_meter) - losses
            })
            .fold(self.floor_dbm, f64::max)
    }

    /// The full `height × width` signal map, with obstacles stamped when
    /// `mark_obstacles` is set.
    pub fn signal_map(&self) -> Result<PowerGrid, HeatmapError> {
        let mut grid = PowerGrid::new(self.height, self.width, self.floor_dbm)?;
        for y in 0..self.height {
            for x in 0..self.width {
                grid.set(y, x, self.power_at(x as f64, y as f64));
            }
        }
        if self.mark_obstacles {
            let marked = self.mark_obstacles_on(&mut grid);
            tracing::debug!(marked, marker = self.marker_dbm, "marked obstacle cells");
        }
        tracing::debug!(
            width = self.width,
            height = self.height,
            emitters = self.emitters.len(),
            obstacles = self.obstacles.len(),
            "computed signal map"
        );
        Ok(grid)
    }

    /// Writes `marker_dbm` into every cell inside an obstacle and into the
    /// two outermost rings of the room. Returns the number of cells marked.
    pub fn mark_obstacles_on(&self, grid: &mut PowerGrid) -> usize {
        let (rows, cols) = grid.shape();
        let mut marked = 0;
        for y in 0..rows {
            for x in 0..cols {
                let border = x < BORDER_CELLS
                    || y < BORDER_CELLS
                    || x + BORDER_CELLS >= cols
                    || y + BORDER_CELLS >= rows;
                let inside = border
                    || self
                        .obstacles
                        .iter()
                        .any(|o| o.contains(x as f64, y as f64));
                if inside && grid.set(y, x, self.marker_dbm) {
                    marked += 1;
                }
            }
        }
        marked
    }
}

/// Writes `grid` as a header-less dense CSV, one grid row per line.
pub fn export_csv(grid: &PowerGrid, path: &Path) -> Result<(), HeatmapError> {
    let export_err = |source| HeatmapError::Export {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(export_err)?;
    for row in 0..grid.rows() {
        let Some(values) = grid.row(row) else {
            continue;
        };
        writer
            .write_record(values.iter().map(|v| v.to_string()))
            .map_err(export_err)?;
    }
    writer.flush().map_err(|source| HeatmapError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(x1: f64, y1: f64, x2: f64, y2: f64) -> Obstacle {
        Obstacle::Wall {
            x1,
            y1,
            x2,
            y2,
            thickness: 2.0,
            attenuation_db: 10.0,
        }
    }

    #[test]
    fn fspl_at_one_meter_2_4ghz() {
        let loss = free_space_path_loss(1.0, 2.4e9);
        assert!((loss - 40.05).abs() < 0.01, "loss = {loss}");
    }

    #[test]
    fn emitter_cell_keeps_full_power() {
        let e = Emitter { x: 5.0, y: 5.0, power_dbm: -30.0, frequency_hz: 2.4e9 };
        assert_eq!(e.received_power(5.0, 5.0, 100.0), -30.0);
        assert!(e.received_power(105.0, 5.0, 100.0) < -69.0);
    }

    #[test]
    fn vertical_wall_blocks_crossing_path() {
        let w = wall(10.0, 0.0, 10.0, 20.0);
        assert!(w.blocks((0.0, 5.0), (20.0, 5.0)));
        assert!(!w.blocks((0.0, 5.0), (5.0, 15.0)));
        assert!(!w.blocks((0.0, 30.0), (20.0, 30.0)));
        assert!(w.blocks((10.5, 5.0), (20.0, 5.0)));
    }

    #[test]
    fn diagonal_wall_uses_its_own_frame() {
        let w = wall(0.0, 0.0, 10.0, 10.0);
        assert!(w.blocks((0.0, 10.0), (10.0, 0.0)));
        assert!(!w.blocks((0.0, 10.0), (2.0, 12.0)));
    }

    #[test]
    fn circle_blocks_only_when_touched() {
        let c = Obstacle::Circle { cx: 10.0, cy: 10.0, radius: 3.0, attenuation_db: 5.0 };
        assert!(c.blocks((0.0, 10.0), (20.0, 10.0)));
        assert!(!c.blocks((0.0, 0.0), (20.0, 0.0)));
        assert!(!c.blocks((0.0, 10.0), (5.0, 10.0)));
    }

    #[test]
    fn wall_attenuates_far_side() {
        let scene = Scene {
            width: 30,
            height: 10,
            cells_per_meter: 10.0,
            floor_dbm: -100.0,
            emitters: vec![Emitter { x: 5.0, y: 5.0, power_dbm: -30.0, frequency_hz: 2.4e9 }],
            obstacles: vec![wall(15.0, 0.0, 15.0, 10.0)],
            mark_obstacles: false,
            marker_dbm: MARKER_DBM,
        };
        let open = Scene { obstacles: Vec::new(), ..scene.clone() };
        let blocked = scene.power_at(25.0, 5.0);
        let clear = open.power_at(25.0, 5.0);
        assert!((clear - blocked - 10.0).abs() < 1e-9);
        assert_eq!(scene.signal_map().unwrap().shape(), (10, 30));
    }

    #[test]
    fn power_never_below_floor() {
        let scene = Scene {
            width: 2,
            height: 1,
            cells_per_meter: 0.001,
            floor_dbm: -100.0,
            emitters: vec![Emitter { x: 0.0, y: 0.0, power_dbm: -30.0, frequency_hz: 2.4e9 }],
            obstacles: Vec::new(),
            mark_obstacles: false,
            marker_dbm: MARKER_DBM,
        };
        assert_eq!(scene.power_at(1.0, 0.0), -100.0);
    }

    #[test]
    fn scene_json_defaults_and_validation() {
        let scene = Scene::from_json(
            r#"{"width": 4, "height": 3,
                "emitters": [{"x": 1, "y": 1, "power_dbm": -30, "frequency_hz": 2.4e9}],
                "obstacles": [{"kind": "circle", "cx": 2, "cy": 2, "radius": 1, "attenuation_db": 5}]}"#,
        )
        .unwrap();
        assert_eq!(scene.cells_per_meter, 100.0);
        assert_eq!(scene.floor_dbm, -100.0);

        let err = Scene::from_json(r#"{"width": 4, "height": 3, "emitters": []}"#).unwrap_err();
        assert!(matches!(err, HeatmapError::Scene(_)));
    }

    #[test]
    fn huge_rooms_fail_validation() {
        let err = Scene::from_json(
            r#"{"width": 10000000000, "height": 10000000000,
                "emitters": [{"x": 1, "y": 1, "power_dbm": -30, "frequency_hz": 2.4e9}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, HeatmapError::Scene(_)));
    }

    #[test]
    fn marking_stamps_border_and_obstacles() {
        let scene = Scene {
            width: 10,
            height: 8,
            cells_per_meter: 100.0,
            floor_dbm: -100.0,
            emitters: vec![Emitter { x: 3.0, y: 4.0, power_dbm: 20.0, frequency_hz: 2.4e9 }],
            obstacles: vec![Obstacle::Circle { cx: 6.0, cy: 4.0, radius: 0.5, attenuation_db: 5.0 }],
            mark_obstacles: true,
            marker_dbm: MARKER_DBM,
        };
        let grid = scene.signal_map().unwrap();

        for x in 0..10 {
            assert_eq!(grid.get(0, x), Some(MARKER_DBM));
            assert_eq!(grid.get(1, x), Some(MARKER_DBM));
            assert_eq!(grid.get(6, x), Some(MARKER_DBM));
            assert_eq!(grid.get(7, x), Some(MARKER_DBM));
        }
        for y in 0..8 {
            assert_eq!(grid.get(y, 0), Some(MARKER_DBM));
            assert_eq!(grid.get(y, 9), Some(MARKER_DBM));
        }
        assert_eq!(grid.get(4, 6), Some(MARKER_DBM));
        assert_eq!(grid.get(4, 4), Some(scene.power_at(4.0, 4.0)));
        assert_eq!(grid.cells().iter().filter(|v| **v == MARKER_DBM).count(), 80 - 24 + 1);
    }
}
