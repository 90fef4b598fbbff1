// src/occupancy.rs
//
// Ground-plane occupancy grid with debounced overcapacity alerting.
// Each track's bbox is projected to a ground polygon and distributed
// fractionally over the cells it overlaps; per-cell counts are EMA
// smoothed and fed through a hysteresis timer so that transient
// overcounts (someone brushing a cell boundary) never trigger alerts.

use tracing::{debug, info, warn};

use crate::config::{AlertConfig, GridConfig};
use crate::geometry::{CellRect, GeometryBackend, GroundPolygon, SutherlandHodgman};
use crate::transform::CoordinateTransform;
use crate::types::{AlertEvent, AlertKind, Track};

/// EMA values below this flush to exactly zero, so a fully-drained cell
/// can satisfy a clear threshold of 0 (capacity-0 cells) despite the
/// geometric decay never reaching zero on its own.
const EMA_FLUSH_EPSILON: f32 = 1e-6;

/// Nominal per-cell contribution when the clipper returns garbage for a
/// pathological polygon; undercounting silently would be worse.
const FALLBACK_CONTRIBUTION: f32 = 0.1;

/// Receives alert edges. Delivery (webhooks, email, dashboards) is the
/// embedder's concern; the core only defines the boundary.
pub trait AlertSink {
    fn handle(&mut self, event: &AlertEvent);
}

/// Sink that writes alert edges to the log.
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn handle(&mut self, event: &AlertEvent) {
        match event.kind {
            AlertKind::Raised => warn!(
                "🚨 OVERCAPACITY cell ({},{}) occupancy {:.2}/{} at t={:.1}s",
                event.row, event.col, event.ema, event.capacity, event.timestamp
            ),
            AlertKind::Cleared => info!(
                "Alert cleared for cell ({},{}) at t={:.1}s",
                event.row, event.col, event.timestamp
            ),
        }
    }
}

pub struct OccupancyGrid {
    grid: GridConfig,
    alerts: AlertConfig,
    transform: CoordinateTransform,
    backend: Box<dyn GeometryBackend>,
    ground_width: f64,
    ground_height: f64,
    rows: usize,
    cols: usize,
    cell_capacity: u32,
    // Dense row-major cell state, owned exclusively by the grid.
    ema: Vec<f32>,
    timers: Vec<f32>,
    alerted: Vec<bool>,
    /// Seconds of accumulated dt; stamps emitted events.
    clock: f64,
}

impl OccupancyGrid {
    pub fn new(
        grid: GridConfig,
        alerts: AlertConfig,
        transform: CoordinateTransform,
        ground_width: f64,
        ground_height: f64,
    ) -> Self {
        Self::with_backend(
            grid,
            alerts,
            transform,
            ground_width,
            ground_height,
            Box::new(SutherlandHodgman),
        )
    }

    pub fn with_backend(
        grid: GridConfig,
        alerts: AlertConfig,
        transform: CoordinateTransform,
        ground_width: f64,
        ground_height: f64,
        backend: Box<dyn GeometryBackend>,
    ) -> Self {
        let (rows, cols, cell_capacity) = dimensions(&grid, ground_width, ground_height);
        info!(
            "Grid initialized: {}x{} cells, capacity {} per cell",
            rows, cols, cell_capacity
        );
        Self {
            grid,
            alerts,
            transform,
            backend,
            ground_width,
            ground_height,
            rows,
            cols,
            cell_capacity,
            ema: vec![0.0; rows * cols],
            timers: vec![0.0; rows * cols],
            alerted: vec![false; rows * cols],
            clock: 0.0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_capacity(&self) -> u32 {
        self.cell_capacity
    }

    /// Calibrated ground area in meters, (width, height).
    pub fn ground_size(&self) -> (f64, f64) {
        (self.ground_width, self.ground_height)
    }

    /// Smoothed per-cell counts, row-major.
    pub fn ema_counts(&self) -> &[f32] {
        &self.ema
    }

    /// Per-cell alert flags, row-major.
    pub fn alerted(&self) -> &[bool] {
        &self.alerted
    }

    pub fn ema_at(&self, row: usize, col: usize) -> f32 {
        self.ema[self.idx(row, col)]
    }

    pub fn is_alerted(&self, row: usize, col: usize) -> bool {
        self.alerted[self.idx(row, col)]
    }

    fn idx(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Advance the grid by one frame. `dt` is the caller-measured seconds
    /// since the previous update and must be non-negative.
    pub fn update(&mut self, tracks: &[Track], dt: f64) -> Vec<AlertEvent> {
        self.clock += dt;

        let raw = self.rasterize(tracks);

        let alpha = self.alerts.ema_alpha;
        for (e, r) in self.ema.iter_mut().zip(raw.iter()) {
            *e = alpha * r + (1.0 - alpha) * *e;
            if *e < EMA_FLUSH_EPSILON {
                *e = 0.0;
            }
        }

        self.step_alerts(dt as f32)
    }

    /// Distribute each track's projected ground polygon fractionally over
    /// the cells it overlaps. One polygon wholly inside the grid
    /// contributes ~1.0 in total, since cell intersections partition it.
    fn rasterize(&self, tracks: &[Track]) -> Vec<f32> {
        let mut raw = vec![0.0f32; self.rows * self.cols];

        for track in tracks {
            let polygon = match self.transform.project_box_to_ground(track.bbox) {
                Ok(p) => p,
                Err(err) => {
                    debug!("Skipping track T{}: {}", track.id, err);
                    continue;
                }
            };
            let polygon_area = self.backend.area(&polygon);
            if polygon_area <= crate::transform::MIN_POLYGON_AREA {
                continue;
            }

            let (min_x, min_y, max_x, max_y) = polygon.bounds();
            let min_col = ((min_x / self.grid.cell_width).floor() as i64).max(0);
            let max_col =
                ((max_x / self.grid.cell_width).floor() as i64).min(self.cols as i64 - 1);
            let min_row = ((min_y / self.grid.cell_height).floor() as i64).max(0);
            let max_row =
                ((max_y / self.grid.cell_height).floor() as i64).min(self.rows as i64 - 1);
            if min_col > max_col || min_row > max_row {
                continue; // entirely outside the grid
            }

            for row in min_row..=max_row {
                for col in min_col..=max_col {
                    let rect = CellRect {
                        min_x: col as f64 * self.grid.cell_width,
                        min_y: row as f64 * self.grid.cell_height,
                        max_x: (col + 1) as f64 * self.grid.cell_width,
                        max_y: (row + 1) as f64 * self.grid.cell_height,
                    };
                    let idx = row as usize * self.cols + col as usize;
                    let inter = self.backend.intersection_area(&polygon, rect);
                    if !inter.is_finite() {
                        raw[idx] += FALLBACK_CONTRIBUTION;
                    } else if inter > 0.0 {
                        raw[idx] += ((inter / polygon_area) as f32).clamp(0.0, 1.0);
                    }
                }
            }
        }

        raw
    }

    /// Per-cell alert state machine. Timer accumulates while over
    /// capacity and decays symmetrically below it, so single-frame dips
    /// do not reset progress (and do not flicker a raised alert).
    fn step_alerts(&mut self, dt: f32) -> Vec<AlertEvent> {
        let mut events = Vec::new();
        let capacity = self.cell_capacity as f32;
        let clear_threshold = (capacity - self.alerts.alert_clear_offset).max(0.0);

        for row in 0..self.rows {
            for col in 0..self.cols {
                let idx = row * self.cols + col;

                if self.ema[idx] > capacity {
                    self.timers[idx] += dt;
                } else {
                    self.timers[idx] = (self.timers[idx] - dt).max(0.0);
                }

                // A raise needs the cell to be over capacity right now, not
                // just a charged timer left over from an earlier episode.
                if self.ema[idx] > capacity
                    && self.timers[idx] >= self.alerts.hysteresis_time
                    && !self.alerted[idx]
                {
                    self.alerted[idx] = true;
                    events.push(AlertEvent {
                        row,
                        col,
                        ema: self.ema[idx],
                        capacity: self.cell_capacity,
                        kind: AlertKind::Raised,
                        timestamp: self.clock,
                    });
                }

                if self.alerted[idx] && self.ema[idx] <= clear_threshold {
                    self.alerted[idx] = false;
                    events.push(AlertEvent {
                        row,
                        col,
                        ema: self.ema[idx],
                        capacity: self.cell_capacity,
                        kind: AlertKind::Cleared,
                        timestamp: self.clock,
                    });
                }
            }
        }

        events
    }

    /// Ground-plane position of a track: centroid of its projected bbox
    /// polygon. None when the projection fails.
    pub fn ground_position(&self, track: &Track) -> Option<[f64; 2]> {
        let polygon = self.transform.project_box_to_ground(track.bbox).ok()?;
        self.backend.centroid(&polygon)
    }

    /// Cell under the track's ground centroid, or None outside the grid.
    pub fn get_cell_for_track(&self, track: &Track) -> Option<(usize, usize)> {
        let [x, y] = self.ground_position(track)?;
        let col = (x / self.grid.cell_width).floor();
        let row = (y / self.grid.cell_height).floor();
        if row >= 0.0 && col >= 0.0 && (row as usize) < self.rows && (col as usize) < self.cols {
            Some((row as usize, col as usize))
        } else {
            None
        }
    }

    /// Rebuild the grid for new ground dimensions, discarding all smoothed
    /// state. Remapping EMA history across a different cell partition is
    /// ill-defined, so none is attempted.
    pub fn reinitialize(&mut self, ground_width: f64, ground_height: f64) {
        self.ground_width = ground_width;
        self.ground_height = ground_height;
        let (rows, cols, cell_capacity) = dimensions(&self.grid, ground_width, ground_height);
        self.rows = rows;
        self.cols = cols;
        self.cell_capacity = cell_capacity;
        self.ema = vec![0.0; rows * cols];
        self.timers = vec![0.0; rows * cols];
        self.alerted = vec![false; rows * cols];
        self.clock = 0.0;
        info!("Grid reinitialized: {}x{} cells", rows, cols);
    }
}

fn dimensions(grid: &GridConfig, ground_width: f64, ground_height: f64) -> (usize, usize, u32) {
    let cols = (ground_width / grid.cell_width).ceil() as usize;
    let rows = (ground_height / grid.cell_height).ceil() as usize;
    let person_area = std::f64::consts::PI * grid.person_radius * grid.person_radius;
    let cell_area = grid.cell_width * grid.cell_height;
    let cell_capacity = (cell_area / person_area).floor() as u32;
    (rows, cols, cell_capacity)
}
