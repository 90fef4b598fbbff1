// src/types.rs

use serde::Serialize;

/// Raw frame handed to appearance-based trackers. The occupancy core never
/// touches pixel data; this exists only so tracker variants that extract
/// appearance features have something to read.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp: f64,
}

/// One person detection from the upstream model, in image pixels.
/// Ephemeral — consumed within a single frame.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub bbox: [f32; 4], // [x1, y1, x2, y2]
    pub confidence: f32,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            bbox: [x1, y1, x2, y2],
            confidence,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) * 0.5,
            (self.bbox[1] + self.bbox[3]) * 0.5,
        )
    }

    pub fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    /// Geometric validity only; area/confidence minimums are applied by the
    /// pipeline filter against the configured thresholds.
    pub fn has_valid_geometry(&self) -> bool {
        self.bbox[2] > self.bbox[0] && self.bbox[3] > self.bbox[1]
    }
}

/// A tracked person. Ids are monotonically assigned and never reused.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: u64,
    pub bbox: [f32; 4],
    /// Pixel-space centroid of the current bbox.
    pub centroid: (f32, f32),
    /// Ground-plane position in meters, filled by the pipeline from the
    /// projected bbox polygon. None when projection failed this frame.
    pub ground_position: Option<[f64; 2]>,
    pub confidence: f32,
    /// Frames since the last matched detection.
    pub age: u32,
    /// Consecutive matched frames.
    pub hits: u32,
    pub confirmed: bool,
}

impl Track {
    pub(crate) fn new(id: u64, det: &Detection) -> Self {
        Self {
            id,
            bbox: det.bbox,
            centroid: det.center(),
            ground_position: None,
            confidence: det.confidence,
            age: 0,
            hits: 1,
            confirmed: false,
        }
    }
}

/// Alert lifecycle edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertKind {
    Raised,
    Cleared,
}

/// Overcapacity alert edge for one grid cell. Emitted by the grid,
/// consumed by an `AlertSink`; never stored by the core.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub row: usize,
    pub col: usize,
    pub ema: f32,
    pub capacity: u32,
    pub kind: AlertKind,
    /// Seconds of accumulated frame time since the grid was built.
    pub timestamp: f64,
}
