// src/lib.rs
//
// Spatial analytics engine for camera-based crowd occupancy monitoring.
//
// Per frame: detections -> tracker -> projected ground polygons ->
// occupancy grid -> debounced overcapacity alerts. Detection inference,
// video capture, rendering, and alert delivery all live outside this
// crate; the engine starts at bounding boxes and ends at `AlertEvent`s.

pub mod calibration;
pub mod config;
pub mod geometry;
pub mod occupancy;
pub mod pipeline;
pub mod tracker;
pub mod transform;
pub mod types;

pub use calibration::{CalibrationError, CalibrationResult, Calibrator};
pub use config::{MonitorConfig, TrackerKind};
pub use occupancy::{AlertSink, LogAlertSink, OccupancyGrid};
pub use pipeline::{FrameOutput, MonitorPipeline};
pub use tracker::{build_tracker, Tracker};
pub use transform::{CoordinateTransform, ProjectionError};
pub use types::{AlertEvent, AlertKind, Detection, Frame, Track};
