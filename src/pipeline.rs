// src/pipeline.rs
//
// Per-frame orchestration: filter raw detections, advance the tracker,
// then the grid, strictly in that order. Single-threaded and synchronous;
// independent camera pipelines share nothing and can run on separate
// threads without synchronization.

use tracing::debug;

use crate::calibration::CalibrationResult;
use crate::config::MonitorConfig;
use crate::occupancy::{AlertSink, OccupancyGrid};
use crate::tracker::{build_tracker, Tracker};
use crate::types::{AlertEvent, Detection, Frame, Track};

/// Everything one frame produces for downstream consumers.
#[derive(Debug)]
pub struct FrameOutput {
    pub tracks: Vec<Track>,
    pub events: Vec<AlertEvent>,
}

pub struct MonitorPipeline {
    config: MonitorConfig,
    tracker: Box<dyn Tracker>,
    grid: OccupancyGrid,
    sink: Option<Box<dyn AlertSink>>,
}

impl MonitorPipeline {
    /// A pipeline can only exist for a completed calibration — an invalid
    /// calibration fails earlier and no grid is ever built.
    pub fn new(config: MonitorConfig, calibration: &CalibrationResult) -> Self {
        let tracker = build_tracker(&config.tracker);
        let grid = OccupancyGrid::new(
            config.grid.clone(),
            config.alerts.clone(),
            calibration.transform.clone(),
            calibration.ground_width,
            calibration.ground_height,
        );
        Self {
            config,
            tracker,
            grid,
            sink: None,
        }
    }

    /// Attach an alert sink; events are still returned either way.
    pub fn with_sink(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Process one frame. `detections` may be empty (the model typically
    /// runs every Nth frame); `dt` is the measured seconds since the
    /// previous frame.
    pub fn process_frame(
        &mut self,
        detections: &[Detection],
        frame: Option<&Frame>,
        dt: f64,
    ) -> FrameOutput {
        let filtered = self.filter_detections(detections);
        let mut tracks = self.tracker.update(&filtered, frame).to_vec();

        let events = self.grid.update(&tracks, dt);

        // Ground positions come from projection, not pixel centroids;
        // tracks whose projection fails this frame stay None.
        for track in &mut tracks {
            track.ground_position = self.grid.ground_position(track);
        }

        if let Some(sink) = &mut self.sink {
            for event in &events {
                sink.handle(event);
            }
        }

        FrameOutput { tracks, events }
    }

    /// Drop invalid detections before they reach the tracker: inverted or
    /// empty boxes, sub-minimum areas, sub-threshold confidences.
    fn filter_detections(&self, detections: &[Detection]) -> Vec<Detection> {
        let cfg = &self.config.detection;
        let mut kept = Vec::with_capacity(detections.len());
        for det in detections {
            if !det.has_valid_geometry()
                || det.area() < cfg.min_bbox_area
                || det.confidence < cfg.confidence_threshold
            {
                debug!(
                    "Dropping detection: area={:.0} conf={:.2}",
                    det.area(),
                    det.confidence
                );
                continue;
            }
            kept.push(*det);
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Calibrator;
    use crate::types::AlertKind;
    use approx::assert_relative_eq;

    fn calibration_10m() -> CalibrationResult {
        Calibrator::calibrate(
            [[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]],
            10.0,
            10.0,
        )
        .unwrap()
    }

    fn test_config() -> MonitorConfig {
        let mut cfg = MonitorConfig::default();
        cfg.grid.cell_width = 2.0;
        cfg.grid.cell_height = 2.0;
        cfg.grid.person_radius = 2.0; // footprint > cell -> capacity 0
        cfg.detection.min_bbox_area = 50.0;
        cfg
    }

    #[test]
    fn test_detection_filters() {
        let pipeline = MonitorPipeline::new(test_config(), &calibration_10m());

        let dets = [
            Detection::new(45.0, 45.0, 55.0, 55.0, 0.9), // valid
            Detection::new(55.0, 45.0, 45.0, 55.0, 0.9), // inverted
            Detection::new(45.0, 45.0, 47.0, 47.0, 0.9), // too small
            Detection::new(45.0, 45.0, 55.0, 55.0, 0.1), // low confidence
        ];
        let kept = pipeline.filter_detections(&dets);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_ground_positions_filled_from_projection() {
        let mut pipeline = MonitorPipeline::new(test_config(), &calibration_10m());
        let dets = [Detection::new(40.0, 40.0, 60.0, 60.0, 0.9)];
        let out = pipeline.process_frame(&dets, None, 1.0 / 15.0);
        assert_eq!(out.tracks.len(), 1);
        let pos = out.tracks[0].ground_position.unwrap();
        assert_relative_eq!(pos[0], 5.0, epsilon = 1e-6);
        assert_relative_eq!(pos[1], 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_end_to_end_alert_and_clear() {
        // The full scenario: calibrate a 100px square to 10m x 10m, put one
        // person in cell (2,2) of a 5x5 grid with capacity 0, hold for
        // hysteresis_time, then walk away and wait for the decay.
        let mut pipeline = MonitorPipeline::new(test_config(), &calibration_10m());
        assert_eq!(pipeline.grid().rows(), 5);
        assert_eq!(pipeline.grid().cell_capacity(), 0);

        // bbox projecting inside cell (2,2) only
        let dets = [Detection::new(45.0, 45.0, 55.0, 55.0, 0.9)];
        let mut raised = Vec::new();
        for _ in 0..4 {
            let out = pipeline.process_frame(&dets, None, 1.0);
            raised.extend(out.events);
        }
        assert_eq!(raised.len(), 1, "exactly one raise for a sustained overcount");
        assert_eq!(raised[0].kind, AlertKind::Raised);
        assert_eq!((raised[0].row, raised[0].col), (2, 2));
        assert_relative_eq!(raised[0].timestamp, 3.0, epsilon = 1e-9);
        let out = pipeline.process_frame(&dets, None, 1.0);
        assert!(out.events.is_empty(), "no re-raise while alerted");
        assert_eq!(
            pipeline.grid().get_cell_for_track(&out.tracks[0]),
            Some((2, 2))
        );

        // Detections stop; the EMA decays, flushes to zero, and the alert
        // clears exactly once.
        let mut cleared = Vec::new();
        for _ in 0..60 {
            let out = pipeline.process_frame(&[], None, 1.0);
            cleared.extend(out.events);
        }
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].kind, AlertKind::Cleared);
        assert_eq!((cleared[0].row, cleared[0].col), (2, 2));
        assert!(!pipeline.grid().is_alerted(2, 2));
    }

    #[test]
    fn test_events_forwarded_to_sink() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct RecordingSink(Rc<RefCell<Vec<AlertKind>>>);
        impl AlertSink for RecordingSink {
            fn handle(&mut self, event: &AlertEvent) {
                self.0.borrow_mut().push(event.kind);
            }
        }

        let record = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = MonitorPipeline::new(test_config(), &calibration_10m())
            .with_sink(Box::new(RecordingSink(record.clone())));

        let dets = [Detection::new(45.0, 45.0, 55.0, 55.0, 0.9)];
        for _ in 0..4 {
            pipeline.process_frame(&dets, None, 1.0);
        }
        assert_eq!(record.borrow().as_slice(), &[AlertKind::Raised]);
    }
}
