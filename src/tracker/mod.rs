// src/tracker/mod.rs
//
// Frame-to-frame identity tracking. Variants are polymorphic over one
// capability: feed detections, get the current track set back. The
// occupancy layer only consumes the output type — it never cares which
// variant produced it.

mod centroid;
mod iou;

pub use centroid::CentroidTracker;
pub use iou::IouTracker;

use crate::config::{TrackerConfig, TrackerKind};
use crate::types::{Detection, Frame, Track};

pub trait Tracker {
    /// Process one frame of (pre-filtered) detections and return the
    /// current tracks. `frame` is available for appearance-based variants;
    /// the geometric variants ignore it.
    fn update(&mut self, detections: &[Detection], frame: Option<&Frame>) -> &[Track];

    /// Drop all tracks. Id allocation is NOT reset — ids stay unique for
    /// the lifetime of the tracker.
    fn reset(&mut self);
}

/// Select the tracker implementation from configuration.
pub fn build_tracker(config: &TrackerConfig) -> Box<dyn Tracker> {
    match config.kind {
        TrackerKind::Centroid => Box::new(CentroidTracker::new(config.clone())),
        TrackerKind::Iou => Box::new(IouTracker::new(config.clone())),
    }
}
