// src/tracker/iou.rs
//
// Overlap-based tracker variant. Matches detections to tracks by greedy
// best-IoU pairing instead of centroid distance, which holds identity
// better when people stand close together and their centroids interleave.
// Same output contract as the centroid variant: monotonic ids, age
// semantics, pruning past max_age.

use tracing::debug;

use crate::config::TrackerConfig;
use crate::types::{Detection, Frame, Track};

use super::Tracker;

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter <= 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

pub struct IouTracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl IouTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::with_capacity(32),
            next_id: 1,
        }
    }
}

impl Tracker for IouTracker {
    fn update(&mut self, detections: &[Detection], _frame: Option<&Frame>) -> &[Track] {
        if detections.is_empty() {
            for track in &mut self.tracks {
                track.age += 1;
                track.hits = 0;
            }
            return &self.tracks;
        }

        let valid: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.has_valid_geometry())
            .collect();

        // Score all pairs above the floor, best overlap first. Ties fall
        // back to ascending track id via the stable sort.
        let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (di, det) in valid.iter().enumerate() {
                let score = iou(&track.bbox, &det.bbox);
                if score >= self.config.min_iou {
                    pairs.push((ti, di, score));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut track_matched = vec![false; self.tracks.len()];
        let mut det_matched = vec![false; valid.len()];

        for (ti, di, _score) in &pairs {
            if track_matched[*ti] || det_matched[*di] {
                continue;
            }
            track_matched[*ti] = true;
            det_matched[*di] = true;

            let det = valid[*di];
            let track = &mut self.tracks[*ti];
            track.bbox = det.bbox;
            track.centroid = det.center();
            track.confidence = det.confidence;
            track.ground_position = None;
            track.age = 0;
            track.hits += 1;
            if track.hits >= self.config.min_hits {
                track.confirmed = true;
            }
        }

        for (ti, matched) in track_matched.iter().enumerate() {
            if !matched {
                self.tracks[ti].age += 1;
                self.tracks[ti].hits = 0;
            }
        }

        for (di, matched) in det_matched.iter().enumerate() {
            if !matched {
                let mut track = Track::new(self.next_id, valid[di]);
                track.confirmed = track.hits >= self.config.min_hits;
                debug!("🆕 New track T{} (iou variant)", track.id);
                self.next_id += 1;
                self.tracks.push(track);
            }
        }

        let max_age = self.config.max_age;
        self.tracks.retain(|t| t.age <= max_age);

        &self.tracks
    }

    fn reset(&mut self) {
        self.tracks.clear();
    }
}
