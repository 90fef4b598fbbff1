// src/tracker/centroid.rs
//
// Greedy nearest-centroid tracker. O(tracks x detections) per frame,
// which is plenty for crowd scenes with a few dozen people — a deliberate
// trade-off against optimal bipartite (Hungarian) assignment. Ties and
// contention resolve by ascending track id: the first track to claim a
// detection keeps it.

use tracing::debug;

use crate::config::TrackerConfig;
use crate::types::{Detection, Frame, Track};

use super::Tracker;

pub struct CentroidTracker {
    config: TrackerConfig,
    /// Kept in ascending-id order: ids are allocated monotonically and
    /// removals preserve order, so a plain Vec gives deterministic
    /// iteration without a map.
    tracks: Vec<Track>,
    next_id: u64,
}

impl CentroidTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::with_capacity(32),
            next_id: 1,
        }
    }

    fn age_all(&mut self) {
        for track in &mut self.tracks {
            track.age += 1;
            track.hits = 0;
        }
    }

    fn spawn_track(&mut self, det: &Detection) {
        let mut track = Track::new(self.next_id, det);
        track.confirmed = track.hits >= self.config.min_hits;
        debug!(
            "🆕 New track T{}: bbox=[{:.0},{:.0},{:.0},{:.0}] conf={:.2}",
            track.id, track.bbox[0], track.bbox[1], track.bbox[2], track.bbox[3], track.confidence
        );
        self.next_id += 1;
        self.tracks.push(track);
    }

    fn prune_expired(&mut self) {
        let max_age = self.config.max_age;
        self.tracks.retain(|t| {
            if t.age > max_age {
                debug!("🗑️ Track T{} expired (age {})", t.id, t.age);
                false
            } else {
                true
            }
        });
    }
}

impl Tracker for CentroidTracker {
    fn update(&mut self, detections: &[Detection], _frame: Option<&Frame>) -> &[Track] {
        // Detection gaps are normal (the model typically runs every Nth
        // frame): age everything and keep going, no matching, no pruning.
        if detections.is_empty() {
            self.age_all();
            return &self.tracks;
        }

        let centroids: Vec<(f32, f32)> = detections
            .iter()
            .filter(|d| d.has_valid_geometry())
            .map(|d| d.center())
            .collect();
        let valid: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.has_valid_geometry())
            .collect();

        let mut claimed = vec![false; valid.len()];

        // Greedy pass over tracks in ascending-id order.
        for track in &mut self.tracks {
            let mut best: Option<usize> = None;
            let mut best_dist = f32::INFINITY;

            for (i, &(cx, cy)) in centroids.iter().enumerate() {
                if claimed[i] {
                    continue;
                }
                let dist = ((track.centroid.0 - cx).powi(2) + (track.centroid.1 - cy).powi(2))
                    .sqrt();
                // Strictly below the threshold; a detection at exactly the
                // threshold distance does not match.
                if dist < best_dist && dist < self.config.distance_threshold {
                    best_dist = dist;
                    best = Some(i);
                }
            }

            if let Some(i) = best {
                claimed[i] = true;
                let det = valid[i];
                track.bbox = det.bbox;
                track.centroid = det.center();
                track.confidence = det.confidence;
                track.ground_position = None; // refreshed by the pipeline
                track.age = 0;
                track.hits += 1;
                if track.hits >= self.config.min_hits {
                    track.confirmed = true;
                }
            } else {
                track.age += 1;
                track.hits = 0;
            }
        }

        // Unclaimed detections become new tracks.
        for (i, &det) in valid.iter().enumerate() {
            if !claimed[i] {
                self.spawn_track(det);
            }
        }

        self.prune_expired();
        &self.tracks
    }

    fn reset(&mut self) {
        self.tracks.clear();
    }
}
