// src/config.rs
//
// Immutable configuration, supplied at construction time. No ambient
// globals — each component receives the sub-struct it needs.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
}

impl MonitorConfig {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: MonitorConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

/// Ground-plane grid geometry, in meters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub cell_width: f64,
    pub cell_height: f64,
    /// Footprint radius of one person; cell capacity is
    /// floor(cell_area / (pi * person_radius^2)).
    pub person_radius: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_width: 1.0,
            cell_height: 1.0,
            person_radius: 2.0,
        }
    }
}

/// Which tracker variant the pipeline builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    Centroid,
    Iou,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub kind: TrackerKind,
    /// Frames a track survives without a matching detection.
    pub max_age: u32,
    /// Maximum centroid distance in pixels for a match (strict less-than).
    pub distance_threshold: f32,
    /// Consecutive hits before a track reports `confirmed`.
    pub min_hits: u32,
    /// Minimum IoU for the iou tracker variant.
    pub min_iou: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            kind: TrackerKind::Centroid,
            max_age: 80,
            distance_threshold: 80.0,
            min_hits: 1,
            min_iou: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// EMA blend factor; higher is more responsive, lower is smoother.
    pub ema_alpha: f32,
    /// Seconds a cell must stay over capacity before an alert fires.
    pub hysteresis_time: f32,
    /// Alert clears once ema drops to capacity minus this offset.
    pub alert_clear_offset: f32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.4,
            hysteresis_time: 3.0,
            alert_clear_offset: 0.5,
        }
    }
}

/// Filters applied to raw detections before they reach the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    /// Minimum bbox area in square pixels.
    pub min_bbox_area: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.35,
            min_bbox_area: 1500.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.grid.cell_width, 1.0);
        assert_eq!(cfg.tracker.max_age, 80);
        assert_eq!(cfg.tracker.distance_threshold, 80.0);
        assert_eq!(cfg.alerts.ema_alpha, 0.4);
        assert_eq!(cfg.alerts.hysteresis_time, 3.0);
        assert_eq!(cfg.alerts.alert_clear_offset, 0.5);
        assert_eq!(cfg.detection.min_bbox_area, 1500.0);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
grid:
  cell_width: 2.0
  cell_height: 2.0
  person_radius: 0.3
tracker:
  kind: iou
  max_age: 30
  distance_threshold: 60.0
  min_hits: 3
  min_iou: 0.2
"#;
        let cfg: MonitorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.grid.cell_width, 2.0);
        assert_eq!(cfg.tracker.kind, TrackerKind::Iou);
        // untouched sections fall back to defaults
        assert_eq!(cfg.alerts.hysteresis_time, 3.0);
        assert_eq!(cfg.detection.confidence_threshold, 0.35);
    }
}
