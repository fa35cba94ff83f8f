// src/tracking/light_tracker.rs
//
// Stateful per-video tracker for the named PAPI units. One instance is owned
// by one processing session and must observe frames in increasing order,
// because every prediction leans on the previous frame's history.
//
// Track life cycle per light:
//   Seeded    - has a manual or auto-detected start, no match yet
//   Tracked   - matched a detection this frame
//   Predicted - no match; position extrapolated (own velocity for short
//               gaps, frozen + global motion for long ones)
//   Lost      - gap exceeded the configured maximum; the pixel history is
//               frozen and only an explicit re-seed revives the track

use super::global_motion::GlobalMotionEstimator;
use super::scoring::{MatchContext, MatchScorer, WeightedScorer};
use crate::detection::DetectedLight;
use crate::types::{SeedPosition, TrackingConfig};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Confidence floor for lost tracks.
const LOST_CONFIDENCE: f32 = 0.05;
/// Per-frame confidence decay while predicting.
const PREDICT_DECAY: f32 = 0.85;
/// History entries kept per track (about a minute at 30 fps).
const MAX_HISTORY: usize = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Seeded,
    Tracked,
    Predicted,
    Lost,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Seeded => "SEEDED",
            TrackStatus::Tracked => "TRACKED",
            TrackStatus::Predicted => "PREDICTED",
            TrackStatus::Lost => "LOST",
        }
    }
}

/// One history entry. `confirmed` marks real detection matches as opposed to
/// extrapolated placeholders.
#[derive(Debug, Clone, Copy)]
pub struct LightObservation {
    pub frame_index: u64,
    pub cx: f32,
    pub cy: f32,
    pub rgb: [f32; 3],
    pub size: f32,
    pub confidence: f32,
    pub confirmed: bool,
}

/// Per-frame snapshot of one track, the tracker's output unit.
#[derive(Debug, Clone, Copy)]
pub struct LightState {
    pub cx: f32,
    pub cy: f32,
    pub size: f32,
    pub rgb: [f32; 3],
    pub intensity: f32,
    pub area_px: f32,
    pub confidence: f32,
    pub status: TrackStatus,
}

#[derive(Debug)]
struct TrackedLight {
    status: TrackStatus,
    cx: f32,
    cy: f32,
    size: f32,
    rgb: [f32; 3],
    intensity: f32,
    area_px: f32,
    confidence: f32,
    gap: u32,
    history: Vec<LightObservation>,
}

impl TrackedLight {
    fn new(cx: f32, cy: f32, size: f32, confidence: f32) -> Self {
        Self {
            status: TrackStatus::Seeded,
            cx,
            cy,
            size,
            rgb: [0.0, 0.0, 0.0],
            intensity: 0.0,
            area_px: 0.0,
            confidence,
            gap: 0,
            history: Vec::new(),
        }
    }

    /// Per-frame velocity over the most recent confirmed observations.
    fn velocity(&self, window: usize) -> (f32, f32) {
        let confirmed: Vec<&LightObservation> = self
            .history
            .iter()
            .rev()
            .filter(|o| o.confirmed)
            .take(window.max(2))
            .collect();
        if confirmed.len() < 2 {
            return (0.0, 0.0);
        }
        let newest = confirmed[0];
        let oldest = confirmed[confirmed.len() - 1];
        let frames = (newest.frame_index - oldest.frame_index) as f32;
        if frames < 1.0 {
            return (0.0, 0.0);
        }
        (
            (newest.cx - oldest.cx) / frames,
            (newest.cy - oldest.cy) / frames,
        )
    }

    /// Mean intensity over recent confirmed observations, for brightness
    /// continuity scoring.
    fn recent_intensity(&self) -> f32 {
        let recent: Vec<f32> = self
            .history
            .iter()
            .rev()
            .filter(|o| o.confirmed)
            .take(5)
            .map(|o| 0.299 * o.rgb[0] + 0.587 * o.rgb[1] + 0.114 * o.rgb[2])
            .collect();
        if recent.is_empty() {
            return self.intensity;
        }
        recent.iter().sum::<f32>() / recent.len() as f32
    }

    fn push(&mut self, obs: LightObservation) {
        self.history.push(obs);
        if self.history.len() > MAX_HISTORY {
            self.history.remove(0);
        }
    }

    fn snapshot(&self) -> LightState {
        LightState {
            cx: self.cx,
            cy: self.cy,
            size: self.size,
            rgb: self.rgb,
            intensity: self.intensity,
            area_px: self.area_px,
            confidence: self.confidence,
            status: self.status,
        }
    }
}

pub struct LightTracker {
    cfg: TrackingConfig,
    frame_w: usize,
    frame_h: usize,
    frame_diagonal: f32,
    tracks: BTreeMap<String, TrackedLight>,
    global: GlobalMotionEstimator,
    scorer: Box<dyn MatchScorer>,
    last_frame: Option<u64>,
}

impl LightTracker {
    pub fn new(cfg: TrackingConfig, frame_w: usize, frame_h: usize) -> Self {
        Self::with_scorer(cfg, frame_w, frame_h, Box::new(WeightedScorer::default()))
    }

    pub fn with_scorer(
        cfg: TrackingConfig,
        frame_w: usize,
        frame_h: usize,
        scorer: Box<dyn MatchScorer>,
    ) -> Self {
        let (w, h) = (frame_w as f32, frame_h as f32);
        Self {
            cfg,
            frame_w,
            frame_h,
            frame_diagonal: (w * w + h * h).sqrt(),
            tracks: BTreeMap::new(),
            global: GlobalMotionEstimator::new(frame_w, frame_h),
            scorer,
            last_frame: None,
        }
    }

    /// Seed (or explicitly re-seed) a named light from an operator-confirmed
    /// or auto-detected percentage position.
    pub fn seed(&mut self, name: &str, seed: &SeedPosition) {
        let (cx, cy, w, h) = seed.to_pixels(self.frame_w, self.frame_h);
        self.seed_pixels(name, cx, cy, w.max(h), seed.confidence.unwrap_or(0.5));
    }

    pub fn seed_pixels(&mut self, name: &str, cx: f32, cy: f32, size: f32, confidence: f32) {
        debug!("Seeding track {} at ({:.1}, {:.1})", name, cx, cy);
        self.tracks
            .insert(name.to_string(), TrackedLight::new(cx, cy, size, confidence));
    }

    pub fn tracked_names(&self) -> Vec<String> {
        self.tracks.keys().cloned().collect()
    }

    #[allow(dead_code)]
    pub fn history(&self, name: &str) -> Option<&[LightObservation]> {
        self.tracks.get(name).map(|t| t.history.as_slice())
    }

    pub fn status(&self, name: &str) -> Option<TrackStatus> {
        self.tracks.get(name).map(|t| t.status)
    }

    /// Advance every track by one frame. `frame_index` must be strictly
    /// increasing across calls; a stale index is ignored with a warning so a
    /// single bad frame cannot corrupt the series.
    pub fn update(
        &mut self,
        frame_index: u64,
        detections: &[DetectedLight],
    ) -> HashMap<String, LightState> {
        if let Some(last) = self.last_frame {
            if frame_index <= last {
                warn!(
                    "Tracker update out of order: frame {} after {}; skipping",
                    frame_index, last
                );
                return self.snapshot();
            }
        }
        self.last_frame = Some(frame_index);

        let global = self.global.update(detections);
        let ceiling_px = self.frame_diagonal * self.cfg.match_ceiling_ratio;

        // Predictions per track, in deterministic name order
        let names: Vec<String> = self.tracks.keys().cloned().collect();
        let mut predictions: HashMap<String, (f32, f32)> = HashMap::new();
        for name in &names {
            let track = &self.tracks[name];
            let (vx, vy) = match track.status {
                // Seeded and lost tracks have no velocity worth trusting
                TrackStatus::Seeded | TrackStatus::Lost => (0.0, 0.0),
                _ => track.velocity(self.cfg.velocity_window),
            };
            predictions.insert(
                name.clone(),
                (track.cx + vx + global.dx, track.cy + vy + global.dy),
            );
        }

        // Score all pairings under the distance ceiling, then assign
        // greedily by ascending cost (one detection per track).
        let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
        for (ti, name) in names.iter().enumerate() {
            let track = &self.tracks[name];
            if track.status == TrackStatus::Lost {
                continue;
            }
            let predicted = predictions[name];
            let last_intensity = track.recent_intensity();
            for (di, det) in detections.iter().enumerate() {
                let (dx, dy) = (det.cx - predicted.0, det.cy - predicted.1);
                if (dx * dx + dy * dy).sqrt() > ceiling_px {
                    continue;
                }
                let cost = self.scorer.cost(&MatchContext {
                    predicted,
                    last_known: (track.cx, track.cy),
                    last_intensity,
                    candidate: det,
                    frame_diagonal: self.frame_diagonal,
                });
                pairs.push((ti, di, cost));
            }
        }
        pairs.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut track_taken = vec![false; names.len()];
        let mut det_taken = vec![false; detections.len()];
        let mut matches: HashMap<String, usize> = HashMap::new();
        for (ti, di, _cost) in pairs {
            if track_taken[ti] || det_taken[di] {
                continue;
            }
            track_taken[ti] = true;
            det_taken[di] = true;
            matches.insert(names[ti].clone(), di);
        }

        // Apply matches and misses
        for name in &names {
            let predicted = predictions[name];
            let track = self
                .tracks
                .get_mut(name)
                .unwrap_or_else(|| unreachable!("track names are stable within update"));

            if let Some(&di) = matches.get(name) {
                let det = &detections[di];
                let d_pred = {
                    let (dx, dy) = (det.cx - predicted.0, det.cy - predicted.1);
                    (dx * dx + dy * dy).sqrt()
                };
                track.cx = det.cx;
                track.cy = det.cy;
                track.size = det.size();
                track.rgb = det.mean_rgb;
                track.intensity = det.intensity;
                track.area_px = det.area_px;
                track.gap = 0;
                track.status = TrackStatus::Tracked;
                track.confidence = (1.0 - 0.5 * (d_pred / ceiling_px.max(1.0))).clamp(0.5, 1.0);
                track.push(LightObservation {
                    frame_index,
                    cx: det.cx,
                    cy: det.cy,
                    rgb: det.mean_rgb,
                    size: det.size(),
                    confidence: track.confidence,
                    confirmed: true,
                });
                continue;
            }

            // No detection for this track this frame
            track.gap += 1;

            if track.gap > self.cfg.max_gap_frames {
                if track.status != TrackStatus::Lost {
                    warn!(
                        "Track {} lost after {} missed frame(s)",
                        name, track.gap
                    );
                }
                track.status = TrackStatus::Lost;
                track.confidence = LOST_CONFIDENCE;
                // History freezes; the estimate drifts with global motion
                // only, so the overlay keeps pointing near the unit.
                track.cx += global.dx;
                track.cy += global.dy;
                continue;
            }

            if track.status == TrackStatus::Seeded {
                // Not yet acquired: hold the seed, corrected for camera pan
                track.cx += global.dx;
                track.cy += global.dy;
                track.push(LightObservation {
                    frame_index,
                    cx: track.cx,
                    cy: track.cy,
                    rgb: track.rgb,
                    size: track.size,
                    confidence: track.confidence,
                    confirmed: false,
                });
                continue;
            }

            let (px, py) = if track.gap <= self.cfg.freeze_gap_frames {
                // Short gap: trust the velocity extrapolation
                predicted
            } else {
                // Long gap: freeze own motion, follow the camera only
                (track.cx + global.dx, track.cy + global.dy)
            };
            track.cx = px;
            track.cy = py;
            track.status = TrackStatus::Predicted;
            track.confidence = (track.confidence * PREDICT_DECAY).max(0.1);
            track.push(LightObservation {
                frame_index,
                cx: px,
                cy: py,
                rgb: track.rgb,
                size: track.size,
                confidence: track.confidence,
                confirmed: false,
            });
        }

        self.snapshot()
    }

    fn snapshot(&self) -> HashMap<String, LightState> {
        self.tracks
            .iter()
            .map(|(name, track)| (name.clone(), track.snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::classify::LightClass;

    fn det(cx: f32, cy: f32, intensity: f32) -> DetectedLight {
        DetectedLight {
            cx,
            cy,
            width: 10.0,
            height: 8.0,
            area_px: 80.0,
            mean_rgb: [intensity, intensity * 0.95, intensity * 0.9],
            peak_brightness: 255.0,
            intensity,
            class: LightClass::White,
        }
    }

    fn tracker() -> LightTracker {
        LightTracker::new(TrackingConfig::default(), 1920, 1080)
    }

    #[test]
    fn test_seed_to_tracked_on_first_match() {
        let mut t = tracker();
        t.seed_pixels("PAPI_A", 500.0, 540.0, 12.0, 0.8);
        assert_eq!(t.status("PAPI_A"), Some(TrackStatus::Seeded));

        let states = t.update(0, &[det(502.0, 541.0, 230.0)]);
        assert_eq!(states["PAPI_A"].status, TrackStatus::Tracked);
        assert!((states["PAPI_A"].cx - 502.0).abs() < 1e-6);
    }

    #[test]
    fn test_continuous_detections_never_lose_track() {
        let mut t = tracker();
        t.seed_pixels("PAPI_A", 500.0, 540.0, 12.0, 0.8);
        for frame in 0..200u64 {
            let x = 500.0 + frame as f32 * 0.5;
            let states = t.update(frame, &[det(x, 540.0, 230.0)]);
            assert_ne!(states["PAPI_A"].status, TrackStatus::Lost, "frame {}", frame);
        }
        assert_eq!(t.status("PAPI_A"), Some(TrackStatus::Tracked));
    }

    #[test]
    fn test_short_gap_predicts_along_velocity() {
        let mut t = tracker();
        t.seed_pixels("PAPI_A", 500.0, 540.0, 12.0, 0.8);
        // Build up rightward velocity of 2 px/frame
        for frame in 0..10u64 {
            t.update(frame, &[det(500.0 + frame as f32 * 2.0, 540.0, 230.0)]);
        }
        // Miss one frame: prediction should continue the motion
        let states = t.update(10, &[]);
        let state = &states["PAPI_A"];
        assert_eq!(state.status, TrackStatus::Predicted);
        assert!(
            (state.cx - 520.0).abs() < 1.5,
            "expected extrapolation near 520, got {}",
            state.cx
        );
        assert!(state.confidence < 1.0);
    }

    #[test]
    fn test_gap_beyond_max_goes_lost_and_freezes_history() {
        let cfg = TrackingConfig {
            max_gap_frames: 5,
            ..TrackingConfig::default()
        };
        let mut t = LightTracker::new(cfg, 1920, 1080);
        t.seed_pixels("PAPI_A", 500.0, 540.0, 12.0, 0.8);
        t.update(0, &[det(500.0, 540.0, 230.0)]);

        let mut frame = 1u64;
        for _ in 0..5 {
            t.update(frame, &[]);
            frame += 1;
        }
        assert_eq!(t.status("PAPI_A"), Some(TrackStatus::Predicted));
        let len_before_lost = t.history("PAPI_A").unwrap().len();

        t.update(frame, &[]);
        assert_eq!(t.status("PAPI_A"), Some(TrackStatus::Lost));

        // Further empty frames must not extend the history
        for _ in 0..10 {
            frame += 1;
            let states = t.update(frame, &[]);
            assert_eq!(states["PAPI_A"].status, TrackStatus::Lost);
            assert!((states["PAPI_A"].confidence - LOST_CONFIDENCE).abs() < 1e-6);
        }
        assert_eq!(t.history("PAPI_A").unwrap().len(), len_before_lost);
    }

    #[test]
    fn test_lost_track_requires_reseed() {
        let cfg = TrackingConfig {
            max_gap_frames: 3,
            ..TrackingConfig::default()
        };
        let mut t = LightTracker::new(cfg, 1920, 1080);
        t.seed_pixels("PAPI_A", 500.0, 540.0, 12.0, 0.8);
        t.update(0, &[det(500.0, 540.0, 230.0)]);
        for frame in 1..=4u64 {
            t.update(frame, &[]);
        }
        assert_eq!(t.status("PAPI_A"), Some(TrackStatus::Lost));

        // A matching detection alone does not revive a lost track
        let states = t.update(5, &[det(500.0, 540.0, 230.0)]);
        assert_eq!(states["PAPI_A"].status, TrackStatus::Lost);

        t.seed_pixels("PAPI_A", 500.0, 540.0, 12.0, 0.6);
        let states = t.update(6, &[det(501.0, 540.0, 230.0)]);
        assert_eq!(states["PAPI_A"].status, TrackStatus::Tracked);
    }

    #[test]
    fn test_global_motion_carries_missing_light() {
        let mut t = tracker();
        t.seed_pixels("PAPI_A", 500.0, 540.0, 12.0, 0.8);
        t.seed_pixels("PAPI_B", 560.0, 540.0, 12.0, 0.8);
        t.seed_pixels("PAPI_C", 620.0, 540.0, 12.0, 0.8);

        let frame0: Vec<DetectedLight> = [500.0, 560.0, 620.0]
            .iter()
            .map(|&x| det(x, 540.0, 230.0))
            .collect();
        t.update(0, &frame0);

        // Whole scene pans +8 px but PAPI_B drops out this frame
        let frame1: Vec<DetectedLight> = [508.0, 628.0]
            .iter()
            .map(|&x| det(x, 540.0, 230.0))
            .collect();
        let states = t.update(1, &frame1);

        assert_eq!(states["PAPI_A"].status, TrackStatus::Tracked);
        assert_eq!(states["PAPI_B"].status, TrackStatus::Predicted);
        assert!(
            (states["PAPI_B"].cx - 568.0).abs() < 2.0,
            "PAPI_B should follow the pan, got {}",
            states["PAPI_B"].cx
        );
    }

    #[test]
    fn test_out_of_order_frame_ignored() {
        let mut t = tracker();
        t.seed_pixels("PAPI_A", 500.0, 540.0, 12.0, 0.8);
        t.update(5, &[det(500.0, 540.0, 230.0)]);
        let len = t.history("PAPI_A").unwrap().len();
        t.update(5, &[det(600.0, 540.0, 230.0)]);
        t.update(3, &[det(600.0, 540.0, 230.0)]);
        assert_eq!(t.history("PAPI_A").unwrap().len(), len);
    }

    #[test]
    fn test_two_lights_keep_identity_through_crossing_noise() {
        let mut t = tracker();
        t.seed_pixels("PAPI_A", 400.0, 540.0, 12.0, 0.8);
        t.seed_pixels("PAPI_B", 460.0, 540.0, 12.0, 0.8);
        for frame in 0..30u64 {
            let dets = vec![det(400.0, 540.0, 230.0), det(460.0, 540.0, 230.0)];
            let states = t.update(frame, &dets);
            assert!((states["PAPI_A"].cx - 400.0).abs() < 1.0);
            assert!((states["PAPI_B"].cx - 460.0).abs() < 1.0);
        }
    }
}
