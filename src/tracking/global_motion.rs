// src/tracking/global_motion.rs
//
// Whole-frame camera motion from consecutive detector outputs. Every bright
// blob in the previous frame is matched to its nearest neighbour in the
// current frame; the median of the displacement vectors is the global shift.
// The median makes the estimate robust to a few per-light mismatches, which
// is all the tracker needs to keep its predictions honest while the gimbal
// pans.

use crate::detection::DetectedLight;

/// Fraction of the frame diagonal beyond which a nearest-neighbour pairing
/// is discarded as a mismatch.
const MAX_PAIR_DISTANCE_RATIO: f32 = 0.10;

#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalMotion {
    pub dx: f32,
    pub dy: f32,
    /// Blob pairings behind the estimate; 0 means no estimate this frame
    pub pair_count: usize,
}

pub struct GlobalMotionEstimator {
    prev: Option<Vec<(f32, f32)>>,
    frame_diagonal: f32,
    last: GlobalMotion,
}

impl GlobalMotionEstimator {
    pub fn new(frame_w: usize, frame_h: usize) -> Self {
        let (w, h) = (frame_w as f32, frame_h as f32);
        Self {
            prev: None,
            frame_diagonal: (w * w + h * h).sqrt(),
            last: GlobalMotion::default(),
        }
    }

    /// Feed this frame's full detector output; returns the estimated camera
    /// shift since the previous frame. The first frame returns zero motion.
    pub fn update(&mut self, detections: &[DetectedLight]) -> GlobalMotion {
        let current: Vec<(f32, f32)> = detections.iter().map(|d| d.position()).collect();

        let motion = match &self.prev {
            Some(prev) if !prev.is_empty() && !current.is_empty() => {
                let ceiling = self.frame_diagonal * MAX_PAIR_DISTANCE_RATIO;
                let mut dxs = Vec::with_capacity(prev.len());
                let mut dys = Vec::with_capacity(prev.len());

                for &(px, py) in prev {
                    let mut best_d2 = f32::MAX;
                    let mut best: Option<(f32, f32)> = None;
                    for &(cx, cy) in &current {
                        let d2 = (cx - px) * (cx - px) + (cy - py) * (cy - py);
                        if d2 < best_d2 {
                            best_d2 = d2;
                            best = Some((cx - px, cy - py));
                        }
                    }
                    if let Some((dx, dy)) = best {
                        if best_d2.sqrt() <= ceiling {
                            dxs.push(dx);
                            dys.push(dy);
                        }
                    }
                }

                if dxs.is_empty() {
                    GlobalMotion::default()
                } else {
                    GlobalMotion {
                        dx: median(&mut dxs),
                        dy: median(&mut dys),
                        pair_count: dxs.len(),
                    }
                }
            }
            _ => GlobalMotion::default(),
        };

        self.prev = Some(current);
        self.last = motion;
        motion
    }

    #[allow(dead_code)]
    pub fn last(&self) -> GlobalMotion {
        self.last
    }

    #[allow(dead_code)]
    pub fn reset(&mut self) {
        self.prev = None;
        self.last = GlobalMotion::default();
    }
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values[values.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::classify::LightClass;

    fn blob(cx: f32, cy: f32) -> DetectedLight {
        DetectedLight {
            cx,
            cy,
            width: 10.0,
            height: 10.0,
            area_px: 100.0,
            mean_rgb: [250.0, 250.0, 250.0],
            peak_brightness: 255.0,
            intensity: 250.0,
            class: LightClass::White,
        }
    }

    #[test]
    fn test_first_frame_zero_motion() {
        let mut est = GlobalMotionEstimator::new(1920, 1080);
        let m = est.update(&[blob(100.0, 100.0)]);
        assert_eq!(m.pair_count, 0);
        assert_eq!(m.dx, 0.0);
    }

    #[test]
    fn test_uniform_shift_recovered() {
        let mut est = GlobalMotionEstimator::new(1920, 1080);
        est.update(&[blob(100.0, 100.0), blob(200.0, 100.0), blob(300.0, 100.0)]);
        let m = est.update(&[blob(105.0, 98.0), blob(205.0, 98.0), blob(305.0, 98.0)]);
        assert_eq!(m.pair_count, 3);
        assert!((m.dx - 5.0).abs() < 1e-6);
        assert!((m.dy - -2.0).abs() < 1e-6);
    }

    #[test]
    fn test_outlier_blob_does_not_skew_median() {
        let mut est = GlobalMotionEstimator::new(1920, 1080);
        est.update(&[
            blob(100.0, 500.0),
            blob(200.0, 500.0),
            blob(300.0, 500.0),
            blob(400.0, 500.0),
            blob(900.0, 500.0),
        ]);
        // Four blobs shift +3; the fifth jumps 60 px (a flicker mismatch)
        let m = est.update(&[
            blob(103.0, 500.0),
            blob(203.0, 500.0),
            blob(303.0, 500.0),
            blob(403.0, 500.0),
            blob(960.0, 500.0),
        ]);
        assert!((m.dx - 3.0).abs() < 1e-6, "median dx {}", m.dx);
    }

    #[test]
    fn test_distant_pairings_discarded() {
        let mut est = GlobalMotionEstimator::new(1920, 1080);
        est.update(&[blob(100.0, 100.0)]);
        // Nearest neighbour is 800 px away, over the pairing ceiling
        let m = est.update(&[blob(900.0, 100.0)]);
        assert_eq!(m.pair_count, 0);
        assert_eq!(m.dx, 0.0);
    }

    #[test]
    fn test_empty_frame_resets_to_zero() {
        let mut est = GlobalMotionEstimator::new(1920, 1080);
        est.update(&[blob(100.0, 100.0)]);
        let m = est.update(&[]);
        assert_eq!(m.pair_count, 0);
    }
}
