// src/metadata/interpolator.rs
//
// Resolves an exact position for any video frame from the parsed sample
// sequence. Per-frame encodings interpolate on frame-index distance (exact
// alignment when the index hits a sample); coarser encodings fall back to
// timestamp distance at frame_index / fps. Frames outside the sampled range
// hold the nearest endpoint rather than erroring.

use super::{GimbalAttitude, PositionSample};
use serde::Serialize;

/// How the position for a frame was derived. `SingleSample` marks the
/// degenerate one-fix track where no interpolation is possible at all; it is
/// carried explicitly so downstream confidence display can distinguish it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InterpolationBasis {
    ExactFrame,
    FrameIndex,
    Timestamp,
    SingleSample,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterpolatedPosition {
    pub frame_index: u64,
    pub basis: InterpolationBasis,
    pub timestamp_ms: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
    pub speed_kmh: Option<f64>,
    pub heading_deg: Option<f64>,
    pub satellites: Option<u32>,
    pub gimbal: Option<GimbalAttitude>,
}

#[derive(Debug, thiserror::Error)]
#[error("position interpolation requires at least one sample")]
pub struct NoSamples;

pub struct PositionInterpolator {
    samples: Vec<PositionSample>,
    fps: f64,
    frame_indexed: bool,
}

impl PositionInterpolator {
    pub fn new(mut samples: Vec<PositionSample>, fps: f64) -> Result<Self, NoSamples> {
        if samples.is_empty() {
            return Err(NoSamples);
        }

        let frame_indexed = samples.iter().all(|s| s.frame_index.is_some());
        if frame_indexed {
            samples.sort_by_key(|s| s.frame_index.unwrap_or(0));
        } else {
            samples.sort_by(|a, b| {
                a.timestamp_ms
                    .partial_cmp(&b.timestamp_ms)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        Ok(Self {
            samples,
            fps: if fps > 0.0 { fps } else { 30.0 },
            frame_indexed,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_frame_indexed(&self) -> bool {
        self.frame_indexed
    }

    /// Position and attitude for an exact frame.
    pub fn position_for_frame(&self, frame_index: u64) -> InterpolatedPosition {
        if self.samples.len() == 1 {
            return build(&self.samples[0], frame_index, InterpolationBasis::SingleSample);
        }

        let target = if self.frame_indexed {
            frame_index as f64
        } else {
            frame_index as f64 / self.fps * 1000.0
        };
        let axis = |s: &PositionSample| -> f64 {
            if self.frame_indexed {
                s.frame_index.unwrap_or(0) as f64
            } else {
                s.timestamp_ms
            }
        };

        let first = &self.samples[0];
        let last = &self.samples[self.samples.len() - 1];

        // Clamp outside the sampled range: hold the nearest endpoint.
        if target <= axis(first) {
            let basis = self.exactness(target, axis(first));
            return build(first, frame_index, basis);
        }
        if target >= axis(last) {
            let basis = self.exactness(target, axis(last));
            return build(last, frame_index, basis);
        }

        // Bounding pair around the target
        let upper = self
            .samples
            .partition_point(|s| axis(s) <= target)
            .min(self.samples.len() - 1);
        let b = &self.samples[upper];
        let a = &self.samples[upper - 1];

        let (av, bv) = (axis(a), axis(b));
        if (target - av).abs() < f64::EPSILON {
            return build(a, frame_index, self.exactness(target, av));
        }
        let span = bv - av;
        let t = if span > 0.0 { (target - av) / span } else { 0.0 };

        let heading = match (a.heading_deg, b.heading_deg) {
            (Some(ha), Some(hb)) => Some(lerp_angle_deg(ha, hb, t)),
            (only, None) => only,
            (None, only) => only,
        };
        let gimbal = lerp_gimbal(a.gimbal, b.gimbal, t);
        let speed = match (a.speed_kmh, b.speed_kmh) {
            (Some(sa), Some(sb)) => Some(sa + (sb - sa) * t),
            (only, None) => only,
            (None, only) => only,
        };
        let nearer = if t < 0.5 { a } else { b };

        InterpolatedPosition {
            frame_index,
            basis: if self.frame_indexed {
                InterpolationBasis::FrameIndex
            } else {
                InterpolationBasis::Timestamp
            },
            timestamp_ms: a.timestamp_ms + (b.timestamp_ms - a.timestamp_ms) * t,
            latitude: a.latitude + (b.latitude - a.latitude) * t,
            longitude: a.longitude + (b.longitude - a.longitude) * t,
            altitude_m: a.altitude_m + (b.altitude_m - a.altitude_m) * t,
            speed_kmh: speed,
            heading_deg: heading,
            satellites: nearer.satellites,
            gimbal,
        }
    }

    fn exactness(&self, target: f64, axis_value: f64) -> InterpolationBasis {
        if self.frame_indexed {
            if (target - axis_value).abs() < f64::EPSILON {
                InterpolationBasis::ExactFrame
            } else {
                InterpolationBasis::FrameIndex
            }
        } else {
            InterpolationBasis::Timestamp
        }
    }
}

fn build(sample: &PositionSample, frame_index: u64, basis: InterpolationBasis) -> InterpolatedPosition {
    InterpolatedPosition {
        frame_index,
        basis,
        timestamp_ms: sample.timestamp_ms,
        latitude: sample.latitude,
        longitude: sample.longitude,
        altitude_m: sample.altitude_m,
        speed_kmh: sample.speed_kmh,
        heading_deg: sample.heading_deg,
        satellites: sample.satellites,
        gimbal: sample.gimbal,
    }
}

/// Shortest-arc interpolation between two compass angles, result in [0, 360).
fn lerp_angle_deg(a: f64, b: f64, t: f64) -> f64 {
    let mut delta = (b - a) % 360.0;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }
    let result = a + delta * t;
    result.rem_euclid(360.0)
}

/// Signed-angle interpolation for gimbal pitch/roll (already in [-180, 180]).
fn lerp_signed(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_gimbal(a: Option<GimbalAttitude>, b: Option<GimbalAttitude>, t: f64) -> Option<GimbalAttitude> {
    match (a, b) {
        (Some(ga), Some(gb)) => Some(GimbalAttitude {
            yaw_deg: {
                let y = lerp_angle_deg(ga.yaw_deg.rem_euclid(360.0), gb.yaw_deg.rem_euclid(360.0), t);
                if y > 180.0 {
                    y - 360.0
                } else {
                    y
                }
            },
            pitch_deg: lerp_signed(ga.pitch_deg, gb.pitch_deg, t),
            roll_deg: lerp_signed(ga.roll_deg, gb.roll_deg, t),
        }),
        (only, None) => only,
        (None, only) => only,
    }
}
