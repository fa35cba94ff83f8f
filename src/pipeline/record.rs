// src/pipeline/record.rs
//
// The per-frame measurement record, the session's sole output artifact.
// Records are appended in frame order and serialized as one JSON object per
// line. Light entries use a BTreeMap so serialization order is stable.

use crate::measurement::round3;
use crate::metadata::interpolator::InterpolationBasis;
use crate::metadata::GimbalAttitude;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Clone, Serialize)]
pub struct DronePosition {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
    /// How the position was derived for this frame
    pub basis: InterpolationBasis,
}

/// Measurements for one tracked light on one frame.
#[derive(Debug, Clone, Serialize)]
pub struct LightMeasurement {
    pub status: &'static str,
    pub rgb: [f32; 3],
    pub intensity: f32,
    pub vertical_angle_deg: f64,
    pub horizontal_angle_deg: f64,
    pub ground_distance_m: f64,
    pub direct_distance_m: f64,
    pub lit_area_px: f32,
    pub confidence: f32,
}

/// Geometry-only measurement toward the runway touch point.
#[derive(Debug, Clone, Serialize)]
pub struct PointMeasurement {
    pub vertical_angle_deg: f64,
    pub horizontal_angle_deg: f64,
    pub ground_distance_m: f64,
    pub direct_distance_m: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameMeasurement {
    pub frame_number: u64,
    pub timestamp_ms: f64,
    pub drone: DronePosition,
    pub gimbal: Option<GimbalAttitude>,
    pub lights: BTreeMap<String, LightMeasurement>,
    pub touch_point: Option<PointMeasurement>,
}

impl FrameMeasurement {
    /// Append this record as one JSONL line.
    pub fn write_jsonl<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let line = serde_json::to_string(self)?;
        writeln!(writer, "{}", line)
    }
}

/// Round a distance for the output record; measurement angles arrive
/// pre-rounded.
pub fn round_distance(meters: f64) -> f64 {
    round3(meters)
}
