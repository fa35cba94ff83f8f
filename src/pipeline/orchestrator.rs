// src/pipeline/orchestrator.rs
//
// Per-frame assembly: resolve the drone position, advance the tracker, run
// the geodesy against each light's surveyed reference point, and append one
// FrameMeasurement to the session's output series. Strictly sequential over
// frames; the tracker at frame i depends on frame i-1.

use super::record::{
    round_distance, DronePosition, FrameMeasurement, LightMeasurement, PointMeasurement,
};
use crate::detection::DetectedLight;
use crate::error::PipelineError;
use crate::measurement::{
    direct_distance_m, ground_distance_m, horizontal_angle_deg, vertical_angle_deg, GeoPoint,
};
use crate::metadata::interpolator::PositionInterpolator;
use crate::tracking::{LightState, LightTracker, TrackStatus};
use crate::types::{ReferencePoint, Survey, TOUCH_POINT};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub struct FramePipeline {
    interpolator: PositionInterpolator,
    tracker: LightTracker,
    references: HashMap<String, ReferencePoint>,
    touch_point: Option<ReferencePoint>,
    runway_heading_deg: f64,
    measurements: Vec<FrameMeasurement>,
    last_states: HashMap<String, LightState>,
}

impl FramePipeline {
    /// Build a pipeline for one video session. The tracker must already be
    /// seeded; every seeded light needs a surveyed reference point, and the
    /// runway heading is mandatory because every record carries horizontal
    /// angles.
    pub fn new(
        interpolator: PositionInterpolator,
        tracker: LightTracker,
        survey: &Survey,
    ) -> Result<Self, PipelineError> {
        let runway_heading_deg = survey
            .runway_heading_deg
            .ok_or(PipelineError::MissingRunwayHeading)?;

        let mut references = HashMap::new();
        for name in tracker.tracked_names() {
            let reference = survey.reference_points.get(&name).ok_or_else(|| {
                PipelineError::MissingReferencePoint { name: name.clone() }
            })?;
            references.insert(name, reference.clone());
        }

        let touch_point = survey.reference_points.get(TOUCH_POINT).cloned();

        Ok(Self {
            interpolator,
            tracker,
            references,
            touch_point,
            runway_heading_deg,
            measurements: Vec::new(),
            last_states: HashMap::new(),
        })
    }

    /// Process one frame and append its measurement record. Returns a copy
    /// of the appended record.
    pub fn process_frame(
        &mut self,
        frame_index: u64,
        timestamp_ms: f64,
        detections: &[DetectedLight],
    ) -> Result<FrameMeasurement, PipelineError> {
        let position = self.interpolator.position_for_frame(frame_index);
        let drone = GeoPoint {
            latitude: position.latitude,
            longitude: position.longitude,
            elevation_m: position.altitude_m,
        };

        let states = self.tracker.update(frame_index, detections);
        self.last_states = states.clone();

        let mut lights = BTreeMap::new();
        for (name, state) in &states {
            let reference = self.references.get(name).ok_or_else(|| {
                PipelineError::MissingReferencePoint { name: name.clone() }
            })?;
            let ref_point = GeoPoint {
                latitude: reference.latitude,
                longitude: reference.longitude,
                elevation_m: reference.elevation_m,
            };

            lights.insert(
                name.clone(),
                LightMeasurement {
                    status: state.status.as_str(),
                    rgb: state.rgb,
                    intensity: state.intensity,
                    vertical_angle_deg: vertical_angle_deg(&drone, &ref_point),
                    horizontal_angle_deg: horizontal_angle_deg(
                        &drone,
                        &ref_point,
                        self.runway_heading_deg,
                    ),
                    ground_distance_m: round_distance(ground_distance_m(&drone, &ref_point)),
                    direct_distance_m: round_distance(direct_distance_m(&drone, &ref_point)),
                    lit_area_px: state.area_px,
                    confidence: state.confidence,
                },
            );
        }

        let touch_point = self.touch_point.as_ref().map(|tp| {
            let tp_point = GeoPoint {
                latitude: tp.latitude,
                longitude: tp.longitude,
                elevation_m: tp.elevation_m,
            };
            PointMeasurement {
                vertical_angle_deg: vertical_angle_deg(&drone, &tp_point),
                horizontal_angle_deg: horizontal_angle_deg(
                    &drone,
                    &tp_point,
                    self.runway_heading_deg,
                ),
                ground_distance_m: round_distance(ground_distance_m(&drone, &tp_point)),
                direct_distance_m: round_distance(direct_distance_m(&drone, &tp_point)),
            }
        });

        debug!(
            "Frame {}: {} light(s) measured, drone at {:.6},{:.6}",
            frame_index,
            lights.len(),
            drone.latitude,
            drone.longitude
        );

        let record = FrameMeasurement {
            frame_number: frame_index,
            timestamp_ms,
            drone: DronePosition {
                latitude: position.latitude,
                longitude: position.longitude,
                elevation_m: position.altitude_m,
                basis: position.basis,
            },
            gimbal: position.gimbal,
            lights,
            touch_point,
        };
        self.measurements.push(record.clone());
        Ok(record)
    }

    /// Per-light tracker snapshot from the most recent frame, for the
    /// overlay renderer and for status accounting.
    pub fn light_states(&self) -> &HashMap<String, LightState> {
        &self.last_states
    }

    pub fn status_counts(&self) -> (u64, u64, u64) {
        let mut tracked = 0;
        let mut predicted = 0;
        let mut lost = 0;
        for name in self.tracker.tracked_names() {
            match self.tracker.status(&name) {
                Some(TrackStatus::Tracked) => tracked += 1,
                Some(TrackStatus::Predicted) => predicted += 1,
                Some(TrackStatus::Lost) => lost += 1,
                _ => {}
            }
        }
        (tracked, predicted, lost)
    }

    pub fn measurements(&self) -> &[FrameMeasurement] {
        &self.measurements
    }

    pub fn into_measurements(self) -> Vec<FrameMeasurement> {
        self.measurements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::LightDetector;
    use crate::metadata::PositionSample;
    use crate::types::{DetectionConfig, TrackingConfig};

    const FRAME_W: usize = 320;
    const FRAME_H: usize = 240;

    /// Dark frame with the 4 static PAPI patches: two red, two white.
    fn synthetic_frame() -> Vec<u8> {
        let mut data = vec![6u8; FRAME_W * FRAME_H * 3];
        let patches: [(usize, [u8; 3]); 4] = [
            (60, [255, 45, 40]),
            (100, [255, 45, 40]),
            (140, [255, 255, 255]),
            (180, [255, 255, 255]),
        ];
        for (px, color) in patches {
            for y in 116..124 {
                for x in px..px + 8 {
                    let i = (y * FRAME_W + x) * 3;
                    data[i] = color[0];
                    data[i + 1] = color[1];
                    data[i + 2] = color[2];
                }
            }
        }
        data
    }

    fn survey() -> Survey {
        let mut reference_points = HashMap::new();
        // PAPI bar perpendicular to a runway heading of 0, units ~11 m apart
        for (i, lon) in [0.0, 0.0001, 0.0002, 0.0003].iter().enumerate() {
            reference_points.insert(
                crate::types::papi_unit_name(i),
                ReferencePoint {
                    latitude: 0.0,
                    longitude: *lon,
                    elevation_m: 0.0,
                    nominal_angle_deg: Some(3.0),
                    tolerance_deg: Some(0.25),
                },
            );
        }
        reference_points.insert(
            TOUCH_POINT.to_string(),
            ReferencePoint {
                latitude: 0.0005,
                longitude: 0.00015,
                elevation_m: 0.0,
                nominal_angle_deg: None,
                tolerance_deg: None,
            },
        );
        Survey {
            runway_heading_deg: Some(0.0),
            reference_points,
            seeds: None,
        }
    }

    fn seeded_tracker() -> LightTracker {
        let mut tracker = LightTracker::new(TrackingConfig::default(), FRAME_W, FRAME_H);
        for (i, x) in [64.0f32, 104.0, 144.0, 184.0].iter().enumerate() {
            tracker.seed_pixels(&crate::types::papi_unit_name(i), *x, 120.0, 8.0, 0.9);
        }
        tracker
    }

    /// Drone approaching along the extended centerline: two bounding samples,
    /// position interpolated per frame.
    fn approach_samples() -> Vec<PositionSample> {
        let mut start = PositionSample::new(0.0, 0.0100, 0.00015, 30.0);
        start.heading_deg = Some(180.0);
        let mut end = PositionSample::new(300.0, 0.0090, 0.00015, 28.0);
        end.heading_deg = Some(180.0);
        vec![start, end]
    }

    #[test]
    fn test_ten_frame_approach_end_to_end() {
        let detector = LightDetector::new(DetectionConfig::default());
        let interpolator = PositionInterpolator::new(approach_samples(), 30.0).unwrap();
        let mut pipeline =
            FramePipeline::new(interpolator, seeded_tracker(), &survey()).unwrap();

        let frame = synthetic_frame();
        for i in 0..10u64 {
            let detections = detector.detect(&frame, FRAME_W, FRAME_H).unwrap();
            assert_eq!(detections.len(), 4, "frame {} detections", i);
            let timestamp_ms = i as f64 / 30.0 * 1000.0;
            pipeline.process_frame(i, timestamp_ms, &detections).unwrap();
        }

        let records = pipeline.measurements();
        assert_eq!(records.len(), 10);

        // Ground distance decreases monotonically as the drone approaches
        for name in ["PAPI_A", "PAPI_D"] {
            let distances: Vec<f64> = records
                .iter()
                .map(|r| r.lights[name].ground_distance_m)
                .collect();
            for pair in distances.windows(2) {
                assert!(pair[1] < pair[0], "{} distances not decreasing: {:?}", name, distances);
            }
        }

        // Statuses settle to TRACKED and stay there; classes are stable
        // because the synthetic lights never change color
        for record in &records[1..] {
            for (name, light) in &record.lights {
                assert_eq!(light.status, "TRACKED", "{} in frame {}", name, record.frame_number);
                assert!(light.confidence > 0.5);
            }
            // Red units keep a red-dominant mean, white units stay balanced
            let red = &record.lights["PAPI_A"].rgb;
            assert!(red[0] > red[1] + 50.0);
            let white = &record.lights["PAPI_D"].rgb;
            assert!((white[0] - white[2]).abs() < 30.0);
        }

        // Drone is on the centerline: horizontal angle stays near zero
        for record in &records {
            for light in record.lights.values() {
                assert!(light.horizontal_angle_deg.abs() < 2.0);
                assert!(light.vertical_angle_deg > 0.0);
            }
            let tp = record.touch_point.as_ref().unwrap();
            assert!(tp.ground_distance_m > 0.0);
        }
    }

    #[test]
    fn test_missing_runway_heading_is_fatal() {
        let mut survey = survey();
        survey.runway_heading_deg = None;
        let interpolator = PositionInterpolator::new(approach_samples(), 30.0).unwrap();
        let result = FramePipeline::new(interpolator, seeded_tracker(), &survey);
        assert!(matches!(result, Err(PipelineError::MissingRunwayHeading)));
    }

    #[test]
    fn test_missing_reference_point_is_fatal() {
        let mut survey = survey();
        survey.reference_points.remove("PAPI_C");
        let interpolator = PositionInterpolator::new(approach_samples(), 30.0).unwrap();
        let result = FramePipeline::new(interpolator, seeded_tracker(), &survey);
        match result {
            Err(PipelineError::MissingReferencePoint { name }) => assert_eq!(name, "PAPI_C"),
            other => panic!("expected MissingReferencePoint, got {:?}", other.err()),
        }
    }
}
