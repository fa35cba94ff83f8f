use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub video: VideoConfig,
    pub detection: DetectionConfig,
    pub papi: PapiConfig,
    pub tracking: TrackingConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub survey_path: String,
    pub save_annotated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub brightness_threshold: f64,
    pub saturated_threshold: f64,
    pub clahe_clip_limit: f64,
    pub clahe_grid_size: i32,
    pub clahe_threshold: f64,
    pub min_area_px: f64,
    pub max_area_px: f64,
    pub morph_kernel_px: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PapiConfig {
    /// Minimum combination score for the exhaustive 4-light search
    pub acceptance_threshold: f32,
    /// Vertical band (fraction of frame height) where PAPI arrays are expected
    pub mid_band_low: f32,
    pub mid_band_high: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Frames without a detection before a track is declared lost
    pub max_gap_frames: u32,
    /// Gap length up to which the track extrapolates with its own velocity;
    /// longer gaps freeze and follow global motion only
    pub freeze_gap_frames: u32,
    /// Match distance ceiling as a fraction of the frame diagonal
    pub match_ceiling_ratio: f32,
    /// History entries used for the short-window velocity estimate
    pub velocity_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub progress_interval_frames: u64,
    /// Frames decoded and pre-detected ahead of the tracker
    pub prefetch_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video: VideoConfig {
                input_dir: "videos".to_string(),
                output_dir: "output".to_string(),
                survey_path: "survey.yaml".to_string(),
                save_annotated: false,
            },
            detection: DetectionConfig::default(),
            papi: PapiConfig::default(),
            tracking: TrackingConfig::default(),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: 200.0,
            saturated_threshold: 245.0,
            clahe_clip_limit: 3.0,
            clahe_grid_size: 8,
            clahe_threshold: 230.0,
            min_area_px: 4.0,
            max_area_px: 2500.0,
            morph_kernel_px: 3,
        }
    }
}

impl Default for PapiConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.55,
            mid_band_low: 0.25,
            mid_band_high: 0.75,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_gap_frames: 30,
            freeze_gap_frames: 8,
            match_ceiling_ratio: 0.05,
            velocity_window: 5,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            progress_interval_frames: 50,
            prefetch_depth: 4,
        }
    }
}

// ============================================================================
// FRAMES
// ============================================================================

/// One decoded video frame. Packed RGB, 3 bytes per pixel, row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

// ============================================================================
// SURVEY INPUT
// ============================================================================

/// Canonical name of the runway touch point reference.
pub const TOUCH_POINT: &str = "TOUCH_POINT";

/// Canonical left-to-right PAPI unit name: 0 -> PAPI_A, 1 -> PAPI_B, ...
pub fn papi_unit_name(index: usize) -> String {
    let letter = (b'A' + (index as u8).min(7)) as char;
    format!("PAPI_{}", letter)
}

/// Surveyed geodetic position of one PAPI unit or the touch point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
    pub nominal_angle_deg: Option<f64>,
    pub tolerance_deg: Option<f64>,
}

/// External survey input: reference points, runway heading, optional
/// operator-confirmed seed positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub runway_heading_deg: Option<f64>,
    pub reference_points: HashMap<String, ReferencePoint>,
    #[serde(default)]
    pub seeds: Option<HashMap<String, SeedPosition>>,
}

// ============================================================================
// SEED POSITIONS
// ============================================================================

/// Initial light position in percent of frame dimensions, as confirmed by the
/// operator or produced by auto-detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeedPosition {
    pub x_pct: f32,
    pub y_pct: f32,
    pub width_pct: f32,
    pub height_pct: f32,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl SeedPosition {
    /// Center and box size in pixels for the given frame dimensions.
    pub fn to_pixels(&self, frame_w: usize, frame_h: usize) -> (f32, f32, f32, f32) {
        (
            pct_to_px(self.x_pct, frame_w),
            pct_to_px(self.y_pct, frame_h),
            pct_to_px(self.width_pct, frame_w),
            pct_to_px(self.height_pct, frame_h),
        )
    }

    pub fn from_pixels(
        cx: f32,
        cy: f32,
        width: f32,
        height: f32,
        frame_w: usize,
        frame_h: usize,
        confidence: Option<f32>,
    ) -> Self {
        Self {
            x_pct: px_to_pct(cx, frame_w),
            y_pct: px_to_pct(cy, frame_h),
            width_pct: px_to_pct(width, frame_w),
            height_pct: px_to_pct(height, frame_h),
            confidence,
        }
    }
}

#[inline]
pub fn pct_to_px(pct: f32, dimension: usize) -> f32 {
    pct / 100.0 * dimension as f32
}

#[inline]
pub fn px_to_pct(px: f32, dimension: usize) -> f32 {
    px / dimension as f32 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_px_round_trip() {
        let (w, h) = (3840usize, 2160usize);
        for &(x, y) in &[(0.0f32, 0.0f32), (1920.0, 1080.0), (3839.0, 2159.0), (17.3, 911.6)] {
            let seed = SeedPosition::from_pixels(x, y, 24.0, 12.0, w, h, None);
            let (rx, ry, rw, rh) = seed.to_pixels(w, h);
            assert!((rx - x).abs() < 1.0, "x {} -> {}", x, rx);
            assert!((ry - y).abs() < 1.0, "y {} -> {}", y, ry);
            assert!((rw - 24.0).abs() < 1.0);
            assert!((rh - 12.0).abs() < 1.0);
        }
    }

    #[test]
    fn test_papi_unit_names() {
        assert_eq!(papi_unit_name(0), "PAPI_A");
        assert_eq!(papi_unit_name(3), "PAPI_D");
        assert_eq!(papi_unit_name(7), "PAPI_H");
    }

    #[test]
    fn test_survey_yaml_round_trip() {
        let yaml = r#"
runway_heading_deg: 264.5
reference_points:
  PAPI_A:
    latitude: -33.9461
    longitude: 151.1772
    elevation_m: 6.2
    nominal_angle_deg: 3.5
    tolerance_deg: 0.25
  TOUCH_POINT:
    latitude: -33.9458
    longitude: 151.1801
    elevation_m: 5.8
    nominal_angle_deg: null
    tolerance_deg: null
seeds:
  PAPI_A:
    x_pct: 41.2
    y_pct: 52.8
    width_pct: 0.8
    height_pct: 0.5
"#;
        let survey: Survey = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(survey.runway_heading_deg, Some(264.5));
        assert_eq!(survey.reference_points.len(), 2);
        let seeds = survey.seeds.unwrap();
        assert!((seeds["PAPI_A"].x_pct - 41.2).abs() < 1e-6);
    }
}
