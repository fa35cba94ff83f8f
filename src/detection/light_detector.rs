// src/detection/light_detector.rs
//
// Per-frame bright-blob detection. Builds a candidate mask (backend.rs),
// extracts external contours, and measures geometry, mean color, and peak
// brightness for every contour inside the configured area window. Output is
// unordered; grouping into a PAPI line happens in papi_line.rs.

use super::backend::{self, DetectorBackend};
use super::classify::{self, LightClass};
use crate::types::DetectionConfig;
use opencv::{core, imgproc, prelude::*};
use tracing::debug;

/// One bright blob measured on a single frame. Recomputed every frame.
#[derive(Debug, Clone)]
pub struct DetectedLight {
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
    pub area_px: f32,
    pub mean_rgb: [f32; 3],
    pub peak_brightness: f32,
    pub intensity: f32,
    pub class: LightClass,
}

impl DetectedLight {
    pub fn position(&self) -> (f32, f32) {
        (self.cx, self.cy)
    }

    /// Larger box dimension, used for size continuity scoring.
    pub fn size(&self) -> f32 {
        self.width.max(self.height)
    }
}

pub struct LightDetector {
    cfg: DetectionConfig,
    backend: Box<dyn DetectorBackend>,
}

impl LightDetector {
    pub fn new(cfg: DetectionConfig) -> Self {
        Self {
            cfg,
            backend: backend::best_available(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Detect candidate lights on one packed-RGB frame.
    pub fn detect(
        &self,
        rgb: &[u8],
        width: usize,
        height: usize,
    ) -> opencv::Result<Vec<DetectedLight>> {
        let mat = Mat::from_slice(rgb)?;
        let rgb_mat = mat.reshape(3, height as i32)?;

        // Brightness plane = V of HSV (max channel). A plain luma grayscale
        // would score saturated red units far too dark to threshold.
        let mut hsv = Mat::default();
        imgproc::cvt_color(&rgb_mat, &mut hsv, imgproc::COLOR_RGB2HSV, 0)?;
        let mut channels = core::Vector::<Mat>::new();
        core::split(&hsv, &mut channels)?;
        let value = channels.get(2)?;

        let mask = self.backend.candidate_mask(&value, &self.cfg)?;

        let mut contours = core::Vector::<core::Vector<core::Point>>::new();
        imgproc::find_contours(
            &mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            core::Point::new(0, 0),
        )?;

        let mut lights = Vec::new();
        for idx in 0..contours.len() {
            let contour = contours.get(idx)?;
            let area = imgproc::contour_area(&contour, false)? as f32;
            if (area as f64) < self.cfg.min_area_px || (area as f64) > self.cfg.max_area_px {
                continue;
            }

            let moments = imgproc::moments(&contour, false)?;
            if moments.m00.abs() < 1e-6 {
                continue;
            }
            let cx = (moments.m10 / moments.m00) as f32;
            let cy = (moments.m01 / moments.m00) as f32;

            let rect = imgproc::bounding_rect(&contour)?;

            // Mean color inside the contour itself, not the whole box
            let mut contour_mask =
                Mat::zeros(rect.height, rect.width, core::CV_8UC1)?.to_mat()?;
            imgproc::draw_contours(
                &mut contour_mask,
                &contours,
                idx as i32,
                core::Scalar::all(255.0),
                -1,
                imgproc::LINE_8,
                &core::no_array(),
                i32::MAX,
                core::Point::new(-rect.x, -rect.y),
            )?;
            let rgb_roi = Mat::roi(&rgb_mat, rect)?;
            let mean = core::mean(&rgb_roi, &contour_mask)?;

            // Peak brightness over the bounding box
            let value_roi = Mat::roi(&value, rect)?;
            let mut peak = 0.0f64;
            core::min_max_loc(
                &value_roi,
                None,
                Some(&mut peak),
                None,
                None,
                &core::no_array(),
            )?;

            let mean_rgb = [mean[0] as f32, mean[1] as f32, mean[2] as f32];
            let intensity = classify::luma(mean_rgb);
            let class = classify::classify(mean_rgb, peak as f32);

            lights.push(DetectedLight {
                cx,
                cy,
                width: rect.width as f32,
                height: rect.height as f32,
                area_px: area,
                mean_rgb,
                peak_brightness: peak as f32,
                intensity,
                class,
            });
        }

        debug!(
            "Detected {} candidate light(s) of {} contour(s)",
            lights.len(),
            contours.len()
        );
        Ok(lights)
    }
}
