// src/detection/backend.rs
//
// Capability interface for the per-frame mask pipeline. The detection
// algorithm itself is single-sourced in light_detector.rs; backends only
// build the candidate mask, so the detector stays testable on machines
// without an accelerator. `best_available` probes OpenCL support once and
// falls back to the plain CPU path.

use crate::types::DetectionConfig;
use opencv::{core, imgproc, prelude::*};
use tracing::{debug, info};

pub trait DetectorBackend: Send {
    fn name(&self) -> &'static str;

    /// Union of the three candidate masks (brightness, saturated,
    /// contrast-enhanced) with speckle removed by close + open morphology.
    fn candidate_mask(&self, brightness: &Mat, cfg: &DetectionConfig) -> opencv::Result<Mat>;
}

pub struct CpuBackend {
    accelerated: bool,
}

impl CpuBackend {
    pub fn new(accelerated: bool) -> Self {
        Self { accelerated }
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        if self.accelerated {
            "cpu+opencl"
        } else {
            "cpu"
        }
    }

    fn candidate_mask(&self, brightness: &Mat, cfg: &DetectionConfig) -> opencv::Result<Mat> {
        // Mask 1: plain brightness threshold
        let mut bright = Mat::default();
        imgproc::threshold(
            brightness,
            &mut bright,
            cfg.brightness_threshold,
            255.0,
            imgproc::THRESH_BINARY,
        )?;

        // Mask 2: stricter saturated threshold
        let mut saturated = Mat::default();
        imgproc::threshold(
            brightness,
            &mut saturated,
            cfg.saturated_threshold,
            255.0,
            imgproc::THRESH_BINARY,
        )?;

        // Mask 3: local-contrast enhancement then threshold, which pulls in
        // lights sitting against bright sky
        let mut clahe = imgproc::create_clahe(
            cfg.clahe_clip_limit,
            core::Size::new(cfg.clahe_grid_size, cfg.clahe_grid_size),
        )?;
        let mut enhanced = Mat::default();
        clahe.apply(brightness, &mut enhanced)?;
        let mut contrast = Mat::default();
        imgproc::threshold(
            &enhanced,
            &mut contrast,
            cfg.clahe_threshold,
            255.0,
            imgproc::THRESH_BINARY,
        )?;

        // Union
        let mut union = Mat::default();
        core::bitwise_or(&bright, &saturated, &mut union, &core::no_array())?;
        let mut mask = Mat::default();
        core::bitwise_or(&union, &contrast, &mut mask, &core::no_array())?;

        // Close then open to fill unit interiors and drop speckle
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_ELLIPSE,
            core::Size::new(cfg.morph_kernel_px, cfg.morph_kernel_px),
            core::Point::new(-1, -1),
        )?;
        let mut closed = Mat::default();
        imgproc::morphology_ex(
            &mask,
            &mut closed,
            imgproc::MORPH_CLOSE,
            &kernel,
            core::Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;
        let mut opened = Mat::default();
        imgproc::morphology_ex(
            &closed,
            &mut opened,
            imgproc::MORPH_OPEN,
            &kernel,
            core::Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        Ok(opened)
    }
}

/// Probe accelerator support and return the best mask backend.
pub fn best_available() -> Box<dyn DetectorBackend> {
    match core::have_opencl() {
        Ok(true) => {
            if core::set_use_opencl(true).is_ok() {
                info!("Detection mask backend: cpu+opencl");
                return Box::new(CpuBackend::new(true));
            }
            Box::new(CpuBackend::new(false))
        }
        _ => {
            debug!("OpenCL unavailable, detection mask backend: cpu");
            Box::new(CpuBackend::new(false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_with_dot(w: i32, h: i32, cx: i32, cy: i32, radius: i32) -> Mat {
        let mut mat = Mat::zeros(h, w, core::CV_8UC1).unwrap().to_mat().unwrap();
        imgproc::circle(
            &mut mat,
            core::Point::new(cx, cy),
            radius,
            core::Scalar::all(255.0),
            -1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        mat
    }

    #[test]
    fn test_bright_dot_survives_mask() {
        let gray = gray_with_dot(64, 64, 32, 32, 4);
        let backend = CpuBackend::new(false);
        let mask = backend
            .candidate_mask(&gray, &DetectionConfig::default())
            .unwrap();
        let nonzero = core::count_non_zero(&mask).unwrap();
        assert!(nonzero > 10, "dot vanished, {} px", nonzero);
    }

    #[test]
    fn test_dark_frame_yields_empty_mask() {
        let gray = Mat::zeros(64, 64, core::CV_8UC1).unwrap().to_mat().unwrap();
        let backend = CpuBackend::new(false);
        let mask = backend
            .candidate_mask(&gray, &DetectionConfig::default())
            .unwrap();
        assert_eq!(core::count_non_zero(&mask).unwrap(), 0);
    }
}
