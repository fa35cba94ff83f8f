// src/overlay.rs
//
// Paints tracked light boxes and telemetry text onto frames for the human
// review video. Consumes the same per-frame data as the measurement record
// and adds nothing of its own.

use crate::pipeline::FrameMeasurement;
use crate::tracking::{LightState, TrackStatus};
use anyhow::Result;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};
use std::collections::HashMap;

/// Render one annotated BGR frame for the review video writer.
pub fn render(
    frame_rgb: &[u8],
    width: i32,
    height: i32,
    states: &HashMap<String, LightState>,
    measurement: &FrameMeasurement,
) -> Result<Mat> {
    let mat = Mat::from_slice(frame_rgb)?;
    let mat = mat.reshape(3, height)?;

    let mut bgr = Mat::default();
    imgproc::cvt_color(&mat, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    let mut output = bgr.try_clone()?;

    // Sorted for a stable left-to-right label order
    let mut names: Vec<&String> = states.keys().collect();
    names.sort();

    for name in names {
        let state = &states[name];
        let color = status_color(state.status);
        let half = (state.size * 0.75).max(6.0) as i32;
        let (cx, cy) = (state.cx as i32, state.cy as i32);

        imgproc::rectangle(
            &mut output,
            core::Rect::new(cx - half, cy - half, half * 2, half * 2),
            color,
            2,
            imgproc::LINE_8,
            0,
        )?;

        let label = if let Some(light) = measurement.lights.get(name.as_str()) {
            format!(
                "{} {} {:.2}deg {:.0}m",
                name, light.status, light.vertical_angle_deg, light.ground_distance_m
            )
        } else {
            format!("{} {}", name, state.status.as_str())
        };
        imgproc::put_text(
            &mut output,
            &label,
            core::Point::new(cx - half, cy - half - 8),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.45,
            color,
            1,
            imgproc::LINE_8,
            false,
        )?;
    }

    draw_telemetry_panel(&mut output, measurement, width)?;

    Ok(output)
}

fn draw_telemetry_panel(output: &mut Mat, measurement: &FrameMeasurement, width: i32) -> Result<()> {
    let panel_w = 560.min(width - 10);
    imgproc::rectangle(
        output,
        core::Rect::new(5, 5, panel_w, 64),
        core::Scalar::new(40.0, 40.0, 40.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;

    let line1 = format!(
        "Frame {}  t={:.2}s",
        measurement.frame_number,
        measurement.timestamp_ms / 1000.0
    );
    imgproc::put_text(
        output,
        &line1,
        core::Point::new(15, 28),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.6,
        core::Scalar::new(255.0, 255.0, 255.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;

    let gimbal = measurement
        .gimbal
        .map(|g| format!("  gb {:.1}/{:.1}/{:.1}", g.yaw_deg, g.pitch_deg, g.roll_deg))
        .unwrap_or_default();
    let line2 = format!(
        "Drone {:.6},{:.6} {:.1}m{}",
        measurement.drone.latitude, measurement.drone.longitude, measurement.drone.elevation_m, gimbal
    );
    imgproc::put_text(
        output,
        &line2,
        core::Point::new(15, 54),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        core::Scalar::new(200.0, 200.0, 200.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;

    Ok(())
}

/// BGR box color per track status.
fn status_color(status: TrackStatus) -> core::Scalar {
    match status {
        TrackStatus::Tracked => core::Scalar::new(0.0, 255.0, 0.0, 0.0),
        TrackStatus::Predicted => core::Scalar::new(0.0, 255.0, 255.0, 0.0),
        TrackStatus::Seeded => core::Scalar::new(255.0, 200.0, 0.0, 0.0),
        TrackStatus::Lost => core::Scalar::new(0.0, 0.0, 255.0, 0.0),
    }
}
