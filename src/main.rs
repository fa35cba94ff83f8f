// src/main.rs

mod config;
mod detection;
mod error;
mod measurement;
mod metadata;
mod overlay;
mod pipeline;
mod tracking;
mod types;
mod video_processor;

use anyhow::Result;
use detection::LightDetector;
use error::PipelineError;
use metadata::interpolator::PositionInterpolator;
use pipeline::{CancelToken, FramePipeline, PrefetchItem, ProcessingStats, ProgressReporter};
use pipeline::prefetch::PrefetchStage;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tracing::{error, info, warn};
use tracking::LightTracker;
use types::{papi_unit_name, SeedPosition, Survey};

fn main() -> Result<()> {
    let config = types::Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("papi_inspector={}", config.logging.level))
        .init();

    info!("PAPI measurement pipeline starting");
    info!(
        "Detection thresholds: brightness={:.0}, saturated={:.0}, area={:.0}..{:.0}",
        config.detection.brightness_threshold,
        config.detection.saturated_threshold,
        config.detection.min_area_px,
        config.detection.max_area_px
    );

    let survey = Survey::load(Path::new(&config.video.survey_path))?;
    info!(
        "Survey loaded: {} reference point(s), runway heading {:?}",
        survey.reference_points.len(),
        survey.runway_heading_deg
    );

    let video_processor = video_processor::VideoProcessor::new(config.clone());
    let video_files = video_processor.find_video_files()?;

    if video_files.is_empty() {
        error!("No video files found in {}", config.video.input_dir);
        return Ok(());
    }

    info!("Found {} video file(s) to process", video_files.len());
    let cancel = CancelToken::new();

    for (idx, video_path) in video_files.iter().enumerate() {
        info!("========================================");
        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            video_files.len(),
            video_path.display()
        );
        info!("========================================");

        match process_video(video_path, &config, &survey, &video_processor, &cancel) {
            Ok(stats) => {
                info!("Video processed successfully");
                info!("  Frames processed: {}", stats.frames_processed);
                info!("  Measurements written: {}", stats.measurements_written);
                info!(
                    "  Light observations: {} tracked / {} predicted / {} lost",
                    stats.tracked_observations, stats.predicted_observations, stats.lost_observations
                );
                info!("  Processing speed: {:.1} FPS", stats.avg_fps);
            }
            Err(e) => {
                if matches!(
                    e.downcast_ref::<PipelineError>(),
                    Some(PipelineError::Cancelled { .. })
                ) {
                    warn!("Processing cancelled: {}", e);
                    break;
                }
                error!("Failed to process video: {}", e);
            }
        }
    }

    Ok(())
}

fn process_video(
    video_path: &Path,
    config: &types::Config,
    survey: &Survey,
    video_processor: &video_processor::VideoProcessor,
    cancel: &CancelToken,
) -> Result<ProcessingStats> {
    use std::time::Instant;

    let start_time = Instant::now();

    // Position metadata first: without a track there is nothing to measure.
    let samples = metadata::extract(video_path)?;
    if samples.is_empty() {
        return Err(PipelineError::NoPositionMetadata {
            path: video_path.display().to_string(),
        }
        .into());
    }
    info!("Position metadata: {} sample(s)", samples.len());

    let mut reader = video_processor.open_video(video_path)?;
    let (width, height) = (reader.width as usize, reader.height as usize);
    let fps = reader.fps;
    let total_frames = reader.total_frames;

    let detector = LightDetector::new(config.detection.clone());
    info!("Light detector ready (backend: {})", detector.backend_name());

    // Seed positions: operator-confirmed from the survey, or auto-detected
    // on the first frame and confirmed downstream.
    let seeds = match &survey.seeds {
        Some(seeds) => {
            info!("Using {} operator-confirmed seed position(s)", seeds.len());
            seeds.clone()
        }
        None => {
            let seeds = auto_detect_seeds(&mut reader, &detector, config, width, height)?;
            // The seeding pass consumed frames; reopen for the main loop
            reader = video_processor.open_video(video_path)?;
            seeds
        }
    };

    let interpolator = PositionInterpolator::new(samples, fps).map_err(|_| {
        PipelineError::NoPositionMetadata {
            path: video_path.display().to_string(),
        }
    })?;
    if !interpolator.is_frame_indexed() && interpolator.sample_count() == 1 {
        warn!("Single-sample position track: every frame reuses one fix");
    }

    let mut tracker = LightTracker::new(config.tracking.clone(), width, height);
    for (name, seed) in &seeds {
        tracker.seed(name, seed);
    }

    let mut pipeline = FramePipeline::new(interpolator, tracker, survey)?;

    let mut writer =
        video_processor.create_writer(video_path, width as i32, height as i32, fps)?;

    std::fs::create_dir_all(&config.video.output_dir)?;
    let video_name = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    let jsonl_path = Path::new(&config.video.output_dir)
        .join(format!("{}_measurements.jsonl", video_name));
    let mut results_file = std::io::BufWriter::new(std::fs::File::create(&jsonl_path)?);
    info!("Measurements will be written to: {}", jsonl_path.display());

    let progress = ProgressReporter::new(total_frames, config.processing.progress_interval_frames);
    let prefetch = PrefetchStage::spawn(
        reader,
        detector,
        config.processing.prefetch_depth,
        cancel.clone(),
    );

    let mut stats = ProcessingStats::default();

    while let Ok(item) = prefetch.receiver.recv() {
        match item {
            PrefetchItem::Frame {
                index,
                frame,
                detections,
            } => {
                if cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled { frame: index }.into());
                }

                let record = pipeline.process_frame(index, frame.timestamp_ms, &detections)?;
                record.write_jsonl(&mut results_file)?;

                stats.frames_processed += 1;
                stats.measurements_written += 1;
                for light in record.lights.values() {
                    match light.status {
                        "TRACKED" => stats.tracked_observations += 1,
                        "PREDICTED" => stats.predicted_observations += 1,
                        "LOST" => stats.lost_observations += 1,
                        _ => {}
                    }
                }

                if let Some(ref mut w) = writer {
                    use opencv::videoio::VideoWriterTrait;
                    let annotated = overlay::render(
                        &frame.data,
                        width as i32,
                        height as i32,
                        pipeline.light_states(),
                        &record,
                    )?;
                    w.write(&annotated)?;
                }

                progress.record(index);
            }
            PrefetchItem::Error(message) => {
                anyhow::bail!("frame pipeline aborted: {}", message);
            }
        }
    }
    prefetch.join();
    results_file.flush()?;

    let duration = start_time.elapsed();
    stats.duration_secs = duration.as_secs_f64();
    stats.avg_fps = if stats.duration_secs > 0.01 {
        stats.frames_processed as f64 / stats.duration_secs
    } else {
        0.0
    };

    let (tracked, predicted, lost) = pipeline.status_counts();
    info!(
        "Final track states: {} tracked, {} predicted, {} lost",
        tracked, predicted, lost
    );

    Ok(stats)
}

/// No operator seeds: run detection + line identification on the first frame
/// and convert the result to percentage seeds.
fn auto_detect_seeds(
    reader: &mut video_processor::VideoReader,
    detector: &LightDetector,
    config: &types::Config,
    width: usize,
    height: usize,
) -> Result<HashMap<String, SeedPosition>> {
    let Some((_, frame)) = reader.read_frame()? else {
        return Err(PipelineError::VideoOpen {
            path: "empty video stream".to_string(),
        }
        .into());
    };

    let candidates = detector.detect(&frame.data, width, height)?;
    let line = detection::identify(&candidates, width, height, &config.papi);
    info!(
        "Auto-detected PAPI line via {} (score {:.3})",
        line.method.as_str(),
        line.score
    );

    let mut seeds = HashMap::new();
    for (i, light) in line.lights.iter().enumerate() {
        let confidence = match line.method {
            detection::SelectionMethod::Combination => Some(0.8),
            detection::SelectionMethod::Ranked => Some(0.5),
            detection::SelectionMethod::Placeholder => Some(0.1),
        };
        seeds.insert(
            papi_unit_name(i),
            SeedPosition::from_pixels(
                light.cx,
                light.cy,
                light.width.max(4.0),
                light.height.max(4.0),
                width,
                height,
                confidence,
            ),
        );
    }
    Ok(seeds)
}
