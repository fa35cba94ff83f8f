// src/metadata/mod.rs
//
// Position metadata extraction. Drone video carries its GPS track in one of
// three encodings, tried in order of reliability:
//   1. a sidecar .SRT subtitle file with inline GPS(lat,lon,alt) triplets
//   2. a per-frame flight-record text stream embedded in the container
//   3. a single static ISO 6709 location tag in the container metadata
// The first non-empty sample sequence wins. An empty result is the caller's
// signal to abort the video, never to fabricate a track.

pub mod container;
pub mod flight_record;
pub mod interpolator;
pub mod srt;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Gimbal attitude at a sample, degrees.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GimbalAttitude {
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

/// Camera exposure settings carried by the flight-record encoding.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CameraSettings {
    pub iso: Option<i64>,
    pub shutter: Option<String>,
    pub f_number: Option<f64>,
    pub ev: Option<f64>,
    pub color_temp: Option<i64>,
    pub focal_length_mm: Option<f64>,
}

impl CameraSettings {
    pub fn is_empty(&self) -> bool {
        self.iso.is_none()
            && self.shutter.is_none()
            && self.f_number.is_none()
            && self.ev.is_none()
            && self.color_temp.is_none()
            && self.focal_length_mm.is_none()
    }
}

/// One parsed position sample. Immutable once parsed; sequences are ordered
/// by frame index when the source encodes one, otherwise by timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct PositionSample {
    /// Milliseconds relative to the start of the video track
    pub timestamp_ms: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Absolute altitude in meters where the source provides it
    pub altitude_m: f64,
    pub relative_altitude_m: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub heading_deg: Option<f64>,
    pub satellites: Option<u32>,
    pub accuracy_m: Option<f64>,
    /// Source video frame index (0-based) for per-frame encodings
    pub frame_index: Option<u64>,
    pub datetime: Option<NaiveDateTime>,
    pub gimbal: Option<GimbalAttitude>,
    pub camera: Option<CameraSettings>,
}

impl PositionSample {
    pub fn new(timestamp_ms: f64, latitude: f64, longitude: f64, altitude_m: f64) -> Self {
        Self {
            timestamp_ms,
            latitude,
            longitude,
            altitude_m,
            relative_altitude_m: None,
            speed_kmh: None,
            heading_deg: None,
            satellites: None,
            accuracy_m: None,
            frame_index: None,
            datetime: None,
            gimbal: None,
            camera: None,
        }
    }
}

/// Extract the position track for a video. Returns an empty Vec when none of
/// the supported encodings match.
pub fn extract(video_path: &Path) -> std::io::Result<Vec<PositionSample>> {
    // 1. Sidecar subtitle file next to the video
    if let Some(sidecar) = find_sidecar(video_path) {
        info!("Reading sidecar track: {}", sidecar.display());
        let text = std::fs::read_to_string(&sidecar)?;
        let samples = parse_text_track(&text);
        if !samples.is_empty() {
            info!("Sidecar track yielded {} position samples", samples.len());
            return Ok(samples);
        }
        debug!("Sidecar present but yielded no samples");
    }

    // 2. Embedded text stream scanned out of the container
    let embedded = scan_container_text(video_path)?;
    if !embedded.is_empty() {
        let samples = parse_text_track(&embedded);
        if !samples.is_empty() {
            info!("Embedded track yielded {} position samples", samples.len());
            return Ok(samples);
        }
    }

    // 3. Static container location tag
    if let Some(sample) = container::extract(video_path)? {
        info!(
            "Container location tag found: {:.4}, {:.4}",
            sample.latitude, sample.longitude
        );
        return Ok(vec![sample]);
    }

    Ok(Vec::new())
}

/// Run both text-track parsers over a blob; the flight-record format is the
/// richer one, so it is tried first.
fn parse_text_track(text: &str) -> Vec<PositionSample> {
    let samples = flight_record::parse(text);
    if !samples.is_empty() {
        return samples;
    }
    srt::parse(text)
}

fn find_sidecar(video_path: &Path) -> Option<std::path::PathBuf> {
    for ext in ["srt", "SRT"] {
        let candidate = video_path.with_extension(ext);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Keywords that mark a printable run as a metadata candidate.
const TRACK_KEYWORDS: [&str; 3] = ["FrameCnt", "GPS(", "latitude"];

/// Upper bound on collected text, so a pathological container cannot balloon
/// memory.
const MAX_COLLECTED_BYTES: usize = 16 * 1024 * 1024;

/// Scan the container bytes for printable-ASCII runs that look like an
/// embedded metadata stream and join them into one text blob.
fn scan_container_text(video_path: &Path) -> std::io::Result<String> {
    let file = File::open(video_path)?;
    let mut reader = BufReader::with_capacity(1 << 20, file);

    let mut collected = String::new();
    let mut run: Vec<u8> = Vec::with_capacity(256);
    let mut buf = [0u8; 1 << 16];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for &byte in &buf[..n] {
            if byte == b'\n' || byte == b'\r' || byte == b'\t' || (0x20..0x7f).contains(&byte) {
                run.push(byte);
            } else {
                flush_run(&mut run, &mut collected);
                if collected.len() >= MAX_COLLECTED_BYTES {
                    debug!("Container text scan hit collection cap");
                    return Ok(collected);
                }
            }
        }
    }
    flush_run(&mut run, &mut collected);
    Ok(collected)
}

fn flush_run(run: &mut Vec<u8>, collected: &mut String) {
    if run.len() >= 24 {
        if let Ok(text) = std::str::from_utf8(run) {
            if TRACK_KEYWORDS.iter().any(|k| text.contains(k)) {
                collected.push_str(text);
                collected.push('\n');
            }
        }
    }
    run.clear();
}

/// Parse an SRT timecode ("HH:MM:SS,mmm") into milliseconds.
pub(crate) fn parse_timecode_ms(token: &str) -> Option<f64> {
    let token = token.trim();
    let (hms, millis) = token.split_once(',').or_else(|| token.split_once('.'))?;
    let mut parts = hms.split(':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.trim().parse().ok()?;
    let seconds: f64 = parts.next()?.trim().parse().ok()?;
    let millis: f64 = millis.trim().parse().ok()?;
    Some(((hours * 60.0 + minutes) * 60.0 + seconds) * 1000.0 + millis)
}
