// src/metadata/flight_record.rs
//
// Per-frame flight-record stream. Each record carries a frame counter, frame
// duration, wall-clock timestamp, camera settings and position/attitude in
// bracketed key-value fields:
//
//   FrameCnt: 142, DiffTime: 33ms
//   2023-06-14 10:23:49.812
//   [iso: 100] [shutter: 1/1000.0] [fnum: 2.8] [ev: 0] [ct: 5561]
//   [focal_len: 24.00] [latitude: -33.946012] [longitude: 151.177204]
//   [rel_alt: 30.200 abs_alt: 52.400]
//   [gb_yaw: -12.3 gb_pitch: -45.0 gb_roll: 0.0]
//
// FrameCnt is 1-based in the stream; samples are stored with 0-based frame
// indices to align with decoder frame numbering. The record may arrive as a
// proper subtitle file or as raw text scanned out of the container, so the
// parser keys on "FrameCnt" markers rather than on blank-line block
// structure.

use super::{parse_timecode_ms, CameraSettings, GimbalAttitude, PositionSample};
use chrono::NaiveDateTime;
use tracing::debug;

const DEFAULT_FRAME_MS: f64 = 33.0;

/// Parse a flight-record blob into ordered position samples.
pub fn parse(text: &str) -> Vec<PositionSample> {
    let mut samples = Vec::new();
    let mut cumulative_ms = 0.0;

    let marks: Vec<usize> = text.match_indices("FrameCnt").map(|(i, _)| i).collect();
    for (mi, &start) in marks.iter().enumerate() {
        let end = marks.get(mi + 1).copied().unwrap_or(text.len());
        let record = &text[start..end];

        let Some(frame_cnt) = parse_number_after(record, "FrameCnt") else {
            continue;
        };
        if frame_cnt < 1.0 {
            continue;
        }
        let diff_ms = parse_number_after(record, "DiffTime").unwrap_or(DEFAULT_FRAME_MS);

        let fields = parse_bracket_fields(record);
        let latitude = field_f64(&fields, "latitude");
        let longitude = field_f64(&fields, "longitude");
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            cumulative_ms += diff_ms;
            continue;
        };

        let rel_alt = field_f64(&fields, "rel_alt");
        let abs_alt = field_f64(&fields, "abs_alt");
        let altitude_m = abs_alt.or(rel_alt).unwrap_or(0.0);

        // A record's subtitle timecode precedes its FrameCnt marker, so it
        // lives in the text between the previous marker and this one. Raw
        // container-scanned text has no timecodes; the running DiffTime sum
        // carries the clock instead.
        let header_start = if mi == 0 { 0 } else { marks[mi - 1] };
        let timestamp_ms = text[header_start..start]
            .lines()
            .filter_map(|l| l.split_once("-->").and_then(|(s, _)| parse_timecode_ms(s)))
            .last()
            .unwrap_or(cumulative_ms);
        cumulative_ms += diff_ms;

        let mut sample = PositionSample::new(timestamp_ms, latitude, longitude, altitude_m);
        sample.frame_index = Some(frame_cnt as u64 - 1);
        sample.relative_altitude_m = rel_alt;
        sample.datetime = parse_datetime(record);

        if let (Some(yaw), Some(pitch), Some(roll)) = (
            field_f64(&fields, "gb_yaw"),
            field_f64(&fields, "gb_pitch"),
            field_f64(&fields, "gb_roll"),
        ) {
            sample.gimbal = Some(GimbalAttitude {
                yaw_deg: yaw,
                pitch_deg: pitch,
                roll_deg: roll,
            });
        }

        let camera = CameraSettings {
            iso: field_f64(&fields, "iso").map(|v| v as i64),
            shutter: field_value(&fields, "shutter").map(|v| v.to_string()),
            f_number: field_f64(&fields, "fnum"),
            ev: field_f64(&fields, "ev"),
            color_temp: field_f64(&fields, "ct").map(|v| v as i64),
            focal_length_mm: field_f64(&fields, "focal_len"),
        };
        if !camera.is_empty() {
            sample.camera = Some(camera);
        }

        samples.push(sample);
    }

    if samples.is_empty() {
        debug!("Flight-record parser found no usable records");
    }
    samples.sort_by_key(|s| s.frame_index.unwrap_or(u64::MAX));
    samples
}

/// Parse "Key: 123" or "Key : 123ms" immediately after the key token.
fn parse_number_after(record: &str, key: &str) -> Option<f64> {
    let start = record.find(key)? + key.len();
    let rest = record[start..].trim_start_matches([':', ' ']);
    let number: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    number.parse().ok()
}

/// Collect key-value pairs from every [...] group. A group may hold several
/// pairs ("rel_alt: 30.2 abs_alt: 52.4").
fn parse_bracket_fields(record: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut rest = record;

    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find(']') else {
            break;
        };
        let inner = &rest[open + 1..open + close];
        let tokens: Vec<&str> = inner.split_whitespace().collect();
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            if let Some(key) = token.strip_suffix(':') {
                if i + 1 < tokens.len() {
                    fields.push((key.to_string(), tokens[i + 1].to_string()));
                    i += 2;
                    continue;
                }
            } else if let Some((key, value)) = token.split_once(':') {
                if !value.is_empty() && !key.is_empty() {
                    fields.push((key.to_string(), value.to_string()));
                }
            }
            i += 1;
        }
        rest = &rest[open + close + 1..];
    }
    fields
}

fn field_value<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn field_f64(fields: &[(String, String)], key: &str) -> Option<f64> {
    field_value(fields, key)?.trim().parse().ok()
}

fn parse_datetime(record: &str) -> Option<NaiveDateTime> {
    for line in record.lines() {
        let line = line.trim();
        if line.len() < 19 || !line.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        // The line may carry fractional seconds or trailing tags
        let head: String = line.chars().take(23).collect();
        if let Ok(dt) = NaiveDateTime::parse_from_str(&head, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(dt);
        }
        let head: String = line.chars().take(19).collect();
        if let Ok(dt) = NaiveDateTime::parse_from_str(&head, "%Y-%m-%d %H:%M:%S") {
            return Some(dt);
        }
    }
    None
}
