// src/metadata/srt.rs
//
// Sidecar subtitle track with inline GPS triplets, one block per fix:
//
//   3
//   00:00:02,000 --> 00:00:03,000
//   GPS(-33.946100,151.177200,18.4) BAROMETER:17.9 SATELLITES:14
//
// The triplet order is (latitude, longitude, altitude). Blocks without a
// parsable triplet are skipped; the block's start timecode becomes the
// sample timestamp.

use super::{parse_timecode_ms, PositionSample};
use tracing::debug;

/// Parse a whole subtitle text blob into ordered position samples.
pub fn parse(text: &str) -> Vec<PositionSample> {
    let mut samples = Vec::new();
    let text = text.replace('\r', "");

    for block in text.split("\n\n") {
        let mut timestamp_ms: Option<f64> = None;
        let mut payload = String::new();

        for line in block.lines() {
            if let Some((start, _end)) = line.split_once("-->") {
                timestamp_ms = parse_timecode_ms(start);
            } else {
                payload.push_str(line);
                payload.push(' ');
            }
        }

        let Some(timestamp_ms) = timestamp_ms else {
            continue;
        };
        let Some((lat, lon, alt)) = parse_gps_triplet(&payload) else {
            continue;
        };

        let mut sample = PositionSample::new(timestamp_ms, lat, lon, alt);
        sample.satellites = parse_satellites(&payload);
        samples.push(sample);
    }

    if samples.is_empty() {
        debug!("Subtitle parser found no GPS triplets");
    }
    samples.sort_by(|a, b| {
        a.timestamp_ms
            .partial_cmp(&b.timestamp_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    samples
}

/// Find the first `GPS(lat,lon,alt)` triplet in a payload line.
fn parse_gps_triplet(payload: &str) -> Option<(f64, f64, f64)> {
    let start = payload.find("GPS(")? + 4;
    let rest = &payload[start..];
    let end = rest.find(')')?;
    let mut fields = rest[..end].split(',');

    let lat: f64 = fields.next()?.trim().parse().ok()?;
    let lon: f64 = fields.next()?.trim().parse().ok()?;
    let alt: f64 = fields.next()?.trim().parse().unwrap_or(0.0);

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some((lat, lon, alt))
}

fn parse_satellites(payload: &str) -> Option<u32> {
    let start = payload.find("SATELLITES")? + "SATELLITES".len();
    let rest = payload[start..].trim_start_matches([':', ' ']);
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
