// src/detection/papi_line.rs
//
// Groups detector output into the 4-unit PAPI array. Every 4-combination of
// the filtered candidates is scored on alignment, spacing, compactness,
// intensity, and size; the winner must clear a fixed acceptance threshold.
// Failing that, a simpler ranked selection runs, and failing even that the
// identifier hands back evenly spaced placeholders. The operator confirms or
// adjusts seeds before full processing, so this stage is deliberately
// permissive and never errors.

use super::light_detector::DetectedLight;
use crate::types::PapiConfig;
use tracing::{debug, info};

/// Candidates kept for the exhaustive search, ranked by filter score.
const MAX_COMBINATION_POOL: usize = 16;
/// Minimum filter score to enter the pool at all.
const MIN_FILTER_SCORE: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMethod {
    /// Best 4-combination cleared the acceptance threshold
    Combination,
    /// Fallback ranked selection (intensity, size, band, red)
    Ranked,
    /// Default evenly spaced geometry; nothing usable was found
    Placeholder,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::Combination => "COMBINATION",
            SelectionMethod::Ranked => "RANKED",
            SelectionMethod::Placeholder => "PLACEHOLDER",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PapiLineResult {
    /// Exactly four lights, sorted by ascending X (left to right)
    pub lights: Vec<DetectedLight>,
    pub score: f32,
    pub method: SelectionMethod,
}

/// Identify the PAPI line among this frame's detected lights.
pub fn identify(
    candidates: &[DetectedLight],
    frame_w: usize,
    frame_h: usize,
    cfg: &PapiConfig,
) -> PapiLineResult {
    let fw = frame_w as f32;
    let fh = frame_h as f32;

    // Stage 1: filter to plausible members
    let mut pool: Vec<(f32, &DetectedLight)> = candidates
        .iter()
        .map(|light| (filter_score(light, fh, cfg), light))
        .filter(|(score, _)| *score >= MIN_FILTER_SCORE)
        .collect();
    pool.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    pool.truncate(MAX_COMBINATION_POOL);

    if pool.len() < 4 {
        debug!(
            "Only {} plausible candidate(s); returning placeholder geometry",
            pool.len()
        );
        return placeholder_line(fw, fh);
    }

    // Stage 2: exhaustive 4-combination search
    let members: Vec<&DetectedLight> = pool.iter().map(|(_, l)| *l).collect();
    let mut best_score = f32::MIN;
    let mut best: Option<[usize; 4]> = None;

    let n = members.len();
    for a in 0..n {
        for b in (a + 1)..n {
            for c in (b + 1)..n {
                for d in (c + 1)..n {
                    let combo = [a, b, c, d];
                    let score = combination_score(&combo, &members, fw, fh);
                    if score > best_score {
                        best_score = score;
                        best = Some(combo);
                    }
                }
            }
        }
    }

    if let Some(combo) = best {
        if best_score >= cfg.acceptance_threshold {
            let mut lights: Vec<DetectedLight> =
                combo.iter().map(|&i| members[i].clone()).collect();
            sort_by_x(&mut lights);
            info!(
                "PAPI line accepted by combination search (score {:.3})",
                best_score
            );
            return PapiLineResult {
                lights,
                score: best_score,
                method: SelectionMethod::Combination,
            };
        }
        debug!(
            "Best combination score {:.3} under threshold {:.3}; using ranked fallback",
            best_score, cfg.acceptance_threshold
        );
    }

    // Stage 3: ranked fallback
    let mut ranked: Vec<(f32, &DetectedLight)> = pool
        .iter()
        .map(|(_, light)| (ranked_score(light, fh, cfg), *light))
        .collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let mut lights: Vec<DetectedLight> = ranked.iter().take(4).map(|(_, l)| (*l).clone()).collect();
    let score = ranked.iter().take(4).map(|(s, _)| s).sum::<f32>() / 4.0;
    sort_by_x(&mut lights);

    PapiLineResult {
        lights,
        score,
        method: SelectionMethod::Ranked,
    }
}

fn sort_by_x(lights: &mut [DetectedLight]) {
    lights.sort_by(|a, b| a.cx.partial_cmp(&b.cx).unwrap_or(std::cmp::Ordering::Equal));
}

/// Stage-1 weight: intensity, mid-band membership, red classification.
fn filter_score(light: &DetectedLight, frame_h: f32, cfg: &PapiConfig) -> f32 {
    let intensity = (light.intensity / 255.0).clamp(0.0, 1.0);
    let band = mid_band_score(light.cy, frame_h, cfg);
    let red = if light.class.is_red() { 1.0 } else { 0.0 };
    0.55 * intensity + 0.30 * band + 0.15 * red
}

/// Fallback ranking: intensity 50%, size 30%, mid-band 15%, red 5%.
fn ranked_score(light: &DetectedLight, frame_h: f32, cfg: &PapiConfig) -> f32 {
    let intensity = (light.intensity / 255.0).clamp(0.0, 1.0);
    let size = (light.size() / 50.0).clamp(0.0, 1.0);
    let band = mid_band_score(light.cy, frame_h, cfg);
    let red = if light.class.is_red() { 1.0 } else { 0.0 };
    0.50 * intensity + 0.30 * size + 0.15 * band + 0.05 * red
}

fn mid_band_score(cy: f32, frame_h: f32, cfg: &PapiConfig) -> f32 {
    let ratio = cy / frame_h;
    if ratio >= cfg.mid_band_low && ratio <= cfg.mid_band_high {
        1.0
    } else {
        0.0
    }
}

/// Score one 4-combination in [0, 1].
fn combination_score(combo: &[usize; 4], members: &[&DetectedLight], fw: f32, fh: f32) -> f32 {
    let mut xs: Vec<f32> = combo.iter().map(|&i| members[i].cx).collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let ys: Vec<f32> = combo.iter().map(|&i| members[i].cy).collect();
    let intensities: Vec<f32> = combo.iter().map(|&i| members[i].intensity).collect();
    let sizes: Vec<f32> = combo.iter().map(|&i| members[i].size()).collect();

    // Y alignment
    let y_std = std_dev(&ys);
    let y_align = (1.0 - y_std / (0.02 * fh)).clamp(0.0, 1.0);

    // X spacing uniformity over the three consecutive gaps
    let gaps = [xs[1] - xs[0], xs[2] - xs[1], xs[3] - xs[2]];
    let gap_mean = (gaps[0] + gaps[1] + gaps[2]) / 3.0;
    let spacing = if gap_mean > 1.0 {
        (1.0 - std_dev(&gaps) / (0.5 * gap_mean)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    // Bounding-box compactness: a PAPI array is wide and short
    let min_y = ys.iter().cloned().fold(f32::MAX, f32::min);
    let max_y = ys.iter().cloned().fold(f32::MIN, f32::max);
    let span_x = xs[3] - xs[0];
    let span_y = (max_y - min_y).max(1.0);
    let compact = (span_x / (span_y * 8.0)).clamp(0.0, 1.0);

    // Intensity level and uniformity
    let int_mean = intensities.iter().sum::<f32>() / 4.0;
    let int_level = (int_mean / 255.0).clamp(0.0, 1.0);
    let int_uniform = (1.0 - std_dev(&intensities) / 64.0).clamp(0.0, 1.0);

    // Size uniformity
    let size_mean = sizes.iter().sum::<f32>() / 4.0;
    let size_uniform = if size_mean > 0.5 {
        (1.0 - std_dev(&sizes) / (0.75 * size_mean)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    // Plausible total line length relative to frame width
    let length_ratio = span_x / fw;
    let length = if (0.02..=0.60).contains(&length_ratio) {
        1.0
    } else {
        0.0
    };

    // Small bonus for red members
    let red_count = combo
        .iter()
        .filter(|&&i| members[i].class.is_red())
        .count() as f32;
    let red_bonus = red_count / 4.0;

    0.20 * y_align
        + 0.20 * spacing
        + 0.10 * compact
        + 0.15 * int_level
        + 0.10 * int_uniform
        + 0.10 * size_uniform
        + 0.10 * length
        + 0.05 * red_bonus
}

fn std_dev(values: &[f32]) -> f32 {
    let n = values.len() as f32;
    if n < 1.0 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    var.sqrt()
}

/// Default evenly spaced geometry centered in the frame.
fn placeholder_line(fw: f32, fh: f32) -> PapiLineResult {
    let lights = (0..4)
        .map(|i| DetectedLight {
            cx: fw * (0.35 + 0.10 * i as f32),
            cy: fh * 0.5,
            width: fw * 0.01,
            height: fw * 0.01,
            area_px: 0.0,
            mean_rgb: [0.0, 0.0, 0.0],
            peak_brightness: 0.0,
            intensity: 0.0,
            class: super::classify::LightClass::Unclassified,
        })
        .collect();
    PapiLineResult {
        lights,
        score: 0.0,
        method: SelectionMethod::Placeholder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::classify::LightClass;

    fn light(cx: f32, cy: f32, size: f32, intensity: f32, class: LightClass) -> DetectedLight {
        DetectedLight {
            cx,
            cy,
            width: size,
            height: size,
            area_px: size * size,
            mean_rgb: match class {
                LightClass::Red => [240.0, 50.0, 40.0],
                _ => [240.0, 238.0, 230.0],
            },
            peak_brightness: 255.0,
            intensity,
            class,
        }
    }

    fn papi_row() -> Vec<DetectedLight> {
        // Perfectly aligned, evenly spaced, bright and red
        (0..4)
            .map(|i| light(800.0 + 60.0 * i as f32, 540.0, 12.0, 230.0, LightClass::Red))
            .collect()
    }

    #[test]
    fn test_synthetic_line_wins_over_noise() {
        let mut candidates = papi_row();
        // Scattered dimmer noise blobs
        candidates.push(light(200.0, 150.0, 7.0, 140.0, LightClass::Unclassified));
        candidates.push(light(1700.0, 950.0, 25.0, 150.0, LightClass::White));
        candidates.push(light(400.0, 700.0, 4.0, 120.0, LightClass::Blue));
        candidates.push(light(1500.0, 300.0, 10.0, 135.0, LightClass::Green));

        let result = identify(&candidates, 1920, 1080, &PapiConfig::default());
        assert_eq!(result.method, SelectionMethod::Combination);
        let xs: Vec<f32> = result.lights.iter().map(|l| l.cx).collect();
        assert_eq!(xs, vec![800.0, 860.0, 920.0, 980.0]);
    }

    #[test]
    fn test_result_sorted_left_to_right() {
        let mut candidates = papi_row();
        candidates.reverse();
        let result = identify(&candidates, 1920, 1080, &PapiConfig::default());
        for pair in result.lights.windows(2) {
            assert!(pair[0].cx < pair[1].cx);
        }
    }

    #[test]
    fn test_too_few_candidates_yield_placeholders() {
        let candidates = vec![
            light(800.0, 540.0, 12.0, 230.0, LightClass::Red),
            light(860.0, 540.0, 12.0, 230.0, LightClass::Red),
        ];
        let result = identify(&candidates, 1920, 1080, &PapiConfig::default());
        assert_eq!(result.method, SelectionMethod::Placeholder);
        assert_eq!(result.lights.len(), 4);
        // Evenly spaced across the middle of the frame
        let gap0 = result.lights[1].cx - result.lights[0].cx;
        let gap1 = result.lights[2].cx - result.lights[1].cx;
        assert!((gap0 - gap1).abs() < 1e-3);
    }

    #[test]
    fn test_scattered_candidates_fall_back_to_ranked() {
        // Enough candidates but no coherent line anywhere
        let candidates = vec![
            light(100.0, 100.0, 9.0, 235.0, LightClass::White),
            light(1800.0, 900.0, 14.0, 230.0, LightClass::White),
            light(400.0, 620.0, 6.0, 228.0, LightClass::Red),
            light(1200.0, 350.0, 20.0, 232.0, LightClass::White),
            light(900.0, 777.0, 11.0, 226.0, LightClass::Red),
        ];
        let result = identify(&candidates, 1920, 1080, &PapiConfig::default());
        assert_eq!(result.method, SelectionMethod::Ranked);
        assert_eq!(result.lights.len(), 4);
    }

    #[test]
    fn test_perfect_line_scores_above_threshold() {
        let candidates = papi_row();
        let result = identify(&candidates, 1920, 1080, &PapiConfig::default());
        assert!(result.score >= PapiConfig::default().acceptance_threshold);
    }
}
