// src/detection/classify.rs
//
// Coarse color classification of a detected light from its mean RGB and
// brightness. PAPI units show red or white; green and blue cover stray
// airfield lighting that enters the candidate pool. A blown-out blob whose
// hue is unrecoverable is tagged HighIntensity rather than guessed.

/// Coarse class of a detected light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum LightClass {
    Red,
    White,
    Green,
    Blue,
    HighIntensity,
    Unclassified,
}

impl LightClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightClass::Red => "RED",
            LightClass::White => "WHITE",
            LightClass::Green => "GREEN",
            LightClass::Blue => "BLUE",
            LightClass::HighIntensity => "HIGH_INTENSITY",
            LightClass::Unclassified => "UNCLASSIFIED",
        }
    }

    pub fn is_red(&self) -> bool {
        matches!(self, LightClass::Red)
    }
}

/// ITU-R BT.601 luma of an RGB triple.
#[inline]
pub fn luma(rgb: [f32; 3]) -> f32 {
    0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]
}

/// Minimum luma for a balanced blob to count as white.
const WHITE_INTENSITY_MIN: f32 = 170.0;
/// Channel-ratio spread under which a blob reads as hueless.
const BALANCED_SPREAD: f32 = 0.10;
/// Dominance margin a channel needs over both others.
const DOMINANCE_MARGIN: f32 = 0.08;
/// Peak brightness at which an otherwise unclassifiable blob is blown out.
const SATURATED_PEAK: f32 = 250.0;

/// Classify from normalized channel ratios plus absolute intensity.
pub fn classify(mean_rgb: [f32; 3], peak_brightness: f32) -> LightClass {
    let [r, g, b] = mean_rgb;
    let sum = r + g + b;
    if sum < 1.0 {
        return LightClass::Unclassified;
    }

    let (rr, gr, br) = (r / sum, g / sum, b / sum);
    let spread = rr.max(gr).max(br) - rr.min(gr).min(br);
    let intensity = luma(mean_rgb);

    if rr > gr + DOMINANCE_MARGIN && rr > br + DOMINANCE_MARGIN {
        return LightClass::Red;
    }
    if spread <= BALANCED_SPREAD && intensity >= WHITE_INTENSITY_MIN {
        return LightClass::White;
    }
    if gr > rr + DOMINANCE_MARGIN && gr > br + DOMINANCE_MARGIN {
        return LightClass::Green;
    }
    if br > rr + DOMINANCE_MARGIN && br > gr + DOMINANCE_MARGIN {
        return LightClass::Blue;
    }
    if peak_brightness >= SATURATED_PEAK {
        return LightClass::HighIntensity;
    }
    LightClass::Unclassified
}
