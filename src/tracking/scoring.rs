// src/tracking/scoring.rs
//
// Match cost between a track's prediction and one candidate detection.
// The blend of heuristics lives behind a trait so the weights are testable
// in isolation from the association loop in light_tracker.rs. Lower cost is
// better; costs are normalized by the frame diagonal so one configuration
// works across resolutions.

use crate::detection::DetectedLight;

/// Everything a scorer may consider for one (track, detection) pairing.
pub struct MatchContext<'a> {
    /// Predicted position for this frame (own velocity + global motion)
    pub predicted: (f32, f32),
    /// Last confirmed position of the track
    pub last_known: (f32, f32),
    /// Mean intensity of the track's recent confirmed observations
    pub last_intensity: f32,
    pub candidate: &'a DetectedLight,
    pub frame_diagonal: f32,
}

pub trait MatchScorer: Send {
    /// Cost of associating the candidate with the track; lower is better.
    fn cost(&self, ctx: &MatchContext<'_>) -> f32;
}

/// Default cost blend: distance to prediction, distance to the last known
/// position, brightness continuity, and a penalty once the implied per-frame
/// displacement becomes implausible.
pub struct WeightedScorer {
    pub w_prediction: f32,
    pub w_last_known: f32,
    pub w_brightness: f32,
    /// Displacement (fraction of frame diagonal) beyond which the jump
    /// penalty applies
    pub jump_ratio: f32,
    pub jump_penalty: f32,
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self {
            w_prediction: 1.0,
            w_last_known: 0.4,
            w_brightness: 0.2,
            jump_ratio: 0.03,
            jump_penalty: 1.0,
        }
    }
}

impl MatchScorer for WeightedScorer {
    fn cost(&self, ctx: &MatchContext<'_>) -> f32 {
        let (cx, cy) = ctx.candidate.position();
        let diag = ctx.frame_diagonal.max(1.0);

        let d_pred = distance(ctx.predicted, (cx, cy)) / diag;
        let d_last = distance(ctx.last_known, (cx, cy)) / diag;
        let d_bright = (ctx.candidate.intensity - ctx.last_intensity).abs() / 255.0;

        let mut cost = self.w_prediction * d_pred
            + self.w_last_known * d_last
            + self.w_brightness * d_bright;

        if d_last > self.jump_ratio {
            cost += self.jump_penalty * (d_last - self.jump_ratio);
        }
        cost
    }
}

#[inline]
fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    (dx * dx + dy * dy).sqrt()
}
