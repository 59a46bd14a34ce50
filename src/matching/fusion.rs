/// Fusion of the color-fidelity and shape-robustness channels.
///
/// The constants here are field-calibrated across several algorithm
/// revisions; they are deliberately kept as data rather than re-derived.
#[derive(Debug, Clone, Copy)]
pub struct FusionTuning {
    /// Color score above which color evidence is trusted outright.
    pub color_trust: f32,
    /// Shape score above which a weak color match is rescued.
    pub shape_rescue: f32,
    /// Discount applied to a rescued shape score.
    pub shape_rescue_discount: f32,
    /// Discount applied when neither channel is strong.
    pub shape_fallback_discount: f32,
    /// RMS pixel-difference (0-255 scale) at which the color score hits 0.
    pub color_tolerance: f32,
}

impl Default for FusionTuning {
    fn default() -> Self {
        Self {
            color_trust: 0.6,
            shape_rescue: 0.9,
            shape_rescue_discount: 0.95,
            shape_fallback_discount: 0.8,
            color_tolerance: 60.0,
        }
    }
}

impl FusionTuning {
    /// Map a masked RMS pixel difference to the color-fidelity score.
    pub fn color_score(&self, rms_diff: f32) -> f32 {
        (1.0 - rms_diff / self.color_tolerance).max(0.0)
    }

    /// Combine the two channels.
    ///
    /// Prefers color evidence; shape is only a rescued fallback and can
    /// never promote a weak signal past a discount.
    pub fn fuse(&self, color: f32, shape: f32) -> f32 {
        if color > self.color_trust {
            color
        } else if shape > self.shape_rescue {
            shape * self.shape_rescue_discount
        } else {
            shape * self.shape_fallback_discount
        }
    }
}
