use image::RgbaImage;
use rayon::prelude::*;

use super::fusion::FusionTuning;
use super::outcome::MatchOutcome;
use crate::templates::Template;

/// Diagnostics for the degenerate paths, checked in this order.
pub const NO_FRAME: &str = "no frame captured (region unset?)";
pub const NO_TEMPLATES: &str = "no templates loaded";
pub const SIZE_MISMATCH: &str = "all templates exceed frame size";
pub const LOW_CONTRAST: &str = "low contrast frame";

const VARIANCE_EPSILON: f64 = 1e-6;

/// Two-channel template matcher.
///
/// For every eligible template the engine slides the icon over the frame
/// and keeps two signals: a color-fidelity score on the raw pixels (the
/// primary signal; it is what separates same-shaped icons that differ only
/// by color) and a shape score on contrast-stretched luma (tolerant of
/// brightness shifts that wash out the color signal, but color-blind).
/// [`FusionTuning::fuse`] combines them; the best template wins.
pub struct MatchEngine {
    tuning: FusionTuning,
}

impl MatchEngine {
    pub fn new(tuning: FusionTuning) -> Self {
        Self { tuning }
    }

    /// Score `frame` against a template group.
    ///
    /// `missing_reason` is the capturer's `last_error`, threaded through so
    /// a missing frame reports its actual cause. Scores never panic: any
    /// non-finite per-template score contributes 0.
    pub fn evaluate(
        &self,
        frame: Option<&RgbaImage>,
        missing_reason: Option<&str>,
        templates: &[Template],
        threshold: f32,
    ) -> MatchOutcome {
        let Some(frame) = frame else {
            let reason = missing_reason.unwrap_or(NO_FRAME);
            return MatchOutcome::Degenerate(reason.to_string());
        };

        if templates.is_empty() {
            return MatchOutcome::Degenerate(NO_TEMPLATES.to_string());
        }

        let eligible: Vec<&Template> = templates
            .iter()
            .filter(|t| t.width() <= frame.width() && t.height() <= frame.height())
            .collect();
        if eligible.is_empty() {
            return MatchOutcome::Degenerate(SIZE_MISMATCH.to_string());
        }

        let Some(frame_pixels) = FramePlanes::build(frame) else {
            return MatchOutcome::Degenerate(LOW_CONTRAST.to_string());
        };

        let best = eligible
            .par_iter()
            .map(|template| {
                let score = self.score_template(&frame_pixels, template);
                if score.is_finite() {
                    score.clamp(0.0, 1.0)
                } else {
                    0.0
                }
            })
            .reduce(|| 0.0f32, f32::max);

        if best >= threshold {
            MatchOutcome::Matched(best)
        } else {
            MatchOutcome::Unmatched(best)
        }
    }

    /// Best fused score for one template across all window offsets.
    fn score_template(&self, frame: &FramePlanes, template: &Template) -> f32 {
        let Some(tpl) = TemplatePlanes::build(template) else {
            // Fully transparent icon: nothing to compare against.
            return 0.0;
        };

        let mut best_sq_diff = f64::INFINITY;
        let mut best_corr = 0.0f64;

        for oy in 0..=(frame.h - tpl.h) {
            for ox in 0..=(frame.w - tpl.w) {
                let mut sq_diff = 0.0f64;
                let mut sum_f = 0.0f64;
                let mut sum_f2 = 0.0f64;
                let mut cov = 0.0f64;

                for ty in 0..tpl.h {
                    let trow = ty * tpl.w;
                    let frow = (oy + ty) * frame.w + ox;
                    for tx in 0..tpl.w {
                        let ti = trow + tx;
                        if !tpl.mask[ti] {
                            continue;
                        }
                        let fi = frow + tx;

                        let fp = frame.rgb[fi];
                        let tp = tpl.rgb[ti];
                        let dr = fp[0] - tp[0];
                        let dg = fp[1] - tp[1];
                        let db = fp[2] - tp[2];
                        sq_diff += (dr * dr + dg * dg + db * db) as f64;

                        let fl = frame.luma_norm[fi] as f64;
                        sum_f += fl;
                        sum_f2 += fl * fl;
                        // Template plane is zero-mean over the mask, so this
                        // sum is already the covariance numerator.
                        cov += fl * tpl.luma_centered[ti] as f64;
                    }
                }

                if sq_diff < best_sq_diff {
                    best_sq_diff = sq_diff;
                }

                let n = tpl.mask_count as f64;
                let var_f = sum_f2 - sum_f * sum_f / n;
                if var_f > VARIANCE_EPSILON && tpl.luma_var > VARIANCE_EPSILON {
                    let corr = cov / (var_f.sqrt() * tpl.luma_var.sqrt());
                    if corr > best_corr {
                        best_corr = corr;
                    }
                }
            }
        }

        let rms = (best_sq_diff / (tpl.mask_count as f64 * 3.0)).sqrt() as f32;
        let color = self.tuning.color_score(rms);
        let shape = best_corr.clamp(0.0, 1.0) as f32;

        self.tuning.fuse(color, shape)
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(FusionTuning::default())
    }
}

fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Frame pixel planes: raw RGB for the color channel, contrast-stretched
/// luma for the shape channel.
struct FramePlanes {
    w: usize,
    h: usize,
    rgb: Vec<[f32; 3]>,
    luma_norm: Vec<f32>,
}

impl FramePlanes {
    /// Returns `None` for a flat frame, which cannot be contrast-stretched.
    fn build(frame: &RgbaImage) -> Option<Self> {
        let w = frame.width() as usize;
        let h = frame.height() as usize;

        let mut rgb = Vec::with_capacity(w * h);
        let mut luma_plane = Vec::with_capacity(w * h);
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for pixel in frame.pixels() {
            let [r, g, b, _] = pixel.0.map(|c| c as f32);
            rgb.push([r, g, b]);
            let l = luma(r, g, b);
            min = min.min(l);
            max = max.max(l);
            luma_plane.push(l);
        }

        if max - min < f32::EPSILON {
            return None;
        }

        let scale = 255.0 / (max - min);
        let luma_norm = luma_plane.into_iter().map(|l| (l - min) * scale).collect();

        Some(Self {
            w,
            h,
            rgb,
            luma_norm,
        })
    }
}

/// Template pixel planes with the alpha mask and the NCC terms that do not
/// depend on the window offset.
struct TemplatePlanes {
    w: usize,
    h: usize,
    rgb: Vec<[f32; 3]>,
    mask: Vec<bool>,
    mask_count: usize,
    /// Contrast-stretched luma, mean-centered over the mask (zero outside).
    luma_centered: Vec<f32>,
    /// Sum of squared centered luma over the mask.
    luma_var: f64,
}

impl TemplatePlanes {
    /// Returns `None` when no pixel is opaque.
    fn build(template: &Template) -> Option<Self> {
        let w = template.width() as usize;
        let h = template.height() as usize;

        let mut rgb = Vec::with_capacity(w * h);
        let mut mask = Vec::with_capacity(w * h);
        let mut luma_plane = Vec::with_capacity(w * h);
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut mask_count = 0usize;

        for pixel in template.image.pixels() {
            let [r, g, b, a] = pixel.0.map(|c| c as f32);
            rgb.push([r, g, b]);
            let opaque = a > 0.0;
            mask.push(opaque);
            let l = luma(r, g, b);
            if opaque {
                mask_count += 1;
                min = min.min(l);
                max = max.max(l);
            }
            luma_plane.push(l);
        }

        if mask_count == 0 {
            return None;
        }

        // Stretch over the opaque range; a flat icon keeps luma_var at 0
        // and simply contributes no shape evidence.
        let range = max - min;
        let scale = if range < f32::EPSILON {
            0.0
        } else {
            255.0 / range
        };

        let stretched: Vec<f32> = luma_plane.iter().map(|l| (l - min) * scale).collect();
        let mean = mask
            .iter()
            .zip(&stretched)
            .filter(|(m, _)| **m)
            .map(|(_, l)| *l as f64)
            .sum::<f64>()
            / mask_count as f64;

        let mut luma_centered = vec![0.0f32; w * h];
        let mut luma_var = 0.0f64;
        for i in 0..w * h {
            if mask[i] {
                let centered = stretched[i] as f64 - mean;
                luma_centered[i] = centered as f32;
                luma_var += centered * centered;
            }
        }

        Some(Self {
            w,
            h,
            rgb,
            mask,
            mask_count,
            luma_centered,
            luma_var,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn engine() -> MatchEngine {
        MatchEngine::default()
    }

    /// Gray ramp: each column x gets value x*16, giving a 16x16 image with
    /// plenty of contrast.
    fn ramp_image() -> RgbaImage {
        RgbaImage::from_fn(16, 16, |x, _| {
            let v = (x * 16) as u8;
            Rgba([v, v, v, 255])
        })
    }

    fn checkerboard(on: Rgba<u8>, off: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_fn(16, 16, |x, y| if (x + y) % 2 == 0 { on } else { off })
    }

    fn template_from(image: RgbaImage) -> Template {
        Template::new("test", image)
    }

    #[test]
    fn test_identical_frame_scores_one() {
        let frame = ramp_image();
        let templates = vec![template_from(ramp_image())];

        let outcome = engine().evaluate(Some(&frame), None, &templates, 0.95);
        assert_eq!(outcome, MatchOutcome::Matched(1.0));
    }

    #[test]
    fn test_matched_iff_score_meets_threshold() {
        let frame = ramp_image();
        let templates = vec![template_from(ramp_image())];

        let low = engine().evaluate(Some(&frame), None, &templates, 0.5);
        let high = engine().evaluate(Some(&frame), None, &templates, 1.0);
        assert!(low.detected());
        // A perfect match still passes a threshold of exactly 1.0.
        assert!(high.detected());
    }

    #[test]
    fn test_missing_frame_uses_capture_reason() {
        let templates = vec![template_from(ramp_image())];

        let outcome = engine().evaluate(None, Some("display disconnected"), &templates, 0.9);
        assert_eq!(
            outcome,
            MatchOutcome::Degenerate("display disconnected".to_string())
        );

        let outcome = engine().evaluate(None, None, &templates, 0.9);
        assert_eq!(outcome.diagnostic(), Some(NO_FRAME));
        assert_eq!(outcome.score(), 0.0);
    }

    #[test]
    fn test_empty_template_group() {
        let frame = ramp_image();
        let outcome = engine().evaluate(Some(&frame), None, &[], 0.9);
        assert_eq!(outcome.diagnostic(), Some(NO_TEMPLATES));
    }

    #[test]
    fn test_oversized_templates_are_excluded() {
        let frame = ramp_image();
        let oversized = RgbaImage::from_fn(40, 40, |x, _| {
            let v = (x * 6) as u8;
            Rgba([v, v, v, 255])
        });

        // Only oversized: degenerate.
        let outcome = engine().evaluate(
            Some(&frame),
            None,
            &[template_from(oversized.clone())],
            0.9,
        );
        assert_eq!(outcome.diagnostic(), Some(SIZE_MISMATCH));

        // Oversized alongside an exact copy: the copy still scores.
        let templates = vec![template_from(oversized), template_from(ramp_image())];
        let outcome = engine().evaluate(Some(&frame), None, &templates, 0.9);
        assert_eq!(outcome, MatchOutcome::Matched(1.0));
    }

    #[test]
    fn test_flat_frame_is_low_contrast() {
        let frame = RgbaImage::from_pixel(16, 16, Rgba([120, 120, 120, 255]));
        let templates = vec![template_from(ramp_image())];

        let outcome = engine().evaluate(Some(&frame), None, &templates, 0.9);
        assert_eq!(outcome.diagnostic(), Some(LOW_CONTRAST));
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let frame = checkerboard(Rgba([200, 30, 30, 255]), Rgba([10, 10, 10, 255]));
        let templates = vec![template_from(ramp_image())];

        let first = engine().evaluate(Some(&frame), None, &templates, 0.9);
        let second = engine().evaluate(Some(&frame), None, &templates, 0.9);
        assert_eq!(first, second);
    }

    #[test]
    fn test_brightness_shift_rescued_by_shape() {
        // Frame is a linear remap of the template: the raw color difference
        // is far outside tolerance, but the stretched-luma correlation is
        // perfect, so the shape channel rescues it at the 0.95 discount.
        let template = ramp_image();
        let frame = RgbaImage::from_fn(16, 16, |x, _| {
            let v = ((x * 16) / 4 + 10) as u8;
            Rgba([v, v, v, 255])
        });

        let outcome = engine().evaluate(Some(&frame), None, &[template_from(template)], 0.9);
        assert!(outcome.detected(), "expected rescue, got {:?}", outcome);
        assert!((outcome.score() - 0.95).abs() < 5e-3);
    }

    #[test]
    fn test_color_evidence_outranks_shape_evidence() {
        // Same silhouette, different color: the color channel must rank the
        // true-color frame above the recolored one.
        let red = checkerboard(Rgba([200, 30, 30, 255]), Rgba([10, 10, 10, 255]));
        let green = checkerboard(Rgba([30, 200, 30, 255]), Rgba([10, 10, 10, 255]));
        let templates = vec![template_from(red.clone())];

        let same_color = engine().evaluate(Some(&red), None, &templates, 0.99);
        let recolored = engine().evaluate(Some(&green), None, &templates, 0.99);

        assert_eq!(same_color.score(), 1.0);
        assert!(recolored.score() < same_color.score());
        // The recolored frame is capped at the shape-rescue discount.
        assert!(recolored.score() <= 0.95 + 1e-6);
    }

    #[test]
    fn test_transparent_pixels_are_ignored() {
        // Opaque center matches the frame; the transparent border disagrees
        // wildly and must not count.
        let template_img = RgbaImage::from_fn(8, 8, |x, y| {
            let border = x == 0 || y == 0 || x == 7 || y == 7;
            if border {
                Rgba([255, 0, 255, 0])
            } else {
                let v = ((x + y) * 18) as u8;
                Rgba([v, v, v, 255])
            }
        });
        let frame = RgbaImage::from_fn(8, 8, |x, y| {
            let v = ((x + y) * 18) as u8;
            Rgba([v, v, v, 255])
        });

        let outcome = engine().evaluate(Some(&frame), None, &[template_from(template_img)], 0.95);
        assert_eq!(outcome, MatchOutcome::Matched(1.0));
    }

    #[test]
    fn test_fully_transparent_template_contributes_zero() {
        let transparent = RgbaImage::from_pixel(8, 8, Rgba([90, 90, 90, 0]));
        let frame = ramp_image();

        let outcome = engine().evaluate(Some(&frame), None, &[template_from(transparent)], 0.5);
        assert_eq!(outcome, MatchOutcome::Unmatched(0.0));
    }

    #[test]
    fn test_sliding_search_finds_offset_icon() {
        let icon = RgbaImage::from_fn(6, 6, |x, y| {
            let v = ((x * 31 + y * 47) % 251) as u8;
            Rgba([v, v.wrapping_mul(3), v.wrapping_mul(7), 255])
        });

        // Busy background with the icon pasted at (9, 5).
        let mut frame = RgbaImage::from_fn(24, 24, |x, y| {
            let v = ((x * 13 + y * 29) % 255) as u8;
            Rgba([v, 255 - v, v / 2, 255])
        });
        image::imageops::overlay(&mut frame, &icon, 9, 5);

        let outcome = engine().evaluate(Some(&frame), None, &[template_from(icon)], 0.95);
        assert_eq!(outcome, MatchOutcome::Matched(1.0));
    }
}
