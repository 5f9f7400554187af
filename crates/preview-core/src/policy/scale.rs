//! Image downscale planning
//!
//! Computes the resolution an oversized source image should be decoded at.
//! Two independent clamps apply: the longest side (bounds panoramas) and the
//! total pixel count (bounds ordinary high-resolution images). The smaller
//! resulting scale factor wins.

use image::imageops::FilterType;
use image::DynamicImage;

/// Global ceilings applied to every render plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleLimits {
    pub max_side_pixels: u32,
    pub max_total_pixels: u64,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self {
            max_side_pixels: 32_767,
            max_total_pixels: 24_000_000,
        }
    }
}

/// Target decode resolution for one request. Never cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPlan {
    /// In (0, 1]
    pub scale_factor: f64,
    pub target_width: u32,
    pub target_height: u32,
    /// Longest side to request from the decoder, within [1, max side]
    pub max_pixel_size: u32,
}

impl RenderPlan {
    pub fn total_pixels(&self) -> u64 {
        u64::from(self.target_width) * u64::from(self.target_height)
    }

    /// Downscale an already decoded image so its longest side fits
    /// `max_pixel_size`. Smaller images are returned unchanged.
    pub fn resize(&self, image: &DynamicImage) -> DynamicImage {
        if image.width().max(image.height()) <= self.max_pixel_size {
            return image.clone();
        }
        image.resize(self.max_pixel_size, self.max_pixel_size, FilterType::Triangle)
    }
}

/// Plan with the default ceilings
pub fn plan(source_width: f64, source_height: f64, ideal_width: f64) -> RenderPlan {
    plan_with_limits(source_width, source_height, ideal_width, ScaleLimits::default())
}

pub fn plan_with_limits(
    source_width: f64,
    source_height: f64,
    ideal_width: f64,
    limits: ScaleLimits,
) -> RenderPlan {
    let max_side_pixels = limits.max_side_pixels.max(1);
    let max_side = f64::from(max_side_pixels);
    let max_total = limits.max_total_pixels.max(1) as f64;

    if !(is_positive(source_width) && is_positive(source_height) && is_positive(ideal_width)) {
        return degenerate_plan(ideal_width, max_side_pixels);
    }

    let ideal_height = source_height * ideal_width / source_width;
    let ideal_total = ideal_width * ideal_height;
    if !(ideal_height.is_finite() && ideal_total.is_finite()) {
        return extreme_plan(source_width, source_height, ideal_width, limits);
    }

    let mut scale_factor: f64 = 1.0;

    let ideal_longest = ideal_width.max(ideal_height);
    if ideal_longest > max_side {
        scale_factor = scale_factor.min(max_side / ideal_longest);
    }

    if ideal_total > max_total {
        scale_factor = scale_factor.min((max_total / ideal_total).sqrt());
    }

    finish_plan(
        scale_factor,
        ideal_width * scale_factor,
        ideal_height * scale_factor,
        max_side_pixels,
    )
}

/// Same clamps in log space, for inputs whose ideal size overflows `f64`
fn extreme_plan(
    source_width: f64,
    source_height: f64,
    ideal_width: f64,
    limits: ScaleLimits,
) -> RenderPlan {
    let max_side_pixels = limits.max_side_pixels.max(1);
    let ln_width = ideal_width.ln();
    let ln_height = source_height.ln() + ideal_width.ln() - source_width.ln();

    let ln_side = f64::from(max_side_pixels).ln() - ln_width.max(ln_height);
    let ln_total = 0.5 * ((limits.max_total_pixels.max(1) as f64).ln() - ln_width - ln_height);
    let ln_scale = ln_side.min(ln_total).min(0.0);

    finish_plan(
        ln_scale.exp(),
        (ln_width + ln_scale).exp(),
        (ln_height + ln_scale).exp(),
        max_side_pixels,
    )
}

fn finish_plan(scale_factor: f64, width: f64, height: f64, max_side_pixels: u32) -> RenderPlan {
    let target_width = floor_pixels(width).min(max_side_pixels);
    let target_height = floor_pixels(height).min(max_side_pixels);

    RenderPlan {
        // Underflow must not leave (0, 1]
        scale_factor: scale_factor.max(f64::MIN_POSITIVE),
        target_width,
        target_height,
        max_pixel_size: target_width.max(target_height),
    }
}

/// Fallback for unusable input: a square plan sized by the requested width
fn degenerate_plan(ideal_width: f64, max_side_pixels: u32) -> RenderPlan {
    let side = floor_pixels(ideal_width).clamp(1, max_side_pixels);
    RenderPlan {
        scale_factor: 1.0,
        target_width: side,
        target_height: side,
        max_pixel_size: side,
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Floor to whole pixels, at least one. NaN and negatives become 1.
fn floor_pixels(value: f64) -> u32 {
    (value.floor() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_image_is_not_scaled() {
        let plan = plan(800.0, 600.0, 400.0);
        assert_eq!(plan.scale_factor, 1.0);
        assert_eq!((plan.target_width, plan.target_height), (400, 300));
        assert_eq!(plan.max_pixel_size, 400);
    }

    #[test]
    fn test_large_square_stays_within_both_ceilings() {
        let plan = plan(10_000.0, 10_000.0, 4_000.0);
        assert!(plan.total_pixels() <= 24_000_000);
        assert!(plan.target_width.max(plan.target_height) <= 32_767);
        assert!(plan.scale_factor <= 1.0);
    }

    #[test]
    fn test_total_pixel_clamp_dominates_for_high_resolution() {
        let plan = plan(10_000.0, 10_000.0, 6_000.0);
        assert!(plan.scale_factor < 1.0);
        assert!(plan.total_pixels() <= 24_000_000);
        // sqrt(24M / 36M) of 6000 is ~4898
        assert_eq!(plan.target_width, 4_898);
        assert_eq!(plan.target_width, plan.target_height);
    }

    #[test]
    fn test_side_clamp_dominates_for_panorama() {
        let plan = plan(100_000.0, 100.0, 50_000.0);
        assert!(plan.target_width.max(plan.target_height) <= 32_767);
        assert!(plan.total_pixels() < 24_000_000);
        assert_eq!(plan.max_pixel_size, plan.target_width);
        assert!((plan.scale_factor - 32_767.0 / 50_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_smaller_factor_wins_when_both_clamps_apply() {
        let limits = ScaleLimits {
            max_side_pixels: 1_000,
            max_total_pixels: 100_000,
        };
        let plan = plan_with_limits(4_000.0, 2_000.0, 2_000.0, limits);
        // side clamp: 1000 / 2000 = 0.5; area clamp: sqrt(100k / 2M) ~ 0.2236
        assert!((plan.scale_factor - (0.05f64).sqrt()).abs() < 1e-9);
        assert!(plan.total_pixels() <= 100_000);
    }

    #[test]
    fn test_tiny_aspect_floors_to_one_pixel() {
        let plan = plan(100_000.0, 1.0, 10.0);
        assert_eq!(plan.target_width, 10);
        assert_eq!(plan.target_height, 1);
    }

    #[test]
    fn test_non_positive_inputs_yield_degenerate_plan() {
        for (w, h, ideal) in [(0.0, 100.0, 300.0), (100.0, -1.0, 300.0), (f64::NAN, 5.0, 300.0)] {
            let plan = plan(w, h, ideal);
            assert_eq!(plan.scale_factor, 1.0);
            assert_eq!(plan.max_pixel_size, 300);
            assert_eq!((plan.target_width, plan.target_height), (300, 300));
        }

        let plan = plan(100.0, 100.0, 0.0);
        assert_eq!((plan.target_width, plan.target_height), (1, 1));
        assert_eq!(plan.max_pixel_size, 1);
    }

    #[test]
    fn test_degenerate_plan_respects_side_ceiling() {
        let plan = plan(0.0, 0.0, 1.0e9);
        assert_eq!(plan.max_pixel_size, 32_767);
    }

    #[test]
    fn test_extreme_aspect_ratios_keep_a_positive_factor() {
        let tall = plan(1.0, 1.0e200, 1.0e200);
        assert!(tall.scale_factor > 0.0 && tall.scale_factor <= 1.0);
        assert_eq!(tall.target_width, 1);
        assert!((32_766..=32_767).contains(&tall.target_height));
        assert_eq!(tall.max_pixel_size, tall.target_height);

        let wide = plan(1.0e300, 1.0, 1.0e300);
        assert!(wide.scale_factor > 0.0);
        assert!((32_766..=32_767).contains(&wide.target_width));
        assert_eq!(wide.target_height, 1);

        let huge = plan(1.0e200, 1.0e200, 1.0e200);
        assert!(huge.scale_factor > 0.0);
        assert!(huge.total_pixels() <= 24_000_000);
        assert_eq!(huge.target_width, huge.target_height);
        assert!(huge.max_pixel_size > 1);
    }

    #[test]
    fn test_resize_downscales_to_max_pixel_size() {
        let image = DynamicImage::new_rgba8(400, 200);
        let plan = plan_with_limits(
            400.0,
            200.0,
            400.0,
            ScaleLimits {
                max_side_pixels: 100,
                max_total_pixels: u64::MAX,
            },
        );
        let resized = plan.resize(&image);
        assert_eq!((resized.width(), resized.height()), (100, 50));

        let untouched = plan.resize(&DynamicImage::new_rgba8(80, 40));
        assert_eq!((untouched.width(), untouched.height()), (80, 40));
    }
}
