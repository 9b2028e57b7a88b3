//! Deterministic augmentation on raw CHW buffers
//!
//! Two recipes:
//! - [`Augmenter`]: classifier-training augmentation (pad-crop shift plus
//!   horizontal flip), matching the usual CIFAR recipe.
//! - [`TwoViewTransform`]: the contrastive recipe (random resized crop,
//!   flip, color jitter, random grayscale) producing two independent views
//!   of the same image.
//!
//! All randomness flows through the caller's seeded RNG so experiment runs
//! are reproducible.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Classifier-training augmentation configuration
#[derive(Debug, Clone)]
pub struct AugmentConfig {
    /// Probability of a horizontal flip
    pub hflip_prob: f32,
    /// Zero padding used for the random crop shift (0 disables the crop)
    pub crop_padding: usize,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            hflip_prob: 0.5,
            crop_padding: 4,
        }
    }
}

/// Applies the classifier-training recipe to CHW buffers
#[derive(Debug, Clone)]
pub struct Augmenter {
    config: AugmentConfig,
    side: usize,
}

impl Augmenter {
    pub fn new(config: AugmentConfig, side: usize) -> Self {
        Self { config, side }
    }

    pub fn with_defaults(side: usize) -> Self {
        Self::new(AugmentConfig::default(), side)
    }

    /// Augment one image in place
    pub fn apply(&self, image: &mut Vec<f32>, rng: &mut ChaCha8Rng) {
        if self.config.crop_padding > 0 {
            let pad = self.config.crop_padding as i32;
            let dx = rng.gen_range(-pad..=pad);
            let dy = rng.gen_range(-pad..=pad);
            shift(image, self.side, dx, dy);
        }

        if rng.gen::<f32>() < self.config.hflip_prob {
            hflip(image, self.side);
        }
    }
}

/// SimCLR-style two-view transform configuration
#[derive(Debug, Clone)]
pub struct TwoViewConfig {
    /// Color jitter strength `s`; factors are drawn from [1 - 0.8s, 1 + 0.8s]
    pub jitter_strength: f32,
    /// Probability of applying color jitter
    pub jitter_prob: f32,
    /// Probability of collapsing to grayscale
    pub grayscale_prob: f32,
    /// Area range for the random resized crop
    pub crop_scale: (f32, f32),
}

impl Default for TwoViewConfig {
    fn default() -> Self {
        Self {
            jitter_strength: 1.0,
            jitter_prob: 0.8,
            grayscale_prob: 0.2,
            crop_scale: (0.2, 1.0),
        }
    }
}

/// Produces two independently augmented views per image
#[derive(Debug, Clone)]
pub struct TwoViewTransform {
    config: TwoViewConfig,
    side: usize,
}

impl TwoViewTransform {
    pub fn new(config: TwoViewConfig, side: usize) -> Self {
        Self { config, side }
    }

    pub fn with_defaults(side: usize) -> Self {
        Self::new(TwoViewConfig::default(), side)
    }

    /// Generate a pair of views from one image
    pub fn apply(&self, image: &[f32], rng: &mut ChaCha8Rng) -> (Vec<f32>, Vec<f32>) {
        (self.view(image, rng), self.view(image, rng))
    }

    fn view(&self, image: &[f32], rng: &mut ChaCha8Rng) -> Vec<f32> {
        let mut out = random_resized_crop(image, self.side, self.config.crop_scale, rng);

        if rng.gen::<f32>() < 0.5 {
            hflip(&mut out, self.side);
        }

        let s = 0.8 * self.config.jitter_strength;
        if s > 0.0 && rng.gen::<f32>() < self.config.jitter_prob {
            let lo = (1.0 - s).max(0.0);
            let hi = 1.0 + s;
            brightness(&mut out, rng.gen_range(lo..hi));
            contrast(&mut out, rng.gen_range(lo..hi));
            saturation(&mut out, rng.gen_range(lo..hi));
        }

        if rng.gen::<f32>() < self.config.grayscale_prob {
            grayscale(&mut out, self.side);
        }

        out
    }
}

/// Horizontal flip in place
pub fn hflip(image: &mut [f32], side: usize) {
    for c in 0..3 {
        for y in 0..side {
            let row = c * side * side + y * side;
            image[row..row + side].reverse();
        }
    }
}

/// Shift by (dx, dy) with zero fill, equivalent to pad-then-crop
pub fn shift(image: &mut Vec<f32>, side: usize, dx: i32, dy: i32) {
    let mut out = vec![0.0f32; image.len()];
    for c in 0..3 {
        let plane = c * side * side;
        for y in 0..side {
            let sy = y as i32 - dy;
            if sy < 0 || sy >= side as i32 {
                continue;
            }
            for x in 0..side {
                let sx = x as i32 - dx;
                if sx < 0 || sx >= side as i32 {
                    continue;
                }
                out[plane + y * side + x] = image[plane + sy as usize * side + sx as usize];
            }
        }
    }
    *image = out;
}

/// Scale pixel values, clamped to [0, 1]
pub fn brightness(image: &mut [f32], factor: f32) {
    for v in image.iter_mut() {
        *v = (*v * factor).clamp(0.0, 1.0);
    }
}

/// Scale distance from the per-image mean, clamped to [0, 1]
pub fn contrast(image: &mut [f32], factor: f32) {
    let mean = image.iter().sum::<f32>() / image.len() as f32;
    for v in image.iter_mut() {
        *v = ((*v - mean) * factor + mean).clamp(0.0, 1.0);
    }
}

/// Blend each pixel with its luma, clamped to [0, 1]
pub fn saturation(image: &mut [f32], factor: f32) {
    let plane = image.len() / 3;
    for i in 0..plane {
        let (r, g, b) = (image[i], image[plane + i], image[2 * plane + i]);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        image[i] = (luma + (r - luma) * factor).clamp(0.0, 1.0);
        image[plane + i] = (luma + (g - luma) * factor).clamp(0.0, 1.0);
        image[2 * plane + i] = (luma + (b - luma) * factor).clamp(0.0, 1.0);
    }
}

/// Replace all channels with luma
pub fn grayscale(image: &mut [f32], side: usize) {
    let plane = side * side;
    for i in 0..plane {
        let luma = 0.299 * image[i] + 0.587 * image[plane + i] + 0.114 * image[2 * plane + i];
        image[i] = luma;
        image[plane + i] = luma;
        image[2 * plane + i] = luma;
    }
}

/// Random resized crop: sample a sub-region by area scale and aspect ratio,
/// then resize back to `side` with bilinear interpolation.
pub fn random_resized_crop(
    image: &[f32],
    side: usize,
    scale: (f32, f32),
    rng: &mut ChaCha8Rng,
) -> Vec<f32> {
    let area = (side * side) as f32;

    // A few attempts to land a valid region, then fall back to full frame.
    for _ in 0..10 {
        let target_area = area * rng.gen_range(scale.0..=scale.1);
        let aspect = rng.gen_range(0.75f32..=4.0 / 3.0);

        let crop_w = (target_area * aspect).sqrt().round() as usize;
        let crop_h = (target_area / aspect).sqrt().round() as usize;

        if crop_w == 0 || crop_h == 0 || crop_w > side || crop_h > side {
            continue;
        }

        let x0 = rng.gen_range(0..=side - crop_w);
        let y0 = rng.gen_range(0..=side - crop_h);
        return resize_region(image, side, x0, y0, crop_w, crop_h, side);
    }

    image.to_vec()
}

/// Bilinear resize of the region (x0, y0, w, h) to an `out_side` square
fn resize_region(
    image: &[f32],
    side: usize,
    x0: usize,
    y0: usize,
    w: usize,
    h: usize,
    out_side: usize,
) -> Vec<f32> {
    let mut out = vec![0.0f32; 3 * out_side * out_side];
    let sx = w as f32 / out_side as f32;
    let sy = h as f32 / out_side as f32;

    for c in 0..3 {
        let plane = c * side * side;
        let out_plane = c * out_side * out_side;
        for oy in 0..out_side {
            let fy = (oy as f32 + 0.5) * sy - 0.5 + y0 as f32;
            let fy = fy.clamp(0.0, (side - 1) as f32);
            let y_lo = fy.floor() as usize;
            let y_hi = (y_lo + 1).min(side - 1);
            let wy = fy - y_lo as f32;

            for ox in 0..out_side {
                let fx = (ox as f32 + 0.5) * sx - 0.5 + x0 as f32;
                let fx = fx.clamp(0.0, (side - 1) as f32);
                let x_lo = fx.floor() as usize;
                let x_hi = (x_lo + 1).min(side - 1);
                let wx = fx - x_lo as f32;

                let top = image[plane + y_lo * side + x_lo] * (1.0 - wx)
                    + image[plane + y_lo * side + x_hi] * wx;
                let bottom = image[plane + y_hi * side + x_lo] * (1.0 - wx)
                    + image[plane + y_hi * side + x_hi] * wx;
                out[out_plane + oy * out_side + ox] = top * (1.0 - wy) + bottom * wy;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn gradient_image(side: usize) -> Vec<f32> {
        let mut image = vec![0.0f32; 3 * side * side];
        for c in 0..3 {
            for y in 0..side {
                for x in 0..side {
                    image[c * side * side + y * side + x] = x as f32 / (side - 1) as f32;
                }
            }
        }
        image
    }

    #[test]
    fn test_hflip_reverses_rows() {
        let side = 4;
        let mut image = gradient_image(side);
        hflip(&mut image, side);

        // Leftmost pixel now carries the old rightmost value.
        assert!((image[0] - 1.0).abs() < 1e-6);
        assert!(image[3].abs() < 1e-6);
    }

    #[test]
    fn test_hflip_involution() {
        let side = 4;
        let original = gradient_image(side);
        let mut image = original.clone();
        hflip(&mut image, side);
        hflip(&mut image, side);
        assert_eq!(image, original);
    }

    #[test]
    fn test_shift_fills_zero() {
        let side = 4;
        let mut image = vec![1.0f32; 3 * side * side];
        shift(&mut image, side, 1, 0);

        // First column zero-filled, the rest preserved.
        assert_eq!(image[0], 0.0);
        assert_eq!(image[1], 1.0);
    }

    #[test]
    fn test_shift_zero_is_identity() {
        let side = 4;
        let original = gradient_image(side);
        let mut image = original.clone();
        shift(&mut image, side, 0, 0);
        assert_eq!(image, original);
    }

    #[test]
    fn test_brightness_clamps() {
        let mut image = vec![0.9f32; 12];
        brightness(&mut image, 2.0);
        assert!(image.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_grayscale_equalizes_channels() {
        let side = 2;
        let mut image = vec![0.0f32; 12];
        for i in 0..4 {
            image[i] = 1.0; // red only
        }
        grayscale(&mut image, side);

        let plane = side * side;
        for i in 0..plane {
            assert!((image[i] - image[plane + i]).abs() < 1e-6);
            assert!((image[i] - image[2 * plane + i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_saturation_identity_at_one() {
        let original = gradient_image(4);
        let mut image = original.clone();
        saturation(&mut image, 1.0);
        for (a, b) in image.iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_random_resized_crop_shape_and_range() {
        let side = 8;
        let image = gradient_image(side);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let out = random_resized_crop(&image, side, (0.2, 1.0), &mut rng);
        assert_eq!(out.len(), 3 * side * side);
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_two_views_differ() {
        let side = 8;
        let image = gradient_image(side);
        let transform = TwoViewTransform::with_defaults(side);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let (a, b) = transform.apply(&image, &mut rng);
        assert_eq!(a.len(), image.len());
        assert_eq!(b.len(), image.len());
        assert_ne!(a, b);
    }

    #[test]
    fn test_two_views_reproducible() {
        let side = 8;
        let image = gradient_image(side);
        let transform = TwoViewTransform::with_defaults(side);

        let mut rng1 = ChaCha8Rng::seed_from_u64(42);
        let mut rng2 = ChaCha8Rng::seed_from_u64(42);

        assert_eq!(
            transform.apply(&image, &mut rng1),
            transform.apply(&image, &mut rng2)
        );
    }

    #[test]
    fn test_augmenter_preserves_length() {
        let side = 8;
        let mut image = gradient_image(side);
        let augmenter = Augmenter::with_defaults(side);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        augmenter.apply(&mut image, &mut rng);
        assert_eq!(image.len(), 3 * side * side);
    }
}
