//! # Per-pixel Gaussian-mixture background model
//!
//! Each pixel carries a small set of weighted Gaussian modes over intensity.
//! Modes that keep matching incoming samples accumulate weight and become
//! background; samples matching no mode, or only low-weight modes, are
//! foreground. This mirrors the classic MOG family of subtractors with a
//! `history`-derived learning rate and an optional shadow test that keeps a
//! darkened background pixel out of the foreground mask.

use crate::config::BackgroundConfig;
use image::{GrayImage, Luma};

/// One Gaussian mode of a pixel's mixture.
#[derive(Clone, Copy, Debug, Default)]
struct Mode {
    weight: f32,
    mean: f32,
    variance: f32,
}

/// Running background model. Sized lazily on the first frame.
pub struct MixtureBackground {
    config: BackgroundConfig,
    dims: Option<(u32, u32)>,
    modes: Vec<Mode>,
}

impl MixtureBackground {
    pub fn new(config: BackgroundConfig) -> Self {
        Self {
            config,
            dims: None,
            modes: Vec::new(),
        }
    }

    /// Drop all learned modes. The next frame rebuilds the model from scratch.
    pub fn reset(&mut self) {
        self.dims = None;
        self.modes.clear();
    }

    /// True if the model has not yet seen a frame since creation or reset.
    pub fn is_fresh(&self) -> bool {
        self.dims.is_none()
    }

    fn ensure_dims(&mut self, width: u32, height: u32) {
        if self.dims != Some((width, height)) {
            self.dims = Some((width, height));
            self.modes =
                vec![Mode::default(); (width * height) as usize * self.config.modes];
        }
    }

    /// Update the model with a grayscale frame and return the 0/255
    /// foreground mask.
    pub fn apply(&mut self, gray: &GrayImage) -> GrayImage {
        self.ensure_dims(gray.width(), gray.height());

        let k = self.config.modes;
        let alpha = 1.0 / self.config.history.max(1.0);
        let match_sq = self.config.match_sigma * self.config.match_sigma;

        let mut mask = GrayImage::new(gray.width(), gray.height());

        for (i, (dst, src)) in mask.pixels_mut().zip(gray.pixels()).enumerate() {
            let x = src.0[0] as f32;
            let modes = &mut self.modes[i * k..(i + 1) * k];

            let foreground = update_pixel(modes, x, alpha, match_sq, &self.config);
            *dst = Luma([if foreground { 255 } else { 0 }]);
        }

        mask
    }
}

/// Update one pixel's mixture in place and classify the sample.
fn update_pixel(
    modes: &mut [Mode],
    x: f32,
    alpha: f32,
    match_sq: f32,
    config: &BackgroundConfig,
) -> bool {
    // Match against the existing modes, strongest first (the slice is kept
    // sorted by weight).
    let mut matched = None;
    for (idx, mode) in modes.iter().enumerate() {
        if mode.weight <= 0.0 {
            continue;
        }
        let d = x - mode.mean;
        if d * d < match_sq * mode.variance {
            matched = Some(idx);
            break;
        }
    }

    match matched {
        Some(idx) => {
            for (j, mode) in modes.iter_mut().enumerate() {
                if j == idx {
                    mode.weight += alpha * (1.0 - mode.weight);
                    let rho = (alpha / mode.weight.max(alpha)).min(1.0);
                    let d = x - mode.mean;
                    mode.mean += rho * d;
                    mode.variance = (mode.variance + rho * (d * d - mode.variance))
                        .clamp(config.min_variance, config.max_variance);
                } else {
                    mode.weight *= 1.0 - alpha;
                }
            }
        }
        None => {
            // Replace the weakest mode with a fresh one centred on the sample.
            let weakest = modes
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.weight.total_cmp(&b.weight))
                .map(|(j, _)| j)
                .unwrap_or(0);
            modes[weakest] = Mode {
                weight: alpha,
                mean: x,
                variance: config.initial_variance,
            };
        }
    }

    normalise_and_sort(modes);

    // Modes covering the leading `background_ratio` of total weight are
    // considered background.
    let background_modes = {
        let mut cum = 0.0;
        let mut n = 0;
        for mode in modes.iter() {
            if mode.weight <= 0.0 {
                break;
            }
            n += 1;
            cum += mode.weight;
            if cum > config.background_ratio {
                break;
            }
        }
        n
    };

    let foreground = match matched {
        Some(_) => {
            // `matched` indexed the pre-sort order; re-test by value.
            let matches_background = modes[..background_modes]
                .iter()
                .any(|m| (x - m.mean).powi(2) < match_sq * m.variance);
            !matches_background
        }
        None => true,
    };

    if foreground && config.detect_shadows {
        // A darkened version of a background mean is shadow, not an object.
        for mode in modes[..background_modes].iter() {
            if x < mode.mean && x > config.shadow_ratio * mode.mean {
                return false;
            }
        }
    }

    foreground
}

fn normalise_and_sort(modes: &mut [Mode]) {
    let total: f32 = modes.iter().map(|m| m.weight).sum();
    if total > 0.0 {
        for mode in modes.iter_mut() {
            mode.weight /= total;
        }
    }
    modes.sort_by(|a, b| b.weight.total_cmp(&a.weight));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackgroundConfig;

    fn trained_model(frames: usize, value: u8) -> MixtureBackground {
        let mut model = MixtureBackground::new(BackgroundConfig::default());
        let frame = GrayImage::from_pixel(8, 8, Luma([value]));
        for _ in 0..frames {
            model.apply(&frame);
        }
        model
    }

    #[test]
    fn static_scene_becomes_background() {
        let mut model = trained_model(50, 60);
        let mask = model.apply(&GrayImage::from_pixel(8, 8, Luma([60])));
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn novel_intensity_is_foreground() {
        let mut model = trained_model(50, 60);
        let mask = model.apply(&GrayImage::from_pixel(8, 8, Luma([220])));
        assert!(mask.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn shadow_is_suppressed() {
        let mut model = trained_model(50, 200);
        // 120 is well outside the matched mode but above half the mean.
        let mask = model.apply(&GrayImage::from_pixel(8, 8, Luma([120])));
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn reset_forgets_the_scene() {
        let mut model = trained_model(50, 60);
        model.reset();
        assert!(model.is_fresh());
        // First frame after reset seeds brand new modes.
        let mask = model.apply(&GrayImage::from_pixel(8, 8, Luma([60])));
        assert!(mask.pixels().all(|p| p.0[0] == 255));
    }
}
