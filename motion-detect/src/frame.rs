//! # Frame conversion helpers

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Convert a colour frame to grayscale using BT.601 luma weights.
pub fn to_grayscale(frame: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(frame.width(), frame.height());

    for (dst, src) in gray.pixels_mut().zip(frame.pixels()) {
        let Rgb([r, g, b]) = *src;
        let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        *dst = Luma([y.round().clamp(0.0, 255.0) as u8]);
    }

    gray
}

/// Grayscale conversion followed by Gaussian smoothing.
///
/// This is the shared preprocessing step of the differencing and flow based
/// methods. Smoothing suppresses sensor noise that would otherwise survive the
/// binarisation cutoffs.
pub fn preprocess(frame: &RgbImage, sigma: f32) -> GrayImage {
    let gray = to_grayscale(frame);
    if sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&gray, sigma)
    } else {
        gray
    }
}

/// Per-pixel absolute difference binarised at `cutoff`.
///
/// Produces a 0/255 mask. Both images must have equal dimensions.
pub fn absdiff_mask(a: &GrayImage, b: &GrayImage, cutoff: u8) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());

    let mut mask = GrayImage::new(a.width(), a.height());
    for ((dst, pa), pb) in mask.pixels_mut().zip(a.pixels()).zip(b.pixels()) {
        let diff = pa.0[0].abs_diff(pb.0[0]);
        *dst = Luma([if diff > cutoff { 255 } else { 0 }]);
    }

    mask
}

/// Promote a grayscale mask to RGB so every visualisation shares one type.
pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    let mut rgb = RgbImage::new(gray.width(), gray.height());
    for (dst, src) in rgb.pixels_mut().zip(gray.pixels()) {
        let v = src.0[0];
        *dst = Rgb([v, v, v]);
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_weights() {
        let mut frame = RgbImage::new(2, 1);
        frame.put_pixel(0, 0, Rgb([255, 255, 255]));
        frame.put_pixel(1, 0, Rgb([255, 0, 0]));

        let gray = to_grayscale(&frame);
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(1, 0).0[0], 76); // 0.299 * 255
    }

    #[test]
    fn absdiff_cutoff() {
        let a = GrayImage::from_pixel(3, 3, Luma([100]));
        let mut b = GrayImage::from_pixel(3, 3, Luma([100]));
        b.put_pixel(1, 1, Luma([180]));

        let mask = absdiff_mask(&a, &b, 30);
        assert_eq!(mask.get_pixel(1, 1).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
    }
}
