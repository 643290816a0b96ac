//! # Synthetic frames and frame sources
//!
//! Deterministic scenes used by the test-suite and by demos that have no
//! camera: flat fields, high-contrast rectangles, checkerboards and a source
//! that slides a rectangle across the frame.

use crate::source::FrameSource;
use anyhow::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Uniform colour frame.
pub fn flat_frame(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

/// Flat frame with one filled rectangle of a different intensity.
pub fn frame_with_rect(
    width: u32,
    height: u32,
    x: u32,
    y: u32,
    rect_w: u32,
    rect_h: u32,
    background: u8,
    foreground: u8,
) -> RgbImage {
    let mut frame = flat_frame(width, height, background);
    for yy in y..(y + rect_h).min(height) {
        for xx in x..(x + rect_w).min(width) {
            frame.put_pixel(xx, yy, Rgb([foreground, foreground, foreground]));
        }
    }
    frame
}

/// Grayscale checkerboard, useful wherever texture is needed.
pub fn checkerboard(width: u32, height: u32, cell: u32) -> GrayImage {
    let mut gray = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let on = ((x / cell) + (y / cell)) % 2 == 0;
            gray.put_pixel(x, y, Luma([if on { 230 } else { 25 }]));
        }
    }
    gray
}

/// Colour version of [`checkerboard`].
pub fn checkerboard_frame(width: u32, height: u32, cell: u32) -> RgbImage {
    crate::frame::gray_to_rgb(&checkerboard(width, height, cell))
}

/// Translate a grayscale image by whole pixels, clamping at the border.
pub fn shifted(gray: &GrayImage, dx: i32, dy: i32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let sx = (x - dx).clamp(0, w as i32 - 1) as u32;
            let sy = (y - dy).clamp(0, h as i32 - 1) as u32;
            out.put_pixel(x as u32, y as u32, *gray.get_pixel(sx, sy));
        }
    }
    out
}

/// Translate a colour frame by whole pixels, clamping at the border.
pub fn shifted_frame(frame: &RgbImage, dx: i32, dy: i32) -> RgbImage {
    let (w, h) = frame.dimensions();
    let mut out = RgbImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let sx = (x - dx).clamp(0, w as i32 - 1) as u32;
            let sy = (y - dy).clamp(0, h as i32 - 1) as u32;
            out.put_pixel(x as u32, y as u32, *frame.get_pixel(sx, sy));
        }
    }
    out
}

/// Frame source sliding a bright rectangle across a dark background.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    rect: (u32, u32),
    position: (f32, f32),
    velocity: (f32, f32),
    remaining: usize,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, frames: usize) -> Self {
        Self {
            width,
            height,
            rect: (width / 8, height / 8),
            position: (width as f32 / 4.0, height as f32 / 2.0),
            velocity: (2.0, 0.5),
            remaining: frames,
        }
    }

    pub fn with_velocity(mut self, vx: f32, vy: f32) -> Self {
        self.velocity = (vx, vy);
        self
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;

        let frame = frame_with_rect(
            self.width,
            self.height,
            self.position.0 as u32 % self.width,
            self.position.1 as u32 % self.height,
            self.rect.0,
            self.rect.1,
            20,
            235,
        );

        self.position.0 += self.velocity.0;
        self.position.1 += self.velocity.1;

        Ok(Some(frame))
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ends_after_budget() {
        let mut source = SyntheticSource::new(64, 64, 2);
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn rectangle_moves_between_frames() {
        let mut source = SyntheticSource::new(64, 64, 2).with_velocity(4.0, 0.0);
        let a = source.next_frame().unwrap().unwrap();
        let b = source.next_frame().unwrap().unwrap();
        assert_ne!(a.as_raw(), b.as_raw());
    }
}
