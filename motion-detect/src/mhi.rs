//! # Motion-history buffer
//!
//! A per-pixel recency map: cells under the current motion mask are stamped
//! with a monotonic frame counter, all other cells decay toward zero by a
//! fixed rate per frame. Normalising against a duration window turns the
//! buffer into a displayable image where recent motion is bright.

use image::{GrayImage, Luma};

/// Real-valued motion recency buffer plus its frame counter.
pub struct MotionHistory {
    width: u32,
    height: u32,
    values: Vec<f32>,
    timestamp: u32,
}

impl MotionHistory {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; (width * height) as usize],
            timestamp: 0,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Raw recency value at a cell.
    pub fn value(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    /// Advance one frame: stamp cells under the 0/255 `mask` with the new
    /// timestamp and decay every other cell by `decay_rate`, clamped at zero.
    pub fn update(&mut self, mask: &GrayImage, decay_rate: f32) {
        debug_assert_eq!(mask.dimensions(), (self.width, self.height));

        self.timestamp += 1;
        let stamp = self.timestamp as f32;

        for (cell, px) in self.values.iter_mut().zip(mask.pixels()) {
            if px.0[0] > 0 {
                *cell = stamp;
            } else {
                *cell = (*cell - decay_rate).max(0.0);
            }
        }
    }

    /// Render the buffer into `0..=255` intensities scaled by the history
    /// `duration` window (in frames).
    pub fn normalized(&self, duration: f32) -> GrayImage {
        let scale = 255.0 / duration.max(1.0);
        let floor = self.timestamp as f32 - duration;

        let mut out = GrayImage::new(self.width, self.height);
        for (dst, &cell) in out.pixels_mut().zip(self.values.iter()) {
            let v = ((cell - floor.max(0.0)) * scale).clamp(0.0, 255.0);
            *dst = Luma([v as u8]);
        }

        out
    }
}
