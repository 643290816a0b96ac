//! # Grayscale planes and image pyramids
//!
//! The flow estimators work on `f32` planes rather than `u8` buffers so that
//! subpixel sampling and filtering do not round in the middle of the math.

use image::GrayImage;

/// A single-channel `f32` image plane.
#[derive(Clone, Debug)]
pub struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    /// Create a zero-filled plane.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Convert from an 8-bit grayscale image.
    pub fn from_gray(gray: &GrayImage) -> Self {
        Self {
            width: gray.width() as usize,
            height: gray.height() as usize,
            data: gray.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Value at integer coordinates, clamped to the border.
    #[inline]
    pub fn get(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Bilinear sample at fractional coordinates, clamped to the border.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as isize, y0 as isize);

        let v00 = self.get(x0, y0);
        let v10 = self.get(x0 + 1, y0);
        let v01 = self.get(x0, y0 + 1);
        let v11 = self.get(x0 + 1, y0 + 1);

        let top = v00 + fx * (v10 - v00);
        let bottom = v01 + fx * (v11 - v01);
        top + fy * (bottom - top)
    }

    /// Half-resolution plane obtained by 2x2 averaging.
    pub fn halve(&self) -> Plane {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut out = Plane::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let (sx, sy) = (2 * x as isize, 2 * y as isize);
                let sum = self.get(sx, sy)
                    + self.get(sx + 1, sy)
                    + self.get(sx, sy + 1)
                    + self.get(sx + 1, sy + 1);
                out.set(x, y, sum * 0.25);
            }
        }

        out
    }

    /// Central-difference gradients `(dx, dy)`.
    pub fn gradients(&self) -> (Plane, Plane) {
        let mut dx = Plane::new(self.width, self.height);
        let mut dy = Plane::new(self.width, self.height);

        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                let gx = 0.5 * (self.get(x + 1, y) - self.get(x - 1, y));
                let gy = 0.5 * (self.get(x, y + 1) - self.get(x, y - 1));
                dx.set(x as usize, y as usize, gx);
                dy.set(x as usize, y as usize, gy);
            }
        }

        (dx, dy)
    }
}

/// Separable sliding-window mean over a row-major buffer.
///
/// Borders are handled by clamping, so every output is a true mean of the
/// clamped window.
pub fn box_mean(data: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let r = radius as isize;
    let mut tmp = vec![0.0f32; data.len()];
    let mut out = vec![0.0f32; data.len()];
    let norm = 1.0 / (2 * radius + 1) as f32;

    // Horizontal pass.
    for y in 0..height {
        let row = &data[y * width..(y + 1) * width];
        for x in 0..width as isize {
            let mut sum = 0.0;
            for dx in -r..=r {
                sum += row[(x + dx).clamp(0, width as isize - 1) as usize];
            }
            tmp[y * width + x as usize] = sum * norm;
        }
    }

    // Vertical pass.
    for y in 0..height as isize {
        for x in 0..width {
            let mut sum = 0.0;
            for dy in -r..=r {
                sum += tmp[(y + dy).clamp(0, height as isize - 1) as usize * width + x];
            }
            out[y as usize * width + x] = sum * norm;
        }
    }

    out
}

/// A coarse-to-fine stack of planes. Level 0 holds the full resolution.
pub struct Pyramid {
    pub levels: Vec<Plane>,
}

impl Pyramid {
    /// Build a pyramid with `levels` levels, each half the previous size.
    ///
    /// Levels that would shrink below 16 pixels on a side are not generated.
    pub fn new(gray: &GrayImage, levels: usize) -> Self {
        let mut out = vec![Plane::from_gray(gray)];

        for _ in 1..levels.max(1) {
            let next = {
                let prev = out.last().expect("at least one level");
                if prev.width() < 32 || prev.height() < 32 {
                    break;
                }
                prev.halve()
            };
            out.push(next);
        }

        Self { levels: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use image::Luma;

    #[test]
    fn bilinear_midpoint() {
        let mut p = Plane::new(2, 2);
        p.set(0, 0, 0.0);
        p.set(1, 0, 10.0);
        p.set(0, 1, 20.0);
        p.set(1, 1, 30.0);

        assert_approx_eq!(p.sample(0.5, 0.5), 15.0);
        assert_approx_eq!(p.sample(0.0, 0.0), 0.0);
    }

    #[test]
    fn halving_averages() {
        let gray = GrayImage::from_pixel(4, 4, Luma([100]));
        let plane = Plane::from_gray(&gray);
        let half = plane.halve();

        assert_eq!((half.width(), half.height()), (2, 2));
        assert_approx_eq!(half.get(0, 0), 100.0);
    }

    #[test]
    fn pyramid_stops_at_small_levels() {
        let gray = GrayImage::new(64, 64);
        let pyr = Pyramid::new(&gray, 5);
        // 64 -> 32 -> 16, then the 16px level refuses to halve further.
        assert_eq!(pyr.levels.len(), 3);
    }
}
