//! # Dense optical flow by polynomial expansion
//!
//! Farneback-style two-frame flow estimation. Every pixel neighbourhood of
//! both frames is approximated by a quadratic polynomial under a Gaussian
//! applicability weighting; the displacement field then follows from how the
//! linear terms shift between the frames. The estimate is refined
//! coarse-to-fine over an image pyramid, with the per-pixel equations averaged
//! over a box window before solving to keep the field spatially coherent.

use crate::config::DenseFlowConfig;
use crate::pyramid::{box_mean, Plane, Pyramid};
use image::GrayImage;
use nalgebra as na;

/// Per-pixel displacement field between two frames.
pub struct FlowField {
    u: Plane,
    v: Plane,
}

impl FlowField {
    fn zeros(width: usize, height: usize) -> Self {
        Self {
            u: Plane::new(width, height),
            v: Plane::new(width, height),
        }
    }

    pub fn width(&self) -> usize {
        self.u.width()
    }

    pub fn height(&self) -> usize {
        self.u.height()
    }

    /// Displacement at integer coordinates.
    pub fn get(&self, x: usize, y: usize) -> na::Vector2<f32> {
        na::Vector2::new(self.u.get(x as isize, y as isize), self.v.get(x as isize, y as isize))
    }

    /// Per-pixel `(magnitude, angle)` with the angle in radians `[0, 2pi)`.
    pub fn magnitude_angle(&self) -> (Vec<f32>, Vec<f32>) {
        let mut mag = Vec::with_capacity(self.u.data().len());
        let mut ang = Vec::with_capacity(self.u.data().len());

        for (&x, &y) in self.u.data().iter().zip(self.v.data().iter()) {
            mag.push((x * x + y * y).sqrt());
            ang.push(y.atan2(x).rem_euclid(std::f32::consts::TAU));
        }

        (mag, ang)
    }

    /// Mean displacement magnitude over the field.
    pub fn mean_magnitude(&self) -> f32 {
        let n = self.u.data().len();
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = self
            .u
            .data()
            .iter()
            .zip(self.v.data().iter())
            .map(|(&x, &y)| (x * x + y * y).sqrt())
            .sum();
        sum / n as f32
    }

    /// Summed displacement magnitude over the field.
    pub fn total_magnitude(&self) -> f32 {
        self.u
            .data()
            .iter()
            .zip(self.v.data().iter())
            .map(|(&x, &y)| (x * x + y * y).sqrt())
            .sum()
    }

    /// Resample to a finer resolution, doubling the displacement values.
    fn upsample_to(&self, width: usize, height: usize) -> FlowField {
        let sx = self.width() as f32 / width as f32;
        let sy = self.height() as f32 / height as f32;
        let mut out = FlowField::zeros(width, height);

        for y in 0..height {
            for x in 0..width {
                let cx = x as f32 * sx;
                let cy = y as f32 * sy;
                out.u.set(x, y, self.u.sample(cx, cy) * 2.0);
                out.v.set(x, y, self.v.sample(cx, cy) * 2.0);
            }
        }

        out
    }
}

/// Quadratic expansion coefficients of one plane.
///
/// The neighbourhood of every pixel is modelled as
/// `f(x) ~ x^T A x + b^T x + c` with `A = [[a11, a12], [a12, a22]]`.
struct PolyExp {
    width: usize,
    height: usize,
    b1: Vec<f32>,
    b2: Vec<f32>,
    a11: Vec<f32>,
    a22: Vec<f32>,
    a12: Vec<f32>,
}

fn poly_expand(plane: &Plane, n: usize, sigma: f32) -> PolyExp {
    let r = (n / 2).max(1) as isize;
    let (width, height) = (plane.width(), plane.height());

    // Normalised Gaussian applicability.
    let mut g = vec![0.0f64; (2 * r + 1) as usize];
    let mut sum = 0.0;
    for (i, w) in g.iter_mut().enumerate() {
        let d = i as f64 - r as f64;
        *w = (-d * d / (2.0 * sigma as f64 * sigma as f64)).exp();
        sum += *w;
    }
    for w in g.iter_mut() {
        *w /= sum;
    }

    // Metric of the basis {1, x, y, x^2, y^2, xy} under the applicability.
    let mut metric = na::SMatrix::<f64, 6, 6>::zeros();
    for dy in -r..=r {
        for dx in -r..=r {
            let a = g[(dx + r) as usize] * g[(dy + r) as usize];
            let basis = basis_vector(dx as f64, dy as f64);
            metric += a * basis * basis.transpose();
        }
    }
    let metric_inv = metric
        .try_inverse()
        .expect("polynomial basis metric is positive definite");

    // Vertical pass: correlate columns with {g, y*g, y^2*g}.
    let npx = width * height;
    let mut s0 = vec![0.0f32; npx];
    let mut s1 = vec![0.0f32; npx];
    let mut s2 = vec![0.0f32; npx];

    for y in 0..height as isize {
        for x in 0..width as isize {
            let (mut a0, mut a1, mut a2) = (0.0f64, 0.0f64, 0.0f64);
            for dy in -r..=r {
                let w = g[(dy + r) as usize];
                let f = plane.get(x, y + dy) as f64;
                a0 += w * f;
                a1 += w * dy as f64 * f;
                a2 += w * (dy * dy) as f64 * f;
            }
            let i = y as usize * width + x as usize;
            s0[i] = a0 as f32;
            s1[i] = a1 as f32;
            s2[i] = a2 as f32;
        }
    }

    // Horizontal pass: build the six projections and solve per pixel.
    let mut out = PolyExp {
        width,
        height,
        b1: vec![0.0; npx],
        b2: vec![0.0; npx],
        a11: vec![0.0; npx],
        a22: vec![0.0; npx],
        a12: vec![0.0; npx],
    };

    let clamp_x = |x: isize| x.clamp(0, width as isize - 1) as usize;

    for y in 0..height {
        let row = y * width;
        for x in 0..width as isize {
            let mut proj = na::SVector::<f64, 6>::zeros();
            for dx in -r..=r {
                let w = g[(dx + r) as usize];
                let i = row + clamp_x(x + dx);
                let (c0, c1, c2) = (s0[i] as f64, s1[i] as f64, s2[i] as f64);
                proj[0] += w * c0;
                proj[1] += w * dx as f64 * c0;
                proj[2] += w * c1;
                proj[3] += w * (dx * dx) as f64 * c0;
                proj[4] += w * c2;
                proj[5] += w * dx as f64 * c1;
            }

            let coeff = metric_inv * proj;
            let i = row + x as usize;
            out.b1[i] = coeff[1] as f32;
            out.b2[i] = coeff[2] as f32;
            out.a11[i] = coeff[3] as f32;
            out.a22[i] = coeff[4] as f32;
            out.a12[i] = 0.5 * coeff[5] as f32;
        }
    }

    out
}

#[inline]
fn basis_vector(x: f64, y: f64) -> na::SVector<f64, 6> {
    na::SVector::<f64, 6>::from_column_slice(&[1.0, x, y, x * x, y * y, x * y])
}

/// One refinement sweep: build the per-pixel flow equations at the current
/// estimate, average them over the window and solve.
fn update_flow(prev: &PolyExp, next: &PolyExp, flow: &FlowField, window: usize) -> FlowField {
    let (width, height) = (prev.width, prev.height);
    let npx = width * height;

    let mut g11 = vec![0.0f32; npx];
    let mut g12 = vec![0.0f32; npx];
    let mut g22 = vec![0.0f32; npx];
    let mut h1 = vec![0.0f32; npx];
    let mut h2 = vec![0.0f32; npx];

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let d = flow.get(x, y);

            // Coefficients of the second frame sampled at the warped position.
            let wx = ((x as f32 + d.x).round() as isize).clamp(0, width as isize - 1) as usize;
            let wy = ((y as f32 + d.y).round() as isize).clamp(0, height as isize - 1) as usize;
            let j = wy * width + wx;

            let a11 = 0.5 * (prev.a11[i] + next.a11[j]);
            let a22 = 0.5 * (prev.a22[i] + next.a22[j]);
            let a12 = 0.5 * (prev.a12[i] + next.a12[j]);

            let db1 = -0.5 * (next.b1[j] - prev.b1[i]) + a11 * d.x + a12 * d.y;
            let db2 = -0.5 * (next.b2[j] - prev.b2[i]) + a12 * d.x + a22 * d.y;

            g11[i] = a11 * a11 + a12 * a12;
            g12[i] = a12 * (a11 + a22);
            g22[i] = a22 * a22 + a12 * a12;
            h1[i] = a11 * db1 + a12 * db2;
            h2[i] = a12 * db1 + a22 * db2;
        }
    }

    let radius = (window / 2).max(1);
    let g11 = box_mean(&g11, width, height, radius);
    let g12 = box_mean(&g12, width, height, radius);
    let g22 = box_mean(&g22, width, height, radius);
    let h1 = box_mean(&h1, width, height, radius);
    let h2 = box_mean(&h2, width, height, radius);

    let mut out = FlowField::zeros(width, height);
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let det = g11[i] * g22[i] - g12[i] * g12[i];
            if det.abs() > 1e-9 {
                out.u.set(x, y, (g22[i] * h1[i] - g12[i] * h2[i]) / det);
                out.v.set(x, y, (g11[i] * h2[i] - g12[i] * h1[i]) / det);
            } else {
                // Not enough signal; keep the incoming estimate.
                let d = flow.get(x, y);
                out.u.set(x, y, d.x);
                out.v.set(x, y, d.y);
            }
        }
    }

    out
}

/// Estimate the dense flow carrying `prev` onto `next`.
pub fn farneback(prev: &GrayImage, next: &GrayImage, config: &DenseFlowConfig) -> FlowField {
    let prev_pyr = Pyramid::new(prev, config.levels);
    let next_pyr = Pyramid::new(next, config.levels);
    let levels = prev_pyr.levels.len().min(next_pyr.levels.len());

    let mut flow: Option<FlowField> = None;

    for level in (0..levels).rev() {
        let p1 = &prev_pyr.levels[level];
        let p2 = &next_pyr.levels[level];
        let (width, height) = (p1.width(), p1.height());

        let mut current = match flow.take() {
            Some(coarse) => coarse.upsample_to(width, height),
            None => FlowField::zeros(width, height),
        };

        let pe1 = poly_expand(p1, config.poly_n, config.poly_sigma);
        let pe2 = poly_expand(p2, config.poly_n, config.poly_sigma);

        for _ in 0..config.iterations.max(1) {
            current = update_flow(&pe1, &pe2, &current, config.window_size);
        }

        flow = Some(current);
    }

    flow.unwrap_or_else(|| FlowField::zeros(prev.width() as usize, prev.height() as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn identical_frames_zero_field() {
        let gray = synthetic::checkerboard(96, 96, 12);
        let flow = farneback(&gray, &gray, &DenseFlowConfig::default());
        assert_approx_eq!(flow.mean_magnitude(), 0.0, 1e-3);
    }

    #[test]
    fn translation_recovered() {
        let a = synthetic::checkerboard(128, 128, 16);
        let b = synthetic::shifted(&a, 2, 0);
        let flow = farneback(&a, &b, &DenseFlowConfig::default());

        assert!(flow.mean_magnitude() > 0.5, "mean {}", flow.mean_magnitude());

        // Away from the borders the horizontal component should point along
        // the actual shift.
        let mut sum = 0.0;
        let mut count = 0;
        for y in 32..96 {
            for x in 32..96 {
                sum += flow.get(x, y).x;
                count += 1;
            }
        }
        assert!(sum / count as f32 > 0.5, "mean u {}", sum / count as f32);
    }

    #[test]
    fn magnitude_angle_shapes() {
        let gray = synthetic::checkerboard(64, 64, 8);
        let flow = farneback(&gray, &gray, &DenseFlowConfig::default());
        let (mag, ang) = flow.magnitude_angle();
        assert_eq!(mag.len(), 64 * 64);
        assert_eq!(ang.len(), 64 * 64);
        assert!(ang.iter().all(|a| (0.0..std::f32::consts::TAU).contains(a)));
    }
}
