//! # Pyramidal Lucas-Kanade point tracking
//!
//! Iterative window-based tracking of sparse feature points between two
//! frames. Each point is refined coarse-to-fine; per level, the spatial
//! gradient matrix of the previous frame is inverted once and the temporal
//! residual drives a Newton-style update until it converges or the iteration
//! cap is hit.

use crate::config::SparseFlowConfig;
use crate::pyramid::{Plane, Pyramid};
use image::GrayImage;
use nalgebra as na;

/// Result of tracking one point.
#[derive(Clone, Copy, Debug)]
pub struct TrackOutcome {
    /// Location in the new frame. Meaningful only when `tracked` is set.
    pub point: na::Point2<f32>,
    /// False when the point left the frame or its neighbourhood carried too
    /// little gradient to solve for motion.
    pub tracked: bool,
}

/// Track `points` from `prev` into `next`.
///
/// The output is index-aligned with the input; callers filter on
/// [`TrackOutcome::tracked`].
pub fn track(
    prev: &GrayImage,
    next: &GrayImage,
    points: &[na::Point2<f32>],
    config: &SparseFlowConfig,
) -> Vec<TrackOutcome> {
    let prev_pyr = Pyramid::new(prev, config.pyramid_levels);
    let next_pyr = Pyramid::new(next, config.pyramid_levels);
    let levels = prev_pyr.levels.len().min(next_pyr.levels.len());

    points
        .iter()
        .map(|&p| track_point(&prev_pyr.levels[..levels], &next_pyr.levels[..levels], p, config))
        .collect()
}

fn track_point(
    prev: &[Plane],
    next: &[Plane],
    point: na::Point2<f32>,
    config: &SparseFlowConfig,
) -> TrackOutcome {
    // Flow accumulated in the coordinates of the current level.
    let mut flow = na::Vector2::new(0.0f32, 0.0);
    let mut solvable = false;

    for level in (0..prev.len()).rev() {
        let base = point / (1 << level) as f32;
        let prev_plane = &prev[level];
        let next_plane = &next[level];

        // Spatial gradient matrix over the window around the point in the
        // previous frame. Computed once per level.
        let r = config.window_radius as isize;
        let mut g = na::Matrix2::<f32>::zeros();
        let mut gradients = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);

        for dy in -r..=r {
            for dx in -r..=r {
                let x = base.x + dx as f32;
                let y = base.y + dy as f32;
                let ix = 0.5 * (prev_plane.sample(x + 1.0, y) - prev_plane.sample(x - 1.0, y));
                let iy = 0.5 * (prev_plane.sample(x, y + 1.0) - prev_plane.sample(x, y - 1.0));
                gradients.push((x, y, ix, iy));
                g[(0, 0)] += ix * ix;
                g[(0, 1)] += ix * iy;
                g[(1, 0)] += ix * iy;
                g[(1, 1)] += iy * iy;
            }
        }

        let g_inv = match g.try_inverse() {
            Some(inv) if g.determinant().abs() > 1e-4 => {
                solvable = true;
                inv
            }
            _ => {
                // Flat window at this level; carry the flow upward untouched.
                if level > 0 {
                    flow *= 2.0;
                }
                continue;
            }
        };

        for _ in 0..config.max_iterations {
            let mut b = na::Vector2::<f32>::zeros();
            for &(x, y, ix, iy) in &gradients {
                let dt = prev_plane.sample(x, y) - next_plane.sample(x + flow.x, y + flow.y);
                b.x += dt * ix;
                b.y += dt * iy;
            }

            let delta = g_inv * b;
            flow += delta;

            if delta.magnitude() < config.epsilon {
                break;
            }
        }

        if level > 0 {
            flow *= 2.0;
        }
    }

    let tracked_point = point + flow;
    let in_bounds = tracked_point.x >= 0.0
        && tracked_point.y >= 0.0
        && tracked_point.x < prev[0].width() as f32
        && tracked_point.y < prev[0].height() as f32;

    TrackOutcome {
        point: tracked_point,
        tracked: solvable && in_bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn identical_frames_zero_flow() {
        let gray = synthetic::checkerboard(96, 96, 16);
        let points = vec![na::Point2::new(32.0, 32.0), na::Point2::new(48.0, 64.0)];
        let config = SparseFlowConfig::default();

        let outcomes = track(&gray, &gray, &points, &config);
        for (outcome, original) in outcomes.iter().zip(&points) {
            assert!(outcome.tracked);
            assert_approx_eq!((outcome.point - original).magnitude(), 0.0, 0.5);
        }
    }

    #[test]
    fn translation_recovered() {
        let a = synthetic::checkerboard(128, 128, 16);
        let b = synthetic::shifted(&a, 3, 0);
        let points = vec![na::Point2::new(64.0, 64.0)];
        let config = SparseFlowConfig::default();

        let outcomes = track(&a, &b, &points, &config);
        assert!(outcomes[0].tracked);
        let moved = outcomes[0].point - points[0];
        assert!((moved.x - 3.0).abs() < 1.0, "recovered dx {}", moved.x);
        assert!(moved.y.abs() < 1.0, "recovered dy {}", moved.y);
    }

    #[test]
    fn flat_window_not_tracked() {
        let gray = GrayImage::new(64, 64);
        let points = vec![na::Point2::new(32.0, 32.0)];
        let outcomes = track(&gray, &gray, &points, &SparseFlowConfig::default());
        assert!(!outcomes[0].tracked);
    }
}
