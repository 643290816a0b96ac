//! # Corner-like feature detection
//!
//! Minimum-eigenvalue (Shi-Tomasi) corner selection: Sobel gradients, a
//! block-averaged structure tensor, a quality cutoff relative to the
//! strongest response, and greedy minimum-distance suppression. Matches the
//! semantics of the usual `maxCorners`/`qualityLevel`/`minDistance`/
//! `blockSize` corner pickers.

use crate::config::SparseFlowConfig;
use crate::pyramid::box_mean;
use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use nalgebra as na;

/// Detect up to `config.max_corners` corners in a grayscale frame.
///
/// Returned points are ordered strongest first.
pub fn good_features(gray: &GrayImage, config: &SparseFlowConfig) -> Vec<na::Point2<f32>> {
    let (width, height) = (gray.width() as usize, gray.height() as usize);
    if width < 3 || height < 3 {
        return Vec::new();
    }

    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);

    let n = width * height;
    let mut gxx = vec![0.0f32; n];
    let mut gyy = vec![0.0f32; n];
    let mut gxy = vec![0.0f32; n];
    for i in 0..n {
        let x = gx.as_raw()[i] as f32;
        let y = gy.as_raw()[i] as f32;
        gxx[i] = x * x;
        gyy[i] = y * y;
        gxy[i] = x * y;
    }

    let radius = (config.block_size / 2).max(1);
    let sxx = box_mean(&gxx, width, height, radius);
    let syy = box_mean(&gyy, width, height, radius);
    let sxy = box_mean(&gxy, width, height, radius);

    // Minimum eigenvalue of the 2x2 structure tensor.
    let mut response = vec![0.0f32; n];
    let mut max_response = 0.0f32;
    for i in 0..n {
        let trace_half = 0.5 * (sxx[i] + syy[i]);
        let det_term = 0.25 * (sxx[i] - syy[i]).powi(2) + sxy[i] * sxy[i];
        let lambda = trace_half - det_term.sqrt();
        response[i] = lambda;
        max_response = max_response.max(lambda);
    }

    if max_response <= 0.0 {
        return Vec::new();
    }

    let cutoff = config.quality_level * max_response;
    let margin = radius;
    if height <= 2 * margin || width <= 2 * margin {
        return Vec::new();
    }

    let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
    for y in margin..height - margin {
        for x in margin..width - margin {
            let r = response[y * width + x];
            if r < cutoff {
                continue;
            }
            // Local 3x3 maximum only.
            let mut is_max = true;
            'nms: for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let ni = (y as isize + dy) as usize * width + (x as isize + dx) as usize;
                    if response[ni] > r {
                        is_max = false;
                        break 'nms;
                    }
                }
            }
            if is_max {
                candidates.push((r, x, y));
            }
        }
    }

    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    // Greedy minimum-distance acceptance, strongest first.
    let min_dist_sq = config.min_distance * config.min_distance;
    let mut accepted: Vec<na::Point2<f32>> = Vec::new();
    for (_, x, y) in candidates {
        let p = na::Point2::new(x as f32, y as f32);
        if accepted
            .iter()
            .all(|q| (p - q).magnitude_squared() >= min_dist_sq)
        {
            accepted.push(p);
            if accepted.len() >= config.max_corners {
                break;
            }
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic;

    #[test]
    fn checkerboard_yields_corners() {
        let gray = synthetic::checkerboard(96, 96, 16);
        let config = SparseFlowConfig::default();
        let points = good_features(&gray, &config);

        assert!(!points.is_empty());
        assert!(points.len() <= config.max_corners);
    }

    #[test]
    fn flat_frame_yields_none() {
        let gray = GrayImage::new(64, 64);
        assert!(good_features(&gray, &SparseFlowConfig::default()).is_empty());
    }

    #[test]
    fn min_distance_respected() {
        let gray = synthetic::checkerboard(96, 96, 8);
        let config = SparseFlowConfig::default();
        let points = good_features(&gray, &config);

        for (i, a) in points.iter().enumerate() {
            for b in points.iter().skip(i + 1) {
                assert!((a - b).magnitude() >= config.min_distance);
            }
        }
    }
}
