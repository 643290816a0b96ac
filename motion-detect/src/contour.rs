//! # Contour extraction over binary masks
//!
//! Thin layer over `imageproc`'s border-following contour tracer: keeps only
//! external contours, computes shoelace areas and bounding rectangles, and
//! filters by a minimum area the way the detection methods need.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;
use imageproc::rect::Rect;

/// A connected moving region extracted from a mask.
#[derive(Clone, Debug)]
pub struct MotionRegion {
    /// Shoelace area of the region outline, in pixels.
    pub area: f32,
    /// Axis-aligned bounding rectangle.
    pub bounds: Rect,
    /// The traced outline.
    pub outline: Vec<Point<i32>>,
}

/// Trace the external contours of a 0/255 mask.
pub fn external_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c: &Contour<i32>| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
        .collect()
}

/// Extract external regions whose shoelace area exceeds `min_area`.
pub fn motion_regions(mask: &GrayImage, min_area: f32) -> Vec<MotionRegion> {
    external_contours(mask)
        .into_iter()
        .filter_map(|outline| {
            let area = contour_area(&outline);
            if area > min_area {
                let bounds = bounding_rect(&outline)?;
                Some(MotionRegion {
                    area,
                    bounds,
                    outline,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Shoelace area of a closed polygonal outline.
pub fn contour_area(points: &[Point<i32>]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut doubled = 0i64;
    for (a, b) in points.iter().zip(points.iter().cycle().skip(1)) {
        doubled += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }

    (doubled.abs() as f32) * 0.5
}

/// Axis-aligned bounding rectangle of an outline.
pub fn bounding_rect(points: &[Point<i32>]) -> Option<Rect> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

    for p in points.iter().skip(1) {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    Some(Rect::at(min_x, min_y).of_size((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32))
}
