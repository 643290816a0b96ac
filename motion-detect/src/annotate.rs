//! # On-image annotation and visualisation
//!
//! Drawing helpers shared by the detection methods: bounding boxes around
//! moving regions, point tracks, flow-field colour coding and a JET-style
//! colormap for the motion-history buffer.

use crate::contour::MotionRegion;
use crate::farneback::FlowField;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use nalgebra as na;

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

/// Draw a two-pixel-thick bounding box around a region.
pub fn draw_region(frame: &mut RgbImage, region: &MotionRegion, color: Rgb<u8>) {
    let b = region.bounds;
    draw_hollow_rect_mut(frame, b, color);
    if b.width() > 2 && b.height() > 2 {
        let inner = Rect::at(b.left() + 1, b.top() + 1).of_size(b.width() - 2, b.height() - 2);
        draw_hollow_rect_mut(frame, inner, color);
    }
}

/// Draw a point track: a line from the old to the new location plus a marker
/// on the new one.
pub fn draw_track(frame: &mut RgbImage, from: na::Point2<f32>, to: na::Point2<f32>) {
    draw_line_segment_mut(frame, (from.x, from.y), (to.x, to.y), YELLOW);
    draw_filled_circle_mut(frame, (to.x as i32, to.y as i32), 3, RED);
}

/// Dot markers for a live feature point set.
pub fn draw_points(frame: &mut RgbImage, points: &[na::Point2<f32>], color: Rgb<u8>) {
    for p in points {
        draw_filled_circle_mut(frame, (p.x as i32, p.y as i32), 3, color);
    }
}

/// Draw traced outlines directly, pixel by pixel.
pub fn draw_outlines(frame: &mut RgbImage, outlines: &[Vec<Point<i32>>], color: Rgb<u8>) {
    let (w, h) = frame.dimensions();
    for outline in outlines {
        for p in outline {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < w && (p.y as u32) < h {
                frame.put_pixel(p.x as u32, p.y as u32, color);
            }
        }
    }
}

/// Colour-code a dense flow field: hue encodes direction, brightness encodes
/// magnitude normalised against the field's maximum, at full saturation.
pub fn flow_to_rgb(flow: &FlowField) -> RgbImage {
    let (mag, ang) = flow.magnitude_angle();
    let max_mag = mag.iter().cloned().fold(0.0f32, f32::max).max(1e-6);

    let mut out = RgbImage::new(flow.width() as u32, flow.height() as u32);
    for (i, dst) in out.pixels_mut().enumerate() {
        let hue = ang[i].to_degrees().rem_euclid(360.0);
        let value = mag[i] / max_mag;
        *dst = hsv_to_rgb(hue, 1.0, value);
    }

    out
}

/// JET-style colormap over a grayscale buffer (cold blue to hot red).
pub fn jet_colormap(gray: &GrayImage) -> RgbImage {
    let mut out = RgbImage::new(gray.width(), gray.height());
    for (dst, src) in out.pixels_mut().zip(gray.pixels()) {
        let t = src.0[0] as f32 / 255.0;
        let r = (1.5 - (4.0 * t - 3.0).abs()).clamp(0.0, 1.0);
        let g = (1.5 - (4.0 * t - 2.0).abs()).clamp(0.0, 1.0);
        let b = (1.5 - (4.0 * t - 1.0).abs()).clamp(0.0, 1.0);
        *dst = Rgb([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]);
    }
    out
}

/// HSV to RGB with `h` in degrees, `s` and `v` in `[0, 1]`.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());

    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let m = v - c;
    Rgb([
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb([255, 0, 0]));
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), Rgb([0, 255, 0]));
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), Rgb([0, 0, 255]));
        assert_eq!(hsv_to_rgb(0.0, 0.0, 0.0), Rgb([0, 0, 0]));
    }

    #[test]
    fn jet_endpoints() {
        let mut gray = GrayImage::new(2, 1);
        gray.put_pixel(0, 0, image::Luma([0]));
        gray.put_pixel(1, 0, image::Luma([255]));

        let rgb = jet_colormap(&gray);
        // Cold end is blue dominant, hot end is red dominant.
        assert!(rgb.get_pixel(0, 0).0[2] > rgb.get_pixel(0, 0).0[0]);
        assert!(rgb.get_pixel(1, 0).0[0] > rgb.get_pixel(1, 0).0[2]);
    }
}
