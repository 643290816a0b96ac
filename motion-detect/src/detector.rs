//! # Frame processing dispatcher
//!
//! [`MotionDetector`] owns the per-session [`DetectionState`] and routes every
//! incoming colour frame to the active detection method. Each call produces a
//! [`DetectionResult`]; switching methods fully resets the state first, so the
//! next frame always starts from the bootstrap case.
//!
//! None of the methods raise domain errors. A missing previous frame is the
//! bootstrap state (initialise, report no motion), and an emptied tracked
//! point set triggers regeneration rather than failure.

use crate::annotate;
use crate::config::DetectorConfig;
use crate::contour;
use crate::farneback;
use crate::features;
use crate::frame;
use crate::lk;
use crate::mhi::MotionHistory;
use crate::state::{DetectionState, Method};
use anyhow::Result;
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology;

/// Output of processing one frame. Produced fresh each call; ownership moves
/// to the caller for display or recording.
pub struct DetectionResult {
    /// Input frame with per-method annotations drawn on top.
    pub annotated: RgbImage,
    /// Method visualisation: foreground mask, flow colouring or history map.
    pub visual: RgbImage,
    /// Whether the method flagged motion this frame.
    pub motion_detected: bool,
    /// Method-specific magnitude: summed contour area, summed displacement or
    /// moving-pixel count.
    pub motion_value: f32,
}

/// Discrete commands a keyboard-style controller feeds the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Switch the active method, resetting all detection state.
    Switch(Method),
    /// Step the motion threshold up.
    RaiseThreshold,
    /// Step the motion threshold down, bounded by the floor.
    LowerThreshold,
    /// Step the history decay rate up. Only acts in MHI mode.
    RaiseDecay,
    /// Step the history decay rate down. Only acts in MHI mode.
    LowerDecay,
}

/// The frame processing dispatcher.
pub struct MotionDetector {
    config: DetectorConfig,
    method: Method,
    state: DetectionState,
}

impl MotionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_method(config, Method::BackgroundSubtraction)
    }

    pub fn with_method(config: DetectorConfig, method: Method) -> Self {
        let state = DetectionState::new(&config);
        Self {
            config,
            method,
            state,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Switch the active method and invalidate all per-method state.
    pub fn set_method(&mut self, method: Method) {
        log::info!("switching to {}", method);
        self.method = method;
        self.state.reset(&self.config);
    }

    /// Apply a discrete control command.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Switch(method) => self.set_method(method),
            Command::RaiseThreshold => {
                self.state.motion_threshold += self.config.threshold_step;
                log::info!("motion threshold: {}", self.state.motion_threshold);
            }
            Command::LowerThreshold => {
                self.state.motion_threshold = (self.state.motion_threshold
                    - self.config.threshold_step)
                    .max(self.config.threshold_floor);
                log::info!("motion threshold: {}", self.state.motion_threshold);
            }
            Command::RaiseDecay if self.method == Method::MotionHistoryImage => {
                self.state.decay_rate =
                    (self.state.decay_rate + self.config.mhi.decay_step).min(self.config.mhi.decay_max);
                log::info!("history decay rate: {}", self.state.decay_rate);
            }
            Command::LowerDecay if self.method == Method::MotionHistoryImage => {
                self.state.decay_rate =
                    (self.state.decay_rate - self.config.mhi.decay_step).max(self.config.mhi.decay_min);
                log::info!("history decay rate: {}", self.state.decay_rate);
            }
            Command::RaiseDecay | Command::LowerDecay => {}
        }
    }

    /// Process one colour frame with the active method.
    ///
    /// Mutates the detection state as a side effect and hands the produced
    /// result to the caller.
    pub fn process_frame(&mut self, input: &RgbImage) -> Result<DetectionResult> {
        // A resolution change invalidates everything learned so far.
        if let Some(prev) = &self.state.previous_frame {
            if prev.dimensions() != input.dimensions() {
                log::debug!("frame dimensions changed, resetting state");
                self.state.reset(&self.config);
            }
        }

        let result = match self.method {
            Method::BackgroundSubtraction => self.background_subtraction(input),
            Method::FrameDifference => self.frame_difference(input),
            Method::SparseOpticalFlow => self.sparse_flow(input),
            Method::DenseOpticalFlow => self.dense_flow(input),
            Method::MotionHistoryImage => self.motion_history(input),
        };

        Ok(result)
    }

    fn background_subtraction(&mut self, input: &RgbImage) -> DetectionResult {
        let gray = frame::to_grayscale(input);

        let bootstrap = self.state.background.is_fresh();
        let raw_mask = self.state.background.apply(&gray);
        if bootstrap {
            // The model has only just been seeded; everything would read as
            // foreground.
            return bootstrap_result(input);
        }

        let radius = self.config.background.morph_radius;
        let mask = morphology::open(&morphology::close(&raw_mask, Norm::LInf, radius), Norm::LInf, radius);

        let regions = contour::motion_regions(&mask, self.state.motion_threshold);
        let mut annotated = input.clone();
        let mut total_area = 0.0;
        for region in &regions {
            total_area += region.area;
            annotate::draw_region(&mut annotated, region, annotate::GREEN);
        }

        DetectionResult {
            annotated,
            visual: frame::gray_to_rgb(&mask),
            motion_detected: !regions.is_empty(),
            motion_value: total_area,
        }
    }

    fn frame_difference(&mut self, input: &RgbImage) -> DetectionResult {
        let processed = frame::preprocess(input, self.config.blur_sigma);

        let prev = match self.state.previous_frame.take() {
            Some(prev) => prev,
            None => {
                self.state.previous_frame = Some(processed);
                return bootstrap_result(input);
            }
        };

        let diff = frame::absdiff_mask(&prev, &processed, self.config.diff.diff_threshold);
        let mask = morphology::dilate(&diff, Norm::LInf, self.config.diff.dilate_radius);

        let regions = contour::motion_regions(&mask, self.state.motion_threshold);
        let mut annotated = input.clone();
        let mut total_area = 0.0;
        for region in &regions {
            total_area += region.area;
            annotate::draw_region(&mut annotated, region, annotate::BLUE);
        }

        self.state.previous_frame = Some(processed);

        DetectionResult {
            annotated,
            visual: frame::gray_to_rgb(&mask),
            motion_detected: !regions.is_empty(),
            motion_value: total_area,
        }
    }

    fn sparse_flow(&mut self, input: &RgbImage) -> DetectionResult {
        let processed = frame::preprocess(input, self.config.blur_sigma);

        let prev = match self.state.previous_frame.take() {
            Some(prev) => prev,
            None => {
                self.state.tracked_points =
                    Some(features::good_features(&processed, &self.config.sparse));
                self.state.previous_frame = Some(processed);
                return bootstrap_result(input);
            }
        };

        let mut annotated = input.clone();
        let mut motion_detected = false;
        let mut total_motion = 0.0;

        let points = self.state.tracked_points.take().unwrap_or_default();
        let mut survivors = Vec::with_capacity(points.len());

        if !points.is_empty() {
            let outcomes = lk::track(&prev, &processed, &points, &self.config.sparse);
            for (old, outcome) in points.iter().zip(outcomes) {
                if !outcome.tracked {
                    continue;
                }
                let magnitude = (outcome.point - old).magnitude();
                total_motion += magnitude;
                if magnitude > self.config.sparse.motion_px {
                    motion_detected = true;
                    annotate::draw_track(&mut annotated, *old, outcome.point);
                }
                survivors.push(outcome.point);
            }
        }

        // Too few survivors leave the tracker blind; start over on the
        // current frame.
        let points = if survivors.len() < self.config.sparse.min_tracked {
            log::debug!("{} points left, regenerating features", survivors.len());
            features::good_features(&processed, &self.config.sparse)
        } else {
            survivors
        };

        let mut visual = RgbImage::new(input.width(), input.height());
        annotate::draw_points(&mut visual, &points, annotate::GREEN);

        self.state.tracked_points = Some(points);
        self.state.previous_frame = Some(processed);

        DetectionResult {
            annotated,
            visual,
            motion_detected,
            motion_value: total_motion,
        }
    }

    fn dense_flow(&mut self, input: &RgbImage) -> DetectionResult {
        let processed = frame::preprocess(input, self.config.blur_sigma);

        let prev = match self.state.previous_frame.take() {
            Some(prev) => prev,
            None => {
                self.state.previous_frame = Some(processed);
                return bootstrap_result(input);
            }
        };

        let flow = farneback::farneback(&prev, &processed, &self.config.dense);
        let mean_magnitude = flow.mean_magnitude();

        self.state.previous_frame = Some(processed);

        DetectionResult {
            annotated: input.clone(),
            visual: annotate::flow_to_rgb(&flow),
            motion_detected: mean_magnitude > self.config.dense.mean_magnitude_threshold,
            motion_value: flow.total_magnitude(),
        }
    }

    fn motion_history(&mut self, input: &RgbImage) -> DetectionResult {
        let processed = frame::preprocess(input, self.config.blur_sigma);
        let (width, height) = processed.dimensions();

        let prev = match self.state.previous_frame.take() {
            Some(prev) => prev,
            None => {
                self.state.previous_frame = Some(processed);
                return bootstrap_result(input);
            }
        };

        let mask = frame::absdiff_mask(&prev, &processed, self.config.mhi.diff_threshold);

        let history = self
            .state
            .history
            .get_or_insert_with(|| MotionHistory::new(width, height));
        history.update(&mask, self.state.decay_rate);
        let normalized = history.normalized(self.config.mhi.duration);

        let moving_pixels = mask.pixels().filter(|p| p.0[0] > 0).count() as f32;
        let motion_detected = moving_pixels > self.state.motion_threshold / 10.0;

        let mut annotated = input.clone();
        if motion_detected {
            let binary = binarize(&normalized, self.config.mhi.contour_threshold);
            let outlines = contour::external_contours(&binary);
            annotate::draw_outlines(&mut annotated, &outlines, annotate::YELLOW);
        }

        self.state.previous_frame = Some(processed);

        DetectionResult {
            annotated,
            visual: annotate::jet_colormap(&normalized),
            motion_detected,
            motion_value: moving_pixels,
        }
    }
}

fn bootstrap_result(input: &RgbImage) -> DetectionResult {
    DetectionResult {
        annotated: input.clone(),
        visual: RgbImage::new(input.width(), input.height()),
        motion_detected: false,
        motion_value: 0.0,
    }
}

fn binarize(gray: &GrayImage, cutoff: u8) -> GrayImage {
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (dst, src) in out.pixels_mut().zip(gray.pixels()) {
        *dst = Luma([if src.0[0] > cutoff { 255 } else { 0 }]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic;
    use nalgebra as na;

    fn detector(method: Method) -> MotionDetector {
        MotionDetector::with_method(DetectorConfig::default(), method)
    }

    #[test]
    fn first_call_reports_no_motion_for_every_method() {
        let frame = synthetic::checkerboard_frame(96, 96, 16);
        for method in Method::ALL {
            let mut det = detector(method);
            let result = det.process_frame(&frame).unwrap();
            assert!(!result.motion_detected, "{method} flagged motion on bootstrap");
            assert_eq!(result.motion_value, 0.0);
        }
    }

    #[test]
    fn frame_difference_detects_appearing_rectangle() {
        let mut config = DetectorConfig::default();
        config.blur_sigma = 0.8;
        let mut det = MotionDetector::with_method(config, Method::FrameDifference);

        det.process_frame(&synthetic::flat_frame(200, 160, 10)).unwrap();
        let result = det
            .process_frame(&synthetic::frame_with_rect(200, 160, 40, 40, 80, 60, 10, 240))
            .unwrap();

        assert!(result.motion_detected);
        let expected = 80.0 * 60.0;
        let relative = (result.motion_value - expected).abs() / expected;
        assert!(relative < 0.35, "area {} vs {}", result.motion_value, expected);
    }

    #[test]
    fn frame_difference_mask_is_single_region() {
        let a = frame::preprocess(&synthetic::flat_frame(200, 160, 10), 0.8);
        let b = frame::preprocess(
            &synthetic::frame_with_rect(200, 160, 40, 40, 80, 60, 10, 240),
            0.8,
        );
        let diff = frame::absdiff_mask(&a, &b, 30);
        let mask = morphology::dilate(&diff, Norm::LInf, 2);

        assert_eq!(contour::motion_regions(&mask, 1000.0).len(), 1);
    }

    #[test]
    fn background_subtraction_detects_novel_rectangle() {
        let mut det = detector(Method::BackgroundSubtraction);
        let background = synthetic::flat_frame(200, 160, 10);
        for _ in 0..40 {
            det.process_frame(&background).unwrap();
        }

        let result = det
            .process_frame(&synthetic::frame_with_rect(200, 160, 40, 40, 80, 60, 10, 240))
            .unwrap();
        assert!(result.motion_detected);
        let expected = 80.0 * 60.0;
        let relative = (result.motion_value - expected).abs() / expected;
        assert!(relative < 0.1, "area {} vs {}", result.motion_value, expected);
    }

    #[test]
    fn background_subtraction_ignores_small_regions() {
        let mut det = detector(Method::BackgroundSubtraction);
        let background = synthetic::flat_frame(200, 160, 10);
        for _ in 0..40 {
            det.process_frame(&background).unwrap();
        }

        // 20x20 = 400 pixels, below the 1000 pixel threshold.
        let result = det
            .process_frame(&synthetic::frame_with_rect(200, 160, 40, 40, 20, 20, 10, 240))
            .unwrap();
        assert!(!result.motion_detected);
    }

    #[test]
    fn sparse_flow_flags_large_shift() {
        let mut det = detector(Method::SparseOpticalFlow);
        let a = synthetic::checkerboard_frame(160, 160, 20);
        let b = synthetic::shifted_frame(&a, 6, 0);

        det.process_frame(&a).unwrap();
        let result = det.process_frame(&b).unwrap();

        assert!(result.motion_detected);
        assert!(result.motion_value > 0.0);
    }

    #[test]
    fn sparse_flow_regenerates_depleted_points() {
        let mut det = detector(Method::SparseOpticalFlow);
        let frame = synthetic::checkerboard_frame(160, 160, 20);

        det.process_frame(&frame).unwrap();

        // Starve the tracker below the regeneration floor.
        det.state.tracked_points = Some(vec![
            na::Point2::new(40.0, 40.0),
            na::Point2::new(80.0, 80.0),
        ]);
        det.process_frame(&frame).unwrap();

        let points = det.state.tracked_points.as_ref().unwrap();
        assert!(
            points.len() >= det.config.sparse.min_tracked,
            "only {} points after regeneration",
            points.len()
        );
    }

    #[test]
    fn dense_flow_still_scene_is_quiet() {
        let mut det = detector(Method::DenseOpticalFlow);
        let frame = synthetic::checkerboard_frame(96, 96, 12);

        det.process_frame(&frame).unwrap();
        let result = det.process_frame(&frame).unwrap();

        assert!(!result.motion_detected);
        assert!(result.motion_value < 1.0);
    }

    #[test]
    fn method_switch_resets_state() {
        let mut det = detector(Method::FrameDifference);
        let frame = synthetic::checkerboard_frame(96, 96, 16);
        det.process_frame(&frame).unwrap();
        det.process_frame(&frame).unwrap();
        assert!(!det.state.is_pristine());

        det.apply(Command::Switch(Method::SparseOpticalFlow));
        assert!(det.state.is_pristine());
        assert_eq!(det.method(), Method::SparseOpticalFlow);
    }

    #[test]
    fn threshold_commands_respect_floor() {
        let mut det = detector(Method::FrameDifference);
        det.apply(Command::LowerThreshold);
        det.apply(Command::LowerThreshold);
        det.apply(Command::LowerThreshold);
        assert_eq!(det.state.motion_threshold, det.config.threshold_floor);

        det.apply(Command::RaiseThreshold);
        assert_eq!(
            det.state.motion_threshold,
            det.config.threshold_floor + det.config.threshold_step
        );
    }

    #[test]
    fn decay_commands_only_act_in_mhi_mode() {
        let mut det = detector(Method::FrameDifference);
        let before = det.state.decay_rate;
        det.apply(Command::RaiseDecay);
        assert_eq!(det.state.decay_rate, before);

        det.apply(Command::Switch(Method::MotionHistoryImage));
        for _ in 0..20 {
            det.apply(Command::RaiseDecay);
        }
        assert_eq!(det.state.decay_rate, det.config.mhi.decay_max);

        for _ in 0..20 {
            det.apply(Command::LowerDecay);
        }
        assert_eq!(det.state.decay_rate, det.config.mhi.decay_min);
    }
}
