//! # Detection method and per-session mutable state

use crate::background::MixtureBackground;
use crate::config::DetectorConfig;
use crate::mhi::MotionHistory;
use image::GrayImage;
use nalgebra as na;
use std::fmt;

/// The five detection methods. Selecting a method is the only state
/// transition in the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    BackgroundSubtraction,
    FrameDifference,
    SparseOpticalFlow,
    DenseOpticalFlow,
    MotionHistoryImage,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::BackgroundSubtraction,
        Method::FrameDifference,
        Method::SparseOpticalFlow,
        Method::DenseOpticalFlow,
        Method::MotionHistoryImage,
    ];

    /// Map the digit keys `1..=5` to methods.
    pub fn from_digit(digit: u8) -> Option<Method> {
        match digit {
            1 => Some(Method::BackgroundSubtraction),
            2 => Some(Method::FrameDifference),
            3 => Some(Method::SparseOpticalFlow),
            4 => Some(Method::DenseOpticalFlow),
            5 => Some(Method::MotionHistoryImage),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::BackgroundSubtraction => "Background Subtraction",
            Method::FrameDifference => "Frame Difference",
            Method::SparseOpticalFlow => "Optical Flow",
            Method::DenseOpticalFlow => "Dense Optical Flow",
            Method::MotionHistoryImage => "Motion History Image",
        };
        f.write_str(name)
    }
}

/// The mutable context carried across frames.
///
/// Exactly one of these exists per session; the dispatcher owns it and every
/// method reads and writes only the fields it needs. A method switch
/// invalidates everything via [`DetectionState::reset`].
pub struct DetectionState {
    /// Smoothed grayscale of the previous frame, once one exists.
    pub previous_frame: Option<GrayImage>,
    /// Live sparse-flow feature point set.
    pub tracked_points: Option<Vec<na::Point2<f32>>>,
    /// Running background model.
    pub background: MixtureBackground,
    /// Motion-history buffer, allocated on first real use.
    pub history: Option<MotionHistory>,
    /// Per-frame decay of untouched history cells.
    pub decay_rate: f32,
    /// Contour-area cutoff for flagging motion.
    pub motion_threshold: f32,
}

impl DetectionState {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            previous_frame: None,
            tracked_points: None,
            background: MixtureBackground::new(config.background.clone()),
            history: None,
            decay_rate: config.mhi.default_decay,
            motion_threshold: config.motion_threshold,
        }
    }

    /// Restore a freshly-constructed state so no method observes leftovers of
    /// another.
    ///
    /// The motion threshold is a user setting and survives the reset; the
    /// decay rate goes back to its default.
    pub fn reset(&mut self, config: &DetectorConfig) {
        self.previous_frame = None;
        self.tracked_points = None;
        self.background = MixtureBackground::new(config.background.clone());
        self.history = None;
        self.decay_rate = config.mhi.default_decay;
    }

    /// True when nothing has been learned yet; a freshly built and a freshly
    /// reset state are both pristine.
    pub fn is_pristine(&self) -> bool {
        self.previous_frame.is_none()
            && self.tracked_points.is_none()
            && self.history.is_none()
            && self.background.is_fresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn digit_mapping_round_trip() {
        assert_eq!(Method::from_digit(1), Some(Method::BackgroundSubtraction));
        assert_eq!(Method::from_digit(5), Some(Method::MotionHistoryImage));
        assert_eq!(Method::from_digit(0), None);
        assert_eq!(Method::from_digit(6), None);
    }

    #[test]
    fn reset_restores_pristine_state() {
        let config = DetectorConfig::default();
        let mut state = DetectionState::new(&config);

        state.previous_frame = Some(GrayImage::new(4, 4));
        state.tracked_points = Some(vec![na::Point2::new(1.0, 1.0)]);
        state.history = Some(crate::mhi::MotionHistory::new(4, 4));
        state.decay_rate = 3.0;
        state.motion_threshold = 2500.0;

        state.reset(&config);

        assert!(state.is_pristine());
        assert_approx_eq!(state.decay_rate, config.mhi.default_decay);
        // User-facing sensitivity survives a method switch.
        assert_approx_eq!(state.motion_threshold, 2500.0);
    }
}
