//! # Motion Detection Library
//!
//! This library provides five classical motion detection methods operating on a
//! sequential stream of colour frames: background subtraction against a
//! Gaussian-mixture model, frame differencing, sparse (Lucas-Kanade) optical
//! flow, dense (Farneback) optical flow, and motion-history imaging.
//!
//! All per-method state lives in a single [`state::DetectionState`] owned by the
//! [`detector::MotionDetector`] dispatcher. Switching methods fully resets that
//! state, so no method ever observes leftovers of another.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use motion_detect::prelude::v1::*;
//! ```

pub mod annotate;
pub mod background;
pub mod config;
pub mod contour;
pub mod detector;
pub mod farneback;
pub mod features;
pub mod frame;
pub mod lk;
pub mod mhi;
pub mod pyramid;
pub mod source;
pub mod state;
pub mod synthetic;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            config::DetectorConfig,
            detector::{Command, DetectionResult, MotionDetector},
            source::{FrameSink, FrameSource, NullSink},
            state::{DetectionState, Method},
        };
        pub use anyhow::{anyhow, Error, Result};
    }
}
