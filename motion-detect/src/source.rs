//! # Frame source and sink seams
//!
//! The dispatcher itself is purely functional over frames; everything feeding
//! or consuming it hides behind these traits. Camera backends, recorders and
//! windows live outside this crate.

use crate::detector::DetectionResult;
use anyhow::Result;
use image::RgbImage;

/// A sequential source of colour frames.
pub trait FrameSource {
    /// Pull the next frame.
    ///
    /// Returns `Ok(None)` once the stream ends. Sources are sequential;
    /// frames must be processed in the order they are yielded.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Framerate of the stream, if known. Realtime sources may not know it.
    fn framerate(&self) -> Option<f64> {
        None
    }

    /// Frame dimensions, if known before the first frame.
    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }
}

/// Consumer of per-frame detection results (display, recorder, ...).
pub trait FrameSink {
    fn consume(&mut self, result: &DetectionResult) -> Result<()>;
}

/// Sink that drops everything. Useful when only the statistics matter.
pub struct NullSink;

impl FrameSink for NullSink {
    fn consume(&mut self, _result: &DetectionResult) -> Result<()> {
        Ok(())
    }
}
