//! # Detection session loop
//!
//! Glue between a [`FrameSource`], the [`MotionDetector`] dispatcher and a
//! [`FrameSink`]: one frame is pulled, fully processed and handed to the sink
//! before the next one is read. Single-threaded by design; the dispatcher has
//! exactly one owner and one accessor.

use motion_detect::prelude::v1::*;

/// Running counters over a session.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionStats {
    /// Frames processed so far.
    pub frames: u64,
    /// Frames on which the active method flagged motion.
    pub motion_frames: u64,
}

impl SessionStats {
    /// Share of processed frames that carried motion, in percent.
    pub fn motion_percentage(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.motion_frames as f64 / self.frames as f64 * 100.0
        }
    }
}

/// A frame-at-a-time detection session.
pub struct Session {
    detector: MotionDetector,
    source: Box<dyn FrameSource>,
    sink: Box<dyn FrameSink>,
    stats: SessionStats,
}

impl Session {
    pub fn new(
        detector: MotionDetector,
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self {
            detector,
            source,
            sink,
            stats: SessionStats::default(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }

    /// Forward a control command to the dispatcher.
    pub fn apply(&mut self, command: Command) {
        self.detector.apply(command);
    }

    /// Process the next frame.
    ///
    /// Returns `Ok(false)` once the source is exhausted.
    pub fn step(&mut self) -> Result<bool> {
        let frame = match self.source.next_frame()? {
            Some(frame) => frame,
            None => return Ok(false),
        };

        let result = self.detector.process_frame(&frame)?;

        self.stats.frames += 1;
        if result.motion_detected {
            self.stats.motion_frames += 1;
        }

        self.sink.consume(&result)?;
        Ok(true)
    }

    /// Drain the source to its end.
    pub fn run(&mut self) -> Result<SessionStats> {
        while self.step()? {}
        log::info!(
            "session finished: {} frames, {:.1}% motion",
            self.stats.frames,
            self.stats.motion_percentage()
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motion_detect::config::DetectorConfig;
    use motion_detect::detector::DetectionResult;
    use motion_detect::state::Method;
    use motion_detect::synthetic::SyntheticSource;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CountingSink {
        seen: Rc<RefCell<u64>>,
    }

    impl FrameSink for CountingSink {
        fn consume(&mut self, _result: &DetectionResult) -> Result<()> {
            *self.seen.borrow_mut() += 1;
            Ok(())
        }
    }

    fn session(method: Method, frames: usize) -> (Session, Rc<RefCell<u64>>) {
        let seen = Rc::new(RefCell::new(0));
        let sink = CountingSink { seen: seen.clone() };

        // The synthetic rectangle is small; drop the area cutoff so its
        // difference bands register.
        let mut config = DetectorConfig::default();
        config.motion_threshold = 150.0;

        let session = Session::new(
            MotionDetector::with_method(config, method),
            Box::new(SyntheticSource::new(160, 120, frames).with_velocity(6.0, 0.0)),
            Box::new(sink),
        );
        (session, seen)
    }

    #[test]
    fn run_drains_the_source() {
        let (mut session, seen) = session(Method::FrameDifference, 12);
        let stats = session.run().unwrap();

        assert_eq!(stats.frames, 12);
        assert_eq!(*seen.borrow(), 12);
        assert!(!session.step().unwrap());
    }

    #[test]
    fn moving_rectangle_registers_motion() {
        let (mut session, _) = session(Method::FrameDifference, 10);
        let stats = session.run().unwrap();

        // Bootstrap frame cannot flag motion, the rest should.
        assert!(stats.motion_frames > 0);
        assert!(stats.motion_frames < stats.frames);
        assert!(stats.motion_percentage() > 0.0);
    }

    #[test]
    fn method_switch_mid_session() {
        let (mut session, _) = session(Method::FrameDifference, 8);
        session.step().unwrap();
        session.step().unwrap();

        session.apply(Command::Switch(Method::MotionHistoryImage));
        assert_eq!(session.detector().method(), Method::MotionHistoryImage);
        assert!(session.detector().state().is_pristine());

        // The loop keeps going after the switch; the first frame in the new
        // mode is a bootstrap frame.
        assert!(session.step().unwrap());
    }

    #[test]
    fn empty_source_yields_empty_stats() {
        let (mut session, _) = session(Method::BackgroundSubtraction, 0);
        let stats = session.run().unwrap();
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.motion_percentage(), 0.0);
    }
}
