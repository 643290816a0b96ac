//! # Detector configuration
//!
//! Every cutoff the detection methods use is carried here as a plain default
//! rather than being buried in the routines. None of the values are tuned; they
//! match the behaviour of common interactive demos of these methods.

use serde::{Deserialize, Serialize};

/// Top-level configuration of the frame processing dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum contour area (in pixels) for a region to count as motion.
    pub motion_threshold: f32,
    /// Step applied by the raise/lower threshold commands.
    pub threshold_step: f32,
    /// Lower bound `motion_threshold` can never cross.
    pub threshold_floor: f32,
    /// Sigma of the Gaussian smoothing applied before differencing/flow.
    pub blur_sigma: f32,
    pub background: BackgroundConfig,
    pub diff: FrameDiffConfig,
    pub sparse: SparseFlowConfig,
    pub dense: DenseFlowConfig,
    pub mhi: MotionHistoryConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            motion_threshold: 1000.0,
            threshold_step: 500.0,
            threshold_floor: 100.0,
            blur_sigma: 3.5,
            background: Default::default(),
            diff: Default::default(),
            sparse: Default::default(),
            dense: Default::default(),
            mhi: Default::default(),
        }
    }
}

/// Gaussian-mixture background model parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Number of Gaussian modes kept per pixel.
    pub modes: usize,
    /// Number of frames the model effectively remembers. The per-frame
    /// learning rate is `1 / history`.
    pub history: f32,
    /// A sample matches a mode when its squared distance to the mean is below
    /// `match_sigma^2 * variance`.
    pub match_sigma: f32,
    /// Variance assigned to a freshly created mode.
    pub initial_variance: f32,
    /// Bounds keeping mode variances from collapsing or exploding.
    pub min_variance: f32,
    pub max_variance: f32,
    /// Modes are background while their cumulative weight stays below this.
    pub background_ratio: f32,
    /// Treat darkened background (shadow) as background.
    pub detect_shadows: bool,
    /// A pixel darker than a background mean but above `shadow_ratio * mean`
    /// is classified as shadow.
    pub shadow_ratio: f32,
    /// Radius of the morphological close/open applied to the foreground mask.
    pub morph_radius: u8,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            modes: 3,
            history: 500.0,
            match_sigma: 2.5,
            initial_variance: 225.0,
            min_variance: 4.0,
            max_variance: 5000.0,
            background_ratio: 0.9,
            detect_shadows: true,
            shadow_ratio: 0.5,
            morph_radius: 2,
        }
    }
}

/// Frame differencing parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameDiffConfig {
    /// Intensity cutoff for the binarised absolute difference.
    pub diff_threshold: u8,
    /// Radius of the dilation closing gaps in the difference mask. Equivalent
    /// to two passes of a 3x3 kernel.
    pub dilate_radius: u8,
}

impl Default for FrameDiffConfig {
    fn default() -> Self {
        Self {
            diff_threshold: 30,
            dilate_radius: 2,
        }
    }
}

/// Sparse (Lucas-Kanade) optical flow parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SparseFlowConfig {
    /// Upper bound on the tracked feature point count.
    pub max_corners: usize,
    /// Corners must score at least this fraction of the strongest response.
    pub quality_level: f32,
    /// Minimum pixel distance between accepted corners.
    pub min_distance: f32,
    /// Side of the window the corner response is aggregated over.
    pub block_size: usize,
    /// The point set is regenerated once fewer than this many survive.
    pub min_tracked: usize,
    /// Displacement (pixels) beyond which a tracked point flags motion.
    pub motion_px: f32,
    /// Half-width of the Lucas-Kanade integration window (radius 7 = 15x15).
    pub window_radius: usize,
    /// Pyramid levels used by the tracker.
    pub pyramid_levels: usize,
    /// Iteration cap of the per-level refinement.
    pub max_iterations: usize,
    /// Refinement stops once the update falls below this many pixels.
    pub epsilon: f32,
}

impl Default for SparseFlowConfig {
    fn default() -> Self {
        Self {
            max_corners: 100,
            quality_level: 0.3,
            min_distance: 7.0,
            block_size: 7,
            min_tracked: 10,
            motion_px: 5.0,
            window_radius: 7,
            pyramid_levels: 3,
            max_iterations: 10,
            epsilon: 0.03,
        }
    }
}

/// Dense (Farneback) optical flow parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenseFlowConfig {
    /// Pyramid levels. Each level halves the resolution (scale 0.5).
    pub levels: usize,
    /// Side of the averaging window the flow equations are blurred over.
    pub window_size: usize,
    /// Refinement iterations per pyramid level.
    pub iterations: usize,
    /// Side of the pixel neighbourhood of the polynomial expansion.
    pub poly_n: usize,
    /// Standard deviation of the expansion applicability weighting.
    pub poly_sigma: f32,
    /// Mean flow magnitude beyond which motion is flagged.
    pub mean_magnitude_threshold: f32,
}

impl Default for DenseFlowConfig {
    fn default() -> Self {
        Self {
            levels: 3,
            window_size: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
            mean_magnitude_threshold: 1.0,
        }
    }
}

/// Motion-history imaging parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotionHistoryConfig {
    /// Intensity cutoff for the inter-frame difference mask.
    pub diff_threshold: u8,
    /// History duration (frames) the buffer is normalised against.
    pub duration: f32,
    /// Default per-frame decay of untouched history cells.
    pub default_decay: f32,
    /// Step applied by the raise/lower decay commands.
    pub decay_step: f32,
    /// Clamp bounds of the decay rate.
    pub decay_min: f32,
    pub decay_max: f32,
    /// Cutoff for binarising the normalised history before contour tracing.
    pub contour_threshold: u8,
}

impl Default for MotionHistoryConfig {
    fn default() -> Self {
        Self {
            diff_threshold: 30,
            duration: 30.0,
            default_decay: 1.0,
            decay_step: 0.5,
            decay_min: 0.1,
            decay_max: 5.0,
            contour_threshold: 50,
        }
    }
}
