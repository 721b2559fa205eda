//! Gaze-proxy input transform — converts raw pointer samples into a
//! simulated gaze stream with saccadic suppression, fixational jitter, lag,
//! and exponential smoothing.
//!
//! Jitter magnitude is a fixed angular sigma converted to pixels through the
//! per-participant calibration constant, so the simulated tremor is the same
//! visual angle for every participant. One instance per trial block; no
//! state survives across blocks.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::config::{ConfigError, GazeSimConfig};

/// Maximum raw samples retained for the lag lookup.
const RAW_BUFFER_CAP: usize = 512;

// ── Samples and points ──────────────────────────────────────

/// One raw pointer sample from the host's native event source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
    /// Sample timestamp in milliseconds (monotonic clock of the host).
    pub t_ms: f64,
}

/// A simulated gaze position, used for cursor rendering and hit-testing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazePoint {
    pub x: f64,
    pub y: f64,
}

// ── Motion state ────────────────────────────────────────────

/// Velocity classification of the current raw motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// High-velocity ballistic movement; display is frozen.
    Saccade,
    /// Settled gaze; fixational jitter applies.
    Fixation,
    /// Between the two thresholds.
    Transition,
}

impl MotionState {
    /// String representation for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saccade => "saccade",
            Self::Fixation => "fixation",
            Self::Transition => "transition",
        }
    }
}

// ── Transform ───────────────────────────────────────────────

/// The gaze simulation pipeline: classify raw motion, freeze during
/// saccades, jitter during fixations, lag and lerp the displayed position.
///
/// `output` may be called at the same or a higher rate than `push_sample`;
/// the displayed position always moves by exponential interpolation, never
/// in steps.
#[derive(Debug)]
pub struct GazeTransform {
    config: GazeSimConfig,
    pixels_per_degree: f64,
    raw: VecDeque<PointerSample>,
    last_sample: Option<PointerSample>,
    motion_state: MotionState,
    velocity_dps: f64,
    /// Display target captured at saccade onset; cleared on exit.
    frozen: Option<GazePoint>,
    display: Option<GazePoint>,
    jitter: Normal<f64>,
    rng: StdRng,
}

impl GazeTransform {
    /// Construct a transform for one trial block.
    ///
    /// Fails fast when the calibration constant is missing the expected
    /// shape: there is no defaulted jitter magnitude to fall back to.
    pub fn new(config: GazeSimConfig, pixels_per_degree: f64) -> Result<Self, ConfigError> {
        Self::with_rng(config, pixels_per_degree, StdRng::from_entropy())
    }

    /// Construct with an explicit RNG, for deterministic tests and replays.
    pub fn with_rng(
        config: GazeSimConfig,
        pixels_per_degree: f64,
        rng: StdRng,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if !pixels_per_degree.is_finite() || pixels_per_degree <= 0.0 {
            return Err(ConfigError::PixelsPerDegreeInvalid(pixels_per_degree));
        }
        let sigma_px = config.jitter_sigma_deg * pixels_per_degree;
        let jitter = Normal::new(0.0, sigma_px)
            .map_err(|_| ConfigError::JitterSigmaInvalid(config.jitter_sigma_deg))?;
        Ok(Self {
            config,
            pixels_per_degree,
            raw: VecDeque::with_capacity(RAW_BUFFER_CAP),
            last_sample: None,
            motion_state: MotionState::Fixation,
            velocity_dps: 0.0,
            frozen: None,
            display: None,
            jitter,
            rng,
        })
    }

    /// Current velocity classification.
    pub fn motion_state(&self) -> MotionState {
        self.motion_state
    }

    /// Instantaneous angular velocity of the last classified sample (deg/s).
    pub fn velocity_dps(&self) -> f64 {
        self.velocity_dps
    }

    /// Ingest one raw pointer sample.
    ///
    /// Zero or negative `dt` (duplicate or out-of-order timestamps) skips the
    /// velocity computation and keeps the previous classification.
    pub fn push_sample(&mut self, sample: PointerSample) {
        if let Some(prev) = self.last_sample {
            let dt_s = (sample.t_ms - prev.t_ms) / 1000.0;
            if dt_s > 0.0 {
                let dx = sample.x - prev.x;
                let dy = sample.y - prev.y;
                let dist_px = (dx * dx + dy * dy).sqrt();
                self.velocity_dps = dist_px / self.pixels_per_degree / dt_s;
                self.reclassify(sample.t_ms);
            }
        }
        self.last_sample = Some(sample);

        self.raw.push_back(sample);
        while self.raw.len() > RAW_BUFFER_CAP {
            self.raw.pop_front();
        }
    }

    /// Produce the displayed gaze position for the given output time.
    ///
    /// Returns `None` until the first raw sample arrives.
    pub fn output(&mut self, now_ms: f64) -> Option<GazePoint> {
        let base = match self.motion_state {
            // Saccadic suppression: hold the position captured at onset.
            MotionState::Saccade => self.frozen.or_else(|| self.lagged_target(now_ms))?,
            _ => self.lagged_target(now_ms)?,
        };

        let target = if self.motion_state == MotionState::Fixation {
            GazePoint {
                x: base.x + self.jitter.sample(&mut self.rng),
                y: base.y + self.jitter.sample(&mut self.rng),
            }
        } else {
            base
        };

        let alpha = self.config.smoothing_alpha;
        let next = match self.display {
            Some(d) => GazePoint {
                x: d.x + alpha * (target.x - d.x),
                y: d.y + alpha * (target.y - d.y),
            },
            None => target,
        };
        self.display = Some(next);
        Some(next)
    }

    // ── Internal helpers ────────────────────────────────────

    fn reclassify(&mut self, t_ms: f64) {
        let next = if self.velocity_dps >= self.config.saccade_threshold_dps {
            MotionState::Saccade
        } else if self.velocity_dps <= self.config.fixation_threshold_dps {
            MotionState::Fixation
        } else {
            MotionState::Transition
        };

        if next != self.motion_state {
            debug!(
                from = self.motion_state.as_str(),
                to = next.as_str(),
                velocity_dps = self.velocity_dps,
                "motion state change"
            );
            if next == MotionState::Saccade {
                // Capture what is on screen, not the raw position the
                // saccade is flying toward.
                let fallback = self.lagged_target(t_ms);
                self.frozen = self.display.or(fallback);
            } else if self.motion_state == MotionState::Saccade {
                self.frozen = None;
            }
            self.motion_state = next;
        }
    }

    /// The raw sample the display should be tracking: the latest sample at
    /// or before `now - lag_ms`, or the earliest buffered sample when the
    /// stream is younger than the lag.
    fn lagged_target(&self, now_ms: f64) -> Option<GazePoint> {
        let cutoff = now_ms - self.config.lag_ms;
        let mut best: Option<&PointerSample> = None;
        for s in &self.raw {
            if s.t_ms <= cutoff && best.map_or(true, |b| s.t_ms >= b.t_ms) {
                best = Some(s);
            }
        }
        best.or_else(|| self.raw.front())
            .map(|s| GazePoint { x: s.x, y: s.y })
    }
}

// ── Tests ───────────────────────────────────────────────────
