//! Experiment configuration — policy thresholds, gaze-simulation parameters,
//! validation, and JSON loading.
//!
//! All validation happens at construction time: a bad config aborts session
//! startup with a clear error instead of running with guessed thresholds.
//! Config is loaded once per session and never mutated afterward; switching
//! configs means constructing a new engine.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::trial::Modality;

// ── Errors ──────────────────────────────────────────────────

/// Fatal configuration errors, raised before any trial runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{modality}.trigger.rt_p must be in (0, 1), got {value}")]
    RtPercentileOutOfRange { modality: &'static str, value: f64 },
    #[error("{modality}.trigger.err_burst must be >= 1")]
    ErrBurstZero { modality: &'static str },
    #[error("hysteresis_trials must be >= 1")]
    HysteresisZero,
    #[error("{modality}.delta_w must be in (0, 1] for inflate_width, got {value}")]
    DeltaWOutOfRange { modality: &'static str, value: f64 },
    #[error("lag_ms must be within [30, 70], got {0}")]
    LagOutOfRange(f64),
    #[error("fixation threshold ({fixation} deg/s) must be below saccade threshold ({saccade} deg/s)")]
    ThresholdsUnordered { fixation: f64, saccade: f64 },
    #[error("jitter_sigma_deg must be finite and >= 0, got {0}")]
    JitterSigmaInvalid(f64),
    #[error("smoothing_alpha must be in (0, 1], got {0}")]
    SmoothingAlphaOutOfRange(f64),
    #[error("pixels_per_degree must be finite and > 0, got {0}; run calibration first")]
    PixelsPerDegreeInvalid(f64),
}

// ── Adaptation actions ──────────────────────────────────────

/// Which UI-level intervention a modality's policy applies when triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Enlarge the clickable target by `delta_w` fraction.
    InflateWidth,
    /// Hide non-essential HUD elements.
    Declutter,
}

impl ActionKind {
    /// String representation for logging and the decision log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InflateWidth => "inflate_width",
            Self::Declutter => "declutter",
        }
    }

    /// Parse an action kind from its string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inflate_width" => Some(Self::InflateWidth),
            "declutter" => Some(Self::Declutter),
            _ => None,
        }
    }
}

// ── Trigger thresholds ──────────────────────────────────────

/// Per-modality trigger thresholds for the adaptation engine.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// RT percentile over correct trials used as the "slow" baseline.
    pub rt_p: f64,
    /// Consecutive-error count that qualifies as an error burst.
    pub err_burst: u32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            rt_p: 0.75,
            err_burst: 2,
        }
    }
}

// ── Per-modality policy block ───────────────────────────────

/// Action and trigger block for one input modality.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ModalityPolicy {
    /// Intervention applied when the trigger fires.
    pub action: ActionKind,
    /// Fractional width increase; meaningful only for `inflate_width`.
    pub delta_w: f64,
    /// Trigger thresholds for this modality.
    pub trigger: TriggerConfig,
}

impl Default for ModalityPolicy {
    fn default() -> Self {
        Self {
            action: ActionKind::InflateWidth,
            delta_w: 0.25,
            trigger: TriggerConfig::default(),
        }
    }
}

// ── Policy config ───────────────────────────────────────────

/// Session-wide adaptation policy configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Master switch; when false the engine always returns no-op.
    pub adaptive: bool,
    /// When true, triggers are evaluated only under the pressure condition.
    pub pressure_only: bool,
    /// Hand-modality action block.
    pub hand: ModalityPolicy,
    /// Gaze-modality action block.
    pub gaze: ModalityPolicy,
    /// Consecutive qualifying evaluations required to flip the engine state,
    /// in both directions.
    pub hysteresis_trials: u32,
    /// Minimum history length before the engine is eligible to adapt.
    pub min_trials_before_adapt: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            adaptive: true,
            pressure_only: false,
            hand: ModalityPolicy {
                action: ActionKind::InflateWidth,
                delta_w: 0.25,
                trigger: TriggerConfig::default(),
            },
            gaze: ModalityPolicy {
                action: ActionKind::Declutter,
                delta_w: 0.0,
                trigger: TriggerConfig::default(),
            },
            hysteresis_trials: 3,
            min_trials_before_adapt: 5,
        }
    }
}

impl PolicyConfig {
    /// The policy block governing the given modality.
    pub fn modality_policy(&self, modality: Modality) -> &ModalityPolicy {
        match modality {
            Modality::Hand => &self.hand,
            Modality::Gaze => &self.gaze,
        }
    }

    /// Validate all threshold fields. Called by the engine constructor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hysteresis_trials == 0 {
            return Err(ConfigError::HysteresisZero);
        }
        for (name, block) in [("hand", &self.hand), ("gaze", &self.gaze)] {
            if !(block.trigger.rt_p > 0.0 && block.trigger.rt_p < 1.0) {
                return Err(ConfigError::RtPercentileOutOfRange {
                    modality: name,
                    value: block.trigger.rt_p,
                });
            }
            if block.trigger.err_burst == 0 {
                return Err(ConfigError::ErrBurstZero { modality: name });
            }
            if block.action == ActionKind::InflateWidth
                && !(block.delta_w > 0.0 && block.delta_w <= 1.0)
            {
                return Err(ConfigError::DeltaWOutOfRange {
                    modality: name,
                    value: block.delta_w,
                });
            }
        }
        Ok(())
    }
}

// ── Gaze simulation config ──────────────────────────────────

/// Parameters for the gaze-proxy input transform.
///
/// `pixels_per_degree` is deliberately not part of this document: it is the
/// per-participant calibration scalar and is passed to the transform
/// constructor separately.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct GazeSimConfig {
    /// Display lag between raw sample arrival and cursor update (ms).
    pub lag_ms: f64,
    /// Angular velocity at or above which motion is a saccade (deg/s).
    pub saccade_threshold_dps: f64,
    /// Angular velocity at or below which motion is a fixation (deg/s).
    pub fixation_threshold_dps: f64,
    /// Standard deviation of fixational jitter (degrees of visual angle).
    pub jitter_sigma_deg: f64,
    /// Exponential lerp factor toward the display target per output tick.
    pub smoothing_alpha: f64,
}

impl Default for GazeSimConfig {
    fn default() -> Self {
        Self {
            lag_ms: 50.0,
            saccade_threshold_dps: 120.0,
            fixation_threshold_dps: 30.0,
            jitter_sigma_deg: 0.15,
            smoothing_alpha: 0.3,
        }
    }
}

impl GazeSimConfig {
    /// Validate simulation parameters. Called by the transform constructor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(30.0..=70.0).contains(&self.lag_ms) {
            return Err(ConfigError::LagOutOfRange(self.lag_ms));
        }
        if self.fixation_threshold_dps >= self.saccade_threshold_dps {
            return Err(ConfigError::ThresholdsUnordered {
                fixation: self.fixation_threshold_dps,
                saccade: self.saccade_threshold_dps,
            });
        }
        if !self.jitter_sigma_deg.is_finite() || self.jitter_sigma_deg < 0.0 {
            return Err(ConfigError::JitterSigmaInvalid(self.jitter_sigma_deg));
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(ConfigError::SmoothingAlphaOutOfRange(self.smoothing_alpha));
        }
        Ok(())
    }
}

// ── Top-level document ──────────────────────────────────────

/// The full configuration document as loaded from disk.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub policy: PolicyConfig,
    pub gaze: GazeSimConfig,
}

impl ExperimentConfig {
    /// Load and validate a config document from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.policy.validate()?;
        config.gaze.validate()?;
        Ok(config)
    }
}

// ── Tests ───────────────────────────────────────────────────
