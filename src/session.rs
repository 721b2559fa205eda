//! Per-participant session wrapper — owns the adaptation engine, keeps the
//! decision log for the debrief export, and cross-checks every trial's
//! context against the block condition.
//!
//! The cross-checks exist because a miswired pressure flag once reached the
//! exported data for several participants before a manual audit caught it.
//! Mislabeled context now fails loudly here instead of reaching the engine
//! or the log with a wrong condition label.

use thiserror::Error;
use tracing::{info, warn};

use crate::condition::{BlockCondition, UiMode};
use crate::config::{ConfigError, PolicyConfig};
use crate::policy::{AdaptAction, AdaptationDecision, AdaptationEngine, EvalContext};
use crate::trial::{ErrType, TrialOutcome};

// ── Errors ──────────────────────────────────────────────────

/// Rejections raised by the session layer's eager validation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("condition {code} is {ui_mode} but config.adaptive is {adaptive}")]
    ConditionConfigMismatch {
        code: String,
        ui_mode: &'static str,
        adaptive: bool,
    },
    #[error("context modality {got} does not match block condition {expected}")]
    ModalityMismatch {
        expected: &'static str,
        got: &'static str,
    },
    #[error("pressure flag {got} does not match block condition {code}")]
    PressureMismatch { code: String, got: bool },
    #[error("outcome shape invalid: {0}")]
    OutcomeShape(&'static str),
}

// ── Decision log ────────────────────────────────────────────

/// One evaluated trial in the session's decision log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionRecord {
    /// Zero-based index of the trial within the session.
    pub trial_index: u32,
    pub action: AdaptAction,
    pub reason: &'static str,
}

/// End-of-block summary for logging and the participant tracking sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub trials: u32,
    pub activations: u32,
    pub deactivations: u32,
    pub currently_adapted: bool,
}

// ── Session ─────────────────────────────────────────────────

/// One participant's session: engine, condition, and decision log.
#[derive(Debug)]
pub struct Session {
    participant: String,
    condition: BlockCondition,
    engine: AdaptationEngine,
    decisions: Vec<DecisionRecord>,
    activations: u32,
    deactivations: u32,
}

impl Session {
    /// Construct a session, validating the policy config and its agreement
    /// with the block condition up front.
    pub fn new(
        participant: impl Into<String>,
        condition: BlockCondition,
        policy: PolicyConfig,
    ) -> Result<Self, SessionError> {
        let expect_adaptive = condition.ui_mode == UiMode::Adaptive;
        if policy.adaptive != expect_adaptive {
            return Err(SessionError::ConditionConfigMismatch {
                code: condition.code(),
                ui_mode: condition.ui_mode.as_str(),
                adaptive: policy.adaptive,
            });
        }
        let engine = AdaptationEngine::new(policy)?;
        let participant = participant.into();
        info!(
            participant = %participant,
            condition = %condition.code(),
            "session started"
        );
        Ok(Self {
            participant,
            condition,
            engine,
            decisions: Vec::with_capacity(128),
            activations: 0,
            deactivations: 0,
        })
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn condition(&self) -> BlockCondition {
        self.condition
    }

    pub fn engine(&self) -> &AdaptationEngine {
        &self.engine
    }

    /// The append-only decision log, one record per evaluated trial.
    pub fn decision_log(&self) -> &[DecisionRecord] {
        &self.decisions
    }

    /// Record one completed trial and evaluate the adaptation policy.
    ///
    /// Rejects mislabeled context before anything reaches the engine: the
    /// modality and pressure flags of both the outcome and the context must
    /// agree with the block condition, and the outcome must be internally
    /// consistent (error type present iff incorrect, no RT on timeouts).
    pub fn complete_trial(
        &mut self,
        outcome: TrialOutcome,
        ctx: &EvalContext,
    ) -> Result<AdaptationDecision, SessionError> {
        self.check_labels(&outcome, ctx)?;
        Self::check_outcome_shape(&outcome)?;

        let was_adapted = self.engine.is_adapted();
        self.engine.add_trial(outcome);
        let decision = self.engine.next_policy_state(ctx);
        let is_adapted = self.engine.is_adapted();

        if !was_adapted && is_adapted {
            self.activations += 1;
        } else if was_adapted && !is_adapted {
            self.deactivations += 1;
        }

        self.decisions.push(DecisionRecord {
            trial_index: self.decisions.len() as u32,
            action: decision.action,
            reason: decision.reason,
        });
        Ok(decision)
    }

    /// End-of-block summary.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            trials: self.decisions.len() as u32,
            activations: self.activations,
            deactivations: self.deactivations,
            currently_adapted: self.engine.is_adapted(),
        }
    }

    // ── Internal checks ─────────────────────────────────────

    fn check_labels(
        &self,
        outcome: &TrialOutcome,
        ctx: &EvalContext,
    ) -> Result<(), SessionError> {
        for modality in [ctx.modality, outcome.modality] {
            if modality != self.condition.modality {
                warn!(
                    participant = %self.participant,
                    expected = self.condition.modality.as_str(),
                    got = modality.as_str(),
                    "modality label mismatch"
                );
                return Err(SessionError::ModalityMismatch {
                    expected: self.condition.modality.as_str(),
                    got: modality.as_str(),
                });
            }
        }
        for pressure in [ctx.pressure, ctx.pressure_enabled, outcome.pressure_enabled] {
            if pressure != self.condition.pressure {
                warn!(
                    participant = %self.participant,
                    condition = %self.condition.code(),
                    got = pressure,
                    "pressure label mismatch"
                );
                return Err(SessionError::PressureMismatch {
                    code: self.condition.code(),
                    got: pressure,
                });
            }
        }
        Ok(())
    }

    fn check_outcome_shape(outcome: &TrialOutcome) -> Result<(), SessionError> {
        if outcome.correct && outcome.err_type.is_some() {
            return Err(SessionError::OutcomeShape(
                "correct trial carries an error type",
            ));
        }
        if !outcome.correct && outcome.err_type.is_none() {
            return Err(SessionError::OutcomeShape(
                "incorrect trial missing its error type",
            ));
        }
        if outcome.err_type == Some(ErrType::Timeout) && outcome.rt_ms.is_some() {
            return Err(SessionError::OutcomeShape("timeout trial carries an RT"));
        }
        if matches!(outcome.rt_ms, Some(rt) if !(rt > 0.0) || !rt.is_finite()) {
            return Err(SessionError::OutcomeShape("rt_ms must be positive and finite"));
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────
