//! Adaptation policy engine — hysteresis-debounced trigger rule over a
//! rolling trial history.
//!
//! After each completed trial the engine decides whether a UI-level
//! intervention should be active for the current modality: a slow trial
//! (above the RT percentile baseline) or a consecutive-error burst qualifies
//! as a trigger, and `hysteresis_trials` consecutive qualifying (or
//! non-qualifying) evaluations are required to flip the engine on (or off),
//! so a single noisy trial never toggles the UI.

use tracing::{debug, info};

use crate::config::{ActionKind, ConfigError, PolicyConfig};
use crate::trial::{Modality, TrialHistory, TrialOutcome};

// ── Decision ────────────────────────────────────────────────

/// UI-level intervention emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdaptAction {
    /// Leave the UI as-is.
    None,
    /// Enlarge the clickable target by `magnitude` fraction.
    InflateWidth { magnitude: f64 },
    /// Hide non-essential HUD elements.
    Declutter,
}

impl AdaptAction {
    /// String representation for logging and the decision log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::InflateWidth { .. } => "inflate_width",
            Self::Declutter => "declutter",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// The engine's answer for one evaluation call. Not stored by the engine;
/// the host applies `action` and may log `reason` for the debrief.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptationDecision {
    pub action: AdaptAction,
    pub reason: &'static str,
}

impl AdaptationDecision {
    fn none(reason: &'static str) -> Self {
        Self {
            action: AdaptAction::None,
            reason,
        }
    }
}

// ── Evaluation context ──────────────────────────────────────

/// Per-evaluation context supplied by the trial runner alongside each
/// completed trial.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    pub modality: Modality,
    /// Block-level pressure condition (the P0/P1 label).
    pub pressure: bool,
    /// Whether time pressure was actually active for this trial.
    pub pressure_enabled: bool,
    /// RT of the trial just completed; absent on timeout.
    pub current_rt: Option<f64>,
}

// ── Engine ──────────────────────────────────────────────────

/// Per-participant adaptation engine. One instance per session, invoked
/// strictly sequentially: `add_trial` then `next_policy_state`, once per
/// completed trial.
///
/// State machine: Inactive ⇄ Active. Turning on requires
/// `hysteresis_trials` consecutive qualifying evaluations; turning off
/// requires the same count of non-qualifying ones. No other transitions.
#[derive(Debug)]
pub struct AdaptationEngine {
    config: PolicyConfig,
    history: TrialHistory,
    consecutive_bad: u32,
    consecutive_good: u32,
    currently_adapted: bool,
    /// The action emitted at the last turn-on, re-emitted in steady state.
    active_action: AdaptAction,
}

impl AdaptationEngine {
    /// Construct an engine, rejecting invalid configuration up front.
    pub fn new(config: PolicyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            history: TrialHistory::new(),
            consecutive_bad: 0,
            consecutive_good: 0,
            currently_adapted: false,
            active_action: AdaptAction::None,
        })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn history(&self) -> &TrialHistory {
        &self.history
    }

    /// Whether an adaptation is presently active.
    pub fn is_adapted(&self) -> bool {
        self.currently_adapted
    }

    /// Append a completed trial to the history. No validation beyond shape;
    /// duplicate or out-of-order timestamps are accepted.
    pub fn add_trial(&mut self, outcome: TrialOutcome) {
        self.history.push(outcome);
    }

    /// Reset all per-session state at the start of a new participant.
    pub fn reset(&mut self) {
        self.history.clear();
        self.consecutive_bad = 0;
        self.consecutive_good = 0;
        self.currently_adapted = false;
        self.active_action = AdaptAction::None;
        info!("adaptation engine reset for new session");
    }

    /// Evaluate the policy for the trial just completed.
    ///
    /// Mutates only the hysteresis counters and the active flag; the history
    /// is read, never written.
    pub fn next_policy_state(&mut self, ctx: &EvalContext) -> AdaptationDecision {
        if !self.config.adaptive {
            return AdaptationDecision::none("adaptation disabled");
        }

        // Gating condition, not a trigger evaluation: counters stay untouched.
        if self.config.pressure_only && !ctx.pressure_enabled {
            return AdaptationDecision::none("pressure mode not enabled");
        }

        if (self.history.len() as u32) < self.config.min_trials_before_adapt {
            return AdaptationDecision::none("insufficient trial history");
        }

        let policy = *self.config.modality_policy(ctx.modality);
        let baseline = self.history.rt_percentile(policy.trigger.rt_p);
        let slow = match (ctx.current_rt, baseline) {
            (Some(rt), Some(p)) => rt > p,
            _ => false,
        };
        let burst = self.history.trailing_error_run() >= policy.trigger.err_burst;
        let qualifying = slow || burst;

        if qualifying {
            self.consecutive_bad += 1;
            self.consecutive_good = 0;
        } else {
            self.consecutive_good += 1;
            self.consecutive_bad = 0;
        }
        debug!(
            modality = ctx.modality.as_str(),
            slow,
            burst,
            bad = self.consecutive_bad,
            good = self.consecutive_good,
            adapted = self.currently_adapted,
            "policy evaluation"
        );

        if !self.currently_adapted && self.consecutive_bad >= self.config.hysteresis_trials {
            self.currently_adapted = true;
            self.active_action = match policy.action {
                ActionKind::InflateWidth => AdaptAction::InflateWidth {
                    magnitude: policy.delta_w,
                },
                ActionKind::Declutter => AdaptAction::Declutter,
            };
            let reason = if slow {
                "triggered: rt>p75"
            } else {
                "triggered: err_burst"
            };
            info!(
                modality = ctx.modality.as_str(),
                action = self.active_action.as_str(),
                reason,
                "adaptation activated"
            );
            return AdaptationDecision {
                action: self.active_action,
                reason,
            };
        }

        if self.currently_adapted && self.consecutive_good >= self.config.hysteresis_trials {
            self.currently_adapted = false;
            self.active_action = AdaptAction::None;
            info!(
                modality = ctx.modality.as_str(),
                "adaptation deactivated, performance improved"
            );
            return AdaptationDecision::none("performance improved");
        }

        // No transition this call: re-emit the currently active decision.
        if self.currently_adapted {
            AdaptationDecision {
                action: self.active_action,
                reason: "steady state",
            }
        } else {
            AdaptationDecision::none("steady state")
        }
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::ErrType;

    fn config(hysteresis: u32, min_trials: u32) -> PolicyConfig {
        PolicyConfig {
            hysteresis_trials: hysteresis,
            min_trials_before_adapt: min_trials,
            ..PolicyConfig::default()
        }
    }

    fn correct(rt_ms: f64, timestamp_ms: f64) -> TrialOutcome {
        TrialOutcome {
            modality: Modality::Hand,
            rt_ms: Some(rt_ms),
            correct: true,
            err_type: None,
            pressure_enabled: false,
            timestamp_ms,
        }
    }

    fn miss(timestamp_ms: f64) -> TrialOutcome {
        TrialOutcome {
            modality: Modality::Hand,
            rt_ms: Some(900.0),
            correct: false,
            err_type: Some(ErrType::Miss),
            pressure_enabled: false,
            timestamp_ms,
        }
    }

    fn ctx(rt: Option<f64>) -> EvalContext {
        EvalContext {
            modality: Modality::Hand,
            pressure: false,
            pressure_enabled: false,
            current_rt: rt,
        }
    }

    /// Seed the history with a stable RT baseline so percentile triggers
    /// behave predictably in the scenarios below.
    fn seed_baseline(engine: &mut AdaptationEngine, n: usize) {
        for i in 0..n {
            engine.add_trial(correct(500.0, i as f64 * 1000.0));
            let decision = engine.next_policy_state(&ctx(Some(500.0)));
            assert!(decision.action.is_none());
        }
    }

    #[test]
    fn test_disabled_engine_always_noop() {
        let mut engine = AdaptationEngine::new(PolicyConfig {
            adaptive: false,
            ..PolicyConfig::default()
        })
        .unwrap();
        for i in 0..10 {
            engine.add_trial(miss(i as f64));
            let decision = engine.next_policy_state(&ctx(None));
            assert!(decision.action.is_none());
            assert_eq!(decision.reason, "adaptation disabled");
        }
        assert!(!engine.is_adapted());
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let bad = PolicyConfig {
            hysteresis_trials: 0,
            ..PolicyConfig::default()
        };
        assert!(AdaptationEngine::new(bad).is_err());
    }

    // Scenario 1: 3 consecutive errors with hysteresis 3, err_burst 2 —
    // Active exactly at the 3rd qualifying evaluation, not earlier.
    #[test]
    fn test_error_burst_activates_after_hysteresis() {
        let mut engine = AdaptationEngine::new(config(3, 3)).unwrap();
        seed_baseline(&mut engine, 3);

        // Trials 1-2: errors. Burst of >=2 is reached at trial 2, but the
        // first error alone does not qualify via burst (run length 1 < 2)
        // and RT 900 > p75 does qualify each evaluation.
        let mut transitions = 0;
        for i in 0..3 {
            engine.add_trial(miss(4000.0 + i as f64));
            let decision = engine.next_policy_state(&ctx(Some(900.0)));
            if i < 2 {
                assert!(
                    decision.action.is_none(),
                    "must stay inactive at qualifying evaluation {}",
                    i + 1
                );
            } else {
                assert!(!decision.action.is_none(), "must activate at evaluation 3");
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
        assert!(engine.is_adapted());
    }

    // Scenario 2: 2 errors then a fast correct trial — bad counter resets,
    // engine stays inactive.
    #[test]
    fn test_good_trial_resets_bad_counter() {
        let mut engine = AdaptationEngine::new(config(3, 3)).unwrap();
        seed_baseline(&mut engine, 3);

        engine.add_trial(miss(4000.0));
        engine.next_policy_state(&ctx(Some(900.0)));
        engine.add_trial(miss(5000.0));
        engine.next_policy_state(&ctx(Some(900.0)));

        // Fast correct trial: not slow, breaks the error run.
        engine.add_trial(correct(300.0, 6000.0));
        let decision = engine.next_policy_state(&ctx(Some(300.0)));
        assert!(decision.action.is_none());
        assert!(!engine.is_adapted());

        // One more error must not activate: the streak restarted.
        engine.add_trial(miss(7000.0));
        engine.add_trial(miss(8000.0));
        engine.next_policy_state(&ctx(Some(900.0)));
        let decision = engine.next_policy_state(&ctx(Some(900.0)));
        assert!(decision.action.is_none());
    }

    // Scenario 3: pressure_only with pressure off — always None, counters
    // untouched by the gated evaluations.
    #[test]
    fn test_pressure_gating_precedence() {
        let mut engine = AdaptationEngine::new(PolicyConfig {
            pressure_only: true,
            hysteresis_trials: 2,
            min_trials_before_adapt: 1,
            ..PolicyConfig::default()
        })
        .unwrap();

        for i in 0..8 {
            engine.add_trial(miss(i as f64 * 1000.0));
            let decision = engine.next_policy_state(&EvalContext {
                modality: Modality::Hand,
                pressure: false,
                pressure_enabled: false,
                current_rt: Some(2000.0),
            });
            assert!(decision.action.is_none());
            assert_eq!(decision.reason, "pressure mode not enabled");
        }
        assert!(!engine.is_adapted());

        // Once pressure is on, the accumulated error run is visible but the
        // hysteresis counters start from zero: two evaluations to activate.
        let pressured = EvalContext {
            modality: Modality::Hand,
            pressure: true,
            pressure_enabled: true,
            current_rt: Some(2000.0),
        };
        engine.add_trial(miss(9000.0));
        let first = engine.next_policy_state(&pressured);
        assert!(
            first.action.is_none(),
            "gated calls must not have advanced the bad counter"
        );
        engine.add_trial(miss(10000.0));
        let second = engine.next_policy_state(&pressured);
        assert!(!second.action.is_none());
    }

    // Scenario 5: min_trials_before_adapt 5, only 4 trials — None even
    // though trigger conditions hold.
    #[test]
    fn test_min_trials_gate() {
        let mut engine = AdaptationEngine::new(PolicyConfig {
            hysteresis_trials: 1,
            min_trials_before_adapt: 5,
            ..PolicyConfig::default()
        })
        .unwrap();

        for i in 0..4 {
            engine.add_trial(miss(i as f64 * 1000.0));
            let decision = engine.next_policy_state(&ctx(Some(2000.0)));
            assert!(decision.action.is_none());
            assert_eq!(decision.reason, "insufficient trial history");
        }
        assert!(!engine.is_adapted());
    }

    #[test]
    fn test_slow_trial_alone_qualifies() {
        // A single very slow correct trial is as actionable as an error
        // burst: OR, not AND.
        let mut engine = AdaptationEngine::new(config(1, 4)).unwrap();
        seed_baseline(&mut engine, 4);

        engine.add_trial(correct(3000.0, 9000.0));
        let decision = engine.next_policy_state(&ctx(Some(3000.0)));
        assert_eq!(
            decision.action,
            AdaptAction::InflateWidth { magnitude: 0.25 }
        );
        assert_eq!(decision.reason, "triggered: rt>p75");
    }

    #[test]
    fn test_gaze_modality_emits_declutter() {
        let mut engine = AdaptationEngine::new(config(1, 1)).unwrap();
        let gaze_miss = TrialOutcome {
            modality: Modality::Gaze,
            rt_ms: None,
            correct: false,
            err_type: Some(ErrType::Timeout),
            pressure_enabled: false,
            timestamp_ms: 0.0,
        };
        engine.add_trial(gaze_miss);
        engine.add_trial(TrialOutcome {
            timestamp_ms: 1000.0,
            ..gaze_miss
        });
        let decision = engine.next_policy_state(&EvalContext {
            modality: Modality::Gaze,
            pressure: false,
            pressure_enabled: false,
            current_rt: None,
        });
        assert_eq!(decision.action, AdaptAction::Declutter);
        assert_eq!(decision.reason, "triggered: err_burst");
    }

    #[test]
    fn test_steady_state_reemits_active_action() {
        let mut engine = AdaptationEngine::new(config(2, 3)).unwrap();
        seed_baseline(&mut engine, 3);

        // Activate via two slow evaluations. RTs keep rising so each stays
        // above the baseline even as the slow trials join it.
        for (i, rt) in [3000.0, 4000.0].iter().enumerate() {
            engine.add_trial(correct(*rt, 4000.0 + i as f64));
            engine.next_policy_state(&ctx(Some(*rt)));
        }
        assert!(engine.is_adapted());

        // One good trial: below hysteresis, the active action is re-emitted
        // unchanged.
        engine.add_trial(correct(300.0, 7000.0));
        let decision = engine.next_policy_state(&ctx(Some(300.0)));
        assert_eq!(
            decision.action,
            AdaptAction::InflateWidth { magnitude: 0.25 }
        );
        assert_eq!(decision.reason, "steady state");
        assert!(engine.is_adapted());
    }

    #[test]
    fn test_deactivation_requires_hysteresis() {
        let mut engine = AdaptationEngine::new(config(3, 3)).unwrap();
        seed_baseline(&mut engine, 3);

        for (i, rt) in [3000.0, 4000.0, 5000.0].iter().enumerate() {
            engine.add_trial(correct(*rt, 4000.0 + i as f64));
            engine.next_policy_state(&ctx(Some(*rt)));
        }
        assert!(engine.is_adapted());

        // Two good trials: still active.
        for i in 0..2 {
            engine.add_trial(correct(300.0, 8000.0 + i as f64));
            let decision = engine.next_policy_state(&ctx(Some(300.0)));
            assert!(!decision.action.is_none());
        }
        // Third good trial: deactivates.
        engine.add_trial(correct(300.0, 10000.0));
        let decision = engine.next_policy_state(&ctx(Some(300.0)));
        assert!(decision.action.is_none());
        assert_eq!(decision.reason, "performance improved");
        assert!(!engine.is_adapted());
    }

    #[test]
    fn test_hysteresis_bounds_transition_count() {
        // Alternating qualify/recover trials with hysteresis 2 must never
        // flip the state: each switch resets the opposing counter.
        let mut engine = AdaptationEngine::new(config(2, 4)).unwrap();
        seed_baseline(&mut engine, 4);

        for i in 0..20 {
            let (outcome, rt) = if i % 2 == 0 {
                (correct(3000.0, 5000.0 + i as f64), Some(3000.0))
            } else {
                (correct(300.0, 5000.0 + i as f64), Some(300.0))
            };
            engine.add_trial(outcome);
            let decision = engine.next_policy_state(&ctx(rt));
            assert!(
                decision.action.is_none(),
                "flapping input must never activate with hysteresis 2"
            );
        }
        assert!(!engine.is_adapted());
    }

    #[test]
    fn test_no_baseline_without_correct_trials() {
        // No correct trial has an RT yet, so the percentile baseline is
        // absent and the slow-trial condition cannot fire. err_burst is set
        // high so the burst trigger stays out of the way.
        let mut policy = PolicyConfig {
            hysteresis_trials: 1,
            min_trials_before_adapt: 1,
            ..PolicyConfig::default()
        };
        policy.hand.trigger.err_burst = 10;
        let mut engine = AdaptationEngine::new(policy).unwrap();

        for i in 0..5 {
            engine.add_trial(miss(i as f64 * 1000.0));
            let decision = engine.next_policy_state(&ctx(Some(5000.0)));
            assert!(decision.action.is_none());
        }
        assert!(!engine.is_adapted());
    }

    #[test]
    fn test_reset_clears_session_state() {
        let mut engine = AdaptationEngine::new(config(1, 1)).unwrap();
        engine.add_trial(miss(0.0));
        engine.add_trial(miss(1000.0));
        engine.next_policy_state(&ctx(Some(2000.0)));
        assert!(engine.is_adapted());

        engine.reset();
        assert!(!engine.is_adapted());
        assert!(engine.history().is_empty());
    }
}
