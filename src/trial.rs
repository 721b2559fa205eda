//! Trial outcome records and the rolling history the policy engine
//! evaluates — RT percentile over correct trials and trailing error runs.

use std::collections::VecDeque;

// ── Modality ────────────────────────────────────────────────

/// Input modality for a trial block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    /// Direct pointer input.
    Hand,
    /// Simulated gaze-proxy input.
    Gaze,
}

impl Modality {
    /// String representation for logging and the exported CSV.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hand => "hand",
            Self::Gaze => "gaze",
        }
    }

    /// Parse a modality from its string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "hand" => Some(Self::Hand),
            "gaze" => Some(Self::Gaze),
            _ => None,
        }
    }
}

// ── Error type ──────────────────────────────────────────────

/// How an incorrect trial failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrType {
    /// Selection landed outside the target.
    Miss,
    /// No selection before the deadline; RT is unmeasured.
    Timeout,
    /// Selection started on target but slipped off before confirmation.
    Slip,
}

impl ErrType {
    /// String representation for logging and the exported CSV.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Miss => "miss",
            Self::Timeout => "timeout",
            Self::Slip => "slip",
        }
    }

    /// Parse an error type from its string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "miss" => Some(Self::Miss),
            "timeout" => Some(Self::Timeout),
            "slip" => Some(Self::Slip),
            _ => None,
        }
    }
}

// ── Trial outcome ───────────────────────────────────────────

/// One completed trial, constructed by the trial runner at hit-test or
/// timeout resolution. Immutable once appended to the history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialOutcome {
    pub modality: Modality,
    /// Reaction time in milliseconds; absent only when the trial errored
    /// before measurement (timeout).
    pub rt_ms: Option<f64>,
    pub correct: bool,
    /// Present iff `!correct`.
    pub err_type: Option<ErrType>,
    /// Whether the time-pressure condition was active for this trial.
    pub pressure_enabled: bool,
    /// Monotonically non-decreasing within a participant session.
    pub timestamp_ms: f64,
}

// ── Trial history ───────────────────────────────────────────

/// Append-only record of completed trials for one participant session.
///
/// Duplicate or out-of-order timestamps are accepted: percentile and streak
/// computations operate on insertion order, not timestamp value.
#[derive(Debug, Clone, Default)]
pub struct TrialHistory {
    trials: VecDeque<TrialOutcome>,
}

impl TrialHistory {
    pub fn new() -> Self {
        Self {
            trials: VecDeque::with_capacity(256),
        }
    }

    /// Append a completed trial.
    pub fn push(&mut self, outcome: TrialOutcome) {
        self.trials.push_back(outcome);
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Clear all trials at the start of a new participant session.
    pub fn clear(&mut self) {
        self.trials.clear();
    }

    /// Iterate over trials in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TrialOutcome> {
        self.trials.iter()
    }

    /// Empirical RT percentile over correct trials only.
    ///
    /// Incorrect and timed-out trials are excluded from the baseline: their
    /// RT is absent or not comparable. Returns `None` until at least one
    /// correct trial with a measured RT exists.
    ///
    /// Uses the averaging empirical quantile (`h = n*p + 0.5`), so a
    /// percentile between two observations splits the difference.
    pub fn rt_percentile(&self, p: f64) -> Option<f64> {
        let mut rts: Vec<f64> = self
            .trials
            .iter()
            .filter(|t| t.correct)
            .filter_map(|t| t.rt_ms)
            .collect();
        if rts.is_empty() {
            return None;
        }
        rts.sort_by(|a, b| a.total_cmp(b));

        let n = rts.len();
        if n == 1 {
            return Some(rts[0]);
        }
        let h = n as f64 * p + 0.5;
        let lo = (h.floor() as usize).saturating_sub(1).min(n - 1);
        let hi = (h.ceil() as usize).saturating_sub(1).min(n - 1);
        Some((rts[lo] + rts[hi]) / 2.0)
    }

    /// Length of the consecutive-error run at the end of the history.
    pub fn trailing_error_run(&self) -> u32 {
        self.trials
            .iter()
            .rev()
            .take_while(|t| !t.correct)
            .count() as u32
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

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

    fn error(err_type: ErrType, rt_ms: Option<f64>, timestamp_ms: f64) -> TrialOutcome {
        TrialOutcome {
            modality: Modality::Hand,
            rt_ms,
            correct: false,
            err_type: Some(err_type),
            pressure_enabled: false,
            timestamp_ms,
        }
    }

    #[test]
    fn test_modality_roundtrip() {
        for (s, m) in [("hand", Modality::Hand), ("gaze", Modality::Gaze)] {
            assert_eq!(Modality::from_str(s), Some(m));
            assert_eq!(m.as_str(), s);
        }
        assert_eq!(Modality::from_str("voice"), None);
    }

    #[test]
    fn test_err_type_roundtrip() {
        for (s, e) in [
            ("miss", ErrType::Miss),
            ("timeout", ErrType::Timeout),
            ("slip", ErrType::Slip),
        ] {
            assert_eq!(ErrType::from_str(s), Some(e));
            assert_eq!(e.as_str(), s);
        }
        assert_eq!(ErrType::from_str("unknown"), None);
    }

    #[test]
    fn test_percentile_empty_history() {
        let history = TrialHistory::new();
        assert_eq!(history.rt_percentile(0.75), None);
    }

    #[test]
    fn test_percentile_single_trial() {
        let mut history = TrialHistory::new();
        history.push(correct(500.0, 0.0));
        assert_eq!(history.rt_percentile(0.75), Some(500.0));
    }

    #[test]
    fn test_percentile_excludes_incorrect_trials() {
        let mut history = TrialHistory::new();
        history.push(correct(400.0, 0.0));
        history.push(correct(500.0, 1.0));
        history.push(correct(600.0, 2.0));
        // A very slow miss must not drag the baseline up
        history.push(error(ErrType::Miss, Some(5000.0), 3.0));
        history.push(error(ErrType::Timeout, None, 4.0));

        let p75 = history.rt_percentile(0.75).unwrap();
        assert!(
            p75 <= 600.0,
            "baseline must ignore incorrect-trial RTs, got {p75}"
        );
    }

    #[test]
    fn test_percentile_median_of_four() {
        let mut history = TrialHistory::new();
        for (i, rt) in [400.0, 500.0, 600.0, 700.0].iter().enumerate() {
            history.push(correct(*rt, i as f64));
        }
        // h = 4 * 0.5 + 0.5 = 2.5 → average of 2nd and 3rd order statistics
        let median = history.rt_percentile(0.5).unwrap();
        assert!((median - 550.0).abs() < 1e-9, "median of four: {median}");
    }

    #[test]
    fn test_percentile_insensitive_to_insertion_order() {
        let mut forward = TrialHistory::new();
        let mut backward = TrialHistory::new();
        let rts = [700.0, 400.0, 600.0, 500.0, 800.0];
        for (i, rt) in rts.iter().enumerate() {
            forward.push(correct(*rt, i as f64));
        }
        for (i, rt) in rts.iter().rev().enumerate() {
            backward.push(correct(*rt, i as f64));
        }
        assert_eq!(forward.rt_percentile(0.75), backward.rt_percentile(0.75));
    }

    #[test]
    fn test_trailing_error_run() {
        let mut history = TrialHistory::new();
        assert_eq!(history.trailing_error_run(), 0);

        history.push(correct(500.0, 0.0));
        history.push(error(ErrType::Miss, Some(900.0), 1.0));
        history.push(error(ErrType::Timeout, None, 2.0));
        assert_eq!(history.trailing_error_run(), 2);

        // A correct trial breaks the run
        history.push(correct(450.0, 3.0));
        assert_eq!(history.trailing_error_run(), 0);
    }

    #[test]
    fn test_timeout_counts_toward_error_run_without_rt() {
        let mut history = TrialHistory::new();
        history.push(error(ErrType::Timeout, None, 0.0));
        history.push(error(ErrType::Timeout, None, 1.0));
        assert_eq!(history.trailing_error_run(), 2);
        assert_eq!(history.rt_percentile(0.75), None);
    }

    #[test]
    fn test_out_of_order_timestamps_accepted() {
        let mut history = TrialHistory::new();
        history.push(correct(500.0, 10.0));
        history.push(correct(600.0, 5.0));
        history.push(correct(400.0, 5.0));
        assert_eq!(history.len(), 3);
        assert!(history.rt_percentile(0.5).is_some());
    }

    #[test]
    fn test_clear_resets_history() {
        let mut history = TrialHistory::new();
        history.push(correct(500.0, 0.0));
        history.push(error(ErrType::Slip, Some(700.0), 1.0));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.trailing_error_run(), 0);
        assert_eq!(history.rt_percentile(0.75), None);
    }
}
