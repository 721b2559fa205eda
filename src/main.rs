//! xamod-session — headless driver for the adaptive-modality core.
//!
//! Runs a synthetic trial block through the session layer so a condition
//! code, config document, and seed can be exercised end to end without the
//! browser task runner.

use std::path::PathBuf;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use xamod_core::{
    BlockCondition, ErrType, EvalContext, ExperimentConfig, GazeTransform, Modality,
    MotionState, PointerSample, Session, TrialOutcome, UiMode,
};

#[derive(Parser, Debug)]
#[command(name = "xamod-session", about = "XR adaptive-modality headless session driver")]
struct Cli {
    /// Path to a JSON config document (defaults derived from the condition)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Block condition code, e.g. HaA_P0 or GaS_P1
    #[arg(long, default_value = "HaA_P0")]
    condition: String,

    /// Number of synthetic trials to run
    #[arg(long, default_value_t = 40)]
    trials: u32,

    /// RNG seed for the synthetic trial stream
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Participant label for the log
    #[arg(long, default_value = "P000")]
    participant: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xamod_core=info,xamod_session=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let condition = BlockCondition::parse(&cli.condition)?;

    let config = match &cli.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => {
            // Without an explicit document, arm the engine per the condition
            // code so the session-level consistency check passes.
            let mut config = ExperimentConfig::default();
            config.policy.adaptive = condition.ui_mode == UiMode::Adaptive;
            config.policy.pressure_only = false;
            config
        }
    };
    config.policy.validate()?;
    config.gaze.validate()?;

    info!(
        participant = %cli.participant,
        condition = %condition.code(),
        trials = cli.trials,
        seed = cli.seed,
        "starting synthetic block"
    );

    let mut session = Session::new(cli.participant.clone(), condition, config.policy)?;
    let mut rng = StdRng::seed_from_u64(cli.seed);

    if condition.modality == Modality::Gaze {
        run_gaze_preview(&config, cli.seed)?;
    }

    let mut last_action = "none";
    for i in 0..cli.trials {
        let (outcome, ctx) = synth_trial(&mut rng, i, cli.trials, condition);
        let decision = session.complete_trial(outcome, &ctx)?;
        if decision.action.as_str() != last_action {
            info!(
                trial = i,
                action = decision.action.as_str(),
                reason = decision.reason,
                "adaptation decision changed"
            );
            last_action = decision.action.as_str();
        }
    }

    let summary = session.summary();
    info!(
        trials = summary.trials,
        activations = summary.activations,
        deactivations = summary.deactivations,
        adapted_at_end = summary.currently_adapted,
        "block complete"
    );
    Ok(())
}

/// Generate one synthetic trial. The middle third of the block degrades
/// (slower, error-prone) so the adaptation engine has something to react to.
fn synth_trial(
    rng: &mut StdRng,
    index: u32,
    total: u32,
    condition: BlockCondition,
) -> (TrialOutcome, EvalContext) {
    let degraded = index >= total / 3 && index < 2 * total / 3;

    let base_rt = match condition.modality {
        Modality::Hand => 650.0,
        Modality::Gaze => 900.0,
    };
    let mean = if degraded { base_rt + 400.0 } else { base_rt };
    let rt = (mean + (rng.gen::<f64>() - 0.5) * 240.0).max(150.0);

    let err_p = if degraded { 0.35 } else { 0.05 };
    let correct = rng.gen::<f64>() >= err_p;
    let (rt_ms, err_type) = if correct {
        (Some(rt), None)
    } else {
        match rng.gen_range(0..3) {
            0 => (Some(rt), Some(ErrType::Miss)),
            1 => (None, Some(ErrType::Timeout)),
            _ => (Some(rt), Some(ErrType::Slip)),
        }
    };

    let outcome = TrialOutcome {
        modality: condition.modality,
        rt_ms,
        correct,
        err_type,
        pressure_enabled: condition.pressure,
        timestamp_ms: index as f64 * 1500.0,
    };
    let ctx = EvalContext {
        modality: condition.modality,
        pressure: condition.pressure,
        pressure_enabled: condition.pressure,
        current_rt: rt_ms,
    };
    (outcome, ctx)
}

/// Push a short fixation-saccade-fixation trace through the gaze transform
/// and log what the classifier saw, as a sanity preview for gaze blocks.
fn run_gaze_preview(config: &ExperimentConfig, seed: u64) -> anyhow::Result<()> {
    let pixels_per_degree = 38.0;
    let mut transform = GazeTransform::with_rng(
        config.gaze,
        pixels_per_degree,
        StdRng::seed_from_u64(seed),
    )?;

    let mut saccade_ticks = 0u32;
    let mut fixation_ticks = 0u32;
    let mut t = 0.0;

    let mut tick = |transform: &mut GazeTransform, t: f64| {
        match transform.motion_state() {
            MotionState::Saccade => saccade_ticks += 1,
            MotionState::Fixation => fixation_ticks += 1,
            MotionState::Transition => {}
        }
        transform.output(t);
    };

    for _ in 0..30 {
        transform.push_sample(PointerSample { x: 400.0, y: 300.0, t_ms: t });
        t += 10.0;
        tick(&mut transform, t);
    }
    let mut x = 400.0;
    for _ in 0..5 {
        x += 90.0;
        transform.push_sample(PointerSample { x, y: 300.0, t_ms: t });
        t += 10.0;
        tick(&mut transform, t);
    }
    for _ in 0..50 {
        transform.push_sample(PointerSample { x, y: 300.0, t_ms: t });
        t += 10.0;
        tick(&mut transform, t);
    }

    info!(
        saccade_ticks,
        fixation_ticks,
        final_state = transform.motion_state().as_str(),
        "gaze transform preview"
    );
    Ok(())
}
