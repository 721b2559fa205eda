//! XR adaptive-modality core — adaptation policy engine and gaze-proxy
//! input transform for the pointing-study task runner.
//!
//! The host task runner feeds raw pointer samples through
//! [`gaze::GazeTransform`] to get the simulated gaze cursor, and feeds
//! completed-trial outcomes through [`policy::AdaptationEngine`] (usually via
//! a per-participant [`session::Session`]). The returned
//! [`policy::AdaptationDecision`] tells the UI layer whether to widen the hit
//! target or declutter the HUD. Rendering, hit-testing, and CSV export stay
//! on the host side.

pub mod condition;
pub mod config;
pub mod gaze;
pub mod policy;
pub mod session;
pub mod trial;

pub use condition::{BlockCondition, ConditionError, UiMode};
pub use config::{ConfigError, ExperimentConfig, GazeSimConfig, PolicyConfig};
pub use gaze::{GazePoint, GazeTransform, MotionState, PointerSample};
pub use policy::{AdaptAction, AdaptationDecision, AdaptationEngine, EvalContext};
pub use session::{Session, SessionError, SessionSummary};
pub use trial::{ErrType, Modality, TrialHistory, TrialOutcome};
