//! Block condition codes — the counterbalancing labels attached to every
//! trial block (`HaA_P1`: hand modality, adaptive UI, pressure on).
//!
//! The session layer cross-checks per-trial context against the parsed
//! condition, so a miswired pressure or modality flag fails loudly at runtime
//! instead of reaching the exported data with a wrong label.

use thiserror::Error;

use crate::trial::Modality;

// ── UI mode ─────────────────────────────────────────────────

/// Whether the block runs with the adaptation engine armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Static,
    Adaptive,
}

impl UiMode {
    /// String representation for logging and the exported CSV.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Adaptive => "adaptive",
        }
    }

    /// Parse a UI mode from its string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "static" => Some(Self::Static),
            "adaptive" => Some(Self::Adaptive),
            _ => None,
        }
    }

    /// Single-letter code used inside block condition codes.
    fn code_char(&self) -> char {
        match self {
            Self::Static => 'S',
            Self::Adaptive => 'A',
        }
    }
}

// ── Parse error ─────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("invalid condition code {0:?}; expected e.g. \"HaA_P0\" or \"GaS_P1\"")]
    Invalid(String),
}

// ── Block condition ─────────────────────────────────────────

/// One cell of the 2x2x2 design, parsed from a block-order condition code.
///
/// Codes look like `HaA_P0`: modality prefix (`Ha` hand, `Ga` gaze), UI mode
/// letter (`A` adaptive, `S` static), then the pressure suffix (`P0`/`P1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCondition {
    pub modality: Modality,
    pub ui_mode: UiMode,
    pub pressure: bool,
}

impl BlockCondition {
    /// Parse a condition code like `HaA_P1`.
    pub fn parse(code: &str) -> Result<Self, ConditionError> {
        let invalid = || ConditionError::Invalid(code.to_string());

        let (head, pressure_str) = code.split_once("_P").ok_or_else(invalid)?;
        let pressure = match pressure_str {
            "0" => false,
            "1" => true,
            _ => return Err(invalid()),
        };

        let modality = match head.get(..2) {
            Some("Ha") => Modality::Hand,
            Some("Ga") => Modality::Gaze,
            _ => return Err(invalid()),
        };
        let ui_mode = match head.get(2..) {
            Some("A") => UiMode::Adaptive,
            Some("S") => UiMode::Static,
            _ => return Err(invalid()),
        };

        Ok(Self {
            modality,
            ui_mode,
            pressure,
        })
    }

    /// Format back to the condition code.
    pub fn code(&self) -> String {
        let modality = match self.modality {
            Modality::Hand => "Ha",
            Modality::Gaze => "Ga",
        };
        format!(
            "{}{}_P{}",
            modality,
            self.ui_mode.code_char(),
            if self.pressure { 1 } else { 0 },
        )
    }
}

// ── Tests ───────────────────────────────────────────────────
