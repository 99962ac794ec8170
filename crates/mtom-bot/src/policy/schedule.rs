//! Adaptive social weight: turn decay times interaction feedback, clamped around the base λ.

use super::config::LambdaSchedule;

/// Floor of the effective social weight for any agent with a positive base λ.
pub const LAMBDA_FLOOR: f64 = 0.15;
/// Ceiling as a multiple of the base λ.
pub const LAMBDA_CEILING_FACTOR: f64 = 1.6;

/// Per-turn signals feeding the interaction factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionSignals {
    pub turns_remaining: u32,
    pub warmth_mean: f64,
    pub last_response: Option<bool>,
}

pub fn interaction_factor(signals: &InteractionSignals) -> f64 {
    let mut factor = 1.0;
    if signals.turns_remaining <= 1 {
        factor *= 0.8;
    } else if signals.turns_remaining <= 2 {
        factor *= 0.9;
    }
    if signals.warmth_mean < 0.35 {
        factor *= 0.85;
    } else if signals.warmth_mean > 0.65 && signals.last_response == Some(true) {
        factor *= 1.1;
    }
    if signals.last_response == Some(false) {
        factor *= 0.95;
    }
    factor
}

/// Social weight used for this turn's offer search.
pub fn effective_lambda(
    base: f64,
    schedule: Option<&LambdaSchedule>,
    turn: u32,
    signals: &InteractionSignals,
) -> f64 {
    if !base.is_finite() || base <= 0.0 {
        return 0.0;
    }
    let turn_factor = schedule.map_or(1.0, |s| s.factor(turn));
    let raw = base * turn_factor * interaction_factor(signals);
    let ceiling = LAMBDA_CEILING_FACTOR * base;
    let floor = LAMBDA_FLOOR.min(ceiling);
    if raw.is_finite() {
        raw.clamp(floor, ceiling)
    } else {
        base.clamp(floor, ceiling)
    }
}
