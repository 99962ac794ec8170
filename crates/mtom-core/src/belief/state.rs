//! Two-axis belief summarised by Beta means and standard deviations.

use crate::culture::CulturalProfile;
use serde::Serialize;
use statrs::distribution::{Beta, ContinuousCDF};
use std::collections::VecDeque;

/// Lower clamp applied to every belief mean.
pub const MIN_MEAN: f64 = 0.01;
/// Upper clamp applied to every belief mean.
pub const MAX_MEAN: f64 = 0.99;
/// Snapshots retained before the oldest entries are dropped.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// Stereotype-content axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Warmth,
    Competence,
}

impl Axis {
    pub const BOTH: [Axis; 2] = [Axis::Warmth, Axis::Competence];
}

/// Mean and spread of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisBelief {
    pub mean: f64,
    pub uncertainty: f64,
}

impl AxisBelief {
    /// Builds an axis whose spread is the Beta standard deviation at `concentration`.
    pub fn from_mean(mean: f64, concentration: f64) -> Self {
        let mean = clamp_mean(mean);
        Self {
            mean,
            uncertainty: beta_std(mean * concentration, (1.0 - mean) * concentration),
        }
    }

    /// Beta shape parameters implied by this axis at `concentration` pseudo-observations.
    pub fn beta_params(&self, concentration: f64) -> (f64, f64) {
        (self.mean * concentration, (1.0 - self.mean) * concentration)
    }
}

/// Diagnostic copy of both axes at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeliefSnapshot {
    pub warmth: AxisBelief,
    pub competence: AxisBelief,
}

/// Central credible interval for each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CredibleInterval {
    pub mass: f64,
    pub warmth: (f64, f64),
    pub competence: (f64, f64),
}

/// The agent's belief about how the counterpart perceives it.
#[derive(Debug, Clone)]
pub struct BeliefState {
    warmth: AxisBelief,
    competence: AxisBelief,
    prior_strength: f64,
    profile: Option<CulturalProfile>,
    history: VecDeque<BeliefSnapshot>,
    history_capacity: usize,
}

impl BeliefState {
    /// Creates a belief with neutral 0.5/0.5 priors.
    pub fn new(prior_strength: f64) -> Self {
        Self::with_priors(0.5, 0.5, prior_strength, 0.0)
    }

    /// Creates a belief from explicit priors shifted by `adaptive_offset`.
    pub fn with_priors(
        prior_warmth: f64,
        prior_competence: f64,
        prior_strength: f64,
        adaptive_offset: f64,
    ) -> Self {
        let warmth = AxisBelief::from_mean(prior_warmth + adaptive_offset, prior_strength);
        let competence = AxisBelief::from_mean(prior_competence + adaptive_offset, prior_strength);
        let mut state = Self {
            warmth,
            competence,
            prior_strength,
            profile: None,
            history: VecDeque::new(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        };
        state.push_history();
        state
    }

    /// Creates a belief whose priors come from a cultural profile.
    pub fn from_profile(profile: CulturalProfile, prior_strength: f64, adaptive_offset: f64) -> Self {
        let mut state = Self::with_priors(
            profile.prior_warmth,
            profile.prior_competence,
            prior_strength,
            adaptive_offset,
        );
        state.profile = Some(profile);
        state
    }

    /// Caps the retained history; zero disables recording.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        while self.history.len() > capacity {
            self.history.pop_front();
        }
        self
    }

    pub fn warmth(&self) -> AxisBelief {
        self.warmth
    }

    pub fn competence(&self) -> AxisBelief {
        self.competence
    }

    pub fn axis(&self, axis: Axis) -> AxisBelief {
        match axis {
            Axis::Warmth => self.warmth,
            Axis::Competence => self.competence,
        }
    }

    pub fn warmth_mean(&self) -> f64 {
        self.warmth.mean
    }

    pub fn competence_mean(&self) -> f64 {
        self.competence.mean
    }

    pub fn prior_strength(&self) -> f64 {
        self.prior_strength
    }

    pub fn cultural_profile(&self) -> Option<&CulturalProfile> {
        self.profile.as_ref()
    }

    /// Fairness anchor of the attached profile, 0.5 without one.
    pub fn fairness_anchor(&self) -> f64 {
        self.profile.map_or(0.5, |p| p.fairness_anchor)
    }

    pub fn warmth_bias(&self) -> f64 {
        self.profile.map_or(0.0, |p| p.warmth_bias)
    }

    pub fn snapshot(&self) -> BeliefSnapshot {
        BeliefSnapshot {
            warmth: self.warmth,
            competence: self.competence,
        }
    }

    /// Snapshots recorded so far, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &BeliefSnapshot> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Quantile-based interval from the Beta implied at `prior_strength`.
    pub fn credible_interval(&self, mass: f64) -> CredibleInterval {
        let mass = mass.clamp(0.0, 1.0);
        let lower = (1.0 - mass) / 2.0;
        let upper = 1.0 - lower;
        CredibleInterval {
            mass,
            warmth: self.axis_interval(self.warmth, lower, upper),
            competence: self.axis_interval(self.competence, lower, upper),
        }
    }

    fn axis_interval(&self, axis: AxisBelief, lower: f64, upper: f64) -> (f64, f64) {
        let (alpha, beta) = axis.beta_params(self.prior_strength);
        match Beta::new(alpha, beta) {
            Ok(dist) => (dist.inverse_cdf(lower), dist.inverse_cdf(upper)),
            Err(_) => (axis.mean, axis.mean),
        }
    }

    pub(crate) fn set_axes(&mut self, warmth: AxisBelief, competence: AxisBelief) {
        self.warmth = AxisBelief {
            mean: clamp_mean(warmth.mean),
            uncertainty: warmth.uncertainty.max(0.0),
        };
        self.competence = AxisBelief {
            mean: clamp_mean(competence.mean),
            uncertainty: competence.uncertainty.max(0.0),
        };
        self.push_history();
    }

    fn push_history(&mut self) {
        if self.history_capacity == 0 {
            return;
        }
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(self.snapshot());
    }
}

pub(crate) fn clamp_mean(value: f64) -> f64 {
    if value.is_nan() {
        return 0.5;
    }
    value.clamp(MIN_MEAN, MAX_MEAN)
}

/// Standard deviation of Beta(alpha, beta).
pub(crate) fn beta_std(alpha: f64, beta: f64) -> f64 {
    let total = alpha + beta;
    if total <= 0.0 {
        return 0.0;
    }
    ((alpha * beta) / (total * total * (total + 1.0))).sqrt()
}
