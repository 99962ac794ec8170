//! Point-estimate mental state and the linear social score built on it.

use crate::belief::{BeliefState, MAX_MEAN, MIN_MEAN};
use crate::perception::PerceptionModel;
use serde::{Deserialize, Serialize};

/// How an agent believes it is perceived, reduced to two numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MentalState {
    pub warmth: f64,
    pub competence: f64,
}

impl MentalState {
    pub fn new(warmth: f64, competence: f64) -> Self {
        Self {
            warmth: warmth.clamp(0.0, 1.0),
            competence: competence.clamp(0.0, 1.0),
        }
    }

    pub fn neutral() -> Self {
        Self::new(0.5, 0.5)
    }

    pub fn from_belief(belief: &BeliefState) -> Self {
        Self::new(belief.warmth_mean(), belief.competence_mean())
    }

    /// Pseudo-belief for agents without one: the perception predicted for their last own offer.
    pub fn from_offer(offer_for_self: u32, total_resources: u32, model: &PerceptionModel) -> Self {
        let category = model.predict(offer_for_self, total_resources);
        Self::new(
            category.warmth_mean.clamp(MIN_MEAN, MAX_MEAN),
            category.competence_mean.clamp(MIN_MEAN, MAX_MEAN),
        )
    }
}

impl Default for MentalState {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Weighted sum of warmth and competence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearSocialScore {
    pub warmth_weight: f64,
    pub competence_weight: f64,
}

impl LinearSocialScore {
    pub fn new(warmth_weight: f64, competence_weight: f64) -> Self {
        Self {
            warmth_weight,
            competence_weight,
        }
    }

    pub fn score(&self, state: &MentalState) -> f64 {
        self.warmth_weight * state.warmth + self.competence_weight * state.competence
    }
}

impl Default for LinearSocialScore {
    fn default() -> Self {
        Self::new(0.6, 0.4)
    }
}
