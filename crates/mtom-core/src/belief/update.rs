//! Conjugate Beta update of the two-axis belief.

use super::state::{AxisBelief, BeliefState, beta_std, clamp_mean};

/// Amplification applied to each observation's pseudo-count.
///
/// A single observation has to visibly move the belief within a two to four turn episode.
pub const DEFAULT_EVIDENCE_MULTIPLIER: f64 = 3.0;

/// Observed perception handed to [`BeliefUpdater::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub warmth: f64,
    pub competence: f64,
    /// Confidence in `(0, 1]`; scales the observation's pseudo-count.
    pub confidence: f64,
}

impl Observation {
    pub fn new(warmth: f64, competence: f64, confidence: f64) -> Self {
        Self {
            warmth,
            competence,
            confidence,
        }
    }
}

/// Performs the posterior update treating `(mean, prior_strength)` as Beta parameters.
#[derive(Debug, Clone, Copy)]
pub struct BeliefUpdater {
    evidence_multiplier: f64,
}

impl BeliefUpdater {
    pub const fn new(evidence_multiplier: f64) -> Self {
        Self {
            evidence_multiplier,
        }
    }

    pub const fn evidence_multiplier(&self) -> f64 {
        self.evidence_multiplier
    }

    /// Updates both axes independently and appends a history snapshot.
    pub fn update(&self, belief: &mut BeliefState, observation: Observation) {
        let strength = belief.prior_strength();
        let evidence = observation.confidence.clamp(0.0, 1.0) * strength * self.evidence_multiplier;

        let warmth = posterior(belief.warmth(), observation.warmth, strength, evidence);
        let competence = posterior(belief.competence(), observation.competence, strength, evidence);
        belief.set_axes(warmth, competence);
    }
}

impl Default for BeliefUpdater {
    fn default() -> Self {
        Self::new(DEFAULT_EVIDENCE_MULTIPLIER)
    }
}

fn posterior(prior: AxisBelief, observed: f64, strength: f64, evidence: f64) -> AxisBelief {
    let observed = clamp_mean(observed);
    let (alpha, beta) = prior.beta_params(strength);
    let alpha_post = alpha + observed * evidence;
    let beta_post = beta + (1.0 - observed) * evidence;
    let total = alpha_post + beta_post;
    if !total.is_finite() || total <= 0.0 {
        return prior;
    }
    AxisBelief {
        mean: clamp_mean(alpha_post / total),
        uncertainty: beta_std(alpha_post, beta_post),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::state::{MAX_MEAN, MIN_MEAN};

    #[test]
    fn positive_observation_raises_both_means() {
        let mut belief = BeliefState::new(6.0);
        BeliefUpdater::default().update(&mut belief, Observation::new(0.95, 0.95, 0.9));
        assert!(belief.warmth_mean() > 0.5);
        assert!(belief.competence_mean() > 0.5);
    }

    #[test]
    fn negative_observation_lowers_both_means() {
        let mut belief = BeliefState::new(6.0);
        BeliefUpdater::default().update(&mut belief, Observation::new(0.05, 0.05, 0.9));
        assert!(belief.warmth_mean() < 0.5);
        assert!(belief.competence_mean() < 0.5);
    }

    #[test]
    fn posterior_matches_closed_form() {
        let mut belief = BeliefState::new(6.0);
        BeliefUpdater::default().update(&mut belief, Observation::new(0.95, 0.15, 0.7));
        // alpha = 3 + 0.95 * 12.6, total = 6 + 12.6
        let expected_warmth = (3.0 + 0.95 * 12.6) / 18.6;
        assert!((belief.warmth_mean() - expected_warmth).abs() < 1e-9);
        let alpha: f64 = 3.0 + 0.95 * 12.6;
        let beta: f64 = 18.6 - alpha;
        let expected_std = (alpha * beta / (18.6 * 18.6 * 19.6)).sqrt();
        assert!((belief.warmth().uncertainty - expected_std).abs() < 1e-9);
    }

    #[test]
    fn uncertainty_drops_after_evidence() {
        let mut belief = BeliefState::new(6.0);
        let before = belief.warmth().uncertainty;
        BeliefUpdater::default().update(&mut belief, Observation::new(0.5, 0.5, 1.0));
        assert!(belief.warmth().uncertainty < before);
        assert_eq!(belief.history_len(), 2);
    }

    #[test]
    fn repeated_extreme_updates_stay_in_bounds() {
        let mut belief = BeliefState::new(1.0);
        let updater = BeliefUpdater::new(50.0);
        for step in 0..200 {
            let value = if step % 2 == 0 { 1.5 } else { -0.5 };
            updater.update(&mut belief, Observation::new(value, 1.0 - value, 1.0));
            for axis in [belief.warmth_mean(), belief.competence_mean()] {
                assert!((MIN_MEAN..=MAX_MEAN).contains(&axis));
            }
        }
    }
}
