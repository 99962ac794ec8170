//! Monte-Carlo expected utility of an offer under belief and perception uncertainty.

use crate::belief::{BeliefSampler, BeliefState, MAX_MEAN, MIN_MEAN};
use crate::perception::{PerceptionCategory, PerceptionModel};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

/// Neutral point subtracted from blended perceptions and predicted impacts.
const NEUTRAL: f64 = 0.5;

/// Tunable constants for the evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilityConfig {
    /// Monte-Carlo draws per offer.
    pub samples: usize,
    /// Concavity of the task reward `(offer / total) ^ p`.
    pub task_exponent: f64,
    /// Fraction of the predicted impact blended into the projected belief.
    pub projection_weight: f64,
}

impl Default for UtilityConfig {
    fn default() -> Self {
        Self {
            samples: 1_000,
            task_exponent: 0.8,
            projection_weight: 0.5,
        }
    }
}

/// Social-weight tier selecting warmth emphasis, gain and λ amplification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LambdaTier {
    Low,
    Moderate,
    High,
}

impl LambdaTier {
    pub fn from_lambda(lambda: f64) -> Self {
        if lambda >= 1.0 {
            LambdaTier::High
        } else if lambda >= 0.5 {
            LambdaTier::Moderate
        } else {
            LambdaTier::Low
        }
    }

    /// Weight on warmth in the social blend; competence gets the remainder.
    pub const fn warmth_weight(self) -> f64 {
        match self {
            LambdaTier::Low => 0.55,
            LambdaTier::Moderate => 0.65,
            LambdaTier::High => 0.75,
        }
    }

    /// Rescaling applied to the centred social blend.
    pub const fn gain(self) -> f64 {
        match self {
            LambdaTier::Low => 1.5,
            LambdaTier::Moderate => 2.0,
            LambdaTier::High => 2.5,
        }
    }

    pub const fn amplification(self) -> f64 {
        match self {
            LambdaTier::Low => 1.0,
            LambdaTier::Moderate => 1.25,
            LambdaTier::High => 1.5,
        }
    }
}

/// Result of evaluating one candidate offer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UtilityAnalysis {
    pub offer: u32,
    pub expected_utility: f64,
    pub utility_uncertainty: f64,
    pub task_reward: f64,
    pub expected_social_reward: f64,
    pub social_reward_uncertainty: f64,
    pub risk_ratio: f64,
    pub perception: PerceptionCategory,
    pub effective_lambda: f64,
}

impl UtilityAnalysis {
    /// True when sampling produced a non-finite expectation.
    pub fn is_degenerate(&self) -> bool {
        !self.expected_utility.is_finite()
    }
}

/// Trades task reward against socially weighted reward for a single offer.
#[derive(Debug, Clone)]
pub struct UtilityEvaluator {
    config: UtilityConfig,
    perception: PerceptionModel,
}

impl UtilityEvaluator {
    pub fn new(config: UtilityConfig, perception: PerceptionModel) -> Self {
        Self { config, perception }
    }

    pub fn config(&self) -> UtilityConfig {
        self.config
    }

    pub fn perception(&self) -> &PerceptionModel {
        &self.perception
    }

    pub fn task_reward(&self, offer: u32, total_resources: u32) -> f64 {
        if total_resources == 0 {
            return 0.0;
        }
        (f64::from(offer) / f64::from(total_resources)).powf(self.config.task_exponent)
    }

    /// Evaluates `offer` against the current belief. Reads the belief, never writes it.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        offer: u32,
        belief: &BeliefState,
        lambda_social: f64,
        total_resources: u32,
        rng: &mut R,
    ) -> UtilityAnalysis {
        let samples = self.config.samples.max(1);
        let perception = self.perception.predict(offer, total_resources);
        let task_reward = self.task_reward(offer, total_resources);

        let tier = LambdaTier::from_lambda(lambda_social);
        let warmth_weight = tier.warmth_weight();
        let scaled_lambda = lambda_social * tier.amplification();
        let k = self.config.projection_weight;

        let current = BeliefSampler::sample(belief, samples, rng);
        let warmth_impact = impact_samples(perception.warmth_mean, perception.warmth_std, samples, rng);
        let competence_impact =
            impact_samples(perception.competence_mean, perception.competence_std, samples, rng);

        let mut social = Vec::with_capacity(samples);
        for idx in 0..samples {
            let future_warmth = (current.warmth[idx] + k * warmth_impact[idx]).clamp(MIN_MEAN, MAX_MEAN);
            let future_competence =
                (current.competence[idx] + k * competence_impact[idx]).clamp(MIN_MEAN, MAX_MEAN);
            let blend = warmth_weight * future_warmth + (1.0 - warmth_weight) * future_competence;
            social.push(tier.gain() * (blend - NEUTRAL));
        }

        let (expected_social_reward, social_reward_uncertainty) = mean_std(social.iter().copied());
        let (expected_utility, utility_uncertainty) =
            mean_std(social.iter().map(|reward| task_reward + scaled_lambda * reward));

        UtilityAnalysis {
            offer,
            expected_utility,
            utility_uncertainty,
            task_reward,
            expected_social_reward,
            social_reward_uncertainty,
            risk_ratio: risk_ratio(expected_utility, utility_uncertainty),
            perception,
            effective_lambda: lambda_social,
        }
    }
}

impl Default for UtilityEvaluator {
    fn default() -> Self {
        Self::new(UtilityConfig::default(), PerceptionModel::default())
    }
}

/// Samples the perception around its mean and returns the departure from neutral.
fn impact_samples<R: Rng + ?Sized>(mean: f64, std: f64, count: usize, rng: &mut R) -> Vec<f64> {
    match Normal::new(mean, std.max(0.0)) {
        Ok(dist) => (0..count)
            .map(|_| {
                let draw: f64 = dist.sample(rng);
                let draw = if draw.is_finite() { draw } else { mean };
                draw.clamp(0.0, 1.0) - NEUTRAL
            })
            .collect(),
        Err(_) => vec![mean.clamp(0.0, 1.0) - NEUTRAL; count],
    }
}

/// Population mean and standard deviation.
fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let mut count = 0usize;
    let mut sum = 0.0;
    for value in values.clone() {
        sum += value;
        count += 1;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let variance = values.map(|value| (value - mean).powi(2)).sum::<f64>() / count as f64;
    (mean, variance.max(0.0).sqrt())
}

fn risk_ratio(expected: f64, uncertainty: f64) -> f64 {
    if !expected.is_finite() || expected <= 0.0 {
        return 0.0;
    }
    let ratio = uncertainty / expected;
    if ratio.is_finite() { ratio.max(0.0) } else { 0.0 }
}
