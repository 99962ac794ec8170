//! External feedback channels reporting how an action was perceived.
//!
//! Observers speak in raw deltas (roughly `[-1.5, 1.5]` per axis). Agents turn a delta into
//! an [`Observation`] through [`ObserverFeedback::to_observation`].

use crate::belief::{MAX_MEAN, MIN_MEAN, Observation};
use crate::negotiation::{NegotiationState, Seat, Split};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Slope of the delta-to-perception map: a full-strength delta of ±1.2 lands at 0.05/0.95.
const DELTA_SCALE: f64 = 0.375;

/// One perception report from an observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObserverFeedback {
    pub warmth_delta: f64,
    pub competence_delta: f64,
    /// Channel reliability in `[0, 1]` at the time of the report.
    pub reliability: f64,
}

impl ObserverFeedback {
    pub fn new(warmth_delta: f64, competence_delta: f64, reliability: f64) -> Self {
        Self {
            warmth_delta,
            competence_delta,
            reliability: reliability.clamp(0.0, 1.0),
        }
    }

    /// Perceived warmth implied by the delta.
    pub fn observed_warmth(&self) -> f64 {
        delta_to_perception(self.warmth_delta)
    }

    pub fn observed_competence(&self) -> f64 {
        delta_to_perception(self.competence_delta)
    }

    /// Observation at `base_confidence`, discounted by channel reliability.
    pub fn to_observation(&self, base_confidence: f64) -> Observation {
        Observation::new(
            self.observed_warmth(),
            self.observed_competence(),
            base_confidence * (0.5 + 0.5 * self.reliability),
        )
    }
}

fn delta_to_perception(delta: f64) -> f64 {
    if !delta.is_finite() {
        return 0.5;
    }
    (0.5 + DELTA_SCALE * delta).clamp(MIN_MEAN, MAX_MEAN)
}

/// Summary of a channel's noise characteristics, written into traces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelDescription {
    pub kind: &'static str,
    pub noise_std: f64,
    pub deception_prob: f64,
    pub dropout_prob: f64,
    pub reliability: f64,
}

pub trait Observer {
    fn observe(&mut self, state: &NegotiationState, split: Split, actor: Seat) -> ObserverFeedback;

    fn reliability(&self) -> f64;

    fn describe(&self) -> ChannelDescription;
}

/// Re-weighting of positive and negative deltas, modelling forgiving or severe audiences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shaping {
    #[default]
    Neutral,
    Lenient,
    Harsh,
}

impl Shaping {
    fn apply(self, delta: f64) -> f64 {
        match self {
            Shaping::Neutral => delta,
            Shaping::Lenient if delta >= 0.0 => delta * 1.2,
            Shaping::Lenient => delta * 0.5,
            Shaping::Harsh if delta >= 0.0 => delta * 0.8,
            Shaping::Harsh => delta * 1.5,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Shaping::Neutral => "simple",
            Shaping::Lenient => "lenient",
            Shaping::Harsh => "harsh",
        }
    }
}

/// Deterministic five-band reading of the actor's share.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleObserver {
    shaping: Shaping,
}

impl SimpleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shaping(shaping: Shaping) -> Self {
        Self { shaping }
    }

    pub fn shaping(&self) -> Shaping {
        self.shaping
    }

    /// Unshaped `(warmth_delta, competence_delta)` for the actor keeping `ratio` of the pie.
    pub fn base_signal(ratio: f64) -> (f64, f64) {
        if ratio <= 0.3 {
            (1.2, -0.8)
        } else if ratio <= 0.45 {
            (0.6, -0.2)
        } else if ratio <= 0.55 {
            (0.2, 0.3)
        } else if ratio <= 0.7 {
            (-0.6, 0.5)
        } else {
            (-1.2, 0.8)
        }
    }

    fn signal(&self, state: &NegotiationState, split: Split, actor: Seat) -> (f64, f64) {
        let ratio = if state.total_resources == 0 {
            split.ratio_for(actor)
        } else {
            f64::from(split.share_for(actor)) / f64::from(state.total_resources)
        };
        let (warmth, competence) = Self::base_signal(ratio);
        (self.shaping.apply(warmth), self.shaping.apply(competence))
    }
}

impl Observer for SimpleObserver {
    fn observe(&mut self, state: &NegotiationState, split: Split, actor: Seat) -> ObserverFeedback {
        let (warmth, competence) = self.signal(state, split, actor);
        ObserverFeedback::new(warmth, competence, self.reliability())
    }

    fn reliability(&self) -> f64 {
        1.0
    }

    fn describe(&self) -> ChannelDescription {
        ChannelDescription {
            kind: self.shaping.name(),
            noise_std: 0.0,
            deception_prob: 0.0,
            dropout_prob: 0.0,
            reliability: self.reliability(),
        }
    }
}

/// Parameters of the adversarial channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdversarialParams {
    pub noise_std: f64,
    pub deception_prob: f64,
    pub inversion_strength: f64,
    pub bias: (f64, f64),
    pub dropout_prob: f64,
}

impl Default for AdversarialParams {
    fn default() -> Self {
        Self {
            noise_std: 0.35,
            deception_prob: 0.45,
            inversion_strength: 1.0,
            bias: (0.0, 0.0),
            dropout_prob: 0.1,
        }
    }
}

impl AdversarialParams {
    fn sanitized(self) -> Self {
        Self {
            noise_std: finite_or(self.noise_std, 0.0).max(0.0),
            deception_prob: finite_or(self.deception_prob, 0.0).clamp(0.0, 1.0),
            inversion_strength: finite_or(self.inversion_strength, 1.0).max(0.0),
            bias: (finite_or(self.bias.0, 0.0), finite_or(self.bias.1, 0.0)),
            dropout_prob: finite_or(self.dropout_prob, 0.0).clamp(0.0, 1.0),
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// Noisy, sometimes deceptive wrapper around [`SimpleObserver`].
#[derive(Debug, Clone)]
pub struct AdversarialObserver {
    base: SimpleObserver,
    params: AdversarialParams,
    rng: StdRng,
}

impl AdversarialObserver {
    pub fn new(params: AdversarialParams, seed: u64) -> Self {
        Self {
            base: SimpleObserver::new(),
            params: params.sanitized(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn params(&self) -> AdversarialParams {
        self.params
    }

    fn noise(&mut self) -> (f64, f64) {
        match Normal::new(0.0, self.params.noise_std) {
            Ok(dist) if self.params.noise_std > 0.0 => {
                (dist.sample(&mut self.rng), dist.sample(&mut self.rng))
            }
            _ => (0.0, 0.0),
        }
    }
}

impl Observer for AdversarialObserver {
    fn observe(&mut self, state: &NegotiationState, split: Split, actor: Seat) -> ObserverFeedback {
        let (mut warmth, mut competence) = self.base.signal(state, split, actor);

        if self.params.deception_prob > 0.0 && self.rng.gen_bool(self.params.deception_prob) {
            let strength = if self.params.inversion_strength > 0.0 {
                self.params.inversion_strength
            } else {
                1.0
            };
            warmth = -warmth * strength;
            competence = -competence * strength;
        }

        let (noise_w, noise_c) = self.noise();
        warmth += self.params.bias.0 + noise_w;
        competence += self.params.bias.1 + noise_c;

        if self.params.dropout_prob > 0.0 && self.rng.gen_bool(self.params.dropout_prob) {
            (warmth, competence) = self.noise();
        }

        ObserverFeedback::new(warmth, competence, self.reliability())
    }

    fn reliability(&self) -> f64 {
        (1.0 - self.params.deception_prob - 0.5 * self.params.dropout_prob).clamp(0.0, 1.0)
    }

    fn describe(&self) -> ChannelDescription {
        ChannelDescription {
            kind: "adversarial",
            noise_std: self.params.noise_std,
            deception_prob: self.params.deception_prob,
            dropout_prob: self.params.dropout_prob,
            reliability: self.reliability(),
        }
    }
}
