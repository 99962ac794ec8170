//! Probabilistic belief about how the counterpart perceives the agent.
//!
//! This module is composed of:
//! - `state`: the two-axis Beta-like belief (`BeliefState`) and its bounded history.
//! - `update`: the conjugate posterior update (`BeliefUpdater`).
//! - `sampler`: Monte-Carlo draws from the implied Beta posterior.

mod sampler;
mod state;
mod update;

pub use sampler::{BeliefSampler, SampledBeliefs};
pub use state::{
    Axis, AxisBelief, BeliefSnapshot, BeliefState, CredibleInterval, DEFAULT_HISTORY_CAPACITY,
    MAX_MEAN, MIN_MEAN,
};
pub use update::{BeliefUpdater, DEFAULT_EVIDENCE_MULTIPLIER, Observation};
