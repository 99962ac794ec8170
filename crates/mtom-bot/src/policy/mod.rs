mod baseline;
mod bayesian;
mod config;
mod schedule;

pub use baseline::{GreedyAgent, RandomAgent, SocialAgent};
pub use bayesian::{BayesianTomAgent, DecisionRecord};
pub use config::{BayesianConfig, ConfigError, LambdaSchedule, MAX_LAMBDA_SOCIAL};
pub use schedule::{
    InteractionSignals, LAMBDA_CEILING_FACTOR, LAMBDA_FLOOR, effective_lambda, interaction_factor,
};

use mtom_core::negotiation::{NegotiationState, ProtocolError, Seat, Split};
use mtom_core::observer::ObserverFeedback;
use mtom_core::social::MentalState;
use rand::RngCore;
use std::fmt;

/// Unified interface for every negotiating policy.
pub trait NegotiationAgent: Send {
    fn name(&self) -> &str;

    fn seat(&self) -> Seat;

    /// Picks the split to propose on the agent's turn.
    fn choose_offer(
        &mut self,
        state: &NegotiationState,
        rng: &mut dyn RngCore,
    ) -> Result<Split, AgentError>;

    /// Consumes the outcome of the agent's own proposal.
    ///
    /// `accepted` is `None` when the protocol produced no response; `feedback` carries a
    /// live observer report when one exists.
    fn update_beliefs(
        &mut self,
        state: &NegotiationState,
        action: Split,
        accepted: Option<bool>,
        feedback: Option<ObserverFeedback>,
    );

    fn get_mental_state(&self) -> Option<MentalState>;

    fn last_decision(&self) -> Option<&DecisionRecord> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    NoLegalOffers { total: u32 },
    Protocol(ProtocolError),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::NoLegalOffers { total } => {
                write!(f, "no legal offers for {total} resources")
            }
            AgentError::Protocol(err) => write!(f, "protocol error: {err}"),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Protocol(err) => Some(err),
            AgentError::NoLegalOffers { .. } => None,
        }
    }
}

impl From<ProtocolError> for AgentError {
    fn from(err: ProtocolError) -> Self {
        AgentError::Protocol(err)
    }
}

pub(crate) fn ensure_offers(state: &NegotiationState) -> Result<u32, AgentError> {
    if state.total_resources <= 1 {
        return Err(AgentError::NoLegalOffers {
            total: state.total_resources,
        });
    }
    if state.is_terminal() {
        return Err(ProtocolError::TerminalState.into());
    }
    Ok(state.total_resources)
}
