use super::state::{NegotiationState, Seat, Split};
use std::fmt;

/// Violations of the alternating-offer protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    InvalidResources { total: u32 },
    InvalidTurnLimit,
    TerminalState,
    SplitMismatch { split: Split, total: u32 },
    NoOfferToAnswer,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidResources { total } => {
                write!(f, "total resources must be at least 2 (got {total})")
            }
            ProtocolError::InvalidTurnLimit => f.write_str("max turns must be positive"),
            ProtocolError::TerminalState => f.write_str("negotiation has already ended"),
            ProtocolError::SplitMismatch { split, total } => {
                write!(f, "split {split} does not sum to {total}")
            }
            ProtocolError::NoOfferToAnswer => f.write_str("no offer on record to answer"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Turn bookkeeping for one negotiation: proposers alternate, responders accept or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationEnv {
    total_resources: u32,
    max_turns: u32,
}

impl NegotiationEnv {
    pub fn new(total_resources: u32, max_turns: u32) -> Result<Self, ProtocolError> {
        if total_resources <= 1 {
            return Err(ProtocolError::InvalidResources {
                total: total_resources,
            });
        }
        if max_turns == 0 {
            return Err(ProtocolError::InvalidTurnLimit);
        }
        Ok(Self {
            total_resources,
            max_turns,
        })
    }

    pub fn total_resources(&self) -> u32 {
        self.total_resources
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn reset(&self) -> NegotiationState {
        NegotiationState::new(self.total_resources, self.max_turns)
    }

    /// Records `split` as the current proposer's offer and hands the turn over.
    pub fn step(&self, state: &mut NegotiationState, split: Split) -> Result<(), ProtocolError> {
        if state.is_terminal() {
            return Err(ProtocolError::TerminalState);
        }
        if split.total() != self.total_resources {
            return Err(ProtocolError::SplitMismatch {
                split,
                total: self.total_resources,
            });
        }
        state.offers.push(split);
        state.current_turn += 1;
        state.current_proposer = state.current_proposer.other();
        Ok(())
    }

    pub fn accept(&self, state: &mut NegotiationState) -> Result<Split, ProtocolError> {
        let offer = self.pending_offer(state)?;
        state.responses.push(true);
        state.final_agreement = Some(offer);
        Ok(offer)
    }

    pub fn reject(&self, state: &mut NegotiationState) -> Result<(), ProtocolError> {
        self.pending_offer(state)?;
        state.responses.push(false);
        Ok(())
    }

    /// Fraction of the resources `seat` walks away with; zero without agreement.
    pub fn reward(&self, state: &NegotiationState, seat: Seat) -> f64 {
        state
            .final_agreement
            .map_or(0.0, |split| split.ratio_for(seat))
    }

    fn pending_offer(&self, state: &NegotiationState) -> Result<Split, ProtocolError> {
        if state.final_agreement.is_some() {
            return Err(ProtocolError::TerminalState);
        }
        if state.responses.len() >= state.offers.len() {
            return Err(ProtocolError::NoOfferToAnswer);
        }
        state.last_offer().ok_or(ProtocolError::NoOfferToAnswer)
    }
}
