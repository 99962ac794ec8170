//! Two-party alternating-offer protocol consumed by the decision engine.

mod env;
mod state;

pub use env::{NegotiationEnv, ProtocolError};
pub use state::{NegotiationState, Seat, Split};
