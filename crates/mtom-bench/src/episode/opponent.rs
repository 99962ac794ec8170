use mtom_core::negotiation::{NegotiationState, Seat, Split};
use rand::{Rng, RngCore};

use crate::config::OpponentPolicy;

/// Scripted counterpart occupying the second seat.
#[derive(Debug, Clone)]
pub struct ScriptedOpponent {
    policy: OpponentPolicy,
    seat: Seat,
    /// Share the evaluated agent last handed to this seat.
    last_received: Option<u32>,
}

impl ScriptedOpponent {
    /// `policy` must be concrete; `mixed` is resolved by the runner before construction.
    pub fn new(policy: OpponentPolicy) -> Self {
        Self {
            policy,
            seat: Seat::Second,
            last_received: None,
        }
    }

    pub fn policy(&self) -> OpponentPolicy {
        self.policy
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }

    pub fn propose(&mut self, state: &NegotiationState, rng: &mut dyn RngCore) -> Split {
        let total = state.total_resources;
        let fair = total / 2;
        let greedy = scaled(total, 0.8);

        let keep = match self.policy {
            OpponentPolicy::Fair | OpponentPolicy::Mixed => fair,
            OpponentPolicy::TitForTat => match self.last_received {
                Some(received) => total.saturating_sub(received),
                None => fair,
            },
            OpponentPolicy::Concession => {
                let span = state.max_turns.saturating_sub(1).max(1);
                let fraction = (f64::from(state.current_turn) / f64::from(span)).clamp(0.0, 1.0);
                let blended = f64::from(greedy) * (1.0 - fraction) + f64::from(fair) * fraction;
                blended.floor() as u32
            }
            OpponentPolicy::Unpredictable => match rng.gen_range(0..3) {
                0 => greedy,
                1 => fair,
                _ => scaled(total, 0.3),
            },
        };

        let keep = keep.clamp(1, total.saturating_sub(1).max(1));
        Split::keeping(self.seat, keep, total)
    }

    /// Records an offer made by the other side.
    pub fn observe(&mut self, split: Split) {
        self.last_received = Some(split.share_for(self.seat));
    }
}

fn scaled(total: u32, fraction: f64) -> u32 {
    (f64::from(total) * fraction).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn state_at(turn: u32, max_turns: u32) -> NegotiationState {
        let mut state = NegotiationState::new(10, max_turns);
        state.current_turn = turn;
        state
    }

    #[test]
    fn fair_opponent_splits_evenly() {
        let mut opponent = ScriptedOpponent::new(OpponentPolicy::Fair);
        let split = opponent.propose(&state_at(1, 3), &mut StdRng::seed_from_u64(0));
        assert_eq!(split, Split::new(5, 5));
    }

    #[test]
    fn tit_for_tat_mirrors_what_it_received() {
        let mut opponent = ScriptedOpponent::new(OpponentPolicy::TitForTat);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(opponent.propose(&state_at(1, 3), &mut rng), Split::new(5, 5));

        opponent.observe(Split::new(8, 2));
        assert_eq!(opponent.propose(&state_at(1, 3), &mut rng), Split::new(2, 8));

        opponent.observe(Split::new(1, 9));
        // Keeping only one unit is the floor of the legal range.
        assert_eq!(opponent.propose(&state_at(1, 3), &mut rng), Split::new(9, 1));
    }

    #[test]
    fn concession_moves_from_greedy_to_fair() {
        let mut opponent = ScriptedOpponent::new(OpponentPolicy::Concession);
        let mut rng = StdRng::seed_from_u64(0);
        let shares: Vec<u32> = (0..3)
            .map(|turn| opponent.propose(&state_at(turn, 3), &mut rng).second)
            .collect();
        assert_eq!(shares, vec![8, 6, 5]);
    }

    #[test]
    fn unpredictable_draws_from_three_modes() {
        let mut opponent = ScriptedOpponent::new(OpponentPolicy::Unpredictable);
        let mut rng = StdRng::seed_from_u64(99);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            seen.insert(opponent.propose(&state_at(1, 3), &mut rng).second);
        }
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![3, 5, 8]);
    }
}
