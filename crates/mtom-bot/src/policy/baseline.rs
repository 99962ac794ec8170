//! Reference policies the Bayesian agent is compared against.

use super::{AgentError, NegotiationAgent, ensure_offers};
use mtom_core::negotiation::{NegotiationState, Seat, Split};
use mtom_core::observer::{ObserverFeedback, SimpleObserver};
use mtom_core::social::{LinearSocialScore, MentalState};
use rand::RngCore;
use rand::seq::SliceRandom;

/// Keeps everything but one unit.
#[derive(Debug, Clone)]
pub struct GreedyAgent {
    seat: Seat,
}

impl GreedyAgent {
    pub fn new(seat: Seat) -> Self {
        Self { seat }
    }
}

impl NegotiationAgent for GreedyAgent {
    fn name(&self) -> &str {
        "greedy"
    }

    fn seat(&self) -> Seat {
        self.seat
    }

    fn choose_offer(
        &mut self,
        state: &NegotiationState,
        _rng: &mut dyn RngCore,
    ) -> Result<Split, AgentError> {
        let total = ensure_offers(state)?;
        Ok(Split::keeping(self.seat, total - 1, total))
    }

    fn update_beliefs(
        &mut self,
        _state: &NegotiationState,
        _action: Split,
        _accepted: Option<bool>,
        _feedback: Option<ObserverFeedback>,
    ) {
    }

    /// Greedy play carries no belief; callers fall back to [`MentalState::from_offer`].
    fn get_mental_state(&self) -> Option<MentalState> {
        None
    }
}

/// Uniform over legal offers, drawing from the caller's RNG.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    seat: Seat,
}

impl RandomAgent {
    pub fn new(seat: Seat) -> Self {
        Self { seat }
    }
}

impl NegotiationAgent for RandomAgent {
    fn name(&self) -> &str {
        "random"
    }

    fn seat(&self) -> Seat {
        self.seat
    }

    fn choose_offer(
        &mut self,
        state: &NegotiationState,
        rng: &mut dyn RngCore,
    ) -> Result<Split, AgentError> {
        let total = ensure_offers(state)?;
        state
            .legal_offers_for(self.seat)
            .choose(rng)
            .copied()
            .ok_or(AgentError::NoLegalOffers { total })
    }

    fn update_beliefs(
        &mut self,
        _state: &NegotiationState,
        _action: Split,
        _accepted: Option<bool>,
        _feedback: Option<ObserverFeedback>,
    ) {
    }

    fn get_mental_state(&self) -> Option<MentalState> {
        None
    }
}

/// Step size applied to observer deltas when projecting or updating the point belief.
const SOCIAL_GAIN: f64 = 0.3;

/// Maximises predicted social score and ignores task reward entirely.
#[derive(Debug, Clone)]
pub struct SocialAgent {
    seat: Seat,
    state: MentalState,
    scorer: LinearSocialScore,
}

impl SocialAgent {
    pub fn new(seat: Seat) -> Self {
        Self {
            seat,
            state: MentalState::neutral(),
            scorer: LinearSocialScore::default(),
        }
    }

    fn project(&self, delta: (f64, f64), gain: f64) -> MentalState {
        MentalState::new(
            self.state.warmth + gain * delta.0,
            self.state.competence + gain * delta.1,
        )
    }
}

impl NegotiationAgent for SocialAgent {
    fn name(&self) -> &str {
        "social"
    }

    fn seat(&self) -> Seat {
        self.seat
    }

    fn choose_offer(
        &mut self,
        state: &NegotiationState,
        _rng: &mut dyn RngCore,
    ) -> Result<Split, AgentError> {
        let total = ensure_offers(state)?;
        let mut best: Option<(u32, f64)> = None;
        for split in state.legal_offers_for(self.seat) {
            let share = split.share_for(self.seat);
            let delta = SimpleObserver::base_signal(f64::from(share) / f64::from(total));
            let score = self.scorer.score(&self.project(delta, SOCIAL_GAIN));
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((share, score));
            }
        }
        let (share, _) = best.ok_or(AgentError::NoLegalOffers { total })?;
        Ok(Split::keeping(self.seat, share, total))
    }

    fn update_beliefs(
        &mut self,
        state: &NegotiationState,
        action: Split,
        _accepted: Option<bool>,
        feedback: Option<ObserverFeedback>,
    ) {
        let (delta, reliability) = match feedback {
            Some(report) => ((report.warmth_delta, report.competence_delta), report.reliability),
            None => {
                let total = state.total_resources.max(1);
                let ratio = f64::from(action.share_for(self.seat)) / f64::from(total);
                (SimpleObserver::base_signal(ratio), 1.0)
            }
        };
        let gain = SOCIAL_GAIN * (0.5 + 0.5 * reliability);
        self.state = self.project(delta, gain);
    }

    fn get_mental_state(&self) -> Option<MentalState> {
        Some(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn greedy_keeps_all_but_one() {
        let mut agent = GreedyAgent::new(Seat::First);
        let state = NegotiationState::new(10, 3);
        let split = agent.choose_offer(&state, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(split, Split::new(9, 1));
        assert!(agent.get_mental_state().is_none());

        agent.update_beliefs(&state, split, Some(false), None);
        assert!(agent.get_mental_state().is_none());
    }

    #[test]
    fn random_stays_within_legal_range() {
        let mut agent = RandomAgent::new(Seat::Second);
        let state = NegotiationState::new(6, 3);
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..100 {
            let split = agent.choose_offer(&state, &mut rng).unwrap();
            assert_eq!(split.total(), 6);
            assert!((1..6).contains(&split.second));
        }
    }

    #[test]
    fn social_agent_gives_generously_and_warms_up() {
        let mut agent = SocialAgent::new(Seat::First);
        let state = NegotiationState::new(10, 3);
        let split = agent.choose_offer(&state, &mut StdRng::seed_from_u64(0)).unwrap();
        assert!(split.first <= 3);

        agent.update_beliefs(&state, split, Some(true), None);
        let after = agent.get_mental_state().unwrap();
        assert!(after.warmth > 0.5);
        assert!(after.competence < 0.5);
    }

    #[test]
    fn unreliable_feedback_moves_social_agent_less() {
        let state = NegotiationState::new(10, 3);
        let split = Split::new(8, 2);
        let mut trusting = SocialAgent::new(Seat::First);
        let mut wary = SocialAgent::new(Seat::First);
        trusting.update_beliefs(&state, split, None, Some(ObserverFeedback::new(-1.0, 0.0, 1.0)));
        wary.update_beliefs(&state, split, None, Some(ObserverFeedback::new(-1.0, 0.0, 0.0)));
        assert!(trusting.get_mental_state().unwrap().warmth < wary.get_mental_state().unwrap().warmth);
    }

    #[test]
    fn single_unit_pot_has_no_legal_offer() {
        let state = NegotiationState::new(1, 3);
        let mut rng = StdRng::seed_from_u64(0);
        for mut agent in [
            Box::new(GreedyAgent::new(Seat::First)) as Box<dyn NegotiationAgent>,
            Box::new(RandomAgent::new(Seat::First)),
            Box::new(SocialAgent::new(Seat::First)),
        ] {
            assert_eq!(
                agent.choose_offer(&state, &mut rng),
                Err(AgentError::NoLegalOffers { total: 1 })
            );
        }
    }
}
