use super::config::{BayesianConfig, ConfigError};
use super::schedule::{InteractionSignals, effective_lambda};
use super::{AgentError, NegotiationAgent, ensure_offers};
use mtom_core::belief::{
    BeliefSnapshot, BeliefState, BeliefUpdater, CredibleInterval, MAX_MEAN, MIN_MEAN, Observation,
};
use mtom_core::negotiation::{NegotiationState, Seat, Split};
use mtom_core::observer::ObserverFeedback;
use mtom_core::perception::PerceptionModel;
use mtom_core::social::MentalState;
use mtom_core::utility::{UtilityAnalysis, UtilityConfig, UtilityEvaluator};
use rand::RngCore;
use serde::Serialize;
use tracing::{Level, event};

/// Confidence of a self-predicted or accepted observation.
const DEFAULT_CONFIDENCE: f64 = 0.7;
/// Confidence of a rejection; a refusal is a sharper signal than silence.
const REJECTION_CONFIDENCE: f64 = 0.9;
const REJECTION_WARMTH_PENALTY: f64 = 0.15;
const REJECTION_COMPETENCE_PENALTY: f64 = 0.10;
const ACCEPTANCE_WARMTH_BONUS: f64 = 0.05;
const MIN_FEEDBACK_CONFIDENCE: f64 = 0.05;

/// Risk weight above and below this effective λ.
const RISK_LAMBDA_THRESHOLD: f64 = 0.7;
const RISK_WEIGHT_SOCIAL: f64 = 0.05;
const RISK_WEIGHT_SELFISH: f64 = 0.15;

/// Reclaim bonus is `task · max(0, RECLAIM_BASE − λ · RECLAIM_SLOPE) · boost`.
const RECLAIM_BASE: f64 = 0.4;
const RECLAIM_SLOPE: f64 = 0.2;
const LOW_WARMTH: f64 = 0.4;
const LOW_WARMTH_BOOST: f64 = 2.5;

/// Probability mass of the belief interval recorded with each decision.
const CREDIBLE_MASS: f64 = 0.9;

/// Diagnostic record of one offer decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub turn: u32,
    pub offer: Split,
    pub own_share: u32,
    pub effective_lambda: f64,
    pub risk_weight: f64,
    pub adjusted_score: f64,
    pub candidates: usize,
    pub analysis: UtilityAnalysis,
    pub belief_before: BeliefSnapshot,
    /// Central interval of the belief the search ran against.
    pub credible_interval: CredibleInterval,
    /// Filled once the belief update for this offer has run.
    pub belief_after: Option<BeliefSnapshot>,
}

/// Where an update's observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvidenceSource {
    Prediction,
    Response,
    Observer,
}

impl EvidenceSource {
    fn as_str(self) -> &'static str {
        match self {
            EvidenceSource::Prediction => "prediction",
            EvidenceSource::Response => "response",
            EvidenceSource::Observer => "observer",
        }
    }
}

/// Bayesian Theory-of-Mind negotiator.
///
/// Searches every legal offer through Monte-Carlo utility, applies a risk penalty and a
/// selfish-reclaim bonus, and updates its warmth/competence belief once per own turn.
#[derive(Debug, Clone)]
pub struct BayesianTomAgent {
    name: String,
    seat: Seat,
    config: BayesianConfig,
    belief: BeliefState,
    updater: BeliefUpdater,
    evaluator: UtilityEvaluator,
    decisions: Vec<DecisionRecord>,
    pending: Option<Split>,
}

impl BayesianTomAgent {
    pub fn new(config: BayesianConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let belief = match config.cultural_profile()? {
            Some(profile) => BeliefState::from_profile(
                profile,
                config.prior_strength,
                config.adaptive_prior_offset,
            ),
            None => BeliefState::with_priors(
                0.5,
                0.5,
                config.prior_strength,
                config.adaptive_prior_offset,
            ),
        };
        let perception = PerceptionModel::new(belief.fairness_anchor(), belief.warmth_bias());
        let evaluator = UtilityEvaluator::new(
            UtilityConfig {
                samples: config.monte_carlo_samples,
                ..UtilityConfig::default()
            },
            perception,
        );
        Ok(Self {
            name: "bayesian".to_string(),
            seat: Seat::First,
            updater: BeliefUpdater::new(config.evidence_multiplier),
            config,
            belief,
            evaluator,
            decisions: Vec::new(),
            pending: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_seat(mut self, seat: Seat) -> Self {
        self.seat = seat;
        self
    }

    pub fn config(&self) -> &BayesianConfig {
        &self.config
    }

    pub fn belief(&self) -> &BeliefState {
        &self.belief
    }

    pub fn decision_history(&self) -> &[DecisionRecord] {
        &self.decisions
    }

    /// Effective social weight for the proposer's turn in `state`.
    pub fn effective_lambda(&self, state: &NegotiationState) -> f64 {
        let signals = InteractionSignals {
            turns_remaining: state.turns_remaining(),
            warmth_mean: self.belief.warmth_mean(),
            last_response: state.last_response(),
        };
        effective_lambda(
            self.config.lambda_social,
            self.config.lambda_schedule.as_ref(),
            state.current_turn,
            &signals,
        )
    }

    pub fn risk_weight(&self, effective_lambda: f64) -> f64 {
        self.config.risk_weight.unwrap_or(if effective_lambda >= RISK_LAMBDA_THRESHOLD {
            RISK_WEIGHT_SOCIAL
        } else {
            RISK_WEIGHT_SELFISH
        })
    }

    /// Scores one analysis; non-finite results rank below every finite one.
    pub fn adjusted_score(&self, analysis: &UtilityAnalysis, risk_weight: f64) -> f64 {
        if analysis.is_degenerate() {
            return f64::NEG_INFINITY;
        }
        let risk_adjusted = analysis.expected_utility * (1.0 - risk_weight * analysis.risk_ratio);
        let score = risk_adjusted + self.reclaim_bonus(analysis);
        if score.is_finite() { score } else { f64::NEG_INFINITY }
    }

    fn reclaim_bonus(&self, analysis: &UtilityAnalysis) -> f64 {
        let warmth = self.belief.warmth_mean();
        let boost = if warmth < LOW_WARMTH {
            1.0 + (LOW_WARMTH - warmth) * LOW_WARMTH_BOOST
        } else {
            1.0
        };
        let weight = (RECLAIM_BASE - analysis.effective_lambda * RECLAIM_SLOPE).max(0.0);
        analysis.task_reward * weight * boost
    }

    fn apply_update(
        &mut self,
        total: u32,
        action: Split,
        accepted: Option<bool>,
        feedback: Option<ObserverFeedback>,
    ) {
        let own_share = action.share_for(self.seat);
        let predicted = self.evaluator.perception().predict(own_share, total);

        let (mut observation, source) = match feedback {
            Some(report) => (report.to_observation(DEFAULT_CONFIDENCE), EvidenceSource::Observer),
            None => (
                Observation::new(
                    predicted.warmth_mean,
                    predicted.competence_mean,
                    DEFAULT_CONFIDENCE,
                ),
                EvidenceSource::Prediction,
            ),
        };
        match accepted {
            Some(false) => {
                observation.warmth = (observation.warmth - REJECTION_WARMTH_PENALTY).max(MIN_MEAN);
                observation.competence =
                    (observation.competence - REJECTION_COMPETENCE_PENALTY).max(MIN_MEAN);
                observation.confidence = match feedback {
                    Some(report) => report.to_observation(REJECTION_CONFIDENCE).confidence,
                    None => REJECTION_CONFIDENCE,
                };
            }
            Some(true) => {
                observation.warmth = (observation.warmth + ACCEPTANCE_WARMTH_BONUS).min(MAX_MEAN);
            }
            None => {}
        }
        observation.confidence = observation.confidence.max(MIN_FEEDBACK_CONFIDENCE);
        let confidence = observation.confidence;
        let source = match (source, accepted) {
            (EvidenceSource::Prediction, Some(_)) => EvidenceSource::Response,
            (source, _) => source,
        };

        self.updater.update(&mut self.belief, observation);

        if self.pending == Some(action) {
            self.pending = None;
            let snapshot = self.belief.snapshot();
            if let Some(record) = self.decisions.last_mut() {
                if record.offer == action && record.belief_after.is_none() {
                    record.belief_after = Some(snapshot);
                }
            }
        }
        log_belief_update(&self.name, &self.belief, confidence, source, accepted);
    }
}

impl NegotiationAgent for BayesianTomAgent {
    fn name(&self) -> &str {
        &self.name
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
        // A previous proposal that never saw an outcome still counts as one turn of evidence.
        if let Some(unresolved) = self.pending {
            self.apply_update(total, unresolved, None, None);
        }

        let lambda = self.effective_lambda(state);
        let risk_weight = self.risk_weight(lambda);

        let candidates = state.legal_offers_for(self.seat);
        let mut best: Option<(UtilityAnalysis, f64)> = None;
        for split in &candidates {
            let offer = split.share_for(self.seat);
            let analysis = self.evaluator.evaluate(offer, &self.belief, lambda, total, rng);
            let score = self.adjusted_score(&analysis, risk_weight);
            let improves = match &best {
                None => true,
                Some((_, best_score)) => score > *best_score,
            };
            if improves {
                best = Some((analysis, score));
            }
        }
        let (analysis, adjusted_score) = best.ok_or(AgentError::NoLegalOffers { total })?;

        let split = Split::keeping(self.seat, analysis.offer, total);
        let record = DecisionRecord {
            turn: state.current_turn,
            offer: split,
            own_share: analysis.offer,
            effective_lambda: lambda,
            risk_weight,
            adjusted_score,
            candidates: candidates.len(),
            credible_interval: self.belief.credible_interval(CREDIBLE_MASS),
            analysis,
            belief_before: self.belief.snapshot(),
            belief_after: None,
        };
        log_decision(&self.name, &record);
        self.decisions.push(record);
        self.pending = Some(split);
        Ok(split)
    }

    fn update_beliefs(
        &mut self,
        state: &NegotiationState,
        action: Split,
        accepted: Option<bool>,
        feedback: Option<ObserverFeedback>,
    ) {
        let total = if state.total_resources > 0 {
            state.total_resources
        } else {
            action.total()
        };
        self.apply_update(total, action, accepted, feedback);
    }

    fn get_mental_state(&self) -> Option<MentalState> {
        Some(MentalState::from_belief(&self.belief))
    }

    fn last_decision(&self) -> Option<&DecisionRecord> {
        self.decisions.last()
    }
}

fn log_decision(agent: &str, record: &DecisionRecord) {
    if !tracing::enabled!(Level::DEBUG) {
        return;
    }
    event!(
        target: "mtom_bot::decision",
        Level::DEBUG,
        agent,
        turn = record.turn,
        offer = %record.offer,
        own_share = record.own_share,
        effective_lambda = record.effective_lambda,
        expected_utility = record.analysis.expected_utility,
        risk_ratio = record.analysis.risk_ratio,
        adjusted_score = record.adjusted_score,
        perception = %record.analysis.perception.label,
        candidates = record.candidates,
    );
}

fn log_belief_update(
    agent: &str,
    belief: &BeliefState,
    confidence: f64,
    source: EvidenceSource,
    accepted: Option<bool>,
) {
    if !tracing::enabled!(Level::DEBUG) {
        return;
    }
    event!(
        target: "mtom_bot::belief",
        Level::DEBUG,
        agent,
        warmth = belief.warmth_mean(),
        competence = belief.competence_mean(),
        warmth_uncertainty = belief.warmth().uncertainty,
        confidence,
        source = source.as_str(),
        accepted = ?accepted,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn agent(lambda: f64) -> BayesianTomAgent {
        BayesianTomAgent::new(BayesianConfig {
            monte_carlo_samples: 400,
            ..BayesianConfig::with_lambda(lambda)
        })
        .unwrap()
    }

    #[test]
    fn risk_weight_depends_on_lambda_unless_overridden() {
        let bot = agent(0.5);
        assert_eq!(bot.risk_weight(0.9), RISK_WEIGHT_SOCIAL);
        assert_eq!(bot.risk_weight(0.3), RISK_WEIGHT_SELFISH);

        let fixed = BayesianTomAgent::new(BayesianConfig {
            risk_weight: Some(0.0),
            ..BayesianConfig::default()
        })
        .unwrap();
        assert_eq!(fixed.risk_weight(0.3), 0.0);
    }

    #[test]
    fn degenerate_analysis_ranks_last() {
        let mut bot = agent(0.5);
        let state = NegotiationState::new(10, 3);
        let mut rng = StdRng::seed_from_u64(1);
        bot.choose_offer(&state, &mut rng).unwrap();
        let mut analysis = bot.last_decision().unwrap().analysis;
        analysis.expected_utility = f64::NAN;
        assert_eq!(bot.adjusted_score(&analysis, 0.1), f64::NEG_INFINITY);
    }

    #[test]
    fn decision_record_is_completed_by_the_update() {
        let mut bot = agent(0.8);
        let state = NegotiationState::new(10, 3);
        let mut rng = StdRng::seed_from_u64(9);
        let split = bot.choose_offer(&state, &mut rng).unwrap();
        assert!(bot.last_decision().unwrap().belief_after.is_none());

        bot.update_beliefs(&state, split, Some(true), None);
        let record = bot.last_decision().unwrap();
        assert_eq!(record.offer, split);
        assert_eq!(record.belief_after, Some(bot.belief().snapshot()));
        assert_eq!(record.candidates, 9);

        let interval = record.credible_interval;
        assert_eq!(interval.mass, CREDIBLE_MASS);
        let warmth = record.belief_before.warmth.mean;
        assert!(interval.warmth.0 < warmth && warmth < interval.warmth.1);
    }

    #[test]
    fn unresolved_offer_is_committed_before_the_next_search() {
        let mut bot = agent(0.8);
        let state = NegotiationState::new(10, 4);
        let mut rng = StdRng::seed_from_u64(5);
        bot.choose_offer(&state, &mut rng).unwrap();
        assert_eq!(bot.belief().history_len(), 1);
        bot.choose_offer(&state, &mut rng).unwrap();
        assert_eq!(bot.belief().history_len(), 2);
        assert!(bot.decision_history()[0].belief_after.is_some());
    }

    fn cooled(mut bot: BayesianTomAgent) -> BayesianTomAgent {
        for _ in 0..3 {
            bot.updater
                .update(&mut bot.belief, Observation::new(0.05, 0.05, 1.0));
        }
        bot
    }

    #[test]
    fn low_warmth_raises_the_reclaim_bonus() {
        let mut neutral = agent(0.5);
        let state = NegotiationState::new(10, 3);
        let mut rng = StdRng::seed_from_u64(4);
        neutral.choose_offer(&state, &mut rng).unwrap();
        let analysis = neutral.last_decision().unwrap().analysis;
        assert!(analysis.task_reward > 0.0);

        let cold = cooled(agent(0.5));
        assert!(cold.belief().warmth_mean() < LOW_WARMTH);
        let neutral_score = neutral.adjusted_score(&analysis, 0.1);
        let cold_score = cold.adjusted_score(&analysis, 0.1);
        assert!(cold_score > neutral_score);
    }

    #[test]
    fn observer_feedback_overrides_the_prediction() {
        let state = NegotiationState::new(10, 3);
        let selfish = Split::new(9, 1);

        let mut predicted = agent(0.5);
        predicted.update_beliefs(&state, selfish, None, None);
        assert!(predicted.belief().warmth_mean() < 0.5);

        let mut observed = agent(0.5);
        observed.update_beliefs(
            &state,
            selfish,
            None,
            Some(ObserverFeedback::new(1.2, -0.8, 1.0)),
        );
        assert!(observed.belief().warmth_mean() > 0.5);
        assert!(observed.belief().competence_mean() < 0.5);
    }

    #[test]
    fn unreliable_feedback_moves_the_belief_less() {
        let state = NegotiationState::new(10, 3);
        let split = Split::new(9, 1);
        let shift = |reliability: f64| {
            let mut bot = agent(0.5);
            bot.update_beliefs(
                &state,
                split,
                None,
                Some(ObserverFeedback::new(1.2, -0.8, reliability)),
            );
            bot.belief().warmth_mean() - 0.5
        };
        let trusted = shift(1.0);
        let doubted = shift(0.0);
        assert!(doubted > 0.0);
        assert!(trusted > doubted);
    }

    #[test]
    fn seat_controls_which_side_of_the_split_is_kept() {
        let mut bot = agent(0.0).with_seat(Seat::Second);
        let state = NegotiationState::new(10, 3);
        let mut rng = StdRng::seed_from_u64(2);
        let split = bot.choose_offer(&state, &mut rng).unwrap();
        assert_eq!(split, Split::new(1, 9));
    }
}
