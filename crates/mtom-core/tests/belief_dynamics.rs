use mtom_core::belief::{BeliefState, BeliefUpdater, MAX_MEAN, MIN_MEAN, Observation};
use mtom_core::culture::CulturalTemplate;
use mtom_core::perception::{PerceptionLabel, PerceptionModel};
use mtom_core::utility::UtilityEvaluator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn generous_offer_prediction_pulls_warmth_up() {
    let mut belief = BeliefState::new(6.0);
    let evaluator = UtilityEvaluator::default();
    let mut rng = StdRng::seed_from_u64(42);

    let analysis = evaluator.evaluate(2, &belief, 0.5, 10, &mut rng);
    assert_eq!(analysis.perception.label, PerceptionLabel::ExtremelyGenerous);
    assert!((analysis.perception.warmth_mean - 0.95).abs() < 1e-12);

    let observation = Observation::new(
        analysis.perception.warmth_mean,
        analysis.perception.competence_mean,
        0.7,
    );
    BeliefUpdater::default().update(&mut belief, observation);
    assert!(belief.warmth_mean() > 0.5);
    assert!(belief.competence_mean() < 0.5);
}

#[test]
fn random_observation_streams_never_escape_bounds() {
    let mut rng = StdRng::seed_from_u64(2024);
    let updater = BeliefUpdater::default();
    for strength in [0.5, 2.0, 6.0, 30.0] {
        let mut belief = BeliefState::new(strength);
        for _ in 0..500 {
            let observation = Observation::new(
                rng.gen_range(-0.5..1.5),
                rng.gen_range(-0.5..1.5),
                rng.gen_range(0.0..1.0),
            );
            updater.update(&mut belief, observation);
            for mean in [belief.warmth_mean(), belief.competence_mean()] {
                assert!((MIN_MEAN..=MAX_MEAN).contains(&mean));
            }
            assert!(belief.warmth().uncertainty >= 0.0);
        }
    }
}

#[test]
fn cultural_profiles_read_the_same_offer_differently() {
    let collectivist = BeliefState::from_profile(CulturalTemplate::Collectivist.profile(), 6.0, 0.0);
    let individualist =
        BeliefState::from_profile(CulturalTemplate::Individualist.profile(), 6.0, 0.0);

    let col_model = PerceptionModel::new(collectivist.fairness_anchor(), collectivist.warmth_bias());
    let ind_model =
        PerceptionModel::new(individualist.fairness_anchor(), individualist.warmth_bias());

    let col = col_model.predict(6, 10);
    let ind = ind_model.predict(6, 10);
    assert!(col.adjusted_ratio > ind.adjusted_ratio);
    assert!(collectivist.warmth_mean() > individualist.warmth_mean());
}

#[test]
fn history_records_each_update() {
    let mut belief = BeliefState::new(6.0);
    let updater = BeliefUpdater::default();
    for step in 0..5 {
        let value = 0.2 + 0.1 * f64::from(step);
        updater.update(&mut belief, Observation::new(value, value, 0.7));
    }
    assert_eq!(belief.history_len(), 6);
    let last = belief.history().last().copied();
    assert_eq!(last, Some(belief.snapshot()));
}
