use mtom_bot::{BayesianConfig, BayesianTomAgent, LambdaSchedule, NegotiationAgent};
use mtom_core::negotiation::{NegotiationEnv, Seat, Split};
use mtom_core::observer::{AdversarialObserver, AdversarialParams, Observer};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn config(lambda: f64) -> BayesianConfig {
    BayesianConfig {
        prior_strength: 6.0,
        monte_carlo_samples: 500,
        ..BayesianConfig::with_lambda(lambda)
    }
}

#[test]
fn pure_task_agent_keeps_all_but_one() {
    for seed in [0_u64, 1, 99] {
        let mut agent = BayesianTomAgent::new(config(0.0)).unwrap();
        let env = NegotiationEnv::new(10, 3).unwrap();
        let state = env.reset();
        let split = agent.choose_offer(&state, &mut StdRng::seed_from_u64(seed)).unwrap();
        assert_eq!(split, Split::new(9, 1));
        assert_eq!(agent.last_decision().unwrap().effective_lambda, 0.0);
    }
}

#[test]
fn predicted_generous_offer_raises_warmth() {
    let mut agent = BayesianTomAgent::new(config(0.5)).unwrap();
    let env = NegotiationEnv::new(10, 3).unwrap();
    let mut state = env.reset();
    let split = Split::new(2, 8);
    env.step(&mut state, split).unwrap();

    agent.update_beliefs(&state, split, None, None);
    let mental = agent.get_mental_state().unwrap();
    assert!(mental.warmth > 0.5);
}

#[test]
fn rejection_leaves_lower_beliefs_than_acceptance() {
    for share in [2_u32, 5, 7, 9] {
        let env = NegotiationEnv::new(10, 3).unwrap();
        let mut state = env.reset();
        let split = Split::keeping(Seat::First, share, 10);
        env.step(&mut state, split).unwrap();

        let mut accepted = BayesianTomAgent::new(config(0.5)).unwrap();
        let mut rejected = BayesianTomAgent::new(config(0.5)).unwrap();
        accepted.update_beliefs(&state, split, Some(true), None);
        rejected.update_beliefs(&state, split, Some(false), None);

        let a = accepted.get_mental_state().unwrap();
        let r = rejected.get_mental_state().unwrap();
        assert!(r.warmth < a.warmth, "share {share}");
        assert!(r.competence < a.competence, "share {share}");
    }
}

#[test]
fn effective_lambda_respects_clamp_across_an_episode() {
    let schedule = LambdaSchedule {
        start_factor: 2.0,
        end_factor: 0.2,
        decay_turns: 3,
    };
    for base in [0.3, 0.8, 1.5] {
        let mut agent = BayesianTomAgent::new(BayesianConfig {
            lambda_schedule: Some(schedule),
            ..config(base)
        })
        .unwrap();
        let env = NegotiationEnv::new(10, 6).unwrap();
        let mut state = env.reset();
        let mut rng = StdRng::seed_from_u64(4);
        while !state.is_terminal() {
            let split = agent.choose_offer(&state, &mut rng).unwrap();
            env.step(&mut state, split).unwrap();
            env.reject(&mut state).unwrap();
            agent.update_beliefs(&state, split, Some(false), None);
        }
        for record in agent.decision_history() {
            assert!(record.effective_lambda <= 1.6 * base + 1e-12);
            assert!(record.effective_lambda >= 0.15 - 1e-12);
            assert!(record.analysis.risk_ratio >= 0.0);
        }
        assert_eq!(agent.decision_history().len(), 6);
    }
}

fn play_episode(seed: u64) -> (Vec<Split>, f64, f64) {
    let mut agent = BayesianTomAgent::new(config(0.8)).unwrap();
    let mut observer = AdversarialObserver::new(AdversarialParams::default(), seed);
    let env = NegotiationEnv::new(10, 4).unwrap();
    let mut state = env.reset();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut offers = Vec::new();
    while !state.is_terminal() {
        let split = agent.choose_offer(&state, &mut rng).unwrap();
        env.step(&mut state, split).unwrap();
        let feedback = observer.observe(&state, split, Seat::First);
        let accepted = split.second >= 5;
        if accepted {
            env.accept(&mut state).unwrap();
        } else {
            env.reject(&mut state).unwrap();
        }
        agent.update_beliefs(&state, split, Some(accepted), Some(feedback));
        offers.push(split);
    }
    let mental = agent.get_mental_state().unwrap();
    (offers, mental.warmth, mental.competence)
}

#[test]
fn identical_seeds_replay_identically() {
    assert_eq!(play_episode(31), play_episode(31));
}

#[test]
fn cultural_template_changes_priors() {
    let collectivist = BayesianTomAgent::new(BayesianConfig {
        cultural_template: Some("collectivist".to_string()),
        ..config(0.5)
    })
    .unwrap();
    let individualist = BayesianTomAgent::new(BayesianConfig {
        cultural_template: Some("individualist".to_string()),
        ..config(0.5)
    })
    .unwrap();
    let col = collectivist.get_mental_state().unwrap();
    let ind = individualist.get_mental_state().unwrap();
    assert!(col.warmth > ind.warmth);
    assert!(col.competence < ind.competence);
}
