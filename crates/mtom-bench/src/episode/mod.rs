mod opponent;

pub use opponent::ScriptedOpponent;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use mtom_bot::{
    AgentError as PolicyError, BayesianConfig, BayesianTomAgent, GreedyAgent, NegotiationAgent,
    RandomAgent, SocialAgent,
};
use mtom_core::negotiation::{NegotiationEnv, NegotiationState, ProtocolError, Seat, Split};
use mtom_core::observer::{
    AdversarialObserver, AdversarialParams, Observer, Shaping, SimpleObserver,
};
use mtom_core::perception::PerceptionModel;
use mtom_core::social::{LinearSocialScore, MentalState};
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsCollector, AnalyticsError};
use crate::config::{
    AgentConfig, AgentKind, BenchmarkConfig, ObserverConfig, ObserverKind, OpponentPolicy,
    ResolvedOutputs,
};
use crate::telemetry::{
    TelemetryError, TelemetryOutputs, append_highlights_to_markdown, write_summary_outputs,
};
use crate::trace::{EpisodeTrace, TraceError, TraceMetadata, TraceOutcome, TraceStep};

/// Floor on the responder's acceptance probability.
const ACCEPT_BASE: f64 = 0.2;
/// Weight of the offered share on the acceptance probability.
const ACCEPT_SLOPE: f64 = 0.8;

/// Primary entry point for running a batch of episodes.
pub struct EpisodeRunner {
    config: BenchmarkConfig,
    outputs: ResolvedOutputs,
    agent: AgentBlueprint,
    observer: ObserverBlueprint,
    env: NegotiationEnv,
    scorer: LinearSocialScore,
    logging_enabled: bool,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub episodes_played: usize,
    pub rows_written: usize,
    pub agreement_rate: f64,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub traces_dir: Option<PathBuf>,
    pub telemetry_path: Option<PathBuf>,
    pub telemetry_outputs: Option<TelemetryOutputs>,
}

/// Result of one episode, shared by the JSONL writer and analytics.
#[derive(Debug, Clone)]
pub struct EpisodeOutcome {
    pub index: usize,
    pub seed: u64,
    pub opponent: OpponentPolicy,
    pub task_reward: f64,
    pub final_state: MentalState,
    pub social_score: f64,
    pub total_utility: f64,
    pub agreement: Option<Split>,
    pub turns: u32,
    pub offers: Vec<Split>,
}

impl EpisodeRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: BenchmarkConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let agent = AgentBlueprint::from_config(&config.agent)?;
        let observer = ObserverBlueprint::from_config(&config.observer)?;
        let env = NegotiationEnv::new(config.episodes.total_resources, config.episodes.max_turns)?;

        if config.opponent.policy == OpponentPolicy::Mixed && config.opponent.pool.is_empty() {
            return Err(RunnerError::EmptyOpponentPool);
        }

        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            scorer: LinearSocialScore::new(
                config.social.warmth_weight,
                config.social.competence_weight,
            ),
            config,
            outputs,
            agent,
            observer,
            env,
        })
    }

    /// Execute every episode, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut master = StdRng::seed_from_u64(self.config.episodes.seed.unwrap_or(0));
        let mut rows_written = 0usize;
        let mut analytics = AnalyticsCollector::new(&self.config);

        for episode_index in 0..self.config.episodes.count {
            let seed = master.next_u64();
            let (outcome, trace) = self.play_episode(episode_index, seed)?;

            analytics.record_episode(&outcome);
            write_episode_row(&mut writer, &self.config, &outcome)?;
            rows_written += 1;

            if let Some(dir) = self.outputs.traces_dir.as_deref() {
                trace.write_to(dir)?;
            }

            if self.logging_enabled && tracing::enabled!(Level::INFO) {
                event!(
                    target: "mtom_bench::episode",
                    Level::INFO,
                    run_id = %self.config.run_id,
                    episode_index = outcome.index as u32,
                    seed = outcome.seed,
                    opponent = outcome.opponent.as_str(),
                    agreement = outcome.agreement.is_some(),
                    turns = outcome.turns,
                    task_reward = outcome.task_reward,
                    social_score = outcome.social_score,
                    total_utility = outcome.total_utility,
                );
            }
        }

        writer.flush()?;

        let summary = analytics.finalize();
        summary.write_markdown(&self.outputs.summary_md)?;

        let telemetry_dir = self.outputs.summary_dir();
        let telemetry_path = if self.logging_enabled {
            Some(telemetry_dir.join("telemetry.jsonl"))
        } else {
            None
        };

        Ok(RunSummary {
            episodes_played: self.config.episodes.count,
            rows_written,
            agreement_rate: summary.agreement_rate,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            traces_dir: self.outputs.traces_dir.clone(),
            telemetry_path,
            telemetry_outputs: None,
        })
    }

    /// Summarise the telemetry log and append highlights to the summary.
    ///
    /// Call once the logging guard is dropped so the non-blocking writer has flushed.
    pub fn attach_telemetry(&self, summary: &mut RunSummary) -> Result<(), RunnerError> {
        let Some(path) = summary.telemetry_path.as_ref() else {
            return Ok(());
        };
        let telemetry_outputs = write_summary_outputs(path, &self.outputs.summary_dir())?;
        if let Some(outputs) = telemetry_outputs.as_ref() {
            append_highlights_to_markdown(&self.outputs.summary_md, outputs)?;
        }
        summary.telemetry_outputs = telemetry_outputs;
        Ok(())
    }

    fn play_episode(
        &self,
        episode_index: usize,
        seed: u64,
    ) -> Result<(EpisodeOutcome, EpisodeTrace), RunnerError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let policy = self.pick_opponent(&mut rng)?;
        let mut opponent = ScriptedOpponent::new(policy);
        let mut agent = self.agent.spawn()?;
        let mut observer = self.observer.spawn(seed);

        let mut trace = EpisodeTrace::new(TraceMetadata {
            run_id: self.config.run_id.clone(),
            episode_index,
            seed,
            agent: self.agent.name.clone(),
            agent_kind: self.agent.kind,
            opponent: policy,
            observer: observer.as_ref().map(|channel| channel.describe()),
            total_resources: self.env.total_resources(),
            max_turns: self.env.max_turns(),
        });

        let mut state = self.env.reset();
        let mut last_own_offer = None;

        while !state.is_terminal() {
            let turn = state.current_turn;
            let proposer = state.current_proposer;

            let step = if proposer == agent.seat() {
                let split = agent.choose_offer(&state, &mut rng)?;
                self.env.step(&mut state, split)?;
                let feedback = observer
                    .as_mut()
                    .map(|channel| channel.observe(&state, split, proposer));
                let accepted = self.respond(&mut state, split, opponent.seat(), &mut rng)?;
                agent.update_beliefs(&state, split, Some(accepted), feedback);
                opponent.observe(split);
                last_own_offer = Some(split);
                TraceStep {
                    turn,
                    proposer,
                    split,
                    accepted,
                    feedback,
                    decision: agent.last_decision().cloned(),
                    mental_state: agent.get_mental_state(),
                }
            } else {
                let split = opponent.propose(&state, &mut rng);
                self.env.step(&mut state, split)?;
                let accepted = self.respond(&mut state, split, agent.seat(), &mut rng)?;
                TraceStep {
                    turn,
                    proposer,
                    split,
                    accepted,
                    feedback: None,
                    decision: None,
                    mental_state: agent.get_mental_state(),
                }
            };
            trace.push(step);
        }

        let task_reward = self.env.reward(&state, agent.seat());
        let final_state = agent
            .get_mental_state()
            .or_else(|| {
                last_own_offer.map(|split| {
                    MentalState::from_offer(
                        split.share_for(agent.seat()),
                        state.total_resources,
                        &PerceptionModel::default(),
                    )
                })
            })
            .unwrap_or_else(|| MentalState::new(0.0, 0.0));
        let social_score = self.scorer.score(&final_state);
        let total_utility = task_reward + self.agent.reporting_lambda * social_score;

        let outcome = EpisodeOutcome {
            index: episode_index,
            seed,
            opponent: policy,
            task_reward,
            final_state,
            social_score,
            total_utility,
            agreement: state.final_agreement,
            turns: state.current_turn,
            offers: state.offers.clone(),
        };

        trace.finish(TraceOutcome {
            agreement: outcome.agreement,
            turns: outcome.turns,
            task_reward,
            final_state,
            social_score,
            total_utility,
        });

        Ok((outcome, trace))
    }

    fn pick_opponent(&self, rng: &mut StdRng) -> Result<OpponentPolicy, RunnerError> {
        let opponent = &self.config.opponent;
        if opponent.policy != OpponentPolicy::Mixed {
            return Ok(opponent.policy);
        }
        if opponent.pool.is_empty() {
            return Err(RunnerError::EmptyOpponentPool);
        }
        Ok(opponent.pool[rng.gen_range(0..opponent.pool.len())])
    }

    /// The responder accepts with probability growing in the share it is offered.
    fn respond(
        &self,
        state: &mut NegotiationState,
        split: Split,
        responder: Seat,
        rng: &mut StdRng,
    ) -> Result<bool, RunnerError> {
        let probability =
            (ACCEPT_BASE + ACCEPT_SLOPE * split.ratio_for(responder)).clamp(0.0, 1.0);
        let accepted = rng.gen_bool(probability);
        if accepted {
            self.env.accept(state)?;
        } else {
            self.env.reject(state)?;
        }
        Ok(accepted)
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_episode_row(
    writer: &mut BufWriter<File>,
    config: &BenchmarkConfig,
    outcome: &EpisodeOutcome,
) -> Result<(), RunnerError> {
    let row = EpisodeLogRow {
        run_id: &config.run_id,
        episode_id: format!("E{:05}", outcome.index),
        episode_index: outcome.index,
        seed: outcome.seed,
        agent: &config.agent.name,
        agent_kind: config.agent.kind,
        opponent: outcome.opponent,
        task_reward: outcome.task_reward,
        warmth: outcome.final_state.warmth,
        competence: outcome.final_state.competence,
        social_score: outcome.social_score,
        total_utility: outcome.total_utility,
        agreed: outcome.agreement.is_some(),
        agreement: outcome.agreement,
        turns: outcome.turns,
        offers: &outcome.offers,
    };

    serde_json::to_writer(&mut *writer, &row)?;
    writer.write_all(b"\n")?;
    Ok(())
}

#[derive(Serialize)]
struct EpisodeLogRow<'a> {
    run_id: &'a str,
    episode_id: String,
    episode_index: usize,
    seed: u64,
    agent: &'a str,
    agent_kind: AgentKind,
    opponent: OpponentPolicy,
    task_reward: f64,
    warmth: f64,
    competence: f64,
    social_score: f64,
    total_utility: f64,
    agreed: bool,
    agreement: Option<Split>,
    turns: u32,
    offers: &'a [Split],
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Agent(#[from] AgentError),
    #[error("agent decision failed: {0}")]
    Policy(#[from] PolicyError),
    #[error("negotiation protocol violated: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("mixed opponent requires a non-empty pool")]
    EmptyOpponentPool,
    #[error("invalid observer parameter: {message}")]
    InvalidObserverParam { message: String },
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("trace output failed: {0}")]
    Trace(#[from] TraceError),
    #[error("telemetry summarisation failed: {0}")]
    Telemetry(#[from] TelemetryError),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid bayesian parameter for agent '{name}': {message}")]
    InvalidBayesianParam { name: String, message: String },
    #[error("invalid baseline parameter for agent '{name}': {message}")]
    InvalidBaselineParam { name: String, message: String },
}

struct AgentBlueprint {
    name: String,
    kind: AgentKind,
    /// λ used when reporting total utility.
    reporting_lambda: f64,
    implementation: AgentImplementation,
}

enum AgentImplementation {
    Bayesian(BayesianConfig),
    Greedy,
    Random,
    Social,
}

impl AgentBlueprint {
    fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let (implementation, reporting_lambda) = match config.kind {
            AgentKind::Bayesian => {
                let options = bayesian_from_params(&config.name, &config.params)?;
                let lambda = options.lambda_social;
                (AgentImplementation::Bayesian(options), lambda)
            }
            AgentKind::Greedy => (
                AgentImplementation::Greedy,
                baseline_lambda(&config.name, &config.params)?,
            ),
            AgentKind::Random => (
                AgentImplementation::Random,
                baseline_lambda(&config.name, &config.params)?,
            ),
            AgentKind::Social => (
                AgentImplementation::Social,
                baseline_lambda(&config.name, &config.params)?,
            ),
        };

        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            reporting_lambda,
            implementation,
        })
    }

    /// Fresh agent for one episode, always seated first.
    fn spawn(&self) -> Result<Box<dyn NegotiationAgent>, AgentError> {
        let seat = Seat::First;
        Ok(match &self.implementation {
            AgentImplementation::Bayesian(options) => Box::new(
                BayesianTomAgent::new(options.clone())
                    .map_err(|err| AgentError::InvalidBayesianParam {
                        name: self.name.clone(),
                        message: err.to_string(),
                    })?
                    .with_name(self.name.clone())
                    .with_seat(seat),
            ),
            AgentImplementation::Greedy => Box::new(GreedyAgent::new(seat)),
            AgentImplementation::Random => Box::new(RandomAgent::new(seat)),
            AgentImplementation::Social => Box::new(SocialAgent::new(seat)),
        })
    }
}

fn bayesian_from_params(
    name: &str,
    params: &serde_yaml::Value,
) -> Result<BayesianConfig, AgentError> {
    let invalid = |message: String| AgentError::InvalidBayesianParam {
        name: name.to_string(),
        message,
    };

    let options = if params.is_null() {
        BayesianConfig::default()
    } else {
        serde_yaml::from_value::<BayesianConfig>(params.clone())
            .map_err(|err| invalid(err.to_string()))?
    };

    options.validate().map_err(|err| invalid(err.to_string()))?;
    options
        .cultural_profile()
        .map_err(|err| invalid(err.to_string()))?;
    Ok(options)
}

fn baseline_lambda(name: &str, params: &serde_yaml::Value) -> Result<f64, AgentError> {
    if params.is_null() {
        return Ok(0.0);
    }

    let mapping = params
        .as_mapping()
        .ok_or_else(|| AgentError::InvalidBaselineParam {
            name: name.to_string(),
            message: "expected mapping for baseline params".to_string(),
        })?;

    let value = mapping
        .iter()
        .find_map(|(key, value)| (key.as_str() == Some("lambda_social")).then_some(value));

    match value {
        None => Ok(0.0),
        Some(value) => match value.as_f64() {
            Some(lambda) if lambda.is_finite() && lambda >= 0.0 => Ok(lambda),
            _ => Err(AgentError::InvalidBaselineParam {
                name: name.to_string(),
                message: "lambda_social must be a non-negative number".to_string(),
            }),
        },
    }
}

enum ObserverBlueprint {
    Silent,
    Simple(Shaping),
    Adversarial(AdversarialParams),
}

impl ObserverBlueprint {
    fn from_config(config: &ObserverConfig) -> Result<Self, RunnerError> {
        Ok(match config.kind {
            ObserverKind::None => ObserverBlueprint::Silent,
            ObserverKind::Simple => ObserverBlueprint::Simple(Shaping::Neutral),
            ObserverKind::Lenient => ObserverBlueprint::Simple(Shaping::Lenient),
            ObserverKind::Harsh => ObserverBlueprint::Simple(Shaping::Harsh),
            ObserverKind::Adversarial => {
                let params = if config.params.is_null() {
                    AdversarialParams::default()
                } else {
                    serde_yaml::from_value(config.params.clone()).map_err(|err| {
                        RunnerError::InvalidObserverParam {
                            message: err.to_string(),
                        }
                    })?
                };
                ObserverBlueprint::Adversarial(params)
            }
        })
    }

    /// Channel for one episode; adversarial noise is seeded from the episode seed.
    fn spawn(&self, seed: u64) -> Option<Box<dyn Observer>> {
        match self {
            ObserverBlueprint::Silent => None,
            ObserverBlueprint::Simple(shaping) => {
                Some(Box::new(SimpleObserver::with_shaping(*shaping)))
            }
            ObserverBlueprint::Adversarial(params) => {
                Some(Box::new(AdversarialObserver::new(*params, seed)))
            }
        }
    }
}
