//! Per-episode JSON traces: metadata, every proposal with its response, and the outcome.

use std::fs;
use std::path::{Path, PathBuf};

use mtom_bot::DecisionRecord;
use mtom_core::negotiation::{Seat, Split};
use mtom_core::observer::{ChannelDescription, ObserverFeedback};
use mtom_core::social::MentalState;
use serde::Serialize;
use thiserror::Error;

use crate::config::{AgentKind, OpponentPolicy};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize trace: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceMetadata {
    pub run_id: String,
    pub episode_index: usize,
    pub seed: u64,
    pub agent: String,
    pub agent_kind: AgentKind,
    pub opponent: OpponentPolicy,
    pub observer: Option<ChannelDescription>,
    pub total_resources: u32,
    pub max_turns: u32,
}

/// One proposal and its response.
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub turn: u32,
    pub proposer: Seat,
    pub split: Split,
    pub accepted: bool,
    pub feedback: Option<ObserverFeedback>,
    /// Decision details when the evaluated agent proposed and exposes them.
    pub decision: Option<DecisionRecord>,
    /// Agent's mental state after the step.
    pub mental_state: Option<MentalState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceOutcome {
    pub agreement: Option<Split>,
    pub turns: u32,
    pub task_reward: f64,
    pub final_state: MentalState,
    pub social_score: f64,
    pub total_utility: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EpisodeTrace {
    pub metadata: TraceMetadata,
    pub steps: Vec<TraceStep>,
    pub outcome: Option<TraceOutcome>,
}

impl EpisodeTrace {
    pub fn new(metadata: TraceMetadata) -> Self {
        Self {
            metadata,
            steps: Vec::new(),
            outcome: None,
        }
    }

    pub fn push(&mut self, step: TraceStep) {
        self.steps.push(step);
    }

    pub fn finish(&mut self, outcome: TraceOutcome) {
        self.outcome = Some(outcome);
    }

    pub fn file_name(episode_index: usize) -> String {
        format!("episode_{episode_index:05}.json")
    }

    /// Writes the trace as pretty JSON under `dir`, returning the file path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, TraceError> {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|source| TraceError::Io {
                context: "creating traces directory",
                source,
            })?;
        }
        let path = dir.join(Self::file_name(self.metadata.episode_index));
        let payload = serde_json::to_vec_pretty(self)?;
        fs::write(&path, payload).map_err(|source| TraceError::Io {
            context: "writing episode trace",
            source,
        })?;
        Ok(path)
    }
}
