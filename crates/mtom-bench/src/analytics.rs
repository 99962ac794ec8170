use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

use crate::config::{AgentKind, BenchmarkConfig, OpponentPolicy};
use crate::episode::EpisodeOutcome;

const CONFIDENCE_LEVEL: f64 = 0.95;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Accumulates per-episode outcomes for the Markdown summary.
pub struct AnalyticsCollector {
    run_id: String,
    agent: String,
    kind: AgentKind,
    task_reward: Vec<f64>,
    social_score: Vec<f64>,
    total_utility: Vec<f64>,
    warmth: Vec<f64>,
    competence: Vec<f64>,
    turns: Vec<f64>,
    agreements: usize,
    opponents: BTreeMap<OpponentPolicy, OpponentAccumulator>,
}

impl AnalyticsCollector {
    pub fn new(config: &BenchmarkConfig) -> Self {
        let capacity = config.episodes.count;
        Self {
            run_id: config.run_id.clone(),
            agent: config.agent.name.clone(),
            kind: config.agent.kind,
            task_reward: Vec::with_capacity(capacity),
            social_score: Vec::with_capacity(capacity),
            total_utility: Vec::with_capacity(capacity),
            warmth: Vec::with_capacity(capacity),
            competence: Vec::with_capacity(capacity),
            turns: Vec::with_capacity(capacity),
            agreements: 0,
            opponents: BTreeMap::new(),
        }
    }

    pub fn record_episode(&mut self, outcome: &EpisodeOutcome) {
        self.task_reward.push(outcome.task_reward);
        self.social_score.push(outcome.social_score);
        self.total_utility.push(outcome.total_utility);
        self.warmth.push(outcome.final_state.warmth);
        self.competence.push(outcome.final_state.competence);
        self.turns.push(f64::from(outcome.turns));
        if outcome.agreement.is_some() {
            self.agreements += 1;
        }
        self.opponents
            .entry(outcome.opponent)
            .or_default()
            .record(outcome);
    }

    pub fn finalize(self) -> AnalyticsSummary {
        let episodes = self.task_reward.len();
        let metrics = vec![
            MetricReport::from_samples("task_reward", &self.task_reward),
            MetricReport::from_samples("social_score", &self.social_score),
            MetricReport::from_samples("total_utility", &self.total_utility),
            MetricReport::from_samples("final_warmth", &self.warmth),
            MetricReport::from_samples("final_competence", &self.competence),
            MetricReport::from_samples("turns", &self.turns),
        ];
        let opponents = self
            .opponents
            .into_iter()
            .map(|(policy, acc)| acc.into_report(policy))
            .collect();

        AnalyticsSummary {
            run_id: self.run_id,
            agent: self.agent,
            kind: self.kind,
            episodes,
            agreement_rate: ratio(self.agreements, episodes),
            metrics,
            opponents,
        }
    }
}

#[derive(Default)]
struct OpponentAccumulator {
    episodes: usize,
    agreements: usize,
    task_reward: f64,
    social_score: f64,
    total_utility: f64,
}

impl OpponentAccumulator {
    fn record(&mut self, outcome: &EpisodeOutcome) {
        self.episodes += 1;
        if outcome.agreement.is_some() {
            self.agreements += 1;
        }
        self.task_reward += outcome.task_reward;
        self.social_score += outcome.social_score;
        self.total_utility += outcome.total_utility;
    }

    fn into_report(self, policy: OpponentPolicy) -> OpponentReport {
        let n = self.episodes.max(1) as f64;
        OpponentReport {
            policy,
            episodes: self.episodes,
            agreement_rate: ratio(self.agreements, self.episodes),
            avg_task_reward: self.task_reward / n,
            avg_social_score: self.social_score / n,
            avg_total_utility: self.total_utility / n,
        }
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub name: &'static str,
    pub samples: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub ci95: (f64, f64),
}

impl MetricReport {
    fn from_samples(name: &'static str, samples: &[f64]) -> Self {
        let n = samples.len();
        let mean = if n == 0 {
            0.0
        } else {
            samples.iter().sum::<f64>() / n as f64
        };
        let std_dev = if n < 2 {
            0.0
        } else {
            let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
            var.sqrt()
        };
        Self {
            name,
            samples: n,
            mean,
            std_dev,
            ci95: confidence_interval(mean, std_dev, n),
        }
    }
}

/// Two-sided Student-t interval around the mean; collapses to the mean below two samples.
fn confidence_interval(mean: f64, std_dev: f64, n: usize) -> (f64, f64) {
    if n < 2 || std_dev <= 0.0 {
        return (mean, mean);
    }
    let quantile = 1.0 - (1.0 - CONFIDENCE_LEVEL) / 2.0;
    let t = match StudentsT::new(0.0, 1.0, n as f64 - 1.0) {
        Ok(dist) => dist.inverse_cdf(quantile),
        Err(_) => return (mean, mean),
    };
    let margin = t * std_dev / (n as f64).sqrt();
    (mean - margin, mean + margin)
}

#[derive(Debug, Clone, Serialize)]
pub struct OpponentReport {
    pub policy: OpponentPolicy,
    pub episodes: usize,
    pub agreement_rate: f64,
    pub avg_task_reward: f64,
    pub avg_social_score: f64,
    pub avg_total_utility: f64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub run_id: String,
    pub agent: String,
    pub kind: AgentKind,
    pub episodes: usize,
    pub agreement_rate: f64,
    pub metrics: Vec<MetricReport>,
    pub opponents: Vec<OpponentReport>,
}

impl AnalyticsSummary {
    pub fn metric(&self, name: &str) -> Option<&MetricReport> {
        self.metrics.iter().find(|metric| metric.name == name)
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        let mut rows = String::new();
        rows.push_str("# Negotiation Summary\n\n");
        rows.push_str(&format!(
            "Run `{}`: agent `{}` ({:?}), {} episodes, agreement rate {:.1}%\n\n",
            self.run_id,
            self.agent,
            self.kind,
            self.episodes,
            self.agreement_rate * 100.0
        ));
        rows.push_str("| Metric | Mean | Std | 95% CI | N |\n");
        rows.push_str("|--------|------|-----|--------|---|\n");
        for metric in &self.metrics {
            rows.push_str(&format!(
                "| {name} | {mean:.3} | {std:.3} | [{lo:.3}, {hi:.3}] | {n} |\n",
                name = metric.name,
                mean = metric.mean,
                std = metric.std_dev,
                lo = metric.ci95.0,
                hi = metric.ci95.1,
                n = metric.samples,
            ));
        }

        rows.push_str("\n## By Opponent\n\n");
        rows.push_str("| Opponent | Episodes | Agreement % | Avg task | Avg social | Avg utility |\n");
        rows.push_str("|----------|----------|-------------|----------|------------|-------------|\n");
        for report in &self.opponents {
            rows.push_str(&format!(
                "| {policy} | {episodes} | {agree:.1}% | {task:.3} | {social:.3} | {utility:.3} |\n",
                policy = report.policy.as_str(),
                episodes = report.episodes,
                agree = report.agreement_rate * 100.0,
                task = report.avg_task_reward,
                social = report.avg_social_score,
                utility = report.avg_total_utility,
            ));
        }

        fs::write(path.as_ref(), rows).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })?;
        Ok(())
    }
}
