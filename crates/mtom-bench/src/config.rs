use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

use crate::telemetry::{BELIEF_TARGET, DECISION_TARGET, EPISODE_TARGET};

const DEFAULT_TOTAL_RESOURCES: u32 = 10;
const DEFAULT_MAX_TURNS: u32 = 3;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root benchmark configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchmarkConfig {
    pub run_id: String,
    pub episodes: EpisodeConfig,
    pub agent: AgentConfig,
    #[serde(default)]
    pub opponent: OpponentConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub social: SocialConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchmarkConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchmarkConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.episodes.validate()?;
        self.agent.validate()?;
        self.opponent.validate()?;
        self.observer.normalize();
        self.social.validate()?;
        self.outputs.validate(&self.run_id)?;
        self.logging.validate()?;
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
            traces_dir: self
                .outputs
                .traces_dir
                .as_deref()
                .map(|dir| resolve_template(&self.run_id, dir)),
        }
    }
}

/// Episode sampling block.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EpisodeConfig {
    pub seed: Option<u64>,
    pub count: usize,
    #[serde(default = "default_total_resources")]
    pub total_resources: u32,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

impl EpisodeConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(invalid("episodes.count", "number of episodes must be greater than zero"));
        }
        if self.total_resources <= 1 {
            return Err(invalid(
                "episodes.total_resources",
                "at least two resource units are required for a legal offer",
            ));
        }
        if self.max_turns == 0 {
            return Err(invalid("episodes.max_turns", "max_turns must be at least 1"));
        }
        Ok(())
    }
}

fn default_total_resources() -> u32 {
    DEFAULT_TOTAL_RESOURCES
}

fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

/// The evaluated agent, always seated first.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

impl AgentConfig {
    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(invalid("agent.name", "agent name must not be empty"));
        }
        if !self.name.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
            return Err(invalid("agent.name", "agent name contains invalid characters"));
        }
        if self.params.is_null() {
            self.params = serde_yaml::Value::Mapping(Default::default());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Bayesian,
    Greedy,
    Random,
    Social,
}

/// Scripted counterpart strategy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OpponentPolicy {
    Fair,
    TitForTat,
    Concession,
    Unpredictable,
    Mixed,
}

impl OpponentPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            OpponentPolicy::Fair => "fair",
            OpponentPolicy::TitForTat => "tit_for_tat",
            OpponentPolicy::Concession => "concession",
            OpponentPolicy::Unpredictable => "unpredictable",
            OpponentPolicy::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OpponentConfig {
    pub policy: OpponentPolicy,
    /// Candidate strategies for `mixed`; one is drawn per episode.
    #[serde(default)]
    pub pool: Vec<OpponentPolicy>,
}

impl Default for OpponentConfig {
    fn default() -> Self {
        Self {
            policy: OpponentPolicy::Fair,
            pool: Vec::new(),
        }
    }
}

impl OpponentConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.policy != OpponentPolicy::Mixed {
            return Ok(());
        }
        if self.pool.is_empty() {
            return Err(invalid("opponent.pool", "mixed opponent requires a non-empty pool"));
        }
        if self.pool.contains(&OpponentPolicy::Mixed) {
            return Err(invalid("opponent.pool", "mixed opponent pool cannot contain 'mixed'"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObserverKind {
    None,
    Simple,
    Lenient,
    Harsh,
    Adversarial,
}

/// External feedback channel wiring.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ObserverConfig {
    pub kind: ObserverKind,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            kind: ObserverKind::Simple,
            params: serde_yaml::Value::Null,
        }
    }
}

impl ObserverConfig {
    fn normalize(&mut self) {
        if self.params.is_null() {
            self.params = serde_yaml::Value::Mapping(Default::default());
        }
    }
}

/// Weights of the reported social score.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct SocialConfig {
    #[serde(default = "default_warmth_weight")]
    pub warmth_weight: f64,
    #[serde(default = "default_competence_weight")]
    pub competence_weight: f64,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            warmth_weight: default_warmth_weight(),
            competence_weight: default_competence_weight(),
        }
    }
}

impl SocialConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        for (label, value) in [
            ("social.warmth_weight", self.warmth_weight),
            ("social.competence_weight", self.competence_weight),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(label, "weight must be a positive number"));
            }
        }
        Ok(())
    }
}

fn default_warmth_weight() -> f64 {
    0.6
}

fn default_competence_weight() -> f64 {
    0.4
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
    #[serde(default)]
    pub traces_dir: Option<String>,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        let mut entries = vec![
            ("outputs.jsonl", self.jsonl.as_str()),
            ("outputs.summary_md", self.summary_md.as_str()),
        ];
        if let Some(dir) = self.traces_dir.as_deref() {
            entries.push(("outputs.traces_dir", dir));
        }
        for (label, value) in entries {
            if value.trim().is_empty() {
                return Err(invalid(label, "path must not be empty"));
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(invalid(label, "resolved path is invalid"));
            }
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    /// Per-offer events on `mtom_bot::decision`.
    #[serde(default = "default_true")]
    pub decision_events: bool,
    /// Per-update events on `mtom_bot::belief`.
    #[serde(default = "default_true")]
    pub belief_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
            decision_events: true,
            belief_events: true,
        }
    }
}

impl LoggingConfig {
    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
        if self.level().is_none() {
            return Err(invalid(
                "logging.tracing_level",
                "expected one of trace, debug, info, warn, error",
            ));
        }
        Ok(())
    }

    /// `EnvFilter` directives: the base level, episode rows always at INFO, and the bot
    /// targets silenced when their events are switched off.
    pub fn filter_directives(&self) -> String {
        let level = self.level().unwrap_or(Level::INFO);
        let mut directives = vec![
            level.as_str().to_ascii_lowercase(),
            format!("{EPISODE_TARGET}=info"),
        ];
        if !self.decision_events {
            directives.push(format!("{DECISION_TARGET}=off"));
        }
        if !self.belief_events {
            directives.push(format!("{BELIEF_TARGET}=off"));
        }
        directives.join(",")
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(invalid("run_id", "run_id must not be empty"));
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(invalid(
            "run_id",
            "run_id may only contain alphanumeric characters, '.', '_' or '-'",
        ));
    }

    Ok(())
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{run_id}", run_id))
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub traces_dir: Option<PathBuf>,
}

impl ResolvedOutputs {
    /// Directory holding the summary; telemetry lands next to it.
    pub fn summary_dir(&self) -> PathBuf {
        self.summary_md
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_YAML: &str = r#"
run_id: "smoke"
episodes:
  seed: 42
  count: 20
agent:
  name: "bayes"
  kind: "bayesian"
  params:
    lambda_social: 0.5
opponent:
  policy: "mixed"
  pool: ["fair", "tit_for_tat", "concession"]
observer:
  kind: "adversarial"
  params:
    noise_std: 0.35
outputs:
  jsonl: "out/{run_id}/episodes.jsonl"
  summary_md: "out/{run_id}/summary.md"
  traces_dir: "out/{run_id}/traces"
logging:
  enable_structured: true
  tracing_level: "debug"
"#;

    fn parse(yaml: &str) -> BenchmarkConfig {
        serde_yaml::from_str(yaml).expect("parse yaml")
    }

    fn field_of(err: ValidationError) -> String {
        match err {
            ValidationError::InvalidField { field, .. } => field,
        }
    }

    #[test]
    fn loads_and_validates_basic_config() {
        let mut cfg = parse(BASIC_YAML);
        cfg.validate().expect("validate");

        assert_eq!(cfg.episodes.total_resources, DEFAULT_TOTAL_RESOURCES);
        assert_eq!(cfg.episodes.max_turns, DEFAULT_MAX_TURNS);
        assert_eq!(cfg.social, SocialConfig::default());
        assert_eq!(cfg.logging.level(), Some(Level::DEBUG));

        let outputs = cfg.resolved_outputs();
        assert_eq!(outputs.jsonl, PathBuf::from("out/smoke/episodes.jsonl"));
        assert_eq!(outputs.traces_dir, Some(PathBuf::from("out/smoke/traces")));
        assert_eq!(outputs.summary_dir(), PathBuf::from("out/smoke"));
    }

    #[test]
    fn rejects_invalid_run_id() {
        let mut cfg = parse(&BASIC_YAML.replace("\"smoke\"", "\"smoke test\""));
        assert_eq!(field_of(cfg.validate().expect_err("invalid run id")), "run_id");
    }

    #[test]
    fn rejects_degenerate_episode_settings() {
        let mut zero = parse(&BASIC_YAML.replace("count: 20", "count: 0"));
        assert_eq!(field_of(zero.validate().expect_err("zero episodes")), "episodes.count");

        let mut tiny = parse(&BASIC_YAML.replace("count: 20", "count: 20\n  total_resources: 1"));
        assert_eq!(
            field_of(tiny.validate().expect_err("one unit")),
            "episodes.total_resources"
        );
    }

    #[test]
    fn rejects_empty_mixed_pool() {
        let yaml = BASIC_YAML.replace("  pool: [\"fair\", \"tit_for_tat\", \"concession\"]\n", "");
        let mut cfg = parse(&yaml);
        assert_eq!(field_of(cfg.validate().expect_err("empty pool")), "opponent.pool");
    }

    #[test]
    fn rejects_unknown_agent_kind() {
        let yaml = BASIC_YAML.replace("kind: \"bayesian\"", "kind: \"oracle\"");
        assert!(serde_yaml::from_str::<BenchmarkConfig>(&yaml).is_err());
    }

    #[test]
    fn rejects_non_positive_social_weight() {
        let yaml = BASIC_YAML.replace(
            "outputs:",
            "social:\n  warmth_weight: 0.0\noutputs:",
        );
        let mut cfg = parse(&yaml);
        assert_eq!(
            field_of(cfg.validate().expect_err("zero weight")),
            "social.warmth_weight"
        );
    }

    #[test]
    fn defaults_apply_to_optional_blocks() {
        let yaml = r#"
run_id: "minimal"
episodes:
  count: 1
agent:
  name: "greedy"
  kind: "greedy"
outputs:
  jsonl: "out/{run_id}/{run_id}.jsonl"
  summary_md: "out/{run_id}/summary.md"
"#;
        let mut cfg = parse(yaml);
        cfg.validate().expect("valid");
        assert_eq!(cfg.opponent, OpponentConfig::default());
        assert_eq!(cfg.observer.kind, ObserverKind::Simple);
        assert!(cfg.agent.params.is_mapping());
        assert!(!cfg.logging.enable_structured);
        let outputs = cfg.resolved_outputs();
        assert_eq!(outputs.jsonl, PathBuf::from("out/minimal/minimal.jsonl"));
        assert!(outputs.traces_dir.is_none());
        assert_eq!(cfg.logging.filter_directives(), "info,mtom_bench::episode=info");
    }

    #[test]
    fn logging_switches_shape_the_filter() {
        let yaml = BASIC_YAML.replace(
            "  tracing_level: \"debug\"\n",
            "  tracing_level: \"debug\"\n  decision_events: false\n",
        );
        let mut cfg = parse(&yaml);
        cfg.validate().expect("valid");
        assert!(cfg.logging.belief_events);
        assert_eq!(
            cfg.logging.filter_directives(),
            "debug,mtom_bench::episode=info,mtom_bot::decision=off"
        );

        let mut noisy = parse(&BASIC_YAML.replace("\"debug\"", "\"verbose\""));
        assert_eq!(field_of(noisy.validate().expect_err("unknown level")), "logging.tracing_level");
    }
}
