use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const DECISION_TARGET: &str = "mtom_bot::decision";
pub const BELIEF_TARGET: &str = "mtom_bot::belief";
pub const EPISODE_TARGET: &str = "mtom_bench::episode";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    pub decision: DecisionTelemetrySummary,
    pub belief: BeliefTelemetrySummary,
    pub episodes: EpisodeTelemetrySummary,
}

#[derive(Debug, Default, Serialize)]
pub struct DecisionTelemetrySummary {
    pub count: usize,
    pub avg_effective_lambda: Option<f64>,
    pub avg_expected_utility: Option<f64>,
    pub avg_risk_ratio: Option<f64>,
    pub avg_own_share: Option<f64>,
    pub perception_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Serialize)]
pub struct BeliefTelemetrySummary {
    pub count: usize,
    pub avg_warmth: Option<f64>,
    pub avg_competence: Option<f64>,
    pub avg_confidence: Option<f64>,
    pub source_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Serialize)]
pub struct EpisodeTelemetrySummary {
    pub count: usize,
    pub agreements: usize,
    pub avg_total_utility: Option<f64>,
}

#[derive(Debug)]
struct Average {
    sum: f64,
    count: usize,
}

impl Average {
    fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn add(&mut self, value: Option<f64>) {
        if let Some(value) = value.filter(|v| v.is_finite()) {
            self.sum += value;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Aggregate decision, belief and episode events from a telemetry log.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let file = File::open(path).map_err(|source| TelemetryError::Io {
        context: "opening telemetry log",
        source,
    })?;
    let reader = BufReader::new(file);

    let mut summary = TelemetrySummary::default();
    let mut lambda_avg = Average::new();
    let mut utility_avg = Average::new();
    let mut risk_avg = Average::new();
    let mut share_avg = Average::new();
    let mut warmth_avg = Average::new();
    let mut competence_avg = Average::new();
    let mut confidence_avg = Average::new();
    let mut episode_utility_avg = Average::new();

    for line in reader.lines() {
        let line = line.map_err(|source| TelemetryError::Io {
            context: "reading telemetry line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let payload: Value = serde_json::from_str(&line)?;
        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fields = payload
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match target {
            DECISION_TARGET => {
                summary.decision.count += 1;
                lambda_avg.add(number(&fields, "effective_lambda"));
                utility_avg.add(number(&fields, "expected_utility"));
                risk_avg.add(number(&fields, "risk_ratio"));
                share_avg.add(number(&fields, "own_share"));
                bump(&mut summary.decision.perception_counts, label(&fields, "perception"));
            }
            BELIEF_TARGET => {
                summary.belief.count += 1;
                warmth_avg.add(number(&fields, "warmth"));
                competence_avg.add(number(&fields, "competence"));
                confidence_avg.add(number(&fields, "confidence"));
                bump(&mut summary.belief.source_counts, label(&fields, "source"));
            }
            EPISODE_TARGET => {
                summary.episodes.count += 1;
                if fields.get("agreement").and_then(Value::as_bool) == Some(true) {
                    summary.episodes.agreements += 1;
                }
                episode_utility_avg.add(number(&fields, "total_utility"));
            }
            _ => {}
        }
    }

    summary.decision.avg_effective_lambda = lambda_avg.mean();
    summary.decision.avg_expected_utility = utility_avg.mean();
    summary.decision.avg_risk_ratio = risk_avg.mean();
    summary.decision.avg_own_share = share_avg.mean();
    summary.belief.avg_warmth = warmth_avg.mean();
    summary.belief.avg_competence = competence_avg.mean();
    summary.belief.avg_confidence = confidence_avg.mean();
    summary.episodes.avg_total_utility = episode_utility_avg.mean();

    Ok(summary)
}

fn number(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    fields.get(key).and_then(Value::as_f64)
}

fn label<'a>(fields: &'a Map<String, Value>, key: &str) -> &'a str {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("<unset>")
}

fn bump(counts: &mut BTreeMap<String, usize>, key: &str) {
    *counts.entry(key.to_string()).or_insert(0) += 1;
}

pub fn write_summary_outputs(
    telemetry_path: &Path,
    output_dir: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    let md_path = output_dir.join("telemetry_summary.md");

    std::fs::write(&json_path, serde_json::to_vec_pretty(&summary)?).map_err(|source| {
        TelemetryError::Io {
            context: "writing telemetry summary json",
            source,
        }
    })?;

    let markdown = render_markdown(&summary, telemetry_path);
    std::fs::write(&md_path, markdown).map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary markdown",
        source,
    })?;

    Ok(Some(TelemetryOutputs {
        summary,
        json_path,
        markdown_path: md_path,
    }))
}

pub fn append_highlights_to_markdown(
    summary_path: &Path,
    outputs: &TelemetryOutputs,
) -> Result<(), TelemetryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|source| TelemetryError::Io {
            context: "opening summary markdown for telemetry append",
            source,
        })?;

    let mut section = String::new();
    section.push_str("\n## Telemetry Highlights\n");
    let decision = &outputs.summary.decision;
    section.push_str(&format!("- Decision events captured: {}\n", decision.count));
    if let Some(value) = decision.avg_effective_lambda {
        section.push_str(&format!("- Avg effective lambda: {:.3}\n", value));
    }
    if let Some(value) = decision.avg_risk_ratio {
        section.push_str(&format!("- Avg risk ratio: {:.3}\n", value));
    }
    if let Some(value) = decision.avg_own_share {
        section.push_str(&format!("- Avg share kept: {:.2}\n", value));
    }
    if !decision.perception_counts.is_empty() {
        section.push_str("- Predicted perceptions:\n");
        for (label, count) in &decision.perception_counts {
            section.push_str(&format!("  - {}: {}\n", label, count));
        }
    }

    let belief = &outputs.summary.belief;
    section.push_str("\n### Belief Updates\n");
    if belief.count == 0 {
        section.push_str("- <none>\n");
    } else {
        section.push_str(&format!("- Updates: {}\n", belief.count));
        for (label, count) in &belief.source_counts {
            section.push_str(&format!("- {}: {}\n", label, count));
        }
    }

    write!(file, "{section}").map_err(|source| TelemetryError::Io {
        context: "writing telemetry highlights",
        source,
    })?;

    Ok(())
}

fn render_markdown(summary: &TelemetrySummary, telemetry_path: &Path) -> String {
    let mut output = String::new();
    output.push_str("# Telemetry Summary\n\n");
    output.push_str(&format!("- Source: `{}`\n", telemetry_path.display()));
    output.push('\n');

    output.push_str("## Decisions\n");
    output.push_str(&format!("- Events: {}\n", summary.decision.count));
    for (label, value) in [
        ("Avg effective lambda", summary.decision.avg_effective_lambda),
        ("Avg expected utility", summary.decision.avg_expected_utility),
        ("Avg risk ratio", summary.decision.avg_risk_ratio),
        ("Avg share kept", summary.decision.avg_own_share),
    ] {
        if let Some(value) = value {
            output.push_str(&format!("- {label}: {value:.3}\n"));
        }
    }
    if !summary.decision.perception_counts.is_empty() {
        output.push_str("- Perceptions:\n");
        for (label, count) in &summary.decision.perception_counts {
            output.push_str(&format!("  - {}: {}\n", label, count));
        }
    }
    output.push('\n');

    output.push_str("## Belief Updates\n");
    output.push_str(&format!("- Events: {}\n", summary.belief.count));
    for (label, value) in [
        ("Avg warmth", summary.belief.avg_warmth),
        ("Avg competence", summary.belief.avg_competence),
        ("Avg confidence", summary.belief.avg_confidence),
    ] {
        if let Some(value) = value {
            output.push_str(&format!("- {label}: {value:.3}\n"));
        }
    }
    if !summary.belief.source_counts.is_empty() {
        output.push_str("- Sources:\n");
        for (label, count) in &summary.belief.source_counts {
            output.push_str(&format!("  - {}: {}\n", label, count));
        }
    }
    output.push('\n');

    output.push_str("## Episodes\n");
    output.push_str(&format!(
        "- Events: {} ({} agreements)\n",
        summary.episodes.count, summary.episodes.agreements
    ));
    if let Some(value) = summary.episodes.avg_total_utility {
        output.push_str(&format!("- Avg total utility: {value:.3}\n"));
    }
    output
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        for line in lines {
            writeln!(file, "{line}").expect("write line");
        }
        file
    }

    #[test]
    fn summarises_decision_belief_and_episode_events() {
        let lines = vec![
            r#"{"target":"mtom_bot::decision","fields":{"effective_lambda":0.5,"expected_utility":0.6,"risk_ratio":0.1,"own_share":6,"perception":"selfish"}}"#,
            r#"{"target":"mtom_bot::decision","fields":{"effective_lambda":0.3,"expected_utility":0.8,"risk_ratio":0.3,"own_share":8,"perception":""}}"#,
            r#"{"target":"mtom_bot::belief","fields":{"warmth":0.4,"competence":0.6,"confidence":0.9,"source":"response"}}"#,
            r#"{"target":"mtom_bench::episode","fields":{"agreement":true,"total_utility":0.9}}"#,
            r#"{"target":"mtom_bench::episode","fields":{"agreement":false,"total_utility":0.1}}"#,
        ];
        let file = write_temp_file(&lines);
        let summary = summarise_telemetry(file.path()).expect("summarise");

        assert_eq!(summary.decision.count, 2);
        assert!((summary.decision.avg_effective_lambda.unwrap() - 0.4).abs() < 1e-12);
        assert!((summary.decision.avg_own_share.unwrap() - 7.0).abs() < 1e-12);
        assert_eq!(summary.decision.perception_counts.get("selfish"), Some(&1));
        assert_eq!(summary.decision.perception_counts.get("<unset>"), Some(&1));
        assert_eq!(summary.belief.count, 1);
        assert_eq!(summary.belief.source_counts.get("response"), Some(&1));
        assert_eq!(summary.episodes.count, 2);
        assert_eq!(summary.episodes.agreements, 1);
        assert!((summary.episodes.avg_total_utility.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn handles_missing_file() {
        let path = Path::new("tests/does/not/exist.jsonl");
        let summary = summarise_telemetry(path).expect("summarise missing file");
        assert_eq!(summary.decision.count, 0);
        assert!(summary.decision.avg_effective_lambda.is_none());
        assert!(summary.belief.source_counts.is_empty());
    }

    #[test]
    fn appends_highlights_to_summary_markdown() {
        let mut summary_file = tempfile::NamedTempFile::new().expect("summary temp file");
        write!(summary_file, "# Negotiation Summary\n").expect("seed summary content");
        let telemetry_json = tempfile::NamedTempFile::new().expect("telemetry json temp");
        let telemetry_md = tempfile::NamedTempFile::new().expect("telemetry md temp");

        let mut perceptions = BTreeMap::new();
        perceptions.insert("fair".to_string(), 7);
        let mut sources = BTreeMap::new();
        sources.insert("feedback".to_string(), 5);

        let outputs = TelemetryOutputs {
            summary: TelemetrySummary {
                decision: DecisionTelemetrySummary {
                    count: 7,
                    avg_effective_lambda: Some(0.42),
                    avg_expected_utility: Some(0.7),
                    avg_risk_ratio: Some(0.12),
                    avg_own_share: Some(5.0),
                    perception_counts: perceptions,
                },
                belief: BeliefTelemetrySummary {
                    count: 5,
                    source_counts: sources,
                    ..BeliefTelemetrySummary::default()
                },
                episodes: EpisodeTelemetrySummary::default(),
            },
            json_path: telemetry_json.path().to_path_buf(),
            markdown_path: telemetry_md.path().to_path_buf(),
        };

        append_highlights_to_markdown(summary_file.path(), &outputs).expect("append highlights");

        let contents = std::fs::read_to_string(summary_file.path()).expect("read summary file");
        assert!(contents.contains("## Telemetry Highlights"));
        assert!(contents.contains("Decision events captured: 7"));
        assert!(contents.contains("Avg effective lambda: 0.420"));
        assert!(contents.contains("fair: 7"));
        assert!(contents.contains("### Belief Updates"));
        assert!(contents.contains("feedback: 5"));
    }
}
