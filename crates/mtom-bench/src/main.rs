use std::path::PathBuf;

use clap::Parser;

use mtom_bench::config::{BenchmarkConfig, ResolvedOutputs};
use mtom_bench::episode::EpisodeRunner;
use mtom_bench::logging::init_logging;

/// Episode harness for negotiation agents.
#[derive(Debug, Parser)]
#[command(
    name = "mtom-bench",
    author,
    version,
    about = "Deterministic negotiation episode harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of episodes to play.
    #[arg(long, value_name = "COUNT")]
    episodes: Option<usize>,

    /// Override the master RNG seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Exit after validating the configuration (no episodes are run).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchmarkConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(episodes) = cli.episodes {
        config.episodes.count = episodes;
    }

    if let Some(seed) = cli.seed {
        config.episodes.seed = Some(seed);
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let episodes = config.episodes.count;

    println!(
        "Loaded configuration '{run_id}': agent '{}' ({:?}) vs {} opponent, {episodes} episode{}",
        config.agent.name,
        config.agent.kind,
        config.opponent.policy.as_str(),
        if episodes == 1 { "" } else { "s" }
    );

    let runner = EpisodeRunner::new(config.clone(), outputs.clone())?;

    if cli.validate_only {
        println!("Validation-only mode: episode execution skipped.");
        return Ok(());
    }

    let logging_guard = init_logging(&config.logging, &outputs)?;
    let mut summary = runner.run()?;
    drop(logging_guard);
    runner.attach_telemetry(&mut summary)?;

    println!(
        "Run complete for '{run_id}': {} episodes → {} rows at {} (agreement rate {:.1}%)",
        summary.episodes_played,
        summary.rows_written,
        summary.jsonl_path.display(),
        summary.agreement_rate * 100.0
    );
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(dir) = summary.traces_dir.as_ref() {
        println!("Episode traces: {}", dir.display());
    }
    if let Some(telemetry_path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", telemetry_path.display());
    }
    if let Some(outputs) = summary.telemetry_outputs.as_ref() {
        println!("Telemetry summary (JSON): {}", outputs.json_path.display());
        println!(
            "Telemetry summary (Markdown): {}",
            outputs.markdown_path.display()
        );
        if let Some(lambda) = outputs.summary.decision.avg_effective_lambda {
            println!(
                "  Decisions: {} events, avg effective lambda {:.3}",
                outputs.summary.decision.count, lambda
            );
        } else {
            println!(
                "  Decisions: {} events captured",
                outputs.summary.decision.count
            );
        }
    }

    Ok(())
}
