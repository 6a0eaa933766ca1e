//! CLI entrypoint for the rlaudit simulation harness.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rlaudit_core::numeric::sample_size;
use rlaudit_core::{ErrorRates, OptimalLambda};
use rlaudit_harness::structured_log::{LogEmitter, validate_log_file};
use rlaudit_harness::{ArtifactIndex, SimulationConfig, emit_trial_logs, run_repeated};

/// Tooling for sequential risk-limiting audit tests.
#[derive(Debug, Parser)]
#[command(name = "rlaudit-harness")]
#[command(about = "Simulation and diagnostics harness for rlaudit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Solve for the growth-optimal bet given discrepancy rates.
    Kelly {
        /// bassort value of a card with no discrepancy.
        #[arg(long)]
        noerror: f64,
        #[arg(long, default_value_t = 0.0)]
        p2o: f64,
        #[arg(long, default_value_t = 0.0)]
        p1o: f64,
        #[arg(long, default_value_t = 0.0)]
        p1u: f64,
        #[arg(long, default_value_t = 0.0)]
        p2u: f64,
        /// Population mean under the null.
        #[arg(long, default_value_t = 0.5)]
        mui: f64,
    },
    /// Expected draws to reject when every draw multiplies T by `payoff`.
    SampleSize {
        #[arg(long)]
        risk: f64,
        #[arg(long)]
        payoff: f64,
    },
    /// Run repeated simulated audits from a JSON config.
    Simulate {
        /// Simulation config JSON path.
        #[arg(long)]
        config: PathBuf,
        /// Override the trial count.
        #[arg(long)]
        trials: Option<usize>,
        /// Override the root seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Override the worker thread count.
        #[arg(long)]
        threads: Option<usize>,
        /// Report JSON path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Structured JSONL log path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Artifact index JSON path; indexes the report and the log.
        #[arg(long)]
        artifact_index: Option<PathBuf>,
        /// Run identifier used in trace ids.
        #[arg(long, default_value = "sim-run")]
        run_id: String,
    },
    /// Validate a structured JSONL log.
    ValidateLog {
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Kelly {
            noerror,
            p2o,
            p1o,
            p1u,
            p2u,
            mui,
        } => {
            let rates = ErrorRates::new(p2o, p1o, p1u, p2u)?;
            let solver = OptimalLambda::new(noerror, rates, mui)?;
            let lam = solver.solve()?;
            let report = serde_json::json!({
                "lambda": lam,
                "stake_fraction": lam * mui,
                "expected_log_growth": solver.expected_value_log_t(lam),
                "p0": solver.p0(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::SampleSize { risk, payoff } => {
            if !(risk > 0.0 && risk < 1.0) || !(payoff > 1.0) {
                return Err("need 0 < risk < 1 and payoff > 1".into());
            }
            println!("{:.3}", sample_size(risk, payoff));
        }
        Command::Simulate {
            config,
            trials,
            seed,
            threads,
            output,
            log,
            artifact_index,
            run_id,
        } => {
            let text = std::fs::read_to_string(&config)?;
            let mut sim: SimulationConfig = serde_json::from_str(&text)?;
            if let Some(trials) = trials {
                sim.trials = trials;
            }
            if let Some(seed) = seed {
                sim.seed = seed;
            }
            if let Some(threads) = threads {
                sim.threads = threads;
            }

            eprintln!(
                "Simulating {} trials of {} (seed {})",
                sim.trials,
                sim.strategy.name(),
                sim.seed
            );
            let started = std::time::Instant::now();
            let result = run_repeated(&sim)?;
            eprintln!(
                "Done in {} ms: fail_fraction={:.4} mean_samples={:.1}",
                started.elapsed().as_millis(),
                result.fail_fraction,
                result.mean_sample_count
            );

            let report = serde_json::to_string_pretty(&result)?;
            match &output {
                Some(path) => std::fs::write(path, &report)?,
                None => println!("{report}"),
            }

            if let Some(path) = &log {
                let mut emitter = LogEmitter::to_file(path, "simulate", &run_id)?;
                emit_trial_logs(&sim, &result, &mut emitter)?;
            }

            if let Some(index_path) = &artifact_index {
                let mut index = ArtifactIndex::new(&run_id, "simulate");
                index.add_file(&config, "config")?;
                for (path, kind) in [(&output, "report"), (&log, "log")] {
                    if let Some(path) = path {
                        index.add_file(path, kind)?;
                    }
                }
                write_json(index_path, &index.to_json()?)?;
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for error in &errors {
                eprintln!("{error}");
            }
            if !errors.is_empty() {
                return Err(format!("{} invalid field(s) in {lines} line(s)", errors.len()).into());
            }
            println!("{}: {lines} line(s) valid", log.display());
        }
    }

    Ok(())
}

fn write_json(path: &Path, json: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
}
