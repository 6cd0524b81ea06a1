//! Multiplier co-design controller CLI.
//!
//! The `codesign` command alternates the partial-product policy search and
//! the adder tree search, feeding each stage's winning design into the
//! next as a template.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use codesign_core::config::DEFAULT_BASE_DIR;
use codesign_core::{ProcessRunner, RoundController, RunConfig, RunOutcome, RunStatus};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "codesign")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Alternating multiplier/adder co-design search", long_about = None)]
struct Cli {
    /// Bit-width of the multiplier
    #[arg(long, alias = "input_bit", default_value_t = 16)]
    input_bit: u32,

    /// Weight for area in scoring
    #[arg(long, alias = "area_w", default_value_t = 0.01)]
    area_w: f64,

    /// Directory holding the job scripts and artifact directories
    #[arg(long, env = "CODESIGN_BASE_DIR", default_value = DEFAULT_BASE_DIR)]
    base_dir: PathBuf,

    /// Number of policy-search/tree-search rounds
    #[arg(long, default_value_t = 3)]
    rounds: u32,

    /// Iteration budget for the policy-optimization stage
    #[arg(long, default_value_t = 900)]
    ppo_iters: u32,

    /// Iteration budget for the tree-search stage
    #[arg(long, default_value_t = 100)]
    mcts_iters: u32,

    /// Program used to launch the job scripts
    #[arg(long, default_value = "python3")]
    interpreter: String,

    /// Do not echo job output while it runs
    #[arg(short, long)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines and a JSON run summary
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            base_dir: self.base_dir.clone(),
            input_bit: self.input_bit,
            area_weight: self.area_w,
            ppo_iterations: self.ppo_iters,
            mcts_iterations: self.mcts_iters,
            rounds: self.rounds,
            interpreter: self.interpreter.clone(),
            ..RunConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    codesign_core::init_tracing(cli.json, level);

    let runner = if cli.quiet {
        ProcessRunner::quiet()
    } else {
        ProcessRunner::new()
    };
    let controller = RoundController::new(cli.run_config(), Arc::new(runner))
        .context("Invalid run configuration")?;

    info!(
        base_dir = %controller.layout().base().display(),
        journal = %controller.journal_path().display(),
        "Starting co-design run"
    );

    let outcome = controller
        .run()
        .await
        .context("Co-design run could not be carried out")?;

    report(&outcome, cli.rounds, cli.json)?;

    match &outcome.status {
        RunStatus::Done => Ok(()),
        RunStatus::Aborted { round, error, .. } => {
            anyhow::bail!("Run aborted in round {}: {}", round, error)
        }
    }
}

fn report(outcome: &RunOutcome, rounds: u32, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!("Run {}", outcome.stamp);
    for round in &outcome.rounds {
        println!(
            "  round {}: PPO {} ({:.4}) -> {}, MCTS {} ({:.4}) -> {}",
            round.round,
            round.policy_search.candidate_id(),
            round.policy_search.score,
            round.mult_template.file_name,
            round.tree_search.candidate_id(),
            round.tree_search.score,
            round.adder_template.file_name,
        );
    }
    println!(
        "{} of {} rounds completed in {:.2}s, journal at {}",
        outcome.rounds_completed(),
        rounds,
        outcome.elapsed_secs,
        outcome.journal.display()
    );
    Ok(())
}
