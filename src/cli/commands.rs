//! CLI command definitions for agent-arena.
//!
//! Three drivers share one binary: `race` runs a single race, `campaign`
//! sweeps the whole registry resumably, `sweep` repeats one scenario across
//! seeds. `scenarios` prints the registry.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use crate::campaign::{self, CampaignConfig};
use crate::catalog;
use crate::race::{self, ArenaConfig, RaceRequest};
use crate::sweep::{self, SweepConfig};

/// Default results file for ad hoc races.
const DEFAULT_RESULTS_FILE: &str = "races.json";

/// Default results directory for campaigns and sweeps.
const DEFAULT_RESULTS_DIR: &str = "./arena-results";

/// Race external AI agents against scripted evaluation scenarios.
#[derive(Parser)]
#[command(name = "agent-arena")]
#[command(about = "Benchmark arena for external AI agents")]
#[command(version)]
#[command(
    long_about = "agent-arena races external agent programs against a catalog of scripted\nevaluation scenarios, normalizes their scores, and ranks them.\n\nExample usage:\n  agent-arena race --agents codex,claude --scenario iterated-prisoners-dilemma\n  agent-arena campaign --agents codex --results-dir ./arena-results\n  agent-arena sweep --agents codex --scenario stag-hunt --seeds 1,2,3"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run one race: N agents against one scenario/seed/variant.
    Race(RaceArgs),

    /// Run races across the full scenario registry with a resumable ledger.
    Campaign(CampaignArgs),

    /// Run one scenario across a seed list, then summarize and gate.
    Sweep(SweepArgs),

    /// List the scenario registry.
    Scenarios(ScenariosArgs),
}

/// Arguments for `agent-arena race`.
#[derive(Parser, Debug)]
pub struct RaceArgs {
    /// Comma-separated agent names (from the known-agent set).
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub agents: Vec<String>,

    /// Scenario id from the registry.
    #[arg(short, long)]
    pub scenario: String,

    /// Simulation seed.
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Scenario variant.
    #[arg(long, default_value = "default")]
    pub variant: String,

    /// Override the scenario's default duration (0 means default).
    #[arg(short, long)]
    pub duration: Option<u32>,

    /// Turn budget handed to each agent.
    #[arg(long, default_value = "40")]
    pub max_turns: u32,

    /// Race record file (JSON array, appended).
    #[arg(short, long, default_value = DEFAULT_RESULTS_FILE)]
    pub results_file: PathBuf,

    /// Model override passed to every agent via ARENA_MODEL.
    #[arg(short, long)]
    pub model: Option<String>,

    /// First server port for server-backed scenarios.
    #[arg(long)]
    pub port_base: Option<u16>,

    /// Print the race record as JSON instead of the leaderboard.
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `agent-arena campaign`.
#[derive(Parser, Debug)]
pub struct CampaignArgs {
    /// Comma-separated agent names raced in every scenario.
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub agents: Vec<String>,

    /// Scenario variant for every race.
    #[arg(long, default_value = "default")]
    pub variant: String,

    /// Simulation seed for every race.
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Turn budget handed to each agent.
    #[arg(long, default_value = "40")]
    pub max_turns: u32,

    /// Directory for the ledger, per-scenario results, and reports.
    #[arg(short, long, default_value = DEFAULT_RESULTS_DIR)]
    pub results_dir: PathBuf,

    /// Attempt at most this many scenarios this run.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Keep going past a failed scenario instead of failing fast.
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Record synthetic ok rows without spawning any race process.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip postprocessing reports.
    #[arg(long)]
    pub skip_reports: bool,

    /// Output the final summary as JSON.
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `agent-arena sweep`.
#[derive(Parser, Debug)]
pub struct SweepArgs {
    /// Comma-separated agent names.
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub agents: Vec<String>,

    /// Scenario id from the registry.
    #[arg(short, long)]
    pub scenario: String,

    /// Comma-separated seed list.
    #[arg(long, value_delimiter = ',', required = true)]
    pub seeds: Vec<u64>,

    /// Scenario variant.
    #[arg(long, default_value = "default")]
    pub variant: String,

    /// Override the scenario's registry-declared default duration.
    #[arg(short, long)]
    pub duration: Option<u32>,

    /// Turn budget handed to each agent.
    #[arg(long, default_value = "40")]
    pub max_turns: u32,

    /// Directory for per-seed results, the sweep summary, and the manifest.
    #[arg(short, long, default_value = DEFAULT_RESULTS_DIR)]
    pub results_dir: PathBuf,

    /// Baseline summary for the regression gate.
    #[arg(short, long)]
    pub baseline: Option<PathBuf>,

    /// Summarizer program invoked over successful result files.
    #[arg(long, default_value = "arena-summarize")]
    pub summarizer: String,

    /// Regression gate program (runs only with --baseline).
    #[arg(long, default_value = "arena-gate")]
    pub gate: String,

    /// Sweep remaining seeds past a failed one.
    #[arg(long)]
    pub continue_on_failure: bool,
}

/// Arguments for `agent-arena scenarios`.
#[derive(Parser, Debug)]
pub struct ScenariosArgs {
    /// Output the registry as JSON.
    #[arg(short, long)]
    pub json: bool,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Dispatch the parsed command. Returns the process exit code.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Race(args) => run_race_cmd(args).await,
        Commands::Campaign(args) => run_campaign_cmd(args).await,
        Commands::Sweep(args) => run_sweep_cmd(args).await,
        Commands::Scenarios(args) => run_scenarios_cmd(args),
    }
}

async fn run_race_cmd(args: RaceArgs) -> anyhow::Result<i32> {
    let mut arena = ArenaConfig::default();
    if let Some(port_base) = args.port_base {
        arena = arena.with_port_base(port_base);
    }

    let request = RaceRequest::new(args.scenario, args.agents)
        .with_seed(args.seed)
        .with_variant(args.variant)
        .with_duration(args.duration)
        .with_max_turns(args.max_turns)
        .with_results_file(args.results_file)
        .with_model(args.model);

    let outcome = race::run_race(&arena, &request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.run)?);
    } else {
        println!("{}", outcome.leaderboard);
    }
    Ok(0)
}

async fn run_campaign_cmd(args: CampaignArgs) -> anyhow::Result<i32> {
    let mut config = CampaignConfig::new(args.agents, args.results_dir);
    config.variant = args.variant;
    config.seed = args.seed;
    config.max_turns = args.max_turns;
    config.limit = args.limit;
    config.continue_on_failure = args.continue_on_failure;
    config.dry_run = args.dry_run;
    config.skip_reports = args.skip_reports;

    let summary = campaign::run_campaign(&config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Campaign: {} attempted, {} ok, {} failed (avg {:.1}s)",
            summary.total, summary.ok, summary.failed, summary.avg_elapsed_secs
        );
        if !summary.failed_ids.is_empty() {
            println!("Failed scenarios: {}", summary.failed_ids.join(", "));
        }
    }

    Ok(if summary.failed > 0 { 1 } else { 0 })
}

async fn run_sweep_cmd(args: SweepArgs) -> anyhow::Result<i32> {
    let mut config = SweepConfig::new(args.agents, args.scenario, args.seeds, args.results_dir);
    config.variant = args.variant;
    config.duration = args.duration.filter(|d| *d > 0);
    config.max_turns = args.max_turns;
    config.baseline = args.baseline;
    config.summarizer = args.summarizer;
    config.gate = args.gate;
    config.continue_on_failure = args.continue_on_failure;

    let outcome = sweep::run_sweep(&config).await?;

    let ok_seeds = outcome.manifest.runs.iter().filter(|r| r.is_ok()).count();
    info!(
        seeds = outcome.manifest.seeds.len(),
        ok = ok_seeds,
        summarizer = ?outcome.manifest.summarizer_code,
        gate = ?outcome.manifest.gate_code,
        "Sweep finished"
    );
    println!(
        "Sweep '{}': {}/{} seeds ok, manifest at {}",
        outcome.manifest.scenario,
        ok_seeds,
        outcome.manifest.seeds.len(),
        config.manifest_file().display()
    );

    Ok(outcome.exit_code)
}

fn run_scenarios_cmd(args: ScenariosArgs) -> anyhow::Result<i32> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(catalog::SCENARIOS)?);
        return Ok(0);
    }
    println!(
        "{:<28} {:<28} {:>8} {:<12} {:<15} {}",
        "ID", "NAME", "DURATION", "UNIT", "FAMILY", "MODE"
    );
    for id in catalog::sorted_ids() {
        let s = catalog::get(id).expect("sorted id is in registry");
        println!(
            "{:<28} {:<28} {:>8} {:<12} {:<15} {:?}",
            s.id, s.name, s.default_duration, s.duration_unit, s.family.to_string(), s.mode
        );
    }
    Ok(0)
}
