//! Campaign driver: every scenario in the registry, resumably.
//!
//! Each scenario races in a fresh, fully isolated OS process (this crate's
//! own binary running `race`), so one scenario's crash can never corrupt its
//! siblings or the driver. The ledger is flushed after every scenario; a
//! hard crash loses at most the in-flight one.

pub mod ledger;
pub mod reports;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::process::Command;
use tracing::{info, warn};

use crate::catalog;

pub use ledger::{
    append_event, CampaignConfigEcho, CampaignSummary, ProgressLedger, RunRecord,
};

/// Campaign inputs.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    pub agents: Vec<String>,
    pub variant: String,
    pub seed: u64,
    pub max_turns: u32,
    pub results_dir: PathBuf,
    /// Bound on the number of scenarios attempted this run.
    pub limit: Option<usize>,
    /// Keep going past a failed scenario instead of failing fast.
    pub continue_on_failure: bool,
    /// Record synthetic ok rows without spawning anything.
    pub dry_run: bool,
    pub skip_reports: bool,
    /// Race binary override; defaults to this executable.
    pub race_program: Option<PathBuf>,
}

impl CampaignConfig {
    pub fn new(agents: Vec<String>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            agents,
            variant: "default".to_string(),
            seed: 0,
            max_turns: 40,
            results_dir: results_dir.into(),
            limit: None,
            continue_on_failure: false,
            dry_run: false,
            skip_reports: false,
            race_program: None,
        }
    }

    fn echo(&self) -> CampaignConfigEcho {
        CampaignConfigEcho {
            agents: self.agents.clone(),
            variant: self.variant.clone(),
            seed: self.seed,
            max_turns: self.max_turns,
            results_dir: self.results_dir.display().to_string(),
            dry_run: self.dry_run,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.results_dir.join("progress.json")
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.results_dir.join("events.jsonl")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.results_dir.join("summary.json")
    }

    pub fn scenario_results_file(&self, scenario: &str) -> PathBuf {
        self.results_dir.join(format!("{}.json", scenario))
    }
}

/// Run the campaign. Returns the final summary; any scenario failure shows
/// up there, the call itself fails only on configuration or persistence
/// errors.
pub async fn run_campaign(config: &CampaignConfig) -> Result<CampaignSummary> {
    std::fs::create_dir_all(&config.results_dir)
        .with_context(|| format!("creating {}", config.results_dir.display()))?;

    let ledger_path = config.ledger_path();
    let mut ledger = ProgressLedger::load_or_new(&ledger_path, config.echo())?;
    let resumed = ledger.runs.len();
    if resumed > 0 {
        info!(rows = resumed, "Resuming campaign from existing ledger");
    }

    let ids = catalog::sorted_ids();
    let mut attempted = 0usize;

    for id in ids {
        if let Some(limit) = config.limit {
            if attempted >= limit {
                info!(limit = limit, "Scenario limit reached");
                break;
            }
        }
        if ledger.has_success(id) {
            info!(scenario = id, "Already successful, skipping");
            continue;
        }
        attempted += 1;

        let record = if config.dry_run {
            RunRecord {
                scenario: id.to_string(),
                return_code: 0,
                elapsed_secs: 0.0,
                results_file: config.scenario_results_file(id).display().to_string(),
                timestamp: Utc::now(),
                command: "dry-run".to_string(),
            }
        } else {
            run_one_scenario(config, id).await?
        };

        let failed = !record.is_ok();
        if failed {
            warn!(scenario = id, return_code = record.return_code, "Scenario failed");
        } else {
            info!(scenario = id, elapsed = record.elapsed_secs, "Scenario ok");
        }

        ledger.append(record.clone());
        persist(&ledger, config)?;
        if let Err(e) = append_event(&config.event_log_path(), &record) {
            warn!("Event log append failed: {}", e);
        }

        if failed && !config.continue_on_failure {
            warn!("Failing fast; pass --continue-on-failure to keep going");
            break;
        }
    }

    // The summary lands even when the loop never ran.
    persist(&ledger, config)?;
    let summary = ledger.summary();
    info!(
        total = summary.total,
        ok = summary.ok,
        failed = summary.failed,
        "Campaign finished"
    );

    if !config.skip_reports {
        // Postprocessing must never corrupt the artifacts already written.
        match reports::write_reports(&config.results_dir) {
            Ok(written) => info!(reports = written.len(), "Postprocessing reports written"),
            Err(e) => warn!("Postprocessing failed (ledger and summary intact): {}", e),
        }
    }

    Ok(summary)
}

/// Spawn one fully isolated race process and record what happened.
async fn run_one_scenario(config: &CampaignConfig, scenario: &str) -> Result<RunRecord> {
    let program = match &config.race_program {
        Some(p) => p.clone(),
        None => std::env::current_exe().context("resolving race binary")?,
    };
    let results_file = config.scenario_results_file(scenario);

    let args = vec![
        "race".to_string(),
        "--agents".to_string(),
        config.agents.join(","),
        "--scenario".to_string(),
        scenario.to_string(),
        "--seed".to_string(),
        config.seed.to_string(),
        "--variant".to_string(),
        config.variant.clone(),
        "--max-turns".to_string(),
        config.max_turns.to_string(),
        "--results-file".to_string(),
        results_file.display().to_string(),
    ];
    let command = format!("{} {}", program.display(), args.join(" "));

    info!(scenario = scenario, "Spawning race process");
    let start = Instant::now();
    let status = Command::new(&program).args(&args).status().await;
    let elapsed_secs = start.elapsed().as_secs_f64();

    let return_code = match status {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            warn!(scenario = scenario, "Failed to spawn race process: {}", e);
            -1
        }
    };

    Ok(RunRecord {
        scenario: scenario.to_string(),
        return_code,
        elapsed_secs,
        results_file: results_file.display().to_string(),
        timestamp: Utc::now(),
        command,
    })
}

fn persist(ledger: &ProgressLedger, config: &CampaignConfig) -> Result<()> {
    ledger.save(&config.ledger_path())?;
    write_summary(&config.summary_path(), ledger)?;
    Ok(())
}

fn write_summary(path: &Path, ledger: &ProgressLedger) -> Result<()> {
    let summary = ledger.summary();
    std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dry_config(dir: &Path, limit: usize) -> CampaignConfig {
        let mut config = CampaignConfig::new(vec!["codex".to_string()], dir);
        config.limit = Some(limit);
        config.dry_run = true;
        config.skip_reports = true;
        config
    }

    #[tokio::test]
    async fn test_dry_run_with_limit_records_exactly_limit_ok_rows() {
        let dir = TempDir::new().unwrap();
        let config = dry_config(dir.path(), 2);

        let summary = run_campaign(&config).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.ok, 2);
        assert_eq!(summary.failed, 0);

        let ledger =
            ProgressLedger::load_or_new(&config.ledger_path(), CampaignConfigEcho::default())
                .unwrap();
        assert_eq!(ledger.runs.len(), 2);
        for run in &ledger.runs {
            assert_eq!(run.return_code, 0);
            assert_eq!(run.command, "dry-run");
        }

        // Deterministic sorted order: the first two registry ids.
        let ids = catalog::sorted_ids();
        assert_eq!(ledger.runs[0].scenario, ids[0]);
        assert_eq!(ledger.runs[1].scenario, ids[1]);
    }

    #[tokio::test]
    async fn test_resume_never_reattempts_successful_scenarios() {
        let dir = TempDir::new().unwrap();
        let config = dry_config(dir.path(), 2);
        let ids = catalog::sorted_ids();

        // Seed the ledger with a success for the first sorted scenario.
        let mut ledger = ProgressLedger::new(config.echo());
        ledger.append(RunRecord {
            scenario: ids[0].to_string(),
            return_code: 0,
            elapsed_secs: 1.0,
            results_file: String::new(),
            timestamp: Utc::now(),
            command: "dry-run".to_string(),
        });
        std::fs::create_dir_all(dir.path()).unwrap();
        ledger.save(&config.ledger_path()).unwrap();

        run_campaign(&config).await.unwrap();

        let ledger =
            ProgressLedger::load_or_new(&config.ledger_path(), CampaignConfigEcho::default())
                .unwrap();
        // One resumed row plus two fresh attempts, none repeating ids[0].
        assert_eq!(ledger.runs.len(), 3);
        let fresh: Vec<&str> = ledger.runs[1..]
            .iter()
            .map(|r| r.scenario.as_str())
            .collect();
        assert_eq!(fresh, vec![ids[1], ids[2]]);
    }

    #[tokio::test]
    async fn test_summary_written_even_for_empty_campaign() {
        let dir = TempDir::new().unwrap();
        let config = dry_config(dir.path(), 0);
        let summary = run_campaign(&config).await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(config.summary_path().exists());
    }

    #[tokio::test]
    async fn test_event_log_mirrors_ledger_rows() {
        let dir = TempDir::new().unwrap();
        let config = dry_config(dir.path(), 3);
        run_campaign(&config).await.unwrap();

        let events = std::fs::read_to_string(config.event_log_path()).unwrap();
        assert_eq!(events.lines().count(), 3);
    }
}
