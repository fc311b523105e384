//! Seed sweep driver: one scenario, many seeds.
//!
//! Repeats the race across a seed list for variance and regression analysis,
//! one results file per seed, then hands the successful files to an external
//! summarizer and, when a baseline is supplied, to a regression gate whose
//! return code becomes the sweep's own.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

use crate::campaign::RunRecord;
use crate::catalog;

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Sweep inputs.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub agents: Vec<String>,
    pub scenario: String,
    pub seeds: Vec<u64>,
    pub variant: String,
    /// Overrides the scenario's registry-declared default duration.
    pub duration: Option<u32>,
    pub max_turns: u32,
    pub results_dir: PathBuf,
    pub baseline: Option<PathBuf>,
    pub summarizer: String,
    pub gate: String,
    pub continue_on_failure: bool,
    /// Race binary override; defaults to this executable.
    pub race_program: Option<PathBuf>,
}

impl SweepConfig {
    pub fn new(
        agents: Vec<String>,
        scenario: impl Into<String>,
        seeds: Vec<u64>,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            agents,
            scenario: scenario.into(),
            seeds,
            variant: "default".to_string(),
            duration: None,
            max_turns: 40,
            results_dir: results_dir.into(),
            baseline: None,
            summarizer: "arena-summarize".to_string(),
            gate: "arena-gate".to_string(),
            continue_on_failure: false,
            race_program: None,
        }
    }

    pub fn seed_results_file(&self, seed: u64) -> PathBuf {
        self.results_dir
            .join(format!("{}-seed{}.json", self.scenario, seed))
    }

    pub fn summary_file(&self) -> PathBuf {
        self.results_dir.join("sweep_summary.json")
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.results_dir.join("manifest.json")
    }
}

/// Write-once record of the whole sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSweepManifest {
    pub schema_version: u32,
    pub scenario: String,
    pub seeds: Vec<u64>,
    pub runs: Vec<RunRecord>,
    pub summarizer_code: Option<i32>,
    pub gate_code: Option<i32>,
    pub created_at: DateTime<Utc>,
}

pub struct SweepOutcome {
    pub manifest: SeedSweepManifest,
    /// 0 on success; the gate's own return code when it rejects; 1 when any
    /// seed or the summarizer failed.
    pub exit_code: i32,
}

pub async fn run_sweep(config: &SweepConfig) -> Result<SweepOutcome> {
    // Unknown scenarios fail before any seed is attempted.
    catalog::resolve(&config.scenario)?;
    std::fs::create_dir_all(&config.results_dir)
        .with_context(|| format!("creating {}", config.results_dir.display()))?;

    let mut runs: Vec<RunRecord> = Vec::with_capacity(config.seeds.len());
    for &seed in &config.seeds {
        let record = run_one_seed(config, seed).await?;
        let failed = !record.is_ok();
        if failed {
            warn!(seed = seed, return_code = record.return_code, "Seed failed");
        } else {
            info!(seed = seed, elapsed = record.elapsed_secs, "Seed ok");
        }
        runs.push(record);
        if failed && !config.continue_on_failure {
            warn!("Failing fast; pass --continue-on-failure to sweep remaining seeds");
            break;
        }
    }

    let successful: Vec<PathBuf> = runs
        .iter()
        .filter(|r| r.is_ok())
        .map(|r| PathBuf::from(&r.results_file))
        .collect();

    let summarizer_code = if successful.is_empty() {
        info!("No successful seeds, skipping summarizer");
        None
    } else {
        Some(run_summarizer(config, &successful).await)
    };

    let gate_code = match (&config.baseline, summarizer_code) {
        (Some(baseline), Some(0)) => Some(run_gate(config, baseline).await),
        (Some(_), _) => {
            warn!("Summarizer did not succeed, skipping regression gate");
            None
        }
        (None, _) => None,
    };

    let manifest = SeedSweepManifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        scenario: config.scenario.clone(),
        seeds: config.seeds.clone(),
        runs,
        summarizer_code,
        gate_code,
        created_at: Utc::now(),
    };
    std::fs::write(
        config.manifest_file(),
        serde_json::to_string_pretty(&manifest)?,
    )?;
    info!(manifest = %config.manifest_file().display(), "Sweep manifest written");

    let any_seed_failed = manifest.runs.iter().any(|r| !r.is_ok())
        || manifest.runs.len() < manifest.seeds.len();
    let exit_code = match gate_code {
        Some(code) if code != 0 => code,
        _ => {
            if any_seed_failed || summarizer_code.map(|c| c != 0).unwrap_or(false) {
                1
            } else {
                0
            }
        }
    };

    Ok(SweepOutcome {
        manifest,
        exit_code,
    })
}

async fn run_one_seed(config: &SweepConfig, seed: u64) -> Result<RunRecord> {
    let program = match &config.race_program {
        Some(p) => p.clone(),
        None => std::env::current_exe().context("resolving race binary")?,
    };
    let results_file = config.seed_results_file(seed);

    let mut args = vec![
        "race".to_string(),
        "--agents".to_string(),
        config.agents.join(","),
        "--scenario".to_string(),
        config.scenario.clone(),
        "--seed".to_string(),
        seed.to_string(),
        "--variant".to_string(),
        config.variant.clone(),
        "--max-turns".to_string(),
        config.max_turns.to_string(),
        "--results-file".to_string(),
        results_file.display().to_string(),
    ];
    if let Some(duration) = config.duration {
        args.push("--duration".to_string());
        args.push(duration.to_string());
    }
    let command = format!("{} {}", program.display(), args.join(" "));

    info!(seed = seed, "Spawning race process");
    let start = Instant::now();
    let status = Command::new(&program).args(&args).status().await;
    let elapsed_secs = start.elapsed().as_secs_f64();

    let return_code = match status {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            warn!(seed = seed, "Failed to spawn race process: {}", e);
            -1
        }
    };

    Ok(RunRecord {
        scenario: config.scenario.clone(),
        return_code,
        elapsed_secs,
        results_file: results_file.display().to_string(),
        timestamp: Utc::now(),
        command,
    })
}

/// Summarize the successful result files only.
async fn run_summarizer(config: &SweepConfig, files: &[PathBuf]) -> i32 {
    info!(
        summarizer = %config.summarizer,
        files = files.len(),
        "Running summarizer over successful seeds"
    );
    let status = Command::new(&config.summarizer)
        .arg("--output")
        .arg(config.summary_file())
        .args(files)
        .status()
        .await;
    match status {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            warn!("Summarizer failed to start: {}", e);
            -1
        }
    }
}

async fn run_gate(config: &SweepConfig, baseline: &std::path::Path) -> i32 {
    info!(gate = %config.gate, baseline = %baseline.display(), "Running regression gate");
    let status = Command::new(&config.gate)
        .arg("--baseline")
        .arg(baseline)
        .arg("--summary")
        .arg(config.summary_file())
        .status()
        .await;
    match status {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            warn!("Gate failed to start: {}", e);
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_scenario_fails_before_any_seed() {
        let config = SweepConfig::new(
            vec!["codex".to_string()],
            "no-such-scenario",
            vec![1, 2],
            std::env::temp_dir().join("arena-sweep-unknown"),
        );
        let err = run_sweep(&config).await.unwrap_err();
        assert!(err.to_string().contains("no-such-scenario"));
    }

    #[test]
    fn test_manifest_roundtrip() {
        let manifest = SeedSweepManifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            scenario: "stag-hunt".to_string(),
            seeds: vec![1, 2, 3],
            runs: Vec::new(),
            summarizer_code: Some(0),
            gate_code: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: SeedSweepManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.schema_version, MANIFEST_SCHEMA_VERSION);
        assert_eq!(parsed.seeds, vec![1, 2, 3]);
        assert_eq!(parsed.gate_code, None);
    }

    #[test]
    fn test_seed_results_file_naming() {
        let config = SweepConfig::new(
            vec!["codex".to_string()],
            "stag-hunt",
            vec![7],
            "/tmp/sweep",
        );
        assert_eq!(
            config.seed_results_file(7),
            PathBuf::from("/tmp/sweep/stag-hunt-seed7.json")
        );
    }
}
