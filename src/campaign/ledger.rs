//! Campaign progress ledger, summary, and event log.
//!
//! The ledger is the campaign's resume point: one [`RunRecord`] per attempted
//! scenario, appended and flushed to disk before the next scenario starts, so
//! a hard crash loses at most the in-flight scenario. A scenario id may
//! appear multiple times across retries; it counts as done once any entry
//! for it carries return code 0.
//!
//! The summary is derived: recomputed from the ledger on every save, never
//! incrementally mutated. The event log mirrors every appended record as one
//! JSON line for streaming observability.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

pub const LEDGER_SCHEMA_VERSION: u32 = 1;

/// One attempted scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub scenario: String,
    pub return_code: i32,
    pub elapsed_secs: f64,
    pub results_file: String,
    pub timestamp: DateTime<Utc>,
    /// The exact command line of the spawned race process, for replay.
    pub command: String,
}

impl RunRecord {
    pub fn is_ok(&self) -> bool {
        self.return_code == 0
    }
}

/// The campaign configuration echoed into the ledger so a resumed run can be
/// checked against what it resumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignConfigEcho {
    pub agents: Vec<String>,
    pub variant: String,
    pub seed: u64,
    pub max_turns: u32,
    pub results_dir: String,
    pub dry_run: bool,
}

/// Derived campaign totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    /// Scenario ids that failed and were never retried to success.
    pub failed_ids: Vec<String>,
    pub avg_elapsed_secs: f64,
}

/// The append-only progress ledger. Single writer: the campaign driver
/// process owns its file for the campaign's lifetime.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressLedger {
    pub schema_version: u32,
    pub config: CampaignConfigEcho,
    pub runs: Vec<RunRecord>,
}

impl ProgressLedger {
    pub fn new(config: CampaignConfigEcho) -> Self {
        Self {
            schema_version: LEDGER_SCHEMA_VERSION,
            config,
            runs: Vec::new(),
        }
    }

    /// Load an existing ledger, or start fresh when the file is absent.
    pub fn load_or_new(path: &Path, config: CampaignConfigEcho) -> Result<Self, LedgerError> {
        if !path.exists() {
            return Ok(Self::new(config));
        }
        let contents = fs::read_to_string(path)?;
        let ledger: ProgressLedger = serde_json::from_str(&contents)?;
        if ledger.schema_version > LEDGER_SCHEMA_VERSION {
            return Err(LedgerError::SchemaVersion {
                found: ledger.schema_version,
                supported: LEDGER_SCHEMA_VERSION,
            });
        }
        Ok(ledger)
    }

    /// Any successful entry makes a scenario resumable-done.
    pub fn has_success(&self, scenario: &str) -> bool {
        self.runs
            .iter()
            .any(|r| r.scenario == scenario && r.is_ok())
    }

    pub fn append(&mut self, record: RunRecord) {
        self.runs.push(record);
    }

    /// Write the whole ledger back. Called after every append.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Recompute the summary from scratch.
    pub fn summary(&self) -> CampaignSummary {
        let total = self.runs.len();
        let ok = self.runs.iter().filter(|r| r.is_ok()).count();
        let failed = total - ok;

        let mut failed_ids: Vec<String> = self
            .runs
            .iter()
            .filter(|r| !r.is_ok())
            .map(|r| r.scenario.clone())
            .filter(|id| !self.has_success(id))
            .collect();
        failed_ids.sort();
        failed_ids.dedup();

        let avg_elapsed_secs = if total > 0 {
            self.runs.iter().map(|r| r.elapsed_secs).sum::<f64>() / total as f64
        } else {
            0.0
        };

        CampaignSummary {
            total,
            ok,
            failed,
            failed_ids,
            avg_elapsed_secs,
        }
    }
}

/// Append one record to the line-oriented event log.
pub fn append_event(path: &Path, record: &RunRecord) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(scenario: &str, return_code: i32) -> RunRecord {
        RunRecord {
            scenario: scenario.to_string(),
            return_code,
            elapsed_secs: 2.0,
            results_file: format!("{}.json", scenario),
            timestamp: Utc::now(),
            command: "agent-arena race".to_string(),
        }
    }

    #[test]
    fn test_any_success_counts() {
        let mut ledger = ProgressLedger::new(CampaignConfigEcho::default());
        ledger.append(record("stag-hunt", 1));
        assert!(!ledger.has_success("stag-hunt"));
        ledger.append(record("stag-hunt", 0));
        assert!(ledger.has_success("stag-hunt"));
        // A later failure does not un-succeed it.
        ledger.append(record("stag-hunt", 1));
        assert!(ledger.has_success("stag-hunt"));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");

        let mut ledger = ProgressLedger::new(CampaignConfigEcho {
            agents: vec!["codex".to_string()],
            ..Default::default()
        });
        ledger.append(record("stag-hunt", 0));
        ledger.save(&path).unwrap();

        let loaded = ProgressLedger::load_or_new(&path, CampaignConfigEcho::default()).unwrap();
        assert_eq!(loaded.schema_version, LEDGER_SCHEMA_VERSION);
        assert_eq!(loaded.runs.len(), 1);
        assert_eq!(loaded.config.agents, vec!["codex"]);
        assert!(loaded.has_success("stag-hunt"));
    }

    #[test]
    fn test_missing_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let ledger = ProgressLedger::load_or_new(
            &dir.path().join("progress.json"),
            CampaignConfigEcho::default(),
        )
        .unwrap();
        assert!(ledger.runs.is_empty());
    }

    #[test]
    fn test_newer_schema_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(
            &path,
            r#"{"schema_version": 99, "config": {"agents": [], "variant": "", "seed": 0, "max_turns": 0, "results_dir": "", "dry_run": false}, "runs": []}"#,
        )
        .unwrap();
        let err = ProgressLedger::load_or_new(&path, CampaignConfigEcho::default()).unwrap_err();
        assert!(matches!(err, LedgerError::SchemaVersion { found: 99, .. }));
    }

    #[test]
    fn test_summary_recomputed_from_rows() {
        let mut ledger = ProgressLedger::new(CampaignConfigEcho::default());
        ledger.append(record("a", 0));
        ledger.append(record("b", 1));
        ledger.append(record("c", 1));
        ledger.append(record("c", 0)); // retried to success

        let summary = ledger.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.ok, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failed_ids, vec!["b".to_string()]);
        assert!((summary.avg_elapsed_secs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let ledger = ProgressLedger::new(CampaignConfigEcho::default());
        let summary = ledger.summary();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.avg_elapsed_secs, 0.0);
        assert!(summary.failed_ids.is_empty());
    }

    #[test]
    fn test_event_log_is_line_oriented() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        append_event(&path, &record("a", 0)).unwrap();
        append_event(&path, &record("b", 1)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: RunRecord = serde_json::from_str(line).unwrap();
            assert!(!parsed.scenario.is_empty());
        }
    }
}
