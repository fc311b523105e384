//! Campaign postprocessing reports.
//!
//! All reports are derived read-only views over the results directory and
//! are written under `reports/`, never touching the ledger or summary. A
//! report failure is the campaign driver's to log and shrug off.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::catalog;
use crate::store::{RaceRecordStore, RaceRun};

/// Fraction of the registry with at least one successful race artifact.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub total_scenarios: usize,
    pub covered: usize,
    pub fraction: f64,
    pub missing: Vec<String>,
}

pub fn coverage_report(results_dir: &Path) -> CoverageReport {
    let total = catalog::len();
    let mut covered = 0usize;
    let mut missing = Vec::new();

    for id in catalog::sorted_ids() {
        let store = RaceRecordStore::new(results_dir.join(format!("{}.json", id)));
        let has_artifact = matches!(store.load(), Ok(records) if !records.is_empty());
        if has_artifact {
            covered += 1;
        } else {
            missing.push(id.to_string());
        }
    }

    CoverageReport {
        total_scenarios: total,
        covered,
        fraction: if total > 0 {
            covered as f64 / total as f64
        } else {
            0.0
        },
        missing,
    }
}

/// Which per-agent metric an aggregate report summarizes.
#[derive(Debug, Clone, Copy)]
pub enum Metric {
    CompositeScore,
    SecondaryMetric,
    DurationSecs,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::CompositeScore => "composite_score",
            Metric::SecondaryMetric => "secondary_metric",
            Metric::DurationSecs => "duration_secs",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentAggregate {
    pub agent: String,
    pub samples: usize,
    pub mean: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub metric: &'static str,
    pub races: usize,
    pub per_agent: Vec<AgentAggregate>,
}

/// Aggregate one metric across every recorded race in the results directory.
pub fn metric_report(results_dir: &Path, metric: Metric) -> MetricReport {
    let races = collect_races(results_dir);

    let mut buckets: std::collections::BTreeMap<String, Vec<f64>> = Default::default();
    for run in &races {
        for row in &run.results {
            let value = match metric {
                Metric::CompositeScore => row.composite_score,
                Metric::SecondaryMetric => row.secondary_metric,
                Metric::DurationSecs => row.duration_secs,
            };
            buckets.entry(row.agent.clone()).or_default().push(value);
        }
    }

    let per_agent = buckets
        .into_iter()
        .map(|(agent, values)| {
            let samples = values.len();
            let mean = values.iter().sum::<f64>() / samples as f64;
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            AgentAggregate {
                agent,
                samples,
                mean,
                max,
            }
        })
        .collect();

    MetricReport {
        metric: metric.name(),
        races: races.len(),
        per_agent,
    }
}

/// Every race record parseable from top-level files in the results
/// directory. Non-record files (ledger, summary, reports) simply fail to
/// parse as record arrays and are skipped.
fn collect_races(results_dir: &Path) -> Vec<RaceRun> {
    let mut races = Vec::new();
    let entries = match fs::read_dir(results_dir) {
        Ok(entries) => entries,
        Err(_) => return races,
    };
    for entry in entries.filter_map(std::result::Result::ok) {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Ok(records) = RaceRecordStore::new(&path).load() {
                races.extend(records);
            }
        }
    }
    races
}

#[derive(Debug, Clone, Serialize)]
pub struct FlaggedLine {
    pub file: String,
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogScanReport {
    pub files_scanned: usize,
    pub warning_lines: usize,
    pub error_lines: usize,
    pub flagged: Vec<FlaggedLine>,
}

const FLAGGED_CAP: usize = 100;

/// Scan every `.log` under the results directory for warning/error markers.
pub fn log_scan(results_dir: &Path) -> LogScanReport {
    let warn_re = Regex::new(r"(?i)\bwarn(ing)?\b").expect("static regex");
    let error_re = Regex::new(r"(?i)\b(error|fatal|panic)\b").expect("static regex");

    let mut report = LogScanReport {
        files_scanned: 0,
        warning_lines: 0,
        error_lines: 0,
        flagged: Vec::new(),
    };

    for entry in WalkDir::new(results_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|x| x == "log").unwrap_or(false))
    {
        report.files_scanned += 1;
        let contents = fs::read_to_string(entry.path()).unwrap_or_default();
        for (i, line) in contents.lines().enumerate() {
            let is_error = error_re.is_match(line);
            let is_warn = !is_error && warn_re.is_match(line);
            if is_error {
                report.error_lines += 1;
            }
            if is_warn {
                report.warning_lines += 1;
            }
            if (is_error || is_warn) && report.flagged.len() < FLAGGED_CAP {
                report.flagged.push(FlaggedLine {
                    file: entry.path().display().to_string(),
                    line: i + 1,
                    text: line.trim().to_string(),
                });
            }
        }
    }

    report
}

/// Run every report and write them under `reports/`.
pub fn write_reports(results_dir: &Path) -> Result<Vec<PathBuf>> {
    let reports_dir = results_dir.join("reports");
    fs::create_dir_all(&reports_dir)?;

    let mut written = Vec::new();

    let coverage = coverage_report(results_dir);
    written.push(write_json(&reports_dir.join("coverage.json"), &coverage)?);

    for metric in [
        Metric::CompositeScore,
        Metric::SecondaryMetric,
        Metric::DurationSecs,
    ] {
        let report = metric_report(results_dir, metric);
        written.push(write_json(
            &reports_dir.join(format!("{}.json", metric.name())),
            &report,
        )?);
    }

    let scan = log_scan(results_dir);
    written.push(write_json(&reports_dir.join("log_scan.json"), &scan)?);

    Ok(written)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::agent::AgentKind;
    use crate::score::CanonicalRow;
    use crate::store::AgentResultRow;
    use chrono::Utc;
    use tempfile::TempDir;

    fn race(scenario: &str, agent: &str, composite: f64) -> RaceRun {
        RaceRun {
            race_id: RaceRun::new_race_id(),
            scenario: scenario.to_string(),
            seed: 1,
            variant: "default".to_string(),
            duration_unit: "rounds".to_string(),
            duration_value: 10,
            agents: vec![agent.to_string()],
            results: vec![AgentResultRow::scored(
                agent,
                AgentKind::Codex,
                3.0,
                "",
                CanonicalRow {
                    composite_score: composite,
                    secondary_metric: 1.0,
                },
            )],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_coverage_counts_successful_artifacts() {
        let dir = TempDir::new().unwrap();
        RaceRecordStore::new(dir.path().join("stag-hunt.json"))
            .append(&race("stag-hunt", "codex", 1.0))
            .unwrap();
        // An empty array is not coverage.
        fs::write(dir.path().join("chicken-run.json"), "[]").unwrap();

        let report = coverage_report(dir.path());
        assert_eq!(report.total_scenarios, catalog::len());
        assert_eq!(report.covered, 1);
        assert!(report.missing.contains(&"chicken-run".to_string()));
        assert!(!report.missing.contains(&"stag-hunt".to_string()));
        assert!(report.fraction > 0.0 && report.fraction < 1.0);
    }

    #[test]
    fn test_metric_report_aggregates_per_agent() {
        let dir = TempDir::new().unwrap();
        let store = RaceRecordStore::new(dir.path().join("stag-hunt.json"));
        store.append(&race("stag-hunt", "codex", 2.0)).unwrap();
        store.append(&race("stag-hunt", "codex", 4.0)).unwrap();
        // The ledger file must be skipped, not crash the report.
        fs::write(dir.path().join("progress.json"), "{\"schema_version\":1}").unwrap();

        let report = metric_report(dir.path(), Metric::CompositeScore);
        assert_eq!(report.races, 2);
        assert_eq!(report.per_agent.len(), 1);
        assert_eq!(report.per_agent[0].agent, "codex");
        assert_eq!(report.per_agent[0].samples, 2);
        assert!((report.per_agent[0].mean - 3.0).abs() < 1e-9);
        assert_eq!(report.per_agent[0].max, 4.0);
    }

    #[test]
    fn test_log_scan_flags_markers() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("runs/race-1/logs");
        fs::create_dir_all(&logs).unwrap();
        fs::write(
            logs.join("codex.log"),
            "turn 1 ok\nWARNING: low budget\nERROR: connection refused\n",
        )
        .unwrap();

        let report = log_scan(dir.path());
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.warning_lines, 1);
        assert_eq!(report.error_lines, 1);
        assert_eq!(report.flagged.len(), 2);
    }

    #[test]
    fn test_write_reports_never_touches_ledger() {
        let dir = TempDir::new().unwrap();
        let ledger_path = dir.path().join("progress.json");
        fs::write(&ledger_path, "{\"schema_version\":1}").unwrap();

        let written = write_reports(dir.path()).unwrap();
        assert_eq!(written.len(), 5);
        for path in &written {
            assert!(path.starts_with(dir.path().join("reports")));
        }
        assert_eq!(
            fs::read_to_string(&ledger_path).unwrap(),
            "{\"schema_version\":1}"
        );
    }
}
