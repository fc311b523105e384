//! Race records and their append-only store.
//!
//! A [`RaceRun`] is the full, immutable record of one race. The store keeps
//! records as a single JSON array per file: read the existing array (a
//! missing file is an empty one), append, write the whole array back.
//!
//! Single-writer by design: concurrent campaigns must use distinct files. No
//! locking is implemented; the campaign driver is the only writer of its
//! results directory for the campaign's lifetime.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::runner::agent::AgentKind;
use crate::score::CanonicalRow;

/// One agent's normalized result within a race.
///
/// Exactly one row exists for every launched agent, even on total failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResultRow {
    pub agent: String,
    pub agent_kind: AgentKind,
    pub duration_secs: f64,
    /// Empty when the agent ran and scored cleanly.
    pub error: String,
    pub composite_score: f64,
    pub secondary_metric: f64,
}

impl AgentResultRow {
    /// A scored row.
    pub fn scored(
        agent: impl Into<String>,
        agent_kind: AgentKind,
        duration_secs: f64,
        error: impl Into<String>,
        row: CanonicalRow,
    ) -> Self {
        Self {
            agent: agent.into(),
            agent_kind,
            duration_secs,
            error: error.into(),
            composite_score: row.composite_score,
            secondary_metric: row.secondary_metric,
        }
    }

    /// The zero-filled fallback row for an agent whose score could not be
    /// collected.
    pub fn fallback(
        agent: impl Into<String>,
        agent_kind: AgentKind,
        duration_secs: f64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            agent: agent.into(),
            agent_kind,
            duration_secs,
            error: error.into(),
            composite_score: 0.0,
            secondary_metric: 0.0,
        }
    }
}

/// The full record of one race, immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceRun {
    pub race_id: String,
    pub scenario: String,
    pub seed: u64,
    pub variant: String,
    pub duration_unit: String,
    pub duration_value: u32,
    pub agents: Vec<String>,
    pub results: Vec<AgentResultRow>,
    pub created_at: DateTime<Utc>,
}

impl RaceRun {
    /// Fresh race id in the `race-<uuid>` form.
    pub fn new_race_id() -> String {
        format!("race-{}", Uuid::new_v4())
    }
}

/// Append-only persistence of completed races.
pub struct RaceRecordStore {
    path: PathBuf,
}

impl RaceRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record in the file. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<RaceRun>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Append one record and rewrite the file.
    pub fn append(&self, run: &RaceRun) -> Result<(), StoreError> {
        let mut records = self.load()?;
        records.push(run.clone());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(&records)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_run(scenario: &str) -> RaceRun {
        RaceRun {
            race_id: RaceRun::new_race_id(),
            scenario: scenario.to_string(),
            seed: 42,
            variant: "default".to_string(),
            duration_unit: "rounds".to_string(),
            duration_value: 100,
            agents: vec!["codex".to_string()],
            results: vec![AgentResultRow::fallback(
                "codex",
                AgentKind::Codex,
                1.5,
                "agent binary missing",
            )],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = RaceRecordStore::new(dir.path().join("races.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_append_accumulates() {
        let dir = TempDir::new().unwrap();
        let store = RaceRecordStore::new(dir.path().join("races.json"));

        store.append(&sample_run("stag-hunt")).unwrap();
        store.append(&sample_run("chicken-run")).unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].scenario, "stag-hunt");
        assert_eq!(records[1].scenario, "chicken-run");
    }

    #[test]
    fn test_append_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let store = RaceRecordStore::new(dir.path().join("nested/races.json"));
        store.append(&sample_run("stag-hunt")).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("races.json");
        fs::write(&path, "not json").unwrap();
        let store = RaceRecordStore::new(&path);
        assert!(store.load().is_err());
    }

    #[test]
    fn test_fallback_row_is_zero_filled() {
        let row = AgentResultRow::fallback("codex", AgentKind::Codex, 2.0, "boom");
        assert_eq!(row.composite_score, 0.0);
        assert_eq!(row.secondary_metric, 0.0);
        assert_eq!(row.error, "boom");
    }
}
