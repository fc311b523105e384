//! Race orchestration.
//!
//! [`run_race`] is the single entry point for one race: resolve the scenario,
//! run preflight (fatal before any process is spawned), dedup agent names,
//! assign each agent its exclusive resource, dispatch to the execution mode,
//! then rank and persist the results.

pub mod config;
pub mod local;
pub mod server;

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::catalog::{self, ExecutionMode, ScenarioSpec};
use crate::error::ConfigError;
use crate::runner::agent::{AgentKind, AgentResource, AgentSpec};
use crate::score::leaderboard;
use crate::store::{RaceRecordStore, RaceRun};

pub use config::{ArenaConfig, RaceRequest};

/// The completed race: the persisted record plus the rendered leaderboard.
pub struct RaceOutcome {
    pub run: RaceRun,
    pub leaderboard: String,
}

/// Deduplicate agent names.
///
/// Every occurrence of a colliding name is suffixed: `["codex", "codex"]`
/// becomes `["codex-1", "codex-2"]`. Unique names pass through untouched.
pub fn dedup_names(names: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in names {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }
    let mut seen: HashMap<&str, usize> = HashMap::new();
    names
        .iter()
        .map(|name| {
            if counts[name.as_str()] > 1 {
                let n = seen.entry(name.as_str()).or_insert(0);
                *n += 1;
                format!("{}-{}", name, n)
            } else {
                name.clone()
            }
        })
        .collect()
}

/// Per-race working directories: private state and log files, unique to one
/// race id, under the results file's parent so campaign postprocessing can
/// find the logs.
pub struct RaceWorkspace {
    pub race_id: String,
    pub root: PathBuf,
}

impl RaceWorkspace {
    pub fn new(request: &RaceRequest, race_id: &str) -> Self {
        let parent = request
            .results_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            race_id: race_id.to_string(),
            root: parent.join("runs").join(race_id),
        }
    }

    pub fn state_dir(&self, agent: &str) -> PathBuf {
        self.root.join("state").join(agent)
    }

    pub fn agent_log(&self, agent: &str) -> PathBuf {
        self.root.join("logs").join(format!("{}.log", agent))
    }

    pub fn server_log(&self, agent: &str) -> PathBuf {
        self.root.join("logs").join(format!("{}.server.log", agent))
    }
}

/// Preflight: validate the request and build the deduplicated agent specs
/// with their exclusive resources. Fails before any process is spawned.
pub fn preflight(
    arena: &ArenaConfig,
    spec: &ScenarioSpec,
    request: &RaceRequest,
    workspace: &RaceWorkspace,
) -> Result<Vec<AgentSpec>, ConfigError> {
    if request.agents.is_empty() {
        return Err(ConfigError::NoAgents);
    }

    let mut kinds: Vec<AgentKind> = Vec::with_capacity(request.agents.len());
    for raw in &request.agents {
        let kind: AgentKind = raw
            .parse()
            .map_err(|_| ConfigError::UnknownAgent(raw.clone()))?;
        if arena.binary_for(kind).is_none() {
            return Err(ConfigError::MissingBinary(kind.to_string()));
        }
        kinds.push(kind);
    }

    let names = dedup_names(&request.agents);
    let specs = names
        .into_iter()
        .zip(kinds)
        .enumerate()
        .map(|(i, (name, kind))| {
            let resource = match spec.mode {
                ExecutionMode::LocalCli => AgentResource::StateDir(workspace.state_dir(&name)),
                ExecutionMode::ServerBacked => {
                    AgentResource::Port(arena.port_base.saturating_add(i as u16))
                }
            };
            AgentSpec {
                name,
                kind,
                resource,
                model: request.model.clone(),
            }
        })
        .collect();
    Ok(specs)
}

/// Minimal per-agent prompt referencing the agent's exclusive resource.
/// Richer prompt assembly is an external collaborator's job.
pub fn build_prompt(spec: &ScenarioSpec, request: &RaceRequest, agent: &AgentSpec) -> String {
    let duration = request.duration.unwrap_or(spec.default_duration);
    let reach = match &agent.resource {
        AgentResource::StateDir(dir) => {
            format!("Your private state directory is {}.", dir.display())
        }
        AgentResource::Port(port) => {
            format!(
                "Your dedicated scenario server listens on http://127.0.0.1:{}.",
                port
            )
        }
    };
    format!(
        "You are competing in the '{}' benchmark scenario for {} {} (seed {}, variant '{}'). {}",
        spec.name, duration, spec.duration_unit, request.seed, request.variant, reach
    )
}

/// Run one race end to end against the catalog entry for `request.scenario`.
pub async fn run_race(arena: &ArenaConfig, request: &RaceRequest) -> Result<RaceOutcome> {
    let spec = catalog::resolve(&request.scenario)?;
    run_race_with_spec(arena, spec, request).await
}

/// Run one race against an explicit scenario spec.
pub async fn run_race_with_spec(
    arena: &ArenaConfig,
    spec: &ScenarioSpec,
    request: &RaceRequest,
) -> Result<RaceOutcome> {
    let race_id = RaceRun::new_race_id();
    let workspace = RaceWorkspace::new(request, &race_id);
    let agents = preflight(arena, spec, request, &workspace)?;

    info!(
        race_id = %race_id,
        scenario = %spec.id,
        agents = agents.len(),
        mode = ?spec.mode,
        "Starting race"
    );

    let results = match spec.mode {
        ExecutionMode::LocalCli => {
            local::run(arena, spec, request, &workspace, &agents).await?
        }
        ExecutionMode::ServerBacked => {
            server::run(arena, spec, request, &workspace, &agents).await?
        }
    };

    let run = RaceRun {
        race_id,
        scenario: spec.id.to_string(),
        seed: request.seed,
        variant: request.variant.clone(),
        duration_unit: spec.duration_unit.to_string(),
        duration_value: request.duration.unwrap_or(spec.default_duration),
        agents: agents.iter().map(|a| a.name.clone()).collect(),
        results,
        created_at: Utc::now(),
    };

    let rendered = leaderboard::render(spec.name, &run.results);

    let store = RaceRecordStore::new(&request.results_file);
    store
        .append(&run)
        .with_context(|| format!("recording race to {}", request.results_file.display()))?;

    info!(race_id = %run.race_id, "Race recorded");

    Ok(RaceOutcome {
        run,
        leaderboard: rendered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(agents: &[&str]) -> RaceRequest {
        RaceRequest::new(
            "iterated-prisoners-dilemma",
            agents.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_dedup_collisions_suffix_every_occurrence() {
        let names = vec!["codex".to_string(), "codex".to_string()];
        assert_eq!(dedup_names(&names), vec!["codex-1", "codex-2"]);
    }

    #[test]
    fn test_dedup_leaves_unique_names_alone() {
        let names = vec!["codex".to_string(), "aider".to_string()];
        assert_eq!(dedup_names(&names), vec!["codex", "aider"]);

        let names = vec![
            "codex".to_string(),
            "aider".to_string(),
            "codex".to_string(),
        ];
        assert_eq!(dedup_names(&names), vec!["codex-1", "aider", "codex-2"]);
    }

    #[test]
    fn test_preflight_rejects_empty_agents() {
        let arena = ArenaConfig::default();
        let spec = catalog::get("iterated-prisoners-dilemma").unwrap();
        let req = request(&[]);
        let workspace = RaceWorkspace::new(&req, "race-test");
        let err = preflight(&arena, spec, &req, &workspace).unwrap_err();
        assert!(matches!(err, ConfigError::NoAgents));
    }

    #[test]
    fn test_preflight_rejects_unknown_agent() {
        let arena = ArenaConfig::default();
        let spec = catalog::get("iterated-prisoners-dilemma").unwrap();
        let req = request(&["codex", "hal9000"]);
        let workspace = RaceWorkspace::new(&req, "race-test");
        let err = preflight(&arena, spec, &req, &workspace).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAgent(_)));
    }

    #[test]
    fn test_preflight_assigns_distinct_state_dirs() {
        let arena = ArenaConfig::default();
        let spec = catalog::get("iterated-prisoners-dilemma").unwrap();
        let req = request(&["codex", "codex"]);
        let workspace = RaceWorkspace::new(&req, "race-test");
        let agents = preflight(&arena, spec, &req, &workspace).unwrap();
        assert_eq!(agents[0].name, "codex-1");
        assert_eq!(agents[1].name, "codex-2");
        assert_ne!(agents[0].resource, agents[1].resource);
    }

    #[test]
    fn test_preflight_assigns_sequential_ports() {
        let arena = ArenaConfig::default().with_port_base(9000);
        let spec = catalog::get("open-outcry-market").unwrap();
        let req = RaceRequest::new(
            "open-outcry-market",
            vec!["codex".to_string(), "aider".to_string()],
        );
        let workspace = RaceWorkspace::new(&req, "race-test");
        let agents = preflight(&arena, spec, &req, &workspace).unwrap();
        assert_eq!(agents[0].resource, AgentResource::Port(9000));
        assert_eq!(agents[1].resource, AgentResource::Port(9001));
    }

    #[test]
    fn test_prompt_references_resource() {
        let arena = ArenaConfig::default();
        let spec = catalog::get("iterated-prisoners-dilemma").unwrap();
        let req = request(&["codex"]);
        let workspace = RaceWorkspace::new(&req, "race-test");
        let agents = preflight(&arena, spec, &req, &workspace).unwrap();
        let prompt = build_prompt(spec, &req, &agents[0]);
        assert!(prompt.contains("state directory"));
        assert!(prompt.contains("100 rounds"));
    }
}
