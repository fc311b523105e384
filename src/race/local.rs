//! Direct-CLI race mode.
//!
//! For scenarios with no persistent server. Each agent gets a private,
//! race-and-agent-unique state directory; after every agent finishes, the
//! scenario's own full-score subcommand is invoked once per agent, scoped to
//! that agent's state directory, with a bounded timeout. A collection
//! failure never aborts the race: the agent keeps its seat on the
//! leaderboard through a zero-score fallback row.

use std::process::Stdio;

use anyhow::Result;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::catalog::ScenarioSpec;
use crate::error::CollectError;
use crate::runner::agent::{AgentRunOutcome, AgentRunner, AgentSpec};
use crate::runner::pool::{self, AgentLaunch};
use crate::score;
use crate::store::AgentResultRow;

use super::{build_prompt, ArenaConfig, RaceRequest, RaceWorkspace};

pub async fn run(
    arena: &ArenaConfig,
    spec: &ScenarioSpec,
    request: &RaceRequest,
    workspace: &RaceWorkspace,
    agents: &[AgentSpec],
) -> Result<Vec<AgentResultRow>> {
    let mut launches = Vec::with_capacity(agents.len());
    for agent in agents {
        std::fs::create_dir_all(workspace.state_dir(&agent.name))?;
        let binary = arena
            .binary_for(agent.kind)
            .expect("preflight verified the known-agent table");
        launches.push(AgentLaunch {
            runner: AgentRunner::new(binary, workspace.agent_log(&agent.name)),
            spec: agent.clone(),
            prompt: build_prompt(spec, request, agent),
            max_turns: request.max_turns,
        });
    }

    let outcomes = pool::run_all(launches).await;

    let mut rows = Vec::with_capacity(agents.len());
    for (agent, outcome) in agents.iter().zip(&outcomes) {
        rows.push(score_agent(arena, spec, agent, outcome).await);
    }
    Ok(rows)
}

/// Collect and normalize one agent's score, downgrading any failure to a
/// fallback row.
async fn score_agent(
    arena: &ArenaConfig,
    spec: &ScenarioSpec,
    agent: &AgentSpec,
    outcome: &AgentRunOutcome,
) -> AgentResultRow {
    match collect_score(arena, spec, agent).await {
        Ok(payload) => {
            let row = score::normalize_value(&payload, spec.family);
            debug!(agent = %agent.name, composite = row.composite_score, "Score collected");
            AgentResultRow::scored(
                &agent.name,
                agent.kind,
                outcome.duration_secs,
                &outcome.error,
                row,
            )
        }
        Err(e) => {
            warn!(agent = %agent.name, "Score collection failed: {}", e);
            let error = if outcome.error.is_empty() {
                e.to_string()
            } else {
                format!("{}; {}", outcome.error, e)
            };
            AgentResultRow::fallback(&agent.name, agent.kind, outcome.duration_secs, error)
        }
    }
}

/// Invoke the scenario's full-score subcommand for one agent's state
/// directory and parse the single JSON object it prints.
async fn collect_score(
    arena: &ArenaConfig,
    spec: &ScenarioSpec,
    agent: &AgentSpec,
) -> Result<Value, CollectError> {
    let (env_key, env_value) = agent.resource.env();
    info!(agent = %agent.name, simulator = spec.simulator, "Collecting score");

    let output = tokio::time::timeout(
        arena.collect_timeout,
        Command::new(spec.simulator)
            .arg(spec.score_command)
            .env(env_key, env_value)
            .stdin(Stdio::null())
            .output(),
    )
    .await
    .map_err(|_| CollectError::Timeout(arena.collect_timeout))??;

    if !output.status.success() {
        return Err(CollectError::CommandFailed {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_score_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the collaborator's stdout into one JSON object.
///
/// Simulators are expected to print exactly one object, but some wrap it in
/// banner text; the fallback carves out the outermost brace span.
pub fn parse_score_output(stdout: &str) -> Result<Value, CollectError> {
    let trimmed = stdout.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }
    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }
    Err(CollectError::Malformed(format!(
        "no JSON object in score output ({} bytes)",
        stdout.len()
    )))
}
