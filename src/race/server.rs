//! Server-backed race mode.
//!
//! For the live-market scenario family: every agent gets a dedicated
//! scenario server process on its own port. The [`ServerFleet`] supervising
//! scope owns every server child for the duration of the race and is the
//! single place teardown happens, on the normal path, the readiness-failure
//! path, and the interrupt path alike. Teardown drains the fleet, so calling
//! it twice is a no-op.

use std::process::Stdio;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::ScenarioSpec;
use crate::error::{CollectError, ReadinessError};
use crate::runner::agent::{AgentResource, AgentRunOutcome, AgentRunner, AgentSpec};
use crate::runner::pool::{self, AgentLaunch};
use crate::score;
use crate::store::AgentResultRow;

use super::{build_prompt, ArenaConfig, RaceRequest, RaceWorkspace};

struct ServerProc {
    name: String,
    port: u16,
    child: Child,
}

/// Owns every scenario server spawned for one race.
pub struct ServerFleet {
    grace: Duration,
    procs: Mutex<Vec<ServerProc>>,
}

impl ServerFleet {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            procs: Mutex::new(Vec::new()),
        }
    }

    async fn adopt(&self, proc: ServerProc) {
        self.procs.lock().await.push(proc);
    }

    /// Stop every owned server: SIGTERM, bounded wait, SIGKILL on timeout.
    ///
    /// Idempotent: the fleet drains its children, so a second invocation
    /// (e.g. signal path racing the normal completion path) finds nothing
    /// to do and never double-terminates.
    pub async fn teardown(&self) {
        let drained: Vec<ServerProc> = self.procs.lock().await.drain(..).collect();
        for proc in drained {
            terminate(proc, self.grace).await;
        }
    }
}

async fn terminate(mut proc: ServerProc, grace: Duration) {
    if let Some(pid) = proc.child.id() {
        debug!(server = %proc.name, port = proc.port, pid = pid, "Terminating server");
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }
    match tokio::time::timeout(grace, proc.child.wait()).await {
        Ok(Ok(status)) => {
            debug!(server = %proc.name, status = ?status.code(), "Server stopped");
        }
        Ok(Err(e)) => {
            warn!(server = %proc.name, "Wait on server failed: {}", e);
        }
        Err(_) => {
            warn!(server = %proc.name, "Server ignored SIGTERM, killing");
            let _ = proc.child.start_kill();
            let _ = proc.child.wait().await;
        }
    }
}

pub async fn run(
    arena: &ArenaConfig,
    spec: &ScenarioSpec,
    request: &RaceRequest,
    workspace: &RaceWorkspace,
    agents: &[AgentSpec],
) -> Result<Vec<AgentResultRow>> {
    let fleet = ServerFleet::new(arena.terminate_grace);

    // Bring the whole fleet up before launching any agent.
    for agent in agents {
        let port = agent_port(agent);
        match spawn_server(spec, request, workspace, agent, port) {
            Ok(child) => {
                fleet
                    .adopt(ServerProc {
                        name: agent.name.clone(),
                        port,
                        child,
                    })
                    .await;
            }
            Err(e) => {
                fleet.teardown().await;
                return Err(ReadinessError::Spawn {
                    port,
                    message: e.to_string(),
                }
                .into());
            }
        }
    }

    let health_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    for agent in agents {
        let port = agent_port(agent);
        if !wait_until_live(
            &health_client,
            port,
            arena.readiness_attempts,
            arena.readiness_interval,
        )
        .await
        {
            fleet.teardown().await;
            return Err(ReadinessError::Timeout {
                port,
                attempts: arena.readiness_attempts,
            }
            .into());
        }
        info!(agent = %agent.name, port = port, "Server live");
    }

    // Identical teardown on interrupt and on normal completion.
    let rows = tokio::select! {
        rows = race_and_collect(arena, spec, request, workspace, agents) => rows,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, tearing down server fleet");
            fleet.teardown().await;
            anyhow::bail!("race interrupted");
        }
    };
    fleet.teardown().await;
    rows
}

fn agent_port(agent: &AgentSpec) -> u16 {
    match agent.resource {
        AgentResource::Port(port) => port,
        // Preflight assigns ports for every server-backed race.
        AgentResource::StateDir(_) => unreachable!("server race without port"),
    }
}

fn spawn_server(
    spec: &ScenarioSpec,
    request: &RaceRequest,
    workspace: &RaceWorkspace,
    agent: &AgentSpec,
    port: u16,
) -> Result<Child> {
    let log_path = workspace.server_log(&agent.name);
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log = std::fs::File::create(&log_path)?;
    let log_err = log.try_clone()?;

    let duration = request.duration.unwrap_or(spec.default_duration);
    let child = Command::new(spec.simulator)
        .arg(spec.score_command)
        .arg("--port")
        .arg(port.to_string())
        .arg("--seed")
        .arg(request.seed.to_string())
        .arg("--duration")
        .arg(duration.to_string())
        .arg("--variant")
        .arg(&request.variant)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .spawn()?;

    info!(agent = %agent.name, port = port, "Server spawned");
    Ok(child)
}

/// Poll the liveness endpoint until it answers or the budget runs out.
pub async fn wait_until_live(
    client: &reqwest::Client,
    port: u16,
    attempts: u32,
    interval: Duration,
) -> bool {
    let url = format!("http://127.0.0.1:{}/health", port);
    for attempt in 1..=attempts {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => return true,
            Ok(resp) => {
                debug!(port = port, attempt = attempt, status = %resp.status(), "Server not ready");
            }
            Err(e) => {
                debug!(port = port, attempt = attempt, "Liveness poll failed: {}", e);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    false
}

async fn race_and_collect(
    arena: &ArenaConfig,
    spec: &ScenarioSpec,
    request: &RaceRequest,
    workspace: &RaceWorkspace,
    agents: &[AgentSpec],
) -> Result<Vec<AgentResultRow>> {
    let mut launches = Vec::with_capacity(agents.len());
    for agent in agents {
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

    let score_client = reqwest::Client::builder()
        .timeout(arena.collect_timeout)
        .build()?;

    let mut rows = Vec::with_capacity(agents.len());
    for (agent, outcome) in agents.iter().zip(&outcomes) {
        rows.push(score_agent(&score_client, spec, agent, outcome).await);
    }
    Ok(rows)
}

async fn score_agent(
    client: &reqwest::Client,
    spec: &ScenarioSpec,
    agent: &AgentSpec,
    outcome: &AgentRunOutcome,
) -> AgentResultRow {
    match fetch_score(client, agent_port(agent)).await {
        Ok(payload) => {
            let row = score::normalize_value(&payload, spec.family);
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

async fn fetch_score(client: &reqwest::Client, port: u16) -> Result<Value, CollectError> {
    let url = format!("http://127.0.0.1:{}/score", port);
    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| CollectError::Http(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(CollectError::Http(format!(
            "score endpoint returned {}",
            resp.status()
        )));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| CollectError::Malformed(e.to_string()))
}
