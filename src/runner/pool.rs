//! The concurrency primitive for one race.
//!
//! Every agent is launched before any result is awaited, so the race runs
//! with true process-level parallelism: one OS process per agent, one worker
//! task blocking on each. Completions are harvested in arrival order; a
//! failing or panicking worker is converted into a fallback outcome locally
//! and never cancels or blocks its siblings.

use std::collections::HashMap;

use tokio::task::JoinSet;
use tracing::{info, warn};

use super::agent::{AgentRunOutcome, AgentRunner, AgentSpec, LAUNCH_FAILURE_CODE};

/// One agent's launch order: runner, spec, and the prompt it races with.
pub struct AgentLaunch {
    pub runner: AgentRunner,
    pub spec: AgentSpec,
    pub prompt: String,
    pub max_turns: u32,
}

/// Run every launch to completion and return outcomes in launch order.
///
/// Launch order is deterministic (it fixes resource assignment and
/// leaderboard tie order); completion order is not, and is only observable
/// in the harvest logs.
pub async fn run_all(launches: Vec<AgentLaunch>) -> Vec<AgentRunOutcome> {
    let total = launches.len();
    let mut set = JoinSet::new();
    let mut task_index: HashMap<tokio::task::Id, (usize, String, String)> = HashMap::new();

    for (index, launch) in launches.into_iter().enumerate() {
        let name = launch.spec.name.clone();
        let resource = launch.spec.resource.label();
        let handle = set.spawn(async move {
            let outcome = launch
                .runner
                .run(&launch.spec, &launch.prompt, launch.max_turns)
                .await;
            (index, outcome)
        });
        task_index.insert(handle.id(), (index, name, resource));
    }

    let mut outcomes: Vec<Option<AgentRunOutcome>> = (0..total).map(|_| None).collect();
    let mut harvested = 0usize;

    while let Some(joined) = set.join_next_with_id().await {
        harvested += 1;
        match joined {
            Ok((_, (index, outcome))) => {
                info!(
                    agent = %outcome.name,
                    exit_code = outcome.exit_code,
                    "Harvested agent {}/{} ({:.1}s)",
                    harvested,
                    total,
                    outcome.duration_secs
                );
                outcomes[index] = Some(outcome);
            }
            Err(join_err) => {
                // A worker panic must not take down the race.
                let (index, name, resource) = task_index
                    .get(&join_err.id())
                    .cloned()
                    .unwrap_or((usize::MAX, "unknown".to_string(), String::new()));
                warn!(agent = %name, "Agent worker panicked: {}", join_err);
                if index < total {
                    outcomes[index] = Some(AgentRunOutcome {
                        name,
                        resource,
                        exit_code: LAUNCH_FAILURE_CODE,
                        duration_secs: 0.0,
                        error: format!("Agent worker panicked: {}", join_err),
                    });
                }
            }
        }
    }

    outcomes.into_iter().flatten().collect()
}
