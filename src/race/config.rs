//! Race configuration values.
//!
//! [`ArenaConfig`] is the immutable configuration threaded explicitly through
//! the call chain: the shared port base, the known-agent binary table, and
//! the bounded timeouts. [`RaceRequest`] is one race's resolved inputs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::runner::agent::AgentKind;

/// Process-wide race configuration. Built once, passed by reference.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// First port assigned in server-backed races; agent i gets base + i.
    pub port_base: u16,
    /// Liveness poll budget per server.
    pub readiness_attempts: u32,
    /// Spacing between liveness polls.
    pub readiness_interval: Duration,
    /// Bound on each score collection (subcommand or HTTP GET).
    pub collect_timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL during server teardown.
    pub terminate_grace: Duration,
    /// Known-agent table: kind to resolved binary.
    pub agent_binaries: HashMap<AgentKind, String>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        let agent_binaries = AgentKind::all()
            .iter()
            .map(|k| (*k, k.default_binary().to_string()))
            .collect();
        Self {
            port_base: 7400,
            readiness_attempts: 30,
            readiness_interval: Duration::from_secs(1),
            collect_timeout: Duration::from_secs(10),
            terminate_grace: Duration::from_secs(5),
            agent_binaries,
        }
    }
}

impl ArenaConfig {
    pub fn with_port_base(mut self, port_base: u16) -> Self {
        self.port_base = port_base;
        self
    }

    pub fn with_collect_timeout(mut self, timeout: Duration) -> Self {
        self.collect_timeout = timeout;
        self
    }

    pub fn with_readiness(mut self, attempts: u32, interval: Duration) -> Self {
        self.readiness_attempts = attempts;
        self.readiness_interval = interval;
        self
    }

    /// Override the binary for one agent kind.
    pub fn with_agent_binary(mut self, kind: AgentKind, binary: impl Into<String>) -> Self {
        self.agent_binaries.insert(kind, binary.into());
        self
    }

    pub fn binary_for(&self, kind: AgentKind) -> Option<&str> {
        self.agent_binaries.get(&kind).map(String::as_str)
    }
}

/// One race's resolved inputs.
#[derive(Debug, Clone)]
pub struct RaceRequest {
    pub scenario: String,
    /// Raw agent names as requested; deduplication happens in preflight.
    pub agents: Vec<String>,
    pub seed: u64,
    pub variant: String,
    /// Override for the scenario's default duration. Zero means default.
    pub duration: Option<u32>,
    pub max_turns: u32,
    pub results_file: PathBuf,
    pub model: Option<String>,
}

impl RaceRequest {
    pub fn new(scenario: impl Into<String>, agents: Vec<String>) -> Self {
        Self {
            scenario: scenario.into(),
            agents,
            seed: 0,
            variant: "default".to_string(),
            duration: None,
            max_turns: 40,
            results_file: PathBuf::from("races.json"),
            model: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn with_duration(mut self, duration: Option<u32>) -> Self {
        self.duration = duration.filter(|d| *d > 0);
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_file = path.into();
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}
