//! Launching and classifying one external agent process.
//!
//! The runner spawns the agent's binary, redirects its output to a
//! deterministic per-(race, agent) log file, blocks the calling worker until
//! exit, and measures wall-clock duration. It never returns an error: every
//! failure mode is converted into an [`AgentRunOutcome`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exit code recorded when the agent process could not be started at all
/// (binary missing, immediate spawn failure). Distinguished from any code a
/// running agent could return.
pub const LAUNCH_FAILURE_CODE: i32 = -2;

/// Marker prefix for the structured trailing error line agents may emit.
///
/// Format: `ARENA_ERROR {"error": "<message>"}` as the last line of the log.
/// Legacy free-text logs are still accepted via best-effort scraping.
pub const STRUCTURED_ERROR_MARKER: &str = "ARENA_ERROR ";

const ERROR_TEXT_MAX: usize = 300;

/// The fixed known-agent set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    ClaudeCode,
    Codex,
    Aider,
    Goose,
}

impl AgentKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::ClaudeCode => "Claude Code",
            AgentKind::Codex => "Codex",
            AgentKind::Aider => "Aider",
            AgentKind::Goose => "Goose",
        }
    }

    /// Default binary resolved for this kind; the known-agent table in
    /// [`crate::race::config::ArenaConfig`] can override it.
    pub fn default_binary(&self) -> &'static str {
        match self {
            AgentKind::ClaudeCode => "claude",
            AgentKind::Codex => "codex",
            AgentKind::Aider => "aider",
            AgentKind::Goose => "goose",
        }
    }

    pub fn all() -> &'static [AgentKind] {
        &[
            AgentKind::ClaudeCode,
            AgentKind::Codex,
            AgentKind::Aider,
            AgentKind::Goose,
        ]
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claudecode" => Ok(AgentKind::ClaudeCode),
            "codex" => Ok(AgentKind::Codex),
            "aider" => Ok(AgentKind::Aider),
            "goose" => Ok(AgentKind::Goose),
            other => Err(format!("Unknown agent kind: {}", other)),
        }
    }
}

/// The exclusive resource through which one agent reaches the scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentResource {
    StateDir(PathBuf),
    Port(u16),
}

impl AgentResource {
    /// Environment variable carrying the resource, by the fixed per-family
    /// naming convention of the agent contract.
    pub fn env(&self) -> (&'static str, String) {
        match self {
            AgentResource::StateDir(dir) => ("ARENA_STATE_DIR", dir.display().to_string()),
            AgentResource::Port(port) => ("ARENA_PORT", port.to_string()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            AgentResource::StateDir(dir) => dir.display().to_string(),
            AgentResource::Port(port) => format!("port:{}", port),
        }
    }
}

/// One racing agent, after name dedup and resource assignment.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Unique within the race.
    pub name: String,
    pub kind: AgentKind,
    pub resource: AgentResource,
    pub model: Option<String>,
}

/// What happened to one launched agent. Always produced, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunOutcome {
    pub name: String,
    pub resource: String,
    pub exit_code: i32,
    pub duration_secs: f64,
    /// Empty on success.
    pub error: String,
}

impl AgentRunOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_launch_failure(&self) -> bool {
        self.exit_code == LAUNCH_FAILURE_CODE
    }
}

/// Spawns and waits on one external agent process.
pub struct AgentRunner {
    /// Resolved agent binary.
    program: String,
    /// Deterministic log file for this (race, agent).
    log_path: PathBuf,
}

impl AgentRunner {
    pub fn new(program: impl Into<String>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            log_path: log_path.into(),
        }
    }

    /// Run the agent to completion.
    ///
    /// Classification: exit 0 is success; failure to spawn is a launch
    /// failure ([`LAUNCH_FAILURE_CODE`]) with a descriptive message; any
    /// other nonzero exit is abnormal, with a best-effort message extracted
    /// from the log.
    pub async fn run(&self, spec: &AgentSpec, prompt: &str, max_turns: u32) -> AgentRunOutcome {
        let start = Instant::now();
        let resource_label = spec.resource.label();

        let log_file = match self.open_log() {
            Ok(f) => f,
            Err(e) => {
                return AgentRunOutcome {
                    name: spec.name.clone(),
                    resource: resource_label,
                    exit_code: LAUNCH_FAILURE_CODE,
                    duration_secs: 0.0,
                    error: format!("Failed to create log file {}: {}", self.log_path.display(), e),
                };
            }
        };
        let log_err = match log_file.try_clone() {
            Ok(f) => f,
            Err(e) => {
                return AgentRunOutcome {
                    name: spec.name.clone(),
                    resource: resource_label,
                    exit_code: LAUNCH_FAILURE_CODE,
                    duration_secs: 0.0,
                    error: format!("Failed to clone log handle: {}", e),
                };
            }
        };

        let mut cmd = Command::new(&self.program);
        cmd.arg("--prompt")
            .arg(prompt)
            .arg("--max-turns")
            .arg(max_turns.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_err));

        let (env_key, env_value) = spec.resource.env();
        cmd.env(env_key, env_value);
        if let Some(ref model) = spec.model {
            cmd.env("ARENA_MODEL", model);
        }

        info!(agent = %spec.name, program = %self.program, resource = %resource_label, "Launching agent");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(agent = %spec.name, "Launch failure: {}", e);
                return AgentRunOutcome {
                    name: spec.name.clone(),
                    resource: resource_label,
                    exit_code: LAUNCH_FAILURE_CODE,
                    duration_secs: start.elapsed().as_secs_f64(),
                    error: format!("Failed to launch {}: {}", self.program, e),
                };
            }
        };

        let status = child.wait().await;
        let duration_secs = start.elapsed().as_secs_f64();

        match status {
            Ok(status) if status.success() => {
                debug!(agent = %spec.name, "Agent completed cleanly in {:.1}s", duration_secs);
                AgentRunOutcome {
                    name: spec.name.clone(),
                    resource: resource_label,
                    exit_code: 0,
                    duration_secs,
                    error: String::new(),
                }
            }
            Ok(status) => {
                // Killed by signal shows up as no code on unix.
                let code = status.code().unwrap_or(-1);
                let error = self.error_from_log(code);
                warn!(agent = %spec.name, exit_code = code, "Abnormal agent exit: {}", error);
                AgentRunOutcome {
                    name: spec.name.clone(),
                    resource: resource_label,
                    exit_code: code,
                    duration_secs,
                    error,
                }
            }
            Err(e) => AgentRunOutcome {
                name: spec.name.clone(),
                resource: resource_label,
                exit_code: LAUNCH_FAILURE_CODE,
                duration_secs,
                error: format!("Failed waiting on {}: {}", self.program, e),
            },
        }
    }

    fn open_log(&self) -> std::io::Result<std::fs::File> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::File::create(&self.log_path)
    }

    fn error_from_log(&self, exit_code: i32) -> String {
        let contents = std::fs::read_to_string(&self.log_path).unwrap_or_default();
        extract_error_text(&contents)
            .unwrap_or_else(|| format!("Agent exited with code {}", exit_code))
    }
}

/// Best-effort error text from an agent log.
///
/// Prefers the structured trailing `ARENA_ERROR {...}` line; falls back to
/// the last line carrying a conventional error marker, then the last
/// non-empty line.
pub fn extract_error_text(log: &str) -> Option<String> {
    let lines: Vec<&str> = log.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }

    for line in lines.iter().rev() {
        if let Some(rest) = line.trim().strip_prefix(STRUCTURED_ERROR_MARKER) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(rest) {
                if let Some(msg) = value.get("error").and_then(|v| v.as_str()) {
                    return Some(truncate(msg));
                }
            }
        }
    }

    let marker = Regex::new(r"(?i)\b(error|exception|panic|traceback|fatal)\b")
        .expect("static regex");
    if let Some(line) = lines.iter().rev().find(|l| marker.is_match(l)) {
        return Some(truncate(line.trim()));
    }

    Some(truncate(lines.last()?.trim()))
}

fn truncate(s: &str) -> String {
    if s.len() <= ERROR_TEXT_MAX {
        return s.to_string();
    }
    let mut end = ERROR_TEXT_MAX;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}
