//! Error types for agent-arena subsystems.
//!
//! Defines error types for the major subsystems:
//! - Race configuration and preflight
//! - Score collection from scenario collaborators
//! - Server readiness in server-backed races
//! - Race record and campaign ledger persistence

use std::time::Duration;

use thiserror::Error;

/// Errors raised during preflight, before any process is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No agents specified for this race")]
    NoAgents,

    #[error("Unknown scenario id '{0}'")]
    UnknownScenario(String),

    #[error("Unknown agent '{0}' (not in the known-agent set)")]
    UnknownAgent(String),

    #[error("No binary configured for agent kind '{0}'")]
    MissingBinary(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while collecting a score from a scenario collaborator.
///
/// These are always downgraded to zero-score fallback rows by the race
/// modes; they never abort a race.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Score collection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Score command exited with code {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error("Malformed score payload: {0}")]
    Malformed(String),

    #[error("Score endpoint request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while bringing up scenario servers.
///
/// Fatal for the race: triggers teardown of every sibling server.
#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("Server on port {port} not live after {attempts} attempts")]
    Timeout { port: u16, attempts: u32 },

    #[error("Failed to spawn server on port {port}: {message}")]
    Spawn { port: u16, message: String },
}

/// Errors raised by the race record store.
///
/// Propagated, never swallowed: losing the audit trail is worse than
/// crashing.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the campaign progress ledger and event log.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ledger schema version {found} is newer than supported version {supported}")]
    SchemaVersion { found: u32, supported: u32 },
}
