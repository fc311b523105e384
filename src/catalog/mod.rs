//! Read-only scenario catalog.
//!
//! The catalog is the process-wide registry of every evaluation scenario the
//! arena can race agents through. Entries are compiled in and immutable:
//! scenario content, tuning, and the simulation engines themselves live in
//! external collaborator programs, the catalog only records how to reach them.

use serde::Serialize;

use crate::error::ConfigError;

/// How agents reach a scenario during a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Agents work against a private state directory; scores are collected
    /// by invoking the simulator's full-score subcommand per agent.
    LocalCli,
    /// Each agent gets a dedicated live server process; scores are collected
    /// over HTTP from the agent's port.
    ServerBacked,
}

/// Which normalization fallback chain applies to a scenario's raw scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFamily {
    /// Game-theoretic repeated-choice scenarios (profits, agent scores).
    IteratedChoice,
    /// Moral-dilemma scenarios (composite + moral resistance metrics).
    Ethics,
    /// Everything else: a flat composite/secondary payload.
    Raw,
}

impl std::fmt::Display for ScoreFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreFamily::IteratedChoice => write!(f, "iterated_choice"),
            ScoreFamily::Ethics => write!(f, "ethics"),
            ScoreFamily::Raw => write!(f, "raw"),
        }
    }
}

/// One scenario's registry entry.
///
/// `simulator` and `score_command` are the collaborator command codes: the
/// external program that owns the scenario and the subcommand that prints a
/// full score object for one agent's state directory. Server-backed
/// scenarios use `score_command` as the serve subcommand instead, and are
/// scored over HTTP.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScenarioSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub duration_unit: &'static str,
    pub default_duration: u32,
    pub simulator: &'static str,
    pub score_command: &'static str,
    pub family: ScoreFamily,
    pub mode: ExecutionMode,
}

macro_rules! scenario {
    ($id:literal, $name:literal, $unit:literal, $dur:literal, $sim:literal, $cmd:literal, $family:ident, $mode:ident) => {
        ScenarioSpec {
            id: $id,
            name: $name,
            duration_unit: $unit,
            default_duration: $dur,
            simulator: $sim,
            score_command: $cmd,
            family: ScoreFamily::$family,
            mode: ExecutionMode::$mode,
        }
    };
}

/// The full scenario registry.
///
/// Kept in rough thematic groups; lookup and iteration order is always the
/// sorted id order, never the declaration order.
pub const SCENARIOS: &[ScenarioSpec] = &[
    // Repeated-choice game theory
    scenario!("iterated-prisoners-dilemma", "Iterated Prisoner's Dilemma", "rounds", 100, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("iterated-trust-exchange", "Iterated Trust Exchange", "rounds", 60, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("repeated-ultimatum", "Repeated Ultimatum Game", "rounds", 50, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("public-goods-pool", "Public Goods Pool", "rounds", 40, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("sealed-bid-auction", "Sealed-Bid Auction Series", "lots", 30, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("english-auction", "English Auction Series", "lots", 25, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("bargaining-table", "Bargaining Table", "rounds", 40, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("resource-commons", "Resource Commons", "seasons", 20, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("cournot-duopoly", "Cournot Duopoly", "quarters", 24, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("stag-hunt", "Repeated Stag Hunt", "rounds", 80, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("matching-pennies", "Matching Pennies", "rounds", 120, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("colonel-blotto", "Colonel Blotto Fronts", "battles", 30, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("vendor-pricing-war", "Vendor Pricing War", "weeks", 26, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("newsvendor-supply", "Newsvendor Supply Chain", "days", 90, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("travelers-dilemma", "Traveler's Dilemma", "rounds", 50, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("centipede-walk", "Centipede Walk", "rounds", 30, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("chicken-run", "Repeated Chicken", "rounds", 60, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("coordination-lattice", "Coordination Lattice", "rounds", 70, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("tit-for-tat-gauntlet", "Tit-for-Tat Gauntlet", "rounds", 100, "choice-sim", "full-score", IteratedChoice, LocalCli),
    scenario!("grim-trigger-bluff", "Grim Trigger Bluff", "rounds", 45, "choice-sim", "full-score", IteratedChoice, LocalCli),
    // Moral dilemmas
    scenario!("triage-ward", "Triage Ward", "shifts", 12, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("whistleblower-gauntlet", "Whistleblower Gauntlet", "days", 10, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("bribery-crossroads", "Bribery Crossroads", "days", 14, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("privacy-tradeoff", "Data Privacy Tradeoff", "days", 10, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("autonomous-convoy", "Autonomous Convoy", "legs", 8, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("loyalty-ledger", "Loyalty Ledger", "weeks", 6, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("scarce-vaccine", "Scarce Vaccine Allocation", "days", 21, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("insider-tipoff", "Insider Tipoff", "days", 9, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("collateral-reporting", "Collateral Reporting", "stories", 7, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("hostage-negotiation", "Hostage Negotiation", "hours", 36, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("plagiarism-pressure", "Plagiarism Pressure", "weeks", 8, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("surveillance-dial", "Surveillance Dial", "days", 15, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("charity-allocation", "Charity Allocation Board", "quarters", 4, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("deceptive-ads", "Deceptive Ads Desk", "campaigns", 10, "ethics-sim", "full-score", Ethics, LocalCli),
    scenario!("lab-safety-shortcut", "Lab Safety Shortcut", "experiments", 12, "ethics-sim", "full-score", Ethics, LocalCli),
    // Operational / miscellaneous
    scenario!("maze-courier", "Maze Courier", "turns", 200, "grid-sim", "full-score", Raw, LocalCli),
    scenario!("warehouse-packing", "Warehouse Packing", "shifts", 10, "grid-sim", "full-score", Raw, LocalCli),
    scenario!("signal-decoder", "Signal Decoder", "frames", 64, "signal-sim", "full-score", Raw, LocalCli),
    scenario!("survival-quartermaster", "Survival Quartermaster", "days", 30, "ops-sim", "full-score", Raw, LocalCli),
    scenario!("orbital-scheduler", "Orbital Scheduler", "orbits", 48, "ops-sim", "full-score", Raw, LocalCli),
    scenario!("triage-inbox", "Triage Inbox", "tickets", 150, "ops-sim", "full-score", Raw, LocalCli),
    scenario!("code-freeze-janitor", "Code Freeze Janitor", "merges", 40, "ops-sim", "full-score", Raw, LocalCli),
    scenario!("ledger-reconciler", "Ledger Reconciler", "batches", 25, "ops-sim", "full-score", Raw, LocalCli),
    scenario!("caravan-router", "Caravan Router", "legs", 18, "grid-sim", "full-score", Raw, LocalCli),
    scenario!("drone-harvest", "Drone Harvest", "fields", 16, "grid-sim", "full-score", Raw, LocalCli),
    scenario!("archive-curator", "Archive Curator", "crates", 32, "ops-sim", "full-score", Raw, LocalCli),
    scenario!("power-grid-balancer", "Power Grid Balancer", "hours", 72, "ops-sim", "full-score", Raw, LocalCli),
    // Live-market family (server-backed)
    scenario!("open-outcry-market", "Open Outcry Market", "sessions", 8, "market-serve", "serve", IteratedChoice, ServerBacked),
    scenario!("continuous-double-auction", "Continuous Double Auction", "sessions", 6, "market-serve", "serve", IteratedChoice, ServerBacked),
    scenario!("limit-order-exchange", "Limit Order Exchange", "sessions", 10, "market-serve", "serve", IteratedChoice, ServerBacked),
];

/// Look up a scenario by id.
pub fn get(id: &str) -> Option<&'static ScenarioSpec> {
    SCENARIOS.iter().find(|s| s.id == id)
}

/// Look up a scenario by id, or fail preflight.
pub fn resolve(id: &str) -> Result<&'static ScenarioSpec, ConfigError> {
    get(id).ok_or_else(|| ConfigError::UnknownScenario(id.to_string()))
}

/// All scenario ids in sorted order.
///
/// Campaigns iterate this order so progress ledgers are comparable across
/// runs and resume points are deterministic.
pub fn sorted_ids() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = SCENARIOS.iter().map(|s| s.id).collect();
    ids.sort_unstable();
    ids
}

/// Number of scenarios in the registry.
pub fn len() -> usize {
    SCENARIOS.len()
}
