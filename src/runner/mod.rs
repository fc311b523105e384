//! Agent process launching for races.
//!
//! `agent` spawns and classifies one external agent process; `pool` runs a
//! whole race's worth of them in parallel and harvests completions in
//! arrival order.

pub mod agent;
pub mod pool;

pub use agent::{
    AgentKind, AgentResource, AgentRunOutcome, AgentRunner, AgentSpec, LAUNCH_FAILURE_CODE,
};
pub use pool::{run_all, AgentLaunch};
