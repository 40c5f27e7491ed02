//! engine-client
//!
//! Client-side session and load machinery for the matching engine:
//!
//! - [`session`] : transport + codec composed into a bidirectional
//!   session with protocol auto-discovery and bounded receives.
//! - [`scenario`] : scripted load scenarios with deterministic pacing
//!   and a completeness verdict.
//! - [`stats`] : response-stream tallies the scenarios validate.
//!
//! The REPL binary in `main.rs` is a thin shell over these APIs; the
//! library itself never spawns background tasks.

pub mod scenario;
pub mod session;
pub mod stats;

pub use scenario::{run_scenario, FailureReason, ScenarioOutcome};
pub use session::{Incoming, MalformedPayload, Protocol, Session};
pub use stats::ScenarioStats;
