//! Rishi Agent Library
//!
//! The plan-and-execute research engine:
//! - `planner` turns a query into a 3-7 step research plan
//! - `executor` runs one capability per step with inline error capture
//! - `ranker` retrieves and curates evidence for principle lookups
//! - `synthesizer` writes the final scholarly answer
//! - `orchestrator` drives the whole run and streams state snapshots
//! - `events` projects snapshots into the NDJSON wire protocol

pub mod capability;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod ranker;
pub mod services;
pub mod synthesizer;
pub mod types;

pub use capability::CapabilityKind;
pub use events::{AgentEvent, EventProjector};
pub use orchestrator::{NextAction, Orchestrator, CEILING_APOLOGY};
pub use ranker::EvidenceRanker;
pub use services::ResearchServices;
pub use types::{AgentMessage, AgentState, MessageKind, Plan, ResearchLogEntry, Step};
