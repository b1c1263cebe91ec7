//! Core data model for a research run
//!
//! A run is a strictly sequential plan-and-execute pipeline over an
//! immutable query. The state invariants:
//! - `0 <= cursor <= plan.len()`
//! - `log.len() == cursor` after every transition
//! - the plan is never mutated once generated

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One planned research step
///
/// `capability_name` stays a raw string deliberately: a name outside the
/// registry survives planning and fails at execution time, as per-step
/// evidence text rather than a run abort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Human-readable task description
    pub description: String,

    /// Capability to invoke, as named by the planner
    #[serde(rename = "tool")]
    pub capability_name: String,

    /// Arguments forwarded to the capability
    #[serde(rename = "args", default)]
    pub capability_args: Map<String, Value>,
}

impl Step {
    pub fn new(description: &str, capability_name: &str, args: Map<String, Value>) -> Self {
        Self {
            description: description.to_string(),
            capability_name: capability_name.to_string(),
            capability_args: args,
        }
    }
}

/// An immutable ordered list of steps, length 3-7 once generated
pub type Plan = Vec<Step>;

/// One append-only research log entry; exactly one per executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchLogEntry {
    /// Zero-based index of the step that produced this entry
    pub step_index: usize,

    /// The step description at the time of execution
    pub description: String,

    /// Raw evidence text, including inline error text for failed steps
    pub raw_evidence_text: String,
}

impl ResearchLogEntry {
    /// Render as the block fed into synthesis
    pub fn rendered(&self) -> String {
        format!(
            "## Step {}: {}\nResult: {}\n",
            self.step_index + 1,
            self.description,
            self.raw_evidence_text
        )
    }
}

/// Classification of a message on the trail
///
/// Typed kinds replace positional guessing about who produced a message:
/// the producer states what it is emitting at the point of emission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Planner narration of the generated plan
    Planner,
    /// Per-step completion notice
    Progress,
    /// Intermediate reasoning surfaced to the client
    Thought,
    /// Human-friendly description of a capability invocation
    StepDetail,
    /// The final synthesized answer, exactly one per successful run
    Answer,
    /// Terminal run failure
    Error,
}

/// One message on the append-only trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub kind: MessageKind,
    pub content: String,
    /// Set for `StepDetail` messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
}

impl AgentMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            step_index: None,
        }
    }

    pub fn step_detail(step_index: usize, content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::StepDetail,
            content: content.into(),
            step_index: Some(step_index),
        }
    }
}

/// Full run state; snapshots of this are what the orchestrator streams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// The user's research question, immutable for the whole run
    pub query: String,

    /// Generated plan; empty until planning completes
    pub plan: Plan,

    /// Index of the next step to execute
    pub cursor: usize,

    /// Append-only evidence log, one entry per executed step
    pub log: Vec<ResearchLogEntry>,

    /// Append-only message trail
    pub message_trail: Vec<AgentMessage>,
}

impl AgentState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            plan: Vec::new(),
            cursor: 0,
            log: Vec::new(),
            message_trail: Vec::new(),
        }
    }

    /// Research findings as fed to the synthesizer: rendered log entries
    /// joined by blank lines, in execution order.
    pub fn research_findings(&self) -> String {
        self.log
            .iter()
            .map(ResearchLogEntry::rendered)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn push_message(&mut self, message: AgentMessage) {
        self.message_trail.push(message);
    }
}

/// One retrieval hit before classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceCandidate {
    /// Stable verse identifier from the index payload
    pub identifier: String,
    pub kanda: String,
    pub sarga: i64,
    /// Absent for sarga-level points
    pub shloka: Option<i64>,
    /// Cosine similarity against the query
    pub score: f32,
    /// Original Sanskrit line
    pub text: String,
    pub translation: String,
    pub explanation: String,
}

/// A candidate with its classification verdict attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEvidence {
    #[serde(flatten)]
    pub candidate: EvidenceCandidate,
    pub keep: bool,
    pub category: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modern_take: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_rendering() {
        let entry = ResearchLogEntry {
            step_index: 0,
            description: "Find grief verses".into(),
            raw_evidence_text: "three verses found".into(),
        };
        assert_eq!(
            entry.rendered(),
            "## Step 1: Find grief verses\nResult: three verses found\n"
        );
    }

    #[test]
    fn test_research_findings_joined_by_blank_lines() {
        let mut state = AgentState::new("grief");
        for i in 0..2 {
            state.log.push(ResearchLogEntry {
                step_index: i,
                description: format!("task {}", i + 1),
                raw_evidence_text: "ok".into(),
            });
        }
        let findings = state.research_findings();
        assert!(findings.contains("## Step 1: task 1"));
        assert!(findings.contains("\n\n## Step 2: task 2"));
    }

    #[test]
    fn test_step_deserializes_from_planner_json() {
        let step: Step = serde_json::from_value(serde_json::json!({
            "description": "Macro view of prosperity",
            "tool": "search_chapters",
            "args": {"query": "prosperity in Ayodhya"}
        }))
        .unwrap();
        assert_eq!(step.capability_name, "search_chapters");
        assert_eq!(step.capability_args["query"], "prosperity in Ayodhya");
    }
}
