//! Run orchestration
//!
//! Drives a research run through its phases, Start to Done, with no
//! backward edges. The run executes as a spawned task that yields a full
//! state snapshot after every transition; dropping the receiver cancels
//! delivery and, with it, the run. The only other termination mechanism is
//! the transition ceiling.

use crate::executor::StepExecutor;
use crate::planner::{render_plan_message, PlanGenerator};
use crate::services::ResearchServices;
use crate::synthesizer::Synthesizer;
use crate::types::{AgentMessage, AgentState, MessageKind};
use metrics::{counter, histogram};
use std::time::Instant;
use tokio::sync::mpsc;

/// Shown instead of a raw error when the ceiling cuts a run short
pub const CEILING_APOLOGY: &str = "My deep research is taking longer than expected. \
Please try refining your query or asking again.";

/// What the run should do next given the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// More plan steps remain
    Continue,
    /// All steps executed; hand the log to the synthesizer
    Synthesize,
}

pub struct Orchestrator {
    services: ResearchServices,
}

impl Orchestrator {
    pub fn new(services: ResearchServices) -> Self {
        Self { services }
    }

    /// Continuation check; synthesize exactly when the cursor has reached
    /// the end of the plan (including the empty plan).
    pub fn next_action(state: &AgentState) -> NextAction {
        if state.cursor < state.plan.len() {
            NextAction::Continue
        } else {
            NextAction::Synthesize
        }
    }

    /// Start a run as a background task; returns the snapshot stream.
    pub fn spawn_run(&self, query: String) -> mpsc::Receiver<AgentState> {
        let (tx, rx) = mpsc::channel(32);
        let services = self.services.clone();
        tokio::spawn(async move {
            run(services, query, tx).await;
        });
        rx
    }
}

async fn run(services: ResearchServices, query: String, tx: mpsc::Sender<AgentState>) {
    counter!("rishi_runs_total").increment(1);
    let started = Instant::now();

    let mut state = AgentState::new(&query);
    let ceiling = services.config.agent.run_ceiling;
    let mut transitions: u32 = 0;

    tracing::info!(query, "Research run started");

    // Planning
    transitions += 1;
    let planner = PlanGenerator::new(services.clone());
    match planner.generate(&query).await {
        Ok(plan) => {
            let narration = render_plan_message(&plan);
            state.plan = plan;
            state.push_message(AgentMessage::new(MessageKind::Planner, narration));
        }
        Err(e) => {
            tracing::error!(error = %e, "Planning failed, aborting run");
            state.push_message(AgentMessage::new(
                MessageKind::Error,
                format!("System Error: {}", e),
            ));
            let _ = tx.send(state).await;
            return;
        }
    }
    if tx.send(state.clone()).await.is_err() {
        return;
    }

    // Executing
    let executor = StepExecutor::new(services.clone());
    while Orchestrator::next_action(&state) == NextAction::Continue {
        transitions += 1;
        if transitions > ceiling {
            abort_over_ceiling(&mut state, ceiling, &tx).await;
            return;
        }
        executor.advance(&mut state).await;
        if tx.send(state.clone()).await.is_err() {
            return;
        }
    }

    // Synthesizing
    transitions += 1;
    if transitions > ceiling {
        abort_over_ceiling(&mut state, ceiling, &tx).await;
        return;
    }
    let synthesizer = Synthesizer::new(services);
    match synthesizer
        .synthesize(&state.query, &state.research_findings())
        .await
    {
        Ok(answer) => {
            state.push_message(AgentMessage::new(MessageKind::Answer, answer));
        }
        Err(e) => {
            tracing::error!(error = %e, "Synthesis failed");
            state.push_message(AgentMessage::new(
                MessageKind::Error,
                format!("System Error: {}", e),
            ));
        }
    }

    histogram!("rishi_run_duration_seconds").record(started.elapsed().as_secs_f64());
    tracing::info!(
        steps = state.log.len(),
        transitions,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Research run finished"
    );
    let _ = tx.send(state).await;
}

async fn abort_over_ceiling(state: &mut AgentState, ceiling: u32, tx: &mpsc::Sender<AgentState>) {
    counter!("rishi_runs_aborted_total").increment(1);
    tracing::warn!(ceiling, "Run exceeded the transition ceiling");
    state.push_message(AgentMessage::new(MessageKind::Answer, CEILING_APOLOGY));
    let _ = tx.send(state.clone()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AgentEvent, EventProjector};
    use crate::types::Step;
    use rishi_common::config::AppConfig;
    use rishi_common::corpus::{MemoryCorpus, Verse};
    use rishi_common::embeddings::MockEmbedder;
    use rishi_common::llm::{ChatModel, MockChat};
    use rishi_common::vector::MemoryIndex;
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    fn grief_corpus() -> MemoryCorpus {
        MemoryCorpus::with_verses(vec![Verse {
            id: 0,
            source_id: "ramayana".into(),
            kanda: "Ayodhya Kanda".into(),
            sarga: 10,
            verse_number: 6,
            text: "sanskrit-6".into(),
            translation: "Grief seized the city.".into(),
            explanation: "The citizens grieve at the news.".into(),
            speaker: None,
        }])
    }

    fn services(chat: Option<Arc<dyn ChatModel>>, config: AppConfig) -> ResearchServices {
        ResearchServices::new(
            Arc::new(grief_corpus()),
            Arc::new(MemoryIndex::new()),
            Arc::new(MockEmbedder::new(16)),
            chat,
            config,
        )
    }

    fn narrative_plan_json(tools: &[&str]) -> String {
        let steps: Vec<Value> = tools
            .iter()
            .enumerate()
            .map(|(i, tool)| {
                json!({
                    "description": format!("task {}", i + 1),
                    "tool": tool,
                    "args": {"query": "grief"}
                })
            })
            .collect();
        json!({ "steps": steps }).to_string()
    }

    async fn drain(mut rx: mpsc::Receiver<AgentState>) -> Vec<AgentState> {
        let mut snapshots = Vec::new();
        while let Some(state) = rx.recv().await {
            snapshots.push(state);
        }
        snapshots
    }

    #[tokio::test]
    async fn test_three_step_run_end_to_end() {
        let chat: Arc<dyn ChatModel> = Arc::new(MockChat::scripted(vec![
            Ok(narrative_plan_json(&[
                "search_narrative",
                "search_narrative",
                "search_narrative",
            ])),
            Ok("FINAL ANSWER".into()),
        ]));
        let orchestrator = Orchestrator::new(services(Some(chat), AppConfig::default()));

        let snapshots = drain(orchestrator.spawn_run("grief".into())).await;
        let last = snapshots.last().unwrap();

        assert_eq!(last.plan.len(), 3);
        assert_eq!(last.cursor, 3);
        assert_eq!(last.log.len(), 3);
        for (i, entry) in last.log.iter().enumerate() {
            assert_eq!(entry.step_index, i);
        }

        // The synthesis input is the ordered log joined by blank lines.
        let findings = last.research_findings();
        let p1 = findings.find("## Step 1:").unwrap();
        let p2 = findings.find("## Step 2:").unwrap();
        let p3 = findings.find("## Step 3:").unwrap();
        assert!(p1 < p2 && p2 < p3);

        let answer = last
            .message_trail
            .iter()
            .find(|m| m.kind == MessageKind::Answer)
            .unwrap();
        assert_eq!(answer.content, "FINAL ANSWER");
    }

    #[tokio::test]
    async fn test_unknown_tool_step_does_not_sink_the_run() {
        let chat: Arc<dyn ChatModel> = Arc::new(MockChat::scripted(vec![
            Ok(narrative_plan_json(&[
                "search_narrative",
                "search_commentary",
                "search_narrative",
            ])),
            Ok("FINAL ANSWER".into()),
        ]));
        let orchestrator = Orchestrator::new(services(Some(chat), AppConfig::default()));

        let snapshots = drain(orchestrator.spawn_run("grief".into())).await;
        let last = snapshots.last().unwrap();

        assert_eq!(last.cursor, 3);
        assert_eq!(
            last.log[1].raw_evidence_text,
            "Error: Tool 'search_commentary' not found."
        );
        assert!(last
            .message_trail
            .iter()
            .any(|m| m.kind == MessageKind::Answer));
    }

    #[tokio::test]
    async fn test_ceiling_aborts_with_apology() {
        let mut config = AppConfig::default();
        config.agent.run_ceiling = 2;
        // Degraded mode: fallback plan of 3 steps, so the ceiling trips
        // mid-execution.
        let orchestrator = Orchestrator::new(services(None, config));

        let snapshots = drain(orchestrator.spawn_run("grief".into())).await;
        let last = snapshots.last().unwrap();

        let answer = last
            .message_trail
            .iter()
            .find(|m| m.kind == MessageKind::Answer)
            .unwrap();
        assert_eq!(answer.content, CEILING_APOLOGY);
        assert!(last.cursor < last.plan.len());
    }

    #[tokio::test]
    async fn test_planning_failure_is_terminal_error() {
        let chat: Arc<dyn ChatModel> =
            Arc::new(MockChat::scripted(vec![Err("upstream down".into())]));
        let orchestrator = Orchestrator::new(services(Some(chat), AppConfig::default()));

        let snapshots = drain(orchestrator.spawn_run("grief".into())).await;
        let last = snapshots.last().unwrap();

        assert!(last.plan.is_empty());
        let error = last
            .message_trail
            .iter()
            .find(|m| m.kind == MessageKind::Error)
            .unwrap();
        assert!(error.content.starts_with("System Error:"));
    }

    #[test]
    fn test_next_action_at_plan_end() {
        let mut state = AgentState::new("grief");
        assert_eq!(Orchestrator::next_action(&state), NextAction::Synthesize);

        state.plan = vec![Step::new("one", "search_narrative", Map::new())];
        assert_eq!(Orchestrator::next_action(&state), NextAction::Continue);

        state.cursor = 1;
        assert_eq!(Orchestrator::next_action(&state), NextAction::Synthesize);
    }

    #[tokio::test]
    async fn test_projected_stream_shape() {
        let chat: Arc<dyn ChatModel> = Arc::new(MockChat::scripted(vec![
            Ok(narrative_plan_json(&["search_narrative", "search_narrative", "search_narrative"])),
            Ok("FINAL ANSWER".into()),
        ]));
        let orchestrator = Orchestrator::new(services(Some(chat), AppConfig::default()));

        let snapshots = drain(orchestrator.spawn_run("grief".into())).await;
        let mut projector = EventProjector::new();
        let events: Vec<AgentEvent> = snapshots
            .iter()
            .flat_map(|s| projector.project(s))
            .collect();

        // Exactly one plan event, first on the stream.
        assert!(matches!(events[0], AgentEvent::Plan { .. }));
        let plan_count = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::Plan { .. }))
            .count();
        assert_eq!(plan_count, 1);

        // One plan_update per executed step.
        let updates = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::PlanUpdate { .. }))
            .count();
        assert_eq!(updates, 3);

        // The stream terminates with the answer.
        assert!(matches!(
            events.last().unwrap(),
            AgentEvent::Answer { .. }
        ));
    }
}
