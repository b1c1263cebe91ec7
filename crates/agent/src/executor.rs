//! Step execution
//!
//! Advances the run by exactly one step per call. Every failure mode of a
//! capability (unknown name, execution error, panic, timeout) is converted
//! to inline evidence text; execution never propagates an error, so one bad
//! step cannot sink the run. The cursor advances unconditionally.

use crate::capability::{describe_invocation, CapabilityKind};
use crate::services::ResearchServices;
use crate::types::{AgentMessage, AgentState, MessageKind, ResearchLogEntry};
use metrics::counter;
use serde_json::Value;

pub struct StepExecutor {
    services: ResearchServices,
}

impl StepExecutor {
    pub fn new(services: ResearchServices) -> Self {
        Self { services }
    }

    /// Execute the step under the cursor, append its log entry, and advance.
    /// No-op when the cursor is already past the plan.
    pub async fn advance(&self, state: &mut AgentState) {
        let cursor = state.cursor;
        if cursor >= state.plan.len() {
            return;
        }
        let step = state.plan[cursor].clone();
        let step_no = cursor + 1;

        tracing::info!(
            step = step_no,
            total = state.plan.len(),
            capability = %step.capability_name,
            "Executing step"
        );

        state.push_message(AgentMessage::new(
            MessageKind::Thought,
            format!(
                "Invoking: {}({})...",
                step.capability_name,
                Value::Object(step.capability_args.clone())
            ),
        ));
        state.push_message(AgentMessage::step_detail(
            cursor,
            describe_invocation(&step.capability_name, &step.capability_args),
        ));

        counter!("rishi_steps_executed_total").increment(1);
        let evidence = self.run_capability(&step.capability_name, &step).await;

        state.log.push(ResearchLogEntry {
            step_index: cursor,
            description: step.description.clone(),
            raw_evidence_text: evidence,
        });
        state.cursor += 1;
        state.push_message(AgentMessage::new(
            MessageKind::Progress,
            format!("Completed Step {}: {}", step_no, step.description),
        ));
    }

    async fn run_capability(&self, name: &str, step: &crate::types::Step) -> String {
        let kind = match name.parse::<CapabilityKind>() {
            Ok(kind) => kind,
            Err(e) => {
                counter!("rishi_step_failures_total").increment(1);
                return format!("Error: {}.", e);
            }
        };

        // The capability runs in its own task so a panic surfaces as a
        // join error instead of unwinding through the run.
        let services = self.services.clone();
        let args = step.capability_args.clone();
        let handle = tokio::spawn(async move { kind.execute(&services, &args).await });

        let timeout = self.services.config.step_timeout();
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(Ok(text))) => text,
            Ok(Ok(Err(e))) => {
                counter!("rishi_step_failures_total").increment(1);
                format!("Error executing {}: {}", name, e)
            }
            Ok(Err(join_err)) => {
                counter!("rishi_step_failures_total").increment(1);
                tracing::error!(capability = name, error = %join_err, "Capability panicked");
                format!("Error executing {}: {}", name, join_err)
            }
            Err(_) => {
                counter!("rishi_step_failures_total").increment(1);
                format!(
                    "Error executing {}: timed out after {}s",
                    name,
                    timeout.as_secs()
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Step;
    use rishi_common::config::AppConfig;
    use rishi_common::corpus::MemoryCorpus;
    use rishi_common::embeddings::MockEmbedder;
    use rishi_common::vector::MemoryIndex;
    use serde_json::{json, Map};
    use std::sync::Arc;

    fn services() -> ResearchServices {
        ResearchServices::new(
            Arc::new(MemoryCorpus::new()),
            Arc::new(MemoryIndex::new()),
            Arc::new(MockEmbedder::new(16)),
            None,
            AppConfig::default(),
        )
    }

    fn query_args() -> Map<String, serde_json::Value> {
        json!({"query": "duty"}).as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_unknown_capability_fails_inline_and_advances() {
        let executor = StepExecutor::new(services());
        let mut state = AgentState::new("duty");
        state.plan = vec![Step::new(
            "Consult the commentary",
            "search_commentary",
            query_args(),
        )];

        executor.advance(&mut state).await;

        assert_eq!(state.cursor, 1);
        assert_eq!(state.log.len(), 1);
        assert_eq!(
            state.log[0].raw_evidence_text,
            "Error: Tool 'search_commentary' not found."
        );
        let progress = state
            .message_trail
            .iter()
            .find(|m| m.kind == MessageKind::Progress)
            .unwrap();
        assert_eq!(progress.content, "Completed Step 1: Consult the commentary");
    }

    #[tokio::test]
    async fn test_capability_error_is_captured_inline() {
        let executor = StepExecutor::new(services());
        let mut state = AgentState::new("duty");
        // Missing required args makes the capability itself fail.
        state.plan = vec![Step::new("Read context", "get_verse_context", Map::new())];

        executor.advance(&mut state).await;

        assert_eq!(state.cursor, 1);
        assert!(state.log[0]
            .raw_evidence_text
            .starts_with("Error executing get_verse_context:"));
    }

    #[tokio::test]
    async fn test_log_stays_in_lockstep_with_cursor() {
        let executor = StepExecutor::new(services());
        let mut state = AgentState::new("duty");
        state.plan = vec![
            Step::new("one", "search_narrative", query_args()),
            Step::new("two", "search_narrative", query_args()),
            Step::new("three", "search_narrative", query_args()),
        ];

        for expected in 1..=3 {
            executor.advance(&mut state).await;
            assert_eq!(state.cursor, expected);
            assert_eq!(state.log.len(), expected);
        }
        assert_eq!(state.log[2].step_index, 2);

        // Past the plan end the executor is a no-op.
        executor.advance(&mut state).await;
        assert_eq!(state.cursor, 3);
        assert_eq!(state.log.len(), 3);
    }

    #[tokio::test]
    async fn test_step_emits_thought_and_detail() {
        let executor = StepExecutor::new(services());
        let mut state = AgentState::new("duty");
        state.plan = vec![Step::new("wisdom", "search_narrative", query_args())];

        executor.advance(&mut state).await;

        let thought = state
            .message_trail
            .iter()
            .find(|m| m.kind == MessageKind::Thought)
            .unwrap();
        assert!(thought.content.starts_with("Invoking: search_narrative("));
        assert!(thought.content.ends_with(")..."));

        let detail = state
            .message_trail
            .iter()
            .find(|m| m.kind == MessageKind::StepDetail)
            .unwrap();
        assert_eq!(detail.step_index, Some(0));
        assert_eq!(detail.content, "Searching stories for 'duty'");
    }
}
