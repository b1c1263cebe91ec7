//! Event projection for the streaming wire protocol
//!
//! The orchestrator yields full state snapshots; the projector diffs each
//! snapshot against the previous one and emits only what changed. Clients
//! therefore see a monotone event stream regardless of how often snapshots
//! arrive, and projecting the same snapshot twice emits nothing.

use crate::types::{AgentState, MessageKind};
use serde::{Deserialize, Serialize};

/// One newline-delimited JSON event on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The full plan, emitted once when it first appears
    Plan { steps: Vec<String>, completed: usize },
    /// Cursor advanced
    PlanUpdate { completed: usize },
    /// Intermediate reasoning or progress narration
    Thought { content: String },
    /// Friendly description of a capability invocation
    StepDetail { step_index: usize, detail: String },
    /// Terminal: the synthesized answer
    Answer { content: String },
    /// Terminal: the run failed
    Error { content: String },
}

impl AgentEvent {
    /// Serialize as one NDJSON line, trailing newline included
    pub fn to_ndjson_line(&self) -> serde_json::Result<String> {
        Ok(format!("{}\n", serde_json::to_string(self)?))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Answer { .. } | AgentEvent::Error { .. })
    }
}

/// Stateful snapshot differ
#[derive(Default)]
pub struct EventProjector {
    last_plan: Vec<String>,
    last_cursor: usize,
    seen_messages: usize,
}

impl EventProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `state` against the previously projected snapshot
    pub fn project(&mut self, state: &AgentState) -> Vec<AgentEvent> {
        let mut events = Vec::new();

        let plan: Vec<String> = state.plan.iter().map(|s| s.description.clone()).collect();
        if !plan.is_empty() && plan != self.last_plan {
            events.push(AgentEvent::Plan {
                steps: plan.clone(),
                completed: self.last_cursor,
            });
            self.last_plan = plan;
        }

        if state.cursor != self.last_cursor {
            events.push(AgentEvent::PlanUpdate {
                completed: state.cursor,
            });
            self.last_cursor = state.cursor;
        }

        for message in state.message_trail.iter().skip(self.seen_messages) {
            match message.kind {
                // The visual plan event already carries the plan; the
                // planner's text rendering would be redundant.
                MessageKind::Planner => {}
                MessageKind::Progress | MessageKind::Thought => {
                    events.push(AgentEvent::Thought {
                        content: message.content.clone(),
                    });
                }
                MessageKind::StepDetail => {
                    events.push(AgentEvent::StepDetail {
                        step_index: message.step_index.unwrap_or(state.cursor),
                        detail: message.content.clone(),
                    });
                }
                MessageKind::Answer => {
                    events.push(AgentEvent::Answer {
                        content: message.content.clone(),
                    });
                }
                MessageKind::Error => {
                    events.push(AgentEvent::Error {
                        content: message.content.clone(),
                    });
                }
            }
        }
        self.seen_messages = state.message_trail.len();

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentMessage, Step};
    use serde_json::Map;

    fn state_with_plan() -> AgentState {
        let mut state = AgentState::new("grief");
        state.plan = vec![
            Step::new("one", "search_chapters", Map::new()),
            Step::new("two", "search_principles", Map::new()),
        ];
        state.push_message(AgentMessage::new(
            MessageKind::Planner,
            "I have developed a research plan:\n1. one\n2. two",
        ));
        state
    }

    #[test]
    fn test_plan_emitted_once() {
        let mut projector = EventProjector::new();
        let state = state_with_plan();

        let events = projector.project(&state);
        assert_eq!(
            events,
            vec![AgentEvent::Plan {
                steps: vec!["one".into(), "two".into()],
                completed: 0
            }]
        );

        // Same snapshot again: nothing new.
        assert!(projector.project(&state).is_empty());
    }

    #[test]
    fn test_cursor_advance_yields_plan_update() {
        let mut projector = EventProjector::new();
        let mut state = state_with_plan();
        projector.project(&state);

        state.cursor = 1;
        state.push_message(AgentMessage::new(
            MessageKind::Progress,
            "Completed Step 1: one",
        ));

        let events = projector.project(&state);
        assert_eq!(events[0], AgentEvent::PlanUpdate { completed: 1 });
        assert_eq!(
            events[1],
            AgentEvent::Thought {
                content: "Completed Step 1: one".into()
            }
        );
    }

    #[test]
    fn test_planner_messages_are_suppressed() {
        let mut projector = EventProjector::new();
        let state = state_with_plan();
        let events = projector.project(&state);
        assert!(events
            .iter()
            .all(|e| !matches!(e, AgentEvent::Thought { .. })));
    }

    #[test]
    fn test_step_detail_and_answer_mapping() {
        let mut projector = EventProjector::new();
        let mut state = state_with_plan();
        projector.project(&state);

        state.push_message(AgentMessage::step_detail(0, "Searching wisdom for 'grief'"));
        state.push_message(AgentMessage::new(MessageKind::Answer, "final text"));

        let events = projector.project(&state);
        assert_eq!(
            events,
            vec![
                AgentEvent::StepDetail {
                    step_index: 0,
                    detail: "Searching wisdom for 'grief'".into()
                },
                AgentEvent::Answer {
                    content: "final text".into()
                },
            ]
        );
        assert!(events[1].is_terminal());
    }

    #[test]
    fn test_wire_format() {
        let line = AgentEvent::Plan {
            steps: vec!["one".into()],
            completed: 0,
        }
        .to_ndjson_line()
        .unwrap();
        assert_eq!(line, "{\"type\":\"plan\",\"steps\":[\"one\"],\"completed\":0}\n");

        let line = AgentEvent::StepDetail {
            step_index: 2,
            detail: "d".into(),
        }
        .to_ndjson_line()
        .unwrap();
        assert_eq!(
            line,
            "{\"type\":\"step_detail\",\"step_index\":2,\"detail\":\"d\"}\n"
        );
    }
}
