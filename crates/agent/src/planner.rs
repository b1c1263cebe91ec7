//! Plan generation
//!
//! One structured-output chat call turns the user query into 3-7 research
//! steps. Unusable planner output (malformed JSON, too few steps) falls
//! back to a fixed macro-to-micro plan; a failed or timed-out call aborts
//! the run.

use crate::services::ResearchServices;
use crate::types::{Plan, Step};
use rishi_common::errors::{AppError, Result};
use rishi_common::llm::ChatOptions;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const PLANNER_SYSTEM_PROMPT: &str = r#"You are the 'Strategist' for a Ramayana AI Scholar.
Your goal is to break down a complex user query into a logical research plan.

### **HIERARCHICAL RESEARCH (CRITICAL)**:
1.  **Macro-to-Micro**: If the user asks a broad thematic question (e.g., 'Prosperity', 'Grief', 'City life'), your first step MUST use `search_chapters` to get the big picture.
2.  **Narrowing Down**: Use the chapter summaries to decide which specific Kandas/Sargas to search for verses in.
3.  **Fact-Driven**: Do NOT assume modern interpretations. Search for the root cause in the Valmiki Ramayana text.
4.  **Cross-Reference**: Always include a step using `search_principles` or `search_narrative` *after* you have the chapter context.

### AVAILABLE TOOLS
- search_chapters(query): thematic summaries of whole Sargas
- search_principles(query): curated wisdom verses with modern takes
- search_narrative(query, speaker?): keyword search over story events
- get_verse_context(kanda, sarga, verse_number, window?): surrounding verses

### GUIDELINES
1.  **Analyze**: Identify the core *conflict* or *dilemma*.
2.  **Bridge to Archetypes**: Map the modern problem to specific Ramayana episodes.
3.  **Plan Tasks**: Create 3-7 unique, directed research steps.

### EXAMPLE
Query: "How was the prosperity in Dasharatha's rule?"
{
  "steps": [
    {"description": "Get a macro view of Ayodhya's prosperity in Bala Kanda and Ayodhya Kanda",
     "tool": "search_chapters", "args": {"query": "prosperity of Ayodhya under Dasharatha"}},
    {"description": "Find specific verses describing the city's wealth and citizens",
     "tool": "search_principles", "args": {"query": "wealth and prosperity of the kingdom"}},
    {"description": "Find narrative descriptions of Dasharatha's governance",
     "tool": "search_narrative", "args": {"query": "Dasharatha rule"}}
  ]
}

### OUTPUT FORMAT
Return ONLY a JSON object with a "steps" array as in the example."#;

#[derive(Deserialize)]
struct PlannerOutput {
    #[serde(default)]
    steps: Vec<Step>,
}

pub struct PlanGenerator {
    services: ResearchServices,
}

impl PlanGenerator {
    pub fn new(services: ResearchServices) -> Self {
        Self { services }
    }

    /// Generate a plan for `query`
    ///
    /// Errors only on a failed or timed-out planner call; everything else
    /// degrades to the fallback plan.
    pub async fn generate(&self, query: &str) -> Result<Plan> {
        let chat = match &self.services.chat {
            Some(chat) => chat,
            None => {
                tracing::info!(query, "No planner configured, using fallback plan");
                return Ok(fallback_plan(query));
            }
        };

        let options = ChatOptions {
            temperature: 0.0,
            json_output: true,
        };

        let raw = tokio::time::timeout(
            self.services.config.planning_timeout(),
            chat.complete(PLANNER_SYSTEM_PROMPT, query, &options),
        )
        .await
        .map_err(|_| AppError::PlanningFailed {
            message: "Planner call timed out".to_string(),
        })?
        .map_err(|e| AppError::PlanningFailed {
            message: e.to_string(),
        })?;

        let mut steps = match serde_json::from_str::<PlannerOutput>(&raw) {
            Ok(output) => output.steps,
            Err(e) => {
                tracing::warn!(error = %e, "Planner output was not valid JSON");
                Vec::new()
            }
        };

        let max = self.services.config.agent.plan_max_steps;
        if steps.len() > max {
            tracing::warn!(steps = steps.len(), max, "Clamping oversized plan");
            steps.truncate(max);
        }

        if steps.len() < self.services.config.agent.plan_min_steps {
            tracing::warn!(
                steps = steps.len(),
                "Planner produced too few steps, using fallback plan"
            );
            return Ok(fallback_plan(query));
        }

        Ok(steps)
    }
}

/// Fixed macro-to-micro plan used when the planner cannot be trusted
pub fn fallback_plan(query: &str) -> Plan {
    let query_arg = |q: &str| -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("query".to_string(), json!(q));
        map
    };

    vec![
        Step::new(
            &format!("Get a macro view of chapters related to '{}'", query),
            "search_chapters",
            query_arg(query),
        ),
        Step::new(
            &format!("Find guiding principles about '{}'", query),
            "search_principles",
            query_arg(query),
        ),
        Step::new(
            &format!("Find narrative events related to '{}'", query),
            "search_narrative",
            query_arg(query),
        ),
    ]
}

/// Numbered plan rendering, shown to the user as the planner's narration
pub fn render_plan_message(plan: &Plan) -> String {
    let numbered: Vec<String> = plan
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step.description))
        .collect();
    format!("I have developed a research plan:\n{}", numbered.join("\n"))
}
