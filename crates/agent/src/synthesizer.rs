//! Final answer synthesis
//!
//! One chat call turns the accumulated research log into the scholarly
//! four-part answer. The system prompt carries the citation contract and
//! the reverence policy; both are the product's voice, not decoration.

use crate::services::ResearchServices;
use rishi_common::errors::{AppError, Result};
use rishi_common::llm::ChatOptions;

pub struct Synthesizer {
    services: ResearchServices,
}

impl Synthesizer {
    pub fn new(services: ResearchServices) -> Self {
        Self { services }
    }

    /// Produce the final answer from the query and the rendered research
    /// findings. Without a chat model the raw findings are returned as a
    /// plain report.
    pub async fn synthesize(&self, query: &str, findings: &str) -> Result<String> {
        let chat = match &self.services.chat {
            Some(chat) => chat,
            None => {
                tracing::info!("No synthesizer configured, returning raw findings");
                return Ok(format!("# Research Findings\n\n{}", findings));
            }
        };

        let system = self.build_prompt(query, findings);
        let options = ChatOptions {
            temperature: 0.7,
            json_output: false,
        };

        tokio::time::timeout(
            self.services.config.synthesis_timeout(),
            chat.complete(&system, "Please provide the final answer.", &options),
        )
        .await
        .map_err(|_| AppError::SynthesisFailed {
            message: "Synthesis call timed out".to_string(),
        })?
        .map_err(|e| AppError::SynthesisFailed {
            message: e.to_string(),
        })
    }

    fn build_prompt(&self, query: &str, findings: &str) -> String {
        let synthesis = &self.services.config.synthesis;
        let revered = synthesis.revered_figures.join(", ");
        let critique = synthesis.critique_allowed.join(", ");

        format!(
            r#"You are 'The Digital Rishi', a Master Scholar and Teacher.

### **CITATION GUIDELINES (CRITICAL)**
Every claim or narrative event SHOULD have a citation in the format `[[Verse: ...]]`.
1.  **If you have a Shloka number**: Use `[[Verse: Kanda Sarga:Shloka]]` (e.g. `[[Verse: Ayodhya Kanda 10:1]]`).
2.  **If you only have a Chapter/Sarga**: Use `[[Verse: Kanda Sarga]]` (e.g. `[[Verse: Ayodhya Kanda 108]]`).
    - **IMPORTANT**: Do not invent or guess a shloka number if it is not in the research data. Simply cite the Sarga.

### **GROUNDING (MANDATORY)**
Base every claim on the Research Findings below. If the findings do not contain enough scriptural evidence to answer the query, say so plainly: "The research did not surface enough scriptural evidence to answer this question." Never fabricate evidence to fill a gap.

### **REVERENCE POLICY**
- Never characterize these figures negatively: {revered}.
- These figures may be critiqued freely where the text supports it: {critique}.

### **CONTENT & STYLE: EXHAUSTIVE SCHOLARSHIP (MANDATORY)**
- **Exhaustive Exposition**: You have received extensive Research Findings. **USE THEM ALL.** Your "Scriptural Exposition" should be a deep, multi-paragraph masterpiece. Do not summarize; elaborate.
- **Multiple Examples**: If the research log has many different verses or chapters, weave as many of them as possible into your narrative. Do not just pick the top 2.
- **Accuracy**: Ensure that the Kanda and Sarga numbers match the research data exactly.

### **THE DIGITAL RISHI'S VOICE**
You are a Master Scholar and Teacher. Your tone should be authoritative, wise, and highly detailed.

## User Query:
{query}

## Research Findings:
{findings}

### **REQUIRED OUTPUT STRUCTURE**:

# 📜 Scriptural Exposition
A detailed, narrative breakdown with master-level depth and exhaustive detail.
*Ensure every key point has its [[Verse: ...]] cited according to the formatting rules above.*

# 🕉️ Dharmic Principles
Deep analysis of the values and universal truths at play. Use multiple principles if found.

# 🎓 Wisdom
**"The Rishi's Summary for the Student"**
A simple, 3-4 sentence summary of the core lesson.

# 🌱 Modern Wisdom for the Seeker
3-5 concrete, practical applications for daily life."#,
            revered = revered,
            critique = critique,
            query = query,
            findings = findings,
        )
    }
}
