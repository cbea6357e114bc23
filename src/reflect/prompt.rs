use serde::Serialize;

use crate::reflect::features::MonthlyContext;

pub const SYSTEM_INSTRUCTION: &str = "You write a gentle monthly reflection for someone who keeps a private journal. \
You receive statistics and a few short excerpts from their entries for one month.

Tone rules:
- Describe, do not diagnose. Never name or suggest a mental health condition.
- Do not give advice, tips, or instructions. Avoid directive language such as \"you should\" or \"try to\".
- Do not compare this month with other months or call anything better or worse.
- Speak to the writer in the second person, warmly and plainly.
- Only mention patterns that are supported by the statistics or excerpts.

Reply with exactly these four sections, in this order, each header on its own line followed by its content:

OVERVIEW:
<one short paragraph>

OBSERVATIONS:
- <observation>
- <observation>
- <observation, optional third>

THEME_REFLECTION:
<one short paragraph>

CLOSING_QUESTION:
<one open question>

Do not add any other headers, preamble, or closing remarks.";

/// Provider-agnostic chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub system_message: String,
    pub user_message: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

pub fn build_request(
    context: &MonthlyContext,
    temperature: f32,
    max_output_tokens: u32,
) -> ChatRequest {
    ChatRequest {
        system_message: SYSTEM_INSTRUCTION.to_string(),
        user_message: context.render(),
        temperature,
        max_output_tokens,
    }
}
