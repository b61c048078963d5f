//! ContentGenerator: one structured prompt in, one candidate lesson out.

use crate::cancel::CancelToken;
use crate::provider::{GenerateOptions, ProviderError, TextBackend};
use crate::usage::UsageTracker;
use serde::Deserialize;
use sow_core::model::LessonContent;

/// Prompt template for a single lesson.
pub const LESSON_PROMPT: &str = include_str!("prompts/lesson.md");

const DEFAULT_GUIDANCE: &str =
    "No additional guidance. Follow the national curriculum design for this substrand.";

/// Errors from a single generation call.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation transport failed: {0}")]
    Transport(#[from] ProviderError),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("generation cancelled")]
    Cancelled,
}

/// Everything the prompt says about the lesson being generated.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub learning_area: &'a str,
    pub grade: &'a str,
    pub strand: &'a str,
    pub substrand: &'a str,
    pub week: u32,
    /// 1-based lesson number within the substrand.
    pub position: usize,
    /// Lessons allotted to the substrand.
    pub total: usize,
    /// Curriculum-design guidance or template text.
    pub guidance: Option<&'a str>,
}

/// Issues prompts to a text backend and parses the replies.
pub struct ContentGenerator<'a> {
    backend: &'a dyn TextBackend,
    options: GenerateOptions,
    cancel: CancelToken,
    usage: Option<&'a UsageTracker>,
}

impl<'a> ContentGenerator<'a> {
    pub fn new(backend: &'a dyn TextBackend, options: GenerateOptions) -> Self {
        Self {
            backend,
            options,
            cancel: CancelToken::new(),
            usage: None,
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_usage(mut self, usage: &'a UsageTracker) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Generate one candidate lesson.
    ///
    /// `feedback` holds the reasons the previous attempt was rejected; it is
    /// appended to the prompt. A completion that arrives after cancellation is
    /// dropped and reported as [`GenerationError::Cancelled`].
    pub fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        feedback: &[String],
    ) -> Result<LessonContent, GenerationError> {
        let prompt = build_prompt(ctx, feedback);
        let completion = self.backend.generate(&prompt, &self.options)?;

        if self.cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        if let Some(usage) = self.usage {
            usage.record(&completion);
        }

        parse_lesson(&completion.text)
    }
}

/// Fill the lesson template for `ctx`, plus the previous attempt's problems.
pub fn build_prompt(ctx: &GenerationContext<'_>, feedback: &[String]) -> String {
    let guidance = ctx
        .guidance
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .unwrap_or(DEFAULT_GUIDANCE);

    let mut prompt = LESSON_PROMPT
        .replace("{{learning_area}}", ctx.learning_area)
        .replace("{{grade}}", ctx.grade)
        .replace("{{strand}}", ctx.strand)
        .replace("{{substrand}}", ctx.substrand)
        .replace("{{week}}", &ctx.week.to_string())
        .replace("{{position}}", &ctx.position.to_string())
        .replace("{{total}}", &ctx.total.to_string())
        .replace("{{guidance}}", guidance);

    if !feedback.is_empty() {
        prompt.push_str("\n## Problems with your previous answer\n\n");
        for reason in feedback {
            prompt.push_str(&format!("- {}\n", reason));
        }
        prompt.push_str("\nFix every problem above and answer again with JSON only.\n");
    }

    prompt
}

/// The JSON shape a backend must return. `learning_resources` may be omitted.
#[derive(Deserialize)]
struct LessonReply {
    learning_outcomes: Vec<String>,
    learning_experiences: Vec<String>,
    key_inquiry_questions: Vec<String>,
    assessment_methods: Vec<String>,
    #[serde(default)]
    learning_resources: Vec<String>,
}

/// Parse a backend reply into lesson content.
///
/// Tolerates `<think>` blocks, markdown code fences and prose around the
/// JSON object.
pub fn parse_lesson(text: &str) -> Result<LessonContent, GenerationError> {
    let cleaned = strip_think_blocks(text);
    let json = extract_json_object(&cleaned).ok_or_else(|| {
        GenerationError::MalformedResponse("no JSON object in response".to_string())
    })?;

    let reply: LessonReply = serde_json::from_str(json)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    Ok(LessonContent {
        learning_outcomes: reply.learning_outcomes,
        learning_experiences: reply.learning_experiences,
        key_inquiry_questions: reply.key_inquiry_questions,
        learning_resources: reply.learning_resources,
        assessment_methods: reply.assessment_methods,
    })
}

/// Strip `<think>...</think>` blocks that some models emit.
pub fn strip_think_blocks(text: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find("<think>") {
        if let Some(end_offset) = result[start..].find("</think>") {
            let end = start + end_offset + "</think>".len();
            result.replace_range(start..end, "");
        } else {
            // Unclosed think block: drop everything from <think> onward
            result.truncate(start);
            break;
        }
    }
    result
}

fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    for fence in ["```json", "```"] {
        if let Some(start) = text.find(fence) {
            let after = &text[start + fence.len()..];
            if let Some(end) = after.find("```") {
                let inner = after[..end].trim();
                if inner.starts_with('{') {
                    return Some(inner);
                }
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
