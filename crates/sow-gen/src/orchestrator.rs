//! GenerationOrchestrator: bounded generate → validate → retry loop.
//!
//! Attempts for one slot run strictly in sequence. Each attempt ends in an
//! [`AttemptOutcome`]; only exhausting every attempt or cancellation is
//! reported as an error.

use crate::cancel::CancelToken;
use crate::generator::{ContentGenerator, GenerationContext, GenerationError};
use crate::provider::{GenerateOptions, TextBackend};
use crate::usage::UsageTracker;
use crate::validator::{ValidationReport, validate};
use serde::Serialize;
use sow_core::config::GenerationConfig;
use sow_core::model::{ContentSource, LessonContent};
use tracing::{debug, warn};

/// Content that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLesson {
    pub content: LessonContent,
    pub confidence: f64,
    pub source: ContentSource,
    /// 1-based attempt that produced the content.
    pub attempts: usize,
}

/// Why every attempt for a slot failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub attempts: usize,
    pub last_reason: String,
    /// One reason per attempt, in order.
    pub history: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("generation failed after {} attempts: {}", .0.attempts, .0.last_reason)]
    Exhausted(FailureReport),
    #[error("generation cancelled")]
    Cancelled,
}

/// How one attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    Accepted(LessonContent),
    TransportFailed(String),
    Malformed(String),
    Rejected(ValidationReport),
}

impl AttemptOutcome {
    /// Reasons to feed back into the next prompt.
    fn feedback(&self) -> Vec<String> {
        match self {
            AttemptOutcome::Accepted(_) => Vec::new(),
            AttemptOutcome::TransportFailed(_) => Vec::new(),
            AttemptOutcome::Malformed(reason) => {
                vec![format!("The response was not valid JSON of the required shape: {reason}")]
            }
            AttemptOutcome::Rejected(report) => report.reasons(),
        }
    }

    fn reason(&self) -> String {
        match self {
            AttemptOutcome::Accepted(_) => String::new(),
            AttemptOutcome::TransportFailed(reason) => format!("backend request failed: {reason}"),
            AttemptOutcome::Malformed(reason) => format!("backend returned invalid JSON: {reason}"),
            AttemptOutcome::Rejected(report) => report.summary(),
        }
    }
}

/// Drives the generator and validator for one slot at a time.
pub struct GenerationOrchestrator<'a> {
    generator: ContentGenerator<'a>,
    config: &'a GenerationConfig,
    cancel: CancelToken,
}

impl<'a> GenerationOrchestrator<'a> {
    pub fn new(backend: &'a dyn TextBackend, config: &'a GenerationConfig) -> Self {
        let options = GenerateOptions {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };
        Self {
            generator: ContentGenerator::new(backend, options),
            config,
            cancel: CancelToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.generator = self.generator.with_cancel(cancel.clone());
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_usage(mut self, usage: &'a UsageTracker) -> Self {
        self.generator = self.generator.with_usage(usage);
        self
    }

    /// Generate content for `ctx` that passes validation, within
    /// `config.max_attempts` attempts.
    pub fn generate_validated(
        &self,
        ctx: &GenerationContext<'_>,
    ) -> Result<ValidatedLesson, OrchestrationError> {
        let max_attempts = self.config.max_attempts;
        let mut history = Vec::with_capacity(max_attempts);
        let mut feedback: Vec<String> = Vec::new();

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }

            let outcome = match self.generator.generate(ctx, &feedback) {
                Ok(content) => {
                    let report = validate(&content, Some(ctx.substrand));
                    if report.is_valid {
                        AttemptOutcome::Accepted(content)
                    } else {
                        AttemptOutcome::Rejected(report)
                    }
                }
                Err(GenerationError::Cancelled) => return Err(OrchestrationError::Cancelled),
                Err(GenerationError::Transport(e)) => AttemptOutcome::TransportFailed(e.to_string()),
                Err(GenerationError::MalformedResponse(m)) => AttemptOutcome::Malformed(m),
            };

            if let AttemptOutcome::Accepted(content) = outcome {
                let confidence = self.config.confidence_for_attempt(attempt);
                debug!(
                    substrand = ctx.substrand,
                    attempt, confidence, "generated content accepted"
                );
                return Ok(ValidatedLesson {
                    content,
                    confidence,
                    source: ContentSource::GuidedGeneration,
                    attempts: attempt,
                });
            }

            let reason = outcome.reason();
            warn!(
                "Generation attempt {}/{} for '{}' failed: {}",
                attempt, max_attempts, ctx.substrand, reason
            );
            feedback = outcome.feedback();
            history.push(reason);
        }

        Err(OrchestrationError::Exhausted(FailureReport {
            attempts: history.len(),
            last_reason: history.last().cloned().unwrap_or_default(),
            history,
        }))
    }
}
