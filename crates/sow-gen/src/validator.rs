//! ContentValidator: pedagogical rule checks on a candidate lesson.
//!
//! Every check runs independently and each failing check contributes one
//! issue. A lesson is valid only when no check fails. Issues are data, not
//! errors: the orchestrator uses them to decide between retry and accept and
//! feeds them back into the next prompt.

use serde::{Deserialize, Serialize};
use sow_core::model::LessonContent;
use std::fmt;

/// Outcome verbs grouped by cognitive tier, lowest first.
pub const VERB_TIERS: [&[&str]; 3] = [
    &["state", "identify", "describe", "outline"],
    &["explain", "discuss", "analyze", "examine"],
    &["apply", "demonstrate", "appreciate", "value"],
];

/// Minimum number of learning outcomes per lesson.
pub const MIN_OUTCOMES: usize = 3;

const LEARNER_KEYWORDS: &[&str] = &[
    "learner",
    "student",
    "group",
    "discuss",
    "perform",
    "participate",
    "work",
];

const HIGHER_ORDER_STARTERS: &[&str] = &["how", "why", "in what ways", "to what extent"];

/// Summative assessment stems. Any word starting with one of these is
/// rejected ("examination", "testing", "marking").
const SUMMATIVE_PREFIXES: &[&str] = &["exam", "test", "mark"];

/// Summative terms matched as whole words (plural included), so that
/// "communication" or "location" do not count as a CAT.
const SUMMATIVE_WORDS: &[&str] = &["cat"];

const UNREALISTIC_RESOURCES: &[&str] = &["hologram", "vr lab", "ai lab"];

/// The rule a validation issue belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    OutcomeProgression,
    LearnerCentred,
    InquiryQuestions,
    AssessmentMethods,
    LearningResources,
    SubstrandAlignment,
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub rule: Rule,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of validating one candidate lesson.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Human-readable reasons, one per failed check.
    pub fn reasons(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.message.clone()).collect()
    }

    pub fn summary(&self) -> String {
        self.reasons().join("; ")
    }

    pub fn has(&self, rule: Rule) -> bool {
        self.issues.iter().any(|i| i.rule == rule)
    }
}

/// 1-based cognitive tier of an outcome's leading verb, or `None` if the
/// leading word is not a known verb.
pub fn cognitive_tier(outcome: &str) -> Option<usize> {
    let normalized: String = outcome
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect();
    let verb = normalized.split_whitespace().next()?;
    VERB_TIERS
        .iter()
        .position(|tier| tier.contains(&verb))
        .map(|index| index + 1)
}

/// Validate a candidate lesson. `substrand_title`, when given and non-blank,
/// must appear in the outcomes, experiences or questions.
pub fn validate(candidate: &LessonContent, substrand_title: Option<&str>) -> ValidationReport {
    let mut issues = Vec::new();
    let mut fail = |rule: Rule, message: String| issues.push(ValidationIssue { rule, message });

    if let Some(message) = check_outcomes(&candidate.learning_outcomes) {
        fail(Rule::OutcomeProgression, message);
    }
    if let Some(message) = check_experiences(&candidate.learning_experiences) {
        fail(Rule::LearnerCentred, message);
    }
    if let Some(message) = check_questions(&candidate.key_inquiry_questions) {
        fail(Rule::InquiryQuestions, message);
    }
    if let Some(message) = check_assessment(&candidate.assessment_methods) {
        fail(Rule::AssessmentMethods, message);
    }
    if let Some(message) = check_resources(&candidate.learning_resources) {
        fail(Rule::LearningResources, message);
    }
    if let Some(title) = substrand_title.map(str::trim).filter(|t| !t.is_empty())
        && let Some(message) = check_alignment(candidate, title)
    {
        fail(Rule::SubstrandAlignment, message);
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
    }
}

fn check_outcomes(outcomes: &[String]) -> Option<String> {
    if outcomes.len() < MIN_OUTCOMES {
        return Some(format!(
            "At least {MIN_OUTCOMES} learning outcomes required (found {})",
            outcomes.len()
        ));
    }

    let mut previous: Option<(usize, &str)> = None;
    for outcome in outcomes {
        let Some(tier) = cognitive_tier(outcome) else {
            return Some(format!(
                "Outcome \"{outcome}\" does not start with a recognised cognitive verb"
            ));
        };
        if let Some((prev_tier, prev)) = previous
            && tier < prev_tier
        {
            return Some(format!(
                "Learning outcomes must progress from lower to higher order (\"{outcome}\" follows \"{prev}\")"
            ));
        }
        previous = Some((tier, outcome.as_str()));
    }
    None
}

fn check_experiences(experiences: &[String]) -> Option<String> {
    if experiences.is_empty() {
        return Some("Learning experiences missing".to_string());
    }
    let combined = combine(experiences);
    if !LEARNER_KEYWORDS.iter().any(|k| combined.contains(k)) {
        return Some("Learning experiences must be learner-centred".to_string());
    }
    None
}

fn check_questions(questions: &[String]) -> Option<String> {
    if questions.is_empty() {
        return Some("Inquiry questions missing".to_string());
    }
    let combined = combine(questions);
    if !combined.contains('?') {
        return Some("Inquiry questions must be in question form".to_string());
    }
    if !HIGHER_ORDER_STARTERS.iter().any(|s| combined.contains(s)) {
        return Some("Inquiry questions lack higher-order thinking".to_string());
    }
    None
}

fn check_assessment(methods: &[String]) -> Option<String> {
    if methods.is_empty() {
        return Some("Assessment methods missing".to_string());
    }
    let combined = combine(methods);
    let summative = combined
        .split(|c: char| !c.is_alphanumeric())
        .find(|word| is_summative(word))?;
    Some(format!(
        "Summative assessment not allowed in a scheme of work (\"{summative}\")"
    ))
}

fn is_summative(word: &str) -> bool {
    SUMMATIVE_PREFIXES.iter().any(|p| word.starts_with(p))
        || SUMMATIVE_WORDS
            .iter()
            .any(|w| word == *w || word.strip_suffix('s') == Some(*w))
}

fn check_resources(resources: &[String]) -> Option<String> {
    if resources.is_empty() {
        return Some("Learning resources missing".to_string());
    }
    let combined = combine(resources);
    let unrealistic = UNREALISTIC_RESOURCES
        .iter()
        .find(|term| combined.contains(**term))?;
    Some(format!("Unrealistic learning resources detected (\"{unrealistic}\")"))
}

fn check_alignment(candidate: &LessonContent, title: &str) -> Option<String> {
    let combined = candidate
        .learning_outcomes
        .iter()
        .chain(&candidate.learning_experiences)
        .chain(&candidate.key_inquiry_questions)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if combined.contains(&title.to_lowercase()) {
        None
    } else {
        Some(format!(
            "Lesson content not aligned to substrand \"{title}\""
        ))
    }
}

fn combine(items: &[String]) -> String {
    items.join(" ").to_lowercase()
}
