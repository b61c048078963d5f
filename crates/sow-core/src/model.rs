//! Scheme-of-work data model: topics, lesson content, per-slot lesson records
//! and the assembled scheme with its quality metrics.

use crate::breaks::ScheduledBreak;
use crate::calendar::{LessonLabel, TermCalendar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Lessons at or above this confidence count as high confidence.
pub const HIGH_CONFIDENCE: f64 = 0.85;

/// Curriculum context shared by every slot of one generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeContext {
    pub learning_area: String,
    pub grade: String,
    /// Curriculum-design guidance embedded verbatim in generation prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curriculum_guide: Option<String>,
}

impl GradeContext {
    pub fn new(learning_area: impl Into<String>, grade: impl Into<String>) -> Self {
        Self {
            learning_area: learning_area.into(),
            grade: grade.into(),
            curriculum_guide: None,
        }
    }

    pub fn with_guide(mut self, guide: impl Into<String>) -> Self {
        self.curriculum_guide = Some(guide.into());
        self
    }
}

/// The curriculum lists that make up one lesson.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
    #[serde(default)]
    pub learning_experiences: Vec<String>,
    #[serde(default)]
    pub key_inquiry_questions: Vec<String>,
    #[serde(default)]
    pub learning_resources: Vec<String>,
    #[serde(default)]
    pub assessment_methods: Vec<String>,
}

impl LessonContent {
    /// Minimal always-available content for a substrand.
    pub fn emergency(substrand: &str) -> Self {
        Self {
            learning_outcomes: vec![format!("Describe the key ideas of {substrand}")],
            learning_experiences: vec![format!("Learners discuss {substrand} in groups")],
            key_inquiry_questions: vec![format!("How does {substrand} relate to daily life?")],
            learning_resources: vec!["Approved textbooks".to_string()],
            assessment_methods: vec!["Oral questions".to_string()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.learning_outcomes.is_empty()
            && self.learning_experiences.is_empty()
            && self.key_inquiry_questions.is_empty()
    }
}

/// A curriculum topic: one substrand of a strand, weighted for allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub strand: String,
    pub substrand: String,
    /// Explicit allocation weight. When absent, derived from official outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    /// Pre-existing authoritative content for this substrand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official: Option<LessonContent>,
}

impl Topic {
    pub fn new(strand: impl Into<String>, substrand: impl Into<String>) -> Self {
        Self {
            strand: strand.into(),
            substrand: substrand.into(),
            weight: None,
            official: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_official(mut self, content: LessonContent) -> Self {
        self.official = Some(content);
        self
    }

    /// Allocation weight: explicit weight, else the official outcome count, else 1.
    /// Never zero.
    pub fn weight(&self) -> u32 {
        self.weight
            .or_else(|| {
                self.official
                    .as_ref()
                    .map(|c| c.learning_outcomes.len() as u32)
            })
            .unwrap_or(1)
            .max(1)
    }

    /// Case-insensitive identity of the topic (strand + substrand).
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.strand.trim().to_lowercase(),
            self.substrand.trim().to_lowercase()
        )
    }
}

/// Where a lesson's content came from, from most to least authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    AuthoritativeExact,
    AuthoritativeWeekly,
    AuthoritativeTemplate,
    GuidedGeneration,
    Emergency,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::AuthoritativeExact => "authoritative_exact",
            ContentSource::AuthoritativeWeekly => "authoritative_weekly",
            ContentSource::AuthoritativeTemplate => "authoritative_template",
            ContentSource::GuidedGeneration => "guided_generation",
            ContentSource::Emergency => "emergency",
        }
    }

    pub fn is_authoritative(&self) -> bool {
        matches!(
            self,
            ContentSource::AuthoritativeExact
                | ContentSource::AuthoritativeWeekly
                | ContentSource::AuthoritativeTemplate
        )
    }
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lesson produced for one teaching slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub week: u32,
    pub lesson: LessonLabel,
    pub strand: String,
    pub substrand: String,
    #[serde(flatten)]
    pub content: LessonContent,
    pub source: ContentSource,
    pub confidence: f64,
    pub is_authoritative: bool,
}

/// A slot whose generation exhausted its retries and fell back to emergency content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFailure {
    pub week: u32,
    pub lesson: LessonLabel,
    pub substrand: String,
    pub reason: String,
}

/// Token counts reported by the text-generation backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Aggregate quality figures for a generated scheme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total_lessons: usize,
    pub total_weeks: usize,
    pub authoritative_lessons: usize,
    pub high_confidence_lessons: usize,
    pub average_confidence: f64,
    pub sources: BTreeMap<ContentSource, usize>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl QualityMetrics {
    pub fn from_lessons(lessons: &[LessonRecord], usage: TokenUsage) -> Self {
        let mut sources = BTreeMap::new();
        for lesson in lessons {
            *sources.entry(lesson.source).or_insert(0) += 1;
        }
        let average_confidence = if lessons.is_empty() {
            0.0
        } else {
            let sum: f64 = lessons.iter().map(|l| l.confidence).sum();
            (sum / lessons.len() as f64 * 100.0).round() / 100.0
        };

        Self {
            total_lessons: lessons.len(),
            total_weeks: lessons.iter().map(|l| l.week).collect::<BTreeSet<_>>().len(),
            authoritative_lessons: lessons.iter().filter(|l| l.is_authoritative).count(),
            high_confidence_lessons: lessons
                .iter()
                .filter(|l| l.confidence >= HIGH_CONFIDENCE)
                .count(),
            average_confidence,
            sources,
            usage,
        }
    }
}

impl fmt::Display for QualityMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Quality metrics:")?;
        writeln!(
            f,
            "  Lessons: {} across {} weeks",
            self.total_lessons, self.total_weeks
        )?;
        writeln!(f, "  Authoritative: {}", self.authoritative_lessons)?;
        writeln!(
            f,
            "  High confidence (>= {:.2}): {}",
            HIGH_CONFIDENCE, self.high_confidence_lessons
        )?;
        writeln!(f, "  Average confidence: {:.2}", self.average_confidence)?;
        for (source, count) in &self.sources {
            writeln!(f, "  {source}: {count}")?;
        }
        write!(
            f,
            "  Tokens: {} input, {} output",
            self.usage.input_tokens, self.usage.output_tokens
        )
    }
}

/// Whether every slot received validated or authoritative content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeStatus {
    Complete,
    Partial,
}

/// The assembled output of one generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheme {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub context: GradeContext,
    pub calendar: TermCalendar,
    pub breaks: Vec<ScheduledBreak>,
    pub lessons: Vec<LessonRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SlotFailure>,
    pub metrics: QualityMetrics,
}

impl Scheme {
    pub fn new(
        context: GradeContext,
        calendar: TermCalendar,
        breaks: Vec<ScheduledBreak>,
        lessons: Vec<LessonRecord>,
        failures: Vec<SlotFailure>,
        usage: TokenUsage,
    ) -> Self {
        let metrics = QualityMetrics::from_lessons(&lessons, usage);
        Self {
            version: crate::schema::CURRENT_VERSION.to_string(),
            generated_at: Utc::now(),
            context,
            calendar,
            breaks,
            lessons,
            failures,
            metrics,
        }
    }

    pub fn status(&self) -> SchemeStatus {
        if self.failures.is_empty() {
            SchemeStatus::Complete
        } else {
            SchemeStatus::Partial
        }
    }

    /// Lessons whose confidence is below `threshold`.
    pub fn low_confidence(&self, threshold: f64) -> impl Iterator<Item = &LessonRecord> {
        self.lessons.iter().filter(move |l| l.confidence < threshold)
    }
}
