//! CurriculumResolver: tiered content lookup for one allocated slot.
//!
//! Tiers are [`ResolutionStrategy`] objects tried in order until one yields
//! content:
//!
//! 1. exact authoritative match (topic-embedded content, then the store), confidence 1.0
//! 2. week-keyed authoritative plan entry, confidence 0.95
//! 3. similar substrand used as a template, confidence 0.85
//! 4. guided generation through the [`GenerationOrchestrator`]
//!
//! A tier that fails is logged and skipped. If no tier produces content the
//! slot receives static emergency content at confidence 0.5, together with
//! the last failure reason. Only cancellation aborts resolution.

use crate::generator::GenerationContext;
use crate::orchestrator::{GenerationOrchestrator, OrchestrationError};
use sow_core::curriculum::{CurriculumRecord, CurriculumStore, StoreError};
use sow_core::model::{ContentSource, GradeContext, LessonContent, Topic};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

pub const EXACT_CONFIDENCE: f64 = 1.0;
pub const WEEKLY_CONFIDENCE: f64 = 0.95;
pub const TEMPLATE_CONFIDENCE: f64 = 0.85;
pub const EMERGENCY_CONFIDENCE: f64 = 0.5;

/// Word-level similarity at or above this counts as a near-miss match.
const WORD_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Words too common to signal that two substrands are related.
const STOPWORDS: &[&str] = &["the", "and", "of", "in", "on", "for", "to", "a", "an", "its"];

/// One slot's resolution input.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub topic: &'a Topic,
    pub context: &'a GradeContext,
    pub week: u32,
    /// 1-based lesson number within the topic.
    pub position: usize,
    /// Lessons allotted to the topic.
    pub total: usize,
}

/// Resolved content for a slot, with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub source: ContentSource,
    pub confidence: f64,
    pub content: LessonContent,
    /// Why the slot fell back to emergency content.
    pub failure: Option<String>,
}

impl Resolution {
    fn found(source: ContentSource, confidence: f64, content: LessonContent) -> Self {
        Self {
            source,
            confidence,
            content,
            failure: None,
        }
    }

    /// Static fallback content for `substrand`.
    pub fn emergency(substrand: &str, reason: impl Into<String>) -> Self {
        Self {
            source: ContentSource::Emergency,
            confidence: EMERGENCY_CONFIDENCE,
            content: LessonContent::emergency(substrand),
            failure: Some(reason.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Generation(OrchestrationError),
    #[error("resolution cancelled")]
    Cancelled,
}

impl From<OrchestrationError> for ResolveError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::Cancelled => ResolveError::Cancelled,
            other => ResolveError::Generation(other),
        }
    }
}

/// One tier of the resolution cascade.
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means this tier has nothing for the request.
    fn attempt(&self, request: &ResolveRequest<'_>) -> Result<Option<Resolution>, ResolveError>;
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// Authoritative content for exactly this substrand.
pub struct ExactMatch<'a> {
    store: &'a dyn CurriculumStore,
}

impl<'a> ExactMatch<'a> {
    pub fn new(store: &'a dyn CurriculumStore) -> Self {
        Self { store }
    }
}

impl ResolutionStrategy for ExactMatch<'_> {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn attempt(&self, request: &ResolveRequest<'_>) -> Result<Option<Resolution>, ResolveError> {
        if let Some(official) = request.topic.official.as_ref().filter(|c| !c.is_empty()) {
            return Ok(Some(Resolution::found(
                ContentSource::AuthoritativeExact,
                EXACT_CONFIDENCE,
                official.clone(),
            )));
        }

        let record = self.store.find_substrand(
            &request.context.learning_area,
            &request.context.grade,
            &request.topic.substrand,
        )?;
        Ok(record.filter(|r| !r.content.is_empty()).map(|r| {
            Resolution::found(
                ContentSource::AuthoritativeExact,
                EXACT_CONFIDENCE,
                r.content,
            )
        }))
    }
}

/// The authoritative plan entry for the slot's week, when it covers the topic.
pub struct WeeklyCurriculum<'a> {
    store: &'a dyn CurriculumStore,
}

impl<'a> WeeklyCurriculum<'a> {
    pub fn new(store: &'a dyn CurriculumStore) -> Self {
        Self { store }
    }
}

impl ResolutionStrategy for WeeklyCurriculum<'_> {
    fn name(&self) -> &'static str {
        "weekly"
    }

    fn attempt(&self, request: &ResolveRequest<'_>) -> Result<Option<Resolution>, ResolveError> {
        let record = self.store.find_week(
            &request.context.learning_area,
            &request.context.grade,
            request.week,
        )?;
        Ok(record
            .filter(|r| !r.content.is_empty() && covers_topic(r, request.topic))
            .map(|r| {
                Resolution::found(
                    ContentSource::AuthoritativeWeekly,
                    WEEKLY_CONFIDENCE,
                    r.content,
                )
            }))
    }
}

/// The richest related substrand of the same learning area and grade, used
/// as a structural template.
pub struct SimilarTemplate<'a> {
    store: &'a dyn CurriculumStore,
}

impl<'a> SimilarTemplate<'a> {
    pub fn new(store: &'a dyn CurriculumStore) -> Self {
        Self { store }
    }
}

impl ResolutionStrategy for SimilarTemplate<'_> {
    fn name(&self) -> &'static str {
        "template"
    }

    fn attempt(&self, request: &ResolveRequest<'_>) -> Result<Option<Resolution>, ResolveError> {
        let candidates = self
            .store
            .substrands(&request.context.learning_area, &request.context.grade)?;

        let best = candidates
            .into_iter()
            .filter(|r| !r.content.is_empty())
            .filter(|r| !same_title(&r.substrand, &request.topic.substrand))
            .filter(|r| similar_titles(&r.substrand, &request.topic.substrand))
            // max_by_key keeps the last maximum; reverse so the first listed wins ties
            .rev()
            .max_by_key(|r| r.content.learning_outcomes.len());

        Ok(best.map(|r| {
            debug!(
                "Using '{}' as template for '{}'",
                r.substrand, request.topic.substrand
            );
            Resolution::found(
                ContentSource::AuthoritativeTemplate,
                TEMPLATE_CONFIDENCE,
                r.content,
            )
        }))
    }
}

/// Guided generation with validation and bounded retries.
pub struct GuidedGeneration<'a> {
    orchestrator: GenerationOrchestrator<'a>,
}

impl<'a> GuidedGeneration<'a> {
    pub fn new(orchestrator: GenerationOrchestrator<'a>) -> Self {
        Self { orchestrator }
    }
}

impl ResolutionStrategy for GuidedGeneration<'_> {
    fn name(&self) -> &'static str {
        "generation"
    }

    fn attempt(&self, request: &ResolveRequest<'_>) -> Result<Option<Resolution>, ResolveError> {
        let ctx = GenerationContext {
            learning_area: &request.context.learning_area,
            grade: &request.context.grade,
            strand: &request.topic.strand,
            substrand: &request.topic.substrand,
            week: request.week,
            position: request.position,
            total: request.total,
            guidance: request.context.curriculum_guide.as_deref(),
        };
        let lesson = self.orchestrator.generate_validated(&ctx)?;
        Ok(Some(Resolution::found(
            lesson.source,
            lesson.confidence,
            lesson.content,
        )))
    }
}

fn normalize(title: &str) -> String {
    title.trim().to_lowercase()
}

fn same_title(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

fn significant_words(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(w))
        .map(String::from)
        .collect()
}

/// Whether two substrand titles look related: one contains the other, they
/// share a significant word, or two of their words are near-identical.
pub fn similar_titles(a: &str, b: &str) -> bool {
    let (a_norm, b_norm) = (normalize(a), normalize(b));
    if a_norm.is_empty() || b_norm.is_empty() {
        return false;
    }
    if a_norm.contains(&b_norm) || b_norm.contains(&a_norm) {
        return true;
    }

    let a_words = significant_words(a);
    let b_words = significant_words(b);
    a_words.iter().any(|wa| {
        b_words
            .iter()
            .any(|wb| strsim::normalized_levenshtein(wa, wb) >= WORD_SIMILARITY_THRESHOLD)
    })
}

fn covers_topic(record: &CurriculumRecord, topic: &Topic) -> bool {
    (!record.strand.trim().is_empty() && same_title(&record.strand, &topic.strand))
        || similar_titles(&record.substrand, &topic.substrand)
}

// ---------------------------------------------------------------------------
// Request-scoped cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    topic: String,
    grade: String,
    week: u32,
}

/// Memoized resolutions for one scheme-generation request, keyed by
/// (topic, grade, week). The first stored resolution for a key wins.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: Mutex<HashMap<CacheKey, Resolution>>,
    hits: AtomicUsize,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(request: &ResolveRequest<'_>) -> CacheKey {
        CacheKey {
            topic: request.topic.key(),
            grade: normalize(&request.context.grade),
            week: request.week,
        }
    }

    fn get(&self, key: &CacheKey) -> Option<Resolution> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let found = entries.get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store `resolution` unless another worker got there first; returns the stored value.
    fn insert(&self, key: CacheKey, resolution: Resolution) -> Resolution {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.entry(key).or_insert(resolution).clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Runs the tier cascade for each slot.
pub struct CurriculumResolver<'a> {
    strategies: Vec<Box<dyn ResolutionStrategy + 'a>>,
}

impl<'a> CurriculumResolver<'a> {
    pub fn new(strategies: Vec<Box<dyn ResolutionStrategy + 'a>>) -> Self {
        Self { strategies }
    }

    /// Exact → weekly → template → guided generation.
    ///
    /// Tiers run in descending confidence, so a week-keyed plan entry (0.95)
    /// is preferred over a borrowed template (0.85).
    pub fn standard(store: &'a dyn CurriculumStore, orchestrator: GenerationOrchestrator<'a>) -> Self {
        Self::new(vec![
            Box::new(ExactMatch::new(store)),
            Box::new(WeeklyCurriculum::new(store)),
            Box::new(SimilarTemplate::new(store)),
            Box::new(GuidedGeneration::new(orchestrator)),
        ])
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve content for one slot, consulting and filling `cache`.
    ///
    /// Never fails except with [`ResolveError::Cancelled`].
    pub fn resolve(
        &self,
        request: &ResolveRequest<'_>,
        cache: &ResolutionCache,
    ) -> Result<Resolution, ResolveError> {
        let key = ResolutionCache::key(request);
        if let Some(hit) = cache.get(&key) {
            debug!(
                "Cache hit for '{}' in week {}",
                request.topic.substrand, request.week
            );
            return Ok(hit);
        }

        let mut last_error: Option<String> = None;
        for strategy in &self.strategies {
            match strategy.attempt(request) {
                Ok(Some(resolution)) => {
                    debug!(
                        tier = strategy.name(),
                        substrand = %request.topic.substrand,
                        confidence = resolution.confidence,
                        "resolved"
                    );
                    return Ok(cache.insert(key, resolution));
                }
                Ok(None) => {
                    debug!(
                        tier = strategy.name(),
                        substrand = %request.topic.substrand,
                        "no match"
                    );
                }
                Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
                Err(e) => {
                    warn!(
                        "Tier '{}' failed for '{}': {}",
                        strategy.name(),
                        request.topic.substrand,
                        e
                    );
                    last_error = Some(e.to_string());
                }
            }
        }

        let reason =
            last_error.unwrap_or_else(|| "no resolution tier produced content".to_string());
        Ok(cache.insert(
            key,
            Resolution::emergency(&request.topic.substrand, reason),
        ))
    }
}
