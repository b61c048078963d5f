//! Scheme generation pipeline.
//!
//! calendar → breaks → teaching slots → topic allocation → per-slot
//! resolution → assembled [`Scheme`]. Calendar, break and allocation errors
//! abort before any content is resolved. Per-slot generation failures never
//! abort: the slot gets emergency content and a [`SlotFailure`] entry.

use crate::cancel::CancelToken;
use crate::orchestrator::GenerationOrchestrator;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::provider::TextBackend;
use crate::resolver::{CurriculumResolver, ResolutionCache, ResolveError, ResolveRequest};
use crate::usage::UsageTracker;
use rayon::prelude::*;
use sow_core::allocator::{AllocationError, Assignment, allocate_with};
use sow_core::breaks::{Break, materialize_timeline, schedule_breaks, teaching_slots};
use sow_core::calendar::{ScheduleError, TermCalendar};
use sow_core::config::SowConfig;
use sow_core::curriculum::CurriculumStore;
use sow_core::model::{GradeContext, LessonRecord, Scheme, SlotFailure, Topic};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Collaborators and settings for one generation run.
pub struct SchemeConfig<'a> {
    pub backend: &'a dyn TextBackend,
    pub store: &'a dyn CurriculumStore,
    pub settings: &'a SowConfig,
    pub progress: &'a dyn ProgressSink,
    pub cancel: CancelToken,
}

/// Errors that abort scheme generation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("resolution failed: {0}")]
    Resolve(ResolveError),
    #[error("scheme generation cancelled")]
    Cancelled,
    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),
}

impl From<ResolveError> for PipelineError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Resolve(other),
        }
    }
}

type SlotResult = (LessonRecord, Option<SlotFailure>);

/// Generate a scheme of work.
///
/// Returns a complete [`Scheme`] whenever the calendar, breaks and topics are
/// valid; slots that could not be generated are listed in `Scheme::failures`
/// (see [`Scheme::status`]). A cancelled run returns
/// [`PipelineError::Cancelled`] and discards everything produced.
pub fn generate_scheme(
    calendar: &TermCalendar,
    breaks: &[Break],
    topics: &[Topic],
    context: &GradeContext,
    config: &SchemeConfig<'_>,
) -> Result<Scheme, PipelineError> {
    let schedule = schedule_breaks(calendar, breaks)?;
    let timeline = materialize_timeline(calendar, schedule.as_slice());
    let slots = teaching_slots(&timeline);
    let assignments = allocate_with(topics, &slots, config.settings.allocation.strategy)?;

    info!(
        "Generating scheme for {} {}: {} teaching slots ({} break slots), {} topics",
        context.learning_area,
        context.grade,
        slots.len(),
        timeline.len() - slots.len(),
        topics.len()
    );

    let usage = UsageTracker::new();
    let orchestrator = GenerationOrchestrator::new(config.backend, &config.settings.generation)
        .with_cancel(config.cancel.clone())
        .with_usage(&usage);
    let resolver = CurriculumResolver::standard(config.store, orchestrator);
    let cache = ResolutionCache::new();
    let completed = AtomicUsize::new(0);
    let total = assignments.len();

    let resolve_slot = |assignment: &Assignment<'_>| -> Result<SlotResult, PipelineError> {
        if config.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let slot = assignment.slot;
        let topic = assignment.topic;
        let request = ResolveRequest {
            topic,
            context,
            week: slot.week,
            position: assignment.position,
            total: assignment.topic_total,
        };
        let resolution = resolver.resolve(&request, &cache)?;

        let failure = resolution.failure.map(|reason| SlotFailure {
            week: slot.week,
            lesson: slot.lesson,
            substrand: topic.substrand.clone(),
            reason,
        });
        let record = LessonRecord {
            week: slot.week,
            lesson: slot.lesson,
            strand: topic.strand.clone(),
            substrand: topic.substrand.clone(),
            content: resolution.content,
            source: resolution.source,
            confidence: resolution.confidence,
            is_authoritative: resolution.source.is_authoritative(),
        };

        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        config.progress.on_event(&ProgressEvent {
            completed_slots: done,
            total_slots: total,
            week: slot.week,
            lesson: slot.lesson,
            current_source: record.source,
            current_confidence: record.confidence,
        });

        Ok((record, failure))
    };

    let workers = config.settings.pipeline.workers.max(1);
    let results: Vec<SlotResult> = if workers == 1 {
        assignments
            .iter()
            .map(resolve_slot)
            .collect::<Result<_, _>>()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;
        pool.install(|| {
            assignments
                .par_iter()
                .map(resolve_slot)
                .collect::<Result<_, _>>()
        })?
    };

    if config.cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let mut lessons = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (record, failure) in results {
        lessons.push(record);
        failures.extend(failure);
    }

    let scheme = Scheme::new(
        context.clone(),
        calendar.clone(),
        schedule.into_vec(),
        lessons,
        failures,
        usage.snapshot(),
    );
    info!(
        "Scheme ready: {} lessons, {} failed slots, {} cache hits, average confidence {:.2}",
        scheme.metrics.total_lessons,
        scheme.failures.len(),
        cache.hits(),
        scheme.metrics.average_confidence
    );
    Ok(scheme)
}
