//! Term breaks: validation against the calendar and each other, and removal
//! of break slots from the teaching timeline.

use crate::calendar::{LessonLabel, ScheduleError, Slot, TermCalendar, checked_slot};
use serde::{Deserialize, Serialize};

/// A candidate break as entered by a teacher (e.g. half-term, exams week).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Break {
    pub title: String,
    pub start_week: u32,
    pub start_lesson: u32,
    pub end_week: u32,
    pub end_lesson: u32,
}

impl Break {
    pub fn new(
        title: impl Into<String>,
        (start_week, start_lesson): (u32, u32),
        (end_week, end_lesson): (u32, u32),
    ) -> Self {
        Self {
            title: title.into(),
            start_week,
            start_lesson,
            end_week,
            end_lesson,
        }
    }
}

/// An inclusive range of absolute slot indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: u32,
    pub end: u32,
}

impl SlotRange {
    pub fn contains(&self, slot: u32) -> bool {
        (self.start..=self.end).contains(&slot)
    }

    pub fn overlaps(&self, other: &SlotRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn slot_count(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// A break that passed validation, normalized to its slot range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledBreak {
    pub title: String,
    pub range: SlotRange,
}

/// Validate a candidate break against the calendar and the already-accepted breaks.
///
/// Stateless: returns the normalized slot range and leaves insertion to the
/// caller, who must call this before every insertion. [`BreakSchedule`] does both.
pub fn validate_break(
    candidate: &Break,
    existing: &[ScheduledBreak],
    calendar: &TermCalendar,
) -> Result<SlotRange, ScheduleError> {
    let title = candidate.title.trim();
    if title.is_empty() {
        return Err(ScheduleError::EmptyTitle);
    }

    let lpw = calendar.lessons_per_week();
    let start = checked_slot(candidate.start_week, candidate.start_lesson, lpw);
    let end = checked_slot(candidate.end_week, candidate.end_lesson, lpw);
    let out_of_range = || ScheduleError::OutOfRange {
        title: title.to_string(),
        start: start.unwrap_or(u32::MAX),
        end: end.unwrap_or(u32::MAX),
        term_start: calendar.start_slot(),
        term_end: calendar.end_slot(),
    };

    // A zero coordinate or a lesson past the end of the week would alias
    // another slot, so it counts as outside the term.
    let malformed = [
        candidate.start_week,
        candidate.start_lesson,
        candidate.end_week,
        candidate.end_lesson,
    ]
    .contains(&0)
        || candidate.start_lesson > lpw
        || candidate.end_lesson > lpw;
    let (Some(start), Some(end)) = (start, end) else {
        return Err(out_of_range());
    };
    if malformed {
        return Err(out_of_range());
    }

    if start > end {
        return Err(ScheduleError::Order {
            title: title.to_string(),
            start,
            end,
        });
    }
    if start < calendar.start_slot() || end > calendar.end_slot() {
        return Err(out_of_range());
    }

    let range = SlotRange { start, end };
    if let Some(conflict) = existing.iter().find(|b| b.range.overlaps(&range)) {
        return Err(ScheduleError::Overlap {
            title: title.to_string(),
            existing: conflict.title.clone(),
        });
    }

    Ok(range)
}

/// The accepted break set for one term.
#[derive(Debug, Clone, Default)]
pub struct BreakSchedule {
    breaks: Vec<ScheduledBreak>,
}

impl BreakSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `candidate` against everything accepted so far, then accept it.
    pub fn insert(
        &mut self,
        candidate: &Break,
        calendar: &TermCalendar,
    ) -> Result<&ScheduledBreak, ScheduleError> {
        let range = validate_break(candidate, &self.breaks, calendar)?;
        self.breaks.push(ScheduledBreak {
            title: candidate.title.trim().to_string(),
            range,
        });
        Ok(&self.breaks[self.breaks.len() - 1])
    }

    /// The accepted break owning `slot`, if any.
    pub fn find(&self, slot: u32) -> Option<&ScheduledBreak> {
        self.breaks.iter().find(|b| b.range.contains(slot))
    }

    pub fn as_slice(&self) -> &[ScheduledBreak] {
        &self.breaks
    }

    pub fn into_vec(self) -> Vec<ScheduledBreak> {
        self.breaks
    }

    pub fn len(&self) -> usize {
        self.breaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breaks.is_empty()
    }
}

/// Validate every candidate in order, aborting on the first invalid one.
pub fn schedule_breaks(
    calendar: &TermCalendar,
    candidates: &[Break],
) -> Result<BreakSchedule, ScheduleError> {
    let mut schedule = BreakSchedule::new();
    for candidate in candidates {
        schedule.insert(candidate, calendar)?;
    }
    Ok(schedule)
}

/// Enumerate every slot of the term, marking the ones covered by a break.
///
/// With a double-lesson combination `A-B`, lesson `A` becomes a single merged
/// slot labelled `"A-B"` and lesson `B` is never emitted. The break check runs
/// on the individual lesson number, so the merged slot is a teaching slot
/// whenever lesson `A` is outside every break.
pub fn materialize_timeline(calendar: &TermCalendar, breaks: &[ScheduledBreak]) -> Vec<Slot> {
    let double = calendar.double_lesson();
    let mut timeline = Vec::with_capacity(calendar.total_slots() as usize);

    for index in calendar.start_slot()..=calendar.end_slot() {
        let (week, lesson) = calendar.week_lesson(index);
        let label = match double {
            Some(d) if lesson == d.second => continue,
            Some(d) if lesson == d.first => LessonLabel::Double(d.first, d.second),
            _ => LessonLabel::Single(lesson),
        };

        let owner = breaks.iter().find(|b| b.range.contains(index));
        timeline.push(Slot {
            index,
            week,
            lesson: label,
            is_break: owner.is_some(),
            break_title: owner.map(|b| b.title.clone()),
        });
    }

    timeline
}

/// The teaching (non-break) slots of a timeline, in order.
pub fn teaching_slots(timeline: &[Slot]) -> Vec<Slot> {
    timeline.iter().filter(|s| !s.is_break).cloned().collect()
}
