//! Slot arithmetic for a teaching term.
//!
//! A term is laid out as `weeks × lessons_per_week`. Every (week, lesson)
//! coordinate maps to an absolute 1-based slot index:
//! `slot = (week - 1) * lessons_per_week + lesson`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised while building a calendar or scheduling breaks.
///
/// All of these are configuration errors: the caller must fix the input
/// before retrying, and scheme generation never starts on invalid input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid term range: {0}")]
    InvalidRange(String),
    #[error("invalid double lesson {first}-{second}: {reason}")]
    InvalidDoubleLesson {
        first: u32,
        second: u32,
        reason: String,
    },
    #[error("break title must not be empty")]
    EmptyTitle,
    #[error("break \"{title}\" starts at slot {start} but ends at slot {end}")]
    Order { title: String, start: u32, end: u32 },
    #[error(
        "break \"{title}\" (slots {start}-{end}) is outside the teaching term (slots {term_start}-{term_end})"
    )]
    OutOfRange {
        title: String,
        start: u32,
        end: u32,
        term_start: u32,
        term_end: u32,
    },
    #[error("break \"{title}\" overlaps with \"{existing}\"")]
    Overlap { title: String, existing: String },
}

/// Longest term a calendar may span, in weeks.
pub const MAX_WEEKS: u32 = 53;

/// Most lessons a calendar may schedule per week.
pub const MAX_LESSONS_PER_WEEK: u32 = 20;

/// Convert a 1-based (week, lesson) coordinate into an absolute slot index.
///
/// Saturates at `u32::MAX`; use [`checked_slot`] for unvalidated input.
pub fn to_slot(week: u32, lesson: u32, lessons_per_week: u32) -> u32 {
    checked_slot(week, lesson, lessons_per_week).unwrap_or(u32::MAX)
}

/// Like [`to_slot`], but `None` when the index does not fit in a `u32`.
pub fn checked_slot(week: u32, lesson: u32, lessons_per_week: u32) -> Option<u32> {
    week.saturating_sub(1)
        .checked_mul(lessons_per_week)?
        .checked_add(lesson)
}

/// Convert an absolute slot index back into its (week, lesson) coordinate.
pub fn to_week_lesson(slot: u32, lessons_per_week: u32) -> (u32, u32) {
    debug_assert!(slot >= 1 && lessons_per_week >= 1);
    let zero_based = slot.saturating_sub(1);
    let per_week = lessons_per_week.max(1);
    (zero_based / per_week + 1, zero_based % per_week + 1)
}

/// Two adjacent lessons within a week taught as one merged unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleLesson {
    pub first: u32,
    pub second: u32,
}

/// The lesson part of a slot label: a single lesson or a merged pair ("2-3").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum LessonLabel {
    Single(u32),
    Double(u32, u32),
}

impl LessonLabel {
    /// The first lesson number covered by this label.
    pub fn first(&self) -> u32 {
        match *self {
            LessonLabel::Single(n) | LessonLabel::Double(n, _) => n,
        }
    }

    pub fn is_double(&self) -> bool {
        matches!(self, LessonLabel::Double(..))
    }
}

impl fmt::Display for LessonLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LessonLabel::Single(n) => write!(f, "{n}"),
            LessonLabel::Double(a, b) => write!(f, "{a}-{b}"),
        }
    }
}

impl From<LessonLabel> for String {
    fn from(label: LessonLabel) -> Self {
        label.to_string()
    }
}

impl TryFrom<String> for LessonLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parse = |s: &str| {
            s.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid lesson label: {value:?}"))
        };
        match value.split_once('-') {
            Some((a, b)) => Ok(LessonLabel::Double(parse(a)?, parse(b)?)),
            None => Ok(LessonLabel::Single(parse(&value)?)),
        }
    }
}

/// One unit of scheduled teaching time on the materialized timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Absolute slot index (for a merged double lesson, the index of its first lesson).
    pub index: u32,
    pub week: u32,
    pub lesson: LessonLabel,
    pub is_break: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_title: Option<String>,
}

/// Raw calendar input as entered by a teacher.
///
/// A missing `lessons_per_week` deserializes as 0 and is rejected by
/// [`TermCalendar::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSpec {
    #[serde(default)]
    pub lessons_per_week: u32,
    pub first_week: u32,
    pub first_lesson: u32,
    pub last_week: u32,
    pub last_lesson: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_lesson: Option<DoubleLesson>,
}

/// A validated teaching term. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CalendarSpec", into = "CalendarSpec")]
pub struct TermCalendar {
    spec: CalendarSpec,
    start_slot: u32,
    end_slot: u32,
}

impl TermCalendar {
    /// Validate a calendar spec and compute its slot range.
    pub fn build(spec: &CalendarSpec) -> Result<Self, ScheduleError> {
        let lpw = spec.lessons_per_week;
        if lpw == 0 {
            return Err(ScheduleError::InvalidRange(
                "lessons_per_week must be a positive integer".to_string(),
            ));
        }
        if lpw > MAX_LESSONS_PER_WEEK {
            return Err(ScheduleError::InvalidRange(format!(
                "lessons_per_week ({lpw}) exceeds {MAX_LESSONS_PER_WEEK}"
            )));
        }

        for (label, week, lesson) in [
            ("first", spec.first_week, spec.first_lesson),
            ("last", spec.last_week, spec.last_lesson),
        ] {
            if week < 1 || lesson < 1 {
                return Err(ScheduleError::InvalidRange(format!(
                    "{label} week and lesson must be at least 1"
                )));
            }
            if lesson > lpw {
                return Err(ScheduleError::InvalidRange(format!(
                    "{label} lesson {lesson} exceeds {lpw} lessons per week"
                )));
            }
            if week > MAX_WEEKS {
                return Err(ScheduleError::InvalidRange(format!(
                    "{label} week {week} exceeds {MAX_WEEKS}"
                )));
            }
        }

        if let Some(double) = spec.double_lesson {
            validate_double(double, lpw)?;
        }

        let overflow = || ScheduleError::InvalidRange("term is too long".to_string());
        let start_slot = checked_slot(spec.first_week, spec.first_lesson, lpw).ok_or_else(overflow)?;
        let end_slot = checked_slot(spec.last_week, spec.last_lesson, lpw).ok_or_else(overflow)?;
        if start_slot >= end_slot {
            return Err(ScheduleError::InvalidRange(format!(
                "start (week {}, lesson {}) must come before end (week {}, lesson {})",
                spec.first_week, spec.first_lesson, spec.last_week, spec.last_lesson
            )));
        }

        Ok(Self {
            spec: spec.clone(),
            start_slot,
            end_slot,
        })
    }

    pub fn lessons_per_week(&self) -> u32 {
        self.spec.lessons_per_week
    }

    pub fn start_slot(&self) -> u32 {
        self.start_slot
    }

    pub fn end_slot(&self) -> u32 {
        self.end_slot
    }

    pub fn double_lesson(&self) -> Option<DoubleLesson> {
        self.spec.double_lesson
    }

    pub fn spec(&self) -> &CalendarSpec {
        &self.spec
    }

    /// Number of slot indices in the teaching range, before breaks and merging.
    pub fn total_slots(&self) -> u32 {
        self.end_slot - self.start_slot + 1
    }

    /// Whether `slot` lies within the teaching range (inclusive).
    pub fn contains(&self, slot: u32) -> bool {
        (self.start_slot..=self.end_slot).contains(&slot)
    }

    pub fn slot_of(&self, week: u32, lesson: u32) -> u32 {
        to_slot(week, lesson, self.spec.lessons_per_week)
    }

    pub fn week_lesson(&self, slot: u32) -> (u32, u32) {
        to_week_lesson(slot, self.spec.lessons_per_week)
    }
}

impl TryFrom<CalendarSpec> for TermCalendar {
    type Error = ScheduleError;

    fn try_from(spec: CalendarSpec) -> Result<Self, Self::Error> {
        Self::build(&spec)
    }
}

impl From<TermCalendar> for CalendarSpec {
    fn from(calendar: TermCalendar) -> Self {
        calendar.spec
    }
}

fn validate_double(double: DoubleLesson, lessons_per_week: u32) -> Result<(), ScheduleError> {
    let invalid = |reason: String| ScheduleError::InvalidDoubleLesson {
        first: double.first,
        second: double.second,
        reason,
    };
    if double.first < 1 || double.second > lessons_per_week {
        return Err(invalid(format!(
            "lessons must lie within 1-{lessons_per_week}"
        )));
    }
    if double.second != double.first + 1 {
        return Err(invalid("lessons must be adjacent".to_string()));
    }
    Ok(())
}
