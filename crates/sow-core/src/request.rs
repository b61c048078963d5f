//! A complete scheme-generation request as read from a TOML or JSON file.

use crate::breaks::{Break, BreakSchedule, schedule_breaks};
use crate::calendar::{CalendarSpec, ScheduleError, TermCalendar};
use crate::model::{GradeContext, Topic};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Everything needed to generate one scheme of work.
///
/// ```toml
/// [context]
/// learning_area = "Integrated Science"
/// grade = "Grade 7"
///
/// [calendar]
/// lessons_per_week = 5
/// first_week = 1
/// first_lesson = 1
/// last_week = 12
/// last_lesson = 5
///
/// [[breaks]]
/// title = "Half term"
/// start_week = 6
/// start_lesson = 1
/// end_week = 6
/// end_lesson = 5
///
/// [[topics]]
/// strand = "Human Body Systems"
/// substrand = "The Digestive System"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemeRequest {
    pub context: GradeContext,
    pub calendar: CalendarSpec,
    #[serde(default)]
    pub breaks: Vec<Break>,
    pub topics: Vec<Topic>,
}

impl SchemeRequest {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse scheme request TOML")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("failed to parse scheme request JSON")
    }

    pub fn build_calendar(&self) -> Result<TermCalendar, ScheduleError> {
        TermCalendar::build(&self.calendar)
    }

    pub fn build_breaks(&self, calendar: &TermCalendar) -> Result<BreakSchedule, ScheduleError> {
        schedule_breaks(calendar, &self.breaks)
    }
}
