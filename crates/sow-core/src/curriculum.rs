//! Read-only access to authoritative curriculum content.
//!
//! [`CurriculumStore`] is the seam to whatever holds official curriculum
//! designs; [`CurriculumCatalog`] is an in-memory implementation loaded from
//! JSON, used by the CLI and tests.

use crate::model::LessonContent;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Errors from a curriculum data store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("curriculum store unavailable: {0}")]
    Unavailable(String),
    #[error("curriculum query failed: {0}")]
    Query(String),
}

/// One authoritative curriculum entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumRecord {
    pub learning_area: String,
    pub grade: String,
    #[serde(default)]
    pub strand: String,
    pub substrand: String,
    /// Set for week-keyed entries of a term plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<u32>,
    #[serde(flatten)]
    pub content: LessonContent,
}

/// Lookups against authoritative curriculum content.
pub trait CurriculumStore: Send + Sync {
    /// Content for an exact (learning area, grade, substrand) match.
    fn find_substrand(
        &self,
        learning_area: &str,
        grade: &str,
        substrand: &str,
    ) -> Result<Option<CurriculumRecord>, StoreError>;

    /// Every substrand entry for a learning area and grade.
    fn substrands(
        &self,
        learning_area: &str,
        grade: &str,
    ) -> Result<Vec<CurriculumRecord>, StoreError>;

    /// The week-keyed entry for a learning area and grade, if any.
    fn find_week(
        &self,
        learning_area: &str,
        grade: &str,
        week: u32,
    ) -> Result<Option<CurriculumRecord>, StoreError>;
}

/// In-memory curriculum store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurriculumCatalog {
    pub records: Vec<CurriculumRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Wrapped(CurriculumCatalog),
    Bare(Vec<CurriculumRecord>),
}

impl CurriculumCatalog {
    pub fn new(records: Vec<CurriculumRecord>) -> Self {
        Self { records }
    }

    /// Parse a catalog from JSON: either `{"records": [...]}` or a bare array.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile =
            serde_json::from_str(json).context("failed to parse curriculum catalog")?;
        Ok(match file {
            CatalogFile::Wrapped(catalog) => catalog,
            CatalogFile::Bare(records) => Self::new(records),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn scoped<'a>(
        &'a self,
        learning_area: &'a str,
        grade: &'a str,
    ) -> impl Iterator<Item = &'a CurriculumRecord> + 'a {
        self.records.iter().filter(move |r| {
            same_text(&r.learning_area, learning_area) && same_text(&r.grade, grade)
        })
    }
}

impl CurriculumStore for CurriculumCatalog {
    fn find_substrand(
        &self,
        learning_area: &str,
        grade: &str,
        substrand: &str,
    ) -> Result<Option<CurriculumRecord>, StoreError> {
        Ok(self
            .scoped(learning_area, grade)
            .find(|r| r.week.is_none() && same_text(&r.substrand, substrand))
            .cloned())
    }

    fn substrands(
        &self,
        learning_area: &str,
        grade: &str,
    ) -> Result<Vec<CurriculumRecord>, StoreError> {
        Ok(self
            .scoped(learning_area, grade)
            .filter(|r| r.week.is_none())
            .cloned()
            .collect())
    }

    fn find_week(
        &self,
        learning_area: &str,
        grade: &str,
        week: u32,
    ) -> Result<Option<CurriculumRecord>, StoreError> {
        Ok(self
            .scoped(learning_area, grade)
            .find(|r| r.week == Some(week))
            .cloned())
    }
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
