//! Integration tests for sow-cli functionality.
//! Tests the underlying library functions that the CLI commands invoke.

use sow_core::allocator::allocate_with;
use sow_core::breaks::{materialize_timeline, teaching_slots};
use sow_core::config::SowConfig;
use sow_core::model::{ContentSource, LessonContent, SchemeStatus};
use sow_core::storage;
use sow_gen::progress::NoProgress;
use sow_gen::validator::Rule;
use sow_gen::{CancelToken, Completion, GenerateOptions, ProviderError, SchemeConfig, TextBackend};
use std::fs;
use std::path::{Path, PathBuf};

const REQUEST: &str = r#"
[context]
learning_area = "Integrated Science"
grade = "Grade 7"

[calendar]
lessons_per_week = 3
first_week = 1
first_lesson = 1
last_week = 4
last_lesson = 3

[[breaks]]
title = "Half term"
start_week = 2
start_lesson = 1
end_week = 2
end_lesson = 3

[[topics]]
strand = "Human Body Systems"
substrand = "The Digestive System"

[[topics]]
strand = "Human Body Systems"
substrand = "Circulation"
"#;

const CATALOG: &str = r#"[
  {
    "learning_area": "Integrated Science",
    "grade": "Grade 7",
    "strand": "Human Body Systems",
    "substrand": "The Digestive System",
    "learning_outcomes": ["Identify organs", "Describe digestion", "Appreciate healthy diets"],
    "learning_experiences": ["Learners model the gut"],
    "key_inquiry_questions": ["Why do we digest food?"],
    "learning_resources": ["Charts"],
    "assessment_methods": ["Observation"]
  }
]"#;

/// Always answers with the same lesson, aligned to whatever substrand the
/// prompt names.
struct FixedBackend;

impl TextBackend for FixedBackend {
    fn generate(
        &self,
        prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<Completion, ProviderError> {
        let substrand = prompt
            .lines()
            .find_map(|l| l.strip_prefix("- Substrand: "))
            .unwrap_or("the topic");
        let reply = serde_json::json!({
            "learning_outcomes": [
                format!("Identify key ideas of {substrand}"),
                format!("Explain {substrand} in daily life"),
                format!("Appreciate the importance of {substrand}")
            ],
            "learning_experiences": [format!("Learners explore {substrand} in groups")],
            "key_inquiry_questions": [format!("How does {substrand} affect us?")],
            "assessment_methods": ["Observation"],
            "learning_resources": ["Charts"]
        });
        Ok(Completion::from_text(reply.to_string()))
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_timeline_from_request_file() {
    let tmpdir = tempfile::tempdir().unwrap();
    let path = write_file(tmpdir.path(), "request.toml", REQUEST);

    let request = storage::load_request(&path).unwrap();
    let calendar = request.build_calendar().unwrap();
    let schedule = request.build_breaks(&calendar).unwrap();
    let timeline = materialize_timeline(&calendar, schedule.as_slice());
    let slots = teaching_slots(&timeline);

    assert_eq!(timeline.len(), 12);
    assert_eq!(slots.len(), 9);
    let labelled: Vec<_> = timeline
        .iter()
        .filter_map(|s| s.break_title.as_deref())
        .collect();
    assert_eq!(labelled, vec!["Half term"; 3]);

    let config = SowConfig::default();
    let assignments = allocate_with(&request.topics, &slots, config.allocation.strategy).unwrap();
    assert_eq!(assignments.len(), 9);
    assert!(assignments.iter().all(|a| a.slot.week != 2));
}

#[test]
fn test_missing_request_file() {
    let tmpdir = tempfile::tempdir().unwrap();
    let result = storage::load_request(&tmpdir.path().join("missing.toml"));
    assert!(result.is_err());
}

#[test]
fn test_config_file_is_loaded_from_project_root() {
    let tmpdir = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmpdir.path().join(".sow")).unwrap();
    write_file(
        &tmpdir.path().join(".sow"),
        "config.toml",
        "[generation]\nmax_attempts = 4\n\n[allocation]\nstrategy = \"largest_remainder\"\n",
    );

    let config = SowConfig::load(tmpdir.path()).unwrap();
    assert_eq!(config.generation.max_attempts, 4);
    assert_eq!(
        config.allocation.strategy,
        sow_core::allocator::AllocationStrategy::LargestRemainder
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmpdir = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmpdir.path().join(".sow")).unwrap();
    write_file(
        &tmpdir.path().join(".sow"),
        "config.toml",
        "[generation]\nmax_attempts = 0\n",
    );

    assert!(SowConfig::load(tmpdir.path()).is_err());
}

#[test]
fn test_generate_and_save_scheme() {
    let tmpdir = tempfile::tempdir().unwrap();
    let request = storage::load_request(&write_file(tmpdir.path(), "request.toml", REQUEST)).unwrap();
    let catalog = storage::load_catalog(&write_file(tmpdir.path(), "catalog.json", CATALOG)).unwrap();
    let settings = SowConfig::default();
    let backend = FixedBackend;

    let config = SchemeConfig {
        backend: &backend,
        store: &catalog,
        settings: &settings,
        progress: &NoProgress,
        cancel: CancelToken::new(),
    };
    let calendar = request.build_calendar().unwrap();
    let scheme = sow_gen::generate_scheme(
        &calendar,
        &request.breaks,
        &request.topics,
        &request.context,
        &config,
    )
    .unwrap();

    assert_eq!(scheme.status(), SchemeStatus::Complete);
    assert_eq!(scheme.lessons.len(), 9);
    assert_eq!(scheme.lessons[0].source, ContentSource::AuthoritativeExact);
    assert!(
        scheme
            .lessons
            .iter()
            .filter(|l| l.substrand == "Circulation")
            .all(|l| l.source == ContentSource::GuidedGeneration)
    );

    let output = storage::scheme_file(tmpdir.path());
    storage::save_scheme(&output, &scheme).unwrap();
    let loaded = storage::load_scheme(&output).unwrap();
    assert_eq!(loaded.lessons.len(), 9);
    assert_eq!(loaded.metrics.sources, scheme.metrics.sources);
}

#[test]
fn test_validate_lesson_file() {
    let tmpdir = tempfile::tempdir().unwrap();
    let path = write_file(
        tmpdir.path(),
        "lesson.json",
        r#"{
            "learning_outcomes": ["Explain digestion"],
            "learning_experiences": ["Teacher explains digestion"],
            "key_inquiry_questions": ["What is digestion?"],
            "assessment_methods": ["Final exam"],
            "learning_resources": ["Charts"]
        }"#,
    );

    let content: LessonContent =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    let report = sow_gen::validate(&content, Some("The Digestive System"));

    assert!(!report.is_valid);
    assert!(report.has(Rule::OutcomeProgression));
    assert!(report.has(Rule::LearnerCentred));
    assert!(report.has(Rule::AssessmentMethods));
}

#[test]
fn test_unknown_provider_lists_available() {
    let err = sow_gen::create_provider(
        "nonexistent",
        "",
        None,
        None,
        std::time::Duration::from_secs(5),
    )
    .err()
    .unwrap();
    let message = err.to_string();
    for name in sow_gen::available_providers() {
        assert!(message.contains(name), "{message}");
    }
}
