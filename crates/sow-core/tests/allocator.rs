use sow_core::allocator::*;
use sow_core::calendar::{LessonLabel, Slot};
use sow_core::model::{LessonContent, Topic};

fn make_slots(n: u32) -> Vec<Slot> {
    (1..=n)
        .map(|index| Slot {
            index,
            week: (index - 1) / 5 + 1,
            lesson: LessonLabel::Single((index - 1) % 5 + 1),
            is_break: false,
            break_title: None,
        })
        .collect()
}

fn make_topics(weights: &[u32]) -> Vec<Topic> {
    weights
        .iter()
        .enumerate()
        .map(|(i, &w)| Topic::new("Strand", format!("Substrand {i}")).with_weight(w))
        .collect()
}

fn counts(assignments: &[Assignment<'_>], topics: usize) -> Vec<usize> {
    let mut counts = vec![0; topics];
    for a in assignments {
        counts[a.topic_index] += 1;
    }
    counts
}

#[test]
fn test_equal_weights_split_evenly() {
    let topics = make_topics(&[1, 1, 1]);
    let slots = make_slots(9);
    let assignments = allocate(&topics, &slots).unwrap();
    assert_eq!(assignments.len(), 9);
    assert_eq!(counts(&assignments, 3), vec![3, 3, 3]);
    // Topics keep their order and stay contiguous.
    let order: Vec<usize> = assignments.iter().map(|a| a.topic_index).collect();
    assert_eq!(order, vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);
}

#[test]
fn test_length_always_matches_slots() {
    for n in 1..=40 {
        let slots = make_slots(n);
        for weights in [&[1][..], &[1, 2], &[3, 1, 1], &[5, 1, 1, 1, 7], &[1; 11]] {
            let topics = make_topics(weights);
            for strategy in [
                AllocationStrategy::Rounded,
                AllocationStrategy::LargestRemainder,
            ] {
                let assignments = allocate_with(&topics, &slots, strategy).unwrap();
                assert_eq!(assignments.len(), slots.len());
                for (a, slot) in assignments.iter().zip(&slots) {
                    assert_eq!(a.slot.index, slot.index);
                }
            }
        }
    }
}

#[test]
fn test_short_queue_is_padded_by_cycling() {
    // 3 * 1/3 rounds to 1 each: exact; 4 slots needs one pad from the first topic.
    let topics = make_topics(&[1, 1, 1]);
    let slots = make_slots(4);
    let assignments = allocate(&topics, &slots).unwrap();
    let order: Vec<usize> = assignments.iter().map(|a| a.topic_index).collect();
    assert_eq!(order, vec![0, 1, 2, 0]);
}

#[test]
fn test_long_queue_is_truncated() {
    // Every topic gets at least one entry, so 5 topics over 3 slots truncates.
    let topics = make_topics(&[1, 1, 1, 1, 1]);
    let slots = make_slots(3);
    let assignments = allocate(&topics, &slots).unwrap();
    let order: Vec<usize> = assignments.iter().map(|a| a.topic_index).collect();
    assert_eq!(order, vec![0, 1, 2]);
}

#[test]
fn test_weight_from_official_outcomes() {
    let official = LessonContent {
        learning_outcomes: vec!["a".into(), "b".into(), "c".into()],
        ..LessonContent::default()
    };
    let topics = vec![
        Topic::new("S", "Heavy").with_official(official),
        Topic::new("S", "Light"),
    ];
    assert_eq!(topics[0].weight(), 3);
    assert_eq!(topics[1].weight(), 1);

    let slots = make_slots(8);
    let assignments = allocate(&topics, &slots).unwrap();
    assert_eq!(counts(&assignments, 2), vec![6, 2]);
}

#[test]
fn test_positions_within_topic() {
    let topics = make_topics(&[2, 1]);
    let slots = make_slots(6);
    let assignments = allocate(&topics, &slots).unwrap();
    let first: Vec<(usize, usize)> = assignments
        .iter()
        .filter(|a| a.topic_index == 0)
        .map(|a| (a.position, a.topic_total))
        .collect();
    assert_eq!(first, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
}

#[test]
fn test_largest_remainder_is_exact() {
    // 10 slots, weights 1:1:1 → 3.33 each; one leftover goes to the first topic.
    let topics = make_topics(&[1, 1, 1]);
    let slots = make_slots(10);
    let assignments =
        allocate_with(&topics, &slots, AllocationStrategy::LargestRemainder).unwrap();
    assert_eq!(counts(&assignments, 3), vec![4, 3, 3]);

    // 7 slots, weights 1:2:4 → exactly 1, 2, 4.
    let topics = make_topics(&[1, 2, 4]);
    let slots = make_slots(7);
    let assignments =
        allocate_with(&topics, &slots, AllocationStrategy::LargestRemainder).unwrap();
    assert_eq!(counts(&assignments, 3), vec![1, 2, 4]);
}

#[test]
fn test_empty_inputs_rejected() {
    let slots = make_slots(3);
    assert_eq!(
        allocate(&[], &slots).unwrap_err(),
        AllocationError::EmptyInput("topics")
    );
    let topics = make_topics(&[1]);
    assert_eq!(
        allocate(&topics, &[]).unwrap_err(),
        AllocationError::EmptyInput("teaching slots")
    );
}
