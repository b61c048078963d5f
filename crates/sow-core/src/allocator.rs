//! Weighted distribution of curriculum topics over teaching slots.
//!
//! The default strategy is proportional share with guaranteed coverage: each
//! topic gets `max(1, round(slots * weight / total_weight))` consecutive
//! entries in a queue, the queue is padded by cycling the topic list or
//! truncated to the slot count, and slot `i` receives queue item `i`. Rounding
//! can over- or under-represent some topics by a slot or two; that
//! approximation is accepted. [`AllocationStrategy::LargestRemainder`] gives
//! an exact proportional split instead.

use crate::calendar::Slot;
use crate::model::Topic;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("cannot allocate: no {0} supplied")]
    EmptyInput(&'static str),
}

/// How topic shares are turned into whole slot counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Rounded shares, then pad by cycling topics or truncate.
    #[default]
    Rounded,
    /// Floor shares, then hand leftover slots to the largest remainders.
    LargestRemainder,
}

/// One teaching slot paired with its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub slot: &'a Slot,
    pub topic: &'a Topic,
    pub topic_index: usize,
    /// 1-based position of this slot among the topic's assigned slots.
    pub position: usize,
    /// Number of slots assigned to the topic overall.
    pub topic_total: usize,
}

/// Allocate topics to teaching slots with the default strategy.
pub fn allocate<'a>(
    topics: &'a [Topic],
    teaching_slots: &'a [Slot],
) -> Result<Vec<Assignment<'a>>, AllocationError> {
    allocate_with(topics, teaching_slots, AllocationStrategy::Rounded)
}

/// Allocate topics to teaching slots. The result always has exactly
/// `teaching_slots.len()` entries, in slot order.
pub fn allocate_with<'a>(
    topics: &'a [Topic],
    teaching_slots: &'a [Slot],
    strategy: AllocationStrategy,
) -> Result<Vec<Assignment<'a>>, AllocationError> {
    if topics.is_empty() {
        return Err(AllocationError::EmptyInput("topics"));
    }
    if teaching_slots.is_empty() {
        return Err(AllocationError::EmptyInput("teaching slots"));
    }

    let queue = match strategy {
        AllocationStrategy::Rounded => rounded_queue(topics, teaching_slots.len()),
        AllocationStrategy::LargestRemainder => {
            largest_remainder_queue(topics, teaching_slots.len())
        }
    };
    debug_assert_eq!(queue.len(), teaching_slots.len());

    let mut totals = vec![0usize; topics.len()];
    for &topic_index in &queue {
        totals[topic_index] += 1;
    }

    let mut seen = vec![0usize; topics.len()];
    Ok(teaching_slots
        .iter()
        .zip(queue)
        .map(|(slot, topic_index)| {
            seen[topic_index] += 1;
            Assignment {
                slot,
                topic: &topics[topic_index],
                topic_index,
                position: seen[topic_index],
                topic_total: totals[topic_index],
            }
        })
        .collect())
}

/// Topic indices in queue order: rounded shares, padded or truncated to `slots`.
fn rounded_queue(topics: &[Topic], slots: usize) -> Vec<usize> {
    let total_weight: u64 = topics.iter().map(|t| u64::from(t.weight())).sum();
    let slots_u64 = slots as u64;

    let mut queue = Vec::with_capacity(slots);
    for (index, topic) in topics.iter().enumerate() {
        // round(slots * weight / total), halves rounded up, in integer arithmetic
        let scaled = slots_u64 * u64::from(topic.weight());
        let share = ((2 * scaled + total_weight) / (2 * total_weight)).max(1);
        queue.extend(std::iter::repeat_n(index, share as usize));
    }

    let mut next = 0;
    while queue.len() < slots {
        queue.push(next % topics.len());
        next += 1;
    }
    queue.truncate(slots);
    queue
}

/// Topic indices in queue order with an exact largest-remainder split.
fn largest_remainder_queue(topics: &[Topic], slots: usize) -> Vec<usize> {
    let total_weight: u64 = topics.iter().map(|t| u64::from(t.weight())).sum();
    let slots_u64 = slots as u64;

    let mut shares: Vec<u64> = Vec::with_capacity(topics.len());
    let mut remainders: Vec<(u64, usize)> = Vec::with_capacity(topics.len());
    for (index, topic) in topics.iter().enumerate() {
        let scaled = slots_u64 * u64::from(topic.weight());
        shares.push(scaled / total_weight);
        remainders.push((scaled % total_weight, index));
    }

    let assigned: u64 = shares.iter().sum();
    let leftover = (slots_u64 - assigned) as usize;
    // Largest remainder first; ties go to the earlier topic.
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, index) in remainders.iter().take(leftover) {
        shares[index] += 1;
    }

    shares
        .iter()
        .enumerate()
        .flat_map(|(index, &share)| std::iter::repeat_n(index, share as usize))
        .collect()
}
