//! Running token usage across all backend calls of one request.

use crate::provider::Completion;
use sow_core::model::TokenUsage;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe token counter shared by every worker of a scheme request.
#[derive(Debug, Default)]
pub struct UsageTracker {
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    calls: AtomicU64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage from a completion.
    pub fn record(&self, completion: &Completion) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(t) = completion.input_tokens {
            self.input_tokens.fetch_add(t, Ordering::Relaxed);
        }
        if let Some(t) = completion.output_tokens {
            self.output_tokens.fetch_add(t, Ordering::Relaxed);
        }
    }

    /// Number of backend calls that returned a completion.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_skips_missing_counts() {
        let tracker = UsageTracker::new();
        tracker.record(&Completion {
            text: String::new(),
            input_tokens: Some(120),
            output_tokens: None,
        });
        tracker.record(&Completion {
            text: String::new(),
            input_tokens: Some(80),
            output_tokens: Some(40),
        });
        assert_eq!(tracker.calls(), 2);
        assert_eq!(
            tracker.snapshot(),
            TokenUsage {
                input_tokens: 200,
                output_tokens: 40,
            }
        );
    }
}
