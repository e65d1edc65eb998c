//! Per-model attempt counters, exposed on `/health`.
//!
//! Observability only. Nothing reads these counters to make routing decisions.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RateLimited,
    Unavailable,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    pub attempts: u64,
    pub successes: u64,
    pub rate_limited: u64,
    pub unavailable: u64,
    pub failed: u64,
}

#[derive(Clone, Default)]
pub struct UsageTracker {
    counters: Arc<DashMap<String, ModelUsage>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, model: &str, outcome: AttemptOutcome) {
        let mut usage = self.counters.entry(model.to_string()).or_default();
        usage.attempts += 1;
        match outcome {
            AttemptOutcome::Success => usage.successes += 1,
            AttemptOutcome::RateLimited => usage.rate_limited += 1,
            AttemptOutcome::Unavailable => usage.unavailable += 1,
            AttemptOutcome::Failed => usage.failed += 1,
        }
    }

    pub fn get(&self, model: &str) -> ModelUsage {
        self.counters
            .get(model)
            .map(|u| u.clone())
            .unwrap_or_default()
    }

    /// Sorted copy of all counters.
    pub fn snapshot(&self) -> BTreeMap<String, ModelUsage> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_attempts_and_outcomes() {
        let tracker = UsageTracker::new();
        tracker.record("groq:a", AttemptOutcome::RateLimited);
        tracker.record("groq:a", AttemptOutcome::Success);
        tracker.record("openai:b", AttemptOutcome::Unavailable);

        let a = tracker.get("groq:a");
        assert_eq!(a.attempts, 2);
        assert_eq!(a.successes, 1);
        assert_eq!(a.rate_limited, 1);
        assert_eq!(tracker.get("openai:b").unavailable, 1);
        assert_eq!(tracker.get("missing"), ModelUsage::default());
    }

    #[test]
    fn test_clones_share_counters() {
        let tracker = UsageTracker::new();
        let clone = tracker.clone();
        clone.record("m", AttemptOutcome::Failed);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["m"].failed, 1);
    }
}
