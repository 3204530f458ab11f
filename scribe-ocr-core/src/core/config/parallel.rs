//! Shared parallel processing configuration.

use serde::{Deserialize, Serialize};

/// Thresholds that decide when the engine switches from sequential to
/// rayon-parallel execution, plus the page pipeline's worker count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Maximum number of page workers. `None` uses the available parallelism.
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Line batches of at most this many lines are recognized sequentially.
    /// Default: 1
    #[serde(default = "ParallelPolicy::default_line_threshold")]
    pub line_threshold: usize,

    /// Capacity of the bounded channels in the page pipeline.
    /// Default: 4
    #[serde(default = "ParallelPolicy::default_channel_capacity")]
    pub channel_capacity: usize,
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of page workers.
    pub fn with_max_threads(mut self, max_threads: Option<usize>) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the sequential line threshold.
    pub fn with_line_threshold(mut self, threshold: usize) -> Self {
        self.line_threshold = threshold;
        self
    }

    /// Set the page pipeline channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Number of page workers to spawn for `pages` inputs.
    pub fn worker_count(&self, pages: usize) -> usize {
        let available = self.max_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        available.clamp(1, pages.max(1))
    }

    /// Whether `lines` lines should be recognized in parallel.
    pub fn parallel_lines(&self, lines: usize) -> bool {
        lines > self.line_threshold
    }

    fn default_line_threshold() -> usize {
        1
    }

    fn default_channel_capacity() -> usize {
        4
    }
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            max_threads: None,
            line_threshold: Self::default_line_threshold(),
            channel_capacity: Self::default_channel_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_bounded_by_pages() {
        let policy = ParallelPolicy::new().with_max_threads(Some(8));
        assert_eq!(policy.worker_count(3), 3);
        assert_eq!(policy.worker_count(0), 1);
        assert_eq!(policy.worker_count(20), 8);
    }

    #[test]
    fn test_serde_defaults() {
        let policy: ParallelPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.line_threshold, 1);
        assert_eq!(policy.channel_capacity, 4);
        assert!(policy.parallel_lines(2));
        assert!(!policy.parallel_lines(1));
    }
}
