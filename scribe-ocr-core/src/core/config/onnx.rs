//! ONNX Runtime session configuration.

use serde::{Deserialize, Serialize};

/// Graph optimization level for ONNX Runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Basic optimizations.
    #[default]
    Level1,
    /// Extended optimizations.
    Level2,
    /// All optimizations.
    Level3,
}

/// Execution provider for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum OrtExecutionProvider {
    /// CPU execution (always available).
    #[default]
    CPU,
    /// CUDA execution (requires the `cuda` feature).
    CUDA {
        /// GPU device id.
        device_id: Option<i32>,
    },
}

/// Session settings applied when a model file is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrtSessionConfig {
    /// Threads used within nodes.
    #[serde(default)]
    pub intra_threads: Option<usize>,
    /// Threads used across nodes.
    #[serde(default)]
    pub inter_threads: Option<usize>,
    /// Graph optimization level.
    #[serde(default)]
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Execution providers in priority order.
    #[serde(default)]
    pub execution_providers: Option<Vec<OrtExecutionProvider>>,
    /// Number of sessions in the pool. Concurrent calls beyond this block.
    #[serde(default = "OrtSessionConfig::default_session_pool_size")]
    pub session_pool_size: usize,
}

impl OrtSessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    pub fn with_optimization_level(mut self, level: OrtGraphOptimizationLevel) -> Self {
        self.optimization_level = Some(level);
        self
    }

    pub fn with_execution_providers(mut self, providers: Vec<OrtExecutionProvider>) -> Self {
        self.execution_providers = Some(providers);
        self
    }

    pub fn with_session_pool_size(mut self, size: usize) -> Self {
        self.session_pool_size = size.max(1);
        self
    }

    fn default_session_pool_size() -> usize {
        1
    }
}

impl Default for OrtSessionConfig {
    fn default() -> Self {
        Self {
            intra_threads: None,
            inter_threads: None,
            optimization_level: None,
            execution_providers: None,
            session_pool_size: Self::default_session_pool_size(),
        }
    }
}
