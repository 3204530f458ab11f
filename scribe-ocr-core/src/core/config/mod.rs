//! Shared configuration types: validation, parallelism and ONNX Runtime sessions.

pub mod errors;
pub mod onnx;
pub mod parallel;

pub use errors::{ConfigError, ConfigValidator};
pub use onnx::{OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig};
pub use parallel::ParallelPolicy;
