//! The core module of the engine.
//!
//! This module contains the fundamental components shared by every stage:
//! - Configuration validation, parallelism policy and ONNX Runtime settings
//! - Error handling
//! - ONNX Runtime session pooling and tensor conversion
//! - Traits defining the model interfaces
//!
//! It also re-exports commonly used types for convenience.

pub mod config;
pub mod errors;
pub mod inference;
pub mod traits;

pub use config::{ConfigError, ConfigValidator, OrtSessionConfig, ParallelPolicy};
pub use errors::{ModelInferenceErrorBuilder, OCRError, OcrResult, ProcessingStage};
pub use inference::{OrtInfer, TensorInput, TensorOutput};
pub use traits::{
    ModelInfo, ModelKind, PairwiseOrderModel, SegmentationModel, SequenceModel,
};

/// Initializes the tracing subscriber for logging.
///
/// Installs a registry with an `EnvFilter` read from `RUST_LOG` and a
/// formatting layer. Calling it again after a subscriber is installed is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
