//! The error enum surfaced by every fallible engine operation.

use std::path::PathBuf;
use thiserror::Error;

/// Stage of the engine an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Page or line tensor preparation.
    TensorOperation,
    /// Page batch orchestration.
    BatchProcessing,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::BatchProcessing => write!(f, "batch processing"),
        }
    }
}

/// Errors surfaced to callers of the engine.
#[derive(Error, Debug)]
pub enum OCRError {
    /// A grapheme cluster has no codec mapping and no fallback class is configured.
    #[error("out of vocabulary: no codec mapping for {grapheme:?} at byte offset {offset}")]
    OutOfVocabulary {
        /// The grapheme cluster that could not be encoded.
        grapheme: String,
        /// Byte offset of the cluster in the encoded text.
        offset: usize,
    },

    /// A line crop or its posterior tensor cannot be recognized.
    #[error("recognition failure: {reason}")]
    RecognitionFailure {
        /// Why the line could not be recognized.
        reason: String,
    },

    /// Invalid codec definition or label sequence.
    #[error("codec: {message}")]
    Codec {
        /// A message describing the problem.
        message: String,
    },

    /// Error during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error raised by a model forward pass.
    #[error("inference with model '{model_name}' failed: {context}")]
    Inference {
        /// Name of the model.
        model_name: String,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Detailed forward-pass failure with operation and input shape.
    #[error(
        "model '{model_name}' failed during {operation} (input shape {input_shape:?}): {context}"
    )]
    ModelInference {
        /// Name of the model.
        model_name: String,
        /// Operation being performed.
        operation: String,
        /// Shape of the primary input tensor.
        input_shape: Vec<usize>,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A model file could not be loaded.
    #[error(
        "failed to load model from {}: {reason}{}",
        .path.display(),
        .suggestion.as_deref().map(|s| format!(" ({s})")).unwrap_or_default()
    )]
    ModelLoad {
        /// Path of the model file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
        /// A hint for the caller.
        suggestion: Option<String>,
        /// The underlying error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid input supplied by the caller.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// The batch was cancelled before it completed.
    #[error("batch cancelled")]
    Cancelled,

    /// Error decoding an image buffer.
    #[error("image")]
    Image(#[from] image::ImageError),

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// Error parsing a JSON definition.
    #[error("json")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}
