//! Ergonomic constructors for [`OCRError`].

use super::types::{OCRError, ProcessingStage};
use crate::core::config::ConfigError;
use std::path::Path;

/// Builder for detailed `ModelInference` errors.
#[derive(Clone, Debug)]
pub struct ModelInferenceErrorBuilder {
    model_name: String,
    operation: String,
    input_shape: Vec<usize>,
    context: String,
}

impl ModelInferenceErrorBuilder {
    /// Creates a new builder with the required model metadata.
    pub fn new(model_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            operation: operation.into(),
            input_shape: Vec::new(),
            context: String::new(),
        }
    }

    /// Stores the input tensor shape for contextual debugging.
    pub fn input_shape(mut self, shape: &[usize]) -> Self {
        self.input_shape = shape.to_vec();
        self
    }

    /// Adds free-form context to the error message.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Consumes the builder and produces the final `OCRError`.
    pub fn build(self, error: impl std::error::Error + Send + Sync + 'static) -> OCRError {
        OCRError::ModelInference {
            model_name: self.model_name,
            operation: self.operation,
            input_shape: self.input_shape,
            context: self.context,
            source: Box::new(error),
        }
    }
}

impl OCRError {
    #[inline]
    fn processing_with_context(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an error for a failed tensor operation.
    pub fn tensor_operation(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::TensorOperation, context, error)
    }

    /// Creates an error for a failed page batch.
    pub fn batch_processing(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::BatchProcessing, context, error)
    }

    /// Creates an `InvalidInput` error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a `ConfigError`.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a `Codec` error.
    pub fn codec_error(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a `RecognitionFailure`.
    pub fn recognition_failure(reason: impl Into<String>) -> Self {
        Self::RecognitionFailure {
            reason: reason.into(),
        }
    }

    /// Creates an `OutOfVocabulary` error for `grapheme` found at byte `offset`.
    pub fn out_of_vocabulary(grapheme: impl Into<String>, offset: usize) -> Self {
        Self::OutOfVocabulary {
            grapheme: grapheme.into(),
            offset,
        }
    }

    /// Creates a model loading error.
    pub fn model_load_error(
        path: &Path,
        reason: impl Into<String>,
        suggestion: Option<&str>,
        error: Option<impl std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        Self::ModelLoad {
            path: path.to_path_buf(),
            reason: reason.into(),
            suggestion: suggestion.map(str::to_string),
            source: error.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Creates an inference error with model context.
    pub fn inference_error(
        model_name: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Starts a builder for a detailed model inference error.
    pub fn model_inference_error_builder(
        model_name: &str,
        operation: &str,
    ) -> ModelInferenceErrorBuilder {
        ModelInferenceErrorBuilder::new(model_name, operation)
    }

    /// Returns true for errors caused by an unrecognizable line crop.
    pub fn is_recognition_failure(&self) -> bool {
        matches!(self, Self::RecognitionFailure { .. })
    }
}

impl From<ConfigError> for OCRError {
    fn from(error: ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_vocabulary_message() {
        let err = OCRError::out_of_vocabulary("ß", 3);
        assert_eq!(
            err.to_string(),
            "out of vocabulary: no codec mapping for \"ß\" at byte offset 3"
        );
    }

    #[test]
    fn test_model_load_error_includes_suggestion() {
        let err = OCRError::model_load_error(
            Path::new("/models/blla.onnx"),
            "file not found",
            Some("check the model path"),
            None::<std::io::Error>,
        );
        let msg = err.to_string();
        assert!(msg.contains("/models/blla.onnx"));
        assert!(msg.contains("(check the model path)"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: OCRError = ConfigError::InvalidConfig {
            message: "beam width must be at least 1".into(),
        }
        .into();
        assert!(matches!(err, OCRError::ConfigError { .. }));
    }

    #[test]
    fn test_processing_errors_name_their_stage() {
        let err = OCRError::batch_processing("page worker", std::io::Error::other("panicked"));
        assert!(matches!(
            err,
            OCRError::Processing {
                kind: ProcessingStage::BatchProcessing,
                ..
            }
        ));
        assert_eq!(err.to_string(), "batch processing failed: page worker");

        let err = OCRError::tensor_operation("line tensor", std::io::Error::other("shape"));
        assert_eq!(err.to_string(), "tensor operation failed: line tensor");
    }

    #[test]
    fn test_inference_builder_records_shape() {
        let err = OCRError::model_inference_error_builder("rec", "forward_pass")
            .input_shape(&[1, 1, 48, 300])
            .context("session busy")
            .build(std::io::Error::other("boom"));
        assert!(err.to_string().contains("[1, 1, 48, 300]"));
    }
}
