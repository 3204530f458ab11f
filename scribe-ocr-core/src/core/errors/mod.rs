//! Error types for the recognition engine.
//!
//! Only vocabulary, malformed-input, model and cancellation errors reach callers.
//! Geometry and reading-order anomalies have their own internal error enums
//! (`GeometryError`, `OrderingError`) and are recovered where they occur.
//!
//! # Usage
//!
//! ```rust
//! use scribe_ocr_core::core::errors::OCRError;
//!
//! let error = OCRError::recognition_failure("line crop is 1x32 px, below the 4x4 floor");
//! assert!(error.is_recognition_failure());
//!
//! let config_error = OCRError::config_error("beam width must be at least 1");
//! assert!(config_error.to_string().contains("beam width"));
//! ```

pub mod constructors;
pub mod types;

pub use constructors::ModelInferenceErrorBuilder;
pub use types::{OCRError, ProcessingStage};

pub type OcrResult<T> = Result<T, OCRError>;
