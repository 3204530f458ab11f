//! # Scribe OCR Core
//!
//! Engine for line-based handwritten and printed text recognition.
//!
//! This crate provides:
//! - Error handling types
//! - Domain types (pages, regions, lines, posteriors, transcriptions)
//! - Model abstractions and their ONNX Runtime implementations
//! - Processors: codec, CTC decoding, vectorization, polygonization,
//!   reading order, bidi and text normalization, evaluation metrics
//! - Segmentation and recognition predictors
//!
//! ## Modules
//!
//! * [`core`] - Model traits, error handling, configuration and inference
//! * [`domain`] - Data model shared by every stage
//! * [`models`] - ONNX Runtime networks and loaded model handles
//! * [`processors`] - Algorithms between the networks
//! * [`utils`] - Utility functions for images, tensors and alphabet files
//! * [`predictors`] - `segment` and `recognize` entry points

pub mod core;
pub mod domain;
pub mod models;
pub mod predictors;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error handling
    pub use crate::core::{ConfigValidator, OCRError, OcrResult};

    // Model interfaces
    pub use crate::core::{PairwiseOrderModel, SegmentationModel, SequenceModel};
    pub use crate::models::{
        OrtOrderModel, OrtSegmentationModel, OrtSequenceModel, RecognitionModel,
    };

    // Domain types
    pub use crate::domain::{
        ColorMode, LinePolygon, LineRecognition, PageImage, RegionPolygon, RegionType,
        SegmentationDescriptor, SegmentationResult, TextDirection, TranscribedLine,
        Transcription,
    };

    // Processors
    pub use crate::processors::{
        BaseDirection, BidiConfig, Codec, DecoderConfig, OrderPolicy, ReadingOrderConfig,
        ReadingOrderGraph, read_order,
    };

    // Predictors
    pub use crate::predictors::*;
}
