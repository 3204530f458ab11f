//! # Scribe OCR
//!
//! Line-based text recognition for printed and handwritten pages using ONNX
//! models.
//!
//! A page goes through four stages:
//!
//! - **Segmentation**: a pixel labelling network finds baselines and regions,
//!   which are vectorized into region polygons and line polygons
//! - **Reading order**: lines are ordered within regions and regions within
//!   the page, geometrically or with a learned pairwise model
//! - **Recognition**: every line image is decoded through CTC and a codec
//! - **Bidi reordering**: recognized text is laid out in display order
//!
//! ## Modules
//!
//! * [`core`] - Model traits, error handling, configuration and inference
//! * [`domain`] - Pages, regions, lines, posteriors and transcriptions
//! * [`models`] - ONNX Runtime networks and loaded model handles
//! * [`processors`] - Codec, decoding, geometry, reading order, bidi and metrics
//! * [`predictors`] - `segment` and `recognize` entry points
//! * [`pipeline`] - The page recognizer and multi-page batches
//! * [`utils`] - Image, tensor and alphabet helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scribe_ocr::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! scribe_ocr::core::init_tracing();
//!
//! let config = PipelineConfig::from_json_file(Path::new("pipeline.json"))?;
//! let recognizer = PageRecognizer::builder().config(config).build()?;
//!
//! let page = PageImage::from_dynamic(image::open("page.png")?);
//! let result = recognizer.process_page(&page)?;
//! println!("{}", result.transcription.text());
//! println!("{}", result.stats);
//! # Ok(())
//! # }
//! ```

pub use scribe_ocr_core::{core, domain, models, predictors, processors, utils};

pub mod pipeline;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use scribe_ocr_core::prelude::*;

    pub use crate::pipeline::{
        CancellationToken, ModelPaths, PageRecognizer, PageRecognizerBuilder, PageStats,
        PageTranscription, PipelineConfig,
    };
}
