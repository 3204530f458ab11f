//! The page pipeline.
//!
//! [`PageRecognizer`] chains segmentation, reading order, line recognition and
//! bidi reordering for one page; [`process_pages`] runs it over a batch of
//! pages on worker threads with cooperative cancellation.

pub mod batch;
mod config;
pub mod recognizer;
mod stats;
#[cfg(test)]
mod testing;

pub use batch::{CancellationToken, process_pages};
pub use config::{ModelPaths, PipelineConfig};
pub use recognizer::{PageRecognizer, PageRecognizerBuilder, PageTranscription};
pub use stats::PageStats;
