//! Inference entry points: `segment` for pages and `recognize` for lines.
//!
//! Reading order lives in [`crate::processors::reading_order`] since it needs
//! no network unless a learned order model is supplied.

pub mod recognition;
pub mod segmentation;

pub use recognition::{RecognizerConfig, decode_posteriors, recognize, recognize_batch};
pub use segmentation::{SegmentationConfig, segment, segment_heatmap};
