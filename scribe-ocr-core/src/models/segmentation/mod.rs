//! Page segmentation networks.

mod ort_segmentation;

pub use ort_segmentation::{OrtSegmentationModel, OrtSegmentationModelBuilder};
