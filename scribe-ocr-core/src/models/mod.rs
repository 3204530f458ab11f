//! Network implementations and loaded model handles.
//!
//! The ONNX Runtime variants implement the traits in [`crate::core::traits`];
//! [`RecognitionModel`] bundles a recognition network with its codec.

pub mod ordering;
pub mod recognition;
pub mod segmentation;

pub use ordering::{OrtOrderModel, OrtOrderModelBuilder};
pub use recognition::{
    OrtSequenceModel, OrtSequenceModelBuilder, OutputActivation, PosteriorLayout,
    RecognitionModel,
};
pub use segmentation::{OrtSegmentationModel, OrtSegmentationModelBuilder};
