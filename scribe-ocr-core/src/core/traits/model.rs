//! Model trait definitions.
//!
//! Every network is reached through one of these traits, so an ONNX Runtime
//! session and an in-process test double are interchangeable. Implementations
//! must be shareable across threads: the engine calls `forward` from rayon
//! workers and page pipeline threads at the same time.

use crate::core::OCRError;
use crate::domain::posteriors::FramePosteriors;
use crate::domain::segmentation::SegmentationDescriptor;
use crate::processors::reading_order::OrderFeatures;
use ndarray::{Array3, Array4};
use std::fmt::Debug;

/// Which part of the engine a model serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Recognition,
    Segmentation,
    ReadingOrder,
}

/// Information about a loaded model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Name of the model, usually the file stem.
    pub model_name: String,
    pub kind: ModelKind,
}

impl ModelInfo {
    pub fn new(model_name: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            model_name: model_name.into(),
            kind,
        }
    }
}

/// A line recognition network producing frame posteriors.
pub trait SequenceModel: Send + Sync + Debug {
    fn info(&self) -> ModelInfo;

    /// Line height the network expects.
    fn input_height(&self) -> u32;

    /// 1 for grayscale input, 3 for RGB.
    fn input_channels(&self) -> u32 {
        1
    }

    /// Size of the output layer, including the blank class.
    fn num_classes(&self) -> usize;

    /// Runs the network on a `[1, C, H, W]` line tensor.
    fn forward(&self, line: &Array4<f32>) -> Result<FramePosteriors, OCRError>;
}

/// A pixel labelling network for whole pages.
pub trait SegmentationModel: Send + Sync + Debug {
    fn info(&self) -> ModelInfo;

    /// Output channel layout and input geometry.
    fn descriptor(&self) -> &SegmentationDescriptor;

    /// Runs the network on a `[1, C, H, W]` page tensor, returning per-channel
    /// probabilities of shape `[channels, H', W']`.
    fn forward(&self, page: &Array4<f32>) -> Result<Array3<f32>, OCRError>;
}

/// A learned pairwise reading order preference.
pub trait PairwiseOrderModel: Send + Sync + Debug {
    fn info(&self) -> ModelInfo;

    /// Probability that the first element of the pair is read before the second.
    fn precedes(&self, features: &OrderFeatures) -> Result<f32, OCRError>;
}
