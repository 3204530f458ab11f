//! Capability traits for the networks the engine drives.

pub mod model;

pub use model::{ModelInfo, ModelKind, PairwiseOrderModel, SegmentationModel, SequenceModel};
