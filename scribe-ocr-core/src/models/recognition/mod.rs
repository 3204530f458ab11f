//! Line recognition networks.

mod handle;
mod ort_sequence;

pub use handle::RecognitionModel;
pub use ort_sequence::{
    OrtSequenceModel, OrtSequenceModelBuilder, OutputActivation, PosteriorLayout,
};
