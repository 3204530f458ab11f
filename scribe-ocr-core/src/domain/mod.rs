//! Data model shared by segmentation, ordering and recognition.

pub mod page;
pub mod posteriors;
pub mod segmentation;
pub mod transcription;

pub use page::{ColorMode, PageImage};
pub use posteriors::FramePosteriors;
pub use segmentation::{
    BaselineHypothesis, BaselinePlacement, ChannelKind, LinePolygon, RegionPolygon, RegionType,
    SegmentationDescriptor, SegmentationDiagnostics, SegmentationResult, TextDirection,
};
pub use transcription::{CharacterSpan, LineRecognition, TranscribedLine, Transcription};
