//! Pure processing stages between the networks and the caller.
//!
//! Nothing here runs a model: each stage is a function (or a small struct
//! holding its settings) over domain types, so every stage can be tested
//! with synthetic input.

pub mod bidi;
pub mod codec;
pub mod ctc;
pub mod geometry;
pub mod line_extract;
pub mod metrics;
pub mod polygonize;
pub mod reading_order;
pub mod text_normalization;
pub mod vectorize;

pub use bidi::{BaseDirection, BidiConfig, DirectionalRun, to_display, visual_runs};
pub use codec::{BLANK_LABEL, Codec, CodecResize, ResizedCodec};
pub use ctc::{DecodedPath, DecoderConfig, DecoderMode, LabelEmission};
pub use geometry::{GeometryError, Point, Polygon, Polyline, Rect};
pub use line_extract::{LineExtractConfig, extract_line, prepare_line};
pub use metrics::{
    Alignment, CharacterAccuracy, Confusions, PixelMetrics, compute_confusions, global_align,
};
pub use polygonize::{LinePolygonizer, PolygonizeOutcome, PolygonizerConfig};
pub use reading_order::{
    OrderFeatures, OrderNode, OrderPolicy, OrderingError, ReadingOrderConfig, ReadingOrderGraph,
    order_lines, read_order,
};
pub use text_normalization::{NormalizationForm, TextNormalization};
pub use vectorize::{HeatmapVectorizer, RegionCandidate, VectorizeConfig};
