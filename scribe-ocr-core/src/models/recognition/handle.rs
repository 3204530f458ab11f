//! Loaded recognition model: a network plus the codec it was trained with.

use super::ort_sequence::OrtSequenceModelBuilder;
use crate::core::traits::{ModelInfo, SequenceModel};
use crate::core::{OCRError, OcrResult};
use crate::processors::codec::Codec;
use crate::utils::read_alphabet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Read-only handle shared by every concurrent recognition call.
///
/// Cloning is cheap; the network and codec are reference counted.
#[derive(Debug, Clone)]
pub struct RecognitionModel {
    net: Arc<dyn SequenceModel>,
    codec: Arc<Codec>,
}

impl RecognitionModel {
    /// Pairs a network with its codec.
    ///
    /// Fails when the network's output layer does not match the codec's class count.
    pub fn new(net: Arc<dyn SequenceModel>, codec: Codec) -> OcrResult<Self> {
        let net_classes = net.num_classes();
        let codec_classes = codec.num_classes();
        if net_classes != codec_classes {
            return Err(OCRError::recognition_failure(format!(
                "model '{}' has {net_classes} output classes, codec maps {codec_classes}",
                net.info().model_name
            )));
        }
        Ok(Self {
            net,
            codec: Arc::new(codec),
        })
    }

    /// Loads an ONNX network and its codec from disk.
    ///
    /// A `.json` codec file is parsed as a grapheme to label map, anything
    /// else as a one-symbol-per-line alphabet. The builder's class count is
    /// taken from the codec.
    pub fn from_files(
        model_path: &Path,
        codec_path: &Path,
        builder: OrtSequenceModelBuilder,
    ) -> OcrResult<Self> {
        let codec = match codec_path.extension().and_then(|e| e.to_str()) {
            Some("json") => Codec::from_json_file(codec_path)?,
            _ => Codec::from_alphabet(read_alphabet(codec_path)?)?,
        };
        let net = builder.num_classes(codec.num_classes()).build(model_path)?;
        info!(
            "Loaded recognition model {} with {} codec entries",
            model_path.display(),
            codec.len()
        );
        Self::new(Arc::new(net), codec)
    }

    pub fn net(&self) -> &dyn SequenceModel {
        self.net.as_ref()
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn info(&self) -> ModelInfo {
        self.net.info()
    }
}
