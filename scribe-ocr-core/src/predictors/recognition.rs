//! Line recognition: line image in, decoded logical-order text out.
//!
//! The steps are fixed: size floor and padding, scaling to the network's input
//! height, the forward pass, CTC decoding, codec lookup and text normalization.
//! Bidi reordering is left to the caller, since [`LineRecognition`] is
//! defined to be in logical order.

use crate::core::config::{ConfigError, ConfigValidator, ParallelPolicy};
use crate::core::{OCRError, OcrResult};
use crate::domain::posteriors::FramePosteriors;
use crate::domain::transcription::LineRecognition;
use crate::models::RecognitionModel;
use crate::processors::codec::Codec;
use crate::processors::ctc::{self, DecoderConfig};
use crate::processors::line_extract::{LineExtractConfig, prepare_line};
use crate::processors::text_normalization::TextNormalization;
use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Settings for recognizing a single line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognizerConfig {
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub extract: LineExtractConfig,
    #[serde(default)]
    pub normalization: TextNormalization,
}

impl RecognizerConfig {
    pub fn with_decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_extract(mut self, extract: LineExtractConfig) -> Self {
        self.extract = extract;
        self
    }

    pub fn with_normalization(mut self, normalization: TextNormalization) -> Self {
        self.normalization = normalization;
        self
    }
}

impl ConfigValidator for RecognizerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.decoder.validate()?;
        self.extract.validate()
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Recognizes one line image.
///
/// # Errors
///
/// `RecognitionFailure` for crops below the size floor or posteriors whose
/// class count does not match the codec; model errors are passed through.
pub fn recognize(
    line: &GrayImage,
    model: &RecognitionModel,
    config: &RecognizerConfig,
) -> OcrResult<LineRecognition> {
    let net = model.net();
    let tensor = prepare_line(line, net.input_height(), net.input_channels(), &config.extract)?;
    let posteriors = net.forward(&tensor)?;
    decode_posteriors(&posteriors, model.codec(), config)
}

/// Decodes network output for one line into text.
pub fn decode_posteriors(
    posteriors: &FramePosteriors,
    codec: &Codec,
    config: &RecognizerConfig,
) -> OcrResult<LineRecognition> {
    if posteriors.num_classes() != codec.num_classes() {
        return Err(OCRError::recognition_failure(format!(
            "posteriors have {} classes, codec maps {}",
            posteriors.num_classes(),
            codec.num_classes()
        )));
    }
    let frames = posteriors.frames();
    let path = ctc::decode(posteriors, &config.decoder);
    if path.emissions.is_empty() {
        return Ok(LineRecognition::empty(frames));
    }
    let characters = codec.decode(&path.emissions)?;
    let raw: String = characters.iter().map(|c| c.text.as_str()).collect();
    let text = config.normalization.apply(&raw);
    debug!(
        "decoded {} label(s) over {} frame(s), confidence {:.3}",
        path.emissions.len(),
        frames,
        path.confidence
    );
    Ok(LineRecognition {
        text,
        confidence: path.confidence,
        characters,
        frames,
    })
}

/// Recognizes many lines, in parallel when the batch exceeds the policy's
/// threshold. Results are returned in input order.
pub fn recognize_batch(
    lines: &[GrayImage],
    model: &RecognitionModel,
    config: &RecognizerConfig,
    policy: &ParallelPolicy,
) -> Vec<OcrResult<LineRecognition>> {
    let indexed: Vec<(usize, &GrayImage)> = lines.iter().enumerate().collect();
    let parallel = policy.parallel_lines(lines.len());
    let mut results: Vec<(usize, OcrResult<LineRecognition>)> = if parallel {
        debug!("Recognizing {} lines in parallel", lines.len());
        indexed
            .into_par_iter()
            .map(|(index, line)| (index, recognize(line, model, config)))
            .collect()
    } else {
        indexed
            .into_iter()
            .map(|(index, line)| (index, recognize(line, model, config)))
            .collect()
    };
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}
