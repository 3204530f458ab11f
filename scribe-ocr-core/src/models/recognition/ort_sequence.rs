//! ONNX Runtime line recognizer.
//!
//! Any convolutional-recurrent network exported to ONNX with a single line
//! image input and a single posterior output fits here; the output layout and
//! activation are declared by the builder rather than guessed.

use crate::core::config::OrtSessionConfig;
use crate::core::inference::{OrtInfer, TensorInput};
use crate::core::traits::{ModelInfo, ModelKind, SequenceModel};
use crate::core::{OCRError, OcrResult};
use crate::domain::posteriors::FramePosteriors;
use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Axis order of the posterior tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosteriorLayout {
    /// `[1, T, C]` or `[T, C]`.
    #[default]
    TimeMajor,
    /// `[1, C, T]` or `[1, C, 1, T]`, as produced by fully convolutional heads.
    ClassMajor,
}

/// What the output values are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputActivation {
    #[default]
    Probabilities,
    LogProbabilities,
    Logits,
}

/// A recognition network served by ONNX Runtime.
#[derive(Debug)]
pub struct OrtSequenceModel {
    inference: OrtInfer,
    input_height: u32,
    input_channels: u32,
    num_classes: usize,
    layout: PosteriorLayout,
    activation: OutputActivation,
}

impl OrtSequenceModel {
    pub fn builder() -> OrtSequenceModelBuilder {
        OrtSequenceModelBuilder::new()
    }

    /// Reshapes a raw output tensor into a `[T, C]` matrix.
    fn to_frames(&self, shape: &[usize], data: Vec<f32>) -> OcrResult<Array2<f32>> {
        let len = data.len();
        let classes = match self.layout {
            PosteriorLayout::TimeMajor => shape.last().copied().unwrap_or(0),
            PosteriorLayout::ClassMajor => {
                if shape.len() < 2 || shape[0] != 1 {
                    return Err(OCRError::recognition_failure(format!(
                        "class-major output must have a unit batch axis, got shape {shape:?}"
                    )));
                }
                shape[1]
            }
        };
        if classes != self.num_classes {
            return Err(OCRError::recognition_failure(format!(
                "model '{}' produced {classes} classes, codec expects {}",
                self.inference.model_name(),
                self.num_classes
            )));
        }
        let frames = len / classes.max(1);
        let matrix = match self.layout {
            PosteriorLayout::TimeMajor => Array2::from_shape_vec((frames, classes), data)?,
            PosteriorLayout::ClassMajor => {
                Array2::from_shape_vec((classes, frames), data)?.reversed_axes()
            }
        };
        Ok(matrix.as_standard_layout().into_owned())
    }
}

impl SequenceModel for OrtSequenceModel {
    fn info(&self) -> ModelInfo {
        ModelInfo::new(self.inference.model_name(), ModelKind::Recognition)
    }

    fn input_height(&self) -> u32 {
        self.input_height
    }

    fn input_channels(&self) -> u32 {
        self.input_channels
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn forward(&self, line: &Array4<f32>) -> OcrResult<FramePosteriors> {
        let mut outputs = self.inference.infer(&[("", TensorInput::Array4(line))])?;
        if outputs.is_empty() {
            return Err(OCRError::recognition_failure(format!(
                "model '{}' returned no outputs",
                self.inference.model_name()
            )));
        }
        let (_, output) = outputs.swap_remove(0);
        let array = output.into_array_f32()?;
        let shape = array.shape().to_vec();
        let data = array.as_standard_layout().iter().copied().collect();
        let frames = self.to_frames(&shape, data)?;
        match self.activation {
            OutputActivation::Probabilities => FramePosteriors::new(frames),
            OutputActivation::LogProbabilities => FramePosteriors::from_log_probs(frames),
            OutputActivation::Logits => FramePosteriors::from_logits(frames),
        }
    }
}

/// Builder for [`OrtSequenceModel`].
#[derive(Debug, Clone)]
pub struct OrtSequenceModelBuilder {
    input_height: u32,
    input_channels: u32,
    num_classes: Option<usize>,
    layout: PosteriorLayout,
    activation: OutputActivation,
    ort_config: OrtSessionConfig,
    model_name: Option<String>,
}

impl OrtSequenceModelBuilder {
    pub fn new() -> Self {
        Self {
            input_height: 48,
            input_channels: 1,
            num_classes: None,
            layout: PosteriorLayout::default(),
            activation: OutputActivation::default(),
            ort_config: OrtSessionConfig::default(),
            model_name: None,
        }
    }

    /// Sets the line height the network was trained on (default: 48).
    pub fn input_height(mut self, height: u32) -> Self {
        self.input_height = height;
        self
    }

    pub fn input_channels(mut self, channels: u32) -> Self {
        self.input_channels = channels;
        self
    }

    /// Sets the output layer size including the blank. Required.
    pub fn num_classes(mut self, classes: usize) -> Self {
        self.num_classes = Some(classes);
        self
    }

    pub fn layout(mut self, layout: PosteriorLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn activation(mut self, activation: OutputActivation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = config;
        self
    }

    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    pub fn build(self, model_path: &Path) -> OcrResult<OrtSequenceModel> {
        let num_classes = self
            .num_classes
            .ok_or_else(|| OCRError::config_error("num_classes is required for a sequence model"))?;
        if num_classes < 2 {
            return Err(OCRError::config_error(format!(
                "a sequence model needs the blank and at least one symbol class, got {num_classes}"
            )));
        }
        if self.input_height == 0 {
            return Err(OCRError::config_error("input_height must be greater than 0"));
        }
        if self.input_channels != 1 && self.input_channels != 3 {
            return Err(OCRError::config_error(format!(
                "input_channels must be 1 or 3, got {}",
                self.input_channels
            )));
        }
        let inference =
            OrtInfer::from_config(model_path, &self.ort_config, self.model_name.as_deref())?;
        Ok(OrtSequenceModel {
            inference,
            input_height: self.input_height,
            input_channels: self.input_channels,
            num_classes,
            layout: self.layout,
            activation: self.activation,
        })
    }
}

impl Default for OrtSequenceModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_num_classes() {
        let err = OrtSequenceModel::builder()
            .build(Path::new("/nonexistent/model.onnx"))
            .unwrap_err();
        assert!(matches!(err, OCRError::ConfigError { .. }));
    }

    #[test]
    fn test_build_missing_model_file() {
        let err = OrtSequenceModel::builder()
            .num_classes(10)
            .build(Path::new("/nonexistent/model.onnx"))
            .unwrap_err();
        assert!(matches!(err, OCRError::ModelLoad { .. }));
    }

    #[test]
    fn test_build_rejects_bad_channels() {
        let err = OrtSequenceModel::builder()
            .num_classes(10)
            .input_channels(2)
            .build(Path::new("/nonexistent/model.onnx"))
            .unwrap_err();
        assert!(matches!(err, OCRError::ConfigError { .. }));
    }
}
