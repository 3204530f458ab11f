//! ONNX Runtime pairwise reading order model.

use crate::core::config::OrtSessionConfig;
use crate::core::inference::{OrtInfer, TensorInput};
use crate::core::traits::{ModelInfo, ModelKind, PairwiseOrderModel};
use crate::core::{OCRError, OcrResult};
use crate::processors::reading_order::OrderFeatures;
use ndarray::Array2;
use std::path::Path;

/// A small classifier over [`OrderFeatures`], input `[1, 12]`, output one
/// value per pair.
#[derive(Debug)]
pub struct OrtOrderModel {
    inference: OrtInfer,
    apply_sigmoid: bool,
}

impl OrtOrderModel {
    pub fn builder() -> OrtOrderModelBuilder {
        OrtOrderModelBuilder::new()
    }
}

impl PairwiseOrderModel for OrtOrderModel {
    fn info(&self) -> ModelInfo {
        ModelInfo::new(self.inference.model_name(), ModelKind::ReadingOrder)
    }

    fn precedes(&self, features: &OrderFeatures) -> OcrResult<f32> {
        let input = Array2::from_shape_vec((1, OrderFeatures::LEN), features.values.to_vec())?;
        let outputs = self.inference.infer(&[("", TensorInput::Array2(&input))])?;
        let raw = outputs
            .into_iter()
            .next()
            .and_then(|(_, output)| match output.into_array_f32() {
                Ok(array) => array.iter().next().copied(),
                Err(_) => None,
            })
            .ok_or_else(|| {
                OCRError::invalid_input(format!(
                    "order model '{}' returned no score",
                    self.inference.model_name()
                ))
            })?;
        let p = if self.apply_sigmoid {
            1.0 / (1.0 + (-raw).exp())
        } else {
            raw
        };
        Ok(p.clamp(0.0, 1.0))
    }
}

/// Builder for [`OrtOrderModel`].
#[derive(Debug, Clone, Default)]
pub struct OrtOrderModelBuilder {
    apply_sigmoid: bool,
    ort_config: OrtSessionConfig,
    model_name: Option<String>,
}

impl OrtOrderModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat the output as a logit.
    pub fn apply_sigmoid(mut self, enabled: bool) -> Self {
        self.apply_sigmoid = enabled;
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

    pub fn build(self, model_path: &Path) -> OcrResult<OrtOrderModel> {
        let inference =
            OrtInfer::from_config(model_path, &self.ort_config, self.model_name.as_deref())?;
        Ok(OrtOrderModel {
            inference,
            apply_sigmoid: self.apply_sigmoid,
        })
    }
}
