//! ONNX Runtime page segmentation network.

use crate::core::config::OrtSessionConfig;
use crate::core::inference::{OrtInfer, TensorInput};
use crate::core::traits::{ModelInfo, ModelKind, SegmentationModel};
use crate::core::{OCRError, OcrResult};
use crate::domain::segmentation::SegmentationDescriptor;
use ndarray::{Array3, Array4};
use std::path::Path;

/// A segmentation network served by ONNX Runtime.
///
/// The network takes a `[1, C, H, W]` page and returns one heatmap per
/// descriptor channel, at any resolution.
#[derive(Debug)]
pub struct OrtSegmentationModel {
    inference: OrtInfer,
    descriptor: SegmentationDescriptor,
    apply_sigmoid: bool,
}

impl OrtSegmentationModel {
    pub fn builder(descriptor: SegmentationDescriptor) -> OrtSegmentationModelBuilder {
        OrtSegmentationModelBuilder::new(descriptor)
    }
}

impl SegmentationModel for OrtSegmentationModel {
    fn info(&self) -> ModelInfo {
        ModelInfo::new(self.inference.model_name(), ModelKind::Segmentation)
    }

    fn descriptor(&self) -> &SegmentationDescriptor {
        &self.descriptor
    }

    fn forward(&self, page: &Array4<f32>) -> OcrResult<Array3<f32>> {
        let mut outputs = self.inference.infer(&[("", TensorInput::Array4(page))])?;
        if outputs.is_empty() {
            return Err(OCRError::invalid_input(format!(
                "model '{}' returned no outputs",
                self.inference.model_name()
            )));
        }
        let (_, output) = outputs.swap_remove(0);
        let mut heatmap = output.try_into_array3_f32()?;
        let channels = heatmap.dim().0;
        if channels != self.descriptor.channels.len() {
            return Err(OCRError::invalid_input(format!(
                "model '{}' produced {channels} channels, descriptor declares {}",
                self.inference.model_name(),
                self.descriptor.channels.len()
            )));
        }
        if self.apply_sigmoid {
            heatmap.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp()));
        }
        Ok(heatmap)
    }
}

/// Builder for [`OrtSegmentationModel`].
#[derive(Debug, Clone)]
pub struct OrtSegmentationModelBuilder {
    descriptor: SegmentationDescriptor,
    apply_sigmoid: bool,
    ort_config: OrtSessionConfig,
    model_name: Option<String>,
}

impl OrtSegmentationModelBuilder {
    pub fn new(descriptor: SegmentationDescriptor) -> Self {
        Self {
            descriptor,
            apply_sigmoid: false,
            ort_config: OrtSessionConfig::default(),
            model_name: None,
        }
    }

    /// Treat outputs as logits and squash them to probabilities.
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

    pub fn build(self, model_path: &Path) -> OcrResult<OrtSegmentationModel> {
        if self.descriptor.channels.is_empty() {
            return Err(OCRError::config_error(
                "segmentation descriptor declares no output channels",
            ));
        }
        if self.descriptor.baseline_channels().next().is_none() {
            return Err(OCRError::config_error(
                "segmentation descriptor declares no baseline channel",
            ));
        }
        if self.descriptor.input_height == 0 {
            return Err(OCRError::config_error("input_height must be greater than 0"));
        }
        if self.descriptor.input_channels != 1 && self.descriptor.input_channels != 3 {
            return Err(OCRError::config_error(format!(
                "input_channels must be 1 or 3, got {}",
                self.descriptor.input_channels
            )));
        }
        let inference =
            OrtInfer::from_config(model_path, &self.ort_config, self.model_name.as_deref())?;
        Ok(OrtSegmentationModel {
            inference,
            descriptor: self.descriptor,
            apply_sigmoid: self.apply_sigmoid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::segmentation::{ChannelKind, RegionType};

    #[test]
    fn test_build_requires_baseline_channel() {
        let desc = SegmentationDescriptor::new(vec![ChannelKind::Region(RegionType::Text)]);
        let err = OrtSegmentationModel::builder(desc)
            .build(Path::new("/nonexistent/seg.onnx"))
            .unwrap_err();
        assert!(matches!(err, OCRError::ConfigError { .. }));
    }

    #[test]
    fn test_build_missing_model_file() {
        let desc = SegmentationDescriptor::new(vec![ChannelKind::Baseline("default".into())]);
        let err = OrtSegmentationModel::builder(desc)
            .apply_sigmoid(true)
            .build(Path::new("/nonexistent/seg.onnx"))
            .unwrap_err();
        assert!(matches!(err, OCRError::ModelLoad { .. }));
    }
}
