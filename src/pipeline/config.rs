//! Page pipeline configuration and its JSON loader.

use scribe_ocr_core::core::config::{
    ConfigError, ConfigValidator, OrtSessionConfig, ParallelPolicy,
};
use scribe_ocr_core::core::{OCRError, OcrResult};
use scribe_ocr_core::domain::SegmentationDescriptor;
use scribe_ocr_core::models::{OutputActivation, PosteriorLayout};
use scribe_ocr_core::predictors::{RecognizerConfig, SegmentationConfig};
use scribe_ocr_core::processors::{BidiConfig, ReadingOrderConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the networks of a pipeline live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPaths {
    /// ONNX segmentation network.
    pub segmentation: PathBuf,
    /// Output channels and input geometry of the segmentation network.
    pub descriptor: SegmentationDescriptor,
    /// Treat segmentation outputs as logits.
    #[serde(default)]
    pub segmentation_logits: bool,
    /// ONNX recognition network.
    pub recognition: PathBuf,
    /// Codec definition: a `.json` label map or a one-symbol-per-line alphabet.
    pub codec: PathBuf,
    /// Line height of the recognition network (default: 48).
    #[serde(default = "ModelPaths::default_line_height")]
    pub line_height: u32,
    #[serde(default)]
    pub posterior_layout: PosteriorLayout,
    #[serde(default)]
    pub output_activation: OutputActivation,
    /// Optional pairwise reading order network.
    #[serde(default)]
    pub reading_order: Option<PathBuf>,
}

impl ModelPaths {
    pub fn new(
        segmentation: impl Into<PathBuf>,
        descriptor: SegmentationDescriptor,
        recognition: impl Into<PathBuf>,
        codec: impl Into<PathBuf>,
    ) -> Self {
        Self {
            segmentation: segmentation.into(),
            descriptor,
            segmentation_logits: false,
            recognition: recognition.into(),
            codec: codec.into(),
            line_height: Self::default_line_height(),
            posterior_layout: PosteriorLayout::default(),
            output_activation: OutputActivation::default(),
            reading_order: None,
        }
    }

    pub fn with_reading_order(mut self, path: impl Into<PathBuf>) -> Self {
        self.reading_order = Some(path.into());
        self
    }

    pub fn with_line_height(mut self, height: u32) -> Self {
        self.line_height = height;
        self
    }

    fn default_line_height() -> u32 {
        48
    }
}

impl ConfigValidator for ModelPaths {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_model_path(&self.segmentation)?;
        self.validate_model_path(&self.recognition)?;
        self.validate_model_path(&self.codec)?;
        if let Some(order) = &self.reading_order {
            self.validate_model_path(order)?;
        }
        self.validate_non_zero("line_height", self.line_height as usize)
    }

    fn get_defaults() -> Self {
        Self::new(
            "segmentation.onnx",
            SegmentationDescriptor::new(Vec::new()),
            "recognition.onnx",
            "codec.json",
        )
    }
}

/// Every tunable of the page pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model files, needed only when the pipeline loads its own models.
    #[serde(default)]
    pub models: Option<ModelPaths>,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub recognition: RecognizerConfig,
    #[serde(default)]
    pub reading_order: ReadingOrderConfig,
    #[serde(default)]
    pub bidi: BidiConfig,
    #[serde(default)]
    pub parallel: ParallelPolicy,
    #[serde(default)]
    pub ort_session: OrtSessionConfig,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(mut self, models: ModelPaths) -> Self {
        self.models = Some(models);
        self
    }

    pub fn with_segmentation(mut self, config: SegmentationConfig) -> Self {
        self.segmentation = config;
        self
    }

    pub fn with_recognition(mut self, config: RecognizerConfig) -> Self {
        self.recognition = config;
        self
    }

    pub fn with_reading_order(mut self, config: ReadingOrderConfig) -> Self {
        self.reading_order = config;
        self
    }

    pub fn with_bidi(mut self, config: BidiConfig) -> Self {
        self.bidi = config;
        self
    }

    pub fn with_parallel(mut self, policy: ParallelPolicy) -> Self {
        self.parallel = policy;
        self
    }

    pub fn with_ort_session(mut self, config: OrtSessionConfig) -> Self {
        self.ort_session = config;
        self
    }

    /// Parses and validates a JSON configuration.
    ///
    /// Model paths are checked when the models are loaded, not here.
    pub fn from_json_str(content: &str) -> OcrResult<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| {
            OCRError::config_error(format!("Failed to parse JSON config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: &Path) -> OcrResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OCRError::config_error(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Pretty-printed JSON form of this configuration.
    pub fn to_json_string(&self) -> OcrResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            OCRError::config_error(format!("Failed to serialize config to JSON: {e}"))
        })
    }
}

impl ConfigValidator for PipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.segmentation.validate()?;
        self.recognition.validate()?;
        self.reading_order.validate()?;
        self.bidi.validate()?;
        self.validate_non_zero("channel_capacity", self.parallel.channel_capacity)?;
        self.validate_non_zero("session_pool_size", self.ort_session.session_pool_size)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_ocr_core::domain::TextDirection;
    use scribe_ocr_core::processors::{BaseDirection, DecoderMode, OrderPolicy};
    use std::io::Write;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert!(config.models.is_none());
        assert_eq!(config.reading_order.policy, OrderPolicy::GeometryFirst);
        assert_eq!(config.segmentation.vectorize.pixel_threshold, 0.3);
        assert_eq!(config.recognition.extract.pad, 16);
        assert!(config.bidi.reorder);
    }

    #[test]
    fn test_nested_sections() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "segmentation": {"text_direction": "vertical-rl"},
                "recognition": {"decoder": {"mode": {"type": "beam", "width": 8}}},
                "reading_order": {"policy": "geometry_only"},
                "bidi": {"base_direction": "R"},
                "parallel": {"max_threads": 2}
            }"#,
        )
        .unwrap();
        assert_eq!(config.segmentation.text_direction, TextDirection::VerticalRl);
        assert_eq!(config.recognition.decoder.mode, DecoderMode::Beam { width: 8 });
        assert_eq!(config.reading_order.policy, OrderPolicy::GeometryOnly);
        assert_eq!(config.bidi.base_direction, BaseDirection::RightToLeft);
        assert_eq!(config.parallel.max_threads, Some(2));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = PipelineConfig::from_json_str(
            r#"{"segmentation": {"vectorize": {"pixel_threshold": 1.5}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, OCRError::ConfigError { .. }));

        let err = PipelineConfig::from_json_str(r#"{"parallel": {"channel_capacity": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, OCRError::ConfigError { .. }));

        let err = PipelineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, OCRError::ConfigError { .. }));
    }

    #[test]
    fn test_file_roundtrip() {
        let config = PipelineConfig::new()
            .with_models(
                ModelPaths::new(
                    "seg.onnx",
                    SegmentationDescriptor::new(Vec::new()),
                    "rec.onnx",
                    "codec.json",
                )
                .with_reading_order("order.onnx"),
            )
            .with_parallel(ParallelPolicy::new().with_line_threshold(8));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json_string().unwrap().as_bytes())
            .unwrap();

        let loaded = PipelineConfig::from_json_file(file.path()).unwrap();
        let models = loaded.models.unwrap();
        assert_eq!(models.recognition, PathBuf::from("rec.onnx"));
        assert_eq!(models.line_height, 48);
        assert_eq!(models.reading_order, Some(PathBuf::from("order.onnx")));
        assert_eq!(loaded.parallel.line_threshold, 8);
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_json_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, OCRError::ConfigError { .. }));
    }

    #[test]
    fn test_model_paths_must_exist() {
        let paths = ModelPaths::get_defaults();
        assert!(paths.validate().is_err());
    }
}
