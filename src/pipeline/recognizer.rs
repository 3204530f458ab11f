//! The page recognizer: segmentation, reading order, line recognition and
//! bidi reordering behind one handle.

use super::batch::{self, CancellationToken};
use super::config::{ModelPaths, PipelineConfig};
use super::stats::PageStats;
use image::GrayImage;
use rayon::prelude::*;
use scribe_ocr_core::core::config::ConfigValidator;
use scribe_ocr_core::core::{OCRError, OcrResult, PairwiseOrderModel, SegmentationModel};
use scribe_ocr_core::domain::{
    LinePolygon, LineRecognition, PageImage, SegmentationResult, TranscribedLine, Transcription,
};
use scribe_ocr_core::models::{
    OrtOrderModel, OrtSegmentationModel, OrtSequenceModel, RecognitionModel,
};
use scribe_ocr_core::predictors::{recognize, segment};
use scribe_ocr_core::processors::{ReadingOrderGraph, extract_line, read_order};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything produced for one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageTranscription {
    pub segmentation: SegmentationResult,
    pub reading_order: ReadingOrderGraph,
    /// Recognized lines in reading order, display-ordered text.
    pub transcription: Transcription,
    pub stats: PageStats,
}

/// A configured pipeline holding read-only model handles.
///
/// `PageRecognizer` is `Send + Sync`; pages may be processed from several
/// threads at once.
#[derive(Debug, Clone)]
pub struct PageRecognizer {
    segmentation: Arc<dyn SegmentationModel>,
    recognition: RecognitionModel,
    order_model: Option<Arc<dyn PairwiseOrderModel>>,
    config: PipelineConfig,
}

impl PageRecognizer {
    pub fn builder() -> PageRecognizerBuilder {
        PageRecognizerBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn recognition_model(&self) -> &RecognitionModel {
        &self.recognition
    }

    /// Finds regions and line polygons on a page.
    pub fn segment(&self, page: &PageImage) -> OcrResult<SegmentationResult> {
        segment(page, self.segmentation.as_ref(), &self.config.segmentation)
    }

    /// Orders a segmented page.
    pub fn read_order(&self, segmentation: &SegmentationResult) -> ReadingOrderGraph {
        read_order(
            segmentation,
            self.order_model.as_deref(),
            &self.config.reading_order,
        )
    }

    /// Recognizes a single line image, returning logical-order text.
    pub fn recognize_line(&self, line: &GrayImage) -> OcrResult<LineRecognition> {
        recognize(line, &self.recognition, &self.config.recognition)
    }

    /// Runs the whole pipeline on one page.
    ///
    /// Lines failing with `RecognitionFailure` are left out of the
    /// transcription and counted in the stats. Any other error aborts the page.
    pub fn process_page(&self, page: &PageImage) -> OcrResult<PageTranscription> {
        let segmentation = self.segment(page)?;
        let reading_order = self.read_order(&segmentation);
        let mut stats = PageStats::from_layout(&segmentation, &reading_order);

        let by_id: HashMap<usize, &LinePolygon> =
            segmentation.lines.iter().map(|l| (l.id, l)).collect();
        let ordered: Vec<(usize, &LinePolygon)> = reading_order
            .line_order()
            .into_iter()
            .filter_map(|id| by_id.get(&id).copied())
            .enumerate()
            .collect();

        let results = if self.config.parallel.parallel_lines(ordered.len()) {
            debug!("Recognizing {} lines in parallel", ordered.len());
            let mut results: Vec<_> = ordered
                .into_par_iter()
                .map(|(index, line)| (index, line, self.recognize_polygon(page, line)))
                .collect();
            results.sort_by_key(|(index, _, _)| *index);
            results
        } else {
            ordered
                .into_iter()
                .map(|(index, line)| (index, line, self.recognize_polygon(page, line)))
                .collect()
        };

        let mut lines = Vec::with_capacity(results.len());
        for (_, line, result) in results {
            match result {
                Ok(recognition) => {
                    lines.push(TranscribedLine {
                        text: self.config.bidi.apply(&recognition.text),
                        confidence: recognition.confidence,
                        characters: recognition.characters,
                        line: line.clone(),
                    });
                }
                Err(e) if e.is_recognition_failure() => {
                    warn!("Skipping line {}: {}", line.id, e);
                    stats.lines_failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        stats.lines_recognized = lines.len();

        info!(
            "Processed page: {} of {} line(s) recognized",
            stats.lines_recognized, stats.lines_detected
        );
        Ok(PageTranscription {
            segmentation,
            reading_order,
            transcription: Transcription::new(lines),
            stats,
        })
    }

    /// Runs the page pipeline over many pages on worker threads.
    ///
    /// The outer error is `Cancelled` when `token` is set before the batch
    /// completes; per-page errors are returned in input order.
    pub fn process_pages(
        &self,
        pages: &[PageImage],
        token: &CancellationToken,
    ) -> OcrResult<Vec<OcrResult<PageTranscription>>> {
        batch::process_pages(self, pages, token)
    }

    fn recognize_polygon(&self, page: &PageImage, line: &LinePolygon) -> OcrResult<LineRecognition> {
        let image = extract_line(page, line)?;
        self.recognize_line(&image)
    }
}

/// Builder for [`PageRecognizer`].
///
/// Models can be supplied as loaded handles or loaded from the configuration's
/// [`ModelPaths`] at build time. Loaded handles take precedence.
#[derive(Debug, Default)]
pub struct PageRecognizerBuilder {
    segmentation: Option<Arc<dyn SegmentationModel>>,
    recognition: Option<RecognitionModel>,
    order_model: Option<Arc<dyn PairwiseOrderModel>>,
    config: PipelineConfig,
}

impl PageRecognizerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segmentation_model(mut self, model: Arc<dyn SegmentationModel>) -> Self {
        self.segmentation = Some(model);
        self
    }

    pub fn recognition_model(mut self, model: RecognitionModel) -> Self {
        self.recognition = Some(model);
        self
    }

    pub fn order_model(mut self, model: Arc<dyn PairwiseOrderModel>) -> Self {
        self.order_model = Some(model);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> OcrResult<PageRecognizer> {
        self.config.validate()?;
        let paths = match (&self.segmentation, &self.recognition) {
            (Some(_), Some(_)) => None,
            _ => Some(self.config.models.as_ref().ok_or_else(|| {
                OCRError::config_error(
                    "no segmentation or recognition model supplied and no model paths configured",
                )
            })?),
        };
        if let Some(paths) = paths {
            paths.validate()?;
        }

        let segmentation = match self.segmentation {
            Some(model) => model,
            None => load_segmentation(required(paths)?, &self.config)?,
        };
        let recognition = match self.recognition {
            Some(model) => model,
            None => load_recognition(required(paths)?, &self.config)?,
        };
        let order_model = match self.order_model {
            Some(model) => Some(model),
            None => match paths.and_then(|p| p.reading_order.as_deref()) {
                Some(path) => Some(Arc::new(
                    OrtOrderModel::builder()
                        .with_ort_config(self.config.ort_session.clone())
                        .build(path)?,
                ) as Arc<dyn PairwiseOrderModel>),
                None => None,
            },
        };

        info!(
            "Built page recognizer: segmentation '{}', recognition '{}'{}",
            segmentation.info().model_name,
            recognition.info().model_name,
            if order_model.is_some() {
                ", learned reading order"
            } else {
                ""
            }
        );
        Ok(PageRecognizer {
            segmentation,
            recognition,
            order_model,
            config: self.config,
        })
    }
}

fn required(paths: Option<&ModelPaths>) -> OcrResult<&ModelPaths> {
    paths.ok_or_else(|| OCRError::config_error("model paths are not configured"))
}

fn load_segmentation(
    paths: &ModelPaths,
    config: &PipelineConfig,
) -> OcrResult<Arc<dyn SegmentationModel>> {
    let model = OrtSegmentationModel::builder(paths.descriptor.clone())
        .apply_sigmoid(paths.segmentation_logits)
        .with_ort_config(config.ort_session.clone())
        .build(&paths.segmentation)?;
    Ok(Arc::new(model))
}

fn load_recognition(paths: &ModelPaths, config: &PipelineConfig) -> OcrResult<RecognitionModel> {
    let builder = OrtSequenceModel::builder()
        .input_height(paths.line_height)
        .layout(paths.posterior_layout)
        .activation(paths.output_activation)
        .with_ort_config(config.ort_session.clone());
    RecognitionModel::from_files(&paths.recognition, &paths.codec, builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{InkSegmenter, ink, recognition_model, recognizer, striped_page};
    use scribe_ocr_core::core::ParallelPolicy;
    use scribe_ocr_core::domain::SegmentationDescriptor;
    use scribe_ocr_core::processors::{BaseDirection, BidiConfig};

    #[test]
    fn test_build_without_models_fails() {
        let err = PageRecognizer::builder().build().unwrap_err();
        assert!(matches!(err, OCRError::ConfigError { .. }));
    }

    #[test]
    fn test_build_with_missing_model_files_fails() {
        let config = PipelineConfig::new().with_models(ModelPaths::new(
            "/nonexistent/seg.onnx",
            SegmentationDescriptor::new(Vec::new()),
            "/nonexistent/rec.onnx",
            "/nonexistent/codec.json",
        ));
        let err = PageRecognizer::builder().config(config).build().unwrap_err();
        assert!(matches!(err, OCRError::ConfigError { .. }));
    }

    #[test]
    fn test_process_page_reads_lines_top_to_bottom() {
        let rec = recognizer(PipelineConfig::new());
        let page = striped_page(&[(20, ink(3)), (50, ink(1)), (80, ink(2))]);
        let result = rec.process_page(&page).unwrap();
        assert_eq!(result.stats.lines_detected, 3);
        assert_eq!(result.stats.lines_recognized, 3);
        assert_eq!(result.transcription.text(), "c\na\nb");
        assert!(result.reading_order.is_valid_linearization());
    }

    #[test]
    fn test_blank_page_gives_empty_transcription() {
        let rec = recognizer(PipelineConfig::new());
        let result = rec.process_page(&striped_page(&[])).unwrap();
        assert!(result.segmentation.is_empty());
        assert!(result.transcription.is_empty());
        assert_eq!(result.stats, PageStats::default());
    }

    #[test]
    fn test_failed_lines_are_counted_and_omitted() {
        let mut config = PipelineConfig::new();
        // No crop on a 100 px page reaches this floor.
        config.recognition.extract = config.recognition.extract.clone().with_min_size(4, 101);
        let rec = recognizer(config);
        let page = striped_page(&[(20, ink(1)), (50, ink(2))]);
        let result = rec.process_page(&page).unwrap();
        assert!(result.transcription.is_empty());
        assert_eq!(result.stats.lines_detected, 2);
        assert_eq!(result.stats.lines_failed, 2);
        assert_eq!(result.stats.recognition_rate(), 0.0);
    }

    #[test]
    fn test_parallel_lines_keep_reading_order() {
        let config = PipelineConfig::new()
            .with_parallel(ParallelPolicy::new().with_line_threshold(0));
        let rec = recognizer(config);
        let page = striped_page(&[(20, ink(2)), (50, ink(2)), (80, ink(1))]);
        let result = rec.process_page(&page).unwrap();
        assert_eq!(result.transcription.text(), "b\nb\na");
    }

    #[test]
    fn test_bidi_is_applied_to_transcribed_text() {
        let build = |bidi: BidiConfig| {
            PageRecognizer::builder()
                .segmentation_model(Arc::new(InkSegmenter::default()))
                .recognition_model(recognition_model(&["\u{05d0}\u{05d1}"]))
                .config(PipelineConfig::new().with_bidi(bidi))
                .build()
                .unwrap()
        };
        let page = striped_page(&[(20, ink(1))]);

        let rtl = BidiConfig::default().with_base_direction(BaseDirection::RightToLeft);
        let result = build(rtl).process_page(&page).unwrap();
        assert_eq!(result.transcription.lines[0].text, "\u{05d1}\u{05d0}");

        let logical = BidiConfig::default().with_reorder(false);
        let result = build(logical).process_page(&page).unwrap();
        assert_eq!(result.transcription.lines[0].text, "\u{05d0}\u{05d1}");
    }
}
