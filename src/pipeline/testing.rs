//! In-process model doubles for pipeline tests.

use super::config::PipelineConfig;
use super::recognizer::PageRecognizer;
use crossbeam_channel::{Receiver, Sender};
use image::{GrayImage, Luma};
use ndarray::{Array2, Array3, Array4};
use scribe_ocr_core::core::{ModelInfo, ModelKind, OcrResult, SegmentationModel, SequenceModel};
use scribe_ocr_core::domain::{
    ChannelKind, FramePosteriors, PageImage, SegmentationDescriptor,
};
use scribe_ocr_core::models::RecognitionModel;
use scribe_ocr_core::processors::Codec;
use std::sync::Arc;

pub const PAGE_WIDTH: u32 = 200;
pub const PAGE_HEIGHT: u32 = 100;

/// Marks every inked pixel as baseline.
#[derive(Debug)]
pub struct InkSegmenter {
    descriptor: SegmentationDescriptor,
}

impl Default for InkSegmenter {
    fn default() -> Self {
        Self {
            descriptor: SegmentationDescriptor::new(vec![ChannelKind::Baseline(
                "default".into(),
            )])
            .with_input_height(PAGE_HEIGHT),
        }
    }
}

impl SegmentationModel for InkSegmenter {
    fn info(&self) -> ModelInfo {
        ModelInfo::new("ink", ModelKind::Segmentation)
    }

    fn descriptor(&self) -> &SegmentationDescriptor {
        &self.descriptor
    }

    fn forward(&self, page: &Array4<f32>) -> OcrResult<Array3<f32>> {
        let (h, w) = (page.shape()[2], page.shape()[3]);
        Ok(Array3::from_shape_fn((1, h, w), |(_, y, x)| {
            if page[[0, 0, y, x]] < 0.9 { 0.9 } else { 0.0 }
        }))
    }
}

/// An [`InkSegmenter`] that reports every page it starts on `started` and then
/// blocks until `release` is closed.
#[derive(Debug)]
pub struct GatedSegmenter {
    inner: InkSegmenter,
    started: Sender<()>,
    release: Receiver<()>,
}

impl GatedSegmenter {
    pub fn new(started: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            inner: InkSegmenter::default(),
            started,
            release,
        }
    }
}

impl SegmentationModel for GatedSegmenter {
    fn info(&self) -> ModelInfo {
        ModelInfo::new("gated", ModelKind::Segmentation)
    }

    fn descriptor(&self) -> &SegmentationDescriptor {
        self.inner.descriptor()
    }

    fn forward(&self, page: &Array4<f32>) -> OcrResult<Array3<f32>> {
        let _ = self.started.send(());
        let _ = self.release.recv();
        self.inner.forward(page)
    }
}

/// Reads one label per line from the darkest pixel: black is label 1, dark
/// gray label 2, light gray label 3. Labels the codec lacks decode as blank.
#[derive(Debug)]
pub struct InkRecognizer {
    classes: usize,
}

impl SequenceModel for InkRecognizer {
    fn info(&self) -> ModelInfo {
        ModelInfo::new("ink", ModelKind::Recognition)
    }

    fn input_height(&self) -> u32 {
        48
    }

    fn num_classes(&self) -> usize {
        self.classes
    }

    fn forward(&self, line: &Array4<f32>) -> OcrResult<FramePosteriors> {
        let darkest = line.iter().copied().fold(1.0f32, f32::min);
        let label = match darkest {
            v if v < 0.2 => 1,
            v if v < 0.5 => 2,
            v if v < 0.85 => 3,
            _ => 0,
        };
        let label = if label < self.classes { label } else { 0 };
        let mut probs = Array2::zeros((1, self.classes));
        probs[[0, label]] = 1.0;
        FramePosteriors::new(probs)
    }
}

/// Ink level that [`InkRecognizer`] reads as label 1, 2 or 3.
pub fn ink(label: usize) -> u8 {
    match label {
        1 => 0,
        2 => 90,
        _ => 175,
    }
}

/// A white page with one three-pixel ink band per `(center row, ink)` entry.
pub fn striped_page(bands: &[(u32, u8)]) -> PageImage {
    let mut img = GrayImage::from_pixel(PAGE_WIDTH, PAGE_HEIGHT, Luma([255]));
    for &(y, level) in bands {
        for row in y.saturating_sub(1)..=(y + 1).min(PAGE_HEIGHT - 1) {
            for x in 20..PAGE_WIDTH - 20 {
                img.put_pixel(x, row, Luma([level]));
            }
        }
    }
    PageImage::from_dynamic(image::DynamicImage::ImageLuma8(img))
}

pub fn recognition_model(symbols: &[&str]) -> RecognitionModel {
    let codec = Codec::from_alphabet(symbols.iter().copied()).unwrap();
    let classes = codec.num_classes();
    RecognitionModel::new(Arc::new(InkRecognizer { classes }), codec).unwrap()
}

/// A recognizer over the `a`, `b`, `c` alphabet.
pub fn recognizer(config: PipelineConfig) -> PageRecognizer {
    PageRecognizer::builder()
        .segmentation_model(Arc::new(InkSegmenter::default()))
        .recognition_model(recognition_model(&["a", "b", "c"]))
        .config(config)
        .build()
        .unwrap()
}
