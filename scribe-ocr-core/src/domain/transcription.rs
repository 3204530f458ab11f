//! Recognition output.

use super::segmentation::LinePolygon;
use serde::Serialize;

/// One decoded character with its frame span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterSpan {
    pub text: String,
    pub confidence: f32,
    /// First frame of the emission.
    pub start: usize,
    /// One past the last frame of the emission.
    pub end: usize,
}

impl CharacterSpan {
    /// Horizontal pixel range in a line image of `width` pixels decoded into `frames` frames.
    pub fn pixel_range(&self, frames: usize, width: u32) -> (u32, u32) {
        if frames == 0 {
            return (0, 0);
        }
        let scale = width as f32 / frames as f32;
        (
            (self.start as f32 * scale).floor() as u32,
            ((self.end as f32 * scale).ceil() as u32).min(width),
        )
    }
}

/// Decoded text of a single line in logical order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRecognition {
    pub text: String,
    pub confidence: f32,
    pub characters: Vec<CharacterSpan>,
    /// Number of posterior frames the line was decoded from.
    pub frames: usize,
}

impl LineRecognition {
    /// The empty result of an all-blank line.
    pub fn empty(frames: usize) -> Self {
        Self {
            text: String::new(),
            confidence: 1.0,
            characters: Vec::new(),
            frames,
        }
    }
}

/// A recognized line in display order with its geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscribedLine {
    pub text: String,
    pub confidence: f32,
    pub characters: Vec<CharacterSpan>,
    pub line: LinePolygon,
}

/// Recognized lines of a page in canonical reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcription {
    pub lines: Vec<TranscribedLine>,
}

impl Transcription {
    pub fn new(lines: Vec<TranscribedLine>) -> Self {
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranscribedLine> {
        self.lines.iter()
    }

    /// All line texts joined by newlines.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Mean line confidence, 1.0 for an empty page.
    pub fn mean_confidence(&self) -> f32 {
        if self.lines.is_empty() {
            return 1.0;
        }
        self.lines.iter().map(|l| l.confidence).sum::<f32>() / self.lines.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_range_scales_frames() {
        let span = CharacterSpan {
            text: "a".into(),
            confidence: 0.9,
            start: 2,
            end: 4,
        };
        assert_eq!(span.pixel_range(10, 100), (20, 40));
        assert_eq!(span.pixel_range(0, 100), (0, 0));
    }
}
