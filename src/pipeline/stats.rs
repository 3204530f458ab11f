//! Per-page statistics.

use scribe_ocr_core::domain::SegmentationResult;
use scribe_ocr_core::processors::ReadingOrderGraph;
use serde::Serialize;
use std::fmt;

/// What happened to one page on its way through the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageStats {
    /// Regions kept after clipping.
    pub regions_detected: usize,
    /// Line polygons handed to recognition.
    pub lines_detected: usize,
    /// Lines that produced a transcription.
    pub lines_recognized: usize,
    /// Lines omitted after a recognition failure.
    pub lines_failed: usize,
    /// Baselines outside every region.
    pub orphan_baselines: usize,
    /// Degenerate region hulls.
    pub regions_dropped: usize,
    pub polygons_repaired: usize,
    pub polygons_dropped: usize,
    /// Learned order edges rejected because they closed a cycle.
    pub order_conflicts: usize,
    /// The reading order fell back to pure geometry.
    pub order_fallback_used: bool,
}

impl PageStats {
    /// Counts taken from segmentation and ordering; recognition counts start at zero.
    pub fn from_layout(segmentation: &SegmentationResult, order: &ReadingOrderGraph) -> Self {
        let diagnostics = segmentation.diagnostics;
        Self {
            regions_detected: segmentation.regions.len(),
            lines_detected: segmentation.lines.len(),
            lines_recognized: 0,
            lines_failed: 0,
            orphan_baselines: diagnostics.orphan_baselines,
            regions_dropped: diagnostics.dropped_regions,
            polygons_repaired: diagnostics.repaired_polygons,
            polygons_dropped: diagnostics.dropped_polygons,
            order_conflicts: order.conflicts,
            order_fallback_used: order.fallback_used,
        }
    }

    /// Share of detected lines that were recognized, 1.0 for a page without lines.
    pub fn recognition_rate(&self) -> f64 {
        if self.lines_detected == 0 {
            1.0
        } else {
            self.lines_recognized as f64 / self.lines_detected as f64
        }
    }
}

impl fmt::Display for PageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Page Statistics:")?;
        writeln!(f, "  Regions: {}", self.regions_detected)?;
        writeln!(
            f,
            "  Lines: {} detected, {} recognized ({:.1}%), {} failed",
            self.lines_detected,
            self.lines_recognized,
            self.recognition_rate() * 100.0,
            self.lines_failed
        )?;
        writeln!(
            f,
            "  Geometry: {} orphan baseline(s), {} region(s) dropped, {} polygon(s) repaired, {} dropped",
            self.orphan_baselines,
            self.regions_dropped,
            self.polygons_repaired,
            self.polygons_dropped
        )?;
        writeln!(
            f,
            "  Reading order: {} conflict(s){}",
            self.order_conflicts,
            if self.order_fallback_used {
                ", geometric fallback"
            } else {
                ""
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognition_rate() {
        let mut stats = PageStats::default();
        assert_eq!(stats.recognition_rate(), 1.0);
        stats.lines_detected = 4;
        stats.lines_recognized = 3;
        stats.lines_failed = 1;
        assert_eq!(stats.recognition_rate(), 0.75);
        let text = stats.to_string();
        assert!(text.contains("4 detected, 3 recognized (75.0%), 1 failed"));
    }
}
