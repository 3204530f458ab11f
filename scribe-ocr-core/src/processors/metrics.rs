//! Evaluation of recognition and segmentation output against ground truth.
//!
//! Recognition is scored over grapheme clusters with a Levenshtein alignment;
//! segmentation over thresholded pixel masks per output channel.

use crate::core::{OCRError, OcrResult};
use ndarray::{ArrayView3, Zip};
use serde::Serialize;
use std::collections::BTreeMap;
use unicode_segmentation::UnicodeSegmentation;

/// Alignment of a ground truth and a predicted string over grapheme clusters.
///
/// Both sides have the same length; `None` marks a gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alignment {
    /// Edit distance between the two strings.
    pub distance: usize,
    pub truth: Vec<Option<String>>,
    pub prediction: Vec<Option<String>>,
}

/// Levenshtein alignment of `truth` and `prediction` over grapheme clusters.
///
/// Ties prefer substitutions, then deletions, then insertions, so the
/// alignment is deterministic.
pub fn global_align(truth: &str, prediction: &str) -> Alignment {
    let a: Vec<&str> = truth.graphemes(true).collect();
    let b: Vec<&str> = prediction.graphemes(true).collect();
    let (n, m) = (a.len(), b.len());

    let mut cost = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in cost.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        cost[0][j] = j;
    }
    for i in 1..=n {
        for j in 1..=m {
            let sub = cost[i - 1][j - 1] + usize::from(a[i - 1] != b[j - 1]);
            cost[i][j] = sub.min(cost[i - 1][j] + 1).min(cost[i][j - 1] + 1);
        }
    }

    let mut truth_out = Vec::with_capacity(n.max(m));
    let mut pred_out = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && cost[i][j] == cost[i - 1][j - 1] + usize::from(a[i - 1] != b[j - 1]) {
            truth_out.push(Some(a[i - 1].to_string()));
            pred_out.push(Some(b[j - 1].to_string()));
            i -= 1;
            j -= 1;
        } else if i > 0 && cost[i][j] == cost[i - 1][j] + 1 {
            truth_out.push(Some(a[i - 1].to_string()));
            pred_out.push(None);
            i -= 1;
        } else {
            truth_out.push(None);
            pred_out.push(Some(b[j - 1].to_string()));
            j -= 1;
        }
    }
    truth_out.reverse();
    pred_out.reverse();
    Alignment {
        distance: cost[n][m],
        truth: truth_out,
        prediction: pred_out,
    }
}

/// Running character accuracy over many lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CharacterAccuracy {
    /// Ground truth grapheme clusters seen.
    pub characters: usize,
    /// Accumulated edit distance.
    pub errors: usize,
}

impl CharacterAccuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one line and returns its alignment.
    pub fn update(&mut self, truth: &str, prediction: &str) -> Alignment {
        let alignment = global_align(truth, prediction);
        self.characters += truth.graphemes(true).count();
        self.errors += alignment.distance;
        alignment
    }

    /// `1 - errors / characters`, clamped at zero. 1.0 before any update.
    pub fn accuracy(&self) -> f32 {
        if self.characters == 0 {
            return 1.0;
        }
        (1.0 - self.errors as f32 / self.characters as f32).max(0.0)
    }
}

/// Error breakdown of one or more alignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Confusions {
    /// `(truth, prediction)` substitution counts.
    pub pairs: BTreeMap<(String, String), usize>,
    /// Ground truth graphemes missing from the prediction.
    pub deleted: BTreeMap<String, usize>,
    /// Predicted graphemes absent from the ground truth.
    pub inserted: BTreeMap<String, usize>,
    pub substitutions: usize,
    pub deletions: usize,
    pub insertions: usize,
}

impl Confusions {
    /// Merges another breakdown into this one.
    pub fn merge(&mut self, other: &Confusions) {
        for (k, v) in &other.pairs {
            *self.pairs.entry(k.clone()).or_default() += v;
        }
        for (k, v) in &other.deleted {
            *self.deleted.entry(k.clone()).or_default() += v;
        }
        for (k, v) in &other.inserted {
            *self.inserted.entry(k.clone()).or_default() += v;
        }
        self.substitutions += other.substitutions;
        self.deletions += other.deletions;
        self.insertions += other.insertions;
    }

    pub fn errors(&self) -> usize {
        self.substitutions + self.deletions + self.insertions
    }
}

/// Counts the substitutions, deletions and insertions of an alignment.
pub fn compute_confusions(alignment: &Alignment) -> Confusions {
    let mut confusions = Confusions::default();
    for (t, p) in alignment.truth.iter().zip(&alignment.prediction) {
        match (t, p) {
            (Some(t), Some(p)) if t == p => {}
            (Some(t), Some(p)) => {
                *confusions.pairs.entry((t.clone(), p.clone())).or_default() += 1;
                confusions.substitutions += 1;
            }
            (Some(t), None) => {
                *confusions.deleted.entry(t.clone()).or_default() += 1;
                confusions.deletions += 1;
            }
            (None, Some(p)) => {
                *confusions.inserted.entry(p.clone()).or_default() += 1;
                confusions.insertions += 1;
            }
            (None, None) => {}
        }
    }
    confusions
}

/// Per-channel pixel statistics of segmentation output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixelMetrics {
    pub intersections: Vec<u64>,
    pub unions: Vec<u64>,
    /// Pixels where prediction and target agree.
    pub corrects: Vec<u64>,
    /// Target pixels per class.
    pub class_counts: Vec<u64>,
    /// Pixels seen per class.
    pub totals: Vec<u64>,
}

impl PixelMetrics {
    pub fn new(classes: usize) -> Self {
        Self {
            intersections: vec![0; classes],
            unions: vec![0; classes],
            corrects: vec![0; classes],
            class_counts: vec![0; classes],
            totals: vec![0; classes],
        }
    }

    pub fn classes(&self) -> usize {
        self.totals.len()
    }

    /// Accumulates one page. `prediction` holds probabilities, `target` the
    /// boolean masks, both `[classes, H, W]`.
    pub fn update(
        &mut self,
        prediction: &ArrayView3<'_, f32>,
        target: &ArrayView3<'_, bool>,
        threshold: f32,
    ) -> OcrResult<()> {
        if prediction.shape() != target.shape() {
            return Err(OCRError::invalid_input(format!(
                "prediction shape {:?} does not match target shape {:?}",
                prediction.shape(),
                target.shape()
            )));
        }
        if prediction.shape()[0] != self.classes() {
            return Err(OCRError::invalid_input(format!(
                "expected {} classes, got {}",
                self.classes(),
                prediction.shape()[0]
            )));
        }
        for (c, (pred, truth)) in prediction.outer_iter().zip(target.outer_iter()).enumerate() {
            let (mut inter, mut union, mut correct, mut count) = (0u64, 0u64, 0u64, 0u64);
            Zip::from(&pred).and(&truth).for_each(|&p, &t| {
                let p = p > threshold;
                inter += u64::from(p && t);
                union += u64::from(p || t);
                correct += u64::from(p == t);
                count += u64::from(t);
            });
            self.intersections[c] += inter;
            self.unions[c] += union;
            self.corrects[c] += correct;
            self.class_counts[c] += count;
            self.totals[c] += pred.len() as u64;
        }
        Ok(())
    }

    /// Intersection over union per class; 1.0 for a class absent from both.
    pub fn class_iou(&self) -> Vec<f32> {
        self.intersections
            .iter()
            .zip(&self.unions)
            .map(|(&i, &u)| if u == 0 { 1.0 } else { i as f32 / u as f32 })
            .collect()
    }

    pub fn pixel_accuracy(&self) -> f32 {
        let total: u64 = self.totals.iter().sum();
        if total == 0 {
            return 0.0;
        }
        self.corrects.iter().sum::<u64>() as f32 / total as f32
    }

    /// Mean of the per-class pixel accuracies.
    pub fn mean_accuracy(&self) -> f32 {
        mean(self.corrects.iter().zip(&self.totals).map(|(&c, &t)| {
            if t == 0 { 0.0 } else { c as f32 / t as f32 }
        }))
    }

    pub fn mean_iou(&self) -> f32 {
        mean(self.class_iou().into_iter())
    }

    /// Per-class IoU weighted by the class's share of target pixels.
    pub fn frequency_weighted_iou(&self) -> f32 {
        let total: u64 = self.class_counts.iter().sum();
        if total == 0 {
            return 0.0;
        }
        self.class_iou()
            .iter()
            .zip(&self.class_counts)
            .map(|(iou, &n)| iou * n as f32 / total as f32)
            .sum()
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_global_align_identical() {
        let a = global_align("abc", "abc");
        assert_eq!(a.distance, 0);
        assert_eq!(a.truth, a.prediction);
    }

    #[test]
    fn test_global_align_gaps() {
        let a = global_align("abcd", "abd");
        assert_eq!(a.distance, 1);
        assert_eq!(a.truth.len(), 4);
        assert_eq!(a.prediction[2], None);
        assert_eq!(a.truth[2].as_deref(), Some("c"));

        let b = global_align("", "xy");
        assert_eq!(b.distance, 2);
        assert_eq!(b.truth, vec![None, None]);
    }

    #[test]
    fn test_alignment_works_on_grapheme_clusters() {
        // "é" as e + combining acute is one cluster.
        let a = global_align("e\u{301}x", "ex");
        assert_eq!(a.distance, 1);
        assert_eq!(a.truth.len(), 2);
    }

    #[test]
    fn test_character_accuracy_accumulates() {
        let mut acc = CharacterAccuracy::new();
        assert_eq!(acc.accuracy(), 1.0);
        acc.update("abcd", "abxd");
        acc.update("efgh", "efgh");
        assert_eq!(acc.characters, 8);
        assert_eq!(acc.errors, 1);
        assert!((acc.accuracy() - 0.875).abs() < 1e-6);
    }

    #[test]
    fn test_confusions() {
        let c = compute_confusions(&global_align("kitten", "sitting"));
        assert_eq!(c.substitutions, 2);
        assert_eq!(c.insertions, 1);
        assert_eq!(c.deletions, 0);
        assert_eq!(c.pairs[&("k".to_string(), "s".to_string())], 1);
        assert_eq!(c.inserted["g"], 1);

        let mut total = Confusions::default();
        total.merge(&c);
        total.merge(&compute_confusions(&global_align("ab", "b")));
        assert_eq!(total.errors(), 4);
        assert_eq!(total.deleted["a"], 1);
    }

    #[test]
    fn test_pixel_metrics() {
        let mut pred = Array3::<f32>::zeros((2, 2, 2));
        let mut target = Array3::from_elem((2, 2, 2), false);
        // Class 0: predicted on two pixels, one of them correct.
        pred[[0, 0, 0]] = 0.9;
        pred[[0, 0, 1]] = 0.9;
        target[[0, 0, 0]] = true;
        // Class 1: exact on one pixel.
        pred[[1, 1, 1]] = 0.8;
        target[[1, 1, 1]] = true;

        let mut m = PixelMetrics::new(2);
        m.update(&pred.view(), &target.view(), 0.3).unwrap();
        assert_eq!(m.class_iou(), vec![0.5, 1.0]);
        assert!((m.pixel_accuracy() - 7.0 / 8.0).abs() < 1e-6);
        assert!((m.mean_iou() - 0.75).abs() < 1e-6);
        assert!((m.frequency_weighted_iou() - 0.75).abs() < 1e-6);
        assert!((m.mean_accuracy() - 0.875).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_metrics_shape_mismatch() {
        let pred = Array3::<f32>::zeros((2, 2, 2));
        let target = Array3::from_elem((2, 3, 2), false);
        let mut m = PixelMetrics::new(2);
        assert!(m.update(&pred.view(), &target.view(), 0.3).is_err());
    }
}
