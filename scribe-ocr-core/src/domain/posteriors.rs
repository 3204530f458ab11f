//! Frame-synchronous posterior distributions produced by line recognizers.

use crate::core::errors::{OCRError, OcrResult};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

const ROW_SUM_TOLERANCE: f32 = 1e-3;

/// A `[frames, classes]` matrix of per-frame class probabilities.
///
/// Every row is non-negative and sums to one. Class 0 is the blank.
#[derive(Debug, Clone)]
pub struct FramePosteriors {
    probs: Array2<f32>,
}

impl FramePosteriors {
    /// Wraps a probability matrix, checking the distribution invariant.
    pub fn new(probs: Array2<f32>) -> OcrResult<Self> {
        if probs.ncols() == 0 {
            return Err(OCRError::recognition_failure(
                "posterior matrix has no classes",
            ));
        }
        for (t, row) in probs.axis_iter(Axis(0)).enumerate() {
            if row.iter().any(|&p| !p.is_finite() || p < 0.0) {
                return Err(OCRError::recognition_failure(format!(
                    "frame {t} contains negative or non-finite probabilities"
                )));
            }
            let sum = row.sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(OCRError::recognition_failure(format!(
                    "frame {t} sums to {sum}, expected 1"
                )));
            }
        }
        Ok(Self { probs })
    }

    /// Applies a numerically stable softmax to each frame of raw scores.
    pub fn from_logits(logits: Array2<f32>) -> OcrResult<Self> {
        let mut probs = logits;
        for mut row in probs.axis_iter_mut(Axis(0)) {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            if sum > 0.0 && sum.is_finite() {
                row.mapv_inplace(|v| v / sum);
            }
        }
        Self::new(probs)
    }

    /// Converts per-frame log-probabilities, renormalizing rounding drift.
    pub fn from_log_probs(log_probs: Array2<f32>) -> OcrResult<Self> {
        let mut probs = log_probs.mapv(f32::exp);
        for mut row in probs.axis_iter_mut(Axis(0)) {
            let sum = row.sum();
            if sum > 0.0 && sum.is_finite() {
                row.mapv_inplace(|v| v / sum);
            }
        }
        Self::new(probs)
    }

    /// Number of time steps.
    pub fn frames(&self) -> usize {
        self.probs.nrows()
    }

    /// Alphabet size including the blank.
    pub fn num_classes(&self) -> usize {
        self.probs.ncols()
    }

    pub fn frame(&self, t: usize) -> ArrayView1<'_, f32> {
        self.probs.row(t)
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.probs.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rejects_unnormalized_rows() {
        let err = FramePosteriors::new(array![[0.5, 0.2]]).unwrap_err();
        assert!(err.is_recognition_failure());
        assert!(FramePosteriors::new(array![[0.5, -0.5, 1.0]]).is_err());
    }

    #[test]
    fn test_zero_frames_allowed() {
        let post = FramePosteriors::new(Array2::zeros((0, 5))).unwrap();
        assert_eq!(post.frames(), 0);
        assert_eq!(post.num_classes(), 5);
    }

    #[test]
    fn test_from_logits_normalizes() {
        let post = FramePosteriors::from_logits(array![[1000.0, 1000.0], [0.0, 2.0]]).unwrap();
        assert!((post.frame(0)[0] - 0.5).abs() < 1e-6);
        assert!(post.frame(1)[1] > post.frame(1)[0]);
    }
}
