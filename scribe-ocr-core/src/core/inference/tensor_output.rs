//! Backend-agnostic tensor outputs.

use crate::core::errors::OCRError;
use ndarray::{Array2, Array3, ArrayD, IxDyn};

/// Raw output of an inference engine. Interpretation is up to the model layer.
#[derive(Debug, Clone)]
pub enum TensorOutput {
    /// 32-bit floating point tensor
    F32 { shape: Vec<i64>, data: Vec<f32> },
}

impl TensorOutput {
    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[i64] {
        match self {
            TensorOutput::F32 { shape, .. } => shape,
        }
    }

    /// Converts into a dynamic-dimensional array.
    pub fn into_array_f32(self) -> Result<ArrayD<f32>, OCRError> {
        match self {
            TensorOutput::F32 { shape, data } => {
                if shape.iter().any(|&d| d < 0) {
                    return Err(OCRError::invalid_input(format!(
                        "tensor has unresolved dimensions: {shape:?}"
                    )));
                }
                let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
                Ok(ArrayD::from_shape_vec(IxDyn(&dims), data)?)
            }
        }
    }

    /// Converts into a 2D array, dropping leading unit dimensions.
    pub fn try_into_array2_f32(self) -> Result<Array2<f32>, OCRError> {
        let arr = squeeze_leading(self.into_array_f32()?, 2)?;
        Ok(arr.into_dimensionality()?)
    }

    /// Converts into a 3D array, dropping leading unit dimensions.
    pub fn try_into_array3_f32(self) -> Result<Array3<f32>, OCRError> {
        let arr = squeeze_leading(self.into_array_f32()?, 3)?;
        Ok(arr.into_dimensionality()?)
    }
}

fn squeeze_leading(mut arr: ArrayD<f32>, target_ndim: usize) -> Result<ArrayD<f32>, OCRError> {
    while arr.ndim() > target_ndim {
        if arr.shape()[0] != 1 {
            return Err(OCRError::invalid_input(format!(
                "expected a {target_ndim}D tensor with unit leading dimensions, got shape {:?}",
                arr.shape()
            )));
        }
        arr = arr.index_axis_move(ndarray::Axis(0), 0);
    }
    if arr.ndim() != target_ndim {
        return Err(OCRError::invalid_input(format!(
            "expected a {target_ndim}D tensor, got {}D",
            arr.ndim()
        )));
    }
    Ok(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squeeze_batch_dimension() {
        let out = TensorOutput::F32 {
            shape: vec![1, 2, 3],
            data: (0..6).map(|v| v as f32).collect(),
        };
        let arr = out.try_into_array2_f32().unwrap();
        assert_eq!(arr.dim(), (2, 3));
        assert_eq!(arr[[1, 2]], 5.0);
    }

    #[test]
    fn test_non_unit_batch_rejected() {
        let out = TensorOutput::F32 {
            shape: vec![2, 1, 3],
            data: vec![0.0; 6],
        };
        assert!(out.try_into_array2_f32().is_err());
    }
}
