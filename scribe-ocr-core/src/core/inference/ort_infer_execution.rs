use super::{OrtInfer, TensorOutput};
use crate::core::errors::OCRError;
use ort::session::SessionInputs;
use ort::value::TensorRef;
use std::borrow::Cow;
use std::sync::atomic::Ordering;

/// A borrowed f32 tensor passed to [`OrtInfer::infer`].
#[derive(Debug)]
pub enum TensorInput<'a> {
    /// A 2D tensor, e.g. pairwise ordering features.
    Array2(&'a ndarray::Array2<f32>),
    /// A 4D tensor, e.g. an `[N, C, H, W]` image batch.
    Array4(&'a ndarray::Array4<f32>),
}

impl<'a> TensorInput<'a> {
    fn to_tensor_ref(&self) -> Result<TensorRef<'a, f32>, OCRError> {
        let tensor = match *self {
            TensorInput::Array2(arr) => TensorRef::from_array_view(arr.view()),
            TensorInput::Array4(arr) => TensorRef::from_array_view(arr.view()),
        };
        tensor.map_err(|e| OCRError::tensor_operation("failed to create input tensor", e))
    }

    fn shape(&self) -> Vec<usize> {
        match self {
            TensorInput::Array2(arr) => arr.shape().to_vec(),
            TensorInput::Array4(arr) => arr.shape().to_vec(),
        }
    }
}

impl OrtInfer {
    /// Returns the model path associated with this inference engine.
    pub fn model_path(&self) -> &std::path::Path {
        &self.model_path
    }

    /// Returns the model name associated with this inference engine.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Runs one forward pass with named inputs and returns every declared output.
    ///
    /// The output tensors are not interpreted; the model layer validates shapes.
    ///
    /// # Arguments
    ///
    /// * `inputs` - `(name, tensor)` pairs. An empty name binds the session's first input.
    pub fn infer(
        &self,
        inputs: &[(&str, TensorInput)],
    ) -> Result<Vec<(String, TensorOutput)>, OCRError> {
        if inputs.is_empty() {
            return Err(OCRError::invalid_input("no inputs provided for inference"));
        }
        let input_shape = inputs[0].1.shape();

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[idx].lock().map_err(|_| {
            OCRError::invalid_input(format!(
                "model '{}': session {}/{} lock poisoned",
                self.model_name,
                idx,
                self.sessions.len()
            ))
        })?;

        let input_names: Vec<String> = session.inputs().iter().map(|i| i.name().to_string()).collect();
        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        let mut values = Vec::with_capacity(inputs.len());
        for (position, (name, tensor)) in inputs.iter().enumerate() {
            let bound = if name.is_empty() {
                input_names.get(position).cloned().ok_or_else(|| {
                    OCRError::invalid_input(format!(
                        "model '{}' declares {} input(s), got {}",
                        self.model_name,
                        input_names.len(),
                        inputs.len()
                    ))
                })?
            } else {
                name.to_string()
            };
            values.push((Cow::Owned(bound), tensor.to_tensor_ref()?.into()));
        }

        let ort_inputs: SessionInputs<'_, '_, 0> = SessionInputs::ValueMap(values);
        let outputs = session.run(ort_inputs).map_err(|e| {
            OCRError::model_inference_error_builder(&self.model_name, "forward_pass")
                .input_shape(&input_shape)
                .context(format!("session {idx}"))
                .build(e)
        })?;

        let mut results = Vec::with_capacity(output_names.len());
        for name in output_names {
            let value = &outputs[name.as_str()];
            let (shape, data) = value.try_extract_tensor::<f32>().map_err(|e| {
                OCRError::inference_error(
                    &self.model_name,
                    &format!("output '{name}' is not an f32 tensor"),
                    e,
                )
            })?;
            let tensor = TensorOutput::F32 {
                shape: shape.iter().copied().collect(),
                data: data.to_vec(),
            };
            results.push((name, tensor));
        }
        tracing::debug!(
            "model '{}' forward pass on {:?} produced {} output(s)",
            self.model_name,
            input_shape,
            results.len()
        );
        Ok(results)
    }
}
