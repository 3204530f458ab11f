//! ONNX Runtime plumbing shared by every network variant.

mod ort_infer;
mod ort_infer_execution;
pub mod session;
mod tensor_output;

pub use ort_infer::OrtInfer;
pub use ort_infer_execution::TensorInput;
pub use tensor_output::TensorOutput;
