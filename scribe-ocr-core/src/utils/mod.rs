//! Image, tensor and file helpers shared by the processors and models.

pub mod dict;
pub mod image;
pub mod tensor;

pub use dict::{read_alphabet, require_path};
pub use self::image::{check_image_size, pad_horizontal, resize_to_height};
pub use tensor::{gray_to_tensor, page_to_tensor};
