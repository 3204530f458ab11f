//! Configuration error types and validation traits.

use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A model path does not exist.
    #[error("model path does not exist: {path}")]
    ModelPathNotFound { path: std::path::PathBuf },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A probability or ratio lies outside its valid range.
    #[error("{field} must lie in {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

/// A trait for validating configuration parameters.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Validates that `value` lies in the closed range `min..=max`.
    fn validate_range(
        &self,
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    ) -> Result<(), ConfigError> {
        if !value.is_finite() || value < min || value > max {
            return Err(ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            });
        }
        Ok(())
    }

    /// Validates that a count is non-zero.
    fn validate_non_zero(&self, field: &str, value: usize) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidConfig {
                message: format!("{field} must be greater than 0"),
            });
        }
        Ok(())
    }

    /// Validates a model path.
    fn validate_model_path(&self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ModelPathNotFound {
                path: path.to_path_buf(),
            });
        }
        if !path.is_file() {
            return Err(ConfigError::InvalidConfig {
                message: format!("model path is not a file: {}", path.display()),
            });
        }
        Ok(())
    }
}
