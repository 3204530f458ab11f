//! Alphabet file loading and builder path helpers.

use crate::core::OCRError;
use std::path::Path;

/// Reads an alphabet file with one class string per line.
///
/// Blank lines and a trailing newline are skipped; every other line,
/// including surrounding spaces, becomes one class in file order.
///
/// # Errors
///
/// Returns `OCRError::InvalidInput` if the file cannot be read.
///
/// # Example
///
/// ```rust,no_run
/// use scribe_ocr_core::utils::read_alphabet;
/// use std::path::Path;
///
/// let alphabet = read_alphabet(Path::new("path/to/alphabet.txt"))?;
/// # Ok::<(), scribe_ocr_core::core::OCRError>(())
/// ```
pub fn read_alphabet(path: &Path) -> Result<Vec<String>, OCRError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        OCRError::invalid_input(format!(
            "failed to read alphabet from '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok(content
        .lines()
        .filter(|l| !l.is_empty())
        .map(|s| s.to_string())
        .collect())
}

/// Returns the path, or a `ConfigError` naming the component that needs it.
pub fn require_path<P: AsRef<Path>>(
    path: Option<P>,
    component: &str,
    description: &str,
) -> Result<P, OCRError> {
    path.ok_or_else(|| OCRError::config_error(format!("{description} is required for {component}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_alphabet_skips_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "ﬁ").unwrap();
        writeln!(file, " ").unwrap();
        let alphabet = read_alphabet(file.path()).unwrap();
        assert_eq!(alphabet, vec!["a", "ﬁ", " "]);
    }

    #[test]
    fn test_read_alphabet_missing_file() {
        let err = read_alphabet(Path::new("/nonexistent/alphabet.txt")).unwrap_err();
        assert!(matches!(err, OCRError::InvalidInput { .. }));
    }

    #[test]
    fn test_require_path() {
        let present = require_path(Some(PathBuf::from("model.onnx")), "recognizer", "model path");
        assert!(present.is_ok());
        let missing = require_path(None::<PathBuf>, "recognizer", "model path").unwrap_err();
        assert!(matches!(missing, OCRError::ConfigError { .. }));
    }
}
