//! Unicode and whitespace normalization of line text.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Unicode normalization form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NormalizationForm {
    Nfc,
    Nfd,
    Nfkc,
    Nfkd,
}

/// Normalization applied to ground truth before encoding and to recognized text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNormalization {
    #[serde(default)]
    pub form: Option<NormalizationForm>,
    /// Collapse whitespace runs to one space and trim the ends.
    #[serde(default)]
    pub normalize_whitespace: bool,
}

impl TextNormalization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form(mut self, form: NormalizationForm) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_whitespace(mut self, enabled: bool) -> Self {
        self.normalize_whitespace = enabled;
        self
    }

    pub fn is_identity(&self) -> bool {
        self.form.is_none() && !self.normalize_whitespace
    }

    pub fn apply(&self, text: &str) -> String {
        let normalized: String = match self.form {
            None => text.to_string(),
            Some(NormalizationForm::Nfc) => text.nfc().collect(),
            Some(NormalizationForm::Nfd) => text.nfd().collect(),
            Some(NormalizationForm::Nfkc) => text.nfkc().collect(),
            Some(NormalizationForm::Nfkd) => text.nfkd().collect(),
        };
        if self.normalize_whitespace {
            normalized.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            normalized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forms() {
        let decomposed = "e\u{301}";
        let nfc = TextNormalization::new().with_form(NormalizationForm::Nfc);
        assert_eq!(nfc.apply(decomposed), "\u{e9}");
        let nfd = TextNormalization::new().with_form(NormalizationForm::Nfd);
        assert_eq!(nfd.apply("\u{e9}"), decomposed);
        let nfkc = TextNormalization::new().with_form(NormalizationForm::Nfkc);
        assert_eq!(nfkc.apply("\u{fb01}"), "fi");
    }

    #[test]
    fn test_whitespace() {
        let norm = TextNormalization::new().with_whitespace(true);
        assert_eq!(norm.apply("  a \t b\u{a0}c  "), "a b c");
        assert!(TextNormalization::new().is_identity());
    }

    #[test]
    fn test_serde_form_names() {
        let norm: TextNormalization =
            serde_json::from_str(r#"{"form": "NFKD", "normalize_whitespace": true}"#).unwrap();
        assert_eq!(norm.form, Some(NormalizationForm::Nfkd));
    }
}
