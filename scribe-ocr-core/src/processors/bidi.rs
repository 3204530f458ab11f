//! Unicode bidirectional reordering of recognized lines.
//!
//! Recognizers emit text in logical order. [`to_display`] runs the Unicode
//! Bidirectional Algorithm (UAX #9) over each line so that mixed left-to-right
//! and right-to-left content is laid out the way a reader sees it.

use crate::core::config::{ConfigError, ConfigValidator};
use serde::{Deserialize, Serialize};
use unicode_bidi::{BidiClass, BidiInfo, Level, bidi_class};

/// Paragraph embedding direction used by the algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseDirection {
    /// Taken from the first strong character of the text.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "L")]
    LeftToRight,
    #[serde(rename = "R")]
    RightToLeft,
}

impl BaseDirection {
    fn level(&self) -> Option<Level> {
        match self {
            BaseDirection::Auto => None,
            BaseDirection::LeftToRight => Some(Level::ltr()),
            BaseDirection::RightToLeft => Some(Level::rtl()),
        }
    }
}

/// Settings for the reordering step of the page pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidiConfig {
    /// Whether recognized lines are reordered at all.
    #[serde(default = "BidiConfig::default_reorder")]
    pub reorder: bool,
    #[serde(default)]
    pub base_direction: BaseDirection,
}

impl BidiConfig {
    pub fn with_base_direction(mut self, base: BaseDirection) -> Self {
        self.base_direction = base;
        self
    }

    pub fn with_reorder(mut self, reorder: bool) -> Self {
        self.reorder = reorder;
        self
    }

    /// Applies the configured reordering to one line.
    pub fn apply(&self, text: &str) -> String {
        if self.reorder {
            to_display(text, self.base_direction)
        } else {
            text.to_string()
        }
    }

    fn default_reorder() -> bool {
        true
    }
}

impl Default for BidiConfig {
    fn default() -> Self {
        Self {
            reorder: Self::default_reorder(),
            base_direction: BaseDirection::Auto,
        }
    }
}

impl ConfigValidator for BidiConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// A maximal run of one embedding direction in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionalRun {
    /// Run text in logical order.
    pub text: String,
    pub rtl: bool,
}

/// Reorders logical-order `text` into display order.
///
/// Text without right-to-left characters is returned unchanged, so a second
/// pass is a no-op for it. Mixed text is permuted: a second pass over display
/// output flips the right-to-left runs back into logical order.
pub fn to_display(text: &str, base: BaseDirection) -> String {
    let info = BidiInfo::new(text, base.level());
    if !info.has_rtl() {
        return text.to_string();
    }
    let mut display = String::with_capacity(text.len());
    for para in &info.paragraphs {
        display.push_str(&info.reorder_line(para, para.range.clone()));
    }
    display
}

/// Directional runs of `text` in visual order, left to right.
pub fn visual_runs(text: &str, base: BaseDirection) -> Vec<DirectionalRun> {
    let info = BidiInfo::new(text, base.level());
    let mut runs = Vec::new();
    for para in &info.paragraphs {
        let (levels, level_runs) = info.visual_runs(para, para.range.clone());
        for run in level_runs {
            runs.push(DirectionalRun {
                text: text[run.clone()].to_string(),
                rtl: levels[run.start].is_rtl(),
            });
        }
    }
    runs
}

/// Direction of the first strong character, if any.
pub fn resolved_direction(text: &str) -> Option<BaseDirection> {
    text.chars().find_map(|c| match bidi_class(c) {
        BidiClass::L => Some(BaseDirection::LeftToRight),
        BidiClass::R | BidiClass::AL => Some(BaseDirection::RightToLeft),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtl_with_embedded_numeral() {
        // Logical: ALEF BET GIMEL, "123", DALET HE VAV.
        let logical = "\u{5d0}\u{5d1}\u{5d2}123\u{5d3}\u{5d4}\u{5d5}";
        let display = to_display(logical, BaseDirection::RightToLeft);
        assert_eq!(display, "\u{5d5}\u{5d4}\u{5d3}123\u{5d2}\u{5d1}\u{5d0}");
        assert_eq!(to_display(logical, BaseDirection::Auto), display);
    }

    #[test]
    fn test_ltr_text_is_unchanged_and_idempotent() {
        let text = "Anno 1642, den 3. Mai";
        let once = to_display(text, BaseDirection::LeftToRight);
        assert_eq!(once, text);
        assert_eq!(to_display(&once, BaseDirection::LeftToRight), once);
        assert_eq!(to_display(text, BaseDirection::Auto), text);
    }

    #[test]
    fn test_second_pass_over_mixed_text_restores_logical_order() {
        let logical = "\u{5d0}\u{5d1}\u{5d2}123\u{5d3}\u{5d4}\u{5d5}";
        let once = to_display(logical, BaseDirection::RightToLeft);
        assert_ne!(once, logical);
        assert_eq!(to_display(&once, BaseDirection::RightToLeft), logical);
        assert_eq!(to_display(&once, BaseDirection::Auto), logical);

        let logical = "see \u{5e9}\u{5dc}\u{5d5}\u{5dd} here";
        let once = to_display(logical, BaseDirection::LeftToRight);
        assert_eq!(to_display(&once, BaseDirection::LeftToRight), logical);
    }

    #[test]
    fn test_embedded_rtl_word_in_ltr_line() {
        let logical = "see \u{5e9}\u{5dc}\u{5d5}\u{5dd} here";
        let display = to_display(logical, BaseDirection::LeftToRight);
        assert_eq!(display, "see \u{5dd}\u{5d5}\u{5dc}\u{5e9} here");
    }

    #[test]
    fn test_visual_runs() {
        let runs = visual_runs("\u{5d0}\u{5d1}123", BaseDirection::RightToLeft);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "123");
        assert!(!runs[0].rtl);
        assert!(runs[1].rtl);
    }

    #[test]
    fn test_resolved_direction() {
        assert_eq!(
            resolved_direction("123 \u{627}\u{644}"),
            Some(BaseDirection::RightToLeft)
        );
        assert_eq!(resolved_direction("12 ab"), Some(BaseDirection::LeftToRight));
        assert_eq!(resolved_direction("123 !"), None);
    }

    #[test]
    fn test_config_disables_reordering() {
        let config = BidiConfig::default().with_reorder(false);
        assert_eq!(config.apply("\u{5d0}\u{5d1}"), "\u{5d0}\u{5d1}");
        let parsed: BidiConfig = serde_json::from_str(r#"{"base_direction": "R"}"#).unwrap();
        assert_eq!(parsed.base_direction, BaseDirection::RightToLeft);
        assert!(parsed.reorder);
    }
}
