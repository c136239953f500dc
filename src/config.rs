//! Configuration types for a question-bank HTML export.
//!
//! Everything an export call needs from its host (course name, locale,
//! release) and every behavioural switch of the cleaning pipeline lives in
//! [`ExportConfig`], built via [`ExportConfigBuilder`]. The pipeline reads no
//! ambient state: two exports with equal configs and equal input produce
//! equal output.

use crate::error::ExportError;
use crate::pipeline::sanitize::markup_repair_tool_available;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for one export call.
///
/// Built via [`ExportConfig::builder()`] or using [`ExportConfig::default()`].
///
/// # Example
/// ```rust
/// use qformat_htmltable::{ExportConfig, StrategyChoice};
///
/// let config = ExportConfig::builder()
///     .course_name("Organic Chemistry 101")
///     .locale("de", "AT")
///     .strategy(StrategyChoice::Denylist)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Full name of the course the questions belong to. Shown in the page title.
    pub course_name: String,

    /// Two-letter interface language, e.g. "en". Default: "en".
    pub locale_language: String,

    /// Region part of the locale, e.g. "GB". May be empty.
    pub locale_country: String,

    /// Writing direction of the interface language. Default: [`TextDirection::Ltr`].
    pub text_direction: TextDirection,

    /// Host release string passed to the stylesheets, e.g. "2.7 (Build: 20140512)".
    pub release_version: String,

    /// Which sanitizer strategy to use. Default: [`StrategyChoice::Auto`].
    pub strategy: StrategyChoice,

    /// Rewrite named entities (`&alpha;`) to numeric ones (`&#945;`) in the
    /// denylist strategy. Default: true.
    ///
    /// Needed whenever the stylesheet engine is not UTF-8 safe or does not
    /// know the HTML entity set. Has no effect on the repair strategy; its
    /// serializer emits characters except for `&nbsp;` and the XML escapes,
    /// which are left as written.
    pub normalize_entities: bool,

    /// Copy `<question type="category">` blocks through untouched. Default: true.
    pub passthrough_category: bool,

    /// Keep table structure tags in the denylist strategy. Default: true.
    pub allow_table_tags: bool,

    /// Keep `<p>` in the denylist strategy. Default: false.
    pub allow_paragraphs: bool,

    /// Debug mode: leave temp files on disk for inspection. Default: false.
    pub keep_temp_files: bool,

    /// Directory for temp files. If None, uses the system temp directory.
    pub temp_dir: Option<PathBuf>,

    /// Directory holding the stylesheets, the HTML template and the
    /// question-type icon data. Default: "assets".
    pub assets_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            course_name: String::new(),
            locale_language: "en".to_string(),
            locale_country: String::new(),
            text_direction: TextDirection::default(),
            release_version: String::new(),
            strategy: StrategyChoice::default(),
            normalize_entities: true,
            passthrough_category: true,
            allow_table_tags: true,
            allow_paragraphs: false,
            keep_temp_files: false,
            temp_dir: None,
            assets_dir: PathBuf::from("assets"),
        }
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Temp directory actually used for this export.
    pub fn effective_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Locale as `ll` or `ll_CC`.
    pub fn locale_tag(&self) -> String {
        if self.locale_country.is_empty() {
            self.locale_language.clone()
        } else {
            format!("{}_{}", self.locale_language, self.locale_country)
        }
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn course_name(mut self, name: impl Into<String>) -> Self {
        self.config.course_name = name.into();
        self
    }

    pub fn locale(mut self, language: impl Into<String>, country: impl Into<String>) -> Self {
        self.config.locale_language = language.into();
        self.config.locale_country = country.into();
        self
    }

    pub fn text_direction(mut self, dir: TextDirection) -> Self {
        self.config.text_direction = dir;
        self
    }

    pub fn release_version(mut self, release: impl Into<String>) -> Self {
        self.config.release_version = release.into();
        self
    }

    pub fn strategy(mut self, strategy: StrategyChoice) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn normalize_entities(mut self, v: bool) -> Self {
        self.config.normalize_entities = v;
        self
    }

    pub fn passthrough_category(mut self, v: bool) -> Self {
        self.config.passthrough_category = v;
        self
    }

    pub fn allow_table_tags(mut self, v: bool) -> Self {
        self.config.allow_table_tags = v;
        self
    }

    pub fn allow_paragraphs(mut self, v: bool) -> Self {
        self.config.allow_paragraphs = v;
        self
    }

    pub fn keep_temp_files(mut self, v: bool) -> Self {
        self.config.keep_temp_files = v;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.assets_dir = dir.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        let c = &self.config;
        let lang = c.locale_language.trim();
        if lang.is_empty() || !lang.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(ExportError::InvalidConfig(format!(
                "locale language must be alphabetic, got '{}'",
                c.locale_language
            )));
        }
        if c.strategy == StrategyChoice::Repair && !markup_repair_tool_available() {
            return Err(ExportError::InvalidConfig(
                "repair strategy requested but the markup repair tool is not compiled in \
                 (enable the `tidy` feature)"
                    .into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Writing direction of the interface language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

impl TextDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TextDirection::Ltr => "ltr",
            TextDirection::Rtl => "rtl",
        }
    }
}

/// Which sanitizer strategy an export uses.
///
/// | Choice | Behaviour |
/// |--------|-----------|
/// | `Auto` | Repair tool when compiled in, denylist stripper otherwise (default) |
/// | `Repair` | Always the repair tool; rejected at build time if unavailable |
/// | `Denylist` | Always the allow-list tag stripper |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    #[default]
    Auto,
    Repair,
    Denylist,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ExportConfig::default();
        assert_eq!(c.locale_language, "en");
        assert!(c.normalize_entities);
        assert!(c.passthrough_category);
        assert!(c.allow_table_tags);
        assert!(!c.allow_paragraphs);
        assert!(!c.keep_temp_files);
        assert_eq!(c.strategy, StrategyChoice::Auto);
    }

    #[test]
    fn test_locale_tag() {
        let c = ExportConfig::builder().locale("pt", "BR").build().unwrap();
        assert_eq!(c.locale_tag(), "pt_BR");
        let c = ExportConfig::builder().locale("fr", "").build().unwrap();
        assert_eq!(c.locale_tag(), "fr");
    }

    #[test]
    fn test_rejects_bad_language() {
        let err = ExportConfig::builder().locale("", "GB").build().unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfig(_)));
        assert!(ExportConfig::builder().locale("e n", "").build().is_err());
    }

    #[test]
    fn test_repair_strategy_matches_capability() {
        let result = ExportConfig::builder()
            .strategy(StrategyChoice::Repair)
            .build();
        assert_eq!(result.is_ok(), markup_repair_tool_available());
    }

    #[test]
    fn test_serde_roundtrip_names() {
        let c = ExportConfig::builder()
            .text_direction(TextDirection::Rtl)
            .strategy(StrategyChoice::Denylist)
            .build()
            .unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains(r#""text_direction":"rtl""#), "got: {json}");
        assert!(json.contains(r#""strategy":"denylist""#), "got: {json}");
    }
}
