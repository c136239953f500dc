//! The `htmltable` export format.
//!
//! [`HtmlTableExporter::presave`] turns the host's question-bank XML into a
//! single HTML review table:
//!
//! ```text
//! question XML
//!  │
//!  ├─ 1. Check    transformation engine + pass-1 stylesheet present
//!  ├─ 2. Clean    segment_and_clean (sanitize every CDATA payload)
//!  ├─ 3. Wrap     <container><quiz>…</quiz> labels icons </container> → temp file
//!  ├─ 4. Pass 1   mqxml2html_pass1.xsl → XHTML fragment
//!  ├─ 5. Wrap     <container> fragment <htmltemplate>…</htmltemplate></container>
//!  └─ 6. Pass 2   mqxml2html_pass2.xsl → final HTML
//! ```
//!
//! Stylesheets, template and icon data are read from
//! [`ExportConfig::assets_dir`]. The temp file is removed on every exit path
//! unless [`ExportConfig::keep_temp_files`] is set.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::labels::{labels_xml, plugin_string, FallbackLabels, LabelResolver};
use crate::notify::{NoopNotifier, Notifier, Severity};
use crate::output::ExportOutput;
use crate::pipeline::segment::segment_and_clean;
use crate::pipeline::transform::{StylesheetEngine, TransformParams, XsltProc};

/// Stylesheet converting question XML to an XHTML fragment.
pub const PASS1_STYLESHEET: &str = "mqxml2html_pass1.xsl";
/// Stylesheet merging the fragment into the HTML template.
pub const PASS2_STYLESHEET: &str = "mqxml2html_pass2.xsl";
/// HTML page template, CSS included.
pub const HTML_TEMPLATE: &str = "htmlfile_template.html";
/// Base64 question-type icons, appended to the pass-1 input.
pub const QUESTION_ICONS: &str = "qtype_icons_base64.xml";
/// File name prefix of the intermediate document.
pub const TEMP_PREFIX: &str = "m2w-";

/// What the host asks of every question export format.
pub trait TextTransformer {
    /// File extension of the exported file.
    fn extension_label(&self) -> &'static str;

    fn mime_type(&self) -> &'static str;

    fn provide_import(&self) -> bool {
        false
    }

    fn provide_export(&self) -> bool {
        true
    }

    /// Convert the whole export before it is written out.
    fn presave(&self, content: &str) -> Result<String, ExportError>;
}

/// Exports a question bank as an HTML review table.
pub struct HtmlTableExporter {
    config: ExportConfig,
    engine: Box<dyn StylesheetEngine>,
    labels: Box<dyn LabelResolver + Send + Sync>,
    notifier: Notifier,
}

impl std::fmt::Debug for HtmlTableExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlTableExporter")
            .field("config", &self.config)
            .field("engine", &self.engine.name())
            .finish_non_exhaustive()
    }
}

impl HtmlTableExporter {
    pub fn new(
        config: ExportConfig,
        engine: impl StylesheetEngine + 'static,
        labels: impl LabelResolver + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            engine: Box::new(engine),
            labels: Box::new(labels),
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Exporter backed by the `xsltproc` command with untranslated labels.
    pub fn with_xsltproc(config: ExportConfig) -> Self {
        Self::new(config, XsltProc::default(), FallbackLabels)
    }

    /// Send user-facing messages to `notifier` instead of dropping them.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Run the whole export and return the HTML plus cleaning statistics.
    ///
    /// Every error is also reported to the notifier as a localized message.
    pub fn export(&self, content: &str) -> Result<ExportOutput, ExportError> {
        self.run(content).inspect_err(|e| {
            warn!("Export failed: {}", e);
            self.notifier.notify(Severity::Error, &e.user_message());
        })
    }

    fn run(&self, content: &str) -> Result<ExportOutput, ExportError> {
        // ── 1. Environment checks ────────────────────────────────────────
        if !self.engine.available() {
            return Err(ExportError::TransformerUnavailable {
                engine: self.engine.name().to_string(),
            });
        }
        let pass1 = self.stylesheet(PASS1_STYLESHEET)?;

        if content.is_empty() {
            return Err(ExportError::NoQuestions);
        }

        // ── 2. Clean payloads ────────────────────────────────────────────
        let outcome = segment_and_clean(content, &self.config);
        if !outcome.success {
            warn!("No question blocks found; transforming the export unchanged");
        }
        let mismatches = outcome.stats.mismatches();
        if mismatches > 0 {
            self.notifier.notify(
                Severity::Warning,
                &plugin_string("blockscopiedthrough", &mismatches.to_string()),
            );
        }

        // ── 3. Intermediate document ─────────────────────────────────────
        let icons = self.optional_asset(QUESTION_ICONS)?;
        let labels = labels_xml(self.labels.as_ref());
        let document = format!(
            "<container><quiz>{}</quiz>{labels}{icons}</container>",
            outcome.document
        );

        let dir = self.config.effective_temp_dir();
        let tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".xml")
            .tempfile_in(&dir)
            .map_err(|e| ExportError::CannotOpenTempFile { dir, source: e })?;

        let result = self.run_passes(tmp.path(), &document, &pass1);

        if self.config.keep_temp_files {
            match tmp.keep() {
                Ok((_, path)) => {
                    info!("Debug mode: temp file kept at {}", path.display());
                    self.notifier.on_temp_file_kept(&path);
                }
                Err(e) => warn!("Could not keep temp file: {}", e),
            }
        }

        let html = result?;
        info!(
            "Export complete: {} blocks, {} payloads cleaned, {} bytes of HTML",
            outcome.stats.blocks,
            outcome.stats.payloads,
            html.len()
        );
        Ok(ExportOutput {
            html,
            stats: outcome.stats,
        })
    }

    fn run_passes(&self, tmp: &Path, document: &str, pass1: &Path) -> Result<String, ExportError> {
        let params = TransformParams::from_config(&self.config);

        // ── 4. Pass 1 ────────────────────────────────────────────────────
        write_temp(tmp, document)?;
        debug!("Intermediate XML ({} bytes) saved to {}", document.len(), tmp.display());
        let fragment = self.engine.transform(tmp, pass1, &params)?;
        debug!("Pass 1 produced {} bytes", fragment.len());

        // ── 5. Wrap in template ──────────────────────────────────────────
        let template_path = self.config.assets_dir.join(HTML_TEMPLATE);
        let template = std::fs::read_to_string(&template_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ExportError::TemplateUnavailable {
                path: template_path.clone(),
            },
            _ => ExportError::Io {
                path: template_path.clone(),
                source: e,
            },
        })?;
        write_temp(
            tmp,
            &format!("<container>{fragment}<htmltemplate>{template}</htmltemplate></container>"),
        )?;

        // ── 6. Pass 2 ────────────────────────────────────────────────────
        let pass2 = self.stylesheet(PASS2_STYLESHEET)?;
        let html = self.engine.transform(tmp, &pass2, &params)?;
        debug!("Pass 2 produced {} bytes", html.len());
        Ok(html)
    }

    fn stylesheet(&self, name: &str) -> Result<PathBuf, ExportError> {
        let path = self.config.assets_dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ExportError::StylesheetUnavailable { path })
        }
    }

    /// Asset content, or empty when the file does not exist.
    fn optional_asset(&self, name: &str) -> Result<String, ExportError> {
        let path = self.config.assets_dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("{} not found; exporting without it", path.display());
                Ok(String::new())
            }
            Err(e) => Err(ExportError::Io { path, source: e }),
        }
    }
}

impl TextTransformer for HtmlTableExporter {
    fn extension_label(&self) -> &'static str {
        ".htm"
    }

    fn mime_type(&self) -> &'static str {
        "text/html"
    }

    fn presave(&self, content: &str) -> Result<String, ExportError> {
        self.export(content).map(|out| out.html)
    }
}

fn write_temp(path: &Path, contents: &str) -> Result<(), ExportError> {
    std::fs::write(path, contents).map_err(|e| ExportError::CannotWriteTempFile {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Unavailable;

    impl StylesheetEngine for Unavailable {
        fn name(&self) -> &str {
            "none"
        }
        fn available(&self) -> bool {
            false
        }
        fn transform(&self, _: &Path, _: &Path, _: &TransformParams) -> Result<String, ExportError> {
            unreachable!("engine is unavailable")
        }
    }

    /// Returns the input document unchanged.
    struct Echo;

    impl StylesheetEngine for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn available(&self) -> bool {
            true
        }
        fn transform(&self, xml: &Path, _: &Path, _: &TransformParams) -> Result<String, ExportError> {
            Ok(std::fs::read_to_string(xml).unwrap())
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<(Severity, String)>>);

    impl crate::notify::NotificationSink for Recording {
        fn notify(&self, severity: Severity, message: &str) {
            self.0.lock().unwrap().push((severity, message.to_string()));
        }
    }

    fn config_with_assets(dir: &Path) -> ExportConfig {
        ExportConfig::builder()
            .assets_dir(dir)
            .temp_dir(dir)
            .build()
            .unwrap()
    }

    #[test]
    fn test_format_capabilities() {
        let exporter = HtmlTableExporter::with_xsltproc(ExportConfig::default());
        assert_eq!(exporter.extension_label(), ".htm");
        assert_eq!(exporter.mime_type(), "text/html");
        assert!(!exporter.provide_import());
        assert!(exporter.provide_export());
    }

    #[test]
    fn test_engine_unavailable_is_notified() {
        let sink = Arc::new(Recording::default());
        let exporter = HtmlTableExporter::new(ExportConfig::default(), Unavailable, FallbackLabels)
            .with_notifier(sink.clone());
        let err = exporter.presave("<quiz/>").unwrap_err();
        assert!(matches!(err, ExportError::TransformerUnavailable { .. }));
        let messages = sink.0.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, Severity::Error);
    }

    #[test]
    fn test_missing_stylesheet() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = HtmlTableExporter::new(config_with_assets(dir.path()), Echo, FallbackLabels);
        let err = exporter.presave("<question type=\"x\"></question>").unwrap_err();
        match err {
            ExportError::StylesheetUnavailable { path } => {
                assert!(path.ends_with(PASS1_STYLESHEET))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_content_no_questions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PASS1_STYLESHEET), "<xsl/>").unwrap();
        let exporter = HtmlTableExporter::new(config_with_assets(dir.path()), Echo, FallbackLabels);
        assert!(matches!(exporter.presave(""), Err(ExportError::NoQuestions)));
    }

    #[test]
    fn test_mismatched_block_warning_is_localized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PASS1_STYLESHEET), "<xsl/>").unwrap();
        let sink = Arc::new(Recording::default());
        let exporter = HtmlTableExporter::new(config_with_assets(dir.path()), Echo, FallbackLabels)
            .with_notifier(sink.clone());
        let _ = exporter.presave("<question type=\"essay\"><text><![CDATA[never closed</text></question>");
        let messages = sink.0.lock().unwrap();
        assert_eq!(
            messages[0],
            (Severity::Warning, plugin_string("blockscopiedthrough", "1"))
        );
    }

    #[test]
    fn test_missing_template_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PASS1_STYLESHEET), "<xsl/>").unwrap();
        let exporter = HtmlTableExporter::new(config_with_assets(dir.path()), Echo, FallbackLabels);
        let err = exporter
            .presave("<question type=\"truefalse\"><text><![CDATA[<p>x</p>]]></text></question>")
            .unwrap_err();
        assert!(matches!(err, ExportError::TemplateUnavailable { .. }));
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .count();
        assert_eq!(leftovers, 0);
    }
}
