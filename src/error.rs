//! Error types for the qformat-htmltable library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExportError`] — **Fatal** for one export call: the HTML document cannot
//!   be produced (no questions, transformation engine missing, temp file not
//!   writable, stylesheet run failed). Returned as `Err(ExportError)` from
//!   [`crate::export::HtmlTableExporter::export`].
//!
//! * [`SegmentError`] — **Soft**: the segmenter could not match block or
//!   payload markers for one scope. The affected text is passed through
//!   unchanged and the error is only counted in
//!   [`crate::output::CleanStats`]; it is never returned from
//!   [`crate::pipeline::segment::segment_and_clean`].

use std::path::PathBuf;
use thiserror::Error;

use crate::labels::plugin_string;

/// All fatal errors returned by an export call.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The export contained no questions at all.
    #[error("No questions to export")]
    NoQuestions,

    // ── Environment errors ────────────────────────────────────────────────
    /// No stylesheet transformation engine could be found.
    #[error("Stylesheet transformation engine '{engine}' is not available")]
    TransformerUnavailable { engine: String },

    /// A stylesheet needed for one of the two passes is missing.
    #[error("XSLT stylesheet '{path}' is not available")]
    StylesheetUnavailable { path: PathBuf },

    /// The HTML template wrapped around pass-1 output is missing.
    #[error("XHTML template '{path}' is not available")]
    TemplateUnavailable { path: PathBuf },

    // ── Temp file errors ──────────────────────────────────────────────────
    #[error("Cannot open temporary file in '{dir}': {source}")]
    CannotOpenTempFile {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write to temporary file '{path}': {source}")]
    CannotWriteTempFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Transformation errors ─────────────────────────────────────────────
    /// The stylesheet engine ran but returned no usable output.
    #[error("XSLT transformation failed (XSLT: {stylesheet}; XML: {input}): {detail}")]
    TransformationFailed {
        stylesheet: PathBuf,
        input: PathBuf,
        detail: String,
    },

    // ── Config / I/O errors ───────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading an asset (icons, template) failed after it was found.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Key of the plugin string shown to the user for this error.
    pub fn message_key(&self) -> &'static str {
        match self {
            ExportError::NoQuestions => "noquestions",
            ExportError::TransformerUnavailable { .. } => "xsltunavailable",
            ExportError::StylesheetUnavailable { .. } => "stylesheetunavailable",
            ExportError::TemplateUnavailable { .. } => "templateunavailable",
            ExportError::CannotOpenTempFile { .. } => "cannotopentempfile",
            ExportError::CannotWriteTempFile { .. } | ExportError::Io { .. } => {
                "cannotwritetotempfile"
            }
            ExportError::TransformationFailed { .. } => "transformationfailed",
            ExportError::InvalidConfig(_) => "invalidconfig",
        }
    }

    /// Localized notification text, with the error's subject substituted
    /// for `$a` in the plugin string.
    pub fn user_message(&self) -> String {
        let arg = match self {
            ExportError::StylesheetUnavailable { path } | ExportError::TemplateUnavailable { path } => {
                path.display().to_string()
            }
            ExportError::CannotOpenTempFile { dir, .. } => dir.display().to_string(),
            ExportError::CannotWriteTempFile { path, .. } | ExportError::Io { path, .. } => {
                path.display().to_string()
            }
            ExportError::TransformationFailed { stylesheet, input, .. } => format!(
                "(XSLT: {}; XML: {})",
                stylesheet.display(),
                input.display()
            ),
            ExportError::InvalidConfig(reason) => reason.clone(),
            ExportError::NoQuestions | ExportError::TransformerUnavailable { .. } => String::new(),
        };
        plugin_string(self.message_key(), &arg)
    }
}

/// A soft failure while segmenting one scope of the document.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SegmentError {
    /// Block or payload markers could not be matched consistently.
    #[error("Structural mismatch at byte {offset}: {reason}")]
    StructuralMismatch { offset: usize, reason: String },

    /// The document contains no question blocks.
    #[error("Document contains no question blocks")]
    EmptyInput,
}

impl SegmentError {
    pub(crate) fn mismatch(offset: usize, reason: impl Into<String>) -> Self {
        SegmentError::StructuralMismatch {
            offset,
            reason: reason.into(),
        }
    }

    /// Shift a block-relative offset to a document offset.
    pub(crate) fn offset_by(self, base: usize) -> Self {
        match self {
            SegmentError::StructuralMismatch { offset, reason } => SegmentError::StructuralMismatch {
                offset: offset + base,
                reason,
            },
            other => other,
        }
    }
}
