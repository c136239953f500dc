//! Stylesheet transformation engine.
//!
//! Both export passes run an XSLT 1.0 stylesheet over a file on disk. The
//! engine sits behind [`StylesheetEngine`] so the exporter can be driven by
//! the `xsltproc` command in production and by an in-process fake in tests.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::ExportConfig;
use crate::error::ExportError;

/// Ordered `name → string value` parameters passed to a stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformParams {
    params: Vec<(String, String)>,
}

impl TransformParams {
    /// The five parameters the export stylesheets read.
    pub fn from_config(config: &ExportConfig) -> Self {
        let mut params = Self::default();
        params.set("course_name", &config.course_name);
        params.set("moodle_language", &config.locale_language);
        params.set("moodle_country", &config.locale_country);
        params.set("moodle_textdirection", config.text_direction.as_str());
        params.set("moodle_release", &config.release_version);
        params
    }

    /// Add or replace a parameter.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.params.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.params.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// An XSLT processor.
pub trait StylesheetEngine: Send + Sync {
    /// Short name used in error messages, e.g. "xsltproc".
    fn name(&self) -> &str;

    /// Whether the engine can run at all on this machine.
    fn available(&self) -> bool;

    /// Apply `stylesheet` to the XML document stored at `xml` and return the
    /// serialized result. Empty output is a failure.
    fn transform(
        &self,
        xml: &Path,
        stylesheet: &Path,
        params: &TransformParams,
    ) -> Result<String, ExportError>;
}

/// Runs the libxslt `xsltproc` command.
#[derive(Debug, Clone)]
pub struct XsltProc {
    program: PathBuf,
}

impl Default for XsltProc {
    fn default() -> Self {
        Self {
            program: PathBuf::from("xsltproc"),
        }
    }
}

impl XsltProc {
    /// Use a specific `xsltproc` binary instead of the one on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, xml: &Path, stylesheet: &Path, params: &TransformParams) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--nonet");
        for (name, value) in params.iter() {
            cmd.arg("--stringparam").arg(name).arg(value);
        }
        cmd.arg(stylesheet).arg(xml);
        cmd
    }
}

impl StylesheetEngine for XsltProc {
    fn name(&self) -> &str {
        "xsltproc"
    }

    fn available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn transform(
        &self,
        xml: &Path,
        stylesheet: &Path,
        params: &TransformParams,
    ) -> Result<String, ExportError> {
        let failed = |detail: String| ExportError::TransformationFailed {
            stylesheet: stylesheet.to_path_buf(),
            input: xml.to_path_buf(),
            detail,
        };

        debug!(
            "Running {} {} on {}",
            self.program.display(),
            stylesheet.display(),
            xml.display()
        );
        let out = self
            .command(xml, stylesheet, params)
            .output()
            .map_err(|e| failed(format!("cannot run {}: {e}", self.program.display())))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(failed(format!("{}: {}", out.status, stderr.trim())));
        }
        let html = String::from_utf8(out.stdout).map_err(|e| failed(format!("output is not UTF-8: {e}")))?;
        if html.trim().is_empty() {
            return Err(failed("empty output".into()));
        }
        Ok(html)
    }
}
