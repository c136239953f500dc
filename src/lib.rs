//! # qformat-htmltable
//!
//! Export a question bank, given in the host's question XML format, as a
//! single HTML review table.
//!
//! ## Why this crate?
//!
//! Question text is authored in rich-text editors and pasted from word
//! processors. It arrives inside `<![CDATA[ … ]]>` sections as whatever markup
//! the author produced: unclosed tags, Word comments, `<font>` soup, named
//! entities an XSLT processor has never heard of. Feeding that straight into
//! a stylesheet either fails or produces a broken page. This crate cleans every
//! payload first, without parsing the surrounding XML, so the document
//! structure outside the payloads survives byte for byte.
//!
//! ## Pipeline Overview
//!
//! ```text
//! question XML
//!  │
//!  ├─ 1. Segment   question blocks and CDATA payloads (no XML parser)
//!  ├─ 2. Sanitize  repair tool (ammonia) or allow-list stripper per payload
//!  ├─ 3. Wrap      quiz + localized labels + icon data
//!  ├─ 4. Pass 1    XSLT → XHTML fragment
//!  └─ 5. Pass 2    XSLT → fragment merged into the HTML template
//! ```
//!
//! ## Quick Start
//!
//! Cleaning only:
//!
//! ```rust
//! use qformat_htmltable::{segment_and_clean, ExportConfig, StrategyChoice};
//!
//! let xml = r#"<quiz><question type="shortanswer"><text><![CDATA[<p>A&nbsp;<img src="a.png" complete="true">]]></text></question></quiz>"#;
//! let config = ExportConfig::builder()
//!     .strategy(StrategyChoice::Denylist)
//!     .build()
//!     .unwrap();
//! let outcome = segment_and_clean(xml, &config);
//! assert!(outcome.success);
//! assert!(outcome.document.contains(r#"<img src="a.png"/>"#));
//! ```
//!
//! Full export through `xsltproc`:
//!
//! ```rust,no_run
//! use qformat_htmltable::{ExportConfig, HtmlTableExporter, TextTransformer};
//!
//! let config = ExportConfig::builder()
//!     .course_name("Chemistry 101")
//!     .assets_dir("/usr/share/qformat-htmltable")
//!     .build()?;
//! let exporter = HtmlTableExporter::with_xsltproc(config);
//! let html = exporter.presave(&std::fs::read_to_string("questions.xml")?)?;
//! std::fs::write("questions.htm", html)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `qxml2html` binary (clap + anyhow + tracing-subscriber) |
//! | `tidy`  | on      | Repair strategy backed by `ammonia`; without it only the allow-list stripper is available |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! qformat-htmltable = { version = "0.3", default-features = false, features = ["tidy"] }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod labels;
pub mod notify;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExportConfig, ExportConfigBuilder, StrategyChoice, TextDirection};
pub use error::{ExportError, SegmentError};
pub use export::{HtmlTableExporter, TextTransformer};
pub use labels::{FallbackLabels, LabelResolver, MapLabels};
pub use notify::{NoopNotifier, NotificationSink, Notifier, Severity};
pub use output::{CleanOutcome, CleanStats, ExportOutput};
pub use pipeline::sanitize::{markup_repair_tool_available, sanitize, Sanitizer};
pub use pipeline::segment::segment_and_clean;
pub use pipeline::transform::{StylesheetEngine, TransformParams, XsltProc};
