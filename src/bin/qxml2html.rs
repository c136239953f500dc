//! CLI binary for qformat-htmltable.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExportConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use qformat_htmltable::{
    segment_and_clean, CleanStats, ExportConfig, FallbackLabels, HtmlTableExporter, MapLabels,
    NotificationSink, Severity, StrategyChoice, TextDirection, XsltProc,
};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Notifications on stderr ──────────────────────────────────────────────────

/// Prints export notifications to stderr. Plugin strings carry `<b>` markup
/// for the host UI; it is rendered as bold here.
struct StderrNotifier;

impl NotificationSink for StderrNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        let text = message.replace("<b>", "\x1b[1m").replace("</b>", "\x1b[22m");
        match severity {
            Severity::Warning => eprintln!("{} {}", yellow("⚠"), text),
            Severity::Error => eprintln!("{} {}", red("✘"), text),
        }
    }

    fn on_temp_file_kept(&self, path: &Path) {
        eprintln!("  {} {}", dim("kept"), path.display());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export a question bank to HTML (stdout)
  qxml2html questions.xml --assets /usr/share/qformat-htmltable

  # Export to file with course and locale
  qxml2html questions.xml -o review.htm --course "Chemistry 101" --lang de --country AT

  # Only clean the CDATA payloads and write the XML back
  qxml2html --clean-only questions.xml -o cleaned.xml

  # Cleaning statistics as JSON
  qxml2html --clean-only --json questions.xml

  # Read from stdin, force the allow-list stripper
  cat questions.xml | qxml2html - --clean-only --strategy denylist

ASSETS DIRECTORY:
  mqxml2html_pass1.xsl    question XML → XHTML fragment
  mqxml2html_pass2.xsl    fragment → final page
  htmlfile_template.html  page template with CSS
  qtype_icons_base64.xml  question type icons (optional)

LABELS FILE:
  JSON map of namespace → key → text, e.g.
    {"qtype_truefalse": {"true": "Wahr", "false": "Falsch"}}
  Labels not in the file render as [[key]].

ENVIRONMENT VARIABLES:
  RUST_LOG                Override log filter (e.g. qformat_htmltable=debug)
"#;

/// Export quiz question XML as an HTML review table.
#[derive(Parser, Debug)]
#[command(
    name = "qxml2html",
    version,
    about = "Export quiz question XML as an HTML review table",
    long_about = "Clean the embedded HTML of every question in a question-bank XML export and \
transform the result into a single HTML review table using two XSLT passes (xsltproc).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Question XML file, or "-" for stdin.
    input: String,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "QXML2HTML_OUTPUT")]
    output: Option<PathBuf>,

    /// Stop after cleaning and write the cleaned XML.
    #[arg(long)]
    clean_only: bool,

    /// Directory holding stylesheets, template and icon data.
    #[arg(long, env = "QXML2HTML_ASSETS", default_value = "assets")]
    assets: PathBuf,

    /// JSON labels file for the page's localized strings.
    #[arg(long, env = "QXML2HTML_LABELS")]
    labels: Option<PathBuf>,

    /// Course name shown in the page title.
    #[arg(long, default_value = "")]
    course: String,

    /// Interface language, e.g. en.
    #[arg(long, default_value = "en")]
    lang: String,

    /// Interface region, e.g. GB.
    #[arg(long, default_value = "")]
    country: String,

    /// Right-to-left interface language.
    #[arg(long)]
    rtl: bool,

    /// Host release string passed to the stylesheets.
    #[arg(long, default_value = "")]
    release: String,

    /// Sanitizer strategy: auto, repair, denylist.
    #[arg(long, env = "QXML2HTML_STRATEGY", value_enum, default_value = "auto")]
    strategy: StrategyArg,

    /// Keep named entities instead of rewriting them as numeric references.
    #[arg(long)]
    no_entities: bool,

    /// Clean category blocks like any other block.
    #[arg(long)]
    no_category_passthrough: bool,

    /// Keep <p> tags with the denylist strategy.
    #[arg(long)]
    allow_paragraphs: bool,

    /// Strip table tags with the denylist strategy.
    #[arg(long)]
    no_tables: bool,

    /// Debug mode: keep temp files and print their paths.
    #[arg(long, env = "QXML2HTML_KEEP_TEMP")]
    keep_temp: bool,

    /// Directory for temp files.
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// xsltproc binary to use.
    #[arg(long, env = "XSLTPROC", default_value = "xsltproc")]
    xsltproc: PathBuf,

    /// Output structured JSON instead of the document.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "QXML2HTML_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "QXML2HTML_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum StrategyArg {
    Auto,
    Repair,
    Denylist,
}

impl From<StrategyArg> for StrategyChoice {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Auto => StrategyChoice::Auto,
            StrategyArg::Repair => StrategyChoice::Repair,
            StrategyArg::Denylist => StrategyChoice::Denylist,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let content = read_input(&cli.input)?;

    // ── Clean-only mode ──────────────────────────────────────────────────
    if cli.clean_only {
        let outcome = segment_and_clean(&content, &config);
        if cli.json {
            let json =
                serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
            write_output(cli.output.as_deref(), &json)?;
        } else {
            write_output(cli.output.as_deref(), &outcome.document)?;
        }
        if !cli.quiet {
            print_summary(&outcome.stats, outcome.success, cli.output.as_deref());
        }
        return Ok(());
    }

    // ── Full export ──────────────────────────────────────────────────────
    let engine = XsltProc::with_program(&cli.xsltproc);
    let exporter = match cli.labels {
        Some(ref path) => {
            let labels = MapLabels::from_file(path).context("Failed to load labels")?;
            HtmlTableExporter::new(config, engine, labels)
        }
        None => HtmlTableExporter::new(config, engine, FallbackLabels),
    };
    let exporter = if cli.quiet {
        exporter
    } else {
        exporter.with_notifier(Arc::new(StderrNotifier))
    };

    let output = exporter.export(&content).context("Export failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        write_output(cli.output.as_deref(), &json)?;
    } else {
        write_output(cli.output.as_deref(), &output.html)?;
    }
    if !cli.quiet {
        print_summary(&output.stats, true, cli.output.as_deref());
    }

    Ok(())
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .course_name(cli.course.clone())
        .locale(cli.lang.clone(), cli.country.clone())
        .text_direction(if cli.rtl {
            TextDirection::Rtl
        } else {
            TextDirection::Ltr
        })
        .release_version(cli.release.clone())
        .strategy(cli.strategy.clone().into())
        .normalize_entities(!cli.no_entities)
        .passthrough_category(!cli.no_category_passthrough)
        .allow_paragraphs(cli.allow_paragraphs)
        .allow_table_tags(!cli.no_tables)
        .keep_temp_files(cli.keep_temp)
        .assets_dir(cli.assets.clone());

    if let Some(ref dir) = cli.temp_dir {
        builder = builder.temp_dir(dir.clone());
    }

    builder.build().context("Invalid configuration")
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))
    }
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            // Ensure a trailing newline on stdout.
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            Ok(())
        }
    }
}

fn print_summary(stats: &CleanStats, success: bool, output: Option<&Path>) {
    let mismatches = stats.mismatches();
    let mark = if !success {
        red("✘")
    } else if mismatches > 0 {
        yellow("⚠")
    } else {
        green("✔")
    };
    eprintln!(
        "{}  {} blocks  {}/{} payloads changed  {}",
        mark,
        stats.blocks,
        stats.payloads_changed,
        stats.payloads,
        dim(&format!("[{}]", stats.strategy)),
    );
    if mismatches > 0 {
        eprintln!("   {} block(s) copied through unchanged", yellow(&mismatches.to_string()));
    }
    if !success {
        eprintln!("   {}", red("no question blocks found; input written unchanged"));
    }
    if let Some(path) = output {
        eprintln!("   →  {}", bold(&path.display().to_string()));
    }
}
