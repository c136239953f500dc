//! Payload sanitization: turn raw, possibly malformed question markup into
//! clean markup that can be re-embedded in the export document.
//!
//! ## Two strategies
//!
//! | Strategy | When | Tag handling |
//! |----------|------|--------------|
//! | [`Sanitizer::Repair`] | `tidy` feature compiled in | html5ever parse + re-serialise via `ammonia`, tag/attribute allow-list |
//! | [`Sanitizer::Denylist`] | otherwise, or forced by config | regex stripping of every tag outside an allow-list |
//!
//! The strategy is chosen once per export by [`Sanitizer::select`]; the
//! per-payload path never branches on capability again.
//!
//! ## Step order
//!
//! Every step works on the output of the previous one:
//!
//! 1. tag stripping / repair, void elements rewritten self-closing
//! 2. `complete="true"` artefact removal
//! 3. named → numeric entities (denylist only, when enabled)
//! 4. placeholder file-name decoding
//! 5. soft-hyphen removal (the denylist stripper also runs it before step 1)
//!
//! Sanitizing never fails; input without anything to fix comes back unchanged.

use crate::config::{ExportConfig, StrategyChoice};
use crate::pipeline::{entities, repair};
use tracing::debug;

/// Whether the markup repair tool is available in this build.
pub fn markup_repair_tool_available() -> bool {
    cfg!(feature = "tidy")
}

/// Sanitize one payload with the strategy [`ExportConfig::default`] selects.
pub fn sanitize(raw: &str) -> String {
    Sanitizer::select(&ExportConfig::default()).sanitize(raw)
}

/// The sanitizer strategy in effect for one export.
pub enum Sanitizer {
    #[cfg(feature = "tidy")]
    Repair(RepairTool),
    Denylist(DenylistStripper),
}

impl Sanitizer {
    /// Pick the strategy for an export from its configuration and the
    /// capability probe.
    pub fn select(config: &ExportConfig) -> Self {
        let want_repair = match config.strategy {
            StrategyChoice::Auto | StrategyChoice::Repair => markup_repair_tool_available(),
            StrategyChoice::Denylist => false,
        };
        if want_repair {
            if let Some(repair) = Self::repair_tool() {
                debug!("Sanitizer strategy: repair tool");
                return repair;
            }
        }
        debug!("Sanitizer strategy: denylist stripper");
        Sanitizer::Denylist(DenylistStripper::from_config(config))
    }

    #[cfg(feature = "tidy")]
    fn repair_tool() -> Option<Self> {
        Some(Sanitizer::Repair(RepairTool::new()))
    }

    #[cfg(not(feature = "tidy"))]
    fn repair_tool() -> Option<Self> {
        None
    }

    /// Short name for logs and stats.
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "tidy")]
            Sanitizer::Repair(_) => "repair",
            Sanitizer::Denylist(_) => "denylist",
        }
    }

    /// Clean one raw payload.
    pub fn sanitize(&self, raw: &str) -> String {
        let s = match self {
            #[cfg(feature = "tidy")]
            Sanitizer::Repair(tool) => tool.clean(raw),
            Sanitizer::Denylist(stripper) => stripper.clean(raw),
        };
        let s = repair::remove_complete_artifact(&s);
        let s = match self {
            Sanitizer::Denylist(stripper) if stripper.normalize_entities => {
                entities::normalize_entities(&s)
            }
            _ => s,
        };
        let s = repair::decode_pluginfile_names(&s);
        repair::strip_soft_hyphens(&s)
    }
}

// ── Strategy A: markup repair tool ───────────────────────────────────────────

#[cfg(feature = "tidy")]
pub use repair_tool::RepairTool;

#[cfg(feature = "tidy")]
mod repair_tool {
    use crate::pipeline::repair;
    use std::collections::{HashMap, HashSet};

    const TAGS: &[&str] = &[
        "a", "blockquote", "br", "caption", "code", "col", "colgroup", "dd", "div", "dl", "dt",
        "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "img", "li", "ol", "p", "pre", "span",
        "strong", "sub", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u", "ul",
    ];

    const GENERIC_ATTRIBUTES: &[&str] = &["dir", "lang", "title"];

    /// Parses payload markup with html5ever and re-serialises only allowed
    /// tags and attributes. Authoring-tool markup (`<o:p>`, `mso-*` styles,
    /// `class`), `<font>` and unknown attributes are dropped, body content
    /// only, never a document shell.
    pub struct RepairTool {
        builder: ammonia::Builder<'static>,
    }

    impl RepairTool {
        pub fn new() -> Self {
            let mut tag_attributes: HashMap<&'static str, HashSet<&'static str>> = HashMap::new();
            tag_attributes.insert("a", ["href"].into_iter().collect());
            tag_attributes.insert(
                "img",
                ["src", "alt", "width", "height"].into_iter().collect(),
            );
            tag_attributes.insert("td", ["colspan", "rowspan"].into_iter().collect());
            tag_attributes.insert("th", ["colspan", "rowspan", "scope"].into_iter().collect());
            tag_attributes.insert("col", ["span"].into_iter().collect());
            tag_attributes.insert("ol", ["start", "type"].into_iter().collect());

            let mut builder = ammonia::Builder::default();
            builder
                .tags(TAGS.iter().copied().collect())
                .tag_attributes(tag_attributes)
                .generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect())
                .link_rel(None)
                .strip_comments(true)
                .url_relative(ammonia::UrlRelative::PassThrough);
            Self { builder }
        }

        pub fn clean(&self, raw: &str) -> String {
            let structural = repair::structural_emphasis(raw);
            let cleaned = self.builder.clean(&structural).to_string();
            repair::close_void_elements(&cleaned)
        }
    }

    impl Default for RepairTool {
        fn default() -> Self {
            Self::new()
        }
    }
}

// ── Strategy B: allow-list tag stripper ──────────────────────────────────────

/// Regex tag stripper for hosts without the repair tool.
#[derive(Debug, Clone)]
pub struct DenylistStripper {
    allowed: Vec<&'static str>,
    normalize_entities: bool,
}

impl DenylistStripper {
    pub fn from_config(config: &ExportConfig) -> Self {
        let mut allowed: Vec<&'static str> = repair::INLINE_TAGS.to_vec();
        if config.allow_table_tags {
            allowed.extend_from_slice(repair::TABLE_TAGS);
        }
        if config.allow_paragraphs {
            allowed.push("p");
        }
        Self {
            allowed,
            normalize_entities: config.normalize_entities,
        }
    }

    pub fn allowed_tags(&self) -> &[&'static str] {
        &self.allowed
    }

    /// Soft hyphens go first: removing one from `<di\u{00AD}v>` after tag
    /// stripping would leave a `<div>` behind.
    pub fn clean(&self, raw: &str) -> String {
        let unhyphenated = repair::strip_soft_hyphens(raw);
        let stripped = repair::strip_tags(&unhyphenated, &self.allowed);
        repair::close_void_elements(&stripped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denylist() -> Sanitizer {
        let config = ExportConfig::builder()
            .strategy(StrategyChoice::Denylist)
            .build()
            .unwrap();
        Sanitizer::select(&config)
    }

    #[test]
    fn test_forced_denylist() {
        assert_eq!(denylist().name(), "denylist");
    }

    #[test]
    fn test_auto_follows_capability() {
        let s = Sanitizer::select(&ExportConfig::default());
        let expected = if markup_repair_tool_available() {
            "repair"
        } else {
            "denylist"
        };
        assert_eq!(s.name(), expected);
    }

    #[test]
    fn test_denylist_img_self_closing() {
        let out = denylist().sanitize(r#"<img src="a.png">"#);
        assert!(out.contains(r#"<img src="a.png"/>"#), "got: {out}");
    }

    #[test]
    fn test_denylist_br_self_closing() {
        assert_eq!(denylist().sanitize("one<br>two"), "one<br/>two");
    }

    #[test]
    fn test_denylist_strips_div_and_font() {
        assert_eq!(
            denylist().sanitize(r#"<div><font face="Arial">Which <b>one</b>?</font></div>"#),
            "Which <b>one</b>?"
        );
    }

    #[test]
    fn test_denylist_table_tags_configurable() {
        let input = "<table><tr><td>x</td></tr></table>";
        assert_eq!(denylist().sanitize(input), input);

        let config = ExportConfig::builder()
            .strategy(StrategyChoice::Denylist)
            .allow_table_tags(false)
            .build()
            .unwrap();
        assert_eq!(Sanitizer::select(&config).sanitize(input), "x");
    }

    #[test]
    fn test_denylist_paragraphs_configurable() {
        assert_eq!(denylist().sanitize("<p>x</p>"), "x");
        let config = ExportConfig::builder()
            .strategy(StrategyChoice::Denylist)
            .allow_paragraphs(true)
            .build()
            .unwrap();
        assert_eq!(Sanitizer::select(&config).sanitize("<p>x</p>"), "<p>x</p>");
    }

    #[test]
    fn test_denylist_artifact_removed() {
        assert_eq!(
            denylist().sanitize(r#"<img src="x" complete="true" alt="y"/>"#),
            r#"<img src="x"  alt="y"/>"#
        );
    }

    #[test]
    fn test_denylist_entities() {
        assert_eq!(denylist().sanitize("&alpha;&beta; &amp;"), "&#945;&#946; &amp;");
    }

    #[test]
    fn test_denylist_entities_disabled() {
        let config = ExportConfig::builder()
            .strategy(StrategyChoice::Denylist)
            .normalize_entities(false)
            .build()
            .unwrap();
        assert_eq!(Sanitizer::select(&config).sanitize("&alpha;"), "&alpha;");
    }

    #[test]
    fn test_denylist_full_order() {
        let input = "<span>Ca\u{00AD}ption</span> <img src=\"@@PLUGINFILE@@/a%20b.png\" complete=\"true\"> &mu;";
        assert_eq!(
            denylist().sanitize(input),
            "Caption <img src=\"@@PLUGINFILE@@/a b.png\"/> &#956;"
        );
    }

    #[test]
    fn test_denylist_idempotent() {
        let s = denylist();
        for input in [
            r#"<p>Hello <b>world</b><br><img src="@@PLUGINFILE@@/x%20y.png" complete="true"></p>"#,
            "&alpha; &amp; &hellip; plain",
            "<table><tr><td>1</td></tr></table><o:p></o:p>",
            r#"<img src="@@PLUGINFILE@@/a%3Eb.png">"#,
            r#"<img src="@@PLUGINFILE@@/x%26alpha;.png">"#,
            r#"<img src="@@PLUGINFILE@@/a%2520b.png">"#,
            "<di<span></span>v>x",
        ] {
            let once = s.sanitize(input);
            assert_eq!(s.sanitize(&once), once, "input: {input}");
        }
    }

    #[test]
    fn test_denylist_split_tag_removed() {
        let s = denylist();
        assert_eq!(s.sanitize("<di<span></span>v>x"), "x");
        assert_eq!(s.sanitize("<di\u{00AD}v>x</d&shy;iv>"), "x");
    }

    #[test]
    fn test_denylist_unsafe_filename_stays_encoded() {
        let s = denylist();
        assert_eq!(
            s.sanitize(r#"<img src="@@PLUGINFILE@@/a%3Eb.png">"#),
            r#"<img src="@@PLUGINFILE@@/a%3Eb.png"/>"#
        );
        assert_eq!(
            s.sanitize(r#"<img src="@@PLUGINFILE@@/x%26alpha;.png">"#),
            r#"<img src="@@PLUGINFILE@@/x%26alpha;.png"/>"#
        );
    }

    #[test]
    fn test_denylist_shy_entity_removed() {
        assert_eq!(denylist().sanitize("soft&shy;ware"), "software");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(denylist().sanitize("What is 2 + 2?"), "What is 2 + 2?");
    }

    #[cfg(feature = "tidy")]
    mod repair_strategy {
        use super::*;

        fn repair() -> Sanitizer {
            Sanitizer::Repair(RepairTool::new())
        }

        #[test]
        fn test_repair_drops_font_and_classes() {
            let out = repair().sanitize(r#"<p class="MsoNormal"><font face="Arial">Hi</font></p>"#);
            assert_eq!(out, "<p>Hi</p>");
        }

        #[test]
        fn test_repair_structural_emphasis() {
            assert_eq!(repair().sanitize("<b>x</b><i>y</i>"), "<strong>x</strong><em>y</em>");
        }

        #[test]
        fn test_repair_closes_unclosed_tags() {
            assert_eq!(repair().sanitize("<p><strong>open"), "<p><strong>open</strong></p>");
        }

        #[test]
        fn test_repair_void_elements_self_closing() {
            let out = repair().sanitize(r#"a<br>b<img src="a.png">"#);
            assert_eq!(out, r#"a<br/>b<img src="a.png"/>"#);
        }

        #[test]
        fn test_repair_keeps_pluginfile_and_decodes() {
            let out = repair().sanitize(r#"<img src="@@PLUGINFILE@@/my%20pic.png" alt="p">"#);
            assert!(out.contains("@@PLUGINFILE@@/my pic.png"), "got: {out}");
        }

        #[test]
        fn test_repair_strips_soft_hyphen() {
            assert_eq!(repair().sanitize("soft\u{00AD}ware"), "software");
        }

        #[test]
        fn test_repair_idempotent() {
            let s = repair();
            for input in [
                r#"<div><b>Bold</b> and <font color="red">red</font><br></div>"#,
                r#"<table><tr><td colspan="2">x</td></tr></table>"#,
                "<p>unclosed <em>emphasis",
            ] {
                let once = s.sanitize(input);
                assert_eq!(s.sanitize(&once), once, "input: {input}");
            }
        }
    }
}
