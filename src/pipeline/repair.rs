//! Markup repair rules shared by both sanitizer strategies.
//!
//! Each rule is a pure `&str → String` pass and a no-op when its pattern does
//! not occur. None of them parse markup: they work on tag-shaped text so that
//! invalid fragments (unclosed tags, stray `<`) survive untouched instead of
//! failing the whole payload.
//!
//! ## Rules
//!
//! 1. Strip every tag outside an allow-list (denylist strategy only)
//! 2. Rename presentational `<b>`/`<i>` to `<strong>`/`<em>` (repair strategy only)
//! 3. Rewrite void elements (`<img>`, `<br>`, …) to self-closing form
//! 4. Remove the `complete="true"` authoring-tool artefact from image tags
//! 5. URL-decode file names behind the `@@PLUGINFILE@@/` placeholder
//! 6. Strip soft hyphens (U+00AD, literal or `&shy;`-style references)

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

/// Token the host writes in front of files embedded in a question.
pub const PLUGINFILE_TOKEN: &str = "@@PLUGINFILE@@/";

/// Inline and character-level tags the denylist stripper always keeps.
pub const INLINE_TAGS: &[&str] = &[
    "b", "i", "u", "em", "strong", "sub", "sup", "img", "br",
];

/// Table structure tags, kept when the configuration allows tables.
pub const TABLE_TAGS: &[&str] = &[
    "table", "thead", "tbody", "tfoot", "tr", "th", "td", "caption",
];

// ── Rule 1: Allow-list tag stripping ─────────────────────────────────────────

static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static RE_PROCESSING_INSTRUCTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\?[^>]*>").unwrap());

static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?([A-Za-z][A-Za-z0-9:_-]*)(?:\s[^>]*)?/?>").unwrap());

/// Remove comments, processing instructions and every tag whose name is not
/// in `allowed` (compared case-insensitively). Text between tags is kept.
///
/// Removing a tag can join the text around it into a new tag
/// (`<di<span></span>v>`), so passes repeat until nothing more is removed.
pub fn strip_tags(input: &str, allowed: &[&str]) -> String {
    let mut current = input.to_string();
    while current.contains('<') {
        let next = strip_tags_once(&current, allowed);
        if next.len() == current.len() {
            break;
        }
        current = next;
    }
    current
}

fn strip_tags_once(input: &str, allowed: &[&str]) -> String {
    let s = RE_COMMENT.replace_all(input, "");
    let s = RE_PROCESSING_INSTRUCTION.replace_all(&s, "");
    RE_TAG
        .replace_all(&s, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            if allowed.iter().any(|a| a.eq_ignore_ascii_case(name)) {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

// ── Rule 2: Presentational → structural ──────────────────────────────────────

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<(/?)b(\s[^>]*)?>").unwrap());

static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<(/?)i(\s[^>]*)?>").unwrap());

pub fn structural_emphasis(input: &str) -> String {
    let s = RE_BOLD.replace_all(input, "<${1}strong${2}>");
    RE_ITALIC.replace_all(&s, "<${1}em${2}>").into_owned()
}

// ── Rule 3: Self-closing void elements ───────────────────────────────────────

static RE_VOID_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(img|br|hr|col|wbr|area)\b([^>]*?)\s*/?>").unwrap()
});

/// Tag-stripping and HTML serialisers both emit `<img src="a">` and `<br>`,
/// which are not well-formed XML. Rewrite them as `<img src="a"/>`, `<br/>`.
pub fn close_void_elements(input: &str) -> String {
    RE_VOID_ELEMENT
        .replace_all(input, "<${1}${2}/>")
        .into_owned()
}

// ── Rule 4: complete="true" artefact ─────────────────────────────────────────

static RE_IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());

static RE_COMPLETE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\s)complete="true""#).unwrap());

/// Drop every standalone `complete="true"` attribute inside image tags,
/// leaving the other attributes (`data-complete="true"` included)
/// byte-identical. Whitespace the removal leaves in front of
/// the tag's closing `/>` is trimmed so the result is already in the form
/// [`close_void_elements`] produces.
pub fn remove_complete_artifact(input: &str) -> String {
    if !input.contains("complete=") {
        return input.to_string();
    }
    RE_IMG_TAG
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            let cleaned = RE_COMPLETE_ATTR.replace_all(tag, "${1}");
            if cleaned.len() == tag.len() {
                return tag.to_string();
            }
            match cleaned.strip_suffix("/>") {
                Some(head) => format!("{}/>", head.trim_end()),
                None => cleaned.into_owned(),
            }
        })
        .into_owned()
}

// ── Rule 5: Placeholder file names ───────────────────────────────────────────

static RE_PLUGINFILE_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(<img\b[^>]*?\bsrc=")@@PLUGINFILE@@/([^"]*)""#).unwrap()
});

/// Characters a decoded name may not contain: they would end the attribute,
/// be read as markup or entities by a later pass, or decode again.
const UNSAFE_IN_NAME: [char; 5] = ['"', '<', '>', '&', '%'];

/// The file list elsewhere in the export records names unescaped, so
/// `@@PLUGINFILE@@/my%20image.png` becomes `@@PLUGINFILE@@/my image.png`.
/// A name that is not valid UTF-8 once decoded, or that would decode to one
/// of `" < > & %`, stays encoded.
pub fn decode_pluginfile_names(input: &str) -> String {
    if !input.contains(PLUGINFILE_TOKEN) {
        return input.to_string();
    }
    RE_PLUGINFILE_SRC
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let encoded = &caps[2];
            let name = match percent_decode_str(encoded).decode_utf8() {
                Ok(decoded) if !decoded.contains(UNSAFE_IN_NAME) => decoded.into_owned(),
                _ => encoded.to_string(),
            };
            format!("{}{PLUGINFILE_TOKEN}{name}\"", &caps[1])
        })
        .into_owned()
}

// ── Rule 6: Soft hyphens ─────────────────────────────────────────────────────

static RE_SOFT_HYPHEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x{00AD}|&shy;|&#173;|&#[xX]0*[aA][dD];").unwrap());

/// Remove U+00AD, literal or as a character reference.
pub fn strip_soft_hyphens(input: &str) -> String {
    if !input.contains(['\u{00AD}', '&']) {
        return input.to_string();
    }
    RE_SOFT_HYPHEN.replace_all(input, "").into_owned()
}
