//! Structural segmentation of a question document, without an XML parser.
//!
//! ## Why not parse the XML?
//!
//! Payload sections hold whatever the question author pasted: unclosed tags,
//! Word fragments, stray `&`. The whole point of this stage is to repair that
//! content, so a validating parser would reject exactly the documents we need
//! to handle. Instead the document is scanned for two fixed delimiter pairs:
//!
//! ```text
//! <question type="TYPE"> … </question>      block
//!     <![CDATA[ … ]]>                       payload (zero or more per block)
//! ```
//!
//! ## Guarantees
//!
//! - Every byte outside a payload is copied to the output unchanged.
//! - A block without payloads is copied unchanged, tags included.
//! - A block whose payload markers do not balance is copied unchanged.
//! - Scanning is a single forward pass per block (plus one reverse search for
//!   the rightmost end marker), so time is linear in the input size.
//!
//! ## Rightmost end marker
//!
//! The final payload of a block ends at the *last* `]]>` in the block, not at
//! the first `]]>` after its start marker. Text after the intended end that
//! happens to contain `]]>` therefore stays inside the final payload instead
//! of being mistaken for trailing block text.

use crate::config::ExportConfig;
use crate::error::SegmentError;
use crate::output::{CleanOutcome, CleanStats};
use crate::pipeline::sanitize::Sanitizer;
use std::ops::Range;
use tracing::{debug, info, warn};

pub const BLOCK_OPEN_PREFIX: &str = "<question type=\"";
pub const BLOCK_CLOSE: &str = "</question>";
pub const PAYLOAD_START: &str = "<![CDATA[";
pub const PAYLOAD_END: &str = "]]>";

/// Block type whose body is never payload-bearing.
pub const CATEGORY_TYPE: &str = "category";

/// One `<question type="…">…</question>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    /// Value of the `type` attribute, verbatim.
    pub kind: &'a str,
    /// Byte range of the whole element in the document.
    pub span: Range<usize>,
    /// Whole element text, tags included.
    pub source: &'a str,
    /// Opening tag, `<question type="…">`.
    pub open_tag: &'a str,
    /// Text between the opening and closing tags.
    pub body: &'a str,
}

/// A piece of the segmented document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text outside any block (or a tail that could not be matched).
    Text(&'a str),
    Block(Block<'a>),
}

/// Untouched text before a payload, and the raw payload itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub prefix: &'a str,
    pub payload: &'a str,
}

/// The payloads of one block body plus the text after the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payloads<'a> {
    pub fragments: Vec<Fragment<'a>>,
    pub trailing: &'a str,
}

impl Payloads<'_> {
    /// Reassemble the block body, running each payload through `clean`.
    pub fn reassemble(&self, mut clean: impl FnMut(&str) -> String) -> String {
        let mut out = String::with_capacity(
            self.fragments
                .iter()
                .map(|f| f.prefix.len() + f.payload.len() + PAYLOAD_START.len() + PAYLOAD_END.len())
                .sum::<usize>()
                + self.trailing.len(),
        );
        for fragment in &self.fragments {
            out.push_str(fragment.prefix);
            out.push_str(PAYLOAD_START);
            out.push_str(&clean(fragment.payload));
            out.push_str(PAYLOAD_END);
        }
        out.push_str(self.trailing);
        out
    }
}

// ── Block discovery ──────────────────────────────────────────────────────────

/// Split a document into blocks and the text around them.
///
/// Returns [`SegmentError::EmptyInput`] when no block is found. An opening
/// tag without a closing tag ends the scan; the rest of the document becomes
/// a single [`Segment::Text`] and the mismatch is pushed to `errors`.
pub fn segment<'a>(
    document: &'a str,
    errors: &mut Vec<SegmentError>,
) -> Result<Vec<Segment<'a>>, SegmentError> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut text_start = 0;
    let mut blocks = 0usize;

    while let Some(rel) = document[cursor..].find(BLOCK_OPEN_PREFIX) {
        let open_start = cursor + rel;
        let type_start = open_start + BLOCK_OPEN_PREFIX.len();

        // The type value runs to the next quote and must be followed by `>`.
        let Some(open_end) = parse_open_tag(document, type_start) else {
            cursor = type_start;
            continue;
        };

        let Some(close_rel) = document[open_end..].find(BLOCK_CLOSE) else {
            errors.push(SegmentError::mismatch(open_start, "question block is never closed"));
            warn!("Unclosed question block at byte {}; copying the rest unchanged", open_start);
            break;
        };
        let close_start = open_end + close_rel;
        let block_end = close_start + BLOCK_CLOSE.len();

        if text_start < open_start {
            segments.push(Segment::Text(&document[text_start..open_start]));
        }
        let block = Block {
            kind: &document[type_start..open_end - 2],
            span: open_start..block_end,
            source: &document[open_start..block_end],
            open_tag: &document[open_start..open_end],
            body: &document[open_end..close_start],
        };
        debug!("Block {} type=\"{}\" at {:?}", blocks + 1, block.kind, block.span);
        segments.push(Segment::Block(block));
        blocks += 1;

        cursor = block_end;
        text_start = block_end;
    }

    if blocks == 0 {
        return Err(SegmentError::EmptyInput);
    }
    if text_start < document.len() {
        segments.push(Segment::Text(&document[text_start..]));
    }
    Ok(segments)
}

/// Byte offset just past `">` of an opening tag whose type value starts at
/// `type_start`, or `None` if the tag does not have the expected shape.
fn parse_open_tag(document: &str, type_start: usize) -> Option<usize> {
    let rest = &document[type_start..];
    let quote = rest.find('"')?;
    let kind = &rest[..quote];
    if kind.contains(['<', '>', '\n']) || !rest[quote + 1..].starts_with('>') {
        return None;
    }
    Some(type_start + quote + 2)
}

// ── Payload discovery ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// No payload seen yet.
    InBlock,
    /// Inside a payload whose content starts at the given offset.
    InPayload { content_start: usize },
    /// Past at least one payload's end marker.
    AfterPayload,
}

/// Locate every payload in a block body.
///
/// Offsets in returned errors are relative to `body`.
pub fn find_payloads(body: &str) -> Result<Payloads<'_>, SegmentError> {
    let rightmost_end = body.rfind(PAYLOAD_END);
    let mut fragments = Vec::new();
    let mut state = ScanState::InBlock;
    let mut cursor = 0;
    let mut prefix_start = 0;

    loop {
        match state {
            ScanState::InBlock | ScanState::AfterPayload => {
                let next_start = body[cursor..].find(PAYLOAD_START).map(|i| cursor + i);
                let next_end = body[cursor..].find(PAYLOAD_END).map(|i| cursor + i);
                match (next_start, next_end) {
                    (Some(start), Some(end)) if end < start => {
                        return Err(SegmentError::mismatch(end, "end marker without start marker"));
                    }
                    (None, Some(end)) => {
                        return Err(SegmentError::mismatch(end, "end marker without start marker"));
                    }
                    (Some(start), _) => {
                        prefix_start = cursor;
                        cursor = start + PAYLOAD_START.len();
                        state = ScanState::InPayload {
                            content_start: cursor,
                        };
                    }
                    (None, None) => {
                        return Ok(Payloads {
                            fragments,
                            trailing: &body[cursor..],
                        });
                    }
                }
            }
            ScanState::InPayload { content_start } => {
                let Some(first_end) = body[content_start..].find(PAYLOAD_END).map(|i| content_start + i)
                else {
                    return Err(SegmentError::mismatch(
                        content_start - PAYLOAD_START.len(),
                        "start marker without end marker",
                    ));
                };
                if body[content_start..first_end].contains(PAYLOAD_START) {
                    return Err(SegmentError::mismatch(
                        content_start - PAYLOAD_START.len(),
                        "nested start marker",
                    ));
                }
                let after = first_end + PAYLOAD_END.len();
                let is_last = !body[after..].contains(PAYLOAD_START);
                let end = match rightmost_end {
                    Some(last) if is_last => last,
                    _ => first_end,
                };
                fragments.push(Fragment {
                    prefix: &body[prefix_start..content_start - PAYLOAD_START.len()],
                    payload: &body[content_start..end],
                });
                cursor = end + PAYLOAD_END.len();
                state = ScanState::AfterPayload;
            }
        }
    }
}

// ── Segment, sanitize, reassemble ────────────────────────────────────────────

/// Sanitize every payload of every block and reassemble the document.
///
/// Never fails: a document without blocks comes back unchanged with
/// `success == false`; blocks that cannot be segmented are copied through.
pub fn segment_and_clean(document: &str, config: &ExportConfig) -> CleanOutcome {
    let sanitizer = Sanitizer::select(config);
    clean_with(document, &sanitizer, config.passthrough_category)
}

/// [`segment_and_clean`] with an already selected sanitizer.
pub fn clean_with(document: &str, sanitizer: &Sanitizer, passthrough_category: bool) -> CleanOutcome {
    let mut stats = CleanStats {
        strategy: sanitizer.name().to_string(),
        ..CleanStats::default()
    };

    let segments = match segment(document, &mut stats.errors) {
        Ok(segments) => segments,
        Err(e) => {
            warn!("{}; document passed through unchanged", e);
            stats.errors.push(e);
            return CleanOutcome {
                document: document.to_string(),
                success: false,
                stats,
            };
        }
    };

    let mut out = String::with_capacity(document.len() + document.len() / 8);
    for segment in segments {
        let block = match segment {
            Segment::Text(text) => {
                out.push_str(text);
                continue;
            }
            Segment::Block(block) => block,
        };
        stats.blocks += 1;

        if passthrough_category && block.kind == CATEGORY_TYPE {
            stats.category_blocks += 1;
            out.push_str(block.source);
            continue;
        }

        match find_payloads(block.body) {
            Ok(payloads) if payloads.fragments.is_empty() => {
                stats.empty_blocks += 1;
                out.push_str(block.source);
            }
            Ok(payloads) => {
                let body = payloads.reassemble(|raw| {
                    let cleaned = embeddable(sanitizer.sanitize(raw));
                    stats.payloads += 1;
                    if cleaned != raw {
                        stats.payloads_changed += 1;
                    }
                    cleaned
                });
                out.push_str(block.open_tag);
                out.push_str(&body);
                out.push_str(BLOCK_CLOSE);
            }
            Err(e) => {
                let e = e.offset_by(block.span.start + block.open_tag.len());
                warn!("Question block type=\"{}\": {}; block passed through unchanged", block.kind, e);
                stats.errors.push(e);
                out.push_str(block.source);
            }
        }
    }

    info!(
        "Cleaned {} blocks, {} payloads ({} changed) with {} sanitizer",
        stats.blocks, stats.payloads, stats.payloads_changed, stats.strategy
    );
    CleanOutcome {
        document: out,
        success: true,
        stats,
    }
}

/// A payload goes back between `<![CDATA[` and `]]>`, so it must not contain
/// the end marker itself.
fn embeddable(cleaned: String) -> String {
    if cleaned.contains(PAYLOAD_END) {
        cleaned.replace(PAYLOAD_END, "]]&gt;")
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyChoice;
    use pretty_assertions::assert_eq;

    fn denylist_config() -> ExportConfig {
        ExportConfig::builder()
            .strategy(StrategyChoice::Denylist)
            .build()
            .unwrap()
    }

    fn blocks(document: &str) -> Vec<Block<'_>> {
        let mut errors = Vec::new();
        segment(document, &mut errors)
            .unwrap()
            .into_iter()
            .filter_map(|s| match s {
                Segment::Block(b) => Some(b),
                Segment::Text(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_segment_finds_blocks_and_types() {
        let doc = "<!-- q -->\n<question type=\"category\"><category/></question>\n<question type=\"shortanswer\">x</question>\n";
        let found = blocks(doc);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, "category");
        assert_eq!(found[1].kind, "shortanswer");
        assert_eq!(found[1].body, "x");
        assert_eq!(found[1].open_tag, "<question type=\"shortanswer\">");
        assert_eq!(&doc[found[1].span.clone()], found[1].source);
    }

    #[test]
    fn test_segment_spans_newlines_non_greedy() {
        let doc = "<question type=\"essay\">\na\n</question><question type=\"essay\">\nb\n</question>";
        let found = blocks(doc);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].body, "\na\n");
        assert_eq!(found[1].body, "\nb\n");
    }

    #[test]
    fn test_segment_empty_input() {
        let mut errors = Vec::new();
        assert_eq!(segment("", &mut errors), Err(SegmentError::EmptyInput));
        assert_eq!(
            segment("<quiz></quiz>", &mut errors),
            Err(SegmentError::EmptyInput)
        );
    }

    #[test]
    fn test_segment_skips_malformed_open_tag() {
        let doc = "<question type=\"x\" id=\"1\">a</question><question type=\"y\">b</question>";
        let found = blocks(doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "y");
    }

    #[test]
    fn test_segment_unclosed_block_records_mismatch() {
        let doc = "<question type=\"a\">x</question><question type=\"b\">never closed";
        let mut errors = Vec::new();
        let segments = segment(doc, &mut errors).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1], Segment::Text("<question type=\"b\">never closed"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_find_payloads_basic() {
        let body = "<name><text><![CDATA[A]]></text></name><questiontext><text><![CDATA[<b>B</b>]]></text>";
        let p = find_payloads(body).unwrap();
        assert_eq!(
            p.fragments,
            vec![
                Fragment { prefix: "<name><text>", payload: "A" },
                Fragment { prefix: "</text></name><questiontext><text>", payload: "<b>B</b>" },
            ]
        );
        assert_eq!(p.trailing, "</text>");
    }

    #[test]
    fn test_find_payloads_none() {
        let p = find_payloads("<defaultgrade>1</defaultgrade>").unwrap();
        assert!(p.fragments.is_empty());
        assert_eq!(p.trailing, "<defaultgrade>1</defaultgrade>");
    }

    #[test]
    fn test_find_payloads_rightmost_end_marker() {
        let body = "<text><![CDATA[x]]></text> note: ]]> here";
        let p = find_payloads(body).unwrap();
        assert_eq!(p.fragments.len(), 1);
        assert_eq!(p.fragments[0].payload, "x]]></text> note: ");
        assert_eq!(p.trailing, " here");
    }

    #[test]
    fn test_find_payloads_rightmost_only_for_last() {
        let body = "<![CDATA[a]]><![CDATA[b]]>tail]]>end";
        let p = find_payloads(body).unwrap();
        assert_eq!(p.fragments[0].payload, "a");
        assert_eq!(p.fragments[1].payload, "b]]>tail");
        assert_eq!(p.trailing, "end");
    }

    #[test]
    fn test_find_payloads_unterminated() {
        let err = find_payloads("<text><![CDATA[never ends</text>").unwrap_err();
        assert!(matches!(err, SegmentError::StructuralMismatch { offset: 6, .. }), "got: {err:?}");
    }

    #[test]
    fn test_find_payloads_stray_end() {
        assert!(find_payloads("oops ]]> <![CDATA[a]]>").is_err());
        assert!(find_payloads("only ]]>").is_err());
    }

    #[test]
    fn test_find_payloads_nested_start() {
        assert!(find_payloads("<![CDATA[a <![CDATA[b]]>").is_err());
    }

    #[test]
    fn test_reassemble_identity() {
        let body = "p1<![CDATA[one]]>p2<![CDATA[two]]>tail";
        let p = find_payloads(body).unwrap();
        assert_eq!(p.reassemble(|s| s.to_string()), body);
    }

    #[test]
    fn test_clean_empty_document() {
        let outcome = segment_and_clean("", &denylist_config());
        assert!(!outcome.success);
        assert_eq!(outcome.document, "");
        assert_eq!(outcome.stats.errors, vec![SegmentError::EmptyInput]);
    }

    #[test]
    fn test_clean_category_passthrough() {
        let doc = "<question type=\"category\"><category><text><![CDATA[$course$/<b>Top</b>]]></text></category></question>";
        let outcome = segment_and_clean(doc, &denylist_config());
        assert_eq!(outcome.document, doc);
        assert_eq!(outcome.stats.category_blocks, 1);
    }

    #[test]
    fn test_clean_category_processed_when_disabled() {
        let doc = "<question type=\"category\"><category><text><![CDATA[<div>Top</div>]]></text></category></question>";
        let config = ExportConfig::builder()
            .strategy(StrategyChoice::Denylist)
            .passthrough_category(false)
            .build()
            .unwrap();
        let outcome = segment_and_clean(doc, &config);
        assert_eq!(
            outcome.document,
            "<question type=\"category\"><category><text><![CDATA[Top]]></text></category></question>"
        );
    }

    #[test]
    fn test_clean_mismatched_block_passthrough() {
        let doc = "<question type=\"essay\"><text><![CDATA[<div>x</div></text></question>";
        let outcome = segment_and_clean(doc, &denylist_config());
        assert!(outcome.success);
        assert_eq!(outcome.document, doc);
        assert_eq!(outcome.stats.mismatches(), 1);
    }

    #[test]
    fn test_clean_escapes_end_marker_in_payload() {
        let doc = "<question type=\"essay\"><text><![CDATA[a]]></text> x ]]></question>";
        let outcome = segment_and_clean(doc, &denylist_config());
        assert_eq!(
            outcome.document,
            "<question type=\"essay\"><text><![CDATA[a]]&gt; x ]]></question>"
        );
    }

    #[test]
    fn test_clean_keeps_text_between_blocks() {
        let doc = "<!-- question: 1 -->\n  <question type=\"truefalse\"><text><![CDATA[<span>T</span>]]></text></question>\n\n";
        let outcome = segment_and_clean(doc, &denylist_config());
        assert_eq!(
            outcome.document,
            "<!-- question: 1 -->\n  <question type=\"truefalse\"><text><![CDATA[T]]></text></question>\n\n"
        );
        assert_eq!(outcome.stats.payloads, 1);
        assert_eq!(outcome.stats.payloads_changed, 1);
    }
}
