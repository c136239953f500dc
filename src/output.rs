//! Result types returned by the cleaning pipeline and the exporter.

use crate::error::SegmentError;
use serde::{Deserialize, Serialize};

/// Outcome of [`crate::pipeline::segment::segment_and_clean`].
///
/// `success` is false only when the document held no question blocks; the
/// document is then the input, unchanged. Blocks that could not be segmented
/// are copied through verbatim and only show up in [`CleanStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanOutcome {
    pub document: String,
    pub success: bool,
    pub stats: CleanStats,
}

/// Counters collected while cleaning one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanStats {
    /// Sanitizer strategy used ("repair" or "denylist").
    pub strategy: String,
    /// Question blocks found.
    pub blocks: usize,
    /// Blocks copied through because they are `category` blocks.
    pub category_blocks: usize,
    /// Blocks without any payload section.
    pub empty_blocks: usize,
    /// Payload sections sanitized.
    pub payloads: usize,
    /// Payloads whose text changed during sanitizing.
    pub payloads_changed: usize,
    /// Soft failures; each affected scope was copied through unchanged.
    pub errors: Vec<SegmentError>,
}

impl CleanStats {
    /// Scopes (blocks or document tails) copied through because their
    /// markers did not match.
    pub fn mismatches(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| matches!(e, SegmentError::StructuralMismatch { .. }))
            .count()
    }
}

/// Result of a full export: the HTML document plus cleaning statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutput {
    pub html: String,
    pub stats: CleanStats,
}
