//! Pipeline stages for the question XML → HTML export.
//!
//! Each submodule implements one step. The cleaning stages are pure string
//! functions; only [`transform`] touches the filesystem or spawns processes.
//!
//! ## Data Flow
//!
//! ```text
//! segment ──▶ sanitize ──▶ segment (reassemble) ──▶ transform ×2
//! (blocks,     (repair +     (re-embed cleaned       (XSLT pass 1,
//!  payloads)    entities)     payloads)               XSLT pass 2)
//! ```
//!
//! 1. [`segment`]   — find question blocks and their CDATA payloads by
//!    delimiter scanning, then reassemble the document around cleaned payloads
//! 2. [`sanitize`]  — choose a strategy once per export and clean each payload
//! 3. [`repair`]    — the individual tag, attribute and character rules the
//!    sanitizer strategies are built from
//! 4. [`entities`]  — named → numeric character reference table
//! 5. [`transform`] — run an XSLT stylesheet over the intermediate document

pub mod entities;
pub mod repair;
pub mod sanitize;
pub mod segment;
pub mod transform;
