//! Ingest of externally rewritten article drafts.
//!
//! A rewritten draft arrives as raw HTML from the rewriting collaborator.
//! Before its first save every off-site anchor is unwrapped and the body is
//! auto-linked against the published pool.

pub mod rewrite;
pub mod slug;

pub use rewrite::{ingest_rewritten, prepare_rewritten, IngestReport, PreparedDraft};
pub use slug::{slugify, unique_slug};
