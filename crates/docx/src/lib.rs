//! DOCX (WordprocessingML) backend for document translation.
//!
//! The body is walked first, then each section's default header and
//! footer. Paragraph text is read across runs and written back into the
//! first text-bearing run so its formatting survives.

pub mod document;
pub mod rewriter;
pub mod runs;
pub mod walker;

pub use document::{Section, WordDocument};
