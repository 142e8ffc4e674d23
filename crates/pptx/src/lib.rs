//! PPTX (PresentationML) backend for document translation.
//!
//! Slides are walked in presentation order; each slide's shape tree is
//! traversed depth-first, descending into groups and tables.

pub mod presentation;
pub mod rewriter;
pub mod walker;

pub use presentation::Presentation;
pub use rewriter::rewrite;
