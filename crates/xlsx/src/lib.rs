//! XLSX (SpreadsheetML) backend for document translation.
//!
//! Cells are read from the worksheet parts; text boxes are read from the
//! drawing parts. Injection edits those parts directly and leaves the rest
//! of the container untouched.

pub mod patcher;
pub mod sheet;
pub mod walker;
pub mod workbook;

pub use patcher::{extract_shapes, patch};
pub use workbook::{SheetEntry, Workbook};
