//! Core types for extracting translatable text from Office documents and
//! injecting translations back: location keys, extracted maps,
//! deduplication, chunked transport and OOXML container plumbing.

pub mod dedup;
pub mod drawingml;
pub mod error;
pub mod key;
pub mod package;
pub mod transport;
pub mod types;
pub mod xml;

pub use dedup::{build_dedup, expand_dedup, DedupMap, DedupStats, Deduplicated};
pub use error::{Error, Result};
pub use key::{CellCoordinate, DocumentLeaf, LocationKey, Region, ShapePath, TableCell};
pub use package::{Package, Relationship};
pub use transport::{ChunkFile, ChunkOptions, MergedTranslations};
pub use types::{DocumentKind, ExtractedMap, InjectReport};
pub use xml::{Element, XmlDocument};
