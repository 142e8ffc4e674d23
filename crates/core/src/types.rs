//! Domain types shared by every document kind.

use crate::package::Package;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// The kind of Office document being processed.
///
/// Each variant has its own walker and rewriter; only the key codec and the
/// deduplicator are shared between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// SpreadsheetML workbook (.xlsx).
    Spreadsheet,
    /// PresentationML slide deck (.pptx).
    Presentation,
    /// WordprocessingML document (.docx).
    WordProcessing,
}

impl DocumentKind {
    /// Detect the kind from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "xlsx" => Some(Self::Spreadsheet),
            "pptx" => Some(Self::Presentation),
            "docx" => Some(Self::WordProcessing),
            _ => None,
        }
    }

    /// Detect the kind by looking for the main part of each format.
    pub fn from_package(package: &Package) -> Option<Self> {
        if package.contains("xl/workbook.xml") {
            Some(Self::Spreadsheet)
        } else if package.contains("ppt/presentation.xml") {
            Some(Self::Presentation)
        } else if package.contains("word/document.xml") {
            Some(Self::WordProcessing)
        } else {
            None
        }
    }

    /// Canonical file extension for this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Spreadsheet => "xlsx",
            Self::Presentation => "pptx",
            Self::WordProcessing => "docx",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Spreadsheet => "spreadsheet",
            Self::Presentation => "presentation",
            Self::WordProcessing => "word-processing document",
        };
        f.write_str(name)
    }
}

/// An insertion-ordered map from location key to text.
///
/// Iteration follows insertion order, which for a fresh walk is the
/// traversal order. Re-inserting an existing key replaces its value in
/// place, so merging chunks is last-write-wins. Equality compares key/value
/// pairs only; order is not significant once a map leaves the walker.
#[derive(Debug, Clone, Default)]
pub struct ExtractedMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl ExtractedMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one if the key existed.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Insert a key that must not be present yet, as walkers do. An
    /// existing key keeps its value and `false` is returned.
    pub fn insert_new(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.index.contains_key(&key) {
            return false;
        }
        self.insert(key, value);
        true
    }

    /// Look up the text stored under a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .map(|&pos| self.entries[pos].1.as_str())
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, text)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Merge another map into this one; keys from `other` win.
    pub fn merge(&mut self, other: ExtractedMap) {
        for (key, value) in other {
            self.insert(key, value);
        }
    }
}

impl PartialEq for ExtractedMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for ExtractedMap {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExtractedMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ExtractedMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl IntoIterator for ExtractedMap {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for ExtractedMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExtractedMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ExtractedMapVisitor;

        impl<'de> Visitor<'de> for ExtractedMapVisitor {
            type Value = ExtractedMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping location keys to strings")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut map = ExtractedMap::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ExtractedMapVisitor)
    }
}

/// Summary of one injection: which keys landed and which were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectReport {
    /// Number of keys whose text was written into the document.
    pub applied: usize,

    /// Keys that were malformed, foreign, or did not resolve to a leaf.
    pub skipped: Vec<String>,
}

impl InjectReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one applied key.
    pub fn record_applied(&mut self) {
        self.applied += 1;
    }

    /// Remember a key that could not be applied.
    pub fn record_skipped(&mut self, key: impl Into<String>) {
        self.skipped.push(key.into());
    }

    /// Fold another report into this one.
    pub fn absorb(&mut self, other: InjectReport) {
        self.applied += other.applied;
        self.skipped.extend(other.skipped);
    }
}
