//! Deduplication of extracted text.
//!
//! Identical values are merged into one synthetic translation unit
//! (`dedup_1`, `dedup_2`, ...) and a reverse map remembers which location
//! keys shared each value, so translated units can be fanned back out.

use crate::error::{Error, Result};
use crate::transport::chunk_map;
use crate::types::ExtractedMap;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Prefix of every synthetic key.
pub const SYNTHETIC_KEY_PREFIX: &str = "dedup_";

/// File name the reverse map is persisted under inside a working directory.
pub const REVERSE_MAP_FILE: &str = "dedup_mapping.json";

static SYNTHETIC_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^dedup_[1-9][0-9]*$").unwrap());

/// Whether a key has the synthetic `dedup_<i>` shape.
pub fn is_synthetic_key(key: &str) -> bool {
    SYNTHETIC_KEY_REGEX.is_match(key)
}

/// Whether any key of the map is synthetic.
pub fn contains_synthetic_keys(map: &ExtractedMap) -> bool {
    map.keys().any(is_synthetic_key)
}

/// Synthetic key to the original location keys that shared its value, in
/// first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupMap {
    groups: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl DedupMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_group(&mut self, synthetic: String, keys: Vec<String>) {
        match self.index.get(&synthetic) {
            Some(&i) => self.groups[i].1 = keys,
            None => {
                self.index.insert(synthetic.clone(), self.groups.len());
                self.groups.push((synthetic, keys));
            }
        }
    }

    /// Original keys of one synthetic key.
    pub fn get(&self, synthetic: &str) -> Option<&[String]> {
        self.index
            .get(synthetic)
            .map(|&i| self.groups[i].1.as_slice())
    }

    /// Number of groups (distinct values).
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in synthetic-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of original keys across all groups.
    pub fn total_keys(&self) -> usize {
        self.groups.iter().map(|(_, keys)| keys.len()).sum()
    }

    /// Pretty JSON for persistence.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidMapping(format!("Failed to encode: {}", e)))
    }

    /// Decode a persisted reverse map. A leading byte-order mark is ignored.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidMapping(e.to_string()))
    }
}

impl Serialize for DedupMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (synthetic, keys) in &self.groups {
            map.serialize_entry(synthetic, keys)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DedupMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DedupMapVisitor;

        impl<'de> Visitor<'de> for DedupMapVisitor {
            type Value = DedupMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping synthetic keys to lists of location keys")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut map = DedupMap::new();
                while let Some((synthetic, keys)) = access.next_entry::<String, Vec<String>>()? {
                    map.push_group(synthetic, keys);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(DedupMapVisitor)
    }
}

/// Savings achieved by one deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupStats {
    /// Original key count.
    pub total: usize,
    /// Distinct value count.
    pub unique: usize,
    /// `total - unique`.
    pub saved: usize,
    /// `saved / total` as a rounded percentage; 0 for an empty map.
    pub percent_saved: u32,
}

impl DedupStats {
    fn new(total: usize, unique: usize) -> Self {
        let saved = total - unique;
        let percent_saved = if total == 0 {
            0
        } else {
            (saved as f64 * 100.0 / total as f64).round() as u32
        };
        Self {
            total,
            unique,
            saved,
            percent_saved,
        }
    }
}

/// Output of [`build_dedup`].
#[derive(Debug, Clone)]
pub struct Deduplicated {
    /// Synthetic key to value, split into chunks.
    pub chunks: Vec<ExtractedMap>,
    /// Synthetic key to original keys.
    pub reverse_map: DedupMap,
    pub stats: DedupStats,
}

/// Merge identical values into synthetic translation units.
///
/// Groups are numbered from 1 in the order their value was first seen; a
/// group lists its keys in discovery order.
pub fn build_dedup(map: &ExtractedMap, chunk_size: usize) -> Deduplicated {
    let mut groups: Vec<(&str, Vec<String>)> = Vec::new();
    let mut by_value: HashMap<&str, usize> = HashMap::new();

    for (key, value) in map.iter() {
        match by_value.get(value) {
            Some(&i) => groups[i].1.push(key.to_string()),
            None => {
                by_value.insert(value, groups.len());
                groups.push((value, vec![key.to_string()]));
            }
        }
    }

    let mut synthetic = ExtractedMap::new();
    let mut reverse_map = DedupMap::new();
    for (i, (value, keys)) in groups.into_iter().enumerate() {
        let key = format!("{}{}", SYNTHETIC_KEY_PREFIX, i + 1);
        synthetic.insert(key.clone(), value);
        reverse_map.push_group(key, keys);
    }

    let stats = DedupStats::new(map.len(), reverse_map.len());
    log::debug!(
        "Deduplicated {} keys into {} units ({}% saved)",
        stats.total,
        stats.unique,
        stats.percent_saved
    );

    Deduplicated {
        chunks: chunk_map(&synthetic, chunk_size),
        reverse_map,
        stats,
    }
}

/// Fan translated synthetic units back out to their original keys.
///
/// Entries whose key is not a known synthetic key pass through unchanged,
/// so a map mixing synthetic and direct keys is accepted.
pub fn expand_dedup(translated: &ExtractedMap, reverse_map: &DedupMap) -> ExtractedMap {
    let mut expanded = ExtractedMap::new();
    for (key, value) in translated.iter() {
        match reverse_map.get(key).filter(|_| is_synthetic_key(key)) {
            Some(originals) => {
                for original in originals {
                    expanded.insert(original.as_str(), value);
                }
            }
            None => {
                expanded.insert(key, value);
            }
        }
    }
    expanded
}
