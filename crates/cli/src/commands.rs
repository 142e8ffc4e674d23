//! Extraction and injection pipelines over in-memory documents.
//!
//! Nothing here touches the filesystem; `main` reads the inputs and writes
//! whatever these functions return.

use crate::document::Document;
use xlate_core::dedup::{contains_synthetic_keys, REVERSE_MAP_FILE};
use xlate_core::transport::{render_chunks, split_map};
use xlate_core::{
    build_dedup, expand_dedup, ChunkFile, ChunkOptions, DedupMap, DedupStats, ExtractedMap,
    InjectReport, Result,
};

/// Everything an extraction produces.
#[derive(Debug)]
pub struct Extraction {
    /// Number of leaves found in the document.
    pub entries: usize,
    /// The map handed to translators: the extracted map itself, or its
    /// synthetic units when deduplicating.
    pub units: ExtractedMap,
    pub files: Vec<ChunkFile>,
    /// Reverse map and savings, when deduplicating.
    pub dedup: Option<(DedupMap, DedupStats)>,
}

/// Walk a document and split its text into chunk files.
pub fn extract(document: &Document, options: &ChunkOptions, dedup: bool) -> Result<Extraction> {
    let map = document.walk()?;
    let entries = map.len();

    if !dedup {
        let files = split_map(&map, options)?;
        return Ok(Extraction {
            entries,
            units: map,
            files,
            dedup: None,
        });
    }

    let deduplicated = build_dedup(&map, options.chunk_size());
    let files = render_chunks(&deduplicated.chunks, options)?;
    let units = deduplicated
        .chunks
        .into_iter()
        .flatten()
        .collect::<ExtractedMap>();
    Ok(Extraction {
        entries,
        units,
        files,
        dedup: Some((deduplicated.reverse_map, deduplicated.stats)),
    })
}

/// Fan synthetic units back out to location keys.
///
/// The reverse map is loaded only when `translated` holds a synthetic key.
/// A missing reverse map means no deduplication was used, and the map is
/// returned as is.
pub fn expand_translations<F>(translated: ExtractedMap, load_reverse_map: F) -> Result<ExtractedMap>
where
    F: FnOnce() -> std::io::Result<Option<Vec<u8>>>,
{
    if !contains_synthetic_keys(&translated) {
        return Ok(translated);
    }

    match load_reverse_map()? {
        Some(bytes) => {
            let reverse_map = DedupMap::from_json(&bytes)?;
            let expanded = expand_dedup(&translated, &reverse_map);
            log::debug!(
                "Expanded {} translated entries into {} keys",
                translated.len(),
                expanded.len()
            );
            Ok(expanded)
        }
        None => {
            log::warn!(
                "Translations contain synthetic keys but no {} was found",
                REVERSE_MAP_FILE
            );
            Ok(translated)
        }
    }
}

/// Rewrite a document and render the result. Nothing is returned unless
/// the whole container rendered.
pub fn inject(document: &mut Document, translated: &ExtractedMap) -> Result<(InjectReport, Vec<u8>)> {
    let report = document.rewrite(translated)?;
    for key in &report.skipped {
        log::debug!("Skipped key: {}", key);
    }
    let bytes = document.to_bytes()?;
    Ok((report, bytes))
}
