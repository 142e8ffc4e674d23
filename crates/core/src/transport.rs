//! Chunked JSON transport of extracted and translated maps.
//!
//! Extraction output is split into files of bounded entry count, optionally
//! bundled in a ZIP archive. Translations come back as any mix of loose
//! `.json` chunks and `.zip` bundles and are merged by key union.

use crate::error::{Error, Result};
use crate::types::ExtractedMap;
use std::io::{Cursor, Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Default number of entries per chunk file.
pub const DEFAULT_CHUNK_SIZE: usize = 400;

/// Options for splitting a map into chunk files.
#[derive(Debug, Clone)]
pub struct ChunkOptions {
    chunk_size: usize,
    stem: String,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            stem: "to_translate".to_string(),
        }
    }
}

impl ChunkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries per chunk (at least 1).
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// File name stem shared by every chunk.
    pub fn with_stem(mut self, stem: impl Into<String>) -> Self {
        self.stem = stem.into();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }
}

/// One rendered chunk file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFile {
    pub name: String,
    pub contents: String,
}

/// Split a map into ordered chunks of at most `chunk_size` entries.
pub fn chunk_map(map: &ExtractedMap, chunk_size: usize) -> Vec<ExtractedMap> {
    let size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = ExtractedMap::new();
    for (key, value) in map.iter() {
        current.insert(key, value);
        if current.len() == size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Chunk file name: `<stem>_part<NN>_of_<MM>.json`, 1-based.
pub fn chunk_file_name(stem: &str, index: usize, total: usize) -> String {
    format!("{}_part{:02}_of_{:02}.json", stem, index, total)
}

/// Render chunks as pretty-printed JSON files.
pub fn render_chunks(chunks: &[ExtractedMap], options: &ChunkOptions) -> Result<Vec<ChunkFile>> {
    let total = chunks.len();
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let name = chunk_file_name(options.stem(), i + 1, total);
            let contents = serde_json::to_string_pretty(chunk)
                .map_err(|e| Error::InvalidChunk(name.clone(), e.to_string()))?;
            Ok(ChunkFile { name, contents })
        })
        .collect()
}

/// Split and render a map in one step.
pub fn split_map(map: &ExtractedMap, options: &ChunkOptions) -> Result<Vec<ChunkFile>> {
    render_chunks(&chunk_map(map, options.chunk_size()), options)
}

/// Write chunk files into a ZIP bundle under `folder/`, uncompressed so the
/// JSON stays readable.
pub fn write_bundle<W: Write + Seek>(writer: W, folder: &str, files: &[ChunkFile]) -> Result<W> {
    let zip_err = |e: zip::result::ZipError| Error::ZipError(format!("Failed to write bundle: {}", e));
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for file in files {
        zip.start_file(format!("{}/{}", folder, file.name), options)
            .map_err(zip_err)?;
        zip.write_all(file.contents.as_bytes())?;
    }
    zip.finish().map_err(zip_err)
}

/// Decode one translated chunk. A leading UTF-8 byte-order mark is allowed;
/// anything other than an object of strings is an error naming the chunk.
pub fn parse_chunk(name: &str, bytes: &[u8]) -> Result<ExtractedMap> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    serde_json::from_slice(bytes).map_err(|e| Error::InvalidChunk(name.to_string(), e.to_string()))
}

/// Decode every `.json` entry of a bundle, in archive order.
pub fn read_bundle(name: &str, bytes: &[u8]) -> Result<Vec<(String, Result<ExtractedMap>)>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::InvalidChunk(name.to_string(), format!("not a ZIP bundle: {}", e)))?;

    let mut chunks = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| Error::InvalidChunk(name.to_string(), e.to_string()))?;
        if file.is_dir() || !file.name().to_lowercase().ends_with(".json") {
            continue;
        }
        let entry_name = format!("{}:{}", name, file.name());
        let mut data = Vec::new();
        let parsed = match file.read_to_end(&mut data) {
            Ok(_) => parse_chunk(&entry_name, &data),
            Err(e) => Err(Error::InvalidChunk(entry_name.clone(), e.to_string())),
        };
        chunks.push((entry_name, parsed));
    }
    Ok(chunks)
}

/// Union of translated chunks; later chunks win on repeated keys.
#[derive(Debug, Default)]
pub struct MergedTranslations {
    pub map: ExtractedMap,
    /// Number of chunks merged.
    pub chunks_read: usize,
    /// Chunks that could not be decoded.
    pub failures: Vec<Error>,
}

/// Merge named translation inputs (`.json` chunks and `.zip` bundles).
///
/// Inputs with other extensions are ignored. A bad chunk aborts the merge
/// when `fail_fast` is set; otherwise it is recorded and skipped.
pub fn merge_sources<I, N>(sources: I, fail_fast: bool) -> Result<MergedTranslations>
where
    I: IntoIterator<Item = (N, Vec<u8>)>,
    N: AsRef<str>,
{
    let mut merged = MergedTranslations::default();

    for (name, bytes) in sources {
        let name = name.as_ref();
        let lower = name.to_lowercase();
        let chunks = if lower.ends_with(".json") {
            vec![(name.to_string(), parse_chunk(name, &bytes))]
        } else if lower.ends_with(".zip") {
            match read_bundle(name, &bytes) {
                Ok(chunks) => chunks,
                Err(e) => vec![(name.to_string(), Err(e))],
            }
        } else {
            log::debug!("Ignoring translation input with unknown extension: {}", name);
            continue;
        };

        for (chunk_name, parsed) in chunks {
            match parsed {
                Ok(map) => {
                    log::debug!("Merged {} entries from {}", map.len(), chunk_name);
                    merged.map.merge(map);
                    merged.chunks_read += 1;
                }
                Err(e) if fail_fast => return Err(e),
                Err(e) => {
                    log::warn!("Skipping chunk: {}", e);
                    merged.failures.push(e);
                }
            }
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> ExtractedMap {
        (1..=n).map(|i| (format!("Paragraph{}", i), format!("p{}", i))).collect()
    }

    #[test]
    fn test_chunk_map_bounds() {
        let chunks = chunk_map(&numbered(5), 2);
        let sizes: Vec<_> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(chunks[2].get("Paragraph5"), Some("p5"));

        assert!(chunk_map(&ExtractedMap::new(), 400).is_empty());
        assert_eq!(chunk_map(&numbered(3), 0).len(), 3);
    }

    #[test]
    fn test_chunk_file_names() {
        assert_eq!(chunk_file_name("deck", 1, 3), "deck_part01_of_03.json");
        assert_eq!(chunk_file_name("deck", 12, 120), "deck_part12_of_120.json");
    }

    #[test]
    fn test_rendered_chunks_keep_non_ascii() {
        let map: ExtractedMap = [("Sheet1!A1", "Xin chào")].into_iter().collect();
        let files = split_map(&map, &ChunkOptions::new().with_stem("book")).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "book_part01_of_01.json");
        assert_eq!(files[0].contents, "{\n  \"Sheet1!A1\": \"Xin chào\"\n}");
    }

    #[test]
    fn test_parse_chunk_tolerates_bom() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(br#"{"Paragraph1": "Bonjour"}"#);
        let map = parse_chunk("a.json", &bytes).unwrap();
        assert_eq!(map.get("Paragraph1"), Some("Bonjour"));
    }

    #[test]
    fn test_parse_chunk_errors_name_the_chunk() {
        match parse_chunk("broken.json", b"{not json") {
            Err(Error::InvalidChunk(name, _)) => assert_eq!(name, "broken.json"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(parse_chunk("list.json", b"[]").is_err());
    }

    #[test]
    fn test_bundle_round_trip() {
        let options = ChunkOptions::new().with_chunk_size(2).with_stem("deck");
        let files = split_map(&numbered(3), &options).unwrap();
        let bytes = write_bundle(Cursor::new(Vec::new()), "deck", &files)
            .unwrap()
            .into_inner();

        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "deck/deck_part01_of_02.json");
        assert_eq!(
            archive.by_index(0).unwrap().compression(),
            CompressionMethod::Stored
        );

        let chunks = read_bundle("deck.zip", &bytes).unwrap();
        assert_eq!(chunks.len(), 2);
        let merged = merge_sources([("deck.zip", bytes)], true).unwrap();
        assert_eq!(merged.chunks_read, 2);
        assert_eq!(merged.map, numbered(3));
    }

    #[test]
    fn test_merge_last_write_wins() {
        let merged = merge_sources(
            [
                ("a.json", br#"{"k": "first", "x": "1"}"#.to_vec()),
                ("notes.txt", b"ignored".to_vec()),
                ("b.JSON", br#"{"k": "second"}"#.to_vec()),
            ],
            false,
        )
        .unwrap();
        assert_eq!(merged.chunks_read, 2);
        assert_eq!(merged.map.get("k"), Some("second"));
        assert_eq!(merged.map.get("x"), Some("1"));
    }

    #[test]
    fn test_merge_skips_or_aborts_on_bad_chunk() {
        let inputs = || {
            vec![
                ("good.json", br#"{"k": "v"}"#.to_vec()),
                ("bad.json", b"nope".to_vec()),
            ]
        };

        let merged = merge_sources(inputs(), false).unwrap();
        assert_eq!(merged.map.get("k"), Some("v"));
        assert_eq!(merged.failures.len(), 1);

        assert!(matches!(
            merge_sources(inputs(), true),
            Err(Error::InvalidChunk(name, _)) if name == "bad.json"
        ));
    }
}
