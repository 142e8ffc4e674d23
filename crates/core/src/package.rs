//! OOXML container access.
//!
//! A [`Package`] holds every part of a ZIP-based Office container in memory,
//! in archive order, together with the per-entry metadata needed to write
//! the archive back faithfully. Parts that were never written are copied
//! raw from the source archive (compressed bytes, timestamps and attributes
//! untouched); edited parts are recompressed with their original method and
//! keep their original timestamp and permissions.

use crate::error::{Error, Result};
use crate::xml::XmlDocument;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Relationship type suffix of the main document part.
pub const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

/// One entry of the container.
#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    last_modified: DateTime,
    unix_mode: Option<u32>,
    is_dir: bool,
    source_index: Option<usize>,
    modified: bool,
}

/// An in-memory OOXML container.
#[derive(Debug, Clone)]
pub struct Package {
    source: Option<Vec<u8>>,
    parts: Vec<Part>,
    index: HashMap<String, usize>,
}

/// A resolved entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Target as written in the relationship part.
    pub target: String,
    /// Absolute part name for internal targets, `None` for external ones.
    pub part: Option<String>,
}

impl Relationship {
    /// Whether the relationship type ends with `suffix`, e.g. `/drawing`.
    pub fn is_type(&self, suffix: &str) -> bool {
        self.rel_type.ends_with(suffix)
    }
}

impl Package {
    /// Read a whole container from a reader.
    pub fn open<R: Read + Seek>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    /// Read a container from its bytes, decompressing every part.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut parts = Vec::new();
        {
            let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))
                .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

            for i in 0..archive.len() {
                let mut file = archive
                    .by_index(i)
                    .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", i, e)))?;
                let name = file.name().to_string();
                let mut data = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut data)
                    .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", name, e)))?;

                parts.push(Part {
                    name,
                    data,
                    compression: file.compression(),
                    last_modified: file.last_modified(),
                    unix_mode: file.unix_mode(),
                    is_dir: file.is_dir(),
                    source_index: Some(i),
                    modified: false,
                });
            }
        }

        log::debug!("Opened container with {} parts", parts.len());
        Ok(Self::assemble(Some(bytes), parts))
    }

    /// Build a container from `(name, bytes)` pairs. Every part is written
    /// deflated on save.
    pub fn from_parts<I, N, D>(parts: I) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<Vec<u8>>,
    {
        let parts = parts
            .into_iter()
            .map(|(name, data)| new_part(name.into(), data.into()))
            .collect();
        Self::assemble(None, parts)
    }

    fn assemble(source: Option<Vec<u8>>, parts: Vec<Part>) -> Self {
        let index = parts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        Self {
            source,
            parts,
            index,
        }
    }

    /// Part names in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Whether a part exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Raw bytes of a part.
    pub fn read(&self, name: &str) -> Option<&[u8]> {
        self.index.get(name).map(|&i| self.parts[i].data.as_slice())
    }

    /// Parse a part as XML. Missing parts are an error.
    pub fn read_xml(&self, name: &str) -> Result<XmlDocument> {
        let bytes = self
            .read(name)
            .ok_or_else(|| Error::MissingPart(name.to_string()))?;
        XmlDocument::parse(bytes).map_err(|e| Error::XmlError(format!("{}: {}", name, e)))
    }

    /// Replace a part's bytes, or append a new part.
    pub fn write(&mut self, name: &str, data: Vec<u8>) {
        match self.index.get(name) {
            Some(&i) => {
                let part = &mut self.parts[i];
                part.data = data;
                part.modified = true;
            }
            None => {
                self.index.insert(name.to_string(), self.parts.len());
                self.parts.push(new_part(name.to_string(), data));
            }
        }
    }

    /// Serialize an XML tree into a part.
    pub fn write_xml(&mut self, name: &str, doc: &XmlDocument) -> Result<()> {
        let bytes = doc.to_bytes()?;
        self.write(name, bytes);
        Ok(())
    }

    /// Names of parts that were written since the package was opened.
    pub fn modified_parts(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .filter(|p| p.modified)
            .map(|p| p.name.as_str())
    }

    /// Relationships whose source is `source_part` (`""` for the package
    /// root). A missing `.rels` part yields no relationships.
    pub fn relationships(&self, source_part: &str) -> Result<Vec<Relationship>> {
        let rels_path = rels_path_for(source_part);
        if !self.contains(&rels_path) {
            return Ok(Vec::new());
        }
        let doc = self.read_xml(&rels_path)?;
        let Some(root) = doc.root() else {
            return Ok(Vec::new());
        };

        let mut rels = Vec::new();
        for el in root.elements_named("Relationship") {
            let (Some(id), Some(rel_type), Some(target)) =
                (el.attr("Id"), el.attr("Type"), el.attr("Target"))
            else {
                log::warn!("Skipping incomplete relationship in {}", rels_path);
                continue;
            };
            let external = el
                .attr("TargetMode")
                .is_some_and(|m| m.eq_ignore_ascii_case("External"));
            let part = (!external).then(|| resolve_target(source_part, &target));
            rels.push(Relationship {
                id,
                rel_type,
                target,
                part,
            });
        }
        Ok(rels)
    }

    /// Part name of the main document, from the package root relationships.
    pub fn main_part(&self) -> Result<String> {
        self.relationships("")?
            .into_iter()
            .find(|r| r.is_type(OFFICE_DOCUMENT_REL))
            .and_then(|r| r.part)
            .ok_or_else(|| Error::MissingPart("_rels/.rels officeDocument relationship".to_string()))
    }

    /// Write the container, keeping part order and per-part metadata.
    pub fn save<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let zip_err = |e: zip::result::ZipError| Error::ZipError(format!("Failed to write ZIP: {}", e));

        let mut source = match &self.source {
            Some(bytes) => Some(ZipArchive::new(Cursor::new(bytes.as_slice())).map_err(zip_err)?),
            None => None,
        };
        let mut out = ZipWriter::new(writer);

        for part in &self.parts {
            if let (false, Some(i), Some(archive)) = (part.modified, part.source_index, source.as_mut()) {
                let file = archive.by_index_raw(i).map_err(zip_err)?;
                out.raw_copy_file(file).map_err(zip_err)?;
                continue;
            }

            let mut options = FileOptions::default()
                .compression_method(part.compression)
                .last_modified_time(part.last_modified);
            if let Some(mode) = part.unix_mode {
                options = options.unix_permissions(mode);
            }

            if part.is_dir {
                out.add_directory(part.name.as_str(), options).map_err(zip_err)?;
            } else {
                out.start_file(part.name.as_str(), options).map_err(zip_err)?;
                out.write_all(&part.data)?;
            }
        }

        out.finish().map_err(zip_err)
    }

    /// Write the container into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.save(Cursor::new(Vec::new()))?.into_inner())
    }
}

fn new_part(name: String, data: Vec<u8>) -> Part {
    Part {
        is_dir: name.ends_with('/'),
        name,
        data,
        compression: CompressionMethod::Deflated,
        last_modified: DateTime::default(),
        unix_mode: None,
        source_index: None,
        modified: true,
    }
}

/// Name of the `.rels` part describing `source_part`'s relationships.
pub fn rels_path_for(source_part: &str) -> String {
    match source_part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None if source_part.is_empty() => "_rels/.rels".to_string(),
        None => format!("_rels/{}.rels", source_part),
    }
}

/// Resolve a relationship target against the part that owns it.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize_part_name(absolute);
    }
    let base = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    if base.is_empty() {
        normalize_part_name(target)
    } else {
        normalize_part_name(&format!("{}/{}", base, target))
    }
}

fn normalize_part_name(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    const SHEET_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/></Relationships>"#;

    #[test]
    fn test_rels_path_for() {
        assert_eq!(rels_path_for(""), "_rels/.rels");
        assert_eq!(rels_path_for("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(
            rels_path_for("xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("xl/worksheets/sheet1.xml", "../drawings/drawing1.xml"),
            "xl/drawings/drawing1.xml"
        );
        assert_eq!(resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl/workbook.xml", "/xl/styles.xml"), "xl/styles.xml");
        assert_eq!(resolve_target("", "word/document.xml"), "word/document.xml");
        assert_eq!(resolve_target("ppt/presentation.xml", "./slides/slide1.xml"), "ppt/slides/slide1.xml");
    }

    #[test]
    fn test_relationships_and_main_part() {
        let package = Package::from_parts([
            ("_rels/.rels", ROOT_RELS),
            ("xl/worksheets/_rels/sheet1.xml.rels", SHEET_RELS),
        ]);
        assert_eq!(package.main_part().unwrap(), "xl/workbook.xml");

        let rels = package.relationships("xl/worksheets/sheet1.xml").unwrap();
        assert_eq!(rels.len(), 2);
        assert!(rels[0].is_type("/drawing"));
        assert_eq!(rels[0].part.as_deref(), Some("xl/drawings/drawing1.xml"));
        assert_eq!(rels[1].part, None);

        assert!(package.relationships("xl/workbook.xml").unwrap().is_empty());
    }

    #[test]
    fn test_missing_main_part_is_an_error() {
        let package = Package::from_parts([("docProps/app.xml", "<Properties/>")]);
        assert!(matches!(package.main_part(), Err(Error::MissingPart(_))));
    }

    #[test]
    fn test_not_a_zip_is_an_error() {
        assert!(matches!(
            Package::from_bytes(b"definitely not a zip".to_vec()),
            Err(Error::ZipError(_))
        ));
    }

    #[test]
    fn test_save_preserves_order_and_untouched_bytes() {
        let original = Package::from_parts([
            ("[Content_Types].xml", "<Types/>"),
            ("b.xml", "<b>one</b>"),
            ("a.xml", "<a>two</a>"),
        ])
        .to_bytes()
        .unwrap();

        let mut package = Package::from_bytes(original.clone()).unwrap();
        package.write("b.xml", b"<b>changed</b>".to_vec());
        let modified: Vec<_> = package.modified_parts().collect();
        assert_eq!(modified, vec!["b.xml"]);

        let saved = package.to_bytes().unwrap();
        let reopened = Package::from_bytes(saved.clone()).unwrap();
        let names: Vec<_> = reopened.part_names().collect();
        assert_eq!(names, vec!["[Content_Types].xml", "b.xml", "a.xml"]);
        assert_eq!(reopened.read("b.xml").unwrap(), b"<b>changed</b>");
        assert_eq!(reopened.read("a.xml").unwrap(), b"<a>two</a>");

        // Untouched entries keep their compressed bytes and metadata.
        for name in ["[Content_Types].xml", "a.xml"] {
            assert_eq!(raw_entry(&original, name), raw_entry(&saved, name), "{name} changed");
        }
    }

    fn raw_entry(zip_bytes: &[u8], name: &str) -> (Vec<u8>, CompressionMethod, String) {
        let mut archive = ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
        for i in 0..archive.len() {
            let mut file = archive.by_index_raw(i).unwrap();
            if file.name() == name {
                let compression = file.compression();
                let modified = format!("{:?}", file.last_modified());
                let mut raw = Vec::new();
                file.read_to_end(&mut raw).unwrap();
                return (raw, compression, modified);
            }
        }
        panic!("{name} not found");
    }

    #[test]
    fn test_modified_part_keeps_compression_method() {
        let bytes = {
            let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
            let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
            zip.start_file("x.xml", stored).unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap().into_inner()
        };
        let mut package = Package::from_bytes(bytes).unwrap();
        package.write("x.xml", b"<x>y</x>".to_vec());
        let saved = package.to_bytes().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(saved.as_slice())).unwrap();
        let file = archive.by_name("x.xml").unwrap();
        assert_eq!(file.compression(), CompressionMethod::Stored);
    }
}
