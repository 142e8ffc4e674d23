//! Presentation container: slide order and slide parts.

use crate::{rewriter, walker};
use std::io::{Read, Seek, Write};
use xlate_core::{Error, ExtractedMap, InjectReport, Package, Relationship, Result, XmlDocument};

/// Relationship type suffix of a slide part.
const SLIDE_REL: &str = "/slide";

/// A slide deck with its slide order resolved.
#[derive(Debug, Clone)]
pub struct Presentation {
    package: Package,
    slides: Vec<String>,
}

impl Presentation {
    /// Read a presentation from a reader.
    pub fn open<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_package(Package::open(reader)?)
    }

    /// Resolve the slide order of an opened container.
    pub fn from_package(package: Package) -> Result<Self> {
        let main = package.main_part()?;
        let doc = package.read_xml(&main)?;
        let rels = package.relationships(&main)?;
        let slides = slide_order(&doc, &rels)?;
        log::debug!("Presentation {} has {} slides", main, slides.len());
        Ok(Self { package, slides })
    }

    /// Slide part names; slide `N` is at index `N - 1`.
    pub fn slides(&self) -> &[String] {
        &self.slides
    }

    /// The underlying container.
    pub fn package(&self) -> &Package {
        &self.package
    }

    pub(crate) fn package_mut(&mut self) -> &mut Package {
        &mut self.package
    }

    /// Consume the presentation, returning its container.
    pub fn into_package(self) -> Package {
        self.package
    }

    /// Extract the text of every shape and table cell, slide by slide.
    pub fn walk(&self) -> Result<ExtractedMap> {
        let mut map = ExtractedMap::new();
        for (i, part) in self.slides.iter().enumerate() {
            if !self.package.contains(part) {
                log::warn!("Slide part {} is missing, skipping it", part);
                continue;
            }
            let doc = self.package.read_xml(part)?;
            if let Some(root) = doc.root() {
                walker::walk_slide(i + 1, root, &mut map);
            }
        }
        log::debug!("Extracted {} entries from presentation", map.len());
        Ok(map)
    }

    /// Write translated text into shapes and table cells.
    pub fn rewrite(&mut self, translated: &ExtractedMap) -> Result<InjectReport> {
        rewriter::rewrite(self, translated)
    }

    /// Write the container.
    pub fn save<W: Write + Seek>(&self, writer: W) -> Result<W> {
        self.package.save(writer)
    }

    /// Write the container into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.package.to_bytes()
    }
}

/// Ordered slide parts.
///
/// `p:sldIdLst` is authoritative. A presentation part without one falls
/// back to the slide relationships sorted by the number in their target.
fn slide_order(doc: &XmlDocument, rels: &[Relationship]) -> Result<Vec<String>> {
    let root = doc
        .root()
        .ok_or_else(|| Error::CorruptedFile("presentation part has no root element".to_string()))?;
    let slide_part = |id: &str| {
        rels.iter()
            .find(|r| r.id == id && r.is_type(SLIDE_REL))
            .and_then(|r| r.part.clone())
    };

    if let Some(list) = root.child("sldIdLst") {
        let mut slides = Vec::new();
        for entry in list.elements_named("sldId") {
            match entry.prefixed_attr("id").as_deref().and_then(slide_part) {
                Some(part) => slides.push(part),
                None => log::warn!("Slide list entry without a slide relationship"),
            }
        }
        return Ok(slides);
    }

    let mut slides: Vec<(String, Option<usize>)> = rels
        .iter()
        .filter(|r| r.is_type(SLIDE_REL))
        .filter_map(|r| {
            let part = r.part.clone()?;
            let number = extract_slide_number(&r.target);
            Some((part, number))
        })
        .collect();

    slides.sort_by(|a, b| match (a.1, b.1) {
        (Some(na), Some(nb)) => na.cmp(&nb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.0.cmp(&b.0),
    });

    Ok(slides.into_iter().map(|(part, _)| part).collect())
}

/// Extract a slide number from a target like "slides/slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml");
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#;

    pub(crate) const PRESENTATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst><p:sldId id="256" r:id="rId3"/><p:sldId id="257" r:id="rId2"/></p:sldIdLst></p:presentation>"#;

    pub(crate) const PRESENTATION_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/></Relationships>"#;

    pub(crate) const SLIDE1: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="en-US" b="1"/><a:t>Hello</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;

    pub(crate) const SLIDE2: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:grpSp><p:nvGrpSpPr><p:cNvPr id="4" name="Group 3"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="5" name="A"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>A</a:t></a:r></a:p></p:txBody></p:sp><p:sp><p:nvSpPr><p:cNvPr id="6" name="B"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>B</a:t></a:r></a:p></p:txBody></p:sp></p:grpSp></p:spTree></p:cSld></p:sld>"#;

    pub(crate) fn fixture_parts() -> Vec<(&'static str, String)> {
        vec![
            ("[Content_Types].xml", "<Types/>".to_string()),
            ("_rels/.rels", ROOT_RELS.to_string()),
            ("ppt/presentation.xml", PRESENTATION.to_string()),
            ("ppt/_rels/presentation.xml.rels", PRESENTATION_RELS.to_string()),
            ("ppt/slides/slide1.xml", SLIDE1.to_string()),
            ("ppt/slides/slide2.xml", SLIDE2.to_string()),
        ]
    }

    pub(crate) fn fixture() -> Presentation {
        let bytes = Package::from_parts(fixture_parts()).to_bytes().unwrap();
        Presentation::from_package(Package::from_bytes(bytes).unwrap()).unwrap()
    }

    #[test]
    fn test_slide_order_follows_slide_list() {
        let presentation = fixture();
        assert_eq!(
            presentation.slides(),
            &["ppt/slides/slide1.xml", "ppt/slides/slide2.xml"]
        );
    }

    #[test]
    fn test_slide_order_falls_back_to_relationships() {
        let doc = XmlDocument::parse_str("<p:presentation xmlns:p=\"urn:p\"/>").unwrap();
        let rel = |id: &str, target: &str| Relationship {
            id: id.to_string(),
            rel_type: "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide".to_string(),
            target: target.to_string(),
            part: Some(format!("ppt/{}", target)),
        };
        let rels = vec![
            rel("rId7", "slides/slide10.xml"),
            rel("rId2", "slides/slide2.xml"),
            rel("rId9", "slides/title.xml"),
        ];
        assert_eq!(
            slide_order(&doc, &rels).unwrap(),
            vec!["ppt/slides/slide2.xml", "ppt/slides/slide10.xml", "ppt/slides/title.xml"]
        );
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("slides/slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("slides/slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits.xml"), None);
    }

    #[test]
    fn test_two_slide_scenario() {
        let map = fixture().walk().unwrap();
        let expected: ExtractedMap = [
            ("Slide1!Shape1", "Hello"),
            ("Slide2!Shape1_1", "A"),
            ("Slide2!Shape1_2", "B"),
        ]
        .into_iter()
        .collect();
        assert_eq!(map, expected);
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["Slide1!Shape1", "Slide2!Shape1_1", "Slide2!Shape1_2"]);
    }

    #[test]
    fn test_walk_is_deterministic() {
        let presentation = fixture();
        let first: Vec<_> = presentation
            .walk()
            .unwrap()
            .into_iter()
            .collect();
        let second: Vec<_> = presentation
            .walk()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_slide_part_is_skipped() {
        let parts = fixture_parts()
            .into_iter()
            .filter(|(name, _)| *name != "ppt/slides/slide1.xml");
        let presentation = Presentation::from_package(Package::from_parts(parts)).unwrap();
        let map = presentation.walk().unwrap();
        assert_eq!(map.len(), 2);
        assert!(!map.contains_key("Slide1!Shape1"));
    }
}
