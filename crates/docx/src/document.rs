//! Word-processing container: body, sections and their headers and footers.

use crate::rewriter::{rewrite_story, StoryUpdate};
use crate::walker::walk_story;
use std::io::{Read, Seek, Write};
use xlate_core::{
    DocumentKind, Element, Error, ExtractedMap, InjectReport, LocationKey, Package, Region,
    Relationship, Result,
};

/// Relationship type suffixes of header and footer parts.
const HEADER_REL: &str = "/header";
const FOOTER_REL: &str = "/footer";

/// Default header and footer parts of one section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub header: Option<String>,
    pub footer: Option<String>,
}

/// A word-processing document with its sections resolved.
#[derive(Debug, Clone)]
pub struct WordDocument {
    package: Package,
    main: String,
    sections: Vec<Section>,
}

impl WordDocument {
    /// Read a document from a reader.
    pub fn open<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_package(Package::open(reader)?)
    }

    /// Resolve the main part and the sections of an opened container.
    pub fn from_package(package: Package) -> Result<Self> {
        let main = package.main_part()?;
        let doc = package.read_xml(&main)?;
        let body = doc
            .root()
            .and_then(|root| root.child("body"))
            .ok_or_else(|| Error::CorruptedFile(format!("{} has no body", main)))?;
        let rels = package.relationships(&main)?;

        let sections: Vec<Section> = section_properties(body)
            .into_iter()
            .map(|props| Section {
                header: default_reference(props, "headerReference", HEADER_REL, &rels),
                footer: default_reference(props, "footerReference", FOOTER_REL, &rels),
            })
            .collect();

        log::debug!("Document {} has {} sections", main, sections.len());
        Ok(Self {
            package,
            main,
            sections,
        })
    }

    /// Sections in document order; section `S` is at index `S - 1`.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The underlying container.
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Consume the document, returning its container.
    pub fn into_package(self) -> Package {
        self.package
    }

    /// Part holding the story a region names, if the document has it.
    fn story_part(&self, region: Region) -> Option<&str> {
        match region {
            Region::Body => Some(self.main.as_str()),
            Region::Header(s) => self.sections.get(s.checked_sub(1)?)?.header.as_deref(),
            Region::Footer(s) => self.sections.get(s.checked_sub(1)?)?.footer.as_deref(),
        }
    }

    /// Extract the body, then each section's header and footer.
    pub fn walk(&self) -> Result<ExtractedMap> {
        let mut map = ExtractedMap::new();

        let doc = self.package.read_xml(&self.main)?;
        if let Some(body) = doc.root().and_then(|root| root.child("body")) {
            walk_story(body, Region::Body, &mut map);
        }

        for s in 1..=self.sections.len() {
            for region in [Region::Header(s), Region::Footer(s)] {
                let Some(part) = self.story_part(region) else { continue };
                if !self.package.contains(part) {
                    log::warn!("Story part {} is missing, skipping it", part);
                    continue;
                }
                let doc = self.package.read_xml(part)?;
                if let Some(root) = doc.root() {
                    walk_story(root, region, &mut map);
                }
            }
        }

        log::debug!("Extracted {} entries from document", map.len());
        Ok(map)
    }

    /// Write translated text into paragraphs and table cells of the body,
    /// headers and footers.
    pub fn rewrite(&mut self, translated: &ExtractedMap) -> Result<InjectReport> {
        let mut report = InjectReport::new();
        let mut by_region: Vec<(Region, Vec<StoryUpdate<'_>>)> = Vec::new();

        for (key, text) in translated.iter() {
            let Some(LocationKey::Document { region, leaf }) =
                LocationKey::decode_for(DocumentKind::WordProcessing, key)
            else {
                report.record_skipped(key);
                continue;
            };
            let update = StoryUpdate { key, leaf, text };
            match by_region.iter_mut().find(|(r, _)| *r == region) {
                Some((_, updates)) => updates.push(update),
                None => by_region.push((region, vec![update])),
            }
        }

        for (region, updates) in by_region {
            let part = match self.story_part(region) {
                Some(part) if self.package.contains(part) => part.to_string(),
                _ => {
                    log::debug!("Document has no story for {:?}", region);
                    for update in &updates {
                        report.record_skipped(update.key);
                    }
                    continue;
                }
            };

            let mut doc = self.package.read_xml(&part)?;
            let story = doc.root_mut().and_then(|root| match region {
                Region::Body => root.child_mut("body"),
                _ => Some(root),
            });
            let Some(story) = story else {
                for update in &updates {
                    report.record_skipped(update.key);
                }
                continue;
            };
            if rewrite_story(story, &updates, &mut report) {
                self.package.write_xml(&part, &doc)?;
            }
        }

        log::debug!(
            "Rewrote document: {} applied, {} skipped",
            report.applied,
            report.skipped.len()
        );
        Ok(report)
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

/// Every `w:sectPr` of the body in document order: the ones closing a
/// section inside paragraph properties, then the body's own.
fn section_properties(body: &Element) -> Vec<&Element> {
    body.elements()
        .filter_map(|child| {
            if child.is("p") {
                child.find_path(&["pPr", "sectPr"])
            } else if child.is("sectPr") {
                Some(child)
            } else {
                None
            }
        })
        .collect()
}

/// Part of a section's `default` header or footer reference.
fn default_reference(
    props: &Element,
    reference: &str,
    rel_type: &str,
    rels: &[Relationship],
) -> Option<String> {
    let id = props
        .elements_named(reference)
        .find(|r| r.attr_local("type").as_deref() == Some("default"))?
        .prefixed_attr("id")?;
    rels.iter()
        .find(|r| r.id == id && r.is_type(rel_type))
        .and_then(|r| r.part.clone())
}
