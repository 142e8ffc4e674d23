//! Workbook manifest: sheet names, sheet parts and shared strings.

use crate::{patcher, walker};
use std::io::{Read, Seek, Write};
use xlate_core::{Element, Error, ExtractedMap, InjectReport, Package, Result};

/// Relationship type suffix of a worksheet part.
const WORKSHEET_REL: &str = "/worksheet";

/// Relationship type suffix of the shared string table.
const SHARED_STRINGS_REL: &str = "/sharedStrings";

/// One sheet as listed in the workbook part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    /// Display name, used as the first key segment.
    pub name: String,
    /// Resolved part name; `None` when the relationship is missing.
    pub part: Option<String>,
}

/// A spreadsheet container with its sheet list resolved.
#[derive(Debug, Clone)]
pub struct Workbook {
    package: Package,
    sheets: Vec<SheetEntry>,
    shared_strings: Vec<String>,
}

impl Workbook {
    /// Read a workbook from a reader.
    pub fn open<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_package(Package::open(reader)?)
    }

    /// Resolve the sheet list of an opened container.
    pub fn from_package(package: Package) -> Result<Self> {
        let main = package.main_part()?;
        let doc = package.read_xml(&main)?;
        let root = doc
            .root()
            .ok_or_else(|| Error::CorruptedFile(format!("{} has no root element", main)))?;
        let rels = package.relationships(&main)?;

        let mut sheets = Vec::new();
        if let Some(list) = root.child("sheets") {
            for sheet in list.elements_named("sheet") {
                let Some(name) = sheet.attr("name") else {
                    log::warn!("Skipping unnamed sheet in {}", main);
                    continue;
                };
                let part = sheet.prefixed_attr("id").and_then(|id| {
                    rels.iter()
                        .find(|r| r.id == id && r.is_type(WORKSHEET_REL))
                        .and_then(|r| r.part.clone())
                });
                if part.is_none() {
                    log::warn!("Sheet '{}' has no worksheet relationship", name);
                }
                sheets.push(SheetEntry { name, part });
            }
        }

        let shared_strings = match rels
            .iter()
            .find(|r| r.is_type(SHARED_STRINGS_REL))
            .and_then(|r| r.part.as_deref())
        {
            Some(part) if package.contains(part) => read_shared_strings(&package, part)?,
            _ => Vec::new(),
        };

        log::debug!(
            "Workbook {} has {} sheets and {} shared strings",
            main,
            sheets.len(),
            shared_strings.len()
        );

        Ok(Self {
            package,
            sheets,
            shared_strings,
        })
    }

    /// Sheets in workbook order.
    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    /// Shared string table, by index.
    pub fn shared_strings(&self) -> &[String] {
        &self.shared_strings
    }

    /// The underlying container.
    pub fn package(&self) -> &Package {
        &self.package
    }

    pub(crate) fn package_mut(&mut self) -> &mut Package {
        &mut self.package
    }

    /// Consume the workbook, returning its container.
    pub fn into_package(self) -> Package {
        self.package
    }

    /// Sheets whose part is present in the container, with that part name.
    /// Sheets with a missing part are logged and left out.
    pub(crate) fn readable_sheets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sheets.iter().filter_map(|sheet| match sheet.part.as_deref() {
            Some(part) if self.package.contains(part) => Some((sheet.name.as_str(), part)),
            _ => {
                log::warn!("Part for sheet '{}' is missing, skipping it", sheet.name);
                None
            }
        })
    }

    /// Extract every translatable cell of every sheet, then the text of
    /// every drawing shape.
    pub fn walk(&self) -> Result<ExtractedMap> {
        let mut map = ExtractedMap::new();
        for (name, part) in self.readable_sheets() {
            let doc = self.package.read_xml(part)?;
            if let Some(root) = doc.root() {
                walker::walk_cells(name, root, &self.shared_strings, &mut map);
            }
        }
        map.merge(patcher::extract_shapes(self)?);
        log::debug!("Extracted {} entries from workbook", map.len());
        Ok(map)
    }

    /// Write translated text into cells and drawing shapes.
    pub fn rewrite(&mut self, translated: &ExtractedMap) -> Result<InjectReport> {
        patcher::patch(self, translated)
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

fn read_shared_strings(package: &Package, part: &str) -> Result<Vec<String>> {
    let doc = package.read_xml(part)?;
    Ok(doc
        .root()
        .map(|root| root.elements_named("si").map(rich_text).collect())
        .unwrap_or_default())
}

/// Visible text of a string item (`si` or `is`): a plain `t`, or the `t`
/// of every rich-text run. Phonetic runs are not part of the text.
pub(crate) fn rich_text(item: &Element) -> String {
    let mut text = String::new();
    for child in item.elements() {
        if child.is("t") {
            text.push_str(&child.text());
        } else if child.is("r") {
            if let Some(t) = child.child("t") {
                text.push_str(&t.text());
            }
        }
    }
    text
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;

    pub(crate) const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    pub(crate) const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/><sheet name="Data" sheetId="2" r:id="rId2"/></sheets></workbook>"#;

    pub(crate) const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#;

    pub(crate) const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3"><si><t>Hi</t></si><si><r><rPr><b/></rPr><t>Bold</t></r><r><t xml:space="preserve"> tail</t></r><rPh sb="0" eb="1"><t>ignored</t></rPh></si><si><t>Total</t></si></sst>"#;

    pub(crate) const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" s="3" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row><row r="3"><c r="A3" t="s"><v>2</v></c><c r="B3" s="1"><f>SUM(A1:A2)</f><v>42</v></c><c r="C3" t="str"><f>"x"&amp;"y"</f><v>xy</v></c></row></sheetData></worksheet>"#;

    pub(crate) const SHEET2: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Inline</t></is></c><c r="B1"><v>3.5</v></c><c r="C1" t="inlineStr"><is><t>   </t></is></c><c r="D1" t="inlineStr"><is><t>=not a formula</t></is></c></row></sheetData></worksheet>"#;

    pub(crate) fn fixture_parts() -> Vec<(&'static str, String)> {
        vec![
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", ROOT_RELS.to_string()),
            ("xl/workbook.xml", WORKBOOK.to_string()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
            ("xl/sharedStrings.xml", SHARED_STRINGS.to_string()),
            ("xl/worksheets/sheet1.xml", SHEET1.to_string()),
            ("xl/worksheets/sheet2.xml", SHEET2.to_string()),
        ]
    }

    pub(crate) fn fixture() -> Workbook {
        Workbook::from_package(Package::from_parts(fixture_parts())).unwrap()
    }

    #[test]
    fn test_sheets_resolve_through_relationships() {
        let workbook = fixture();
        assert_eq!(
            workbook.sheets(),
            &[
                SheetEntry {
                    name: "Sheet1".to_string(),
                    part: Some("xl/worksheets/sheet1.xml".to_string()),
                },
                SheetEntry {
                    name: "Data".to_string(),
                    part: Some("xl/worksheets/sheet2.xml".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_shared_strings_join_rich_runs() {
        let workbook = fixture();
        assert_eq!(workbook.shared_strings(), &["Hi", "Bold tail", "Total"]);
    }

    #[test]
    fn test_walk_extracts_cells_in_sheet_order() {
        let map = fixture().walk().unwrap();
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["Sheet1!A1", "Sheet1!B1", "Sheet1!A3", "Data!A1"]);
        assert_eq!(map.get("Sheet1!B1"), Some("Bold tail"));
    }

    #[test]
    fn test_walk_is_stable_with_one_key_per_leaf() {
        let workbook = crate::patcher::tests::with_drawing();
        let first = workbook.walk().unwrap();
        let second = workbook.walk().unwrap();
        assert_eq!(first, second);
        assert!(first.keys().eq(second.keys()));

        // Four string cells and three shapes with text.
        assert_eq!(first.len(), 7);
        let shapes = first.keys().filter(|k| k.contains("!XLShape")).count();
        assert_eq!(shapes, 3);
    }

    #[test]
    fn test_formula_cells_are_never_extracted() {
        let map = fixture().walk().unwrap();
        assert!(!map.contains_key("Sheet1!B3"));
        assert!(!map.contains_key("Sheet1!C3"));
        assert!(!map.contains_key("Data!D1"));
        assert!(!map.contains_key("Data!B1"));
        assert!(!map.contains_key("Data!C1"));
    }

    #[test]
    fn test_missing_sheet_part_is_skipped() {
        let parts = fixture_parts()
            .into_iter()
            .filter(|(name, _)| *name != "xl/worksheets/sheet2.xml");
        let workbook = Workbook::from_package(Package::from_parts(parts)).unwrap();
        let map = workbook.walk().unwrap();
        assert_eq!(map.len(), 3);
        assert!(map.keys().all(|k| k.starts_with("Sheet1!")));
    }

    #[test]
    fn test_missing_workbook_is_an_error() {
        let package = Package::from_parts([("_rels/.rels", ROOT_RELS)]);
        assert!(matches!(
            Workbook::from_package(package),
            Err(Error::MissingPart(_))
        ));
    }
}
