//! Direct edits of spreadsheet container parts.
//!
//! Cells and drawing shapes are rewritten on the XML parts themselves, and
//! only the parts that were touched are re-serialized. Everything else in
//! the container is written back byte for byte.
//!
//! Drawing shapes are numbered 1-based in pre-order over every `sp` of a
//! sheet's drawing parts, taken in relationship order, whether or not they
//! hold text, so the numbering survives re-extraction.

use crate::sheet::set_cell_text;
use crate::workbook::Workbook;
use std::collections::{BTreeMap, HashMap};
use xlate_core::drawingml::{empty_text_body, set_text_body_text, text_body_text};
use xlate_core::{
    CellCoordinate, DocumentKind, Element, ExtractedMap, InjectReport, LocationKey, Package, Result,
};

/// Relationship type suffix of a sheet's drawing part.
const DRAWING_REL: &str = "/drawing";

/// Drawing parts of a sheet, in relationship order.
fn drawing_parts(package: &Package, sheet_part: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    for rel in package.relationships(sheet_part)? {
        if !rel.is_type(DRAWING_REL) {
            continue;
        }
        match rel.part {
            Some(part) if package.contains(&part) => parts.push(part),
            _ => log::warn!(
                "Drawing relationship {} of {} does not resolve to a part",
                rel.id,
                sheet_part
            ),
        }
    }
    Ok(parts)
}

/// Visit every `sp` shape under `el` in pre-order, skipping `mc:Fallback`
/// branches. Pictures (`pic`), connectors (`cxnSp`) and frames
/// (`graphicFrame`) carry no text body of their own and are neither visited
/// nor numbered. `next` carries the numbering across drawing parts.
fn visit_shapes<'a>(el: &'a Element, next: &mut usize, visit: &mut dyn FnMut(usize, &'a Element)) {
    for child in el.elements() {
        if child.is("Fallback") {
            continue;
        }
        if child.is("sp") {
            *next += 1;
            visit(*next, child);
        }
        visit_shapes(child, next, visit);
    }
}

fn visit_shapes_mut(el: &mut Element, next: &mut usize, visit: &mut dyn FnMut(usize, &mut Element)) {
    for child in el.elements_mut() {
        if child.is("Fallback") {
            continue;
        }
        if child.is("sp") {
            *next += 1;
            visit(*next, child);
        }
        visit_shapes_mut(child, next, visit);
    }
}

/// Text of every drawing shape of every sheet, as `Sheet!XLShape<N>`.
pub fn extract_shapes(workbook: &Workbook) -> Result<ExtractedMap> {
    let package = workbook.package();
    let mut map = ExtractedMap::new();

    for (sheet, sheet_part) in workbook.readable_sheets() {
        let mut next = 0;
        for drawing in drawing_parts(package, sheet_part)? {
            let doc = package.read_xml(&drawing)?;
            let Some(root) = doc.root() else { continue };
            visit_shapes(root, &mut next, &mut |index, shape| {
                let Some(body) = shape.child("txBody") else { return };
                let text = text_body_text(body);
                let text = text.trim();
                if !text.is_empty() {
                    let key = LocationKey::sheet_shape(sheet, index).encode();
                    if !map.insert_new(&key, text) {
                        log::warn!("Duplicate key {}, keeping the first value", key);
                    }
                }
            });
            log::debug!("Numbered {} shapes of '{}' through {}", next, sheet, drawing);
        }
    }

    Ok(map)
}

/// Updates addressed to one sheet, each with its original key.
#[derive(Default)]
struct SheetUpdates<'a> {
    cells: Vec<(&'a str, CellCoordinate, &'a str)>,
    shapes: BTreeMap<usize, (&'a str, &'a str)>,
}

/// Write translated text into the cells and drawing shapes of a workbook.
///
/// Keys that do not decode, name an unknown sheet, or address a shape index
/// the sheet does not have are skipped. A sheet whose part is missing has
/// all of its updates skipped.
pub fn patch(workbook: &mut Workbook, updates: &ExtractedMap) -> Result<InjectReport> {
    let mut report = InjectReport::new();
    let mut by_sheet: HashMap<String, SheetUpdates<'_>> = HashMap::new();

    for (key, text) in updates.iter() {
        match LocationKey::decode_for(DocumentKind::Spreadsheet, key) {
            Some(LocationKey::SheetCell { sheet, cell }) => {
                by_sheet.entry(sheet).or_default().cells.push((key, cell, text));
            }
            Some(LocationKey::SheetShape { sheet, shape }) => {
                by_sheet.entry(sheet).or_default().shapes.insert(shape, (key, text));
            }
            _ => report.record_skipped(key),
        }
    }

    let sheets: Vec<(String, String)> = workbook
        .readable_sheets()
        .map(|(name, part)| (name.to_string(), part.to_string()))
        .collect();

    for (name, part) in &sheets {
        let Some(sheet_updates) = by_sheet.remove(name) else {
            continue;
        };
        let package = workbook.package_mut();
        patch_cells(package, part, &sheet_updates.cells, &mut report)?;
        patch_shapes(package, part, sheet_updates.shapes, &mut report)?;
    }

    // Unknown sheets, or sheets whose part is missing.
    for (name, leftover) in by_sheet {
        log::warn!("No readable sheet named '{}', skipping its updates", name);
        for (key, _, _) in leftover.cells {
            report.record_skipped(key);
        }
        for (key, _) in leftover.shapes.into_values() {
            report.record_skipped(key);
        }
    }

    log::debug!(
        "Patched workbook: {} applied, {} skipped",
        report.applied,
        report.skipped.len()
    );
    Ok(report)
}

fn patch_cells(
    package: &mut Package,
    part: &str,
    cells: &[(&str, CellCoordinate, &str)],
    report: &mut InjectReport,
) -> Result<()> {
    if cells.is_empty() {
        return Ok(());
    }
    let mut doc = package.read_xml(part)?;
    let mut touched = false;
    for &(key, coordinate, text) in cells {
        let written = doc
            .root_mut()
            .is_some_and(|root| set_cell_text(root, coordinate, text));
        if written {
            touched = true;
            report.record_applied();
        } else {
            report.record_skipped(key);
        }
    }
    if touched {
        package.write_xml(part, &doc)?;
    }
    Ok(())
}

fn patch_shapes(
    package: &mut Package,
    sheet_part: &str,
    mut shapes: BTreeMap<usize, (&str, &str)>,
    report: &mut InjectReport,
) -> Result<()> {
    if shapes.is_empty() {
        return Ok(());
    }

    let mut next = 0;
    for drawing in drawing_parts(package, sheet_part)? {
        let mut doc = package.read_xml(&drawing)?;
        let mut touched = false;
        if let Some(root) = doc.root_mut() {
            visit_shapes_mut(root, &mut next, &mut |index, shape| {
                let Some((_, text)) = shapes.remove(&index) else { return };
                if shape.child("txBody").is_none() {
                    let body = empty_text_body(&shape.qualified("txBody"), shape);
                    shape.insert_before(body, &["extLst"]);
                }
                if let Some(body) = shape.child_mut("txBody") {
                    set_text_body_text(body, text);
                    report.record_applied();
                    touched = true;
                }
            });
        }
        if touched {
            package.write_xml(&drawing, &doc)?;
        }
    }

    for (key, _) in shapes.into_values() {
        report.record_skipped(key);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::workbook::tests::fixture_parts;

    const SHEET1_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing1.xml"/></Relationships>"#;

    const DRAWING1: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"><xdr:twoCellAnchor><xdr:sp><xdr:nvSpPr><xdr:cNvPr id="2" name="Box 1"/></xdr:nvSpPr><xdr:txBody><a:bodyPr/><a:p><a:r><a:rPr b="1"/><a:t>First</a:t></a:r><a:r><a:t> box</a:t></a:r></a:p></xdr:txBody></xdr:sp></xdr:twoCellAnchor><xdr:twoCellAnchor><xdr:sp><xdr:nvSpPr><xdr:cNvPr id="3" name="Arrow"/></xdr:nvSpPr><xdr:spPr/></xdr:sp></xdr:twoCellAnchor><xdr:twoCellAnchor><xdr:grpSp><xdr:sp><xdr:txBody><a:bodyPr/><a:p><a:r><a:t>Grouped</a:t></a:r></a:p></xdr:txBody></xdr:sp></xdr:grpSp></xdr:twoCellAnchor><mc:AlternateContent><mc:Choice Requires="a14"><xdr:twoCellAnchor><xdr:sp><xdr:txBody><a:bodyPr/><a:p><a:r><a:t>Choice</a:t></a:r></a:p></xdr:txBody></xdr:sp></xdr:twoCellAnchor></mc:Choice><mc:Fallback><xdr:twoCellAnchor><xdr:sp><xdr:txBody><a:bodyPr/><a:p><a:r><a:t>Fallback</a:t></a:r></a:p></xdr:txBody></xdr:sp></xdr:twoCellAnchor></mc:Fallback></mc:AlternateContent></xdr:wsDr>"#;

    pub(crate) fn with_drawing() -> Workbook {
        with_drawing_xml(DRAWING1)
    }

    fn with_drawing_xml(drawing: &str) -> Workbook {
        let mut parts = fixture_parts();
        parts.push(("xl/worksheets/_rels/sheet1.xml.rels", SHEET1_RELS.to_string()));
        parts.push(("xl/drawings/drawing1.xml", drawing.to_string()));
        let bytes = Package::from_parts(parts).to_bytes().unwrap();
        Workbook::from_package(Package::from_bytes(bytes).unwrap()).unwrap()
    }

    #[test]
    fn test_shapes_numbered_in_pre_order_including_empty() {
        let map = extract_shapes(&with_drawing()).unwrap();
        let entries: Vec<_> = map.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("Sheet1!XLShape1", "First box"),
                ("Sheet1!XLShape3", "Grouped"),
                ("Sheet1!XLShape4", "Choice"),
            ]
        );
    }

    #[test]
    fn test_pictures_connectors_and_frames_are_not_numbered() {
        let drawing = r#"<xdr:wsDr xmlns:xdr="urn:xdr" xmlns:a="urn:a"><xdr:twoCellAnchor><xdr:pic><xdr:nvPicPr><xdr:cNvPr id="2" name="Logo"/></xdr:nvPicPr></xdr:pic></xdr:twoCellAnchor><xdr:twoCellAnchor><xdr:sp><xdr:txBody><a:bodyPr/><a:p><a:r><a:t>Title</a:t></a:r></a:p></xdr:txBody></xdr:sp></xdr:twoCellAnchor><xdr:twoCellAnchor><xdr:cxnSp><xdr:nvCxnSpPr><xdr:cNvPr id="4" name="Line"/></xdr:nvCxnSpPr></xdr:cxnSp></xdr:twoCellAnchor><xdr:twoCellAnchor><xdr:graphicFrame><a:graphic><a:graphicData><a:tbl><a:tr><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>Cell</a:t></a:r></a:p></a:txBody></a:tc></a:tr></a:tbl></a:graphicData></a:graphic></xdr:graphicFrame></xdr:twoCellAnchor><xdr:twoCellAnchor><xdr:sp><xdr:txBody><a:bodyPr/><a:p><a:r><a:t>Note</a:t></a:r></a:p></xdr:txBody></xdr:sp></xdr:twoCellAnchor></xdr:wsDr>"#;
        let map = extract_shapes(&with_drawing_xml(drawing)).unwrap();
        let entries: Vec<_> = map.iter().collect();
        assert_eq!(
            entries,
            vec![("Sheet1!XLShape1", "Title"), ("Sheet1!XLShape2", "Note")]
        );
    }

    #[test]
    fn test_walk_puts_shapes_after_cells() {
        let map = with_drawing().walk().unwrap();
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(
            keys,
            vec![
                "Sheet1!A1",
                "Sheet1!B1",
                "Sheet1!A3",
                "Data!A1",
                "Sheet1!XLShape1",
                "Sheet1!XLShape3",
                "Sheet1!XLShape4",
            ]
        );
    }

    #[test]
    fn test_inject_keeps_cell_style() {
        let mut workbook = with_drawing();
        let before = workbook.walk().unwrap();
        assert_eq!(before.get("Sheet1!A1"), Some("Hi"));

        let updates: ExtractedMap = [("Sheet1!A1", "Bonjour")].into_iter().collect();
        let report = workbook.rewrite(&updates).unwrap();
        assert_eq!(report.applied, 1);

        let saved = Workbook::from_package(Package::from_bytes(workbook.to_bytes().unwrap()).unwrap())
            .unwrap();
        assert_eq!(saved.walk().unwrap().get("Sheet1!A1"), Some("Bonjour"));
        let sheet = String::from_utf8(saved.package().read("xl/worksheets/sheet1.xml").unwrap().to_vec())
            .unwrap();
        assert!(sheet.contains(r#"<c r="A1" s="3" t="inlineStr"><is><t>Bonjour</t></is></c>"#));
    }

    #[test]
    fn test_only_touched_parts_are_rewritten() {
        let mut workbook = with_drawing();
        let updates: ExtractedMap = [("Data!A1", "Ligne")].into_iter().collect();
        workbook.rewrite(&updates).unwrap();
        let modified: Vec<_> = workbook.package().modified_parts().collect();
        assert_eq!(modified, vec!["xl/worksheets/sheet2.xml"]);
    }

    #[test]
    fn test_shape_update_first_run_wins() {
        let mut workbook = with_drawing();
        let updates: ExtractedMap = [
            ("Sheet1!XLShape1", "Première boîte"),
            ("Sheet1!XLShape2", "Flèche"),
        ]
        .into_iter()
        .collect();
        let report = workbook.rewrite(&updates).unwrap();
        assert_eq!(report.applied, 2);
        assert!(report.skipped.is_empty());

        let map = extract_shapes(&workbook).unwrap();
        assert_eq!(map.get("Sheet1!XLShape1"), Some("Première boîte"));
        assert_eq!(map.get("Sheet1!XLShape2"), Some("Flèche"));
        assert_eq!(map.get("Sheet1!XLShape3"), Some("Grouped"));

        let drawing =
            String::from_utf8(workbook.package().read("xl/drawings/drawing1.xml").unwrap().to_vec())
                .unwrap();
        assert!(drawing.contains(r#"<a:r><a:rPr b="1"/><a:t>Première boîte</a:t></a:r><a:r><a:t></a:t></a:r>"#));
        assert!(drawing.contains("<mc:Fallback><xdr:twoCellAnchor><xdr:sp><xdr:txBody><a:bodyPr/><a:p><a:r><a:t>Fallback</a:t>"));
    }

    #[test]
    fn test_bad_keys_are_skipped() {
        let mut workbook = with_drawing();
        let updates: ExtractedMap = [
            ("Sheet1!XLShape9", "x"),
            ("Nope!A1", "x"),
            ("Sheet1!a1", "x"),
            ("Slide1!Shape1", "x"),
            ("Data!B2", "ok"),
        ]
        .into_iter()
        .collect();
        let report = workbook.rewrite(&updates).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped.len(), 4);
    }

    #[test]
    fn test_round_trip_identity() {
        let mut workbook = with_drawing();
        let original = workbook.walk().unwrap();
        workbook.rewrite(&original).unwrap();
        let reopened =
            Workbook::from_package(Package::from_bytes(workbook.to_bytes().unwrap()).unwrap()).unwrap();
        assert_eq!(reopened.walk().unwrap(), original);
    }

    #[test]
    fn test_missing_sheet_part_skips_only_that_sheet() {
        let parts = fixture_parts()
            .into_iter()
            .filter(|(name, _)| *name != "xl/worksheets/sheet1.xml");
        let mut workbook = Workbook::from_package(Package::from_parts(parts)).unwrap();
        let updates: ExtractedMap = [("Sheet1!A1", "x"), ("Data!A1", "y")].into_iter().collect();
        let report = workbook.rewrite(&updates).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, vec!["Sheet1!A1".to_string()]);
    }
}
