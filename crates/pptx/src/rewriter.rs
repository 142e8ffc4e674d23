//! Format-preserving text injection into slides.

use crate::presentation::Presentation;
use crate::walker::is_shape;
use std::collections::BTreeMap;
use xlate_core::drawingml::{empty_text_body, set_text_body_text};
use xlate_core::{
    DocumentKind, Element, ExtractedMap, InjectReport, LocationKey, Result, ShapePath, TableCell,
};

/// One decoded update: the original key, where it points, and its text.
struct SlideUpdate<'a> {
    key: &'a str,
    path: ShapePath,
    table_cell: Option<TableCell>,
    text: &'a str,
}

/// Write translated text into the shapes and table cells of a deck.
///
/// Keys that do not decode, name a slide the deck does not have, or whose
/// path does not resolve are skipped. Each touched slide part is written
/// once.
pub fn rewrite(presentation: &mut Presentation, translated: &ExtractedMap) -> Result<InjectReport> {
    let mut report = InjectReport::new();
    let mut by_slide: BTreeMap<usize, Vec<SlideUpdate<'_>>> = BTreeMap::new();

    for (key, text) in translated.iter() {
        match LocationKey::decode_for(DocumentKind::Presentation, key) {
            Some(LocationKey::SlideShape {
                slide,
                path,
                table_cell,
            }) if slide <= presentation.slides().len() => {
                by_slide.entry(slide).or_default().push(SlideUpdate {
                    key,
                    path,
                    table_cell,
                    text,
                });
            }
            _ => report.record_skipped(key),
        }
    }

    for (slide, updates) in by_slide {
        let part = presentation.slides()[slide - 1].clone();
        let package = presentation.package_mut();
        if !package.contains(&part) {
            log::warn!("Slide part {} is missing, skipping its updates", part);
            for update in updates {
                report.record_skipped(update.key);
            }
            continue;
        }

        let mut doc = package.read_xml(&part)?;
        let mut touched = false;
        for update in updates {
            let applied = doc
                .root_mut()
                .and_then(|root| root.find_path_mut(&["cSld", "spTree"]))
                .and_then(|tree| resolve_shape(tree, &update.path))
                .is_some_and(|shape| apply(shape, update.table_cell, update.text));
            if applied {
                touched = true;
                report.record_applied();
            } else {
                log::debug!("Key {} does not resolve in {}", update.key, part);
                report.record_skipped(update.key);
            }
        }
        if touched {
            package.write_xml(&part, &doc)?;
        }
    }

    log::debug!(
        "Rewrote presentation: {} applied, {} skipped",
        report.applied,
        report.skipped.len()
    );
    Ok(report)
}

/// Follow a shape path from the shape tree; every step below the first
/// must go through a group.
fn resolve_shape<'a>(tree: &'a mut Element, path: &ShapePath) -> Option<&'a mut Element> {
    let mut current = tree;
    for (depth, &index) in path.indices().iter().enumerate() {
        if depth > 0 && !current.is("grpSp") {
            return None;
        }
        current = current
            .elements_mut()
            .filter(|e| is_shape(e))
            .nth(index.checked_sub(1)?)?;
    }
    Some(current)
}

fn apply(shape: &mut Element, table_cell: Option<TableCell>, text: &str) -> bool {
    match table_cell {
        Some(cell) => apply_to_table_cell(shape, cell, text),
        None => apply_to_shape(shape, text),
    }
}

fn apply_to_shape(shape: &mut Element, text: &str) -> bool {
    if shape.child("txBody").is_none() {
        if !shape.is("sp") {
            return false;
        }
        let body = empty_text_body(&shape.qualified("txBody"), shape);
        shape.insert_before(body, &["extLst"]);
    }
    match shape.child_mut("txBody") {
        Some(body) => {
            set_text_body_text(body, text);
            true
        }
        None => false,
    }
}

fn apply_to_table_cell(shape: &mut Element, cell: TableCell, text: &str) -> bool {
    if !shape.is("graphicFrame") {
        return false;
    }
    let Some(table) = shape.find_path_mut(&["graphic", "graphicData", "tbl"]) else {
        return false;
    };
    let Some(tc) = table
        .elements_mut()
        .filter(|e| e.is("tr"))
        .nth(cell.row - 1)
        .and_then(|row| row.elements_mut().filter(|e| e.is("tc")).nth(cell.column - 1))
    else {
        return false;
    };

    if tc.child("txBody").is_none() {
        let body = empty_text_body(&tc.qualified("txBody"), tc);
        tc.insert_before(body, &["tcPr", "extLst"]);
    }
    match tc.child_mut("txBody") {
        Some(body) => {
            set_text_body_text(body, text);
            true
        }
        None => false,
    }
}
