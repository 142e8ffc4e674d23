//! Cell walk of one worksheet.

use crate::workbook::rich_text;
use xlate_core::{CellCoordinate, Element, ExtractedMap, LocationKey};

/// Append every translatable cell of a worksheet to `out`, row-major.
///
/// Only literal strings are candidates: shared strings and inline strings.
/// A cell with a formula, a cached formula result (`t="str"`), or a
/// number, boolean, error or date value is skipped, as is any string that
/// is whitespace-only or starts with `=`.
pub fn walk_cells(sheet: &str, root: &Element, shared: &[String], out: &mut ExtractedMap) {
    let Some(sheet_data) = root.child("sheetData") else {
        return;
    };

    let mut row_number: u32 = 0;
    for row in sheet_data.elements_named("row") {
        let number = row
            .attr("r")
            .and_then(|r| r.parse().ok())
            .or_else(|| row_number.checked_add(1));
        let Some(number) = number else {
            log::warn!("Skipping row with invalid position in sheet '{}'", sheet);
            continue;
        };
        row_number = number;

        let mut column: u32 = 0;
        for cell in row.elements_named("c") {
            let coordinate = cell
                .attr("r")
                .and_then(|r| CellCoordinate::parse(&r))
                .or_else(|| CellCoordinate::new(column.checked_add(1)?, row_number));
            let Some(coordinate) = coordinate else {
                log::warn!("Skipping cell with invalid position in sheet '{}'", sheet);
                continue;
            };
            column = coordinate.column();

            if let Some(text) = cell_text(cell, shared) {
                if is_translatable(&text) {
                    let key = LocationKey::sheet_cell(sheet, coordinate).encode();
                    if !out.insert_new(&key, text) {
                        log::warn!("Duplicate cell {} in sheet '{}', keeping the first", key, sheet);
                    }
                }
            }
        }
    }
}

/// Literal string content of a cell, if it has any.
pub(crate) fn cell_text(cell: &Element, shared: &[String]) -> Option<String> {
    if cell.child("f").is_some() {
        return None;
    }
    match cell.attr("t").as_deref() {
        Some("s") => {
            let index: usize = cell.child("v")?.text().trim().parse().ok()?;
            shared.get(index).cloned()
        }
        Some("inlineStr") => cell.child("is").map(rich_text),
        _ => None,
    }
}

fn is_translatable(text: &str) -> bool {
    !text.trim().is_empty() && !text.starts_with('=')
}
