//! In-place cell edits on a worksheet part.

use xlate_core::xml::Node;
use xlate_core::{CellCoordinate, Element};

/// Write `text` into a cell as an inline string.
///
/// The row and cell are created in numeric order when absent. The cell
/// keeps its style and other attributes; any cached value, formula or
/// previous inline string is replaced. Returns `false` when the worksheet
/// has no `sheetData`.
pub fn set_cell_text(worksheet: &mut Element, coordinate: CellCoordinate, text: &str) -> bool {
    let Some(sheet_data) = worksheet.child_mut("sheetData") else {
        return false;
    };

    let row = find_or_insert(
        sheet_data,
        "row",
        coordinate.row(),
        |row| row.attr("r").and_then(|r| r.parse().ok()),
        |name| Element::new(name).with_attr("r", &coordinate.row().to_string()),
    );
    let Some(row) = row else {
        return false;
    };

    let cell = find_or_insert(
        row,
        "c",
        coordinate.column(),
        |cell| {
            cell.attr("r")
                .and_then(|r| CellCoordinate::parse(&r))
                .map(|c| c.column())
        },
        |name| Element::new(name).with_attr("r", &coordinate.to_string()),
    );
    let Some(cell) = cell else {
        return false;
    };

    write_inline_string(cell, text);
    true
}

/// Find the child element `local` whose position equals `target`, or
/// insert a new one before the first child with a greater position.
///
/// Positions come from `position`; children without an explicit position
/// follow their predecessor.
fn find_or_insert<'a>(
    parent: &'a mut Element,
    local: &str,
    target: u32,
    position: impl Fn(&Element) -> Option<u32>,
    create: impl FnOnce(&str) -> Element,
) -> Option<&'a mut Element> {
    let mut implied: u32 = 0;
    let mut slot = None;
    for (i, node) in parent.children().iter().enumerate() {
        let Node::Element(el) = node else { continue };
        if !el.is(local) {
            continue;
        }
        implied = position(el).unwrap_or(implied.saturating_add(1));
        if implied >= target {
            slot = Some((i, implied == target));
            break;
        }
    }

    let index = match slot {
        Some((i, true)) => i,
        Some((i, false)) => {
            let element = create(&parent.qualified(local));
            parent.children_mut().insert(i, Node::Element(element));
            i
        }
        None => {
            let element = create(&parent.qualified(local));
            parent.children_mut().push(Node::Element(element));
            parent.children().len() - 1
        }
    };

    match parent.children_mut().get_mut(index) {
        Some(Node::Element(el)) => Some(el),
        _ => None,
    }
}

fn write_inline_string(cell: &mut Element, text: &str) {
    cell.set_attr("t", "inlineStr");
    cell.retain_elements(|e| !(e.is("v") || e.is("f") || e.is("is")));

    let mut t = Element::new(&cell.qualified("t"));
    if needs_space_preserve(text) {
        t.set_attr("xml:space", "preserve");
    }
    t.set_text(text);
    let inline = Element::new(&cell.qualified("is")).with_child(t);
    cell.insert_before(inline, &["extLst"]);
}

fn needs_space_preserve(text: &str) -> bool {
    text.trim() != text || text.contains('\n')
}
