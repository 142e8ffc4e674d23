//! Shape-tree walk of one slide.

use xlate_core::drawingml::text_body_text;
use xlate_core::{Element, ExtractedMap, LocationKey, ShapePath, TableCell};

/// Children of a shape tree or group that count as shapes.
const SHAPE_ELEMENTS: &[&str] = &["sp", "grpSp", "graphicFrame", "cxnSp", "pic", "contentPart"];

/// Whether an element is a shape in a shape tree.
pub fn is_shape(el: &Element) -> bool {
    SHAPE_ELEMENTS.iter().any(|name| el.is(name))
}

/// The slide's top-level shape tree.
pub fn shape_tree(slide: &Element) -> Option<&Element> {
    slide.find_path(&["cSld", "spTree"])
}

/// The table of a graphic frame, if it holds one.
pub fn frame_table(frame: &Element) -> Option<&Element> {
    frame.find_path(&["graphic", "graphicData", "tbl"])
}

/// Append the text of every shape and table cell of a slide to `out`.
pub fn walk_slide(slide: usize, root: &Element, out: &mut ExtractedMap) {
    if let Some(tree) = shape_tree(root) {
        walk_shapes(slide, tree, None, out);
    }
}

fn walk_shapes(slide: usize, container: &Element, parent: Option<&ShapePath>, out: &mut ExtractedMap) {
    for (i, shape) in container.elements().filter(|e| is_shape(e)).enumerate() {
        let path = match parent {
            Some(parent) => parent.child(i + 1),
            None => ShapePath::root(i + 1),
        };

        if let Some(text) = shape.child("txBody").and_then(trimmed_text) {
            let key = LocationKey::slide_shape(slide, path.clone()).encode();
            if !out.insert_new(&key, text) {
                log::warn!("Duplicate key {}, keeping the first value", key);
            }
        }

        if let Some(table) = shape.is("graphicFrame").then(|| frame_table(shape)).flatten() {
            for (r, row) in table.elements_named("tr").enumerate() {
                for (c, cell) in row.elements_named("tc").enumerate() {
                    if let Some(text) = cell.child("txBody").and_then(trimmed_text) {
                        let key = LocationKey::slide_table_cell(
                            slide,
                            path.clone(),
                            TableCell::new(r + 1, c + 1),
                        );
                        let key = key.encode();
                        if !out.insert_new(&key, text) {
                            log::warn!("Duplicate key {}, keeping the first value", key);
                        }
                    }
                }
            }
        }

        if shape.is("grpSp") {
            walk_shapes(slide, shape, Some(&path), out);
        }
    }
}

fn trimmed_text(body: &Element) -> Option<String> {
    let text = text_body_text(body);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
