//! Story walk: the body, or one header or footer part.

use crate::runs::paragraph_text;
use xlate_core::{DocumentLeaf, Element, ExtractedMap, LocationKey, Region, TableCell};

/// Text of a table cell: its paragraphs joined with `\n`. Nested tables
/// are not part of the cell text.
pub fn cell_text(cell: &Element) -> String {
    cell.elements_named("p")
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append a story's paragraphs, then its table cells, to `out`.
///
/// Paragraphs are numbered over the non-empty ones only; tables are
/// numbered over all top-level tables of the story, and cells row-major.
pub fn walk_story(story: &Element, region: Region, out: &mut ExtractedMap) {
    let mut number = 0;
    for paragraph in story.elements_named("p") {
        let text = paragraph_text(paragraph);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        number += 1;
        let key = LocationKey::document(region, DocumentLeaf::Paragraph(number)).encode();
        if !out.insert_new(&key, text) {
            log::warn!("Duplicate key {}, keeping the first value", key);
        }
    }

    for (t, table) in story.elements_named("tbl").enumerate() {
        for (r, row) in table.elements_named("tr").enumerate() {
            for (c, cell) in row.elements_named("tc").enumerate() {
                let text = cell_text(cell);
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let leaf = DocumentLeaf::TableCell {
                    table: t + 1,
                    cell: TableCell::new(r + 1, c + 1),
                };
                let key = LocationKey::document(region, leaf).encode();
                if !out.insert_new(&key, text) {
                    log::warn!("Duplicate key {}, keeping the first value", key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlate_core::XmlDocument;

    fn walk(xml: &str, region: Region) -> ExtractedMap {
        let doc = XmlDocument::parse_str(xml).unwrap();
        let mut map = ExtractedMap::new();
        walk_story(doc.root().unwrap(), region, &mut map);
        map
    }

    #[test]
    fn test_paragraphs_then_tables() {
        let map = walk(
            r#"<w:body xmlns:w="urn:w"><w:p><w:r><w:t>First</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc><w:tc><w:p/></w:tc></w:tr><w:tr><w:tc/><w:tc><w:p><w:r><w:t> d </w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:p/><w:p><w:r><w:t>  </w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>e</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:sectPr/></w:body>"#,
            Region::Body,
        );
        let entries: Vec<_> = map.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("Paragraph1", "First"),
                ("Paragraph2", "Second"),
                ("Table1!R1C1", "a\nb"),
                ("Table1!R2C2", "d"),
                ("Table2!R1C1", "e"),
            ]
        );
    }

    #[test]
    fn test_footer_keys_are_namespaced() {
        let map = walk(
            r#"<w:ftr xmlns:w="urn:w"><w:p><w:r><w:t>Page</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>x</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:ftr>"#,
            Region::Footer(2),
        );
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["Footer_Section2!Paragraph1", "Footer_Section2!Table1!R1C1"]);
    }
}
