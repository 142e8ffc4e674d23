//! Format-preserving text injection into one story.

use crate::runs::{paragraph_text, replace_text};
use xlate_core::{DocumentLeaf, Element, InjectReport, TableCell};

/// One decoded update aimed at a story.
#[derive(Debug, Clone, Copy)]
pub struct StoryUpdate<'a> {
    pub key: &'a str,
    pub leaf: DocumentLeaf,
    pub text: &'a str,
}

/// Apply updates to a story. Returns whether anything was written.
///
/// `ParagraphN` keys are resolved against the story as it was before the
/// first update, so emptying one paragraph does not shift the numbering of
/// the others.
pub fn rewrite_story(story: &mut Element, updates: &[StoryUpdate<'_>], report: &mut InjectReport) -> bool {
    let non_empty: Vec<usize> = story
        .elements_named("p")
        .enumerate()
        .filter(|(_, p)| !paragraph_text(p).trim().is_empty())
        .map(|(i, _)| i)
        .collect();

    let mut touched = false;
    for update in updates {
        let applied = match update.leaf {
            DocumentLeaf::Paragraph(n) => match non_empty.get(n - 1) {
                Some(&i) => story
                    .elements_mut()
                    .filter(|e| e.is("p"))
                    .nth(i)
                    .is_some_and(|p| replace_text(&mut [p], update.text)),
                None => false,
            },
            DocumentLeaf::TableCell { table, cell } => {
                rewrite_cell(story, table, cell, update.text)
            }
        };
        if applied {
            touched = true;
            report.record_applied();
        } else {
            report.record_skipped(update.key);
        }
    }
    touched
}

fn rewrite_cell(story: &mut Element, table: usize, cell: TableCell, text: &str) -> bool {
    let Some(tc) = story
        .elements_mut()
        .filter(|e| e.is("tbl"))
        .nth(table - 1)
        .and_then(|tbl| tbl.elements_mut().filter(|e| e.is("tr")).nth(cell.row - 1))
        .and_then(|tr| tr.elements_mut().filter(|e| e.is("tc")).nth(cell.column - 1))
    else {
        return false;
    };

    if tc.child("p").is_none() {
        let paragraph = Element::new(&tc.qualified("p"));
        tc.push(paragraph);
    }
    let mut paragraphs: Vec<&mut Element> = tc.elements_mut().filter(|e| e.is("p")).collect();
    replace_text(&mut paragraphs, text)
}
