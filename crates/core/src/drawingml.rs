//! DrawingML text bodies, shared by slide shapes, slide table cells and
//! spreadsheet drawing shapes.
//!
//! A text body (`p:txBody`, `xdr:txBody`, `a:txBody`) holds `a:p`
//! paragraphs made of runs (`a:r`, `a:fld`) whose text sits in `a:t`, with
//! `a:br` line breaks between them.

use crate::xml::{Element, Node};

/// Elements that may follow the runs of a paragraph.
const PARAGRAPH_TAIL: &[&str] = &["endParaRPr"];

/// Visible text of a text body: runs concatenated per paragraph, line
/// breaks as `\n`, paragraphs joined with `\n`.
pub fn text_body_text(body: &Element) -> String {
    body.elements_named("p")
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn paragraph_text(paragraph: &Element) -> String {
    let mut text = String::new();
    for child in paragraph.elements() {
        if is_run(child) {
            if let Some(t) = child.child("t") {
                text.push_str(&t.text());
            }
        } else if child.is("br") {
            text.push('\n');
        }
    }
    text
}

fn is_run(el: &Element) -> bool {
    el.is("r") || el.is("fld")
}

/// Replace the visible text of a text body.
///
/// The first run in document order receives the whole text; every other
/// run is emptied and existing line breaks are dropped, so each run keeps
/// its `a:rPr`. Newlines in `text` become `a:br` elements, each followed by
/// a run carrying the first run's properties. Without any run, a bare `a:r`
/// is added to the first paragraph (creating the paragraph if needed).
pub fn set_text_body_text(body: &mut Element, text: &str) {
    let mut seen_first = false;
    for paragraph in body.elements_mut().filter(|e| e.is("p")) {
        paragraph.retain_elements(|e| !e.is("br"));
        let mut target = None;
        for (i, child) in paragraph.children_mut().iter_mut().enumerate() {
            let Node::Element(run) = child else { continue };
            if !is_run(run) {
                continue;
            }
            if seen_first {
                set_run_text(run, "");
            } else {
                seen_first = true;
                target = Some(i);
            }
        }
        if let Some(index) = target {
            write_lines(paragraph, index, text);
        }
    }
    if seen_first {
        return;
    }

    if body.child("p").is_none() {
        let paragraph = Element::new(&drawing_name(body, "p"));
        body.push(paragraph);
    }
    if let Some(paragraph) = body.child_mut("p") {
        let run = Element::new(&paragraph.qualified("r"));
        paragraph.insert_before(run, PARAGRAPH_TAIL);
        let index = paragraph
            .children()
            .iter()
            .position(|n| matches!(n, Node::Element(e) if is_run(e)));
        if let Some(index) = index {
            write_lines(paragraph, index, text);
        }
    }
}

/// Write the first line of `text` into the run at child `index` and each
/// further line into a new run after an `a:br`.
fn write_lines(paragraph: &mut Element, index: usize, text: &str) {
    let mut lines = text.split('\n');
    let Some(Node::Element(run)) = paragraph.children_mut().get_mut(index) else {
        return;
    };
    set_run_text(run, lines.next().unwrap_or_default());

    let props = run.child("rPr").cloned();
    let mut continuation = Vec::new();
    for line in lines {
        let mut br = Element::new(&run.qualified("br"));
        let mut next = Element::new(&run.qualified("r"));
        if let Some(props) = &props {
            br.push(props.clone());
            next.push(props.clone());
        }
        set_run_text(&mut next, line);
        continuation.push(Node::Element(br));
        continuation.push(Node::Element(next));
    }

    let children = paragraph.children_mut();
    for (offset, node) in continuation.into_iter().enumerate() {
        children.insert(index + 1 + offset, node);
    }
}

fn set_run_text(run: &mut Element, text: &str) {
    if run.child("t").is_none() {
        let t = Element::new(&run.qualified("t"));
        run.push(t);
    }
    if let Some(t) = run.child_mut("t") {
        t.set_text(text);
    }
}

/// Elements that only occur in the DrawingML namespace.
const DRAWING_MARKERS: &[&str] = &["bodyPr", "lstStyle", "xfrm", "prstGeom", "custGeom", "tc", "tcPr"];

/// Qualified DrawingML name for a new element under `context`. The context
/// may be in the PresentationML or SpreadsheetDrawing namespace, so the
/// prefix is taken from a DrawingML element inside it when there is one.
fn drawing_name(context: &Element, local: &str) -> String {
    std::iter::once(context)
        .chain(context.descendants())
        .find(|e| DRAWING_MARKERS.iter().any(|m| e.is(m)))
        .map(|e| e.qualified(local))
        .unwrap_or_else(|| format!("a:{}", local))
}

/// A minimal empty text body (`qualified_name` with `bodyPr`, `lstStyle`
/// and one empty paragraph) for a shape or table cell. The DrawingML
/// prefix is taken from `context`.
pub fn empty_text_body(qualified_name: &str, context: &Element) -> Element {
    Element::new(qualified_name)
        .with_child(Element::new(&drawing_name(context, "bodyPr")))
        .with_child(Element::new(&drawing_name(context, "lstStyle")))
        .with_child(Element::new(&drawing_name(context, "p")))
}
