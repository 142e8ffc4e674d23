//! WordprocessingML runs: reading and replacing paragraph text.
//!
//! A paragraph's text lives in `w:r` runs, either directly under `w:p` or
//! inside inline wrappers such as hyperlinks and content controls. Inside a
//! run, `w:t` holds text, `w:tab` is a tab and `w:br`/`w:cr` are line
//! breaks. Page and column breaks (`w:br` with a `w:type`) are layout, not
//! text, and are left where they are. Text boxes anchored in a run (`w:drawing`, `w:pict`) belong to
//! other stories and are never read here.

use xlate_core::xml::Node;
use xlate_core::Element;

/// Inline elements whose runs are part of the paragraph text.
const RUN_CONTAINERS: &[&str] = &[
    "hyperlink",
    "ins",
    "smartTag",
    "fldSimple",
    "customXml",
    "sdt",
    "sdtContent",
];

/// Run children that carry text.
const TEXT_CHILDREN: &[&str] = &["t", "tab", "br", "cr"];

fn is_text_child(el: &Element) -> bool {
    if el.is("br") {
        return is_line_break(el);
    }
    TEXT_CHILDREN.iter().any(|name| el.is(name))
}

/// A `w:br` that breaks the line rather than the page or column.
fn is_line_break(br: &Element) -> bool {
    matches!(br.attr_local("type").as_deref(), None | Some("textWrapping"))
}

fn collect_runs<'a>(el: &'a Element, out: &mut Vec<&'a Element>) {
    for child in el.elements() {
        if child.is("r") {
            out.push(child);
        } else if RUN_CONTAINERS.iter().any(|name| child.is(name)) {
            collect_runs(child, out);
        }
    }
}

fn collect_runs_mut<'a>(el: &'a mut Element, out: &mut Vec<&'a mut Element>) {
    for child in el.elements_mut() {
        if child.is("r") {
            out.push(child);
        } else if RUN_CONTAINERS.iter().any(|name| child.is(name)) {
            collect_runs_mut(child, out);
        }
    }
}

/// Visible text of one run.
pub fn run_text(run: &Element) -> String {
    let mut text = String::new();
    for child in run.elements() {
        if child.is("t") {
            text.push_str(&child.text());
        } else if child.is("tab") {
            text.push('\t');
        } else if (child.is("br") && is_line_break(child)) || child.is("cr") {
            text.push('\n');
        }
    }
    text
}

/// Visible text of a paragraph: its runs concatenated.
pub fn paragraph_text(paragraph: &Element) -> String {
    let mut runs = Vec::new();
    collect_runs(paragraph, &mut runs);
    runs.into_iter().map(run_text).collect()
}

/// Replace the text spanned by `paragraphs`.
///
/// The first run holding text (or the first run, if none holds text)
/// receives the whole value; text is removed from every other run, which
/// keeps its `w:rPr`. Without any run, a bare `w:r` is appended to the
/// first paragraph. Returns `false` only when `paragraphs` is empty.
pub fn replace_text(paragraphs: &mut [&mut Element], text: &str) -> bool {
    let target = {
        let mut runs = Vec::new();
        for paragraph in paragraphs.iter() {
            collect_runs(paragraph, &mut runs);
        }
        runs.iter()
            .position(|run| run.elements().any(is_text_child))
            .or(if runs.is_empty() { None } else { Some(0) })
    };

    let Some(target) = target else {
        let Some(paragraph) = paragraphs.first_mut() else {
            return false;
        };
        let mut run = Element::new(&paragraph.qualified("r"));
        write_run_text(&mut run, text);
        paragraph.push(run);
        return true;
    };

    let mut index = 0;
    for paragraph in paragraphs.iter_mut() {
        let mut runs = Vec::new();
        collect_runs_mut(paragraph, &mut runs);
        for run in runs {
            if index == target {
                write_run_text(run, text);
            } else {
                run.retain_elements(|e| !is_text_child(e));
            }
            index += 1;
        }
    }
    true
}

/// Replace a run's text children with `text`, spelled as `w:t` segments
/// separated by `w:tab` and `w:br`. The new content takes the place of the
/// first old text child.
fn write_run_text(run: &mut Element, text: &str) {
    let position = run
        .children()
        .iter()
        .position(|n| matches!(n, Node::Element(e) if is_text_child(e)));
    run.retain_elements(|e| !is_text_child(e));

    let mut content = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            content.push(Node::Element(Element::new(&run.qualified("br"))));
        }
        for (j, segment) in line.split('\t').enumerate() {
            if j > 0 {
                content.push(Node::Element(Element::new(&run.qualified("tab"))));
            }
            if !segment.is_empty() {
                content.push(Node::Element(text_element(run, segment)));
            }
        }
    }
    if content.is_empty() {
        content.push(Node::Element(text_element(run, "")));
    }

    let children = run.children_mut();
    let position = position.unwrap_or(children.len()).min(children.len());
    for (offset, node) in content.into_iter().enumerate() {
        children.insert(position + offset, node);
    }
}

fn text_element(run: &Element, text: &str) -> Element {
    let mut t = Element::new(&run.qualified("t"));
    if text.trim() != text {
        t.set_attr("xml:space", "preserve");
    }
    t.set_text(text);
    t
}
