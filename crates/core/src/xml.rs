//! A small owned XML tree that round-trips part bytes.
//!
//! Start tags and text are kept exactly as they were read (still escaped),
//! so serializing an untouched tree reproduces the original markup. Only
//! elements that were edited are re-rendered.

use crate::error::{Error, Result};
use quick_xml::events::{BytesCData, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A node of the tree.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(BytesText<'static>),
    CData(BytesCData<'static>),
    /// Declarations, comments, processing instructions, doctypes.
    Other(Event<'static>),
}

/// An element with its original start tag and its children.
#[derive(Debug, Clone)]
pub struct Element {
    start: BytesStart<'static>,
    children: Vec<Node>,
    self_closing: bool,
}

/// A parsed XML part.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<Node>,
    bom: bool,
}

impl XmlDocument {
    /// Parse part bytes. A UTF-8 byte-order mark is remembered and written
    /// back by [`to_bytes`](Self::to_bytes).
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (bom, bytes) = match bytes.strip_prefix(UTF8_BOM) {
            Some(rest) => (true, rest),
            None => (false, bytes),
        };
        let xml = std::str::from_utf8(bytes)
            .map_err(|e| Error::XmlError(format!("Part is not valid UTF-8: {}", e)))?;
        let mut doc = Self::parse_str(xml)?;
        doc.bom = bom;
        Ok(doc)
    }

    /// Parse an XML string.
    pub fn parse_str(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut nodes = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::XmlError(format!("at byte {}: {}", reader.buffer_position(), e))
            })?;

            match event {
                Event::Start(e) => stack.push(Element::from_start(e.into_owned(), false)),
                Event::Empty(e) => {
                    let element = Element::from_start(e.into_owned(), true);
                    attach(&mut stack, &mut nodes, Node::Element(element));
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::XmlError("Unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut nodes, Node::Element(element));
                }
                Event::Text(e) => attach(&mut stack, &mut nodes, Node::Text(e.into_owned())),
                Event::CData(e) => attach(&mut stack, &mut nodes, Node::CData(e.into_owned())),
                Event::Eof => break,
                other => attach(&mut stack, &mut nodes, Node::Other(other.into_owned())),
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::XmlError(format!(
                "Unclosed element <{}>",
                String::from_utf8_lossy(open.name())
            )));
        }

        Ok(Self { nodes, bom: false })
    }

    /// The document element.
    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// The document element, mutably.
    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Serialize back to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.bom {
            out.extend_from_slice(UTF8_BOM);
        }
        let mut writer = Writer::new(out);
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        Ok(writer.into_inner())
    }
}

fn attach(stack: &mut [Element], nodes: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => nodes.push(node),
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    let written = match node {
        Node::Element(element) => return element.write(writer),
        Node::Text(text) => writer.write_event(Event::Text(text.clone())),
        Node::CData(data) => writer.write_event(Event::CData(data.clone())),
        Node::Other(event) => writer.write_event(event.clone()),
    };
    written.map_err(write_error)
}

fn write_error(e: impl std::fmt::Display) -> Error {
    Error::XmlError(format!("Failed to write XML: {}", e))
}

impl Element {
    /// Create an empty element with a qualified name such as `a:r`.
    pub fn new(name: &str) -> Self {
        Self::from_start(BytesStart::new(name.to_string()), true)
    }

    fn from_start(start: BytesStart<'static>, self_closing: bool) -> Self {
        Self {
            start,
            children: Vec::new(),
            self_closing,
        }
    }

    /// Builder form of [`Element::set_attr`].
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder form of [`Element::push`].
    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    /// Qualified name as written, e.g. `p:sp`.
    pub fn name(&self) -> &[u8] {
        self.start.name().into_inner()
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &[u8] {
        self.start.local_name().into_inner()
    }

    /// Whether the local name equals `local`.
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local.as_bytes()
    }

    /// Qualified name for a sibling vocabulary element, reusing this
    /// element's prefix: `a:p` gives `a:r` for `"r"`.
    pub fn qualified(&self, local: &str) -> String {
        match self.start.name().prefix() {
            Some(prefix) => format!(
                "{}:{}",
                String::from_utf8_lossy(prefix.into_inner()),
                local
            ),
            None => local.to_string(),
        }
    }

    /// Attribute value by exact qualified name, unescaped.
    pub fn attr(&self, key: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|a| a.key.as_ref() == key.as_bytes())
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
    }

    /// Attribute value matched on the local part of its name, for
    /// attributes like `r:id` whose prefix varies between producers.
    pub fn attr_local(&self, local: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|a| a.key.local_name().as_ref() == local.as_bytes())
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
    }

    /// Value of a namespaced attribute by local name, ignoring unprefixed
    /// ones: on `<p:sldId id="256" r:id="rId2"/>`, `"id"` gives `rId2`.
    pub fn prefixed_attr(&self, local: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == local.as_bytes())
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
    }

    /// Set or replace an attribute. Other attributes keep their order.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        let mut rebuilt = BytesStart::new(String::from_utf8_lossy(self.name()).into_owned());
        let mut replaced = false;
        for attr in self.start.attributes().flatten() {
            if attr.key.as_ref() == key.as_bytes() {
                rebuilt.push_attribute((key, value));
                replaced = true;
            } else {
                rebuilt.push_attribute(attr);
            }
        }
        if !replaced {
            rebuilt.push_attribute((key, value));
        }
        self.start = rebuilt;
    }

    /// Remove an attribute if present.
    pub fn remove_attr(&mut self, key: &str) {
        if self.attr(key).is_none() {
            return;
        }
        let mut rebuilt = BytesStart::new(String::from_utf8_lossy(self.name()).into_owned());
        for attr in self.start.attributes().flatten() {
            if attr.key.as_ref() != key.as_bytes() {
                rebuilt.push_attribute(attr);
            }
        }
        self.start = rebuilt;
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    /// Child elements in order.
    pub fn elements(&self) -> impl DoubleEndedIterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Child elements in order, mutably.
    pub fn elements_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Child elements with the given local name.
    pub fn elements_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.is(local))
    }

    /// First child element with the given local name.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(local))
    }

    /// First child element with the given local name, mutably.
    pub fn child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.is(local))
    }

    /// Follow a chain of child local names.
    pub fn find_path(&self, path: &[&str]) -> Option<&Element> {
        path.iter().try_fold(self, |el, local| el.child(local))
    }

    /// Follow a chain of child local names, mutably.
    pub fn find_path_mut(&mut self, path: &[&str]) -> Option<&mut Element> {
        let mut current = self;
        for local in path {
            current = current.child_mut(local)?;
        }
        Some(current)
    }

    /// All descendant elements in document (pre-)order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.elements().rev().collect(),
        }
    }

    /// Concatenated text of the direct text children, unescaped.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) => match t.unescape() {
                    Ok(s) => out.push_str(&s),
                    Err(_) => out.push_str(&String::from_utf8_lossy(t)),
                },
                Node::CData(c) => out.push_str(&String::from_utf8_lossy(c)),
                _ => {}
            }
        }
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        if !text.is_empty() {
            self.children
                .push(Node::Text(BytesText::new(text).into_owned()));
        }
    }

    /// Append a child element.
    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Insert a child element before the first child whose local name is in
    /// `before`, or append it when none matches.
    pub fn insert_before(&mut self, child: Element, before: &[&str]) {
        let pos = self.children.iter().position(|n| match n {
            Node::Element(e) => before.iter().any(|b| e.is(b)),
            _ => false,
        });
        match pos {
            Some(pos) => self.children.insert(pos, Node::Element(child)),
            None => self.children.push(Node::Element(child)),
        }
    }

    /// Keep only the child elements for which `keep` returns true.
    /// Non-element children are untouched.
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&Element) -> bool) {
        self.children.retain(|n| match n {
            Node::Element(e) => keep(e),
            _ => true,
        });
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        if self.children.is_empty() && self.self_closing {
            writer
                .write_event(Event::Empty(self.start.clone()))
                .map_err(write_error)?;
            return Ok(());
        }
        writer
            .write_event(Event::Start(self.start.clone()))
            .map_err(write_error)?;
        for child in &self.children {
            write_node(writer, child)?;
        }
        writer
            .write_event(Event::End(self.start.to_end()))
            .map_err(write_error)?;
        Ok(())
    }
}

/// Pre-order iterator over descendant elements.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        let element = self.stack.pop()?;
        self.stack.extend(element.elements().rev());
        Some(element)
    }
}
