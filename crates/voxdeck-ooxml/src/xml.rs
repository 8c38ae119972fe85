//! Element tree for XML parts
//!
//! Document parts are parsed into a small owned tree so transformations can
//! walk and rewrite shapes and runs with ordinary pattern matching. Qualified
//! names and namespace declarations are kept exactly as written, and text
//! whitespace is never trimmed, so a parsed part re-serializes to equivalent
//! XML.

use std::fmt::Write as _;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{PackageError, Result};

/// Standard declaration emitted for every serialized part
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// A node in the element tree
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data
    Text(String),
    CData(String),
    /// Raw comment content
    Comment(String),
    /// Raw processing-instruction content
    ProcessingInstruction(String),
}

/// An element with its qualified name, ordered attributes and children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// A parsed XML part
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// Whether the source carried an XML declaration
    pub declaration: bool,
    pub root: XmlElement,
}

/// Local part of a qualified name (`a:t` -> `t`)
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

impl XmlDocument {
    /// Create a document with a declaration around `root`
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: true,
            root,
        }
    }

    /// Parse a part; `part` only labels errors
    pub fn parse(part: &str, bytes: &[u8]) -> Result<Self> {
        let malformed = |reason: &dyn std::fmt::Display| PackageError::malformed(part, reason);

        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut declaration = false;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| malformed(&e))?;
            match event {
                Event::Decl(_) => declaration = true,
                Event::Start(ref e) => stack.push(element_from_start(e).map_err(|e| malformed(&e))?),
                Event::Empty(ref e) => {
                    let element = element_from_start(e).map_err(|e| malformed(&e))?;
                    attach(&mut stack, &mut root, element).map_err(|e| malformed(&e))?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| malformed(&"unexpected closing tag"))?;
                    attach(&mut stack, &mut root, element).map_err(|e| malformed(&e))?;
                }
                Event::Text(ref t) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = t.unescape().map_err(|e| malformed(&e))?;
                        parent.children.push(XmlNode::Text(text.into_owned()));
                    }
                }
                Event::CData(t) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Event::Comment(ref t) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(XmlNode::Comment(String::from_utf8_lossy(t).into_owned()));
                    }
                }
                Event::PI(ref t) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::ProcessingInstruction(
                            String::from_utf8_lossy(t).into_owned(),
                        ));
                    }
                }
                Event::DocType(_) => {}
                Event::Eof => break,
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(malformed(&"unclosed element at end of part"));
        }
        let root = root.ok_or_else(|| malformed(&"part has no root element"))?;
        Ok(Self { declaration, root })
    }

    /// Serialize to a string
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        if self.declaration {
            out.push_str(XML_DECLARATION);
            out.push_str("\r\n");
        }
        write_element(&mut out, &self.root);
        out
    }

    /// Serialize to UTF-8 bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_xml_string().into_bytes()
    }
}

fn element_from_start(
    e: &BytesStart<'_>,
) -> std::result::Result<XmlElement, Box<dyn std::error::Error>> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> std::result::Result<(), &'static str> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err("more than one root element"),
    }
}

fn write_element(out: &mut String, element: &XmlElement) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        let _ = write!(out, " {}=\"{}\"", key, escape_attr(value));
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(out, e),
            XmlNode::Text(t) => out.push_str(&escape_text(t)),
            XmlNode::CData(t) => {
                let _ = write!(out, "<![CDATA[{t}]]>");
            }
            XmlNode::Comment(t) => {
                let _ = write!(out, "<!--{t}-->");
            }
            XmlNode::ProcessingInstruction(t) => {
                let _ = write!(out, "<?{t}?>");
            }
        }
    }
    let _ = write!(out, "</{}>", element.name);
}

/// Escape character data
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            c => out.push(c),
        }
    }
    out
}

/// Escape an attribute value
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c => out.push(c),
        }
    }
    out
}

impl XmlElement {
    /// Create an element with no attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: add an attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Builder: add a child element
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder: add a text child
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Whether the element's local name is `local`
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    /// Attribute by qualified name
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute by local name, ignoring its prefix
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local_name(k) == local && !k.starts_with("xmlns"))
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, keeping its position when it already exists
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First child element with the given local name
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.is(local))
    }

    /// Child elements with the given local name
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.is(local))
    }

    /// Follow a path of local names through first matching children
    pub fn path(&self, locals: &[&str]) -> Option<&XmlElement> {
        locals.iter().try_fold(self, |el, local| el.child(local))
    }

    pub fn path_mut(&mut self, locals: &[&str]) -> Option<&mut XmlElement> {
        let mut current = self;
        for local in locals {
            current = current.child_mut(local)?;
        }
        Some(current)
    }

    /// First descendant (excluding self) with the given local name, depth-first
    pub fn find(&self, local: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.is(local) {
                return Some(child);
            }
            if let Some(found) = child.find(local) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants (excluding self) with the given local name, depth-first
    pub fn find_all<'a>(&'a self, local: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.walk(&mut |e| {
            if e.is(local) {
                found.push(e);
            }
        });
        found
    }

    /// Visit every descendant element (excluding self) in document order
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a XmlElement)) {
        for child in self.elements() {
            f(child);
            child.walk(f);
        }
    }

    /// Visit self and every descendant element, parents before children
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut XmlElement)) {
        f(self);
        for child in self.elements_mut() {
            child.walk_mut(f);
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![XmlNode::Text(text.into())];
    }

    /// Keep only child elements for which `keep` returns true; other nodes are untouched
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&XmlElement) -> bool) -> usize {
        let before = self.children.len();
        self.children.retain(|node| match node {
            XmlNode::Element(e) => keep(e),
            _ => true,
        });
        before - self.children.len()
    }

    /// Remove descendant elements (at any depth) matching `remove`; returns the number removed
    pub fn remove_descendants(&mut self, remove: &mut impl FnMut(&XmlElement) -> bool) -> usize {
        let mut removed = self.retain_elements(|e| !remove(e));
        for child in self.elements_mut() {
            removed += child.remove_descendants(remove);
        }
        removed
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Whether the element has no child elements and no non-whitespace text
    pub fn is_blank(&self) -> bool {
        self.children.iter().all(|node| match node {
            XmlNode::Text(t) => t.trim().is_empty(),
            XmlNode::Comment(_) => true,
            _ => false,
        })
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
            XmlNode::Element(e) => collect_text(e, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:rPr lang="en-US" b="1"/><a:t>Fish &amp; Chips</a:t></a:r><a:r><a:t> </a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_parse_keeps_names_and_whitespace() {
        let doc = XmlDocument::parse("slide1.xml", SLIDE.as_bytes()).unwrap();
        assert!(doc.declaration);
        assert_eq!(doc.root.name, "p:sld");
        assert!(doc.root.attr("xmlns:a").is_some());

        let runs = doc.root.find_all("r");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].child("t").unwrap().text(), "Fish & Chips");
        assert_eq!(runs[1].child("t").unwrap().text(), " ");
        assert_eq!(runs[0].child("rPr").unwrap().attr("b"), Some("1"));
    }

    #[test]
    fn test_reserialize_is_equivalent() {
        let doc = XmlDocument::parse("slide1.xml", SLIDE.as_bytes()).unwrap();
        let bytes = doc.to_bytes();
        let again = XmlDocument::parse("slide1.xml", &bytes).unwrap();
        assert_eq!(doc, again);
        assert!(String::from_utf8(bytes).unwrap().contains("Fish &amp; Chips"));
    }

    #[test]
    fn test_attribute_escaping() {
        let el = XmlElement::new("a:hlinkClick").with_attr("tooltip", "a \"quote\" & <tag>\n");
        let doc = XmlDocument::new(el);
        let xml = doc.to_xml_string();
        assert!(xml.contains("&quot;quote&quot; &amp; &lt;tag&gt;&#10;"));
        let back = XmlDocument::parse("x", xml.as_bytes()).unwrap();
        assert_eq!(back.root.attr("tooltip"), Some("a \"quote\" & <tag>\n"));
    }

    #[test]
    fn test_malformed_part_is_reported() {
        let err = XmlDocument::parse("ppt/slides/slide3.xml", b"<p:sld><p:cSld></p:sld>").unwrap_err();
        match err {
            PackageError::MalformedPart { part, .. } => assert_eq!(part, "ppt/slides/slide3.xml"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(XmlDocument::parse("empty.xml", b"").is_err());
    }

    #[test]
    fn test_path_and_attr_local() {
        let doc = XmlDocument::parse(
            "p.xml",
            br#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#,
        )
        .unwrap();
        let sld = doc.root.path(&["sldIdLst", "sldId"]).unwrap();
        assert_eq!(sld.attr("id"), Some("256"));
        assert_eq!(sld.attr_local("id"), Some("256"));
        assert_eq!(sld.attr("r:id"), Some("rId2"));
        assert!(doc.root.path(&["sldIdLst", "nothing"]).is_none());
    }

    #[test]
    fn test_remove_descendants_and_walk_mut() {
        let mut doc = XmlDocument::parse("slide1.xml", SLIDE.as_bytes()).unwrap();
        let removed = doc.root.remove_descendants(&mut |e| e.is("rPr"));
        assert_eq!(removed, 1);
        assert!(doc.root.find("rPr").is_none());

        let mut count = 0;
        doc.root.walk_mut(&mut |e| {
            if e.is("t") {
                e.set_text("x");
                count += 1;
            }
        });
        assert_eq!(count, 2);
        assert_eq!(doc.root.text(), "xx");
    }

    #[test]
    fn test_set_and_remove_attr() {
        let mut el = XmlElement::new("a:latin").with_attr("typeface", "Arial");
        el.set_attr("typeface", "Calibri");
        el.set_attr("pitchFamily", "34");
        assert_eq!(el.attributes[0], ("typeface".into(), "Calibri".into()));
        assert_eq!(el.remove_attr("pitchFamily").as_deref(), Some("34"));
        assert_eq!(el.remove_attr("pitchFamily"), None);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("p14:sectionLst"), "sectionLst");
        assert_eq!(local_name("Relationship"), "Relationship");
    }
}
