//! The `[Content_Types].xml` manifest
//!
//! Content types are declared either per extension (`Default`) or per part
//! (`Override`). Overrides win.

use crate::error::Result;
use crate::path::{extension, from_part_uri, to_part_uri};
use crate::xml::{escape_attr, XmlDocument, XML_DECLARATION};

/// Archive path of the manifest
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Namespace of the manifest
pub const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Content type of relationship lists
pub const RELATIONSHIPS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-package.relationships+xml";

/// Parsed content-type manifest, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentTypes {
    /// `(extension, content type)`, extension lower-cased without the dot
    defaults: Vec<(String, String)>,
    /// `(part name, content type)`, part name in archive form
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manifest with the two defaults every package needs
    pub fn with_standard_defaults() -> Self {
        let mut types = Self::new();
        types.ensure_default("rels", RELATIONSHIPS_CONTENT_TYPE);
        types.ensure_default("xml", "application/xml");
        types
    }

    /// Parse the manifest
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let doc = XmlDocument::parse(CONTENT_TYPES_PART, xml)?;
        let mut types = Self::new();

        for el in doc.root.elements() {
            let content_type = match el.attr("ContentType") {
                Some(ct) => ct.to_string(),
                None => continue,
            };
            if el.is("Default") {
                if let Some(ext) = el.attr("Extension") {
                    types.defaults.push((ext.to_ascii_lowercase(), content_type));
                }
            } else if el.is("Override") {
                if let Some(name) = el.attr("PartName") {
                    types.overrides.push((from_part_uri(name), content_type));
                }
            }
        }

        Ok(types)
    }

    /// Serialize to OOXML format
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push_str("\r\n");
        xml.push_str(&format!(r#"<Types xmlns="{}">"#, CONTENT_TYPES_NS));
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape_attr(ext),
                escape_attr(ct)
            ));
        }
        for (part, ct) in &self.overrides {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape_attr(&to_part_uri(part)),
                escape_attr(ct)
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    /// Resolved content type of a part
    pub fn content_type_for(&self, part: &str) -> Option<&str> {
        self.override_for(part)
            .or_else(|| extension(part).and_then(|ext| self.default_for(&ext)))
    }

    pub fn override_for(&self, part: &str) -> Option<&str> {
        self.overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(part))
            .map(|(_, ct)| ct.as_str())
    }

    pub fn default_for(&self, ext: &str) -> Option<&str> {
        self.defaults
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, ct)| ct.as_str())
    }

    /// Declare a part's content type; a matching extension default makes the override unnecessary
    pub fn register(&mut self, part: &str, content_type: &str) {
        let by_default = extension(part).and_then(|ext| self.default_for(&ext).map(str::to_string));
        if by_default.as_deref() == Some(content_type) {
            self.remove_override(part);
        } else {
            self.set_override(part, content_type);
        }
    }

    pub fn set_override(&mut self, part: &str, content_type: &str) {
        match self
            .overrides
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(part))
        {
            Some((_, ct)) => *ct = content_type.to_string(),
            None => self
                .overrides
                .push((part.to_string(), content_type.to_string())),
        }
    }

    pub fn remove_override(&mut self, part: &str) -> bool {
        let before = self.overrides.len();
        self.overrides.retain(|(name, _)| !name.eq_ignore_ascii_case(part));
        before != self.overrides.len()
    }

    /// Add an extension default unless one is already declared
    pub fn ensure_default(&mut self, ext: &str, content_type: &str) {
        if self.default_for(ext).is_none() {
            self.defaults
                .push((ext.to_ascii_lowercase(), content_type.to_string()));
        }
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defaults.iter().map(|(e, c)| (e.as_str(), c.as_str()))
    }

    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }
}
