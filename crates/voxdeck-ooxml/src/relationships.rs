//! Relationship lists (`_rels/*.rels`)
//!
//! Every part that references another part (or an external URI) does so
//! through a sibling relationship list mapping ids like `rId3` to targets.
//!
//! # Example
//!
//! ```
//! use voxdeck_ooxml::relationships::{Relationships, TargetMode};
//!
//! let mut rels = Relationships::new();
//! let id = rels.add(
//!     "../media/media1.m4a",
//!     Relationships::TYPE_AUDIO,
//!     TargetMode::Internal,
//! );
//! assert_eq!(id, "rId1");
//! assert!(rels.to_xml().contains("media1.m4a"));
//! ```

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{PackageError, Result};
use crate::xml::{escape_attr, XML_DECLARATION};

/// OOXML namespace for relationships
pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Common relationship type URIs
impl Relationships {
    /// Package root to main document
    pub const TYPE_OFFICE_DOCUMENT: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    /// Hyperlink relationship type
    pub const TYPE_HYPERLINK: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
    /// Image relationship type
    pub const TYPE_IMAGE: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    /// Audio relationship type
    pub const TYPE_AUDIO: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/audio";
    /// Video relationship type
    pub const TYPE_VIDEO: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/video";
    /// Office 2010 media relationship type
    pub const TYPE_MEDIA: &'static str =
        "http://schemas.microsoft.com/office/2007/relationships/media";
    /// Theme relationship type
    pub const TYPE_THEME: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
}

/// Whether a relationship target is a part or an opaque URI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    #[default]
    Internal,
    External,
}

impl TargetMode {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("External") => Self::External,
            _ => Self::Internal,
        }
    }
}

/// Parsed relationships from a .rels file
///
/// Maintains insertion order for deterministic XML serialization.
#[derive(Debug, Clone)]
pub struct Relationships {
    /// Ordered list of relationship IDs (maintains insertion order)
    order: Vec<String>,
    /// Map of relationship ID to target (for fast lookups)
    map: HashMap<String, Relationship>,
    /// Counter for generating unique IDs; never moves backwards, so retired ids stay retired
    next_id_counter: u32,
}

impl Default for Relationships {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            map: HashMap::new(),
            next_id_counter: 1, // IDs start at rId1
        }
    }
}

/// A relationship with its type and mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// The target URI or part path, relative to the source part
    pub target: String,
    /// The relationship type URI
    pub rel_type: String,
    pub mode: TargetMode,
}

impl Relationship {
    pub fn new(target: impl Into<String>, rel_type: impl Into<String>, mode: TargetMode) -> Self {
        Self {
            target: target.into(),
            rel_type: rel_type.into(),
            mode,
        }
    }

    pub fn is_external(&self) -> bool {
        self.mode == TargetMode::External
    }
}

impl Relationships {
    /// Create an empty relationships map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse relationships from XML bytes; `source` only labels errors
    pub fn parse(source: &str, xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut rels = Self::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    if e.local_name().as_ref() == b"Relationship" {
                        let mut id = None;
                        let mut target = None;
                        let mut rel_type = None;
                        let mut target_mode = None;

                        for attr in e.attributes().filter_map(|a| a.ok()) {
                            let value = attr
                                .unescape_value()
                                .map_err(|err| PackageError::malformed(source, err))?
                                .into_owned();
                            match attr.key.as_ref() {
                                b"Id" => id = Some(value),
                                b"Target" => target = Some(value),
                                b"Type" => rel_type = Some(value),
                                b"TargetMode" => target_mode = Some(value),
                                _ => {}
                            }
                        }

                        match (id, target) {
                            (Some(id), Some(target)) => rels.insert(
                                id,
                                Relationship {
                                    target,
                                    rel_type: rel_type.unwrap_or_default(),
                                    mode: TargetMode::parse(target_mode.as_deref()),
                                },
                            ),
                            _ => {
                                return Err(PackageError::malformed(
                                    source,
                                    "relationship without Id or Target",
                                ))
                            }
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(PackageError::malformed(source, e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Add a new relationship and return the generated ID
    pub fn add(
        &mut self,
        target: impl Into<String>,
        rel_type: impl Into<String>,
        mode: TargetMode,
    ) -> String {
        let id = self.next_free_id();
        self.insert(id.clone(), Relationship::new(target, rel_type, mode));
        id
    }

    fn next_free_id(&self) -> String {
        let id = format!("rId{}", self.next_id_counter);
        if !self.map.contains_key(&id) {
            return id;
        }
        // The counter only stalls at u32::MAX; take the lowest unused number instead
        (1..=u32::MAX)
            .map(|n| format!("rId{n}"))
            .find(|candidate| !self.map.contains_key(candidate))
            .unwrap_or(id)
    }

    /// Insert a relationship under an explicit id, replacing any previous one
    ///
    /// Used when copying parts so that `r:id` references inside the part body stay valid.
    pub fn insert(&mut self, id: String, rel: Relationship) {
        if let Some(num) = extract_id_number(&id) {
            self.next_id_counter = self.next_id_counter.max(num.saturating_add(1));
        }
        if self.map.insert(id.clone(), rel).is_none() {
            self.order.push(id);
        }
    }

    /// Remove a relationship; its id is not handed out again
    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let rel = self.map.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(rel)
    }

    /// Serialize relationships to OOXML format
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push_str("\r\n");
        xml.push_str(&format!(r#"<Relationships xmlns="{}">"#, RELATIONSHIPS_NS));

        // Iterate in insertion order for deterministic output
        for (id, rel) in self.iter() {
            xml.push_str("<Relationship");
            xml.push_str(&format!(r#" Id="{}""#, escape_attr(id)));
            xml.push_str(&format!(r#" Type="{}""#, escape_attr(&rel.rel_type)));
            xml.push_str(&format!(r#" Target="{}""#, escape_attr(&rel.target)));
            if rel.is_external() {
                xml.push_str(r#" TargetMode="External""#);
            }
            xml.push_str("/>");
        }

        xml.push_str("</Relationships>");
        xml
    }

    /// Get the target for a relationship ID
    pub fn get(&self, id: &str) -> Option<&str> {
        self.map.get(id).map(|r| r.target.as_str())
    }

    /// Get the full relationship for an ID
    pub fn get_relationship(&self, id: &str) -> Option<&Relationship> {
        self.map.get(id)
    }

    /// Check if a relationship ID exists
    pub fn contains(&self, id: &str) -> bool {
        self.map.contains_key(id)
    }

    /// Ids of every relationship with the given type, in order
    pub fn ids_of_type<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a str> {
        self.iter()
            .filter(move |(_, rel)| rel.rel_type == rel_type)
            .map(|(id, _)| id)
    }

    /// First relationship of the given type
    pub fn first_of_type(&self, rel_type: &str) -> Option<(&str, &Relationship)> {
        self.iter().find(|(_, rel)| rel.rel_type == rel_type)
    }

    /// Get the number of relationships
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if there are no relationships
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over relationships in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Relationship)> {
        self.order
            .iter()
            .filter_map(|id| self.map.get(id).map(|rel| (id.as_str(), rel)))
    }

    /// Get the next ID that would be generated (without incrementing)
    pub fn peek_next_id(&self) -> String {
        format!("rId{}", self.next_id_counter)
    }
}

/// Extract the numeric portion from a relationship ID (e.g., "rId5" -> 5)
fn extract_id_number(id: &str) -> Option<u32> {
    id.strip_prefix("rId")
        .or_else(|| id.strip_prefix("RId"))
        .or_else(|| id.strip_prefix("rid"))
        .and_then(|num_str| num_str.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE_RELS: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
        <Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
            <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout2.xml"/>
            <Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
            <Relationship Id="rId2" Type="http://schemas.microsoft.com/office/2007/relationships/media" Target="../media/media1.m4a"/>
        </Relationships>"#;

    #[test]
    fn test_parse_relationships() {
        let rels = Relationships::parse("slide1.xml.rels", SLIDE_RELS).unwrap();

        assert_eq!(rels.len(), 3);
        assert_eq!(rels.get("rId1"), Some("../slideLayouts/slideLayout2.xml"));
        let link = rels.get_relationship("rId4").unwrap();
        assert!(link.is_external());
        assert_eq!(rels.get_relationship("rId2").unwrap().mode, TargetMode::Internal);
        assert_eq!(rels.peek_next_id(), "rId5");
    }

    #[test]
    fn test_empty_relationships() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
        <Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
        </Relationships>"#;

        let rels = Relationships::parse("x.rels", xml).unwrap();
        assert!(rels.get("rId1").is_none());
        assert!(rels.is_empty());
    }

    #[test]
    fn test_relationship_without_target_is_malformed() {
        let xml = br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="t"/></Relationships>"#;
        let err = Relationships::parse("bad.rels", xml).unwrap_err();
        assert!(matches!(err, PackageError::MalformedPart { .. }));
    }

    #[test]
    fn test_add_continues_from_max() {
        let mut rels = Relationships::parse("slide1.xml.rels", SLIDE_RELS).unwrap();
        let id = rels.add("../media/image1.png", Relationships::TYPE_IMAGE, TargetMode::Internal);
        assert_eq!(id, "rId5");
    }

    #[test]
    fn test_removed_ids_are_not_reused() {
        let mut rels = Relationships::parse("slide1.xml.rels", SLIDE_RELS).unwrap();
        let removed = rels.remove("rId4").unwrap();
        assert_eq!(removed.target, "https://example.com");
        assert!(rels.remove("rId4").is_none());
        assert_eq!(rels.len(), 2);

        let id = rels.add("../media/media2.wav", Relationships::TYPE_AUDIO, TargetMode::Internal);
        assert_eq!(id, "rId5");
    }

    #[test]
    fn test_largest_id_does_not_overflow() {
        let mut rels = Relationships::new();
        rels.insert(
            "rId4294967295".to_string(),
            Relationship::new("../media/media1.wav", Relationships::TYPE_AUDIO, TargetMode::Internal),
        );
        assert_eq!(rels.peek_next_id(), "rId4294967295");

        let first = rels.add("../media/image1.png", Relationships::TYPE_IMAGE, TargetMode::Internal);
        let second = rels.add("../media/image2.png", Relationships::TYPE_IMAGE, TargetMode::Internal);
        assert_eq!(first, "rId1");
        assert_eq!(second, "rId2");
        assert_eq!(rels.len(), 3);
        assert_eq!(rels.get("rId4294967295"), Some("../media/media1.wav"));
    }

    #[test]
    fn test_insert_keeps_explicit_id() {
        let mut rels = Relationships::new();
        rels.insert(
            "rId7".to_string(),
            Relationship::new("../slideLayouts/slideLayout1.xml", "layout", TargetMode::Internal),
        );
        assert_eq!(rels.peek_next_id(), "rId8");
        rels.insert(
            "rId7".to_string(),
            Relationship::new("../slideLayouts/slideLayout3.xml", "layout", TargetMode::Internal),
        );
        assert_eq!(rels.len(), 1);
        assert_eq!(rels.get("rId7"), Some("../slideLayouts/slideLayout3.xml"));
    }

    #[test]
    fn test_to_xml_roundtrip() {
        let rels = Relationships::parse("slide1.xml.rels", SLIDE_RELS).unwrap();
        let xml = rels.to_xml();

        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains(&format!(r#"xmlns="{}""#, RELATIONSHIPS_NS)));
        assert!(xml.contains(r#"TargetMode="External""#));

        let reparsed = Relationships::parse("slide1.xml.rels", xml.as_bytes()).unwrap();
        let ids: Vec<&str> = reparsed.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["rId1", "rId4", "rId2"]);
    }

    #[test]
    fn test_xml_escaping_in_serialization() {
        let mut rels = Relationships::new();
        rels.add(
            "https://example.com/?a=1&b=\"2\"",
            Relationships::TYPE_HYPERLINK,
            TargetMode::External,
        );

        let xml = rels.to_xml();
        assert!(xml.contains("&amp;b=&quot;2&quot;"));

        let reparsed = Relationships::parse("x.rels", xml.as_bytes()).unwrap();
        assert_eq!(reparsed.get("rId1"), Some("https://example.com/?a=1&b=\"2\""));
    }

    #[test]
    fn test_type_queries() {
        let rels = Relationships::parse("slide1.xml.rels", SLIDE_RELS).unwrap();
        let media: Vec<&str> = rels.ids_of_type(Relationships::TYPE_MEDIA).collect();
        assert_eq!(media, vec!["rId2"]);
        assert!(rels.first_of_type(Relationships::TYPE_AUDIO).is_none());
    }

    #[test]
    fn test_extract_id_number() {
        assert_eq!(extract_id_number("rId1"), Some(1));
        assert_eq!(extract_id_number("rId123"), Some(123));
        assert_eq!(extract_id_number("RId5"), Some(5));
        assert_eq!(extract_id_number("rid10"), Some(10));
        assert_eq!(extract_id_number("invalid"), None);
        assert_eq!(extract_id_number("rIdabc"), None);
    }
}
