//! Slide views over a presentation package
//!
//! Slides are never stored on their own; [`SlideRef`]s are computed on demand
//! from the presentation's slide-id list and the relationship lists.

use std::collections::BTreeSet;

use serde::Serialize;
use voxdeck_ooxml::{Package, PackageError, XmlDocument, XmlElement};

use crate::constants::{
    DEFAULT_SLIDE_HEIGHT_EMU, DEFAULT_SLIDE_WIDTH_EMU, REL_TYPE_NOTES_MASTER,
    REL_TYPE_NOTES_SLIDE, REL_TYPE_SLIDE_LAYOUT,
};
use crate::error::{DeckError, Result};
use crate::text::{body_text, sanitize_text};

/// Longest text of a non-title shape still accepted as a slide title
const MAX_FALLBACK_TITLE_CHARS: usize = 100;

/// One slide, located in the package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideRef {
    /// 1-based position in presentation order
    pub number: usize,
    /// Stable slide id (`p:sldId/@id`)
    pub id: u32,
    /// Relationship id from the presentation part
    pub rel_id: String,
    pub part: String,
    pub layout: Option<String>,
    pub notes: Option<String>,
}

/// Every slide of the deck in presentation order
pub fn slides(package: &Package) -> Result<Vec<SlideRef>> {
    let presentation = package.main_document()?;
    let doc = package.read_xml(&presentation)?;

    let Some(list) = doc.root.child("sldIdLst") else {
        return Ok(Vec::new());
    };

    let mut slides = Vec::new();
    for (index, entry) in list.children_named("sldId").enumerate() {
        let id = entry
            .attr("id")
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| PackageError::malformed(&presentation, "sldId without a numeric id"))?;
        let rel_id = rel_id_of(entry)
            .ok_or_else(|| PackageError::malformed(&presentation, "sldId without r:id"))?;

        let part = package
            .target_of(&presentation, &rel_id)
            .filter(|part| package.contains(part))
            .ok_or_else(|| {
                PackageError::dangling(
                    &presentation,
                    &rel_id,
                    package.target_of(&presentation, &rel_id).unwrap_or_default(),
                )
            })?;

        let related = |rel_type: &str| {
            package
                .relationships(&part)
                .and_then(|rels| rels.first_of_type(rel_type))
                .and_then(|(rid, _)| package.target_of(&part, rid))
                .filter(|target| package.contains(target))
        };

        slides.push(SlideRef {
            number: index + 1,
            id,
            layout: related(REL_TYPE_SLIDE_LAYOUT),
            notes: related(REL_TYPE_NOTES_SLIDE),
            rel_id,
            part,
        });
    }
    Ok(slides)
}

/// The relationship id of an element (`r:id`, whatever the prefix)
pub fn rel_id_of(entry: &XmlElement) -> Option<String> {
    entry
        .attributes
        .iter()
        .find(|(k, _)| k.contains(':') && !k.starts_with("xmlns") && k.ends_with(":id"))
        .map(|(_, v)| v.clone())
}

/// Relationship ids an element and its descendants refer to (`r:id`, `r:embed`, `r:link`...)
pub fn referenced_rel_ids(element: &XmlElement) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    let mut collect = |e: &XmlElement| {
        for (key, value) in &e.attributes {
            let Some((prefix, local)) = key.split_once(':') else {
                continue;
            };
            if prefix != "xmlns" && matches!(local, "id" | "embed" | "link" | "pict") && !value.is_empty() {
                ids.insert(value.clone());
            }
        }
    };
    collect(element);
    element.walk(&mut collect);
    ids
}

/// A slide by its 1-based number
pub fn slide(package: &Package, number: usize) -> Result<SlideRef> {
    slides(package)?
        .into_iter()
        .find(|s| s.number == number)
        .ok_or(DeckError::SlideNotFound(number))
}

/// Placeholder type of a shape (`p:sp`), if it is a placeholder
pub fn placeholder_type(shape: &XmlElement) -> Option<&str> {
    let ph = shape.path(&["nvSpPr", "nvPr", "ph"])?;
    // A placeholder without a type is a content ("obj") placeholder
    Some(ph.attr("type").unwrap_or("obj"))
}

/// Title of a slide: the title placeholder's text, else the first short text shape
pub fn slide_title(package: &Package, slide: &SlideRef) -> Result<String> {
    let doc = package.read_xml(&slide.part)?;
    Ok(title_of(&doc))
}

fn title_of(doc: &XmlDocument) -> String {
    let shapes = doc.root.find_all("sp");

    let title = shapes
        .iter()
        .filter(|sp| matches!(placeholder_type(sp), Some("title" | "ctrTitle")))
        .find_map(|sp| sp.child("txBody").map(|body| body_text(body).trim().to_string()))
        .filter(|t| !t.is_empty());

    let title = title.or_else(|| {
        shapes
            .iter()
            .filter_map(|sp| sp.child("txBody"))
            .map(|body| body_text(body).trim().to_string())
            .find(|t| !t.is_empty() && t.chars().count() < MAX_FALLBACK_TITLE_CHARS)
    });

    sanitize_text(&title.unwrap_or_default()).replace('\n', " ")
}

/// The text body of the notes placeholder on a notes slide
pub fn notes_body(doc: &XmlDocument) -> Option<&XmlElement> {
    doc.root
        .find_all("sp")
        .into_iter()
        .find(|sp| placeholder_type(sp) == Some("body"))
        .and_then(|sp| sp.child("txBody"))
}

pub fn notes_body_mut(doc: &mut XmlDocument) -> Option<&mut XmlElement> {
    let tree = doc.root.child_mut("cSld")?.child_mut("spTree")?;
    find_body_placeholder_mut(tree)
}

fn find_body_placeholder_mut(parent: &mut XmlElement) -> Option<&mut XmlElement> {
    for child in parent.elements_mut() {
        if child.is("sp") && placeholder_type(child) == Some("body") {
            return child.child_mut("txBody");
        }
        if child.is("grpSp") {
            if let Some(found) = find_body_placeholder_mut(child) {
                return Some(found);
            }
        }
    }
    None
}

/// Speaker notes of a slide, sanitized; empty when the slide has no notes page
pub fn notes_text(package: &Package, slide: &SlideRef) -> Result<String> {
    let Some(notes) = &slide.notes else {
        return Ok(String::new());
    };
    let doc = package.read_xml(notes)?;
    Ok(notes_body(&doc)
        .map(|body| sanitize_text(&body_text(body)))
        .unwrap_or_default())
}

/// Slide size in EMU from `p:sldSz`, falling back to 4:3
pub fn slide_size(package: &Package) -> Result<(i64, i64)> {
    let presentation = package.main_document()?;
    let doc = package.read_xml(&presentation)?;
    let size = doc.root.child("sldSz").and_then(|sz| {
        let cx = sz.attr("cx")?.parse().ok()?;
        let cy = sz.attr("cy")?.parse().ok()?;
        Some((cx, cy))
    });
    Ok(size.unwrap_or((DEFAULT_SLIDE_WIDTH_EMU, DEFAULT_SLIDE_HEIGHT_EMU)))
}

/// Path of the deck's notes master, if it has one
pub fn notes_master(package: &Package) -> Result<Option<String>> {
    let presentation = package.main_document()?;
    Ok(package
        .relationships(&presentation)
        .and_then(|rels| rels.first_of_type(REL_TYPE_NOTES_MASTER))
        .and_then(|(rid, _)| package.target_of(&presentation, rid))
        .filter(|part| package.contains(part)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{DeckBuilder, SlideSpec};

    fn deck() -> Package {
        DeckBuilder::new()
            .slide(SlideSpec::titled("Welcome").notes("Say hello"))
            .slide(SlideSpec::titled("Agenda"))
            .slide(SlideSpec::untitled().body("Just a caption"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_slides_in_order() {
        let pkg = deck();
        let slides = slides(&pkg).unwrap();
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[0].number, 1);
        assert_eq!(slides[0].id, 256);
        assert_eq!(slides[2].part, "ppt/slides/slide3.xml");
        assert!(slides[0].layout.is_some());
        assert!(slides[0].notes.is_some());
    }

    #[test]
    fn test_titles_with_fallback() {
        let pkg = deck();
        let slides = slides(&pkg).unwrap();
        assert_eq!(slide_title(&pkg, &slides[0]).unwrap(), "Welcome");
        assert_eq!(slide_title(&pkg, &slides[2]).unwrap(), "Just a caption");
    }

    #[test]
    fn test_notes_text() {
        let pkg = deck();
        let slides = slides(&pkg).unwrap();
        assert_eq!(notes_text(&pkg, &slides[0]).unwrap(), "Say hello");
        assert_eq!(notes_text(&pkg, &slides[1]).unwrap(), "");
    }

    #[test]
    fn test_slide_not_found() {
        let pkg = deck();
        assert!(matches!(slide(&pkg, 9), Err(DeckError::SlideNotFound(9))));
        assert_eq!(slide(&pkg, 2).unwrap().id, 257);
    }

    #[test]
    fn test_slide_size_and_notes_master() {
        let pkg = deck();
        assert_eq!(
            slide_size(&pkg).unwrap(),
            (DEFAULT_SLIDE_WIDTH_EMU, DEFAULT_SLIDE_HEIGHT_EMU)
        );
        assert!(notes_master(&pkg).unwrap().is_some());
    }
}
