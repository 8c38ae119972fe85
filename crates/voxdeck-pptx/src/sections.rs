//! Section index
//!
//! Sections live in a `p14:sectionLst` extension on the presentation part.
//! They reference slides by id; this module maps them onto slide numbers and
//! reports slides no section claims.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, warn};
use voxdeck_ooxml::{Package, XmlDocument, XmlElement};

use crate::constants::EXT_URI_SECTIONS;
use crate::deck;
use crate::error::{DeckError, Result};

/// Section names PowerPoint assigns on its own; they carry no meaning
const DEFAULT_NAMES: [&str; 3] = ["default section", "untitled section", "section"];

/// Shown for sections without a meaningful name
pub const UNNAMED: &str = "(unnamed)";

/// One section resolved against the deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Name as stored; empty for the implicit whole-deck section
    pub name: String,
    pub id: Option<String>,
    /// Slide ids in declared order
    pub slide_ids: Vec<u32>,
    /// 1-based slide numbers of the ids that exist in the deck, in declared order
    pub slide_numbers: Vec<usize>,
    /// True when the deck declares no sections and this one stands for all slides
    pub synthetic: bool,
}

impl Section {
    pub fn count(&self) -> usize {
        self.slide_numbers.len()
    }

    pub fn is_unnamed(&self) -> bool {
        is_unnamed(&self.name)
    }

    pub fn display_name(&self) -> &str {
        if self.is_unnamed() {
            UNNAMED
        } else {
            self.name.trim()
        }
    }

    /// First and last slide numbers
    pub fn range(&self) -> Option<(usize, usize)> {
        let first = *self.slide_numbers.iter().min()?;
        let last = *self.slide_numbers.iter().max()?;
        Some((first, last))
    }

    /// Whether the slides form one unbroken run in presentation order
    pub fn is_contiguous(&self) -> bool {
        self.slide_numbers.windows(2).all(|w| w[1] == w[0] + 1)
    }
}

/// Whether a section name is empty or one of the application's placeholder names
pub fn is_unnamed(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || DEFAULT_NAMES.iter().any(|d| name.eq_ignore_ascii_case(d))
}

/// Every section of a deck plus the slides none of them covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionIndex {
    pub sections: Vec<Section>,
    /// Slide numbers present in the deck but in no section
    pub unassigned: Vec<usize>,
    /// Slide ids named by a section that the deck does not contain
    pub unknown_ids: Vec<u32>,
    pub total_slides: usize,
}

impl SectionIndex {
    /// Whether the deck declared no sections
    pub fn is_synthetic(&self) -> bool {
        self.sections.iter().any(|s| s.synthetic)
    }

    /// Section by name (stored or displayed, case-insensitive)
    pub fn find(&self, name: &str) -> Result<&Section> {
        let wanted = name.trim();
        self.sections
            .iter()
            .find(|s| s.name.trim().eq_ignore_ascii_case(wanted) || s.display_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DeckError::SectionNotFound(name.to_string()))
    }
}

/// The `p14:sectionLst` element of a presentation part, if present
pub fn section_list(doc: &XmlDocument) -> Option<&XmlElement> {
    doc.root
        .child("extLst")?
        .children_named("ext")
        .find(|ext| ext.attr("uri") == Some(EXT_URI_SECTIONS))?
        .child("sectionLst")
}

/// Read the deck's sections
///
/// A deck without a section list gets one synthetic section spanning every slide.
pub fn list_sections(package: &Package) -> Result<SectionIndex> {
    let slides = deck::slides(package)?;
    let number_of: HashMap<u32, usize> = slides.iter().map(|s| (s.id, s.number)).collect();

    let presentation = package.main_document()?;
    let doc = package.read_xml(&presentation)?;

    let Some(list) = section_list(&doc) else {
        debug!("no section list, using one implicit section");
        return Ok(SectionIndex {
            sections: vec![Section {
                name: String::new(),
                id: None,
                slide_ids: slides.iter().map(|s| s.id).collect(),
                slide_numbers: slides.iter().map(|s| s.number).collect(),
                synthetic: true,
            }],
            unassigned: Vec::new(),
            unknown_ids: Vec::new(),
            total_slides: slides.len(),
        });
    };

    let mut sections = Vec::new();
    let mut assigned = BTreeSet::new();
    let mut unknown_ids = Vec::new();

    for section in list.children_named("section") {
        let slide_ids: Vec<u32> = section
            .child("sldIdLst")
            .map(|ids| {
                ids.children_named("sldId")
                    .filter_map(|e| e.attr("id").and_then(|v| v.parse().ok()))
                    .collect()
            })
            .unwrap_or_default();

        let mut slide_numbers = Vec::with_capacity(slide_ids.len());
        for id in &slide_ids {
            match number_of.get(id) {
                Some(&number) => {
                    slide_numbers.push(number);
                    assigned.insert(number);
                }
                None => unknown_ids.push(*id),
            }
        }

        sections.push(Section {
            name: section.attr("name").unwrap_or_default().to_string(),
            id: section.attr("id").map(str::to_string),
            slide_ids,
            slide_numbers,
            synthetic: false,
        });
    }

    let unassigned: Vec<usize> = slides
        .iter()
        .map(|s| s.number)
        .filter(|n| !assigned.contains(n))
        .collect();
    if !unassigned.is_empty() {
        warn!(slides = ?unassigned, "slides not assigned to any section");
    }
    if !unknown_ids.is_empty() {
        warn!(ids = ?unknown_ids, "sections reference unknown slide ids");
    }

    Ok(SectionIndex {
        sections,
        unassigned,
        unknown_ids,
        total_slides: slides.len(),
    })
}
