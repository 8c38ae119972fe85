//! Slide subsets and section splitting
//!
//! [`extract_slides`] builds a new package holding only some slides. The copy
//! walks relationships outward from the package root: parts reachable from the
//! kept slides come along once each, slides and notes pages are renumbered
//! from 1, and everything that only served the dropped slides stays behind.
//! Masters keep only the layouts the kept slides use.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voxdeck_ooxml::graph::PACKAGE_ROOT;
use voxdeck_ooxml::path::{relative_target, resolve_target};
use voxdeck_ooxml::{
    Package, PackageError, Relationship, RelationshipGraph, TargetMode, XmlDocument, XmlElement,
};

use crate::constants::*;
use crate::deck::{self, rel_id_of, SlideRef};
use crate::error::{DeckError, Result};
use crate::report::{EventSink, OperationReport, Unit};
use crate::sections::{self, Section};

/// Relationship types whose target must exist for a slide to render
const REQUIRED_TYPES: [&str; 3] = [REL_TYPE_SLIDE_LAYOUT, REL_TYPE_SLIDE_MASTER, REL_TYPE_NOTES_MASTER];

/// Longest file stem produced from a section name
const MAX_FILE_STEM: usize = 50;

/// A package cut down to some slides
#[derive(Debug)]
pub struct Subset {
    pub package: Package,
    /// Source slide numbers, in output order
    pub slides: Vec<usize>,
    /// `(source part, relationship id)` of links to slides left out
    pub dropped_links: Vec<(String, String)>,
}

/// Which source parts go where
struct CopyPlan<'a> {
    source: &'a Package,
    presentation: String,
    renamed: HashMap<String, String>,
    /// Slides (and their notes pages) left out
    excluded: HashSet<String>,
    used_layouts: HashSet<String>,
    used_masters: HashSet<String>,
    kept_ids: BTreeSet<u32>,
}

impl<'a> CopyPlan<'a> {
    fn new(source: &'a Package, all: &[SlideRef], kept: &[&SlideRef]) -> Result<Self> {
        let mut renamed = HashMap::new();
        let mut used_layouts = HashSet::new();
        let mut used_masters = HashSet::new();

        for (index, slide) in kept.iter().enumerate() {
            let number = index + 1;
            renamed.insert(slide.part.clone(), format!("ppt/slides/slide{number}.xml"));
            if let Some(notes) = &slide.notes {
                renamed.insert(notes.clone(), format!("ppt/notesSlides/notesSlide{number}.xml"));
            }

            let layout = slide.layout.clone().ok_or_else(|| {
                PackageError::dangling(&slide.part, "", "slide layout")
            })?;
            let master = source
                .relationships(&layout)
                .and_then(|rels| rels.first_of_type(REL_TYPE_SLIDE_MASTER))
                .and_then(|(id, _)| source.target_of(&layout, id))
                .filter(|master| source.contains(master))
                .ok_or_else(|| PackageError::dangling(&layout, "", "slide master"))?;
            used_layouts.insert(layout);
            used_masters.insert(master);
        }

        let kept_parts: HashSet<&str> = kept.iter().map(|s| s.part.as_str()).collect();
        let excluded = all
            .iter()
            .filter(|s| !kept_parts.contains(s.part.as_str()))
            .flat_map(|s| std::iter::once(s.part.clone()).chain(s.notes.clone()))
            .collect();

        Ok(Self {
            source,
            presentation: source.main_document()?,
            renamed,
            excluded,
            used_layouts,
            used_masters,
            kept_ids: kept.iter().map(|s| s.id).collect(),
        })
    }

    fn dest_name(&self, part: &str) -> String {
        self.renamed
            .get(part)
            .cloned()
            .unwrap_or_else(|| part.to_string())
    }

    /// Whether a relationship from `source` to `target` is left out of the copy
    fn skips(&self, source: &str, rel_type: &str, target: &str) -> bool {
        if self.excluded.contains(target) {
            return true;
        }
        match rel_type {
            REL_TYPE_SLIDE_LAYOUT if self.used_masters.contains(source) => !self.used_layouts.contains(target),
            REL_TYPE_SLIDE_MASTER if source == self.presentation => !self.used_masters.contains(target),
            _ => false,
        }
    }

    /// Copy the relationship list of `part`, queueing every target that comes along;
    /// returns the ids left out
    fn copy_relationships(
        &self,
        dest: &mut Package,
        part: &str,
        queue: &mut VecDeque<String>,
    ) -> Result<HashSet<String>> {
        let mut dropped = HashSet::new();
        let Some(rels) = self.source.relationships(part) else {
            return Ok(dropped);
        };
        let dest_part = self.dest_name(part);

        for (id, rel) in rels.iter() {
            if rel.is_external() {
                dest.relationships_mut(&dest_part).insert(id.to_string(), rel.clone());
                continue;
            }
            let target = resolve_target(part, &rel.target);
            if self.skips(part, &rel.rel_type, &target) {
                dropped.insert(id.to_string());
                continue;
            }
            if !self.source.contains(&target) {
                if REQUIRED_TYPES.contains(&rel.rel_type.as_str()) {
                    return Err(PackageError::dangling(part, id, target).into());
                }
                warn!(part, id, target = %target, "relationship to a missing part left out");
                dropped.insert(id.to_string());
                continue;
            }

            let stored = relative_target(&dest_part, &self.dest_name(&target));
            dest.relationships_mut(&dest_part)
                .insert(id.to_string(), Relationship::new(stored, rel.rel_type.clone(), TargetMode::Internal));
            queue.push_back(target);
        }
        Ok(dropped)
    }

    /// Copy one part's body, rewriting what refers to dropped relationships
    fn copy_part(&self, dest: &mut Package, part: &str, dropped: &HashSet<String>, slide_count: usize) -> Result<()> {
        let dest_part = self.dest_name(part);
        let content_type = self
            .source
            .content_type(part)
            .unwrap_or("application/octet-stream")
            .to_string();

        if part == self.presentation {
            let mut doc = self.source.read_xml(part)?.into_owned();
            filter_presentation(&mut doc.root, dropped, &self.kept_ids);
            dest.put_xml(&dest_part, doc, &content_type);
        } else if self.used_masters.contains(part) && !dropped.is_empty() {
            let mut doc = self.source.read_xml(part)?.into_owned();
            if let Some(list) = doc.root.child_mut("sldLayoutIdLst") {
                retain_by_rel_id(list, dropped);
            }
            dest.put_xml(&dest_part, doc, &content_type);
        } else if !dropped.is_empty() {
            let mut doc = self.source.read_xml(part)?.into_owned();
            blank_references(&mut doc.root, dropped);
            dest.put_xml(&dest_part, doc, &content_type);
        } else if is_extended_properties(&content_type) {
            let mut doc = self.source.read_xml(part)?.into_owned();
            if let Some(slides) = doc.root.child_mut("Slides") {
                slides.set_text(slide_count.to_string());
            }
            dest.put_xml(&dest_part, doc, &content_type);
        } else {
            dest.copy_part_from(self.source, part, &dest_part)?;
        }
        Ok(())
    }
}

fn is_extended_properties(content_type: &str) -> bool {
    content_type == "application/vnd.openxmlformats-officedocument.extended-properties+xml"
}

/// Drop list entries (`sldId`, `sldMasterId`, `sldLayoutId`...) whose `r:id` was dropped
fn retain_by_rel_id(list: &mut XmlElement, dropped: &HashSet<String>) -> usize {
    list.retain_elements(|e| rel_id_of(e).map_or(true, |id| !dropped.contains(&id)))
}

/// Empty every relationship reference to a dropped id (hyperlinks to left-out slides)
fn blank_references(root: &mut XmlElement, dropped: &HashSet<String>) {
    root.walk_mut(&mut |e| {
        for (key, value) in e.attributes.iter_mut() {
            let namespaced = key.split_once(':').is_some_and(|(prefix, _)| prefix != "xmlns");
            if namespaced && dropped.contains(value.as_str()) {
                value.clear();
            }
        }
    });
}

fn filter_presentation(root: &mut XmlElement, dropped: &HashSet<String>, kept_ids: &BTreeSet<u32>) {
    for list in ["sldIdLst", "sldMasterIdLst"] {
        if let Some(list) = root.child_mut(list) {
            retain_by_rel_id(list, dropped);
        }
    }

    if let Some(shows) = root.child_mut("custShowLst") {
        for show in shows.elements_mut() {
            if let Some(list) = show.child_mut("sldLst") {
                retain_by_rel_id(list, dropped);
            }
        }
        shows.retain_elements(|show| show.child("sldLst").is_some_and(|l| l.elements().next().is_some()));
    }
    root.retain_elements(|e| !(e.is("custShowLst") && e.elements().next().is_none()));

    let keeps = |e: &XmlElement| e.attr("id").and_then(|v| v.parse::<u32>().ok()).is_some_and(|id| kept_ids.contains(&id));
    if let Some(list) = section_list_mut(root) {
        for section in list.elements_mut() {
            if let Some(ids) = section.child_mut("sldIdLst") {
                ids.retain_elements(keeps);
            }
        }
        list.retain_elements(|s| s.child("sldIdLst").is_some_and(|ids| ids.elements().next().is_some()));
    }
}

fn section_list_mut(root: &mut XmlElement) -> Option<&mut XmlElement> {
    root.child_mut("extLst")?
        .elements_mut()
        .find(|ext| ext.attr("uri") == Some(EXT_URI_SECTIONS))?
        .child_mut("sectionLst")
}

/// Give slides no section covers a section of their own, when the deck has sections
fn add_fallback_section(root: &mut XmlElement, kept_ids: &BTreeSet<u32>, name: &str) {
    let Some(list) = section_list_mut(root) else {
        return;
    };
    let mut covered = HashSet::new();
    list.walk(&mut |e| {
        if e.is("sldId") {
            covered.extend(e.attr("id").and_then(|v| v.parse::<u32>().ok()));
        }
    });
    let missing: Vec<u32> = kept_ids.iter().copied().filter(|id| !covered.contains(id)).collect();
    if missing.is_empty() {
        return;
    }

    let prefix = list.name.split_once(':').map(|(p, _)| format!("{p}:")).unwrap_or_default();
    let mut ids = XmlElement::new(format!("{prefix}sldIdLst"));
    for id in missing {
        ids.push(XmlElement::new(format!("{prefix}sldId")).with_attr("id", id.to_string()));
    }
    list.push(
        XmlElement::new(format!("{prefix}section"))
            .with_attr("name", name)
            .with_attr("id", format!("{{{}}}", Uuid::new_v4().to_string().to_uppercase()))
            .with_child(ids),
    );
}

/// Build a package holding only the given slides (1-based numbers, any order)
///
/// Output slides follow presentation order. When the deck declares sections
/// and `fallback_section` is given, kept slides no section covers are put in
/// a new section of that name.
pub fn extract_slides(source: &Package, numbers: &[usize], fallback_section: Option<&str>) -> Result<Subset> {
    let all = deck::slides(source)?;
    let wanted: BTreeSet<usize> = numbers.iter().copied().collect();
    if let Some(missing) = wanted.iter().find(|n| **n == 0 || **n > all.len()) {
        return Err(DeckError::SlideNotFound(*missing));
    }
    let kept: Vec<&SlideRef> = all.iter().filter(|s| wanted.contains(&s.number)).collect();

    let plan = CopyPlan::new(source, &all, &kept)?;
    let mut dest = Package::new();
    for (ext, content_type) in source.content_types().defaults() {
        dest.content_types_mut().ensure_default(ext, content_type);
    }

    let mut queue = VecDeque::new();
    let mut dropped_links = Vec::new();
    for id in plan.copy_relationships(&mut dest, PACKAGE_ROOT, &mut queue)? {
        dropped_links.push((PACKAGE_ROOT.to_string(), id));
    }

    let mut copied = HashSet::new();
    while let Some(part) = queue.pop_front() {
        if !copied.insert(part.clone()) {
            continue;
        }
        let dropped = plan.copy_relationships(&mut dest, &part, &mut queue)?;
        plan.copy_part(&mut dest, &part, &dropped, kept.len())?;
        if part != plan.presentation && !plan.used_masters.contains(&part) {
            dropped_links.extend(dropped.into_iter().map(|id| (part.clone(), id)));
        }
    }

    if let Some(name) = fallback_section {
        let doc = dest.xml_mut(&plan.presentation)?;
        add_fallback_section(&mut doc.root, &plan.kept_ids, name);
    }

    let mut graph = RelationshipGraph::build(&dest);
    let removed = graph.collect_garbage(&mut dest, &[PACKAGE_ROOT])?;
    if !removed.is_empty() {
        debug!(parts = ?removed, "unreferenced parts removed from subset");
    }
    if let Some(problem) = graph.validate(&dest).into_iter().next() {
        return Err(problem.into());
    }

    debug!(
        slides = kept.len(),
        parts = copied.len(),
        dropped = dropped_links.len(),
        "subset built"
    );
    Ok(Subset {
        package: dest,
        slides: kept.iter().map(|s| s.number).collect(),
        dropped_links,
    })
}

/// What to do with slides no section covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedPolicy {
    /// List them in the report and write no file for them
    #[default]
    Report,
    /// Write them to an extra `Unassigned` file
    CatchAll,
    /// Refuse to split
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct SplitOptions {
    pub unassigned: UnassignedPolicy,
}

/// Name of the catch-all output and its section
pub const UNASSIGNED_NAME: &str = "Unassigned";

/// One file written by [`split_by_sections`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitOutput {
    pub section: String,
    pub path: PathBuf,
    /// Source slide numbers in the file
    pub slides: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitReport {
    #[serde(flatten)]
    pub report: OperationReport,
    pub outputs: Vec<SplitOutput>,
    pub unassigned: Vec<usize>,
}

/// File stem for a section name: no reserved characters, dashes for spaces
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect();

    let mut collapsed = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    let mut stem: String = collapsed.trim_matches('-').chars().take(MAX_FILE_STEM).collect();
    while stem.ends_with('-') {
        stem.pop();
    }
    if stem.is_empty() {
        "Untitled".to_string()
    } else {
        stem
    }
}

/// `dir/stem.pptx`, or `dir/stem_2.pptx`, `_3`... when taken on disk or earlier in this run
fn unique_path(dir: &Path, stem: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let mut path = dir.join(format!("{stem}.pptx"));
    let mut counter = 2;
    while path.exists() || taken.contains(&path) {
        path = dir.join(format!("{stem}_{counter}.pptx"));
        counter += 1;
    }
    taken.insert(path.clone());
    path
}

fn write_subset(
    package: &Package,
    numbers: &[usize],
    fallback: Option<&str>,
    path: &Path,
) -> Result<Subset> {
    let subset = extract_slides(package, numbers, fallback)?;
    subset.package.save(path)?;
    Ok(subset)
}

/// Write one package per section into `out_dir`
///
/// Named sections become `<sanitized name>.pptx`, unnamed ones `Deck-1.pptx`,
/// `Deck-2.pptx`... A failing section is reported and the others still go out.
pub fn split_by_sections(
    package: &Package,
    out_dir: &Path,
    options: &SplitOptions,
    sink: &mut dyn EventSink,
) -> Result<SplitReport> {
    let index = sections::list_sections(package)?;
    if !index.unassigned.is_empty() && options.unassigned == UnassignedPolicy::Error {
        return Err(DeckError::UnassignedSlides(index.unassigned.clone()));
    }
    fs::create_dir_all(out_dir)?;

    let mut report = SplitReport {
        report: OperationReport::new("split"),
        outputs: Vec::new(),
        unassigned: index.unassigned.clone(),
    };
    let mut taken = HashSet::new();
    let mut unnamed = 0;

    let mut jobs: Vec<(Section, Option<&str>)> = index.sections.iter().cloned().map(|s| (s, None)).collect();
    if options.unassigned == UnassignedPolicy::CatchAll && !index.unassigned.is_empty() {
        jobs.push((
            Section {
                name: UNASSIGNED_NAME.to_string(),
                id: None,
                slide_ids: Vec::new(),
                slide_numbers: index.unassigned.clone(),
                synthetic: true,
            },
            Some(UNASSIGNED_NAME),
        ));
    }

    for (section, fallback) in jobs {
        let unit = Unit::Section(section.display_name().to_string());
        if section.slide_numbers.is_empty() {
            report.report.skipped(sink, unit, "section has no slides");
            continue;
        }

        let stem = if section.is_unnamed() {
            unnamed += 1;
            format!("Deck-{unnamed}")
        } else {
            sanitize_file_stem(&section.name)
        };
        let path = unique_path(out_dir, &stem, &mut taken);

        match write_subset(package, &section.slide_numbers, fallback, &path) {
            Ok(subset) => {
                for link in &subset.dropped_links {
                    warn!(section = %section.display_name(), part = %link.0, id = %link.1, "link to a slide outside the section removed");
                }
                report.report.processed(
                    sink,
                    unit,
                    format!("{} slide(s) -> {}", subset.slides.len(), path.display()),
                );
                report.report.changed += 1;
                report.outputs.push(SplitOutput {
                    section: section.display_name().to_string(),
                    path,
                    slides: subset.slides,
                });
            }
            Err(err) => {
                taken.remove(&path);
                report.report.failed(sink, unit, &err);
            }
        }
    }

    if options.unassigned == UnassignedPolicy::Report {
        for slide in &report.unassigned {
            report
                .report
                .skipped(sink, Unit::Slide(*slide), "not in any section");
        }
    }

    info!(
        files = report.outputs.len(),
        errors = report.report.errors.len(),
        unassigned = report.unassigned.len(),
        "deck split"
    );
    report.report.finish(sink);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{DeckBuilder, SlideSpec};
    use crate::report::NullSink;

    fn sectioned() -> Package {
        DeckBuilder::new()
            .slide(SlideSpec::cover("Intro").notes("Welcome"))
            .slide(SlideSpec::titled("Setup").audio("setup.wav"))
            .slide(SlideSpec::titled("Details").link_to(1))
            .slide(SlideSpec::titled("Wrap").audio("setup.wav").notes("Bye"))
            .section("Opening", &[1, 2])
            .section("Closing", &[3, 4])
            .build()
            .unwrap()
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("Chapter 1: Overview"), "Chapter-1-Overview");
        assert_eq!(sanitize_file_stem("What's Next?"), "What's-Next");
        assert_eq!(sanitize_file_stem("  Intro  "), "Intro");
        assert_eq!(sanitize_file_stem("???"), "Untitled");
        assert_eq!(sanitize_file_stem(&"a ".repeat(40)).chars().count(), 49);
    }

    #[test]
    fn test_extract_renumbers_and_copies_dependencies() {
        let source = sectioned();
        let subset = extract_slides(&source, &[4, 3], None).unwrap();
        let pkg = &subset.package;

        assert_eq!(subset.slides, vec![3, 4]);
        let slides = deck::slides(pkg).unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].part, "ppt/slides/slide1.xml");
        assert_eq!(slides[0].id, 258);
        assert_eq!(slides[1].notes.as_deref(), Some("ppt/notesSlides/notesSlide2.xml"));
        assert_eq!(deck::notes_text(pkg, &slides[1]).unwrap(), "Bye");
        assert!(pkg.contains("ppt/media/setup.wav"));
        assert!(!pkg.contains("ppt/slides/slide3.xml"));
        assert!(!pkg.contains("ppt/notesSlides/notesSlide1.xml"));
        assert!(RelationshipGraph::build(pkg).validate(pkg).is_empty());
    }

    #[test]
    fn test_link_to_dropped_slide_is_removed() {
        let source = sectioned();
        let subset = extract_slides(&source, &[3], None).unwrap();
        assert_eq!(subset.dropped_links.len(), 1);
        assert_eq!(subset.dropped_links[0].0, "ppt/slides/slide3.xml");

        let doc = subset.package.read_xml("ppt/slides/slide1.xml").unwrap();
        let click = doc.root.find("hlinkClick").unwrap();
        assert_eq!(click.attr("r:id"), Some(""));
    }

    #[test]
    fn test_unused_layouts_are_left_out() {
        let source = sectioned();
        let subset = extract_slides(&source, &[2], None).unwrap();
        let pkg = &subset.package;
        assert!(!pkg.contains("ppt/slideLayouts/slideLayout1.xml"));
        assert!(pkg.contains("ppt/slideLayouts/slideLayout2.xml"));

        let master = pkg.read_xml("ppt/slideMasters/slideMaster1.xml").unwrap();
        let layouts = master.root.child("sldLayoutIdLst").unwrap();
        assert_eq!(layouts.elements().count(), 1);
        assert!(pkg.contains("ppt/notesMasters/notesMaster1.xml"));
    }

    #[test]
    fn test_sections_are_filtered() {
        let source = sectioned();
        let subset = extract_slides(&source, &[1, 2], None).unwrap();
        let index = sections::list_sections(&subset.package).unwrap();
        assert_eq!(index.sections.len(), 1);
        assert_eq!(index.sections[0].name, "Opening");
        assert_eq!(index.sections[0].slide_numbers, vec![1, 2]);
        assert!(index.unassigned.is_empty());
    }

    #[test]
    fn test_extract_rejects_unknown_slide() {
        let source = sectioned();
        assert!(matches!(extract_slides(&source, &[5], None), Err(DeckError::SlideNotFound(5))));
    }

    #[test]
    fn test_split_accounts_for_every_slide() {
        let dir = tempfile::tempdir().unwrap();
        let report = split_by_sections(&sectioned(), dir.path(), &SplitOptions::default(), &mut NullSink).unwrap();

        assert_eq!(report.outputs.len(), 2);
        assert_eq!(report.outputs[0].path, dir.path().join("Opening.pptx"));
        let total: usize = report
            .outputs
            .iter()
            .map(|o| {
                let pkg = Package::open(&o.path).unwrap();
                assert!(RelationshipGraph::build(&pkg).validate(&pkg).is_empty());
                deck::slides(&pkg).unwrap().len()
            })
            .sum();
        assert_eq!(total, 4);
    }
}
