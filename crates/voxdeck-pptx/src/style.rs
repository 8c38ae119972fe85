//! Typeface normalization and animation removal

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};
use voxdeck_ooxml::{Package, XmlDocument, XmlElement, XmlNode};

use crate::deck::{self, notes_body, notes_body_mut, SlideRef};
use crate::error::{DeckError, Result};
use crate::report::{EventSink, OperationReport, Unit};

/// Bucket for runs that set no typeface of their own
pub const INHERITED: &str = "(inherited)";

/// `a:rPr` children that must follow `a:latin`
const AFTER_LATIN: [&str; 7] = ["ea", "cs", "sym", "hlinkClick", "hlinkMouseOver", "rtl", "extLst"];

/// Timing elements that act on shapes and can be dropped as a unit
const TIME_NODES: [&str; 13] = [
    "par", "seq", "excl", "audio", "video", "cmd", "set", "anim", "animClr", "animEffect", "animMotion",
    "animRot", "animScale",
];

/// Which parts a font operation covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontScope {
    #[default]
    Slides,
    Notes,
    Both,
}

impl FontScope {
    fn parts(self, slide: &SlideRef) -> Vec<(bool, String)> {
        let mut parts = Vec::new();
        if matches!(self, FontScope::Slides | FontScope::Both) {
            parts.push((false, slide.part.clone()));
        }
        if matches!(self, FontScope::Notes | FontScope::Both) {
            if let Some(notes) = &slide.notes {
                parts.push((true, notes.clone()));
            }
        }
        parts
    }
}

fn is_run(e: &XmlElement) -> bool {
    e.is("r") || e.is("fld")
}

/// Runs of a part; for notes only the notes placeholder counts
fn runs_of(doc: &XmlDocument, notes: bool) -> Vec<&XmlElement> {
    let root = if notes { notes_body(doc) } else { Some(&doc.root) };
    let mut runs = Vec::new();
    if let Some(root) = root {
        root.walk(&mut |e| {
            if is_run(e) {
                runs.push(e);
            }
        });
    }
    runs
}

/// Explicit typeface of a run (`a:rPr/a:latin/@typeface`)
pub fn run_typeface(run: &XmlElement) -> Option<&str> {
    run.path(&["rPr", "latin"])?.attr("typeface")
}

/// Run counts per typeface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FontUsage {
    pub fonts: BTreeMap<String, usize>,
    pub total_runs: usize,
}

impl FontUsage {
    /// Typefaces by descending run count
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self.fonts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked
    }
}

/// Count text runs per typeface
pub fn analyze_fonts(package: &Package, scope: FontScope) -> Result<FontUsage> {
    let mut usage = FontUsage::default();
    for slide in deck::slides(package)? {
        for (notes, part) in scope.parts(&slide) {
            let doc = package.read_xml(&part)?;
            for run in runs_of(&doc, notes) {
                let face = run_typeface(run).unwrap_or(INHERITED);
                *usage.fonts.entry(face.to_string()).or_default() += 1;
                usage.total_runs += 1;
            }
        }
    }
    debug!(fonts = usage.fonts.len(), runs = usage.total_runs, "fonts analyzed");
    Ok(usage)
}

/// Set a run's typeface; returns false when it already had it
fn set_run_typeface(run: &mut XmlElement, typeface: &str) -> bool {
    if run_typeface(run) == Some(typeface) {
        return false;
    }
    let prefix = run.name.split_once(':').map(|(p, _)| format!("{p}:")).unwrap_or_default();

    if run.child("rPr").is_none() {
        run.children.insert(0, XmlNode::Element(XmlElement::new(format!("{prefix}rPr"))));
    }
    let Some(rpr) = run.child_mut("rPr") else {
        return false;
    };

    match rpr.child_mut("latin") {
        Some(latin) => latin.set_attr("typeface", typeface),
        None => {
            let latin = XmlElement::new(format!("{prefix}latin")).with_attr("typeface", typeface);
            let position = rpr
                .children
                .iter()
                .position(|node| matches!(node, XmlNode::Element(e) if AFTER_LATIN.contains(&e.local_name())))
                .unwrap_or(rpr.children.len());
            rpr.children.insert(position, XmlNode::Element(latin));
        }
    }
    true
}

/// Point every run in scope at one typeface
///
/// Size, weight, colour and other run properties are left as they are. A run
/// already using `typeface` is not counted.
pub fn normalize_fonts(
    package: &mut Package,
    typeface: &str,
    scope: FontScope,
    sink: &mut dyn EventSink,
) -> Result<OperationReport> {
    let mut report = OperationReport::new("normalize fonts");

    for slide in deck::slides(package)? {
        match normalize_slide(package, &slide, typeface, scope) {
            Ok(0) => {}
            Ok(changed) => {
                report.touch(slide.number, changed);
                report.processed(sink, Unit::Slide(slide.number), format!("{changed} run(s) set to {typeface}"));
            }
            Err(err) => report.failed(sink, Unit::Slide(slide.number), &err),
        }
    }

    info!(runs = report.changed, slides = report.slides.len(), typeface, "fonts normalized");
    report.finish(sink);
    Ok(report)
}

fn normalize_slide(package: &mut Package, slide: &SlideRef, typeface: &str, scope: FontScope) -> Result<usize> {
    let mut changed = 0;
    for (notes, part) in scope.parts(slide) {
        let pending = {
            let doc = package.read_xml(&part)?;
            runs_of(&doc, notes)
                .into_iter()
                .any(|run| run_typeface(run) != Some(typeface))
        };
        if !pending {
            continue;
        }

        let doc = package.xml_mut(&part)?;
        let mut apply = |e: &mut XmlElement| {
            if is_run(e) && set_run_typeface(e, typeface) {
                changed += 1;
            }
        };
        if notes {
            if let Some(body) = notes_body_mut(doc) {
                body.walk_mut(&mut apply);
            }
        } else {
            doc.root.walk_mut(&mut apply);
        }
    }
    Ok(changed)
}

/// Whether an element is a slide's timing, bare or wrapped in markup compatibility
fn is_timing_holder(e: &XmlElement) -> bool {
    e.is("timing") || (e.is("AlternateContent") && e.find("timing").is_some())
}

/// Preset effects (`cTn` with a preset class) in a slide's first timing tree
fn count_effects(root: &XmlElement) -> usize {
    let timing = root.child("timing").or_else(|| {
        root.children_named("AlternateContent")
            .find_map(|ac| ac.find("timing"))
    });
    timing.map_or(0, |t| {
        t.find_all("cTn")
            .into_iter()
            .filter(|c| c.attr("presetClass").is_some())
            .count()
    })
}

/// Remove every slide's animation timing
pub fn strip_animations(package: &mut Package, sink: &mut dyn EventSink) -> Result<OperationReport> {
    let mut report = OperationReport::new("strip animations");
    let mut total_effects = 0;

    for slide in deck::slides(package)? {
        let effects = {
            let doc = package.read_xml(&slide.part)?;
            if !doc.root.elements().any(is_timing_holder) {
                continue;
            }
            count_effects(&doc.root)
        };

        match package.xml_mut(&slide.part) {
            Ok(doc) => {
                // Each timing tree removed is one change, with or without preset effects
                let removed = doc.root.retain_elements(|e| !is_timing_holder(e));
                total_effects += effects;
                report.touch(slide.number, removed);
                report.processed(sink, Unit::Slide(slide.number), format!("{effects} effect(s) removed"));
            }
            Err(err) => report.failed(sink, Unit::Slide(slide.number), &DeckError::from(err)),
        }
    }

    info!(effects = total_effects, slides = report.slides.len(), "animations stripped");
    report.finish(sink);
    Ok(report)
}

/// Whether every shape a time node targets is in `spids` (and it targets at least one)
fn targets_only(node: &XmlElement, spids: &BTreeSet<String>) -> bool {
    let targets: Vec<&str> = node
        .find_all("spTgt")
        .into_iter()
        .filter_map(|t| t.attr("spid"))
        .collect();
    !targets.is_empty() && targets.iter().all(|id| spids.contains(*id))
}

fn prune_time_nodes(parent: &mut XmlElement, spids: &BTreeSet<String>) -> usize {
    let mut removed =
        parent.retain_elements(|c| !(TIME_NODES.contains(&c.local_name()) && targets_only(c, spids)));
    for child in parent.elements_mut() {
        removed += prune_time_nodes(child, spids);
    }
    removed
}

/// Drop timing nodes and build entries that only concern the shapes `spids`
///
/// A timing tree left without any shape target goes too. Returns the number
/// of nodes removed.
pub(crate) fn prune_timing(root: &mut XmlElement, spids: &BTreeSet<String>) -> usize {
    if spids.is_empty() {
        return 0;
    }
    let mut pruned = 0;
    root.walk_mut(&mut |e| {
        if !e.is("timing") {
            return;
        }
        pruned += prune_time_nodes(e, spids);
        if let Some(builds) = e.child_mut("bldLst") {
            pruned += builds.retain_elements(|b| b.attr("spid").map_or(true, |id| !spids.contains(id)));
        }
        e.retain_elements(|c| !(c.is("bldLst") && c.elements().next().is_none()));
    });

    if pruned > 0 {
        root.remove_descendants(&mut |e| e.is("timing") && e.find("spTgt").is_none());
        root.retain_elements(|e| {
            !(e.is("AlternateContent") && e.elements().all(|branch| branch.elements().next().is_none()))
        });
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{DeckBuilder, RunSpec, SlideSpec};
    use crate::report::{EngineEvent, NullSink, Outcome};

    fn mixed_deck() -> Package {
        DeckBuilder::new()
            .slide(SlideSpec::titled("Fonts").runs(vec![
                RunSpec::new("Plain "),
                RunSpec::new("Serif").typeface("Georgia").bold(),
                RunSpec::new(" Sans").typeface("Arial"),
            ]))
            .slide(SlideSpec::titled("Grouped").grouped("Inside").table(&[&["A", "B"]]).notes("Read me"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_analyze_counts_inherited() {
        let pkg = mixed_deck();
        let usage = analyze_fonts(&pkg, FontScope::Slides).unwrap();
        assert_eq!(usage.fonts["Georgia"], 1);
        assert_eq!(usage.fonts["Arial"], 1);
        assert!(usage.fonts[INHERITED] >= 4);
        assert_eq!(usage.total_runs, usage.fonts.values().sum::<usize>());

        let notes = analyze_fonts(&pkg, FontScope::Notes).unwrap();
        assert_eq!(notes.total_runs, 1);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut pkg = mixed_deck();
        let first = normalize_fonts(&mut pkg, "Arial", FontScope::Both, &mut NullSink).unwrap();
        assert!(first.changed > 0);
        assert_eq!(first.slides, vec![1, 2]);

        let second = normalize_fonts(&mut pkg, "Arial", FontScope::Both, &mut NullSink).unwrap();
        assert_eq!(second.changed, 0);
        assert_eq!(second.outcome(), Outcome::NothingToDo);

        let usage = analyze_fonts(&pkg, FontScope::Both).unwrap();
        assert_eq!(usage.fonts.len(), 1);
        assert!(usage.fonts.contains_key("Arial"));
    }

    #[test]
    fn test_normalize_keeps_other_properties() {
        let mut pkg = mixed_deck();
        normalize_fonts(&mut pkg, "Calibri", FontScope::Slides, &mut NullSink).unwrap();
        let doc = pkg.read_xml("ppt/slides/slide1.xml").unwrap();
        let bold = doc
            .root
            .find_all("r")
            .into_iter()
            .find(|r| r.child("t").map(|t| t.text()) == Some("Serif".to_string()))
            .unwrap();
        let rpr = bold.child("rPr").unwrap();
        assert_eq!(rpr.attr("b"), Some("1"));
        assert_eq!(run_typeface(bold), Some("Calibri"));
    }

    #[test]
    fn test_latin_goes_before_east_asian() {
        let mut run = XmlElement::new("a:r")
            .with_child(
                XmlElement::new("a:rPr")
                    .with_child(XmlElement::new("a:solidFill"))
                    .with_child(XmlElement::new("a:ea").with_attr("typeface", "MS Gothic")),
            )
            .with_child(XmlElement::new("a:t").with_text("x"));
        assert!(set_run_typeface(&mut run, "Arial"));
        let names: Vec<&str> = run.child("rPr").unwrap().elements().map(|e| e.local_name()).collect();
        assert_eq!(names, vec!["solidFill", "latin", "ea"]);
        assert!(!set_run_typeface(&mut run, "Arial"));
    }

    #[test]
    fn test_missing_run_properties_are_created() {
        let mut run = XmlElement::new("a:r").with_child(XmlElement::new("a:t").with_text("x"));
        assert!(set_run_typeface(&mut run, "Arial"));
        let rpr = run.elements().next().unwrap();
        assert!(rpr.is("rPr"));
        assert!(rpr.attributes.is_empty());
        assert_eq!(rpr.elements().count(), 1);
        assert_eq!(run_typeface(&run), Some("Arial"));
    }

    #[test]
    fn test_strip_animations_counts_effects() {
        let mut pkg = DeckBuilder::new()
            .slide(SlideSpec::titled("Moving").animated())
            .slide(SlideSpec::titled("Still"))
            .slide(SlideSpec::titled("Voice").audio("voice.wav"))
            .build()
            .unwrap();
        let mut events: Vec<EngineEvent> = Vec::new();
        let report = strip_animations(&mut pkg, &mut events).unwrap();
        assert_eq!(report.changed, 2);
        assert_eq!(report.slides, vec![1, 3]);
        let details: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::UnitProcessed { detail, .. } => Some(detail.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(details, vec!["1 effect(s) removed", "0 effect(s) removed"]);
        assert!(!pkg.is_modified("ppt/slides/slide2.xml"));

        let again = strip_animations(&mut pkg, &mut NullSink).unwrap();
        assert_eq!(again.outcome(), Outcome::NothingToDo);
    }

    #[test]
    fn test_prune_timing_keeps_unrelated_targets() {
        let mut pkg = DeckBuilder::new()
            .slide(SlideSpec::titled("Both").animated().audio("voice.wav"))
            .build()
            .unwrap();
        let doc = pkg.xml_mut("ppt/slides/slide1.xml").unwrap();
        let audio_id = doc.root.find("pic").and_then(|p| p.find("cNvPr")).and_then(|c| c.attr("id")).unwrap().to_string();

        let pruned = prune_timing(&mut doc.root, &BTreeSet::from([audio_id]));
        assert_eq!(pruned, 1);
        let timing = doc.root.child("timing").unwrap();
        assert!(timing.find("audio").is_none());
        assert_eq!(timing.path(&["bldLst", "bldP"]).and_then(|b| b.attr("spid")), Some("2"));

        let pruned = prune_timing(&mut doc.root, &BTreeSet::from(["2".to_string()]));
        assert!(pruned > 0);
        assert!(doc.root.child("timing").is_none());
    }
}
