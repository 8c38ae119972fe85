//! Cross-run text reading and replacement
//!
//! Visible text in a text body is frequently split over several runs for
//! reasons unrelated to meaning (spell-check state, edit history, formatting).
//! [`TextBodyView`] concatenates the runs of a body into one logical string
//! and remembers where every run sits in it, so matches found in the string
//! can be mapped back onto the runs.
//!
//! Replacement rules:
//! - the replacement text takes the formatting of the first run the match touches
//! - runs wholly inside a match are removed
//! - a run straddling the end of a match is truncated, keeping its own formatting
//! - a match touching a field, a line break or a paragraph boundary is skipped

use serde::Serialize;
use tracing::{debug, info};
use voxdeck_ooxml::{Package, XmlElement, XmlNode};

use crate::deck::{self, notes_body, notes_body_mut, SlideRef};
use crate::error::{DeckError, Result};
use crate::report::{EventSink, OperationReport, Unit};

/// Characters of context on each side of a match
pub const CONTEXT_CHARS: usize = 50;

/// Remove control characters other than tab, LF and CR
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|&c| !(c.is_control() && c <= '\u{7f}') || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// Logical text of a body: paragraphs and line breaks become `\n`
pub fn body_text(body: &XmlElement) -> String {
    TextBodyView::read(body).text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanKind {
    Run,
    /// Field (`a:fld`): visible but regenerated by the application, never rewritten
    Field,
    /// Line break or paragraph boundary
    Break,
}

#[derive(Debug, Clone)]
struct Span {
    /// Index of the paragraph among the body's child nodes
    paragraph: usize,
    /// Index of the run among the paragraph's child nodes
    child: usize,
    start: usize,
    end: usize,
    kind: SpanKind,
}

/// A byte range of the logical text and what to put there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

/// Result of applying edits to one body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub applied: usize,
    pub skipped: usize,
}

/// Concatenated text of a text body with each run's span in it
#[derive(Debug, Clone)]
pub struct TextBodyView {
    pub text: String,
    spans: Vec<Span>,
}

impl TextBodyView {
    /// Read a `p:txBody` / `a:txBody`
    pub fn read(body: &XmlElement) -> Self {
        let mut text = String::new();
        let mut spans = Vec::new();
        let mut first = true;

        for (pi, node) in body.children.iter().enumerate() {
            let XmlNode::Element(paragraph) = node else {
                continue;
            };
            if !paragraph.is("p") {
                continue;
            }
            if !first {
                push_span(&mut text, &mut spans, pi, usize::MAX, "\n", SpanKind::Break);
            }
            first = false;

            for (ci, node) in paragraph.children.iter().enumerate() {
                let XmlNode::Element(child) = node else {
                    continue;
                };
                match child.local_name() {
                    "r" => push_span(&mut text, &mut spans, pi, ci, &run_text(child), SpanKind::Run),
                    "br" => push_span(&mut text, &mut spans, pi, ci, "\n", SpanKind::Break),
                    "fld" => push_span(&mut text, &mut spans, pi, ci, &run_text(child), SpanKind::Field),
                    _ => {}
                }
            }
        }

        Self { text, spans }
    }

    /// Number of runs (excluding fields and breaks)
    pub fn run_count(&self) -> usize {
        self.spans.iter().filter(|s| s.kind == SpanKind::Run).count()
    }

    /// Whether an edit over `start..end` maps onto runs only
    pub fn is_editable(&self, start: usize, end: usize) -> bool {
        let mut touched = self.touched(start, end).peekable();
        touched.peek().is_some() && touched.all(|s| s.kind == SpanKind::Run)
    }

    fn touched(&self, start: usize, end: usize) -> impl Iterator<Item = &Span> {
        self.spans
            .iter()
            .filter(move |s| s.start < end && s.end > start)
    }

    /// Apply non-overlapping edits, computed against this view, to the body it was read from
    pub fn apply(&self, body: &mut XmlElement, edits: &[Edit]) -> ApplyStats {
        let mut edits: Vec<&Edit> = edits.iter().collect();
        edits.sort_by_key(|e| e.start);

        let mut stats = ApplyStats::default();
        let mut boundary = usize::MAX;

        // Right to left, so earlier spans keep their positions
        for edit in edits.into_iter().rev() {
            if edit.start >= edit.end || edit.end > boundary || !self.is_editable(edit.start, edit.end) {
                stats.skipped += 1;
                continue;
            }
            boundary = edit.start;

            let touched: Vec<&Span> = self.touched(edit.start, edit.end).collect();
            let (Some(first), Some(last)) = (touched.first(), touched.last()) else {
                stats.skipped += 1;
                continue;
            };
            let Some(paragraph) = element_at_mut(body, first.paragraph) else {
                stats.skipped += 1;
                continue;
            };

            if first.child == last.child {
                let current = element_at(paragraph, first.child).map(run_text).unwrap_or_default();
                let local_start = edit.start - first.start;
                let local_end = edit.end - first.start;
                let updated = format!(
                    "{}{}{}",
                    &current[..local_start],
                    edit.replacement,
                    &current[local_end..]
                );
                set_or_remove(paragraph, first.child, &updated);
            } else {
                // Highest child index first so removals don't shift what's left to do
                let last_text = element_at(paragraph, last.child).map(run_text).unwrap_or_default();
                set_or_remove(paragraph, last.child, &last_text[edit.end - last.start..]);

                for middle in touched[1..touched.len() - 1].iter().rev() {
                    paragraph.children.remove(middle.child);
                }

                let first_text = element_at(paragraph, first.child).map(run_text).unwrap_or_default();
                let updated = format!(
                    "{}{}",
                    &first_text[..edit.start - first.start],
                    edit.replacement
                );
                set_or_remove(paragraph, first.child, &updated);
            }
            stats.applied += 1;
        }

        stats
    }
}

fn push_span(
    text: &mut String,
    spans: &mut Vec<Span>,
    paragraph: usize,
    child: usize,
    content: &str,
    kind: SpanKind,
) {
    let start = text.len();
    text.push_str(content);
    spans.push(Span {
        paragraph,
        child,
        start,
        end: text.len(),
        kind,
    });
}

/// Text of a run or field (its `a:t`)
fn run_text(run: &XmlElement) -> String {
    run.child("t").map(XmlElement::text).unwrap_or_default()
}

fn element_at(parent: &XmlElement, index: usize) -> Option<&XmlElement> {
    match parent.children.get(index) {
        Some(XmlNode::Element(e)) => Some(e),
        _ => None,
    }
}

fn element_at_mut(parent: &mut XmlElement, index: usize) -> Option<&mut XmlElement> {
    match parent.children.get_mut(index) {
        Some(XmlNode::Element(e)) => Some(e),
        _ => None,
    }
}

/// Set a run's text, or remove the run when nothing is left of it
fn set_or_remove(paragraph: &mut XmlElement, index: usize, text: &str) {
    if text.is_empty() {
        if index < paragraph.children.len() {
            paragraph.children.remove(index);
        }
        return;
    }
    if let Some(run) = element_at_mut(paragraph, index) {
        set_run_text(run, text);
    }
}

fn set_run_text(run: &mut XmlElement, text: &str) {
    match run.child_mut("t") {
        Some(t) => t.set_text(text),
        None => {
            let name = sibling_name(&run.name, "t");
            run.push(XmlElement::new(name).with_text(text));
        }
    }
}

/// Qualified name for `local` using the same prefix as `name`
fn sibling_name(name: &str, local: &str) -> String {
    match name.split_once(':') {
        Some((prefix, _)) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

/// Replace the whole content of a body with `text`, one paragraph per line
///
/// The first paragraph's properties and the first run's formatting are kept
/// and applied to every new paragraph and run.
pub fn set_body_text(body: &mut XmlElement, text: &str) {
    let first_paragraph = body.children_named("p").next().cloned();
    let paragraph_name = first_paragraph
        .as_ref()
        .map(|p| p.name.clone())
        .unwrap_or_else(|| sibling_name(&body_drawing_name(body), "p"));

    let ppr = first_paragraph.as_ref().and_then(|p| p.child("pPr")).cloned();
    let end_rpr = first_paragraph
        .as_ref()
        .and_then(|p| p.child("endParaRPr"))
        .cloned();
    let rpr = body
        .children_named("p")
        .flat_map(|p| p.children_named("r"))
        .find_map(|r| r.child("rPr"))
        .cloned();

    let mut retained = Vec::new();
    let mut insert_at = None;
    for node in std::mem::take(&mut body.children) {
        match node {
            XmlNode::Element(ref e) if e.is("p") => {
                insert_at.get_or_insert(retained.len());
            }
            other => retained.push(other),
        }
    }
    let insert_at = insert_at.unwrap_or(retained.len());

    let normalized = text.replace("\r\n", "\n");
    let paragraphs: Vec<XmlNode> = normalized
        .split('\n')
        .map(|line| {
            let mut p = XmlElement::new(paragraph_name.clone());
            if let Some(ppr) = &ppr {
                p.push(ppr.clone());
            }
            if !line.is_empty() {
                let mut run = XmlElement::new(sibling_name(&paragraph_name, "r"));
                if let Some(rpr) = &rpr {
                    run.push(rpr.clone());
                }
                run.push(XmlElement::new(sibling_name(&paragraph_name, "t")).with_text(line));
                p.push(run);
            }
            if let Some(end) = &end_rpr {
                p.push(end.clone());
            }
            XmlNode::Element(p)
        })
        .collect();

    retained.splice(insert_at..insert_at, paragraphs);
    body.children = retained;
}

/// Name of some DrawingML element in the body, for its prefix
fn body_drawing_name(body: &XmlElement) -> String {
    body.elements()
        .find(|e| e.is("bodyPr") || e.is("lstStyle"))
        .map(|e| e.name.clone())
        .unwrap_or_else(|| "a:bodyPr".to_string())
}

/// Which text a search covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Speaker notes
    #[default]
    Notes,
    /// Text on the slides themselves (shapes, groups, tables)
    Slides,
    All,
}

impl Scope {
    fn notes(self) -> bool {
        matches!(self, Scope::Notes | Scope::All)
    }

    fn slides(self) -> bool {
        matches!(self, Scope::Slides | Scope::All)
    }
}

/// Where a match was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Notes,
    Slide,
}

/// Search settings shared by find and replace
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    /// Treat the pattern as a regular expression (`$1` expands in replacements)
    pub regex: bool,
    pub scope: Scope,
    /// Only these slide numbers; `None` means every slide
    pub slides: Option<Vec<usize>>,
}

impl SearchOptions {
    fn includes(&self, slide: usize) -> bool {
        self.slides.as_ref().map_or(true, |s| s.contains(&slide))
    }
}

/// Compiled search pattern
#[derive(Debug, Clone)]
pub struct Matcher {
    re: regex::Regex,
    literal: bool,
}

impl Matcher {
    pub fn new(pattern: &str, options: &SearchOptions) -> Result<Self> {
        if pattern.is_empty() {
            return Err(DeckError::EmptySearch);
        }
        let body = if options.regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let source = if options.case_sensitive {
            body
        } else {
            format!("(?i){body}")
        };
        Ok(Self {
            re: regex::Regex::new(&source)?,
            literal: !options.regex,
        })
    }

    /// Non-empty matches as `(start, end)` byte ranges
    pub fn find_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        self.re
            .find_iter(text)
            .filter(|m| !m.as_str().is_empty())
            .map(|m| (m.start(), m.end()))
            .collect()
    }

    /// Edits replacing every match in `text`
    pub fn edits(&self, text: &str, replacement: &str) -> Vec<Edit> {
        self.re
            .captures_iter(text)
            .filter_map(|caps| {
                let m = caps.get(0)?;
                if m.as_str().is_empty() {
                    return None;
                }
                let replacement = if self.literal {
                    replacement.to_string()
                } else {
                    let mut expanded = String::new();
                    caps.expand(replacement, &mut expanded);
                    expanded
                };
                Some(Edit {
                    start: m.start(),
                    end: m.end(),
                    replacement,
                })
            })
            .collect()
    }
}

/// Replace every match in one body; returns how many were applied and skipped
pub fn replace_in_body(body: &mut XmlElement, matcher: &Matcher, replacement: &str) -> ApplyStats {
    let view = TextBodyView::read(body);
    let edits = matcher.edits(&view.text, replacement);
    if edits.is_empty() {
        return ApplyStats::default();
    }
    view.apply(body, &edits)
}

/// One match with its surroundings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindMatch {
    pub location: Location,
    pub start: usize,
    pub end: usize,
    pub matched: String,
    pub context: String,
}

/// All matches on one slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideMatches {
    pub slide: usize,
    pub title: String,
    pub matches: Vec<FindMatch>,
}

/// `text[start..end]` with up to `radius` characters either side, `...` marking cuts
pub fn context_snippet(text: &str, start: usize, end: usize, radius: usize) -> String {
    let before = text[..start].chars().count();
    let from = text[..start]
        .char_indices()
        .nth(before.saturating_sub(radius))
        .map(|(i, _)| i)
        .unwrap_or(start);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());

    let mut snippet = String::new();
    if from > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(&text[from..to]);
    if to < text.len() {
        snippet.push_str("...");
    }
    snippet
}

/// The parts a search visits for one slide, with the location they stand for
fn targets(slide: &SlideRef, scope: Scope) -> Vec<(Location, String)> {
    let mut targets = Vec::new();
    if scope.slides() {
        targets.push((Location::Slide, slide.part.clone()));
    }
    if scope.notes() {
        if let Some(notes) = &slide.notes {
            targets.push((Location::Notes, notes.clone()));
        }
    }
    targets
}

/// Read-only bodies of a part for a location
fn bodies(doc: &voxdeck_ooxml::XmlDocument, location: Location) -> Vec<&XmlElement> {
    match location {
        Location::Notes => notes_body(doc).into_iter().collect(),
        Location::Slide => doc.root.find_all("txBody"),
    }
}

/// Apply `f` to every body of a part for a location
fn for_each_body_mut(
    doc: &mut voxdeck_ooxml::XmlDocument,
    location: Location,
    f: &mut impl FnMut(&mut XmlElement),
) {
    match location {
        Location::Notes => {
            if let Some(body) = notes_body_mut(doc) {
                f(body);
            }
        }
        Location::Slide => doc.root.walk_mut(&mut |e| {
            if e.is("txBody") {
                f(e);
            }
        }),
    }
}

/// Find every match of `pattern`
pub fn find(package: &Package, pattern: &str, options: &SearchOptions) -> Result<Vec<SlideMatches>> {
    let matcher = Matcher::new(pattern, options)?;
    let mut results = Vec::new();

    for slide in deck::slides(package)? {
        if !options.includes(slide.number) {
            continue;
        }
        let mut matches = Vec::new();
        for (location, part) in targets(&slide, options.scope) {
            let doc = package.read_xml(&part)?;
            for body in bodies(&doc, location) {
                let text = sanitize_text(&body_text(body));
                for (start, end) in matcher.find_ranges(&text) {
                    matches.push(FindMatch {
                        location,
                        start,
                        end,
                        matched: text[start..end].to_string(),
                        context: context_snippet(&text, start, end, CONTEXT_CHARS),
                    });
                }
            }
        }
        if !matches.is_empty() {
            debug!(slide = slide.number, matches = matches.len(), "matches found");
            results.push(SlideMatches {
                slide: slide.number,
                title: deck::slide_title(package, &slide)?,
                matches,
            });
        }
    }

    info!(
        "found {} match(es) across {} slide(s)",
        results.iter().map(|r| r.matches.len()).sum::<usize>(),
        results.len()
    );
    Ok(results)
}

/// Before/after text of one location on one slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacePreview {
    pub slide: usize,
    pub title: String,
    pub location: Location,
    pub matches: usize,
    pub original: String,
    pub preview: String,
}

/// Compute what `replace` would do, without touching the package
pub fn preview_replace(
    package: &Package,
    pattern: &str,
    replacement: &str,
    options: &SearchOptions,
) -> Result<Vec<ReplacePreview>> {
    let matcher = Matcher::new(pattern, options)?;
    let mut previews = Vec::new();

    for slide in deck::slides(package)? {
        if !options.includes(slide.number) {
            continue;
        }
        for (location, part) in targets(&slide, options.scope) {
            let doc = package.read_xml(&part)?;
            let mut original = Vec::new();
            let mut preview = Vec::new();
            let mut applied = 0;

            for body in bodies(&doc, location) {
                let mut scratch = body.clone();
                let stats = replace_in_body(&mut scratch, &matcher, replacement);
                if stats.applied > 0 {
                    applied += stats.applied;
                    original.push(body_text(body));
                    preview.push(body_text(&scratch));
                }
            }

            if applied > 0 {
                previews.push(ReplacePreview {
                    slide: slide.number,
                    title: deck::slide_title(package, &slide)?,
                    location,
                    matches: applied,
                    original: original.join("\n"),
                    preview: preview.join("\n"),
                });
            }
        }
    }
    Ok(previews)
}

/// Report of a replace run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceReport {
    #[serde(flatten)]
    pub report: OperationReport,
    /// Matches left alone because they touched a field or crossed a line break
    pub skipped_matches: usize,
}

/// Replace every match of `pattern` in place, keeping run formatting
pub fn replace(
    package: &mut Package,
    pattern: &str,
    replacement: &str,
    options: &SearchOptions,
    sink: &mut dyn EventSink,
) -> Result<ReplaceReport> {
    let matcher = Matcher::new(pattern, options)?;
    let mut report = ReplaceReport {
        report: OperationReport::new("replace"),
        skipped_matches: 0,
    };

    for slide in deck::slides(package)? {
        if !options.includes(slide.number) {
            continue;
        }
        match replace_on_slide(package, &slide, options.scope, &[(&matcher, replacement)]) {
            Ok(stats) => {
                report.skipped_matches += stats.iter().map(|s| s.skipped).sum::<usize>();
                let applied: usize = stats.iter().map(|s| s.applied).sum();
                if applied > 0 {
                    report.report.touch(slide.number, applied);
                    report.report.processed(
                        sink,
                        Unit::Slide(slide.number),
                        format!("{applied} replacement(s)"),
                    );
                }
            }
            Err(err) => report.report.failed(sink, Unit::Slide(slide.number), &err),
        }
    }

    report.report.finish(sink);
    Ok(report)
}

/// Replacement count of one term in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

/// Report of a batch replace run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    #[serde(flatten)]
    pub report: OperationReport,
    pub terms: Vec<TermCount>,
}

/// Apply several literal replacements in sequence, in one pass over the deck
pub fn batch_replace(
    package: &mut Package,
    pairs: &[(String, String)],
    options: &SearchOptions,
    sink: &mut dyn EventSink,
) -> Result<BatchReport> {
    let literal = SearchOptions {
        regex: false,
        ..options.clone()
    };
    let compiled: Vec<(Matcher, &str, &str)> = pairs
        .iter()
        .filter(|(search, _)| !search.is_empty())
        .map(|(search, repl)| Ok((Matcher::new(search, &literal)?, search.as_str(), repl.as_str())))
        .collect::<Result<_>>()?;
    if compiled.is_empty() {
        return Err(DeckError::EmptySearch);
    }

    let mut report = BatchReport {
        report: OperationReport::new("batch replace"),
        terms: compiled
            .iter()
            .map(|(_, term, _)| TermCount {
                term: term.to_string(),
                count: 0,
            })
            .collect(),
    };
    let steps: Vec<(&Matcher, &str)> = compiled.iter().map(|(m, _, r)| (m, *r)).collect();

    for slide in deck::slides(package)? {
        if !literal.includes(slide.number) {
            continue;
        }
        match replace_on_slide(package, &slide, literal.scope, &steps) {
            Ok(stats) => {
                let mut applied = 0;
                for (term, stat) in report.terms.iter_mut().zip(&stats) {
                    term.count += stat.applied;
                    applied += stat.applied;
                }
                if applied > 0 {
                    report.report.touch(slide.number, applied);
                    report.report.processed(
                        sink,
                        Unit::Slide(slide.number),
                        format!("{applied} replacement(s)"),
                    );
                }
            }
            Err(err) => report.report.failed(sink, Unit::Slide(slide.number), &err),
        }
    }

    report.report.finish(sink);
    Ok(report)
}

/// Run each `(matcher, replacement)` step in order over a slide; one stats entry per step
fn replace_on_slide(
    package: &mut Package,
    slide: &SlideRef,
    scope: Scope,
    steps: &[(&Matcher, &str)],
) -> Result<Vec<ApplyStats>> {
    let mut totals = vec![ApplyStats::default(); steps.len()];

    for (location, part) in targets(slide, scope) {
        // Only parse for writing when something will change, so untouched parts stay byte-identical
        let would_change = {
            let doc = package.read_xml(&part)?;
            bodies(&doc, location).into_iter().any(|body| {
                let mut scratch = body.clone();
                steps
                    .iter()
                    .any(|(m, r)| replace_in_body(&mut scratch, m, r).applied > 0)
            })
        };
        if !would_change {
            continue;
        }

        let doc = package.xml_mut(&part)?;
        for_each_body_mut(doc, location, &mut |body| {
            for (total, (matcher, replacement)) in totals.iter_mut().zip(steps) {
                let stats = replace_in_body(body, matcher, replacement);
                total.applied += stats.applied;
                total.skipped += stats.skipped;
            }
        });
    }
    Ok(totals)
}

/// Speaker-notes statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotesStats {
    pub total_slides: usize,
    pub slides_with_notes: usize,
    pub slides_without_notes: usize,
    pub total_characters: usize,
    pub total_words: usize,
    pub avg_words_per_slide: usize,
}

/// Count notes coverage, characters and words
pub fn notes_stats(package: &Package) -> Result<NotesStats> {
    let mut stats = NotesStats::default();
    for slide in deck::slides(package)? {
        stats.total_slides += 1;
        let notes = deck::notes_text(package, &slide)?;
        if notes.trim().is_empty() {
            stats.slides_without_notes += 1;
        } else {
            stats.slides_with_notes += 1;
            stats.total_characters += notes.chars().count();
            stats.total_words += notes.split_whitespace().count();
        }
    }
    if stats.slides_with_notes > 0 {
        stats.avg_words_per_slide =
            (stats.total_words as f64 / stats.slides_with_notes as f64).round() as usize;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxdeck_ooxml::XmlDocument;

    fn body(xml: &str) -> XmlElement {
        let wrapped = format!(
            r#"<p:txBody xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><a:bodyPr/><a:lstStyle/>{xml}</p:txBody>"#
        );
        XmlDocument::parse("test", wrapped.as_bytes()).unwrap().root
    }

    fn three_runs() -> XmlElement {
        body(
            r#"<a:p><a:r><a:rPr b="1"/><a:t>Hel</a:t></a:r><a:r><a:rPr i="1"/><a:t>lo Wo</a:t></a:r><a:r><a:rPr u="sng"/><a:t>rld</a:t></a:r></a:p>"#,
        )
    }

    fn runs(body: &XmlElement) -> Vec<(String, String)> {
        body.find_all("r")
            .into_iter()
            .map(|r| {
                let rpr = r
                    .child("rPr")
                    .and_then(|p| p.attributes.first())
                    .map(|(k, v)| format!("{k}={v}"))
                    .unwrap_or_default();
                (rpr, run_text(r))
            })
            .collect()
    }

    fn options() -> SearchOptions {
        SearchOptions {
            case_sensitive: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_view_concatenates_runs() {
        let view = TextBodyView::read(&three_runs());
        assert_eq!(view.text, "Hello World");
        assert_eq!(view.run_count(), 3);
    }

    #[test]
    fn test_cross_run_replace() {
        let mut body = three_runs();
        let matcher = Matcher::new("llo Wo", &options()).unwrap();
        let stats = replace_in_body(&mut body, &matcher, "y Ea");

        assert_eq!(stats.applied, 1);
        assert_eq!(body_text(&body), "Hey Earld");
        assert_eq!(
            runs(&body),
            vec![
                ("b=1".to_string(), "Hey Ea".to_string()),
                ("u=sng".to_string(), "rld".to_string()),
            ]
        );
    }

    #[test]
    fn test_replace_within_single_run_and_repeated() {
        let mut body = body(r#"<a:p><a:r><a:t>cat and cat</a:t></a:r><a:r><a:rPr b="1"/><a:t> and cat</a:t></a:r></a:p>"#);
        let matcher = Matcher::new("cat", &options()).unwrap();
        let stats = replace_in_body(&mut body, &matcher, "dog");
        assert_eq!(stats.applied, 3);
        assert_eq!(body_text(&body), "dog and dog and dog");
        assert_eq!(runs(&body)[1], ("b=1".to_string(), " and dog".to_string()));
    }

    #[test]
    fn test_replace_consuming_whole_runs() {
        let mut body = three_runs();
        let matcher = Matcher::new("Hello World", &options()).unwrap();
        replace_in_body(&mut body, &matcher, "Hi");
        assert_eq!(runs(&body), vec![("b=1".to_string(), "Hi".to_string())]);

        let mut body = three_runs();
        let matcher = Matcher::new("Hel", &options()).unwrap();
        replace_in_body(&mut body, &matcher, "");
        assert_eq!(body_text(&body), "lo World");
        assert_eq!(runs(&body).len(), 2);
    }

    #[test]
    fn test_matches_across_paragraphs_and_fields_are_skipped() {
        let mut body = body(
            r#"<a:p><a:r><a:t>end</a:t></a:r></a:p><a:p><a:r><a:t>start</a:t></a:r><a:fld id="{1}" type="slidenum"><a:t>4</a:t></a:fld></a:p>"#,
        );
        let view = TextBodyView::read(&body);
        assert_eq!(view.text, "end\nstart4");

        let matcher = Matcher::new(r"d\ns", &SearchOptions { regex: true, ..options() }).unwrap();
        let stats = replace_in_body(&mut body, &matcher, "X");
        assert_eq!(stats, ApplyStats { applied: 0, skipped: 1 });

        let matcher = Matcher::new("t4", &options()).unwrap();
        assert_eq!(replace_in_body(&mut body, &matcher, "X").skipped, 1);
        assert_eq!(body_text(&body), "end\nstart4");
    }

    #[test]
    fn test_case_insensitive_and_regex_expansion() {
        let mut body = body(r#"<a:p><a:r><a:t>Version 1.0 and VERSION 2.0</a:t></a:r></a:p>"#);
        let opts = SearchOptions {
            regex: true,
            ..Default::default()
        };
        let matcher = Matcher::new(r"version (\d)\.0", &opts).unwrap();
        replace_in_body(&mut body, &matcher, "v$1");
        assert_eq!(body_text(&body), "v1 and v2");
    }

    #[test]
    fn test_literal_replacement_does_not_expand() {
        let mut body = body(r#"<a:p><a:r><a:t>price</a:t></a:r></a:p>"#);
        let matcher = Matcher::new("price", &options()).unwrap();
        replace_in_body(&mut body, &matcher, "$1 dollars");
        assert_eq!(body_text(&body), "$1 dollars");
    }

    #[test]
    fn test_matcher_errors() {
        assert!(matches!(Matcher::new("", &options()), Err(DeckError::EmptySearch)));
        let regex = SearchOptions {
            regex: true,
            ..Default::default()
        };
        assert!(matches!(Matcher::new("(", &regex), Err(DeckError::InvalidPattern(_))));
        // literal mode escapes metacharacters
        assert!(Matcher::new("(", &options()).is_ok());
    }

    #[test]
    fn test_set_body_text_keeps_formatting() {
        let mut body = body(
            r#"<a:p><a:pPr algn="l"/><a:r><a:rPr lang="en-US" sz="1200"/><a:t>old</a:t></a:r><a:endParaRPr lang="en-US"/></a:p><a:p><a:r><a:t>older</a:t></a:r></a:p>"#,
        );
        set_body_text(&mut body, "first\n\nthird");

        assert_eq!(body_text(&body), "first\n\nthird");
        let paragraphs: Vec<&XmlElement> = body.children_named("p").collect();
        assert_eq!(paragraphs.len(), 3);
        assert!(paragraphs.iter().all(|p| p.child("pPr").is_some()));
        assert!(paragraphs[1].child("r").is_none());
        assert_eq!(
            paragraphs[2].path(&["r", "rPr"]).unwrap().attr("sz"),
            Some("1200")
        );
        // bodyPr and lstStyle stay ahead of the paragraphs
        assert!(body.elements().next().unwrap().is("bodyPr"));
    }

    #[test]
    fn test_context_snippet() {
        let text = format!("{}needle{}", "a".repeat(60), "b".repeat(10));
        let start = 60;
        let snippet = context_snippet(&text, start, start + 6, CONTEXT_CHARS);
        assert_eq!(snippet, format!("...{}needle{}", "a".repeat(50), "b".repeat(10)));

        assert_eq!(context_snippet("short needle", 6, 12, CONTEXT_CHARS), "short needle");
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("a\u{0}b\u{b}c\td\ne\r\u{7f}"), "abc\td\ne\r");
        assert_eq!(sanitize_text("naïve – ok"), "naïve – ok");
    }
}
