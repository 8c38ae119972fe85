//! Speaker notes export and import
//!
//! Notes leave the deck as a plain-text, Markdown or Word file, get edited
//! outside, and come back through [`parse_file`], [`diff`] and [`apply`].
//! All three formats share one layout: a `Slide N: Title` header per slide,
//! followed by the notes or a `[No notes]` placeholder.
//!
//! A notes line that would read back as layout (a header, a rule, a heading
//! or the placeholder) is written with a leading `\`, as is any line that
//! already starts with one; the parser drops that first backslash.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};
use voxdeck_ooxml::path::{next_numbered_name, relative_target};
use voxdeck_ooxml::{Package, PackageError, Relationships, TargetMode, XmlDocument, XmlElement};

use crate::constants::*;
use crate::deck::{self, notes_body_mut, SlideRef};
use crate::error::{DeckError, Result};
use crate::report::{EventSink, OperationReport, Unit};
use crate::text::set_body_text;

/// Placeholder written for slides without notes
pub const NO_NOTES: &str = "[No notes]";
const NO_NOTES_MARKDOWN: &str = "*[No notes]*";

const RULE_WIDTH: usize = 50;
const THIN_RULE: char = '─';
const THICK_RULE: char = '═';

/// Marks a notes line that is text, not layout
const ESCAPE: char = '\\';

const NS_WORD: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const CT_WORD_DOCUMENT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const CT_WORD_STYLES: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
const REL_TYPE_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

/// File layout of exported notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotesFormat {
    /// `.txt`
    Text,
    /// `.md`
    Markdown,
    /// `.docx`
    RichText,
}

impl NotesFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" => Ok(NotesFormat::Text),
            "md" | "markdown" => Ok(NotesFormat::Markdown),
            "docx" => Ok(NotesFormat::RichText),
            _ => Err(DeckError::unsupported(if ext.is_empty() {
                path.display().to_string()
            } else {
                format!(".{ext}")
            })),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            NotesFormat::Text => "txt",
            NotesFormat::Markdown => "md",
            NotesFormat::RichText => "docx",
        }
    }
}

/// Font settings for Word export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichTextOptions {
    pub font: String,
    /// Body size in points; slide headers are two points larger
    pub font_size: u32,
}

impl Default for RichTextOptions {
    fn default() -> Self {
        Self {
            font: "Calibri".to_string(),
            font_size: 14,
        }
    }
}

/// Notes of one slide, as exported or as read back from a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteEntry {
    pub slide: usize,
    pub title: String,
    pub notes: String,
}

impl NoteEntry {
    fn header(&self) -> String {
        if self.title.is_empty() {
            format!("Slide {}", self.slide)
        } else {
            format!("Slide {}: {}", self.slide, self.title)
        }
    }
}

/// Every slide's title and notes in presentation order
pub fn collect_notes(package: &Package) -> Result<Vec<NoteEntry>> {
    deck::slides(package)?
        .iter()
        .map(|slide| {
            Ok(NoteEntry {
                slide: slide.number,
                title: deck::slide_title(package, slide)?,
                notes: deck::notes_text(package, slide)?.trim().to_string(),
            })
        })
        .collect()
}

/// Header line pattern, `Slide N` or `Slide N: Title`
fn header_pattern(markdown: bool) -> &'static Regex {
    static TEXT_HEADER: OnceLock<Regex> = OnceLock::new();
    static MARKDOWN_HEADER: OnceLock<Regex> = OnceLock::new();

    if markdown {
        MARKDOWN_HEADER.get_or_init(|| Regex::new(r"(?i)^##\s+Slide\s+(\d+)(?::\s*(.*))?$").unwrap())
    } else {
        TEXT_HEADER.get_or_init(|| Regex::new(r"(?i)^Slide\s+(\d+)(?::\s*(.*))?$").unwrap())
    }
}

/// Whether the parser would take a line as layout rather than notes text
fn is_layout(line: &str, markdown: bool) -> bool {
    let text = line.trim();
    if header_pattern(markdown).is_match(text) {
        return true;
    }
    if markdown {
        text.starts_with("# ") || text == "---" || text == NO_NOTES_MARKDOWN
    } else {
        is_rule(text) || text == NO_NOTES
    }
}

/// Notes lines as written to an export, escaped where they would read back as layout
fn escaped_lines(notes: &str, markdown: bool) -> impl Iterator<Item = String> + '_ {
    notes.split('\n').map(move |line| {
        if line.starts_with(ESCAPE) || is_layout(line, markdown) {
            format!("{ESCAPE}{line}")
        } else {
            line.to_string()
        }
    })
}

pub fn render_text(entries: &[NoteEntry]) -> String {
    let thin: String = std::iter::repeat(THIN_RULE).take(RULE_WIDTH).collect();
    let thick: String = std::iter::repeat(THICK_RULE).take(RULE_WIDTH).collect();

    let mut lines = Vec::new();
    for entry in entries {
        lines.push(entry.header());
        lines.push(thin.clone());
        lines.push(String::new());
        if entry.notes.is_empty() {
            lines.push(NO_NOTES.to_string());
        } else {
            lines.extend(escaped_lines(&entry.notes, false));
        }
        lines.push(String::new());
        lines.push(thick.clone());
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn render_markdown(entries: &[NoteEntry]) -> String {
    let mut lines = vec!["# Speaker Notes".to_string(), String::new()];
    for entry in entries {
        lines.push(format!("## {}", entry.header()));
        lines.push(String::new());
        if entry.notes.is_empty() {
            lines.push(NO_NOTES_MARKDOWN.to_string());
        } else {
            lines.extend(escaped_lines(&entry.notes, true));
        }
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
    }
    lines.join("\n")
}

fn word_run(text: &str, properties: Option<XmlElement>) -> XmlElement {
    let mut run = XmlElement::new("w:r");
    if let Some(properties) = properties {
        run.push(properties);
    }
    run.with_child(XmlElement::new("w:t").with_attr("xml:space", "preserve").with_text(text))
}

fn word_paragraph(spacing: Option<(u32, u32)>, runs: Vec<XmlElement>) -> XmlElement {
    let mut paragraph = XmlElement::new("w:p");
    if let Some((before, after)) = spacing {
        paragraph.push(
            XmlElement::new("w:pPr").with_child(
                XmlElement::new("w:spacing")
                    .with_attr("w:before", before.to_string())
                    .with_attr("w:after", after.to_string()),
            ),
        );
    }
    for run in runs {
        paragraph.push(run);
    }
    paragraph
}

/// Half-point size element
fn word_size(points: u32) -> XmlElement {
    XmlElement::new("w:sz").with_attr("w:val", (points * 2).to_string())
}

fn word_styles(options: &RichTextOptions) -> XmlDocument {
    let fonts = XmlElement::new("w:rFonts")
        .with_attr("w:ascii", options.font.as_str())
        .with_attr("w:hAnsi", options.font.as_str())
        .with_attr("w:cs", options.font.as_str());

    let defaults = XmlElement::new("w:docDefaults").with_child(
        XmlElement::new("w:rPrDefault").with_child(
            XmlElement::new("w:rPr")
                .with_child(fonts.clone())
                .with_child(word_size(options.font_size)),
        ),
    );

    // 1.5 line spacing, 12pt after
    let normal = XmlElement::new("w:style")
        .with_attr("w:type", "paragraph")
        .with_attr("w:default", "1")
        .with_attr("w:styleId", "Normal")
        .with_child(XmlElement::new("w:name").with_attr("w:val", "Normal"))
        .with_child(
            XmlElement::new("w:pPr").with_child(
                XmlElement::new("w:spacing")
                    .with_attr("w:after", "240")
                    .with_attr("w:line", "360")
                    .with_attr("w:lineRule", "auto"),
            ),
        )
        .with_child(
            XmlElement::new("w:rPr")
                .with_child(fonts)
                .with_child(word_size(options.font_size)),
        );

    XmlDocument::new(
        XmlElement::new("w:styles")
            .with_attr("xmlns:w", NS_WORD)
            .with_child(defaults)
            .with_child(normal),
    )
}

fn word_document(entries: &[NoteEntry], options: &RichTextOptions) -> XmlDocument {
    let mut body = XmlElement::new("w:body");
    let rule: String = std::iter::repeat(THIN_RULE).take(RULE_WIDTH).collect();

    for entry in entries {
        let header_props = XmlElement::new("w:rPr")
            .with_child(XmlElement::new("w:b"))
            .with_child(word_size(options.font_size + 2));
        body.push(word_paragraph(Some((360, 120)), vec![word_run(&entry.header(), Some(header_props))]));

        let rule_props = XmlElement::new("w:rPr").with_child(word_size(10));
        body.push(word_paragraph(Some((0, 240)), vec![word_run(&rule, Some(rule_props))]));

        if entry.notes.is_empty() {
            let italic = XmlElement::new("w:rPr").with_child(XmlElement::new("w:i"));
            body.push(word_paragraph(None, vec![word_run(NO_NOTES, Some(italic))]));
        } else {
            for line in escaped_lines(&entry.notes, false) {
                let runs = if line.is_empty() { Vec::new() } else { vec![word_run(&line, None)] };
                body.push(word_paragraph(None, runs));
            }
        }
        body.push(word_paragraph(Some((0, 120)), Vec::new()));
    }

    XmlDocument::new(
        XmlElement::new("w:document")
            .with_attr("xmlns:w", NS_WORD)
            .with_child(body),
    )
}

/// Word document bytes for the notes, built as an OPC package
pub fn render_docx(entries: &[NoteEntry], options: &RichTextOptions) -> Result<Vec<u8>> {
    let mut docx = Package::new();
    let document = "word/document.xml";
    docx.relationships_mut("")
        .add(document, Relationships::TYPE_OFFICE_DOCUMENT, TargetMode::Internal);
    docx.relationships_mut(document)
        .add("styles.xml", REL_TYPE_STYLES, TargetMode::Internal);
    docx.put_xml(document, word_document(entries, options), CT_WORD_DOCUMENT);
    docx.put_xml("word/styles.xml", word_styles(options), CT_WORD_STYLES);
    Ok(docx.to_bytes()?)
}

/// Outcome of [`export`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub format: NotesFormat,
    pub slides: usize,
    pub slides_with_notes: usize,
}

/// Write every slide's notes to `dest`, in the format its extension names
pub fn export(package: &Package, dest: &Path, options: &RichTextOptions) -> Result<ExportSummary> {
    let format = NotesFormat::from_path(dest)?;
    let entries = collect_notes(package)?;

    let bytes = match format {
        NotesFormat::Text => render_text(&entries).into_bytes(),
        NotesFormat::Markdown => render_markdown(&entries).into_bytes(),
        NotesFormat::RichText => render_docx(&entries, options)?,
    };
    fs::write(dest, bytes)?;

    let summary = ExportSummary {
        path: dest.to_path_buf(),
        format,
        slides: entries.len(),
        slides_with_notes: entries.iter().filter(|e| !e.notes.is_empty()).count(),
    };
    info!(
        path = %dest.display(),
        slides = summary.slides,
        with_notes = summary.slides_with_notes,
        "notes exported"
    );
    Ok(summary)
}

fn is_rule(line: &str) -> bool {
    line.chars().count() >= 10 && line.chars().all(|c| c == THIN_RULE || c == THICK_RULE)
}

/// Parse notes laid out as header lines followed by free text
fn parse_lines<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    markdown: bool,
) -> Result<Vec<NoteEntry>> {
    let header = header_pattern(markdown);
    let placeholder = if markdown { NO_NOTES_MARKDOWN } else { NO_NOTES };

    fn close(current: &mut Option<NoteEntry>, body: &mut Vec<String>, entries: &mut Vec<NoteEntry>) {
        if let Some(mut entry) = current.take() {
            entry.notes = body.join("\n").trim().to_string();
            entries.push(entry);
        }
        body.clear();
    }

    let mut entries = Vec::new();
    let mut current: Option<NoteEntry> = None;
    let mut body: Vec<String> = Vec::new();

    for (index, line) in lines.into_iter().enumerate() {
        let text = line.trim();
        if markdown && (text.starts_with("# ") || text == "---") {
            continue;
        }
        if !markdown && is_rule(text) {
            continue;
        }

        if let Some(caps) = header.captures(text) {
            let slide = caps[1]
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| DeckError::notes_format(index + 1, format!("invalid slide number '{}'", &caps[1])))?;
            close(&mut current, &mut body, &mut entries);
            current = Some(NoteEntry {
                slide,
                title: caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                notes: String::new(),
            });
        } else if current.is_some() {
            if text != placeholder {
                body.push(line.strip_prefix(ESCAPE).unwrap_or(line).to_string());
            }
        } else if !text.is_empty() {
            debug!(line = index + 1, "text before the first slide header ignored");
        }
    }
    close(&mut current, &mut body, &mut entries);

    if entries.is_empty() {
        return Err(DeckError::notes_format(1, "no 'Slide N' header found"));
    }
    Ok(entries)
}

pub fn parse_text(content: &str) -> Result<Vec<NoteEntry>> {
    parse_lines(content.lines(), false)
}

pub fn parse_markdown(content: &str) -> Result<Vec<NoteEntry>> {
    parse_lines(content.lines(), true)
}

/// Parse a Word export; every paragraph is one line
pub fn parse_docx(bytes: &[u8]) -> Result<Vec<NoteEntry>> {
    let docx = Package::from_bytes(bytes)?;
    let main = docx.main_document()?;
    let doc = docx.read_xml(&main)?;
    let body = doc
        .root
        .child("body")
        .ok_or_else(|| PackageError::malformed(&main, "document without a body"))?;

    let paragraphs: Vec<String> = body
        .find_all("p")
        .into_iter()
        .map(|p| {
            p.find_all("t")
                .into_iter()
                .map(|t| t.text())
                .collect::<String>()
        })
        .collect();
    parse_lines(paragraphs.iter().map(String::as_str), false)
}

/// Read an edited notes file, choosing the parser by extension
pub fn parse_file(path: &Path) -> Result<Vec<NoteEntry>> {
    let entries = match NotesFormat::from_path(path)? {
        NotesFormat::Text => parse_text(&fs::read_to_string(path)?)?,
        NotesFormat::Markdown => parse_markdown(&fs::read_to_string(path)?)?,
        NotesFormat::RichText => parse_docx(&fs::read(path)?)?,
    };
    debug!(path = %path.display(), slides = entries.len(), "notes file parsed");
    Ok(entries)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The slide had no notes
    Added,
    /// The edited notes are empty
    Removed,
    Modified,
}

/// One slide whose notes differ from the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteChange {
    pub slide: usize,
    pub title: String,
    pub original: String,
    pub edited: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotesDiff {
    pub changes: Vec<NoteChange>,
    /// Slide numbers in the file that the deck does not have
    pub unmatched: Vec<usize>,
}

impl NotesDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compare edited notes with the deck's; whitespace around the notes is ignored
pub fn diff(package: &Package, edited: &[NoteEntry]) -> Result<NotesDiff> {
    let live = collect_notes(package)?;
    let mut result = NotesDiff::default();

    for entry in edited {
        let Some(current) = live.iter().find(|l| l.slide == entry.slide) else {
            if !result.unmatched.contains(&entry.slide) {
                result.unmatched.push(entry.slide);
            }
            continue;
        };

        let original = current.notes.trim();
        let edited = entry.notes.trim();
        if original == edited {
            continue;
        }
        let kind = match (original.is_empty(), edited.is_empty()) {
            (true, _) => ChangeKind::Added,
            (false, true) => ChangeKind::Removed,
            (false, false) => ChangeKind::Modified,
        };

        // A slide listed twice keeps its last version
        result.changes.retain(|c| c.slide != entry.slide);
        result.changes.push(NoteChange {
            slide: entry.slide,
            title: current.title.clone(),
            original: original.to_string(),
            edited: edited.to_string(),
            kind,
        });
    }

    result.changes.sort_by_key(|c| c.slide);
    if !result.unmatched.is_empty() {
        warn!(slides = ?result.unmatched, "notes file names slides the deck does not have");
    }
    Ok(result)
}

/// A notes slide with an empty body placeholder
fn blank_notes_slide() -> XmlDocument {
    let placeholder = |id: u32, name: &str, ph: XmlElement| {
        XmlElement::new("p:sp")
            .with_child(
                XmlElement::new("p:nvSpPr")
                    .with_child(
                        XmlElement::new("p:cNvPr")
                            .with_attr("id", id.to_string())
                            .with_attr("name", name),
                    )
                    .with_child(
                        XmlElement::new("p:cNvSpPr")
                            .with_child(XmlElement::new("a:spLocks").with_attr("noGrp", "1")),
                    )
                    .with_child(XmlElement::new("p:nvPr").with_child(ph)),
            )
            .with_child(XmlElement::new("p:spPr"))
    };

    let image = placeholder(2, "Slide Image Placeholder 1", XmlElement::new("p:ph").with_attr("type", "sldImg"));
    let body = placeholder(
        3,
        "Notes Placeholder 2",
        XmlElement::new("p:ph").with_attr("type", "body").with_attr("idx", "1"),
    )
    .with_child(
        XmlElement::new("p:txBody")
            .with_child(XmlElement::new("a:bodyPr"))
            .with_child(XmlElement::new("a:lstStyle"))
            .with_child(XmlElement::new("a:p")),
    );

    let tree = XmlElement::new("p:spTree")
        .with_child(
            XmlElement::new("p:nvGrpSpPr")
                .with_child(XmlElement::new("p:cNvPr").with_attr("id", "1").with_attr("name", ""))
                .with_child(XmlElement::new("p:cNvGrpSpPr"))
                .with_child(XmlElement::new("p:nvPr")),
        )
        .with_child(XmlElement::new("p:grpSpPr"))
        .with_child(image)
        .with_child(body);

    XmlDocument::new(
        XmlElement::new("p:notes")
            .with_attr("xmlns:a", NS_DRAWING)
            .with_attr("xmlns:r", NS_RELATIONSHIPS)
            .with_attr("xmlns:p", NS_PRESENTATION)
            .with_child(XmlElement::new("p:cSld").with_child(tree))
            .with_child(
                XmlElement::new("p:clrMapOvr").with_child(XmlElement::new("a:masterClrMapping")),
            ),
    )
}

/// Give a slide a notes page linked to the notes master; returns its part name
fn create_notes_page(package: &mut Package, slide: &SlideRef) -> Result<String> {
    let master = deck::notes_master(package)?.ok_or(DeckError::MissingNotesMaster(slide.number))?;
    let part = next_numbered_name(package.part_names(), "ppt/notesSlides", "notesSlide", "xml");

    package.put_xml(&part, blank_notes_slide(), CT_NOTES_SLIDE);
    package
        .relationships_mut(&part)
        .add(relative_target(&part, &master), REL_TYPE_NOTES_MASTER, TargetMode::Internal);
    package
        .relationships_mut(&part)
        .add(relative_target(&part, &slide.part), REL_TYPE_SLIDE, TargetMode::Internal);
    package
        .relationships_mut(&slide.part)
        .add(relative_target(&slide.part, &part), REL_TYPE_NOTES_SLIDE, TargetMode::Internal);

    debug!(slide = slide.number, part = %part, "notes page created");
    Ok(part)
}

fn apply_one(package: &mut Package, slide: &SlideRef, notes: &str) -> Result<()> {
    let part = match &slide.notes {
        Some(part) => part.clone(),
        None => create_notes_page(package, slide)?,
    };
    let doc = package.xml_mut(&part)?;
    let body = notes_body_mut(doc)
        .ok_or_else(|| PackageError::malformed(&part, "notes page without a body placeholder"))?;
    set_body_text(body, notes);
    Ok(())
}

/// Write changed notes into the deck
///
/// With `slides` given, only changes for those slide numbers are applied.
pub fn apply(
    package: &mut Package,
    changes: &[NoteChange],
    slides: Option<&[usize]>,
    sink: &mut dyn EventSink,
) -> Result<OperationReport> {
    let mut report = OperationReport::new("import notes");
    let deck_slides = deck::slides(package)?;

    for change in changes {
        if slides.is_some_and(|wanted| !wanted.contains(&change.slide)) {
            continue;
        }
        let unit = Unit::Slide(change.slide);
        let result = deck_slides
            .iter()
            .find(|s| s.number == change.slide)
            .ok_or(DeckError::SlideNotFound(change.slide))
            .and_then(|slide| apply_one(package, slide, &change.edited));

        match result {
            Ok(()) => {
                report.touch(change.slide, 1);
                report.processed(sink, unit, format!("notes {:?}", change.kind).to_lowercase());
            }
            Err(err) => report.failed(sink, unit, &err),
        }
    }

    info!(slides = report.changed, errors = report.errors.len(), "notes imported");
    report.finish(sink);
    Ok(report)
}

/// Result of [`import`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub diff: NotesDiff,
    /// Absent in preview mode
    pub report: Option<OperationReport>,
}

/// Parse `source`, compare it with the deck and, unless previewing, apply the changes
pub fn import(
    package: &mut Package,
    source: &Path,
    preview: bool,
    slides: Option<&[usize]>,
    sink: &mut dyn EventSink,
) -> Result<ImportSummary> {
    let edited = parse_file(source)?;
    let diff = diff(package, &edited)?;
    for slide in &diff.unmatched {
        sink.emit(crate::report::EngineEvent::UnitSkipped {
            unit: Unit::Slide(*slide),
            reason: "not in the deck".to_string(),
        });
    }

    let report = if preview {
        None
    } else {
        Some(apply(package, &diff.changes, slides, sink)?)
    };
    Ok(ImportSummary { diff, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{DeckBuilder, SlideSpec};
    use crate::report::NullSink;

    fn deck() -> Package {
        DeckBuilder::new()
            .slide(SlideSpec::titled("Welcome").notes("Hello everyone.\nToday we cover safety."))
            .slide(SlideSpec::titled("Agenda"))
            .slide(SlideSpec::untitled().notes("Closing words"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_format_by_extension() {
        assert_eq!(NotesFormat::from_path(Path::new("a.TXT")).unwrap(), NotesFormat::Text);
        assert_eq!(NotesFormat::from_path(Path::new("a.md")).unwrap(), NotesFormat::Markdown);
        assert_eq!(NotesFormat::from_path(Path::new("a.docx")).unwrap(), NotesFormat::RichText);
        assert!(matches!(
            NotesFormat::from_path(Path::new("a.pdf")),
            Err(DeckError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_text_layout() {
        let entries = collect_notes(&deck()).unwrap();
        let text = render_text(&entries);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Slide 1: Welcome");
        assert_eq!(lines[1].chars().count(), 50);
        assert!(lines[1].chars().all(|c| c == '─'));
        assert_eq!(lines[3], "Hello everyone.");
        assert!(text.contains("Slide 2: Agenda\n"));
        assert!(text.contains(NO_NOTES));
        assert!(text.contains("Slide 3\n"));
    }

    #[test]
    fn test_markdown_layout() {
        let entries = collect_notes(&deck()).unwrap();
        let md = render_markdown(&entries);
        assert!(md.starts_with("# Speaker Notes\n\n## Slide 1: Welcome\n\n"));
        assert!(md.contains("*[No notes]*"));
        assert!(md.contains("\n---\n"));
    }

    #[test]
    fn test_exports_parse_back_unchanged() {
        let pkg = deck();
        let entries = collect_notes(&pkg).unwrap();

        let from_text = parse_text(&render_text(&entries)).unwrap();
        let from_md = parse_markdown(&render_markdown(&entries)).unwrap();
        let from_docx = parse_docx(&render_docx(&entries, &RichTextOptions::default()).unwrap()).unwrap();

        for parsed in [from_text, from_md, from_docx] {
            assert_eq!(parsed, entries);
            assert!(diff(&pkg, &parsed).unwrap().is_empty());
        }
    }

    #[test]
    fn test_notes_resembling_layout_parse_back_unchanged() {
        let pkg = DeckBuilder::new()
            .slide(SlideSpec::titled("Spaces").notes("Intro   \nNext"))
            .slide(SlideSpec::titled("Headings").notes("# Agenda\n---\nBody"))
            .slide(SlideSpec::titled("Headers").notes("See below\nSlide 2: recap\nend"))
            .slide(
                SlideSpec::titled("Markers")
                    .notes("──────────────\n[No notes]\n*[No notes]*\n\\already escaped\n## Slide 9"),
            )
            .build()
            .unwrap();
        let entries = collect_notes(&pkg).unwrap();
        assert_eq!(entries[0].notes, "Intro   \nNext");

        let text = render_text(&entries);
        assert!(text.contains("\n\\Slide 2: recap\n"));
        assert!(text.contains("\n\\\\already escaped\n"));
        let md = render_markdown(&entries);
        assert!(md.contains("\n\\# Agenda\n\\---\nBody\n"));

        let from_text = parse_text(&text).unwrap();
        let from_md = parse_markdown(&md).unwrap();
        let from_docx = parse_docx(&render_docx(&entries, &RichTextOptions::default()).unwrap()).unwrap();

        for parsed in [from_text, from_md, from_docx] {
            assert_eq!(parsed, entries);
            assert!(diff(&pkg, &parsed).unwrap().is_empty());
        }
    }

    #[test]
    fn test_parse_keeps_inner_blank_lines() {
        let content = "Slide 4: Demo\n──────────────\n\nFirst\n\nSecond  \n\n══════════════\n";
        let entries = parse_text(content).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].slide, 4);
        assert_eq!(entries[0].title, "Demo");
        assert_eq!(entries[0].notes, "First\n\nSecond");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_text("just some text"), Err(DeckError::NotesFormat { line: 1, .. })));
        assert!(matches!(
            parse_text("Slide 1\nok\nslide 0: Bad"),
            Err(DeckError::NotesFormat { line: 3, .. })
        ));
    }

    #[test]
    fn test_diff_kinds_and_unmatched() {
        let pkg = deck();
        let edited = parse_text(
            "Slide 1: Welcome\nHello all.\nSlide 2\nNew agenda notes\nSlide 3\n[No notes]\nSlide 9\nGhost",
        )
        .unwrap();
        let diff = diff(&pkg, &edited).unwrap();

        let kinds: Vec<(usize, ChangeKind)> = diff.changes.iter().map(|c| (c.slide, c.kind)).collect();
        assert_eq!(
            kinds,
            vec![(1, ChangeKind::Modified), (2, ChangeKind::Added), (3, ChangeKind::Removed)]
        );
        assert_eq!(diff.unmatched, vec![9]);
    }

    #[test]
    fn test_apply_creates_missing_notes_page() {
        let mut pkg = deck();
        let diff = diff(&pkg, &parse_text("Slide 2\nFresh notes\nsecond line").unwrap()).unwrap();
        let report = apply(&mut pkg, &diff.changes, None, &mut NullSink).unwrap();
        assert_eq!(report.slides, vec![2]);

        let slide = deck::slide(&pkg, 2).unwrap();
        let notes = slide.notes.clone().unwrap();
        assert!(notes.starts_with("ppt/notesSlides/notesSlide"));
        assert_eq!(deck::notes_text(&pkg, &slide).unwrap(), "Fresh notes\nsecond line");
        assert_eq!(pkg.content_type(&notes), Some(CT_NOTES_SLIDE));
    }

    #[test]
    fn test_apply_without_notes_master_fails_that_slide() {
        let mut pkg = DeckBuilder::new()
            .without_notes_master()
            .slide(SlideSpec::titled("Only"))
            .build()
            .unwrap();
        let diff = diff(&pkg, &parse_text("Slide 1\nText").unwrap()).unwrap();
        let report = apply(&mut pkg, &diff.changes, None, &mut NullSink).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, DeckError::MissingNotesMaster(1).code());
    }

    #[test]
    fn test_apply_respects_slide_filter() {
        let mut pkg = deck();
        let edited = parse_text("Slide 1\nA\nSlide 3\nB").unwrap();
        let diff = diff(&pkg, &edited).unwrap();
        let report = apply(&mut pkg, &diff.changes, Some(&[3]), &mut NullSink).unwrap();
        assert_eq!(report.slides, vec![3]);
        let first = deck::slide(&pkg, 1).unwrap();
        assert_eq!(deck::notes_text(&pkg, &first).unwrap(), "Hello everyone.\nToday we cover safety.");
    }
}
