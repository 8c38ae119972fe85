//! Synthetic deck generation
//!
//! [`DeckBuilder`] writes a small but complete presentation package: theme,
//! one slide master with two layouts, an optional notes master, slides with
//! titles, multi-run text, groups, tables, notes, audio and animations, and
//! an optional section list. It is what the test suites work against.
//!
//! ```
//! use voxdeck_pptx::builder::{DeckBuilder, RunSpec, SlideSpec};
//!
//! let package = DeckBuilder::new()
//!     .slide(SlideSpec::titled("Welcome").notes("Say hello"))
//!     .slide(SlideSpec::titled("Details").runs(vec![
//!         RunSpec::new("Hel").bold(),
//!         RunSpec::new("lo Wo"),
//!         RunSpec::new("rld"),
//!     ]))
//!     .section("Intro", &[1])
//!     .section("Body", &[2])
//!     .build()?;
//! # Ok::<(), voxdeck_pptx::DeckError>(())
//! ```

use std::collections::BTreeMap;

use voxdeck_ooxml::path::{extension, relative_target};
use voxdeck_ooxml::xml::{escape_attr, escape_text};
use voxdeck_ooxml::{Package, TargetMode, XmlDocument};

use crate::constants::*;
use crate::error::Result;
use crate::media::{self, MediaKind, MediaShape};

/// Fixed timestamp for generated document properties
const CREATED: &str = "2025-01-01T00:00:00Z";

const REL_TYPE_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_TYPE_EXTENDED_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
const REL_TYPE_PRES_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/presProps";
const REL_TYPE_VIEW_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/viewProps";
const REL_TYPE_TABLE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/tableStyles";

const CT_CORE_PROPERTIES: &str = "application/vnd.openxmlformats-package.core-properties+xml";
const CT_EXTENDED_PROPERTIES: &str =
    "application/vnd.openxmlformats-officedocument.extended-properties+xml";
const CT_PRES_PROPS: &str = "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml";
const CT_VIEW_PROPS: &str = "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml";
const CT_TABLE_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml";

/// Shared icon behind generated audio shapes
const ICON_PART: &str = "ppt/media/image1.png";

/// One formatted run of text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub typeface: Option<String>,
}

impl RunSpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn typeface(mut self, typeface: impl Into<String>) -> Self {
        self.typeface = Some(typeface.into());
        self
    }
}

/// Which layout a slide uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LayoutChoice {
    /// Layout 1, centered title
    Cover,
    /// Layout 2, title and content
    #[default]
    Content,
}

/// Description of one slide
#[derive(Debug, Clone, Default)]
pub struct SlideSpec {
    title: Option<String>,
    layout: LayoutChoice,
    paragraphs: Vec<Vec<RunSpec>>,
    grouped: Vec<String>,
    table: Vec<Vec<String>>,
    notes: Option<String>,
    audio: Vec<String>,
    animated: bool,
    link_to: Option<usize>,
}

impl SlideSpec {
    /// A title-and-content slide
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// A title slide using the cover layout (`ctrTitle` placeholder)
    pub fn cover(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            layout: LayoutChoice::Cover,
            ..Default::default()
        }
    }

    pub fn untitled() -> Self {
        Self::default()
    }

    /// Add a single-run paragraph to the body placeholder
    pub fn body(mut self, text: impl Into<String>) -> Self {
        self.paragraphs.push(vec![RunSpec::new(text)]);
        self
    }

    /// Add a paragraph made of several runs to the body placeholder
    pub fn runs(mut self, runs: Vec<RunSpec>) -> Self {
        self.paragraphs.push(runs);
        self
    }

    /// Add a text box inside a group shape
    pub fn grouped(mut self, text: impl Into<String>) -> Self {
        self.grouped.push(text.into());
        self
    }

    /// Add a table; one text cell per string
    pub fn table(mut self, rows: &[&[&str]]) -> Self {
        self.table = rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        self
    }

    /// Speaker notes, one paragraph per line
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Embed an audio clip stored as `ppt/media/{file_name}`; slides naming the same file share the part
    pub fn audio(mut self, file_name: impl Into<String>) -> Self {
        self.audio.push(file_name.into());
        self
    }

    /// Give the title an entrance animation
    pub fn animated(mut self) -> Self {
        self.animated = true;
        self
    }

    /// Hyperlink the title to another slide (1-based)
    pub fn link_to(mut self, slide: usize) -> Self {
        self.link_to = Some(slide);
        self
    }
}

/// Builds presentation packages in memory
#[derive(Debug, Clone)]
pub struct DeckBuilder {
    slides: Vec<SlideSpec>,
    sections: Vec<(String, Vec<usize>)>,
    media: BTreeMap<String, Vec<u8>>,
    notes_master: bool,
    slide_size: (i64, i64),
    title: String,
}

impl Default for DeckBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self {
            slides: Vec::new(),
            sections: Vec::new(),
            media: BTreeMap::new(),
            notes_master: true,
            slide_size: (DEFAULT_SLIDE_WIDTH_EMU, DEFAULT_SLIDE_HEIGHT_EMU),
            title: "Presentation".to_string(),
        }
    }

    pub fn slide(mut self, slide: SlideSpec) -> Self {
        self.slides.push(slide);
        self
    }

    pub fn slides(mut self, slides: impl IntoIterator<Item = SlideSpec>) -> Self {
        self.slides.extend(slides);
        self
    }

    /// Declare a section over 1-based slide numbers
    pub fn section(mut self, name: impl Into<String>, slides: &[usize]) -> Self {
        self.sections.push((name.into(), slides.to_vec()));
        self
    }

    /// Bytes for a media file referenced by [`SlideSpec::audio`]
    pub fn media(mut self, file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.media.insert(file_name.into(), bytes.into());
        self
    }

    /// Leave out the notes master (and so every notes page)
    pub fn without_notes_master(mut self) -> Self {
        self.notes_master = false;
        self
    }

    pub fn slide_size(mut self, cx: i64, cy: i64) -> Self {
        self.slide_size = (cx, cy);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Build and reopen, so the package looks exactly like one read from disk
    pub fn build(&self) -> Result<Package> {
        Ok(Package::from_bytes(&self.build_bytes()?)?)
    }

    /// Serialized archive
    pub fn build_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.assemble().to_bytes()?)
    }

    fn assemble(&self) -> Package {
        let mut pkg = Package::new();
        pkg.content_types_mut().ensure_default("png", "image/png");

        link(&mut pkg, "", REL_TYPE_OFFICE_DOCUMENT, "ppt/presentation.xml");
        link(&mut pkg, "", REL_TYPE_CORE_PROPERTIES, "docProps/core.xml");
        link(&mut pkg, "", REL_TYPE_EXTENDED_PROPERTIES, "docProps/app.xml");
        pkg.put_part("docProps/core.xml", self.core_xml().into_bytes(), CT_CORE_PROPERTIES);
        pkg.put_part("docProps/app.xml", self.app_xml().into_bytes(), CT_EXTENDED_PROPERTIES);

        let presentation = "ppt/presentation.xml";
        let master_rel = link(&mut pkg, presentation, REL_TYPE_SLIDE_MASTER, "ppt/slideMasters/slideMaster1.xml");
        let notes_master_rel = self
            .notes_master
            .then(|| link(&mut pkg, presentation, REL_TYPE_NOTES_MASTER, "ppt/notesMasters/notesMaster1.xml"));
        link(&mut pkg, presentation, REL_TYPE_PRES_PROPS, "ppt/presProps.xml");
        link(&mut pkg, presentation, REL_TYPE_VIEW_PROPS, "ppt/viewProps.xml");
        link(&mut pkg, presentation, REL_TYPE_THEME, "ppt/theme/theme1.xml");
        link(&mut pkg, presentation, REL_TYPE_TABLE_STYLES, "ppt/tableStyles.xml");
        let slide_rels: Vec<String> = (1..=self.slides.len())
            .map(|n| link(&mut pkg, presentation, REL_TYPE_SLIDE, &format!("ppt/slides/slide{n}.xml")))
            .collect();

        pkg.put_part(
            presentation,
            self.presentation_xml(&master_rel, notes_master_rel.as_deref(), &slide_rels)
                .into_bytes(),
            CT_PRESENTATION,
        );
        pkg.put_part("ppt/presProps.xml", pres_props_xml().into_bytes(), CT_PRES_PROPS);
        pkg.put_part("ppt/viewProps.xml", view_props_xml().into_bytes(), CT_VIEW_PROPS);
        pkg.put_part("ppt/tableStyles.xml", table_styles_xml().into_bytes(), CT_TABLE_STYLES);
        pkg.put_part("ppt/theme/theme1.xml", theme_xml("Office").into_bytes(), CT_THEME);

        let master = "ppt/slideMasters/slideMaster1.xml";
        let layout_rels = [
            link(&mut pkg, master, REL_TYPE_SLIDE_LAYOUT, "ppt/slideLayouts/slideLayout1.xml"),
            link(&mut pkg, master, REL_TYPE_SLIDE_LAYOUT, "ppt/slideLayouts/slideLayout2.xml"),
        ];
        link(&mut pkg, master, REL_TYPE_THEME, "ppt/theme/theme1.xml");
        pkg.put_part(master, slide_master_xml(&layout_rels).into_bytes(), CT_SLIDE_MASTER);

        for (n, layout) in [(1, cover_layout_xml()), (2, content_layout_xml())] {
            let path = format!("ppt/slideLayouts/slideLayout{n}.xml");
            link(&mut pkg, &path, REL_TYPE_SLIDE_MASTER, master);
            pkg.put_part(&path, layout.into_bytes(), CT_SLIDE_LAYOUT);
        }

        if self.notes_master {
            let notes_master = "ppt/notesMasters/notesMaster1.xml";
            link(&mut pkg, notes_master, REL_TYPE_THEME, "ppt/theme/theme2.xml");
            pkg.put_part(notes_master, notes_master_xml().into_bytes(), CT_NOTES_MASTER);
            pkg.put_part("ppt/theme/theme2.xml", theme_xml("Notes").into_bytes(), CT_THEME);
        }

        for (index, slide) in self.slides.iter().enumerate() {
            self.write_slide(&mut pkg, index + 1, slide);
        }

        pkg
    }

    fn write_slide(&self, pkg: &mut Package, number: usize, spec: &SlideSpec) {
        let path = format!("ppt/slides/slide{number}.xml");
        let layout = match spec.layout {
            LayoutChoice::Cover => "ppt/slideLayouts/slideLayout1.xml",
            LayoutChoice::Content => "ppt/slideLayouts/slideLayout2.xml",
        };
        link(pkg, &path, REL_TYPE_SLIDE_LAYOUT, layout);

        if let (Some(notes), true) = (&spec.notes, self.notes_master) {
            let notes_path = format!("ppt/notesSlides/notesSlide{number}.xml");
            link(pkg, &path, REL_TYPE_NOTES_SLIDE, &notes_path);
            link(pkg, &notes_path, REL_TYPE_NOTES_MASTER, "ppt/notesMasters/notesMaster1.xml");
            link(pkg, &notes_path, REL_TYPE_SLIDE, &path);
            pkg.put_part(&notes_path, notes_slide_xml(notes).into_bytes(), CT_NOTES_SLIDE);
        }

        let link_rel = spec
            .link_to
            .map(|target| link(pkg, &path, REL_TYPE_SLIDE, &format!("ppt/slides/slide{target}.xml")));

        let mut shapes = String::new();
        let mut next_id = 2;

        if let Some(title) = &spec.title {
            let ph = match spec.layout {
                LayoutChoice::Cover => r#"type="ctrTitle""#,
                LayoutChoice::Content => r#"type="title""#,
            };
            let click = link_rel
                .as_deref()
                .map(|rid| format!(r#"<a:hlinkClick r:id="{rid}" action="ppaction://hlinksldjump"/>"#))
                .unwrap_or_default();
            shapes.push_str(&text_shape(
                next_id,
                "Title 1",
                Some(ph),
                &format!(
                    r#"<a:p><a:r><a:rPr lang="en-US">{click}</a:rPr><a:t>{}</a:t></a:r></a:p>"#,
                    escape_text(title)
                ),
            ));
        }
        next_id += 1;

        if !spec.paragraphs.is_empty() {
            let paragraphs: String = spec.paragraphs.iter().map(|runs| paragraph_xml(runs)).collect();
            shapes.push_str(&text_shape(next_id, "Content Placeholder 2", Some(r#"idx="1""#), &paragraphs));
        }
        next_id += 1;

        if !spec.grouped.is_empty() {
            let group_id = next_id;
            next_id += 1;
            let mut members = String::new();
            for text in &spec.grouped {
                members.push_str(&text_shape(
                    next_id,
                    &format!("TextBox {next_id}"),
                    None,
                    &paragraph_xml(&[RunSpec::new(text.clone())]),
                ));
                next_id += 1;
            }
            shapes.push_str(&format!(
                r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="{group_id}" name="Group {group_id}"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{members}</p:grpSp>"#
            ));
        }

        if !spec.table.is_empty() {
            shapes.push_str(&table_frame(next_id, &spec.table));
            next_id += 1;
        }

        let mut audio_ids = Vec::new();
        for file_name in &spec.audio {
            let media_part = format!("ppt/media/{file_name}");
            if !pkg.contains(&media_part) {
                let bytes = self
                    .media
                    .get(file_name)
                    .cloned()
                    .unwrap_or_else(|| format!("media:{file_name}").into_bytes());
                let content_type = extension(&media_part)
                    .and_then(|ext| media::content_type_for_extension(&ext))
                    .unwrap_or("application/octet-stream");
                pkg.put_part(&media_part, bytes, content_type);
            }
            if !pkg.contains(ICON_PART) {
                pkg.put_part(ICON_PART, media::ICON_PNG.to_vec(), "image/png");
            }

            let media_rel = link(pkg, &path, REL_TYPE_MEDIA, &media_part);
            let audio_rel = link(pkg, &path, REL_TYPE_AUDIO, &media_part);
            let image_rel = link(pkg, &path, REL_TYPE_IMAGE, ICON_PART);
            let picture = media::media_picture(&MediaShape {
                id: next_id,
                name: file_name,
                descr: file_name,
                kind: MediaKind::Audio,
                link_rel: &audio_rel,
                media_rel: &media_rel,
                image_rel: &image_rel,
                x: self.slide_size.0 - 500_000,
                y: 100_000,
                size: 406_400,
            });
            shapes.push_str(&XmlDocument { declaration: false, root: picture }.to_xml_string());
            audio_ids.push(next_id);
            next_id += 1;
        }

        let timing = timing_xml(spec.animated.then_some(2), &audio_ids);
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="{NS_DRAWING}" xmlns:r="{NS_RELATIONSHIPS}" xmlns:p="{NS_PRESENTATION}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>{timing}</p:sld>"#
        );
        pkg.put_part(&path, xml.into_bytes(), CT_SLIDE);
    }

    fn presentation_xml(&self, master_rel: &str, notes_master_rel: Option<&str>, slide_rels: &[String]) -> String {
        let notes_master = notes_master_rel
            .map(|rid| format!(r#"<p:notesMasterIdLst><p:notesMasterId r:id="{rid}"/></p:notesMasterIdLst>"#))
            .unwrap_or_default();
        let slide_ids: String = slide_rels
            .iter()
            .enumerate()
            .map(|(i, rid)| format!(r#"<p:sldId id="{}" r:id="{rid}"/>"#, 256 + i))
            .collect();
        let (cx, cy) = self.slide_size;

        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="{NS_DRAWING}" xmlns:r="{NS_RELATIONSHIPS}" xmlns:p="{NS_PRESENTATION}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="{master_rel}"/></p:sldMasterIdLst>{notes_master}<p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{cx}" cy="{cy}"/><p:notesSz cx="{cy}" cy="{cx}"/><p:defaultTextStyle/>{}</p:presentation>"#,
            self.sections_xml()
        )
    }

    fn sections_xml(&self) -> String {
        if self.sections.is_empty() {
            return String::new();
        }
        let sections: String = self
            .sections
            .iter()
            .enumerate()
            .map(|(i, (name, slides))| {
                let ids: String = slides
                    .iter()
                    .map(|n| format!(r#"<p14:sldId id="{}"/>"#, 255 + n))
                    .collect();
                format!(
                    r#"<p14:section name="{}" id="{{5A1C0000-0000-4000-8000-{:012X}}}"><p14:sldIdLst>{ids}</p14:sldIdLst></p14:section>"#,
                    escape_attr(name),
                    i + 1
                )
            })
            .collect();
        format!(
            r#"<p:extLst><p:ext uri="{EXT_URI_SECTIONS}"><p14:sectionLst xmlns:p14="{NS_P14}">{sections}</p14:sectionLst></p:ext></p:extLst>"#
        )
    }

    fn core_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{}</dc:title><dc:creator>voxdeck</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{CREATED}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{CREATED}</dcterms:modified></cp:coreProperties>"#,
            escape_text(&self.title)
        )
    }

    fn app_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>voxdeck</Application><Slides>{}</Slides><Notes>{}</Notes></Properties>"#,
            self.slides.len(),
            self.slides.iter().filter(|s| s.notes.is_some()).count()
        )
    }
}

/// Add an internal relationship between two part paths
fn link(pkg: &mut Package, source: &str, rel_type: &str, target_part: &str) -> String {
    let target = relative_target(source, target_part);
    pkg.relationships_mut(source)
        .add(target, rel_type, TargetMode::Internal)
}

fn paragraph_xml(runs: &[RunSpec]) -> String {
    let runs: String = runs
        .iter()
        .map(|run| {
            let mut rpr = String::from(r#"lang="en-US""#);
            if run.bold {
                rpr.push_str(r#" b="1""#);
            }
            if run.italic {
                rpr.push_str(r#" i="1""#);
            }
            let rpr = match &run.typeface {
                Some(face) => format!(r#"<a:rPr {rpr}><a:latin typeface="{}"/></a:rPr>"#, escape_attr(face)),
                None => format!("<a:rPr {rpr}/>"),
            };
            format!("<a:r>{rpr}<a:t>{}</a:t></a:r>", escape_text(&run.text))
        })
        .collect();
    format!("<a:p>{runs}</a:p>")
}

fn text_shape(id: u32, name: &str, placeholder: Option<&str>, paragraphs: &str) -> String {
    let nv_pr = match placeholder {
        Some(attrs) => format!("<p:nvPr><p:ph {attrs}/></p:nvPr>"),
        None => "<p:nvPr/>".to_string(),
    };
    let locks = if placeholder.is_some() {
        r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#
    } else {
        r#"<p:cNvSpPr txBox="1"/>"#
    };
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{}"/>{locks}{nv_pr}</p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        escape_attr(name)
    )
}

fn table_frame(id: u32, rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let grid: String = (0..columns).map(|_| r#"<a:gridCol w="2032000"/>"#).collect();
    let body: String = rows
        .iter()
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|cell| {
                    format!(
                        "<a:tc><a:txBody><a:bodyPr/><a:lstStyle/>{}</a:txBody><a:tcPr/></a:tc>",
                        paragraph_xml(&[RunSpec::new(cell.clone())])
                    )
                })
                .collect();
            format!(r#"<a:tr h="370840">{cells}</a:tr>"#)
        })
        .collect();
    format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="Table {id}"/><p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr><p:xfrm><a:off x="457200" y="1600200"/><a:ext cx="8128000" cy="741680"/></p:xfrm><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblPr firstRow="1" bandRow="1"/><a:tblGrid>{grid}</a:tblGrid>{body}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#
    )
}

/// Timing tree with an entrance effect on `animated` and a media node per audio shape
fn timing_xml(animated: Option<u32>, audio: &[u32]) -> String {
    if animated.is_none() && audio.is_empty() {
        return String::new();
    }
    let mut next = 3;
    let mut children = String::new();

    if let Some(spid) = animated {
        let (a, b, c, d) = (next, next + 1, next + 2, next + 3);
        next += 4;
        children.push_str(&format!(
            r#"<p:seq concurrent="1" nextAc="seek"><p:cTn id="2" dur="indefinite" nodeType="mainSeq"><p:childTnLst><p:par><p:cTn id="{a}" fill="hold"><p:stCondLst><p:cond delay="indefinite"/></p:stCondLst><p:childTnLst><p:par><p:cTn id="{b}" fill="hold"><p:stCondLst><p:cond delay="0"/></p:stCondLst><p:childTnLst><p:par><p:cTn id="{c}" presetID="1" presetClass="entr" presetSubtype="0" fill="hold" nodeType="clickEffect"><p:stCondLst><p:cond delay="0"/></p:stCondLst><p:childTnLst><p:set><p:cBhvr><p:cTn id="{d}" dur="1" fill="hold"><p:stCondLst><p:cond delay="0"/></p:stCondLst></p:cTn><p:tgtEl><p:spTgt spid="{spid}"/></p:tgtEl><p:attrNameLst><p:attrName>style.visibility</p:attrName></p:attrNameLst></p:cBhvr><p:to><p:strVal val="visible"/></p:to></p:set></p:childTnLst></p:cTn></p:par></p:childTnLst></p:cTn></p:par></p:childTnLst></p:cTn></p:par></p:childTnLst></p:cTn><p:prevCondLst><p:cond evt="onPrev" delay="0"><p:tgtEl><p:sldTgt/></p:tgtEl></p:cond></p:prevCondLst><p:nextCondLst><p:cond evt="onNext" delay="0"><p:tgtEl><p:sldTgt/></p:tgtEl></p:cond></p:nextCondLst></p:seq>"#
        ));
    }
    for spid in audio {
        children.push_str(&format!(
            r#"<p:audio><p:cMediaNode vol="80000"><p:cTn id="{next}" fill="hold" display="0"><p:stCondLst><p:cond delay="indefinite"/></p:stCondLst><p:endCondLst><p:cond evt="onStopAudio" delay="0"><p:tgtEl><p:sldTgt/></p:tgtEl></p:cond></p:endCondLst></p:cTn><p:tgtEl><p:spTgt spid="{spid}"/></p:tgtEl></p:cMediaNode></p:audio>"#
        ));
        next += 1;
    }

    let build = animated
        .map(|spid| format!(r#"<p:bldLst><p:bldP spid="{spid}" grpId="0"/></p:bldLst>"#))
        .unwrap_or_default();
    format!(
        r#"<p:timing><p:tnLst><p:par><p:cTn id="1" dur="indefinite" restart="never" nodeType="tmRoot"><p:childTnLst>{children}</p:childTnLst></p:cTn></p:par></p:tnLst>{build}</p:timing>"#
    )
}

fn notes_slide_xml(notes: &str) -> String {
    let paragraphs: String = notes
        .lines()
        .map(|line| {
            if line.is_empty() {
                r#"<a:p><a:endParaRPr lang="en-US"/></a:p>"#.to_string()
            } else {
                format!(
                    r#"<a:p><a:r><a:rPr lang="en-US"/><a:t>{}</a:t></a:r></a:p>"#,
                    escape_text(line)
                )
            }
        })
        .collect();
    let paragraphs = if paragraphs.is_empty() {
        r#"<a:p><a:endParaRPr lang="en-US"/></a:p>"#.to_string()
    } else {
        paragraphs
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:notes xmlns:a="{NS_DRAWING}" xmlns:r="{NS_RELATIONSHIPS}" xmlns:p="{NS_PRESENTATION}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Slide Image Placeholder 1"/><p:cNvSpPr><a:spLocks noGrp="1" noRot="1" noChangeAspect="1"/></p:cNvSpPr><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp><p:sp><p:nvSpPr><p:cNvPr id="3" name="Notes Placeholder 2"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{paragraphs}</p:txBody></p:sp></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:notes>"#
    )
}

fn notes_master_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:notesMaster xmlns:a="{NS_DRAWING}" xmlns:r="{NS_RELATIONSHIPS}" xmlns:p="{NS_PRESENTATION}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Slide Image Placeholder 1"/><p:cNvSpPr><a:spLocks noGrp="1" noRot="1" noChangeAspect="1"/></p:cNvSpPr><p:nvPr><p:ph type="sldImg" idx="2"/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="1143000" y="685800"/><a:ext cx="4572000" cy="3429000"/></a:xfrm></p:spPr></p:sp><p:sp><p:nvSpPr><p:cNvPr id="3" name="Notes Placeholder 2"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="body" sz="quarter" idx="3"/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="685800" y="4343400"/><a:ext cx="5486400" cy="4114800"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:pPr lvl="0"/><a:r><a:rPr lang="en-US"/><a:t>Click to edit Master text styles</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:notesStyle><a:lvl1pPr marL="0" algn="l"><a:defRPr sz="1200"/></a:lvl1pPr></p:notesStyle></p:notesMaster>"#
    )
}

fn slide_master_xml(layout_rels: &[String; 2]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="{NS_DRAWING}" xmlns:r="{NS_RELATIONSHIPS}" xmlns:p="{NS_PRESENTATION}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="{}"/><p:sldLayoutId id="2147483650" r:id="{}"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#,
        layout_rels[0], layout_rels[1]
    )
}

fn cover_layout_xml() -> String {
    layout_xml(
        "title",
        "Title Slide",
        &[
            (2, "Title 1", r#"type="ctrTitle""#, (685800, 2130425, 7772400, 1470025)),
            (3, "Subtitle 2", r#"type="subTitle" idx="1""#, (1371600, 3886200, 6400800, 1752600)),
        ],
    )
}

fn content_layout_xml() -> String {
    layout_xml(
        "obj",
        "Title and Content",
        &[
            (2, "Title 1", r#"type="title""#, (457200, 274638, 8229600, 1143000)),
            (3, "Content Placeholder 2", r#"idx="1""#, (457200, 1600200, 8229600, 4525963)),
        ],
    )
}

type PlaceholderSpec<'a> = (u32, &'a str, &'a str, (i64, i64, i64, i64));

fn layout_xml(kind: &str, name: &str, placeholders: &[PlaceholderSpec<'_>]) -> String {
    let shapes: String = placeholders
        .iter()
        .map(|(id, shape_name, ph, (x, y, cx, cy))| {
            format!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{shape_name}"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph {ph}/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:endParaRPr lang="en-US"/></a:p></p:txBody></p:sp>"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="{NS_DRAWING}" xmlns:r="{NS_RELATIONSHIPS}" xmlns:p="{NS_PRESENTATION}" type="{kind}" preserve="1"><p:cSld name="{name}"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

fn pres_props_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentationPr xmlns:a="{NS_DRAWING}" xmlns:r="{NS_RELATIONSHIPS}" xmlns:p="{NS_PRESENTATION}"/>"#
    )
}

fn view_props_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:viewPr xmlns:a="{NS_DRAWING}" xmlns:r="{NS_RELATIONSHIPS}" xmlns:p="{NS_PRESENTATION}"><p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#
    )
}

fn table_styles_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:tblStyleLst xmlns:a="{NS_DRAWING}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#
    )
}

fn theme_xml(name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="{NS_DRAWING}" name="{name}"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2><a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxdeck_ooxml::RelationshipGraph;

    #[test]
    fn test_generated_deck_is_consistent() {
        let pkg = DeckBuilder::new()
            .slide(SlideSpec::cover("Opening").notes("Line one\nLine two").animated())
            .slide(SlideSpec::titled("Middle").audio("clip.wav").link_to(1))
            .slide(SlideSpec::titled("Closing").grouped("in a group").table(&[&["a", "b"]]))
            .section("First", &[1, 2])
            .section("Second", &[3])
            .build()
            .unwrap();

        assert_eq!(pkg.main_document().unwrap(), "ppt/presentation.xml");
        assert!(RelationshipGraph::build(&pkg).validate(&pkg).is_empty());
        assert!(pkg.contains("ppt/media/clip.wav"));
        assert_eq!(pkg.content_type("ppt/media/clip.wav"), Some("audio/wav"));
        assert_eq!(pkg.content_type("ppt/slides/slide2.xml"), Some(CT_SLIDE));
        assert!(pkg.contains("ppt/notesSlides/notesSlide1.xml"));
        assert!(!pkg.contains("ppt/notesSlides/notesSlide2.xml"));

        let slide1 = pkg.read_xml("ppt/slides/slide1.xml").unwrap();
        assert!(slide1.root.child("timing").is_some());
        let slide2 = pkg.read_xml("ppt/slides/slide2.xml").unwrap();
        assert_eq!(slide2.root.find_all("pic").len(), 1);
    }

    #[test]
    fn test_shared_audio_is_one_part() {
        let pkg = DeckBuilder::new()
            .slide(SlideSpec::titled("A").audio("theme.mp3"))
            .slide(SlideSpec::titled("B").audio("theme.mp3"))
            .media("theme.mp3", b"ID3-bytes".to_vec())
            .build()
            .unwrap();

        let graph = RelationshipGraph::build(&pkg);
        let sources: Vec<&str> = graph
            .incoming("ppt/media/theme.mp3")
            .iter()
            .map(|(source, _)| source.as_str())
            .collect();
        assert!(sources.contains(&"ppt/slides/slide1.xml"));
        assert!(sources.contains(&"ppt/slides/slide2.xml"));
        assert_eq!(&*pkg.part("ppt/media/theme.mp3").unwrap(), b"ID3-bytes");
    }

    #[test]
    fn test_without_notes_master() {
        let pkg = DeckBuilder::new()
            .without_notes_master()
            .slide(SlideSpec::titled("Only").notes("dropped"))
            .build()
            .unwrap();
        assert!(!pkg.contains("ppt/notesMasters/notesMaster1.xml"));
        assert!(!pkg.contains("ppt/notesSlides/notesSlide1.xml"));
    }
}
