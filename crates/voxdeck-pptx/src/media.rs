//! Slide audio and video
//!
//! Media parts are found through the slide's relationship list. An embedded
//! clip is a `p:pic` that names the clip twice (`a:audioFile`/`a:videoFile`
//! with `r:link`, and `p14:media` with `r:embed`) and shows an icon image.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use voxdeck_ooxml::graph::PACKAGE_ROOT;
use voxdeck_ooxml::path::{extension, next_numbered_name};
use voxdeck_ooxml::{Package, PackageError, RelationshipGraph, TargetMode, XmlElement};

use crate::constants::*;
use crate::deck::{self, referenced_rel_ids, SlideRef};
use crate::error::{DeckError, Result};
use crate::report::{EventSink, OperationReport, Unit};
use crate::style::prune_timing;

pub const AUDIO_EXTENSIONS: [&str; 6] = ["m4a", "mp3", "wav", "wma", "aif", "aiff"];
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "m4v", "mov", "wmv", "avi"];

/// Alternative text marking audio shapes this tool inserted
pub const DEFAULT_AUDIO_TAG: &str = "VOX_VO";

/// 32pt
pub const DEFAULT_ICON_SIZE_EMU: i64 = 32 * EMU_PER_POINT;

/// 5pt gap between the icon and the slide edge
const ICON_MARGIN_EMU: i64 = 5 * EMU_PER_POINT;

/// 1x1 transparent PNG used as the audio icon
pub const ICON_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
    Unknown,
}

impl MediaKind {
    /// Kind by file extension (without the dot, any case)
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Audio
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Unknown
        }
    }

    /// Kind of a media relationship; the generic media type defers to the extension
    fn of_relationship(rel_type: &str, part: &str) -> Option<Self> {
        match rel_type {
            REL_TYPE_AUDIO => Some(MediaKind::Audio),
            REL_TYPE_VIDEO => Some(MediaKind::Video),
            REL_TYPE_MEDIA => Some(
                extension(part)
                    .map(|ext| Self::from_extension(&ext))
                    .unwrap_or(MediaKind::Unknown),
            ),
            _ => None,
        }
    }
}

/// Content type for a media file extension
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    let content_type = match ext.to_ascii_lowercase().as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wma" => "audio/x-ms-wma",
        "aif" | "aiff" => "audio/x-aiff",
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "avi" => "video/x-msvideo",
        "png" => "image/png",
        _ => return None,
    };
    Some(content_type)
}

/// One media part used by a slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRef {
    pub slide: usize,
    pub part: String,
    pub kind: MediaKind,
    /// Lower-case extension
    pub format: String,
    /// Relationship ids on the slide that reach this part
    pub rel_ids: Vec<String>,
    pub size: usize,
}

/// Media of one slide, one entry per distinct part
fn slide_media(package: &Package, slide: &SlideRef) -> Vec<MediaRef> {
    let Some(rels) = package.relationships(&slide.part) else {
        return Vec::new();
    };

    let mut found: Vec<MediaRef> = Vec::new();
    for (id, rel) in rels.iter() {
        if rel.is_external() {
            continue;
        }
        let Some(part) = package.target_of(&slide.part, id) else {
            continue;
        };
        let Some(kind) = MediaKind::of_relationship(&rel.rel_type, &part) else {
            continue;
        };

        match found.iter_mut().find(|m| m.part == part) {
            Some(existing) => {
                existing.rel_ids.push(id.to_string());
                if existing.kind == MediaKind::Unknown {
                    existing.kind = kind;
                }
            }
            None => found.push(MediaRef {
                slide: slide.number,
                format: extension(&part).unwrap_or_default(),
                size: package.get_part(&part).map(|b| b.len()).unwrap_or(0),
                part,
                kind,
                rel_ids: vec![id.to_string()],
            }),
        }
    }
    found
}

/// Every slide's media, keyed by slide number; slides without media are absent
pub fn list_media(package: &Package) -> Result<BTreeMap<usize, Vec<MediaRef>>> {
    let mut media = BTreeMap::new();
    for slide in deck::slides(package)? {
        let found = slide_media(package, &slide);
        if !found.is_empty() {
            media.insert(slide.number, found);
        }
    }
    Ok(media)
}

/// A file written by [`extract`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedMedia {
    pub slide: usize,
    pub file_name: String,
    pub kind: MediaKind,
    pub path: PathBuf,
}

/// Output name for the `index`th (0-based) of `total` media files on a slide
pub fn export_file_name(slide: usize, index: usize, total: usize, ext: &str) -> String {
    if total <= 1 {
        format!("slide{slide:02}.{ext}")
    } else {
        format!("slide{slide:02}_{}.{ext}", index + 1)
    }
}

/// Copy one slide's media into `dest`; the package is not modified
pub fn extract(package: &Package, slide: usize, dest: &Path) -> Result<Vec<ExtractedMedia>> {
    let slide = deck::slide(package, slide)?;
    let media = slide_media(package, &slide);
    if media.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(dest)?;

    let mut written = Vec::with_capacity(media.len());
    for (index, item) in media.iter().enumerate() {
        let bytes = package.part(&item.part)?;
        let file_name = export_file_name(slide.number, index, media.len(), &item.format);
        let path = dest.join(&file_name);
        fs::write(&path, &bytes)?;
        debug!(slide = slide.number, file = %file_name, "media extracted");
        written.push(ExtractedMedia {
            slide: slide.number,
            file_name,
            kind: item.kind,
            path,
        });
    }
    Ok(written)
}

/// Result of [`extract_all`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractReport {
    #[serde(flatten)]
    pub report: OperationReport,
    pub manifest: Vec<ExtractedMedia>,
}

/// Copy every slide's media into `dest`
pub fn extract_all(package: &Package, dest: &Path, sink: &mut dyn EventSink) -> Result<ExtractReport> {
    let mut report = OperationReport::new("extract media");
    let mut manifest = Vec::new();

    for slide in list_media(package)?.into_keys() {
        match extract(package, slide, dest) {
            Ok(files) => {
                report.touch(slide, files.len());
                let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
                report.processed(sink, Unit::Slide(slide), names.join(", "));
                manifest.extend(files);
            }
            Err(err) => report.failed(sink, Unit::Slide(slide), &err),
        }
    }

    report.finish(sink);
    Ok(ExtractReport { report, manifest })
}

/// Placement and references of a media picture
#[derive(Debug, Clone)]
pub struct MediaShape<'a> {
    pub id: u32,
    pub name: &'a str,
    /// Alternative text
    pub descr: &'a str,
    pub kind: MediaKind,
    /// `audio`/`video` relationship
    pub link_rel: &'a str,
    /// Office 2010 `media` relationship
    pub media_rel: &'a str,
    /// Icon image relationship
    pub image_rel: &'a str,
    pub x: i64,
    pub y: i64,
    pub size: i64,
}

/// Build the `p:pic` element for an embedded clip
pub fn media_picture(shape: &MediaShape<'_>) -> XmlElement {
    let file_element = match shape.kind {
        MediaKind::Video => "a:videoFile",
        _ => "a:audioFile",
    };

    let nv_pic_pr = XmlElement::new("p:nvPicPr")
        .with_child(
            XmlElement::new("p:cNvPr")
                .with_attr("id", shape.id.to_string())
                .with_attr("name", shape.name)
                .with_attr("descr", shape.descr)
                .with_child(
                    XmlElement::new("a:hlinkClick")
                        .with_attr("r:id", "")
                        .with_attr("action", "ppaction://media"),
                ),
        )
        .with_child(
            XmlElement::new("p:cNvPicPr")
                .with_child(XmlElement::new("a:picLocks").with_attr("noChangeAspect", "1")),
        )
        .with_child(
            XmlElement::new("p:nvPr")
                .with_child(XmlElement::new(file_element).with_attr("r:link", shape.link_rel))
                .with_child(
                    XmlElement::new("p:extLst").with_child(
                        XmlElement::new("p:ext")
                            .with_attr("uri", EXT_URI_MEDIA)
                            .with_child(
                                XmlElement::new("p14:media")
                                    .with_attr("xmlns:p14", NS_P14)
                                    .with_attr("r:embed", shape.media_rel),
                            ),
                    ),
                ),
        );

    let blip_fill = XmlElement::new("p:blipFill")
        .with_child(XmlElement::new("a:blip").with_attr("r:embed", shape.image_rel))
        .with_child(XmlElement::new("a:stretch").with_child(XmlElement::new("a:fillRect")));

    let sp_pr = XmlElement::new("p:spPr")
        .with_child(
            XmlElement::new("a:xfrm")
                .with_child(
                    XmlElement::new("a:off")
                        .with_attr("x", shape.x.to_string())
                        .with_attr("y", shape.y.to_string()),
                )
                .with_child(
                    XmlElement::new("a:ext")
                        .with_attr("cx", shape.size.to_string())
                        .with_attr("cy", shape.size.to_string()),
                ),
        )
        .with_child(
            XmlElement::new("a:prstGeom")
                .with_attr("prst", "rect")
                .with_child(XmlElement::new("a:avLst")),
        );

    XmlElement::new("p:pic")
        .with_child(nv_pic_pr)
        .with_child(blip_fill)
        .with_child(sp_pr)
}

/// Shape id (`cNvPr/@id`) of a drawing element
fn shape_id(shape: &XmlElement) -> Option<String> {
    shape
        .elements()
        .find(|e| e.local_name().starts_with("nv"))
        .and_then(|nv| nv.child("cNvPr"))
        .and_then(|c| c.attr("id"))
        .map(str::to_string)
}

fn alt_text(shape: &XmlElement) -> Option<&str> {
    shape
        .elements()
        .find(|e| e.local_name().starts_with("nv"))
        .and_then(|nv| nv.child("cNvPr"))
        .and_then(|c| c.attr("descr"))
}

/// Relationship id -> media kind for a slide
fn media_kinds(package: &Package, slide: &SlideRef) -> HashMap<String, MediaKind> {
    slide_media(package, slide)
        .into_iter()
        .flat_map(|m| {
            let kind = m.kind;
            m.rel_ids.into_iter().map(move |id| (id, kind))
        })
        .collect()
}

/// Whether a picture plays audio
fn is_audio_picture(pic: &XmlElement, kinds: &HashMap<String, MediaKind>) -> bool {
    if !pic.is("pic") {
        return false;
    }
    let Some(nv_pr) = pic.path(&["nvPicPr", "nvPr"]) else {
        return false;
    };
    if nv_pr.child("audioFile").is_some() {
        return true;
    }
    if nv_pr.child("videoFile").is_some() {
        return false;
    }
    referenced_rel_ids(nv_pr)
        .iter()
        .any(|id| kinds.get(id) == Some(&MediaKind::Audio))
}

/// Remove pictures matching `remove` from a slide, with the timing nodes and
/// relationships only they used; returns how many pictures went
fn remove_pictures(
    package: &mut Package,
    graph: &mut RelationshipGraph,
    slide: &SlideRef,
    remove: &mut impl FnMut(&XmlElement) -> bool,
) -> Result<usize> {
    let doc = package.xml_mut(&slide.part)?;

    let mut spids = BTreeSet::new();
    let mut candidate_rels = BTreeSet::new();
    doc.root.walk(&mut |e| {
        if remove(e) {
            spids.extend(shape_id(e));
            candidate_rels.extend(referenced_rel_ids(e));
        }
    });
    if spids.is_empty() {
        return Ok(0);
    }

    let removed = doc.root.remove_descendants(remove);
    prune_timing(&mut doc.root, &spids);

    let still_used = referenced_rel_ids(&doc.root);
    for id in candidate_rels.difference(&still_used) {
        if let Some((rel, orphan)) = graph.remove_relationship(package, &slide.part, id) {
            debug!(slide = slide.number, id = %id, target = %rel.target, orphan = ?orphan, "relationship removed");
        }
    }
    Ok(removed)
}

/// Result of [`strip_audio`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StripReport {
    #[serde(flatten)]
    pub report: OperationReport,
    /// Parts deleted because nothing referenced them any more
    pub removed_parts: Vec<String>,
}

/// Remove every audio shape from every slide, then collect orphaned parts
pub fn strip_audio(package: &mut Package, sink: &mut dyn EventSink) -> Result<StripReport> {
    let mut report = OperationReport::new("strip audio");
    let mut graph = RelationshipGraph::build(package);

    for slide in deck::slides(package)? {
        let kinds = media_kinds(package, &slide);
        let has_audio = {
            let doc = package.read_xml(&slide.part)?;
            doc.root.find_all("pic").iter().any(|p| is_audio_picture(p, &kinds))
        };
        if !has_audio {
            continue;
        }

        match remove_pictures(package, &mut graph, &slide, &mut |e| is_audio_picture(e, &kinds)) {
            Ok(removed) => {
                report.touch(slide.number, removed);
                report.processed(
                    sink,
                    Unit::Slide(slide.number),
                    format!("removed {removed} audio shape(s)"),
                );
            }
            Err(err) => report.failed(sink, Unit::Slide(slide.number), &err),
        }
    }

    let removed_parts = if report.changed > 0 {
        graph.collect_garbage(package, &[PACKAGE_ROOT])?
    } else {
        Vec::new()
    };
    info!(
        shapes = report.changed,
        parts = removed_parts.len(),
        "audio stripped"
    );
    report.finish(sink);
    Ok(StripReport {
        report,
        removed_parts,
    })
}

/// Settings for [`import_audio`]
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Alternative text given to inserted shapes; shapes carrying it are replaced on re-import
    pub tag: String,
    pub icon_size: i64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            tag: DEFAULT_AUDIO_TAG.to_string(),
            icon_size: DEFAULT_ICON_SIZE_EMU,
        }
    }
}

/// A media file embedded by [`import_audio`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedFile {
    pub slide: usize,
    pub file_name: String,
    pub part: String,
    /// True when identical bytes were already stored and the part was reused
    pub reused: bool,
}

/// Result of [`import_audio`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    #[serde(flatten)]
    pub report: OperationReport,
    pub imported: Vec<ImportedFile>,
    /// Files named for a slide the deck does not have
    pub unmatched: Vec<String>,
    /// Files in the folder not following the `slideN.ext` convention
    pub ignored: Vec<String>,
}

fn import_pattern() -> Result<Regex> {
    let extensions = AUDIO_EXTENSIONS
        .iter()
        .chain(VIDEO_EXTENSIONS.iter())
        .copied()
        .collect::<Vec<_>>()
        .join("|");
    Ok(Regex::new(&format!(r"(?i)^slide(\d+)(?:_(\d+))?\.({extensions})$"))?)
}

/// Media files in `folder` grouped by slide number, ordered by their `_K` index
fn scan_folder(folder: &Path) -> Result<(BTreeMap<usize, Vec<(usize, PathBuf)>>, Vec<String>)> {
    let pattern = import_pattern()?;
    let mut entries: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    let mut by_slide: BTreeMap<usize, Vec<(usize, PathBuf)>> = BTreeMap::new();
    let mut ignored = Vec::new();
    for path in entries {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(caps) = pattern.captures(&name) else {
            ignored.push(name);
            continue;
        };
        let slide = caps[1].parse::<usize>().unwrap_or(0);
        let index = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(1);
        by_slide.entry(slide).or_default().push((index, path));
    }
    for files in by_slide.values_mut() {
        files.sort();
    }
    Ok((by_slide, ignored))
}

fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Media parts already in the package, by content hash
fn media_by_hash(package: &Package) -> HashMap<String, String> {
    package
        .part_names()
        .filter(|name| name.starts_with("ppt/media/"))
        .filter_map(|name| Some((content_hash(&package.get_part(name)?), name.to_string())))
        .collect()
}

/// Store `bytes` as a media part unless identical bytes are already stored
fn store_media(
    package: &mut Package,
    hashes: &mut HashMap<String, String>,
    bytes: Vec<u8>,
    stem: &str,
    ext: &str,
) -> (String, bool) {
    let hash = content_hash(&bytes);
    if let Some(existing) = hashes.get(&hash) {
        if package.contains(existing) {
            return (existing.clone(), true);
        }
    }
    let part = next_numbered_name(package.part_names(), "ppt/media", stem, ext);
    let content_type = content_type_for_extension(ext).unwrap_or("application/octet-stream");
    package.content_types_mut().ensure_default(ext, content_type);
    package.put_part(&part, bytes, content_type);
    hashes.insert(hash, part.clone());
    (part, false)
}

/// Next free shape id on a slide
fn next_shape_id(root: &XmlElement) -> u32 {
    root.find_all("cNvPr")
        .iter()
        .filter_map(|c| c.attr("id")?.parse::<u32>().ok())
        .max()
        .unwrap_or(1)
        + 1
}

/// Embed `slideN.ext` files from `folder` as audio (or video) shapes on the matching slides
///
/// Shapes a previous import left on a slide (same tag) are replaced.
pub fn import_audio(
    package: &mut Package,
    folder: &Path,
    options: &ImportOptions,
    sink: &mut dyn EventSink,
) -> Result<ImportReport> {
    let (by_slide, ignored) = scan_folder(folder)?;
    let slides = deck::slides(package)?;
    let (width, height) = deck::slide_size(package)?;

    let mut report = ImportReport {
        report: OperationReport::new("import audio"),
        imported: Vec::new(),
        unmatched: Vec::new(),
        ignored,
    };
    for name in &report.ignored {
        report
            .report
            .skipped(sink, Unit::File(name.clone()), "name does not follow slideN.ext");
    }

    let mut graph = RelationshipGraph::build(package);
    let mut hashes = media_by_hash(package);

    for (number, files) in by_slide {
        let Some(slide) = slides.iter().find(|s| s.number == number) else {
            for (_, path) in files {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                report
                    .report
                    .skipped(sink, Unit::File(name.clone()), format!("deck has no slide {number}"));
                report.unmatched.push(name);
            }
            continue;
        };

        match import_for_slide(package, &mut graph, &mut hashes, slide, &files, options, (width, height)) {
            Ok(imported) => {
                report.report.touch(number, imported.len());
                report.report.processed(
                    sink,
                    Unit::Slide(number),
                    format!("{} file(s) embedded", imported.len()),
                );
                report.imported.extend(imported);
            }
            Err(err) => report.report.failed(sink, Unit::Slide(number), &err),
        }
    }

    if report.report.changed > 0 {
        graph.collect_garbage(package, &[PACKAGE_ROOT])?;
    }
    report.report.finish(sink);
    Ok(report)
}

fn import_for_slide(
    package: &mut Package,
    graph: &mut RelationshipGraph,
    hashes: &mut HashMap<String, String>,
    slide: &SlideRef,
    files: &[(usize, PathBuf)],
    options: &ImportOptions,
    (width, height): (i64, i64),
) -> Result<Vec<ImportedFile>> {
    // Read everything first so an unreadable file leaves the slide alone
    let mut payloads = Vec::with_capacity(files.len());
    for (_, path) in files {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = extension(&name).ok_or_else(|| DeckError::unsupported(name.clone()))?;
        payloads.push((name, ext, bytes));
    }

    // Nothing is removed, stored or linked for a slide that cannot take the shapes
    const SHAPE_TREE: [&str; 2] = ["cSld", "spTree"];
    if package.read_xml(&slide.part)?.root.path(&SHAPE_TREE).is_none() {
        return Err(PackageError::malformed(&slide.part, "slide without a shape tree").into());
    }

    let tag = options.tag.clone();
    remove_pictures(package, graph, slide, &mut |e| {
        e.is("pic") && alt_text(e).map(str::trim) == Some(tag.as_str())
    })?;

    let (icon, _) = store_media(package, hashes, ICON_PNG.to_vec(), "image", "png");
    let mut imported = Vec::with_capacity(payloads.len());

    for (offset, (name, ext, bytes)) in payloads.into_iter().enumerate() {
        let kind = MediaKind::from_extension(&ext);
        let (part, reused) = store_media(package, hashes, bytes, "media", &ext);

        let link_type = match kind {
            MediaKind::Video => REL_TYPE_VIDEO,
            _ => REL_TYPE_AUDIO,
        };
        let media_rel = graph.add_relationship(package, &slide.part, REL_TYPE_MEDIA, &part, TargetMode::Internal);
        let link_rel = graph.add_relationship(package, &slide.part, link_type, &part, TargetMode::Internal);
        let image_rel = graph.add_relationship(package, &slide.part, REL_TYPE_IMAGE, &icon, TargetMode::Internal);

        let doc = package.xml_mut(&slide.part)?;
        let id = next_shape_id(&doc.root);
        let size = options.icon_size;
        let picture = media_picture(&MediaShape {
            id,
            name: &name,
            descr: &options.tag,
            kind,
            link_rel: &link_rel,
            media_rel: &media_rel,
            image_rel: &image_rel,
            x: width + ICON_MARGIN_EMU,
            y: height - size - ICON_MARGIN_EMU - offset as i64 * (size + ICON_MARGIN_EMU),
            size,
        });
        let tree = doc
            .root
            .path_mut(&SHAPE_TREE)
            .ok_or_else(|| PackageError::malformed(&slide.part, "slide without a shape tree"))?;
        tree.push(picture);

        debug!(slide = slide.number, file = %name, part = %part, reused, "media embedded");
        imported.push(ImportedFile {
            slide: slide.number,
            file_name: name,
            part,
            reused,
        });
    }
    Ok(imported)
}
