//! The in-memory package
//!
//! A [`Package`] owns every part of an unzipped OPC archive, the content-type
//! manifest and one [`Relationships`] list per source part. Parts keep their
//! original bytes until they are edited, so saving re-emits untouched parts
//! byte-identical.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::content_types::{ContentTypes, CONTENT_TYPES_PART};
use crate::error::{PackageError, Result};
use crate::path::{is_rels_part, part_for_rels, rels_for_part, resolve_target};
use crate::relationships::{Relationships, TargetMode};
use crate::xml::XmlDocument;

#[derive(Debug, Clone)]
struct Part {
    bytes: Vec<u8>,
    /// Parsed tree, once something asked for it mutably (or it was validated at open)
    xml: Option<XmlDocument>,
    modified: bool,
}

impl Part {
    fn raw(bytes: Vec<u8>, modified: bool) -> Self {
        Self {
            bytes,
            xml: None,
            modified,
        }
    }

    fn current_bytes(&self) -> Cow<'_, [u8]> {
        match (&self.xml, self.modified) {
            (Some(doc), true) => Cow::Owned(doc.to_bytes()),
            _ => Cow::Borrowed(&self.bytes),
        }
    }
}

#[derive(Debug, Clone)]
struct RelsEntry {
    rels: Relationships,
    /// Original bytes while the list is unmodified
    original: Option<Vec<u8>>,
}

/// An OPC package held in memory
#[derive(Debug, Clone)]
pub struct Package {
    parts: HashMap<String, Part>,
    /// Archive entry order at open, followed by parts added later
    order: Vec<String>,
    content_types: ContentTypes,
    content_types_original: Option<Vec<u8>>,
    rels: BTreeMap<String, RelsEntry>,
    generation: u64,
}

impl Default for Package {
    fn default() -> Self {
        Self::new()
    }
}

impl Package {
    /// Create an empty package with the standard content-type defaults
    pub fn new() -> Self {
        Self {
            parts: HashMap::new(),
            order: Vec::new(),
            content_types: ContentTypes::with_standard_defaults(),
            content_types_original: None,
            rels: BTreeMap::new(),
            generation: 0,
        }
    }

    /// Open and unpack a package file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening package");
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Open a package from bytes already in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    /// Create from any reader that implements Read + Seek
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader).map_err(PackageError::from_zip)?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(PackageError::from_zip)?;
            let name = file.name().to_string();

            // Skip directories
            if name.ends_with('/') {
                continue;
            }

            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            entries.push((name, contents));
        }

        let mut package = Self::new();
        let mut manifest = None;

        for (name, contents) in entries {
            package.order.push(name.clone());
            if name == CONTENT_TYPES_PART {
                manifest = Some(contents);
            } else if is_rels_part(&name) {
                let source = part_for_rels(&name).unwrap_or_default();
                let rels = Relationships::parse(&name, &contents).map_err(|e| {
                    PackageError::corrupt(format!("unparsable relationship list: {e}"))
                })?;
                package.rels.insert(
                    source,
                    RelsEntry {
                        rels,
                        original: Some(contents),
                    },
                );
            } else {
                package.parts.insert(name, Part::raw(contents, false));
            }
        }

        let manifest =
            manifest.ok_or_else(|| PackageError::corrupt("missing [Content_Types].xml"))?;
        package.content_types = ContentTypes::parse(&manifest)
            .map_err(|e| PackageError::corrupt(format!("unparsable content types: {e}")))?;
        package.content_types_original = Some(manifest);

        // The main document must exist and parse
        let main = package.main_document()?;
        let part = package
            .parts
            .get_mut(&main)
            .ok_or_else(|| PackageError::corrupt(format!("main document '{main}' is missing")))?;
        let doc = XmlDocument::parse(&main, &part.bytes)
            .map_err(|e| PackageError::corrupt(format!("main document is unparsable: {e}")))?;
        part.xml = Some(doc);

        debug!(
            parts = package.parts.len(),
            rels = package.rels.len(),
            "package opened"
        );
        Ok(package)
    }

    /// Path of the main document, found through the package-root `officeDocument` relationship
    pub fn main_document(&self) -> Result<String> {
        self.relationships("")
            .and_then(|rels| rels.first_of_type(Relationships::TYPE_OFFICE_DOCUMENT))
            .map(|(_, rel)| resolve_target("", &rel.target))
            .ok_or_else(|| PackageError::corrupt("no officeDocument relationship"))
    }

    /// Check if a part exists
    pub fn contains(&self, path: &str) -> bool {
        self.parts.contains_key(path)
    }

    /// Names of all parts (excluding the manifest and relationship lists), in archive order
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|name| self.parts.contains_key(name.as_str()))
            .map(|name| name.as_str())
    }

    /// Current bytes of a part
    pub fn part(&self, path: &str) -> Result<Cow<'_, [u8]>> {
        self.parts
            .get(path)
            .map(Part::current_bytes)
            .ok_or_else(|| PackageError::PartNotFound(path.to_string()))
    }

    /// Current bytes of a part, or `None` if it does not exist
    pub fn get_part(&self, path: &str) -> Option<Cow<'_, [u8]>> {
        self.parts.get(path).map(Part::current_bytes)
    }

    /// Resolved content type of a part
    pub fn content_type(&self, path: &str) -> Option<&str> {
        self.content_types.content_type_for(path)
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    pub fn content_types_mut(&mut self) -> &mut ContentTypes {
        self.content_types_original = None;
        &mut self.content_types
    }

    /// Parsed tree of an XML part without touching the cache
    pub fn read_xml(&self, path: &str) -> Result<Cow<'_, XmlDocument>> {
        let part = self
            .parts
            .get(path)
            .ok_or_else(|| PackageError::PartNotFound(path.to_string()))?;
        match &part.xml {
            Some(doc) => Ok(Cow::Borrowed(doc)),
            None => XmlDocument::parse(path, &part.bytes).map(Cow::Owned),
        }
    }

    /// Parsed tree of an XML part for editing; the part is marked modified
    pub fn xml_mut(&mut self, path: &str) -> Result<&mut XmlDocument> {
        let part = self
            .parts
            .get_mut(path)
            .ok_or_else(|| PackageError::PartNotFound(path.to_string()))?;
        if part.xml.is_none() {
            part.xml = Some(XmlDocument::parse(path, &part.bytes)?);
        }
        part.modified = true;
        match part.xml.as_mut() {
            Some(doc) => Ok(doc),
            None => Err(PackageError::malformed(path, "part could not be parsed")),
        }
    }

    /// Whether a part was written or edited since the package was opened
    pub fn is_modified(&self, path: &str) -> bool {
        self.parts.get(path).map(|p| p.modified).unwrap_or(false)
    }

    /// Add or replace a part; the manifest is updated when the resolved content type differs
    pub fn put_part(&mut self, path: &str, bytes: Vec<u8>, content_type: &str) {
        if self.content_types.content_type_for(path) != Some(content_type) {
            self.content_types_mut().register(path, content_type);
        }
        if self.parts.insert(path.to_string(), Part::raw(bytes, true)).is_none() {
            if !self.order.iter().any(|name| name == path) {
                self.order.push(path.to_string());
            }
            self.generation += 1;
        }
        debug!(part = path, "part written");
    }

    /// Add or replace an XML part from a tree
    pub fn put_xml(&mut self, path: &str, doc: XmlDocument, content_type: &str) {
        self.put_part(path, Vec::new(), content_type);
        if let Some(part) = self.parts.get_mut(path) {
            part.xml = Some(doc);
        }
    }

    /// Copy a part from another package under a (possibly different) name, bytes untouched
    pub fn copy_part_from(&mut self, source: &Package, from: &str, to: &str) -> Result<()> {
        let bytes = source.part(from)?.into_owned();
        let content_type = source
            .content_type(from)
            .unwrap_or("application/octet-stream")
            .to_string();
        self.put_part(to, bytes, &content_type);
        Ok(())
    }

    /// Remove a part together with its relationship list and manifest override
    ///
    /// Relationships elsewhere that still target the part are left to the caller;
    /// [`crate::graph::RelationshipGraph`] checks reachability before sweeping.
    pub fn remove_part(&mut self, path: &str) -> Result<()> {
        if self.parts.remove(path).is_none() {
            return Err(PackageError::PartNotFound(path.to_string()));
        }
        self.rels.remove(path);
        if self.content_types.override_for(path).is_some() {
            self.content_types_mut().remove_override(path);
        }
        self.generation += 1;
        debug!(part = path, "part removed");
        Ok(())
    }

    /// Relationship list of a source part (`""` is the package root)
    pub fn relationships(&self, source: &str) -> Option<&Relationships> {
        self.rels.get(source).map(|entry| &entry.rels)
    }

    /// Relationship list for editing, created if missing; the list is marked modified
    pub fn relationships_mut(&mut self, source: &str) -> &mut Relationships {
        self.generation += 1;
        let entry = self
            .rels
            .entry(source.to_string())
            .or_insert_with(|| RelsEntry {
                rels: Relationships::new(),
                original: None,
            });
        entry.original = None;
        &mut entry.rels
    }

    /// Source parts that own a relationship list
    pub fn relationship_sources(&self) -> impl Iterator<Item = &str> {
        self.rels.keys().map(|s| s.as_str())
    }

    /// Resolve a relationship to the part path it targets, without checking that the part exists
    ///
    /// Returns `None` for unknown ids and external targets.
    pub fn target_of(&self, source: &str, id: &str) -> Option<String> {
        let rel = self.relationships(source)?.get_relationship(id)?;
        match rel.mode {
            TargetMode::Internal => Some(resolve_target(source, &rel.target)),
            TargetMode::External => None,
        }
    }

    /// Counter bumped by every mutation that can change the relationship graph
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Write the package to `dest` atomically
    ///
    /// The archive is assembled in a temporary file next to `dest` and renamed into
    /// place only once complete, so a failure never leaves a partial file behind.
    pub fn save<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        self.save_with(dest.as_ref(), |file| self.write_to(file))
    }

    fn save_with(&self, dest: &Path, write: impl FnOnce(&mut File) -> Result<()>) -> Result<()> {
        let dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        write(tmp.as_file_mut())?;
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(dest).map_err(|e| PackageError::Io(e.error))?;

        debug!(path = %dest.display(), "package saved");
        Ok(())
    }

    /// Serialize the package to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Write the archive to any writer
    ///
    /// `[Content_Types].xml` comes first, then entries in their original order,
    /// then anything added since.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let manifest: Cow<'_, [u8]> = match &self.content_types_original {
            Some(bytes) => Cow::Borrowed(bytes),
            None => Cow::Owned(self.content_types.to_xml().into_bytes()),
        };
        zip.start_file(CONTENT_TYPES_PART, options)
            .map_err(PackageError::from_zip)?;
        zip.write_all(&manifest)?;

        let mut written: HashSet<String> = HashSet::new();
        written.insert(CONTENT_TYPES_PART.to_string());

        let rels_names: BTreeMap<String, &str> = self
            .rels
            .keys()
            .map(|source| (rels_for_part(source), source.as_str()))
            .collect();

        let names = self
            .order
            .iter()
            .map(String::as_str)
            .chain(self.parts.keys().map(String::as_str))
            .chain(rels_names.keys().map(String::as_str));

        for name in names {
            if written.contains(name) {
                continue;
            }
            let contents: Option<Cow<'_, [u8]>> = if let Some(part) = self.parts.get(name) {
                Some(part.current_bytes())
            } else if let Some(source) = rels_names.get(name) {
                self.rels_bytes(source)
            } else {
                None
            };

            if let Some(contents) = contents {
                zip.start_file(name, options).map_err(PackageError::from_zip)?;
                zip.write_all(&contents)?;
                written.insert(name.to_string());
            }
        }

        zip.finish().map_err(PackageError::from_zip)?;
        Ok(())
    }

    fn rels_bytes(&self, source: &str) -> Option<Cow<'_, [u8]>> {
        let entry = self.rels.get(source)?;
        if let Some(original) = &entry.original {
            return Some(Cow::Borrowed(original));
        }
        if entry.rels.is_empty() {
            return None;
        }
        // A list whose source part is gone is not written
        if !source.is_empty() && !self.parts.contains_key(source) {
            return None;
        }
        Some(Cow::Owned(entry.rels.to_xml().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::minimal_package_bytes;

    #[test]
    fn test_open_minimal_package() {
        let pkg = Package::from_bytes(&minimal_package_bytes()).unwrap();
        assert_eq!(pkg.main_document().unwrap(), "doc/main.xml");
        assert!(pkg.contains("doc/main.xml"));
        assert!(pkg.relationships("doc/main.xml").is_some());
        assert!(!pkg.is_modified("doc/main.xml"));
    }

    #[test]
    fn test_unmodified_roundtrip_is_byte_identical_per_part() {
        let bytes = minimal_package_bytes();
        let pkg = Package::from_bytes(&bytes).unwrap();
        let saved = Package::from_bytes(&pkg.to_bytes().unwrap()).unwrap();

        for name in pkg.part_names() {
            assert_eq!(pkg.part(name).unwrap(), saved.part(name).unwrap(), "{name}");
        }
    }

    #[test]
    fn test_not_a_zip_is_corrupt() {
        let err = Package::from_bytes(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, PackageError::CorruptPackage { .. }));
    }

    #[test]
    fn test_xml_mut_marks_modified() {
        let mut pkg = Package::from_bytes(&minimal_package_bytes()).unwrap();
        let doc = pkg.xml_mut("doc/main.xml").unwrap();
        doc.root.set_attr("edited", "1");
        assert!(pkg.is_modified("doc/main.xml"));

        let saved = Package::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        let doc = saved.read_xml("doc/main.xml").unwrap();
        assert_eq!(doc.root.attr("edited"), Some("1"));
    }

    #[test]
    fn test_put_part_registers_content_type() {
        let mut pkg = Package::from_bytes(&minimal_package_bytes()).unwrap();
        pkg.put_part("doc/media/media1.m4a", vec![1, 2, 3], "audio/mp4");
        assert_eq!(pkg.content_type("doc/media/media1.m4a"), Some("audio/mp4"));
        assert_eq!(pkg.part_names().last(), Some("doc/media/media1.m4a"));

        pkg.put_part("doc/extra.xml", b"<x/>".to_vec(), "application/xml");
        assert!(pkg.content_types().override_for("doc/extra.xml").is_none());
    }

    #[test]
    fn test_remove_part_drops_rels_and_override() {
        let mut pkg = Package::from_bytes(&minimal_package_bytes()).unwrap();
        let generation = pkg.generation();
        pkg.remove_part("doc/sub/leaf.xml").unwrap();
        assert!(pkg.generation() > generation);
        assert!(!pkg.contains("doc/sub/leaf.xml"));
        assert!(pkg.content_types().override_for("doc/sub/leaf.xml").is_none());
        assert!(matches!(
            pkg.remove_part("doc/sub/leaf.xml"),
            Err(PackageError::PartNotFound(_))
        ));
    }

    #[test]
    fn test_read_xml_missing_part() {
        let pkg = Package::from_bytes(&minimal_package_bytes()).unwrap();
        assert!(matches!(
            pkg.read_xml("nope.xml"),
            Err(PackageError::PartNotFound(_))
        ));
    }

    #[test]
    fn test_manifest_written_first() {
        let mut pkg = Package::from_bytes(&minimal_package_bytes()).unwrap();
        pkg.put_part("doc/media/a.bin", vec![0], "application/octet-stream");
        let bytes = pkg.to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), CONTENT_TYPES_PART);
    }

    #[test]
    fn test_failed_write_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("deck.pkg");
        let original = minimal_package_bytes();
        fs::write(&dest, &original).unwrap();

        let pkg = Package::from_bytes(&original).unwrap();
        let err = pkg
            .save_with(&dest, |file| {
                file.write_all(b"PK\x03\x04 half an archive")?;
                Err(PackageError::Io(std::io::Error::other("disk full")))
            })
            .unwrap_err();
        assert!(matches!(err, PackageError::Io(_)));

        assert_eq!(fs::read(&dest).unwrap(), original);
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
