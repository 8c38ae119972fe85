//! Shared test fixtures for voxdeck-ooxml

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

/// Zip the given entries, in order
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, contents) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents).unwrap();
    }

    zip.finish().unwrap();
    buffer.into_inner()
}

/// A small generic package:
///
/// ```text
/// ""               -> doc/main.xml
/// doc/main.xml     -> doc/sub/leaf.xml, doc/media/shared.bin, https://example.com (external)
/// doc/sub/leaf.xml -> doc/media/shared.bin
/// doc/orphan.xml   (unreferenced)
/// ```
pub fn minimal_package_bytes() -> Vec<u8> {
    zip_bytes(&[
        (
            "[Content_Types].xml",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="bin" ContentType="application/octet-stream"/><Override PartName="/doc/main.xml" ContentType="application/x-main+xml"/><Override PartName="/doc/sub/leaf.xml" ContentType="application/x-leaf+xml"/></Types>"#,
        ),
        (
            "_rels/.rels",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="doc/main.xml"/></Relationships>"#,
        ),
        (
            "doc/main.xml",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<main xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><leaf r:id="rId1"/><blob r:embed="rId2"/></main>"#,
        ),
        (
            "doc/_rels/main.xml.rels",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="urn:test:leaf" Target="sub/leaf.xml"/><Relationship Id="rId2" Type="urn:test:blob" Target="media/shared.bin"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/></Relationships>"#,
        ),
        ("doc/sub/leaf.xml", br#"<leaf>text</leaf>"#),
        (
            "doc/sub/_rels/leaf.xml.rels",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="urn:test:blob" Target="../media/shared.bin"/></Relationships>"#,
        ),
        ("doc/media/shared.bin", &[0xde, 0xad, 0xbe, 0xef]),
        ("doc/orphan.xml", b"<orphan/>"),
    ])
}
