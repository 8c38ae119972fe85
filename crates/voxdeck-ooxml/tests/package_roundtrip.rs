//! Package save/open behaviour on disk

use voxdeck_ooxml::graph::PACKAGE_ROOT;
use voxdeck_ooxml::{Package, PackageError, RelationshipGraph, Relationships, TargetMode, XmlDocument};

const MAIN_CT: &str = "application/x-test-main+xml";

fn build_package() -> Package {
    let mut pkg = Package::new();
    pkg.put_part(
        "doc/main.xml",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><main/>"#.to_vec(),
        MAIN_CT,
    );
    pkg.put_part("doc/media/clip.wav", vec![b'R', b'I', b'F', b'F'], "audio/wav");
    pkg.put_part("doc/media/unused.wav", vec![0; 16], "audio/wav");

    let mut graph = RelationshipGraph::build(&pkg);
    graph.add_relationship(
        &mut pkg,
        PACKAGE_ROOT,
        Relationships::TYPE_OFFICE_DOCUMENT,
        "doc/main.xml",
        TargetMode::Internal,
    );
    graph.add_relationship(
        &mut pkg,
        "doc/main.xml",
        Relationships::TYPE_AUDIO,
        "doc/media/clip.wav",
        TargetMode::Internal,
    );
    pkg
}

#[test]
fn test_new_package_saves_and_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("built.pkg");

    build_package().save(&path).unwrap();
    let reopened = Package::open(&path).unwrap();

    assert_eq!(reopened.main_document().unwrap(), "doc/main.xml");
    assert_eq!(reopened.content_type("doc/main.xml"), Some(MAIN_CT));
    assert_eq!(reopened.content_type("doc/media/clip.wav"), Some("audio/wav"));
    assert_eq!(
        reopened.relationships("doc/main.xml").unwrap().get("rId1"),
        Some("media/clip.wav")
    );
}

#[test]
fn test_collect_garbage_drops_unreferenced_media() {
    let mut pkg = build_package();
    let mut graph = RelationshipGraph::build(&pkg);

    let removed = graph.collect_garbage(&mut pkg, &[PACKAGE_ROOT]).unwrap();
    assert_eq!(removed, vec!["doc/media/unused.wav".to_string()]);

    let reopened = Package::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
    assert!(!reopened.contains("doc/media/unused.wav"));
    assert!(reopened.contains("doc/media/clip.wav"));
}

#[test]
fn test_save_replaces_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("existing.pkg");
    std::fs::write(&path, b"old-bytes").unwrap();

    let pkg = build_package();
    pkg.save(&path).unwrap();

    let written = std::fs::read(&path).unwrap();
    let reopened = Package::from_bytes(&written).unwrap();
    assert_eq!(
        reopened.part_names().collect::<Vec<_>>(),
        pkg.part_names().collect::<Vec<_>>()
    );
    // only the destination is left behind
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_failed_save_leaves_destination_alone() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be replaced by the finished archive
    let dest = dir.path().join("taken.pkg");
    std::fs::create_dir(&dest).unwrap();
    std::fs::write(dest.join("keep.txt"), b"still here").unwrap();

    let err = build_package().save(&dest).unwrap_err();
    assert!(matches!(err, PackageError::Io(_)));

    assert!(dest.is_dir());
    assert_eq!(std::fs::read(dest.join("keep.txt")).unwrap(), b"still here");
    // no temporary archive left next to it
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/dir/out.pkg");
    build_package().save(&path).unwrap();
    assert!(Package::open(&path).is_ok());
}

#[test]
fn test_in_place_edit_keeps_other_parts_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deck.pkg");
    build_package().save(&path).unwrap();

    let original = Package::open(&path).unwrap();
    let mut edited = Package::open(&path).unwrap();
    edited
        .xml_mut("doc/main.xml")
        .unwrap()
        .root
        .set_attr("touched", "yes");
    edited.save(&path).unwrap();

    let reopened = Package::open(&path).unwrap();
    assert_eq!(
        reopened.part("doc/media/clip.wav").unwrap(),
        original.part("doc/media/clip.wav").unwrap()
    );
    let main: XmlDocument = reopened.read_xml("doc/main.xml").unwrap().into_owned();
    assert_eq!(main.root.attr("touched"), Some("yes"));
}

#[test]
fn test_open_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.pkg");
    assert!(matches!(Package::open(&missing), Err(PackageError::Io(_))));

    let garbage = dir.path().join("garbage.pkg");
    std::fs::write(&garbage, b"not a zip at all").unwrap();
    assert!(matches!(
        Package::open(&garbage),
        Err(PackageError::CorruptPackage { .. })
    ));

    // a package without an officeDocument relationship has no main document
    let mut headless = Package::new();
    headless.put_part("doc/main.xml", b"<main/>".to_vec(), MAIN_CT);
    let bytes = headless.to_bytes().unwrap();
    assert!(matches!(
        Package::from_bytes(&bytes),
        Err(PackageError::CorruptPackage { .. })
    ));
}
