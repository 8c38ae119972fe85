//! Integration tests for the voxdeck CLI
//!
//! Each test writes a generated deck to a scratch directory and drives the
//! command line through `execute`, then inspects the files it produced.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tempfile::TempDir;
use voxdeck_cli::{execute, Cli};
use voxdeck_ooxml::Package;
use voxdeck_pptx::builder::{DeckBuilder, SlideSpec};
use voxdeck_pptx::style::{self, FontScope};
use voxdeck_pptx::{deck, media, Outcome};

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = dir.path().join("voxdeck.toml");
        fs::write(&config, "").unwrap();
        Self { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write_deck(&self, name: &str, builder: DeckBuilder) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, builder.build_bytes().unwrap()).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> Outcome {
        let mut argv = vec!["voxdeck", "--config", self.config.to_str().unwrap()];
        argv.extend_from_slice(args);
        execute(Cli::try_parse_from(argv).unwrap()).unwrap()
    }
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn training() -> DeckBuilder {
    DeckBuilder::new()
        .slide(SlideSpec::cover("Welcome").notes("Say hello to everyone"))
        .slide(SlideSpec::titled("Agenda").audio("agenda.m4a"))
        .slide(SlideSpec::titled("Details").notes("Explain the details").animated())
        .section("Intro", &[1, 2])
        .section("Chapter 1: Overview", &[3])
}

#[test]
fn test_notes_round_trip_through_markdown() {
    let ws = Workspace::new();
    let deck_path = ws.write_deck("training.pptx", training());
    let notes_path = ws.path("notes.md");

    assert_eq!(ws.run(&["notes", "export", s(&deck_path), "-o", s(&notes_path)]), Outcome::Changed);
    let exported = fs::read_to_string(&notes_path).unwrap();
    assert!(exported.contains("## Slide 1: Welcome"));

    // Unchanged file: nothing to apply
    assert_eq!(ws.run(&["notes", "import", s(&deck_path), s(&notes_path)]), Outcome::NothingToDo);

    fs::write(&notes_path, exported.replace("Say hello to everyone", "Say good morning")).unwrap();
    let edited_deck = ws.path("edited.pptx");
    let outcome = ws.run(&["notes", "import", s(&deck_path), s(&notes_path), "-o", s(&edited_deck)]);
    assert_eq!(outcome, Outcome::Changed);

    let package = Package::open(&edited_deck).unwrap();
    let slides = deck::slides(&package).unwrap();
    assert_eq!(deck::notes_text(&package, &slides[0]).unwrap(), "Say good morning");
    assert_eq!(deck::notes_text(&package, &slides[2]).unwrap(), "Explain the details");
}

#[test]
fn test_notes_import_preview_leaves_deck_alone() {
    let ws = Workspace::new();
    let deck_path = ws.write_deck("training.pptx", training());
    let notes_path = ws.path("notes.txt");
    ws.run(&["notes", "export", s(&deck_path), "-o", s(&notes_path)]);

    let text = fs::read_to_string(&notes_path).unwrap();
    fs::write(&notes_path, text.replace("Explain the details", "Skip this")).unwrap();

    let before = fs::read(&deck_path).unwrap();
    let outcome = ws.run(&["notes", "import", s(&deck_path), s(&notes_path), "--preview"]);
    assert_eq!(outcome, Outcome::NothingToDo);
    assert_eq!(fs::read(&deck_path).unwrap(), before);
}

#[test]
fn test_split_writes_one_file_per_section() {
    let ws = Workspace::new();
    let deck_path = ws.write_deck("training.pptx", training());
    let out = ws.path("chapters");

    assert_eq!(ws.run(&["split", s(&deck_path), "-o", s(&out)]), Outcome::Changed);

    let intro = Package::open(out.join("Intro.pptx")).unwrap();
    assert_eq!(deck::slides(&intro).unwrap().len(), 2);
    let chapter = Package::open(out.join("Chapter-1-Overview.pptx")).unwrap();
    assert_eq!(deck::slides(&chapter).unwrap().len(), 1);

    // A second run does not overwrite the first
    ws.run(&["split", s(&deck_path), "-o", s(&out)]);
    assert!(out.join("Intro_2.pptx").exists());
}

#[test]
fn test_replace_in_place_and_preview() {
    let ws = Workspace::new();
    let deck_path = ws.write_deck("training.pptx", training());

    let before = fs::read(&deck_path).unwrap();
    ws.run(&["replace", s(&deck_path), "details", "specifics", "--preview"]);
    assert_eq!(fs::read(&deck_path).unwrap(), before);

    assert_eq!(ws.run(&["replace", s(&deck_path), "details", "specifics"]), Outcome::Changed);
    let package = Package::open(&deck_path).unwrap();
    let slides = deck::slides(&package).unwrap();
    assert_eq!(deck::notes_text(&package, &slides[2]).unwrap(), "Explain the specifics");
}

#[test]
fn test_batch_replace_file() {
    let ws = Workspace::new();
    let deck_path = ws.write_deck("training.pptx", training());
    let batch = ws.path("terms.toml");
    fs::write(
        &batch,
        r#"
[[pair]]
find = "hello"
replace = "hi"

[[pair]]
find = "everyone"
replace = "all"
"#,
    )
    .unwrap();

    assert_eq!(ws.run(&["replace", s(&deck_path), "--batch", s(&batch)]), Outcome::Changed);
    let package = Package::open(&deck_path).unwrap();
    let slides = deck::slides(&package).unwrap();
    assert_eq!(deck::notes_text(&package, &slides[0]).unwrap(), "Say hi to all");
}

#[test]
fn test_fonts_normalize_uses_configured_target() {
    let ws = Workspace::new();
    fs::write(&ws.config, "[fonts]\ntarget = \"Arial\"\n").unwrap();
    let deck_path = ws.write_deck("training.pptx", training());

    assert_eq!(ws.run(&["fonts", "normalize", s(&deck_path)]), Outcome::Changed);
    let package = Package::open(&deck_path).unwrap();
    let usage = style::analyze_fonts(&package, FontScope::Slides).unwrap();
    assert_eq!(usage.fonts.len(), 1);
    assert!(usage.fonts.contains_key("Arial"));

    // Second run has nothing left to do
    assert_eq!(ws.run(&["fonts", "normalize", s(&deck_path)]), Outcome::NothingToDo);
}

#[test]
fn test_media_strip_to_output() {
    let ws = Workspace::new();
    let deck_path = ws.write_deck("training.pptx", training());
    let stripped = ws.path("silent.pptx");

    assert_eq!(ws.run(&["media", "strip", s(&deck_path), "-o", s(&stripped)]), Outcome::Changed);

    let original = Package::open(&deck_path).unwrap();
    assert_eq!(media::list_media(&original).unwrap().len(), 1);
    let package = Package::open(&stripped).unwrap();
    assert!(media::list_media(&package).unwrap().is_empty());
    assert!(!package.contains("ppt/media/agenda.m4a"));
}

#[test]
fn test_media_extract_names_files_by_slide() {
    let ws = Workspace::new();
    let deck_path = ws.write_deck("training.pptx", training());
    let out = ws.path("audio");

    assert_eq!(ws.run(&["media", "extract", s(&deck_path), "-o", s(&out)]), Outcome::Changed);
    assert!(out.join("slide02.m4a").exists());
}

#[test]
fn test_animations_strip() {
    let ws = Workspace::new();
    let deck_path = ws.write_deck("training.pptx", training());

    assert_eq!(ws.run(&["animations", "strip", s(&deck_path)]), Outcome::Changed);
    assert_eq!(ws.run(&["animations", "strip", s(&deck_path)]), Outcome::NothingToDo);
}

#[test]
fn test_check_reports_dangling_relationships() {
    let ws = Workspace::new();
    let deck_path = ws.write_deck("training.pptx", training());
    assert_eq!(ws.run(&["check", s(&deck_path)]), Outcome::NothingToDo);

    let mut package = Package::open(&deck_path).unwrap();
    package.remove_part("ppt/media/agenda.m4a").unwrap();
    let broken = ws.path("broken.pptx");
    package.save(&broken).unwrap();
    assert_eq!(ws.run(&["check", s(&broken), "--format", "json"]), Outcome::Failed);
}

#[test]
fn test_missing_deck_is_an_error() {
    let ws = Workspace::new();
    let missing = ws.path("nope.pptx");
    let cli = Cli::try_parse_from(["voxdeck", "--config", s(&ws.config), "sections", s(&missing)]).unwrap();
    let err = execute(cli).unwrap_err();
    assert!(err.to_string().contains("Deck not found"));
}
