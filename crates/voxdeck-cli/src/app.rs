//! CLI Application logic
//!
//! Every subcommand opens a deck, runs one engine operation and prints the
//! result as text or JSON. Commands that edit the deck save it back in place
//! (atomically) unless `--output` names another file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use voxdeck_ooxml::{Package, RelationshipGraph};
use voxdeck_pptx::media::{self, MediaKind};
use voxdeck_pptx::notes::{self, ChangeKind, NotesFormat};
use voxdeck_pptx::subset::{self, SplitOptions};
use voxdeck_pptx::text::{self, Location, SearchOptions};
use voxdeck_pptx::{sections, style, OperationReport, Outcome, TracingSink};

use crate::config::{self, ExportFormat, FontTarget, ReplaceSettings, SearchScope, Settings, Unassigned};

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for scripts and tools
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "voxdeck")]
#[command(author, version, about = "Maintenance for narrated slide decks", long_about = None)]
pub struct Cli {
    /// Configuration file (default: voxdeck.toml in the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the deck's sections
    Sections {
        /// Input PPTX file
        deck: PathBuf,
    },

    /// Write one deck per section
    Split {
        /// Input PPTX file
        deck: PathBuf,

        /// Output directory (default: the deck's folder)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// What to do with slides outside every section
        #[arg(long, value_enum)]
        unassigned: Option<Unassigned>,
    },

    /// Export, import and count speaker notes
    #[command(subcommand)]
    Notes(NotesCommand),

    /// Search notes or slide text
    Find {
        /// Input PPTX file
        deck: PathBuf,

        /// Text (or regular expression) to look for
        pattern: String,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Replace text while keeping run formatting
    Replace {
        /// Input PPTX file
        deck: PathBuf,

        /// Text (or regular expression) to replace
        #[arg(required_unless_present = "batch")]
        pattern: Option<String>,

        /// Replacement (`$1` expands groups with --regex)
        #[arg(required_unless_present = "batch")]
        replacement: Option<String>,

        /// TOML file of `[[pair]]` tables with `find` and `replace` keys, applied in order
        #[arg(long, conflicts_with_all = ["pattern", "replacement", "preview"])]
        batch: Option<PathBuf>,

        /// Show the resulting text without changing the deck
        #[arg(long)]
        preview: bool,

        #[command(flatten)]
        search: SearchArgs,

        #[command(flatten)]
        save: SaveArgs,
    },

    /// List, extract, strip and import slide media
    #[command(subcommand)]
    Media(MediaCommand),

    /// Analyze and normalize typefaces
    #[command(subcommand)]
    Fonts(FontsCommand),

    /// Remove animations
    #[command(subcommand)]
    Animations(AnimationsCommand),

    /// Validate relationships and section references
    Check {
        /// Input PPTX file
        deck: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum NotesCommand {
    /// Write every slide's notes to a text, Markdown or Word file
    Export {
        /// Input PPTX file
        deck: PathBuf,

        /// Output file; its extension picks the format (default: <deck>_notes.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Format used when no output file is given
        #[arg(long = "as", value_enum)]
        kind: Option<ExportFormat>,

        /// Word export typeface
        #[arg(long)]
        font: Option<String>,

        /// Word export body size in points
        #[arg(long)]
        font_size: Option<u32>,
    },

    /// Apply an edited notes file back to the deck
    Import {
        /// Input PPTX file
        deck: PathBuf,

        /// Edited notes (.txt, .md or .docx)
        source: PathBuf,

        /// Show the changes without applying them
        #[arg(long)]
        preview: bool,

        /// Only these slides (comma-separated)
        #[arg(long, value_delimiter = ',')]
        slides: Vec<usize>,

        #[command(flatten)]
        save: SaveArgs,
    },

    /// Count slides with notes, characters and words
    Stats {
        /// Input PPTX file
        deck: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum MediaCommand {
    /// List media per slide
    List {
        /// Input PPTX file
        deck: PathBuf,
    },

    /// Copy media files out of the deck
    Extract {
        /// Input PPTX file
        deck: PathBuf,

        /// Output directory (default: <deck>_media)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only this slide
        #[arg(long)]
        slide: Option<usize>,
    },

    /// Remove every audio shape and the parts only it used
    Strip {
        /// Input PPTX file
        deck: PathBuf,

        #[command(flatten)]
        save: SaveArgs,
    },

    /// Embed slideN.<ext> files from a folder as narration
    Import {
        /// Input PPTX file
        deck: PathBuf,

        /// Folder holding slide1.m4a, slide2.mp3...
        folder: PathBuf,

        /// Alternative text marking the inserted shapes
        #[arg(long)]
        tag: Option<String>,

        /// Icon edge in points
        #[arg(long)]
        icon_size: Option<u32>,

        #[command(flatten)]
        save: SaveArgs,
    },
}

#[derive(Debug, Subcommand)]
pub enum FontsCommand {
    /// Count text runs per typeface
    Analyze {
        /// Input PPTX file
        deck: PathBuf,

        #[arg(long, value_enum)]
        scope: Option<FontTarget>,
    },

    /// Set one typeface on every run
    Normalize {
        /// Input PPTX file
        deck: PathBuf,

        /// Typeface to apply (default: [fonts] target)
        typeface: Option<String>,

        #[arg(long, value_enum)]
        scope: Option<FontTarget>,

        #[command(flatten)]
        save: SaveArgs,
    },
}

#[derive(Debug, Subcommand)]
pub enum AnimationsCommand {
    /// Remove all animation effects and timing
    Strip {
        /// Input PPTX file
        deck: PathBuf,

        #[command(flatten)]
        save: SaveArgs,
    },
}

/// Options shared by find and replace
#[derive(Debug, Clone, Default, Args)]
pub struct SearchArgs {
    /// Treat the pattern as a regular expression
    #[arg(long)]
    pub regex: bool,

    /// Match case exactly
    #[arg(long)]
    pub case_sensitive: bool,

    /// Text to search
    #[arg(long, value_enum)]
    pub scope: Option<SearchScope>,

    /// Only these slides (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub slides: Vec<usize>,
}

impl SearchArgs {
    fn options(&self, defaults: &ReplaceSettings) -> SearchOptions {
        SearchOptions {
            case_sensitive: self.case_sensitive || defaults.case_sensitive,
            regex: self.regex || defaults.regex,
            scope: self.scope.unwrap_or(defaults.scope).into(),
            slides: (!self.slides.is_empty()).then(|| self.slides.clone()),
        }
    }
}

/// Where an edited deck goes
#[derive(Debug, Clone, Default, Args)]
pub struct SaveArgs {
    /// Write the result here instead of overwriting the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Batch replacement file
#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(default, rename = "pair")]
    pairs: Vec<BatchPair>,
}

#[derive(Debug, Deserialize)]
struct BatchPair {
    find: String,
    replace: String,
}

/// Run the CLI application
///
/// This is the main entry point for the command-line interface.
/// It parses arguments, sets up logging and dispatches to the command.
pub fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let outcome = execute(cli)?;
    Ok(exit_code(outcome))
}

/// Non-zero only when the operation failed outright
pub fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

/// Log to stderr; `RUST_LOG` overrides the verbosity flags
pub fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed when running inside tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run a parsed command line
pub fn execute(cli: Cli) -> Result<Outcome> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let settings = config::load_settings(cli.config.as_deref(), &cwd)?;
    let format = cli.format;

    match cli.command {
        Commands::Sections { deck } => sections_command(&deck, format),
        Commands::Split {
            deck,
            output,
            unassigned,
        } => split_command(&deck, output, unassigned, &settings, format),
        Commands::Notes(command) => notes_command(command, &settings, format),
        Commands::Find {
            deck,
            pattern,
            search,
        } => find_command(&deck, &pattern, &search.options(&settings.replace), format),
        Commands::Replace {
            deck,
            pattern,
            replacement,
            batch,
            preview,
            search,
            save,
        } => {
            let options = search.options(&settings.replace);
            match (batch, pattern, replacement) {
                (Some(batch), _, _) => batch_command(&deck, &batch, &options, save.output.as_deref(), format),
                (None, Some(pattern), Some(replacement)) if preview => {
                    preview_command(&deck, &pattern, &replacement, &options, format)
                }
                (None, Some(pattern), Some(replacement)) => {
                    replace_command(&deck, &pattern, &replacement, &options, save.output.as_deref(), format)
                }
                _ => anyhow::bail!("replace needs a pattern and a replacement, or --batch <file>"),
            }
        }
        Commands::Media(command) => media_command(command, &settings, format),
        Commands::Fonts(command) => fonts_command(command, &settings, format),
        Commands::Animations(AnimationsCommand::Strip { deck, save }) => {
            let mut package = open_deck(&deck)?;
            let report = style::strip_animations(&mut package, &mut TracingSink)
                .with_context(|| format!("Failed to strip animations: {}", deck.display()))?;
            print_report(&report, format)?;
            save_edit(&package, &deck, save.output.as_deref(), &report)
        }
        Commands::Check { deck } => check_command(&deck, format),
    }
}

fn open_deck(path: &Path) -> Result<Package> {
    if !path.exists() {
        anyhow::bail!("Deck not found: {}", path.display());
    }
    Package::open(path).with_context(|| format!("Failed to open deck: {}", path.display()))
}

/// Save an edited deck when the report says something changed
///
/// With `--output` an unchanged deck is still written, so the named file exists.
fn save_edit(package: &Package, deck: &Path, output: Option<&Path>, report: &OperationReport) -> Result<Outcome> {
    let outcome = report.outcome();
    let write = match outcome {
        Outcome::Changed | Outcome::PartialFailure => true,
        Outcome::NothingToDo => output.is_some(),
        Outcome::Failed => false,
    };

    if write {
        let dest = output.unwrap_or(deck);
        package
            .save(dest)
            .with_context(|| format!("Failed to save deck: {}", dest.display()))?;
        info!(path = %dest.display(), "deck saved");
    } else {
        debug!(outcome = %outcome, "deck not saved");
    }
    Ok(outcome)
}

fn deck_dir(deck: &Path) -> PathBuf {
    deck.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf()
}

fn deck_stem(deck: &Path) -> String {
    deck.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "deck".to_string())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report to JSON")?;
    println!("{}", json);
    Ok(())
}

fn print_summary(report: &OperationReport) {
    println!(
        "{}: {} ({} change(s) on {} slide(s))",
        report.operation,
        report.outcome(),
        report.changed,
        report.slides.len()
    );
    for error in &report.errors {
        println!("  ✗ {}", error);
    }
}

fn print_report(report: &OperationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            print_summary(report);
            Ok(())
        }
    }
}

fn join_numbers(numbers: &[usize]) -> String {
    numbers.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn location_label(location: Location) -> &'static str {
    match location {
        Location::Notes => "notes",
        Location::Slide => "slide",
    }
}

/// Execute the sections command
pub fn sections_command(deck: &Path, format: OutputFormat) -> Result<Outcome> {
    let package = open_deck(deck)?;
    let index = sections::list_sections(&package)
        .with_context(|| format!("Failed to read sections: {}", deck.display()))?;

    match format {
        OutputFormat::Json => print_json(&index)?,
        OutputFormat::Text => {
            if index.is_synthetic() {
                println!("No sections; {} slide(s) in one implicit section", index.total_slides);
            } else {
                println!("{} section(s), {} slide(s)", index.sections.len(), index.total_slides);
            }
            for (i, section) in index.sections.iter().enumerate() {
                let range = match section.range() {
                    Some((first, last)) if first == last => format!("slide {first}"),
                    Some((first, last)) => format!("slides {first}-{last}"),
                    None => "empty".to_string(),
                };
                let gap = if section.count() > 1 && !section.is_contiguous() {
                    ", not contiguous"
                } else {
                    ""
                };
                println!("  {}. {} ({} slide(s), {}{})", i + 1, section.display_name(), section.count(), range, gap);
            }
            if !index.unassigned.is_empty() {
                println!("Slides in no section: {}", join_numbers(&index.unassigned));
            }
            if !index.unknown_ids.is_empty() {
                let ids: Vec<String> = index.unknown_ids.iter().map(ToString::to_string).collect();
                println!("Sections name missing slide ids: {}", ids.join(", "));
            }
        }
    }
    Ok(Outcome::NothingToDo)
}

/// Execute the split command
pub fn split_command(
    deck: &Path,
    output: Option<PathBuf>,
    unassigned: Option<Unassigned>,
    settings: &Settings,
    format: OutputFormat,
) -> Result<Outcome> {
    let package = open_deck(deck)?;
    let dir = output
        .or_else(|| settings.split.output_dir.clone())
        .unwrap_or_else(|| deck_dir(deck));
    let options = SplitOptions {
        unassigned: unassigned.unwrap_or(settings.split.unassigned).into(),
    };

    let report = subset::split_by_sections(&package, &dir, &options, &mut TracingSink)
        .with_context(|| format!("Failed to split deck: {}", deck.display()))?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            for output in &report.outputs {
                println!("  Created: {} ({} slide(s))", output.path.display(), output.slides.len());
            }
            if !report.unassigned.is_empty() {
                println!("Slides in no section: {}", join_numbers(&report.unassigned));
            }
            print_summary(&report.report);
        }
    }
    Ok(report.report.outcome())
}

fn notes_command(command: NotesCommand, settings: &Settings, format: OutputFormat) -> Result<Outcome> {
    match command {
        NotesCommand::Export {
            deck,
            output,
            kind,
            font,
            font_size,
        } => {
            let package = open_deck(&deck)?;
            let dest = output.unwrap_or_else(|| {
                let ext = NotesFormat::from(kind.unwrap_or(settings.notes.format)).extension();
                deck_dir(&deck).join(format!("{}_notes.{}", deck_stem(&deck), ext))
            });
            let mut rich = settings.notes.rich_text();
            if let Some(font) = font {
                rich.font = font;
            }
            if let Some(size) = font_size {
                rich.font_size = size;
            }

            let summary = notes::export(&package, &dest, &rich)
                .with_context(|| format!("Failed to export notes to {}", dest.display()))?;
            match format {
                OutputFormat::Json => print_json(&summary)?,
                OutputFormat::Text => println!(
                    "Exported {} slide(s), {} with notes, to {}",
                    summary.slides,
                    summary.slides_with_notes,
                    summary.path.display()
                ),
            }
            Ok(Outcome::Changed)
        }
        NotesCommand::Import {
            deck,
            source,
            preview,
            slides,
            save,
        } => {
            let mut package = open_deck(&deck)?;
            let filter = (!slides.is_empty()).then_some(slides.as_slice());
            let summary = notes::import(&mut package, &source, preview, filter, &mut TracingSink)
                .with_context(|| format!("Failed to import notes from {}", source.display()))?;

            match format {
                OutputFormat::Json => print_json(&summary)?,
                OutputFormat::Text => {
                    if summary.diff.is_empty() {
                        println!("No changes");
                    }
                    for change in &summary.diff.changes {
                        let kind = match change.kind {
                            ChangeKind::Added => "added",
                            ChangeKind::Removed => "removed",
                            ChangeKind::Modified => "modified",
                        };
                        println!("Slide {} ({}): {}", change.slide, kind, change.title);
                        if preview {
                            for line in change.original.lines() {
                                println!("  - {}", line);
                            }
                            for line in change.edited.lines() {
                                println!("  + {}", line);
                            }
                        }
                    }
                    if !summary.diff.unmatched.is_empty() {
                        println!("Not in the deck: slide(s) {}", join_numbers(&summary.diff.unmatched));
                    }
                    if let Some(report) = &summary.report {
                        print_summary(report);
                    }
                }
            }

            match &summary.report {
                Some(report) => save_edit(&package, &deck, save.output.as_deref(), report),
                None => Ok(Outcome::NothingToDo),
            }
        }
        NotesCommand::Stats { deck } => {
            let package = open_deck(&deck)?;
            let stats = text::notes_stats(&package)
                .with_context(|| format!("Failed to read notes: {}", deck.display()))?;
            match format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Text => {
                    println!("Slides:              {}", stats.total_slides);
                    println!("With notes:          {}", stats.slides_with_notes);
                    println!("Without notes:       {}", stats.slides_without_notes);
                    println!("Characters:          {}", stats.total_characters);
                    println!("Words:               {}", stats.total_words);
                    println!("Words per annotated: {}", stats.avg_words_per_slide);
                }
            }
            Ok(Outcome::NothingToDo)
        }
    }
}

/// Execute the find command
pub fn find_command(deck: &Path, pattern: &str, options: &SearchOptions, format: OutputFormat) -> Result<Outcome> {
    let package = open_deck(deck)?;
    let results = text::find(&package, pattern, options).context("Search failed")?;

    match format {
        OutputFormat::Json => print_json(&results)?,
        OutputFormat::Text => {
            for slide in &results {
                println!("Slide {}: {}", slide.slide, slide.title);
                for m in &slide.matches {
                    println!("  [{}] {}", location_label(m.location), m.context);
                }
            }
            let total: usize = results.iter().map(|r| r.matches.len()).sum();
            println!("{} match(es) on {} slide(s)", total, results.len());
        }
    }
    Ok(Outcome::NothingToDo)
}

fn preview_command(
    deck: &Path,
    pattern: &str,
    replacement: &str,
    options: &SearchOptions,
    format: OutputFormat,
) -> Result<Outcome> {
    let package = open_deck(deck)?;
    let previews = text::preview_replace(&package, pattern, replacement, options).context("Preview failed")?;

    match format {
        OutputFormat::Json => print_json(&previews)?,
        OutputFormat::Text => {
            if previews.is_empty() {
                println!("No matches");
            }
            for p in &previews {
                println!("Slide {} [{}] {}: {} match(es)", p.slide, location_label(p.location), p.title, p.matches);
                println!("  - {}", p.original.replace('\n', "\n    "));
                println!("  + {}", p.preview.replace('\n', "\n    "));
            }
        }
    }
    Ok(Outcome::NothingToDo)
}

/// Execute the replace command
pub fn replace_command(
    deck: &Path,
    pattern: &str,
    replacement: &str,
    options: &SearchOptions,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<Outcome> {
    let mut package = open_deck(deck)?;
    let report = text::replace(&mut package, pattern, replacement, options, &mut TracingSink)
        .context("Replace failed")?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            print_summary(&report.report);
            if report.skipped_matches > 0 {
                println!("  {} match(es) left alone (field or line break inside)", report.skipped_matches);
            }
        }
    }
    save_edit(&package, deck, output, &report.report)
}

fn batch_command(
    deck: &Path,
    batch: &Path,
    options: &SearchOptions,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<Outcome> {
    let content =
        fs::read_to_string(batch).with_context(|| format!("Failed to read batch file: {}", batch.display()))?;
    let file: BatchFile =
        toml::from_str(&content).with_context(|| format!("Failed to parse batch file: {}", batch.display()))?;
    if file.pairs.is_empty() {
        anyhow::bail!("No [[pair]] entries in {}", batch.display());
    }
    let pairs: Vec<(String, String)> = file.pairs.into_iter().map(|p| (p.find, p.replace)).collect();

    let mut package = open_deck(deck)?;
    let report = text::batch_replace(&mut package, &pairs, options, &mut TracingSink).context("Batch replace failed")?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            for term in &report.terms {
                println!("  {:>4}  {}", term.count, term.term);
            }
            print_summary(&report.report);
        }
    }
    save_edit(&package, deck, output, &report.report)
}

fn media_command(command: MediaCommand, settings: &Settings, format: OutputFormat) -> Result<Outcome> {
    match command {
        MediaCommand::List { deck } => {
            let package = open_deck(&deck)?;
            let media = media::list_media(&package).context("Failed to list media")?;
            match format {
                OutputFormat::Json => print_json(&media)?,
                OutputFormat::Text => {
                    if media.is_empty() {
                        println!("No media");
                    }
                    for (slide, items) in &media {
                        for item in items {
                            let kind = match item.kind {
                                MediaKind::Audio => "audio",
                                MediaKind::Video => "video",
                                MediaKind::Unknown => "media",
                            };
                            println!("Slide {}: {} ({}, {}, {} bytes)", slide, item.part, kind, item.format, item.size);
                        }
                    }
                }
            }
            Ok(Outcome::NothingToDo)
        }
        MediaCommand::Extract { deck, output, slide } => {
            let package = open_deck(&deck)?;
            let dest = output.unwrap_or_else(|| deck_dir(&deck).join(format!("{}_media", deck_stem(&deck))));

            let (manifest, outcome) = match slide {
                Some(slide) => {
                    let files = media::extract(&package, slide, &dest)
                        .with_context(|| format!("Failed to extract media of slide {}", slide))?;
                    let outcome = if files.is_empty() {
                        Outcome::NothingToDo
                    } else {
                        Outcome::Changed
                    };
                    (files, outcome)
                }
                None => {
                    let report = media::extract_all(&package, &dest, &mut TracingSink)
                        .context("Failed to extract media")?;
                    let outcome = report.report.outcome();
                    (report.manifest, outcome)
                }
            };

            match format {
                OutputFormat::Json => print_json(&manifest)?,
                OutputFormat::Text => {
                    for file in &manifest {
                        println!("  Created: {}", file.path.display());
                    }
                    println!("{} file(s) extracted to {}", manifest.len(), dest.display());
                }
            }
            Ok(outcome)
        }
        MediaCommand::Strip { deck, save } => {
            let mut package = open_deck(&deck)?;
            let report = media::strip_audio(&mut package, &mut TracingSink).context("Failed to strip audio")?;
            match format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => {
                    for part in &report.removed_parts {
                        println!("  Removed: {}", part);
                    }
                    print_summary(&report.report);
                }
            }
            save_edit(&package, &deck, save.output.as_deref(), &report.report)
        }
        MediaCommand::Import {
            deck,
            folder,
            tag,
            icon_size,
            save,
        } => {
            let mut media_settings = settings.media.clone();
            if let Some(tag) = tag {
                media_settings.tag = tag;
            }
            if let Some(size) = icon_size {
                media_settings.icon_size = size;
            }

            let mut package = open_deck(&deck)?;
            let report = media::import_audio(&mut package, &folder, &media_settings.import_options(), &mut TracingSink)
                .with_context(|| format!("Failed to import media from {}", folder.display()))?;
            match format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => {
                    for file in &report.imported {
                        let reused = if file.reused { " (reused)" } else { "" };
                        println!("  Slide {}: {} -> {}{}", file.slide, file.file_name, file.part, reused);
                    }
                    for name in &report.unmatched {
                        println!("  No such slide for {}", name);
                    }
                    for name in &report.ignored {
                        println!("  Ignored {}", name);
                    }
                    print_summary(&report.report);
                }
            }
            save_edit(&package, &deck, save.output.as_deref(), &report.report)
        }
    }
}

fn fonts_command(command: FontsCommand, settings: &Settings, format: OutputFormat) -> Result<Outcome> {
    match command {
        FontsCommand::Analyze { deck, scope } => {
            let package = open_deck(&deck)?;
            let usage = style::analyze_fonts(&package, scope.unwrap_or(settings.fonts.scope).into())
                .context("Failed to analyze fonts")?;
            match format {
                OutputFormat::Json => print_json(&usage)?,
                OutputFormat::Text => {
                    for (face, runs) in usage.ranked() {
                        let share = if usage.total_runs == 0 {
                            0.0
                        } else {
                            runs as f64 * 100.0 / usage.total_runs as f64
                        };
                        println!("  {:>6}  {:>5.1}%  {}", runs, share, face);
                    }
                    println!("{} run(s), {} typeface(s)", usage.total_runs, usage.fonts.len());
                }
            }
            Ok(Outcome::NothingToDo)
        }
        FontsCommand::Normalize {
            deck,
            typeface,
            scope,
            save,
        } => {
            let Some(typeface) = typeface.or_else(|| settings.fonts.target.clone()) else {
                anyhow::bail!("No typeface given; pass one or set [fonts] target in voxdeck.toml");
            };
            let mut package = open_deck(&deck)?;
            let report = style::normalize_fonts(
                &mut package,
                &typeface,
                scope.unwrap_or(settings.fonts.scope).into(),
                &mut TracingSink,
            )
            .context("Failed to normalize fonts")?;
            print_report(&report, format)?;
            save_edit(&package, &deck, save.output.as_deref(), &report)
        }
    }
}

/// Result of the check command
#[derive(Debug, Serialize)]
struct CheckReport {
    deck: PathBuf,
    slides: usize,
    parts: usize,
    problems: Vec<String>,
}

/// Execute the check command
pub fn check_command(deck: &Path, format: OutputFormat) -> Result<Outcome> {
    let package = open_deck(deck)?;
    let graph = RelationshipGraph::build(&package);
    let mut problems: Vec<String> = graph.validate(&package).iter().map(ToString::to_string).collect();

    let slides = match voxdeck_pptx::deck::slides(&package) {
        Ok(slides) => slides.len(),
        Err(err) => {
            problems.push(err.to_string());
            0
        }
    };
    if let Ok(index) = sections::list_sections(&package) {
        problems.extend(
            index
                .unknown_ids
                .iter()
                .map(|id| format!("a section names slide id {} which the deck does not have", id)),
        );
    }

    let report = CheckReport {
        deck: deck.to_path_buf(),
        slides,
        parts: package.part_names().count(),
        problems,
    };
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            if report.problems.is_empty() {
                println!("✓ No problems in {} ({} slides, {} parts)", deck.display(), report.slides, report.parts);
            } else {
                for problem in &report.problems {
                    println!("✗ {}", problem);
                }
                println!("Found {} problem(s)", report.problems.len());
            }
        }
    }

    Ok(if report.problems.is_empty() {
        Outcome::NothingToDo
    } else {
        Outcome::Failed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["voxdeck", "sections", "deck.pptx", "--format", "json", "-vv"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Sections { .. }));
    }

    #[test]
    fn test_replace_requires_pattern_or_batch() {
        assert!(Cli::try_parse_from(["voxdeck", "replace", "deck.pptx"]).is_err());
        assert!(Cli::try_parse_from(["voxdeck", "replace", "deck.pptx", "--batch", "terms.toml"]).is_ok());
        assert!(Cli::try_parse_from(["voxdeck", "replace", "deck.pptx", "old", "new", "--preview"]).is_ok());
        assert!(Cli::try_parse_from(["voxdeck", "replace", "deck.pptx", "--batch", "t.toml", "--preview"]).is_err());
    }

    #[test]
    fn test_slide_lists() {
        let cli = Cli::try_parse_from(["voxdeck", "find", "deck.pptx", "intro", "--slides", "1,3", "--scope", "all"])
            .unwrap();
        let Commands::Find { search, .. } = cli.command else {
            panic!("expected find");
        };
        let options = search.options(&ReplaceSettings::default());
        assert_eq!(options.slides, Some(vec![1, 3]));
        assert_eq!(options.scope, text::Scope::All);
        assert!(!options.regex);
    }

    #[test]
    fn test_config_defaults_apply_to_search() {
        let defaults = ReplaceSettings {
            case_sensitive: true,
            regex: false,
            scope: SearchScope::Slides,
        };
        let options = SearchArgs::default().options(&defaults);
        assert!(options.case_sensitive);
        assert_eq!(options.scope, text::Scope::Slides);
        assert_eq!(options.slides, None);
    }

    #[test]
    fn test_deck_paths() {
        assert_eq!(deck_dir(Path::new("talk.pptx")), PathBuf::from("."));
        assert_eq!(deck_dir(Path::new("decks/talk.pptx")), PathBuf::from("decks"));
        assert_eq!(deck_stem(Path::new("decks/talk.pptx")), "talk");
    }
}
