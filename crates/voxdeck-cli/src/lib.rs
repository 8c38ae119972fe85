//! voxdeck CLI - Command-line interface library
//!
//! This library provides the CLI functionality for voxdeck, including:
//! - Sections: list sections and split a deck into one file per section
//! - Notes: export, import and count speaker notes
//! - Find / Replace: search and edit text without losing formatting
//! - Media: list, extract, strip and import narration
//! - Fonts / Animations: normalize typefaces and remove animations
//! - Check: validate the package's relationships
//!
//! # Library Usage
//!
//! ```no_run
//! use clap::Parser;
//! use voxdeck_cli::{execute, Cli};
//!
//! let cli = Cli::parse_from(["voxdeck", "notes", "stats", "training.pptx"]);
//! let outcome = execute(cli)?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Binary Usage
//!
//! ```bash
//! # Export speaker notes for editing, then apply the edits
//! voxdeck notes export training.pptx -o training_notes.docx
//! voxdeck notes import training.pptx training_notes.docx --preview
//!
//! # One deck per section
//! voxdeck split training.pptx -o chapters/
//!
//! # Machine-readable media listing
//! voxdeck media list training.pptx --format json
//! ```

pub mod app;
pub mod config;

// Re-export main entry point and types
pub use app::{
    check_command, find_command, replace_command, sections_command, split_command,
};
pub use app::{execute, exit_code, init_logging, run_cli, Cli, Commands, OutputFormat};
pub use config::{load_settings, Settings};
