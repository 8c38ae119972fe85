//! Error types for deck operations.

use thiserror::Error;
use voxdeck_ooxml::PackageError;

/// Result type for deck operations
pub type Result<T> = std::result::Result<T, DeckError>;

/// Errors that abort a deck operation
///
/// Failures confined to one slide or section during a batch are not raised
/// as `DeckError`; they are collected into the operation report instead.
#[derive(Error, Debug)]
pub enum DeckError {
    /// Package-level failure (corrupt archive, missing part, dangling relationship)
    #[error(transparent)]
    Package(#[from] PackageError),

    /// No section with the requested name
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    /// No slide with the requested number
    #[error("Slide {0} not found")]
    SlideNotFound(usize),

    /// Notes export file could not be parsed
    #[error("Notes file line {line}: {reason}")]
    NotesFormat { line: usize, reason: String },

    /// File extension not handled by the requested operation
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Search pattern is not a valid regular expression
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Search text was empty
    #[error("Search text is empty")]
    EmptySearch,

    /// A notes page had to be created but the deck has no notes master
    #[error("Slide {0} has no notes page and the deck has no notes master")]
    MissingNotesMaster(usize),

    /// Slides are not assigned to any section and the split policy refuses them
    #[error("Slides not assigned to any section: {0:?}")]
    UnassignedSlides(Vec<usize>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeckError {
    /// Create a notes format error
    pub fn notes_format(line: usize, reason: impl Into<String>) -> Self {
        Self::NotesFormat {
            line,
            reason: reason.into(),
        }
    }

    /// Create an unsupported format error
    pub fn unsupported(ext: impl Into<String>) -> Self {
        Self::UnsupportedFormat(ext.into())
    }

    /// Get the error code for diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            Self::Package(PackageError::CorruptPackage { .. }) => "DECK001",
            Self::Package(PackageError::PartNotFound(_)) => "DECK002",
            Self::Package(PackageError::DanglingRelationship { .. }) => "DECK003",
            Self::Package(PackageError::MalformedPart { .. }) => "DECK004",
            Self::Package(PackageError::Io(_)) | Self::Io(_) => "DECK005",
            Self::SectionNotFound(_) => "DECK006",
            Self::SlideNotFound(_) => "DECK007",
            Self::NotesFormat { .. } => "DECK008",
            Self::UnsupportedFormat(_) => "DECK009",
            Self::InvalidPattern(_) => "DECK010",
            Self::EmptySearch => "DECK011",
            Self::MissingNotesMaster(_) => "DECK012",
            Self::UnassignedSlides(_) => "DECK013",
        }
    }
}
