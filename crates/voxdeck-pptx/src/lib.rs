//! # voxdeck-pptx
//!
//! Slide-deck transformations on top of the `voxdeck-ooxml` package engine.
//!
//! Every operation takes an explicit [`Package`](voxdeck_ooxml::Package),
//! reports progress through an [`EventSink`] and returns a report with counts,
//! touched slides and per-unit errors.
//!
//! ## Features
//!
//! - **Sections**: list the deck's sections and split it into one file per section
//! - **Notes**: export speaker notes to text, Markdown or Word and import edits back
//! - **Text**: find and replace across runs without losing run formatting
//! - **Media**: list, extract, strip and import slide audio/video
//! - **Style**: normalize typefaces and strip animations
//!
//! ## Example
//!
//! ```no_run
//! use voxdeck_ooxml::Package;
//! use voxdeck_pptx::{sections, TracingSink};
//!
//! let package = Package::open("training.pptx")?;
//! let index = sections::list_sections(&package)?;
//! for section in &index.sections {
//!     println!("{}: {} slides", section.display_name(), section.count());
//! }
//! # Ok::<(), voxdeck_pptx::DeckError>(())
//! ```

pub mod builder;
pub mod deck;
pub mod error;
pub mod media;
pub mod notes;
pub mod report;
pub mod sections;
pub mod style;
pub mod subset;
pub mod text;

// Re-exports
pub use deck::SlideRef;
pub use error::{DeckError, Result};
pub use report::{
    EngineEvent, EventSink, FnSink, NullSink, OperationReport, Outcome, TracingSink, Unit,
    UnitError,
};
pub use sections::{Section, SectionIndex};

/// PPTX-related constants
pub mod constants {
    /// Default slide width in EMU (914400 EMU = 1 inch, standard 10" width)
    pub const DEFAULT_SLIDE_WIDTH_EMU: i64 = 9_144_000;

    /// Default slide height in EMU (standard 7.5" height for 4:3)
    pub const DEFAULT_SLIDE_HEIGHT_EMU: i64 = 6_858_000;

    /// EMU per inch
    pub const EMU_PER_INCH: i64 = 914_400;

    /// EMU per point
    pub const EMU_PER_POINT: i64 = 12_700;

    /// PresentationML namespace
    pub const NS_PRESENTATION: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

    /// DrawingML namespace
    pub const NS_DRAWING: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

    /// Relationships namespace
    pub const NS_RELATIONSHIPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    /// PowerPoint 2010 namespace (sections, embedded media)
    pub const NS_P14: &str = "http://schemas.microsoft.com/office/powerpoint/2010/main";

    /// Extension holding the section list
    pub const EXT_URI_SECTIONS: &str = "{521415D9-36F7-43E2-AB2F-B90AF26B5E84}";

    /// Extension holding `p14:media` on a picture
    pub const EXT_URI_MEDIA: &str = "{DAA4B4D4-6D71-4841-9C94-3DA1D6B40A3A}";

    /// Presentation relationship type (package root to main document)
    pub const REL_TYPE_OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

    /// Slide relationship type
    pub const REL_TYPE_SLIDE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";

    /// Slide layout relationship type
    pub const REL_TYPE_SLIDE_LAYOUT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";

    /// Slide master relationship type
    pub const REL_TYPE_SLIDE_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";

    /// Notes slide relationship type
    pub const REL_TYPE_NOTES_SLIDE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";

    /// Notes master relationship type
    pub const REL_TYPE_NOTES_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesMaster";

    /// Theme relationship type
    pub const REL_TYPE_THEME: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";

    /// Image relationship type
    pub const REL_TYPE_IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

    /// Hyperlink relationship type
    pub const REL_TYPE_HYPERLINK: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

    /// Audio relationship type
    pub const REL_TYPE_AUDIO: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/audio";

    /// Video relationship type
    pub const REL_TYPE_VIDEO: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/video";

    /// Office 2010 embedded media relationship type
    pub const REL_TYPE_MEDIA: &str = "http://schemas.microsoft.com/office/2007/relationships/media";

    /// Presentation main part content type
    pub const CT_PRESENTATION: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";

    /// Slide content type
    pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

    /// Notes slide content type
    pub const CT_NOTES_SLIDE: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml";

    /// Notes master content type
    pub const CT_NOTES_MASTER: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.notesMaster+xml";

    /// Slide layout content type
    pub const CT_SLIDE_LAYOUT: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml";

    /// Slide master content type
    pub const CT_SLIDE_MASTER: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml";

    /// Theme content type
    pub const CT_THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emu_constants() {
        assert_eq!(constants::EMU_PER_INCH, 914_400);
        // 1 inch = 72 points
        assert_eq!(constants::EMU_PER_INCH, 72 * constants::EMU_PER_POINT);
    }

    #[test]
    fn test_default_slide_dimensions() {
        // Standard 4:3 slide is 10" x 7.5"
        assert_eq!(constants::DEFAULT_SLIDE_WIDTH_EMU, 10 * constants::EMU_PER_INCH);
        assert_eq!(
            constants::DEFAULT_SLIDE_HEIGHT_EMU,
            (7.5 * constants::EMU_PER_INCH as f64) as i64
        );
    }

    #[test]
    fn test_relationship_types_agree_with_ooxml() {
        use voxdeck_ooxml::Relationships;
        assert_eq!(constants::REL_TYPE_AUDIO, Relationships::TYPE_AUDIO);
        assert_eq!(constants::REL_TYPE_MEDIA, Relationships::TYPE_MEDIA);
        assert_eq!(constants::REL_TYPE_OFFICE_DOCUMENT, Relationships::TYPE_OFFICE_DOCUMENT);
    }
}
