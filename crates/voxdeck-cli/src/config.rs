//! Configuration file
//!
//! Settings are loaded from `voxdeck.toml` (or `.voxdeck.toml`) in the
//! working directory, or from the file given with `--config`:
//!
//! ```toml
//! [notes]
//! format = "markdown"
//! font = "Arial"
//! font_size = 12
//!
//! [replace]
//! case_sensitive = true
//!
//! [fonts]
//! target = "Calibri"
//! scope = "both"
//!
//! [split]
//! unassigned = "catch-all"
//! output_dir = "chapters"
//!
//! [media]
//! tag = "NARRATION"
//! icon_size = 24
//! ```
//!
//! Every table and key is optional; command-line flags win over the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;
use voxdeck_pptx::constants::EMU_PER_POINT;
use voxdeck_pptx::media::{ImportOptions, DEFAULT_AUDIO_TAG};
use voxdeck_pptx::notes::{NotesFormat, RichTextOptions};
use voxdeck_pptx::style::FontScope;
use voxdeck_pptx::subset::UnassignedPolicy;
use voxdeck_pptx::text::Scope;

/// File names looked up in the working directory, in order
pub const CONFIG_FILES: [&str; 2] = ["voxdeck.toml", ".voxdeck.toml"];

/// Top-level settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub notes: NotesSettings,
    pub replace: ReplaceSettings,
    pub fonts: FontSettings,
    pub split: SplitSettings,
    pub media: MediaSettings,
}

impl Settings {
    /// Parse settings from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

/// Notes export defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesSettings {
    /// Format used when no output file is named
    pub format: ExportFormat,
    /// Word export typeface
    pub font: String,
    /// Word export body size in points
    pub font_size: u32,
}

impl Default for NotesSettings {
    fn default() -> Self {
        let rich = RichTextOptions::default();
        Self {
            format: ExportFormat::Docx,
            font: rich.font,
            font_size: rich.font_size,
        }
    }
}

impl NotesSettings {
    pub fn rich_text(&self) -> RichTextOptions {
        RichTextOptions {
            font: self.font.clone(),
            font_size: self.font_size,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaceSettings {
    pub case_sensitive: bool,
    pub regex: bool,
    pub scope: SearchScope,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    /// Typeface `fonts normalize` applies when none is given
    pub target: Option<String>,
    pub scope: FontTarget,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSettings {
    pub unassigned: Unassigned,
    /// Defaults to the deck's own folder
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    /// Alternative text marking imported audio shapes
    pub tag: String,
    /// Audio icon edge in points
    pub icon_size: u32,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            tag: DEFAULT_AUDIO_TAG.to_string(),
            icon_size: 32,
        }
    }
}

impl MediaSettings {
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            tag: self.tag.clone(),
            icon_size: i64::from(self.icon_size) * EMU_PER_POINT,
        }
    }
}

/// Notes file layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Plain text (.txt)
    Text,
    /// Markdown (.md)
    Markdown,
    /// Word document (.docx)
    #[default]
    Docx,
}

impl From<ExportFormat> for NotesFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Text => NotesFormat::Text,
            ExportFormat::Markdown => NotesFormat::Markdown,
            ExportFormat::Docx => NotesFormat::RichText,
        }
    }
}

/// Text searched by find and replace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SearchScope {
    /// Speaker notes only
    #[default]
    Notes,
    /// Slide text only
    Slides,
    /// Notes and slide text
    All,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Notes => Scope::Notes,
            SearchScope::Slides => Scope::Slides,
            SearchScope::All => Scope::All,
        }
    }
}

/// Parts a font command covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FontTarget {
    #[default]
    Slides,
    Notes,
    Both,
}

impl From<FontTarget> for FontScope {
    fn from(target: FontTarget) -> Self {
        match target {
            FontTarget::Slides => FontScope::Slides,
            FontTarget::Notes => FontScope::Notes,
            FontTarget::Both => FontScope::Both,
        }
    }
}

/// Handling of slides outside every section when splitting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Unassigned {
    /// List them and write no file for them
    #[default]
    Report,
    /// Write them to an extra Unassigned deck
    CatchAll,
    /// Refuse to split
    Error,
}

impl From<Unassigned> for UnassignedPolicy {
    fn from(policy: Unassigned) -> Self {
        match policy {
            Unassigned::Report => UnassignedPolicy::Report,
            Unassigned::CatchAll => UnassignedPolicy::CatchAll,
            Unassigned::Error => UnassignedPolicy::Error,
        }
    }
}

/// Load settings from `path`, or from the first config file found in `dir`
pub fn load_settings(path: Option<&Path>, dir: &Path) -> Result<Settings> {
    let path = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            path.to_path_buf()
        }
        None => match CONFIG_FILES.iter().map(|name| dir.join(name)).find(|p| p.exists()) {
            Some(found) => found,
            None => return Ok(Settings::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let settings = Settings::from_toml_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.notes.format, ExportFormat::Docx);
        assert_eq!(settings.notes.font, "Calibri");
        assert_eq!(settings.media.tag, "VOX_VO");
        assert_eq!(settings.split.unassigned, Unassigned::Report);
    }

    #[test]
    fn test_partial_tables() {
        let settings = Settings::from_toml_str(
            r#"
[notes]
format = "markdown"

[split]
unassigned = "catch-all"
output_dir = "out"

[media]
icon_size = 24
"#,
        )
        .unwrap();

        assert_eq!(settings.notes.format, ExportFormat::Markdown);
        assert_eq!(settings.notes.font_size, 14);
        assert_eq!(settings.split.unassigned, Unassigned::CatchAll);
        assert_eq!(settings.split.output_dir, Some(PathBuf::from("out")));
        assert_eq!(settings.media.import_options().icon_size, 24 * EMU_PER_POINT);
        assert_eq!(settings.media.tag, DEFAULT_AUDIO_TAG);
    }

    #[test]
    fn test_unknown_value_is_an_error() {
        assert!(Settings::from_toml_str("[fonts]\nscope = \"everything\"\n").is_err());
    }

    #[test]
    fn test_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_settings(None, dir.path()).unwrap(), Settings::default());

        fs::write(dir.path().join(".voxdeck.toml"), "[fonts]\ntarget = \"Arial\"\n").unwrap();
        fs::write(dir.path().join("voxdeck.toml"), "[fonts]\ntarget = \"Verdana\"\n").unwrap();
        let settings = load_settings(None, dir.path()).unwrap();
        assert_eq!(settings.fonts.target.as_deref(), Some("Verdana"));

        let explicit = dir.path().join(".voxdeck.toml");
        let settings = load_settings(Some(&explicit), dir.path()).unwrap();
        assert_eq!(settings.fonts.target.as_deref(), Some("Arial"));

        assert!(load_settings(Some(&dir.path().join("missing.toml")), dir.path()).is_err());
    }
}
