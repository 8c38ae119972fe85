//! Error types for package operations

use thiserror::Error;

/// Errors that can occur while reading, editing or writing a package
#[derive(Error, Debug)]
pub enum PackageError {
    /// The archive is unreadable, or the manifest / main document is missing or unparsable
    #[error("Corrupt package: {reason}")]
    CorruptPackage { reason: String },

    /// A part was requested that does not exist in the package
    #[error("Part not found: {0}")]
    PartNotFound(String),

    /// An internal relationship points at a part that does not exist
    #[error("Dangling relationship {id} in '{source_part}' -> '{target}'")]
    DanglingRelationship {
        source_part: String,
        id: String,
        target: String,
    },

    /// A part's XML could not be parsed
    #[error("Malformed part '{part}': {reason}")]
    MalformedPart { part: String, reason: String },

    /// Error reading or writing files (permission denied, file in use, ...)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackageError {
    /// Create a corrupt package error
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptPackage {
            reason: reason.into(),
        }
    }

    /// Create a malformed part error
    pub fn malformed(part: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedPart {
            part: part.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a dangling relationship error
    pub fn dangling(
        source_part: impl Into<String>,
        id: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::DanglingRelationship {
            source_part: source_part.into(),
            id: id.into(),
            target: target.into(),
        }
    }

    /// Map a zip error: I/O failures stay I/O, anything else means the archive is unreadable
    pub(crate) fn from_zip(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::corrupt(other.to_string()),
        }
    }

    /// Whether the error describes package corruption rather than an environmental failure
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptPackage { .. } | Self::DanglingRelationship { .. } | Self::MalformedPart { .. }
        )
    }
}

/// Result type for package operations
pub type Result<T> = std::result::Result<T, PackageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PackageError::dangling("ppt/slides/slide1.xml", "rId7", "ppt/media/media1.m4a");
        let msg = err.to_string();
        assert!(msg.contains("rId7"));
        assert!(msg.contains("ppt/media/media1.m4a"));
        assert!(err.is_corruption());

        let err = PackageError::PartNotFound("ppt/slides/slide9.xml".to_string());
        assert!(err.to_string().contains("slide9"));
        assert!(!err.is_corruption());
    }

    #[test]
    fn test_zip_io_stays_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        let err = PackageError::from_zip(zip::result::ZipError::Io(io));
        assert!(matches!(err, PackageError::Io(_)));

        let err = PackageError::from_zip(zip::result::ZipError::InvalidArchive("bad".into()));
        assert!(matches!(err, PackageError::CorruptPackage { .. }));
    }
}
