//! # voxdeck-ooxml
//!
//! OPC (Open Packaging Conventions) plumbing for voxdeck.
//!
//! This crate provides:
//! - [`Package`]: an unzipped package with lazily parsed parts and atomic save
//! - [`ContentTypes`] and [`Relationships`]: the manifest and per-part relationship lists
//! - [`RelationshipGraph`]: target resolution, id allocation and orphan collection
//! - [`xml`]: the element tree document parts are edited through
//!
//! It knows nothing about slides; see `voxdeck-pptx` for that.
//!
//! ## Example
//!
//! ```no_run
//! use voxdeck_ooxml::{Package, RelationshipGraph, graph::PACKAGE_ROOT};
//!
//! let mut package = Package::open("deck.pptx")?;
//! let mut graph = RelationshipGraph::build(&package);
//! let removed = graph.collect_garbage(&mut package, &[PACKAGE_ROOT])?;
//! println!("removed {} orphaned parts", removed.len());
//! package.save("deck.pptx")?;
//! # Ok::<(), voxdeck_ooxml::PackageError>(())
//! ```

pub mod content_types;
pub mod error;
pub mod graph;
pub mod package;
pub mod path;
pub mod relationships;
pub mod xml;

#[cfg(test)]
pub(crate) mod test_utils;

pub use content_types::ContentTypes;
pub use error::{PackageError, Result};
pub use graph::{Edge, RelationshipGraph};
pub use package::Package;
pub use relationships::{Relationship, Relationships, TargetMode};
pub use xml::{XmlDocument, XmlElement, XmlNode};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
