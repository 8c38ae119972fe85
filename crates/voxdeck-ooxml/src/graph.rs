//! Relationship graph over a package
//!
//! [`RelationshipGraph`] is a derived index of every internal relationship in
//! a [`Package`]: outgoing edges per source part and incoming edges per target.
//! It records the package generation it was built from; any relationship or
//! part mutation made behind its back makes it stale and it must be rebuilt.
//! Mutations made through the graph keep it current.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::{debug, warn};

use crate::error::{PackageError, Result};
use crate::package::Package;
use crate::path::{relative_target, resolve_target};
use crate::relationships::{Relationship, TargetMode};

/// The package root, source of `_rels/.rels`
pub const PACKAGE_ROOT: &str = "";

/// An internal relationship edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: String,
    pub id: String,
    pub rel_type: String,
    /// Resolved part path of the target
    pub target: String,
}

/// Index of internal relationships, built from a package
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    outgoing: BTreeMap<String, Vec<Edge>>,
    incoming: HashMap<String, Vec<(String, String)>>,
    generation: u64,
}

impl RelationshipGraph {
    /// Index every internal relationship of the package
    pub fn build(package: &Package) -> Self {
        let mut graph = Self {
            generation: package.generation(),
            ..Default::default()
        };

        for source in package.relationship_sources() {
            let Some(rels) = package.relationships(source) else {
                continue;
            };
            for (id, rel) in rels.iter() {
                if rel.mode == TargetMode::External {
                    continue;
                }
                graph.insert_edge(Edge {
                    source: source.to_string(),
                    id: id.to_string(),
                    rel_type: rel.rel_type.clone(),
                    target: resolve_target(source, &rel.target),
                });
            }
        }

        debug!(
            sources = graph.outgoing.len(),
            targets = graph.incoming.len(),
            "relationship graph built"
        );
        graph
    }

    /// Whether the package changed since the graph was built
    pub fn is_stale(&self, package: &Package) -> bool {
        self.generation != package.generation()
    }

    /// Rebuild if the package changed since the graph was built
    pub fn refresh(&mut self, package: &Package) {
        if self.is_stale(package) {
            *self = Self::build(package);
        }
    }

    fn insert_edge(&mut self, edge: Edge) {
        self.incoming
            .entry(edge.target.clone())
            .or_default()
            .push((edge.source.clone(), edge.id.clone()));
        self.outgoing.entry(edge.source.clone()).or_default().push(edge);
    }

    /// Resolve a relationship id to the path of the part it targets
    pub fn resolve(&self, package: &Package, source: &str, id: &str) -> Result<String> {
        let edge = self
            .outgoing(source)
            .iter()
            .find(|edge| edge.id == id)
            .ok_or_else(|| PackageError::dangling(source, id, "(no such relationship)"))?;
        if package.contains(&edge.target) {
            Ok(edge.target.clone())
        } else {
            Err(PackageError::dangling(source, id, edge.target.clone()))
        }
    }

    /// Internal edges leaving a part
    pub fn outgoing(&self, source: &str) -> &[Edge] {
        self.outgoing.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(source, id)` pairs of the internal relationships targeting a part
    pub fn incoming(&self, target: &str) -> &[(String, String)] {
        self.incoming.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add a relationship from `source` to `target`, returning the allocated id
    ///
    /// Internal targets are part paths and are stored relative to the source part;
    /// external targets are stored as given.
    pub fn add_relationship(
        &mut self,
        package: &mut Package,
        source: &str,
        rel_type: &str,
        target: &str,
        mode: TargetMode,
    ) -> String {
        self.refresh(package);
        let stored_target = match mode {
            TargetMode::Internal => relative_target(source, target),
            TargetMode::External => target.to_string(),
        };
        let id = package
            .relationships_mut(source)
            .add(stored_target, rel_type, mode);
        if mode == TargetMode::Internal {
            self.insert_edge(Edge {
                source: source.to_string(),
                id: id.clone(),
                rel_type: rel_type.to_string(),
                target: resolve_target(source, target),
            });
        }
        self.generation = package.generation();
        id
    }

    /// Remove a relationship
    ///
    /// Returns the removed relationship and, when its target is no longer
    /// reachable from the package root, the target as a garbage-collection candidate.
    pub fn remove_relationship(
        &mut self,
        package: &mut Package,
        source: &str,
        id: &str,
    ) -> Option<(Relationship, Option<String>)> {
        self.refresh(package);
        let removed = package.relationships_mut(source).remove(id)?;

        let mut target = None;
        if let Some(edges) = self.outgoing.get_mut(source) {
            if let Some(pos) = edges.iter().position(|edge| edge.id == id) {
                let edge = edges.remove(pos);
                if let Some(sources) = self.incoming.get_mut(&edge.target) {
                    sources.retain(|(s, i)| !(s == source && i == id));
                }
                target = Some(edge.target);
            }
        }
        self.generation = package.generation();

        let candidate = target.filter(|t| !self.reachable(&[PACKAGE_ROOT]).contains(t));
        Some((removed, candidate))
    }

    /// Parts reachable from `roots` through internal relationships (the mark phase)
    pub fn reachable(&self, roots: &[&str]) -> BTreeSet<String> {
        let mut seen: BTreeSet<String> = roots.iter().map(|r| r.to_string()).collect();
        let mut queue: VecDeque<String> = seen.iter().cloned().collect();

        while let Some(part) = queue.pop_front() {
            for edge in self.outgoing(&part) {
                if seen.insert(edge.target.clone()) {
                    queue.push_back(edge.target.clone());
                }
            }
        }
        seen
    }

    /// Remove every part not reachable from `roots`; returns the removed paths
    pub fn collect_garbage(&mut self, package: &mut Package, roots: &[&str]) -> Result<Vec<String>> {
        self.refresh(package);
        let live = self.reachable(roots);
        let garbage: Vec<String> = package
            .part_names()
            .filter(|name| !live.contains(*name))
            .map(str::to_string)
            .collect();

        for part in &garbage {
            package.remove_part(part)?;
            debug!(part = %part, "orphaned part removed");
        }
        *self = Self::build(package);
        Ok(garbage)
    }

    /// Every internal relationship whose target part does not exist
    pub fn validate(&self, package: &Package) -> Vec<PackageError> {
        let problems: Vec<PackageError> = self
            .outgoing
            .values()
            .flatten()
            .filter(|edge| !package.contains(&edge.target))
            .map(|edge| PackageError::dangling(&edge.source, &edge.id, &edge.target))
            .collect();
        for problem in &problems {
            warn!("{problem}");
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::minimal_package_bytes;

    fn package() -> Package {
        Package::from_bytes(&minimal_package_bytes()).unwrap()
    }

    #[test]
    fn test_build_skips_external() {
        let pkg = package();
        let graph = RelationshipGraph::build(&pkg);
        assert_eq!(graph.outgoing("doc/main.xml").len(), 2);
        assert_eq!(graph.incoming("doc/media/shared.bin").len(), 2);
    }

    #[test]
    fn test_resolve() {
        let pkg = package();
        let graph = RelationshipGraph::build(&pkg);
        assert_eq!(graph.resolve(&pkg, "doc/main.xml", "rId1").unwrap(), "doc/sub/leaf.xml");
        assert!(matches!(
            graph.resolve(&pkg, "doc/main.xml", "rId3"),
            Err(PackageError::DanglingRelationship { .. })
        ));
    }

    #[test]
    fn test_resolve_missing_target_is_dangling() {
        let mut pkg = package();
        pkg.remove_part("doc/sub/leaf.xml").unwrap();
        let graph = RelationshipGraph::build(&pkg);
        let err = graph.resolve(&pkg, "doc/main.xml", "rId1").unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(graph.validate(&pkg).len(), 1);
    }

    #[test]
    fn test_add_relationship_allocates_next_id() {
        let mut pkg = package();
        let mut graph = RelationshipGraph::build(&pkg);
        pkg.put_part("doc/media/new.bin", vec![1], "application/octet-stream");

        let id = graph.add_relationship(
            &mut pkg,
            "doc/sub/leaf.xml",
            "urn:test:blob",
            "doc/media/new.bin",
            TargetMode::Internal,
        );
        assert_eq!(id, "rId2");
        assert_eq!(
            pkg.relationships("doc/sub/leaf.xml").unwrap().get("rId2"),
            Some("../media/new.bin")
        );
        assert!(!graph.is_stale(&pkg));
        assert_eq!(graph.resolve(&pkg, "doc/sub/leaf.xml", &id).unwrap(), "doc/media/new.bin");
    }

    #[test]
    fn test_remove_shared_target_is_not_candidate() {
        let mut pkg = package();
        let mut graph = RelationshipGraph::build(&pkg);
        let (_, candidate) = graph
            .remove_relationship(&mut pkg, "doc/main.xml", "rId2")
            .unwrap();
        // still reachable through leaf.xml
        assert_eq!(candidate, None);
    }

    #[test]
    fn test_remove_sole_reference_yields_candidate() {
        let mut pkg = package();
        let mut graph = RelationshipGraph::build(&pkg);
        graph.remove_relationship(&mut pkg, "doc/sub/leaf.xml", "rId1");
        let (_, candidate) = graph
            .remove_relationship(&mut pkg, "doc/main.xml", "rId2")
            .unwrap();
        assert_eq!(candidate.as_deref(), Some("doc/media/shared.bin"));
    }

    #[test]
    fn test_reachable_and_collect_garbage() {
        let mut pkg = package();
        let mut graph = RelationshipGraph::build(&pkg);

        let live = graph.reachable(&[PACKAGE_ROOT]);
        assert!(live.contains("doc/main.xml"));
        assert!(!live.contains("doc/orphan.xml"));

        let removed = graph.collect_garbage(&mut pkg, &[PACKAGE_ROOT]).unwrap();
        assert_eq!(removed, vec!["doc/orphan.xml".to_string()]);
        assert!(!pkg.contains("doc/orphan.xml"));
        assert!(graph.validate(&pkg).is_empty());

        // second sweep is a no-op
        assert!(graph.collect_garbage(&mut pkg, &[PACKAGE_ROOT]).unwrap().is_empty());
    }

    #[test]
    fn test_stale_after_untracked_mutation() {
        let mut pkg = package();
        let mut graph = RelationshipGraph::build(&pkg);
        pkg.relationships_mut("doc/main.xml").remove("rId1");
        assert!(graph.is_stale(&pkg));
        graph.refresh(&pkg);
        assert_eq!(graph.outgoing("doc/main.xml").len(), 1);
    }
}
