//! Compiled view of one source/declaration file.

use std::collections::HashMap;
use std::path::PathBuf;

/// How an import statement binds a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import {a} from ...`
    Named,
    /// `import a from ...`
    Default,
    /// `import * as a from ...`
    Namespace,
}

/// One locally bound import name.
#[derive(Debug, Clone)]
pub struct ImportBinding {
    /// Resolved absolute path of the referenced file.
    pub from: PathBuf,
    pub kind: ImportKind,
    /// Remote name when the binding is aliased (`import {a as b}` keeps `a`).
    pub remote: Option<String>,
}

/// One entry of an explicit re-export list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportName {
    /// Name this unit exports.
    pub name: String,
    /// Remote symbol in the target unit, when it differs or is a sentinel
    /// (`*` for a namespace, `default` for a default export).
    pub remote: Option<String>,
}

/// Provenance of re-exported names: an edge to another unit carrying either
/// an explicit name list or a wildcard whose surface is only known at
/// assembly time.
#[derive(Debug, Clone)]
pub struct ExportEdge {
    pub from: PathBuf,
    pub names: Vec<ExportName>,
    wildcard: bool,
}

impl ExportEdge {
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }
}

/// Import/export analysis result for one file. Immutable once compiled;
/// cached by normalized absolute path.
#[derive(Debug, Default)]
pub struct Unit {
    pub path: PathBuf,
    /// Locally declared exported names, in declaration order, deduplicated
    /// (overload signatures re-declare the same name).
    pub declares: Vec<String>,
    /// Local bound name -> import binding.
    pub imports: HashMap<String, ImportBinding>,
    /// Re-export edges in declaration order.
    pub edges: Vec<ExportEdge>,
    /// `export = X` was seen; the whole module is one opaque namespace.
    pub legacy_aggregate: bool,
}

impl Unit {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    /// Insert-if-absent into the ordered declare set.
    pub fn declare(&mut self, name: &str) {
        if !self.declares.iter().any(|d| d == name) {
            self.declares.push(name.to_string());
        }
    }

    /// Appends a named export entry, dropping any earlier entry for the same
    /// name (last export line wins; the collision is logged, not fatal).
    pub fn push_export(&mut self, from: PathBuf, entry: ExportName) {
        if self.remove_export(&entry.name) {
            tracing::warn!(
                "exported name `{}` is duplicated in {}, keeping the later one",
                entry.name,
                self.path.display()
            );
        }
        self.edges.push(ExportEdge {
            from,
            names: vec![entry],
            wildcard: false,
        });
    }

    /// Appends a wildcard re-export edge.
    pub fn push_wildcard(&mut self, from: PathBuf) {
        self.edges.push(ExportEdge {
            from,
            names: Vec::new(),
            wildcard: true,
        });
    }

    fn remove_export(&mut self, name: &str) -> bool {
        let mut removed = false;
        for edge in &mut self.edges {
            let before = edge.names.len();
            edge.names.retain(|n| n.name != name);
            removed |= edge.names.len() != before;
        }
        self.edges.retain(|e| e.wildcard || !e.names.is_empty());
        removed
    }

    /// Names this unit exports through explicit edges (wildcard surfaces are
    /// not included; they require assembly).
    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.edges
            .iter()
            .flat_map(|e| e.names.iter())
            .map(|n| n.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_is_idempotent() {
        let mut unit = Unit::new(PathBuf::from("/a.ts"));
        unit.declare("Foo");
        unit.declare("Foo");
        unit.declare("Bar");
        assert_eq!(unit.declares, vec!["Foo", "Bar"]);
    }

    #[test]
    fn later_export_replaces_earlier() {
        let mut unit = Unit::new(PathBuf::from("/a.ts"));
        unit.push_export(
            PathBuf::from("/b.ts"),
            ExportName { name: "x".into(), remote: None },
        );
        unit.push_export(
            PathBuf::from("/c.ts"),
            ExportName { name: "x".into(), remote: Some("y".into()) },
        );

        let entries: Vec<_> = unit.edges.iter().flat_map(|e| e.names.iter()).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].remote.as_deref(), Some("y"));
        assert_eq!(unit.edges[0].from, PathBuf::from("/c.ts"));
    }

    #[test]
    fn wildcard_edges_survive_name_removal() {
        let mut unit = Unit::new(PathBuf::from("/a.ts"));
        unit.push_wildcard(PathBuf::from("/b.ts"));
        unit.push_export(
            PathBuf::from("/c.ts"),
            ExportName { name: "x".into(), remote: None },
        );
        unit.push_export(
            PathBuf::from("/d.ts"),
            ExportName { name: "x".into(), remote: None },
        );
        assert!(unit.edges.iter().any(|e| e.is_wildcard()));
    }
}
