//! Reference resolver: follows import bindings and re-export edges
//! transitively to the unit where a name is actually declared.
//!
//! Each top-level call carries its own visited set; a re-export chain that
//! comes back to a (unit, name) pair already on the current path fails with
//! [`LoaderError::CircularReexport`] instead of blowing the call stack.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::compiler::patterns::KEY_ALL;
use crate::compiler::{CompileOptions, Compiler, ExportName, Unit};
use crate::error::{LoaderError, Result};

/// Terminal location of a resolved symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Unit that declares the symbol.
    pub path: PathBuf,
    /// Remote name when the resolution went through an alias, or a sentinel
    /// (`*`, `default`).
    pub remote: Option<String>,
}

/// Resolves `name` against `unit`'s declares and re-export edges.
pub fn resolve(
    compiler: &Compiler,
    name: &str,
    unit: &Unit,
    options: &CompileOptions,
) -> Result<Resolved> {
    let entry = ExportName { name: name.to_string(), remote: None };
    follow(compiler, &entry, unit, &unit.path, options, &mut HashSet::new())
}

/// Resolves one edge entry against the edge's target unit. `requester` names
/// the unit that asked, for error reporting.
pub fn resolve_from(
    compiler: &Compiler,
    entry: &ExportName,
    target: &Unit,
    requester: &Path,
    options: &CompileOptions,
) -> Result<Resolved> {
    follow(compiler, entry, target, requester, options, &mut HashSet::new())
}

fn follow(
    compiler: &Compiler,
    entry: &ExportName,
    unit: &Unit,
    requester: &Path,
    options: &CompileOptions,
    on_path: &mut HashSet<(PathBuf, String)>,
) -> Result<Resolved> {
    // A whole-module namespace never resolves further.
    if entry.remote.as_deref() == Some(KEY_ALL) {
        return Ok(Resolved {
            path: unit.path.clone(),
            remote: Some(KEY_ALL.to_string()),
        });
    }

    let need = entry.remote.clone().unwrap_or_else(|| entry.name.clone());
    let key = (unit.path.clone(), need.clone());
    if !on_path.insert(key.clone()) {
        return Err(LoaderError::CircularReexport(unit.path.clone()));
    }
    let result = step(compiler, entry, &need, unit, requester, options, on_path);
    on_path.remove(&key);
    result
}

fn step(
    compiler: &Compiler,
    entry: &ExportName,
    need: &str,
    unit: &Unit,
    requester: &Path,
    options: &CompileOptions,
    on_path: &mut HashSet<(PathBuf, String)>,
) -> Result<Resolved> {
    if unit.declares.iter().any(|d| d == need) {
        return Ok(Resolved {
            path: unit.path.clone(),
            remote: entry.remote.clone(),
        });
    }

    for edge in &unit.edges {
        if edge.is_wildcard() {
            let target = compiler.compile(&edge.from, options)?;
            let same = ExportName { name: need.to_string(), remote: None };
            match follow(compiler, &same, &target, requester, options, on_path) {
                Ok(resolved) => return Ok(resolved),
                Err(LoaderError::SymbolNotFound { .. }) => continue,
                Err(other) => return Err(other),
            }
        } else if let Some(next) = edge.names.iter().find(|n| n.name == *need) {
            let target = compiler.compile(&edge.from, options)?;
            return follow(compiler, next, &target, requester, options, on_path);
        }
    }

    Err(LoaderError::SymbolNotFound {
        name: need.to_string(),
        requester: requester.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn compile(compiler: &Compiler, path: &Path) -> std::sync::Arc<Unit> {
        compiler.compile(path, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn local_declaration_terminates() {
        let dir = TempDir::new().unwrap();
        let file = create_file(dir.path(), "a.ts", "export const X = 1\n");

        let compiler = Compiler::new();
        let unit = compile(&compiler, &file);
        let resolved = resolve(&compiler, "X", &unit, &CompileOptions::default()).unwrap();
        assert_eq!(resolved.path, unit.path);
        assert_eq!(resolved.remote, None);
    }

    #[test]
    fn follows_reexport_chain_through_alias() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "c.ts", "export const deep = 1\n");
        create_file(dir.path(), "b.ts", "export {deep as mid} from './c'\n");
        let file = create_file(dir.path(), "a.ts", "export {mid as top} from './b'\n");

        let compiler = Compiler::new();
        let unit = compile(&compiler, &file);
        let resolved = resolve(&compiler, "top", &unit, &CompileOptions::default()).unwrap();
        assert!(resolved.path.ends_with("c.ts"));
        assert_eq!(resolved.remote.as_deref(), Some("deep"));
    }

    #[test]
    fn searches_wildcard_edges_in_order() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "b.ts", "export const only_b = 1\n");
        create_file(dir.path(), "c.ts", "export const only_c = 1\n");
        let file = create_file(dir.path(), "a.ts", "export * from './b'\nexport * from './c'\n");

        let compiler = Compiler::new();
        let unit = compile(&compiler, &file);
        let resolved = resolve(&compiler, "only_c", &unit, &CompileOptions::default()).unwrap();
        assert!(resolved.path.ends_with("c.ts"));
    }

    #[test]
    fn missing_symbol_names_requester() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "b.ts", "export const v = 1\n");
        let file = create_file(dir.path(), "a.ts", "export * from './b'\n");

        let compiler = Compiler::new();
        let unit = compile(&compiler, &file);
        let err = resolve(&compiler, "nope", &unit, &CompileOptions::default()).unwrap_err();
        match err {
            LoaderError::SymbolNotFound { name, requester } => {
                assert_eq!(name, "nope");
                assert!(requester.ends_with("a.ts"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn circular_reexport_is_a_clean_error() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "b.ts", "export * from './a'\n");
        let file = create_file(dir.path(), "a.ts", "export * from './b'\n");

        let compiler = Compiler::new();
        let unit = compile(&compiler, &file);
        let err = resolve(&compiler, "ghost", &unit, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, LoaderError::CircularReexport(_)));
    }

    #[test]
    fn diamond_graphs_are_not_cycles() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "common.ts", "export const shared = 1\n");
        create_file(dir.path(), "left.ts", "export * from './common'\n");
        create_file(dir.path(), "right.ts", "export * from './common'\nexport const extra = 1\n");
        let file = create_file(dir.path(), "a.ts", "export * from './left'\nexport * from './right'\n");

        let compiler = Compiler::new();
        let unit = compile(&compiler, &file);
        // `extra` is not in left's subtree; the walk must be able to revisit
        // common.ts under right.ts without reporting a cycle.
        let resolved = resolve(&compiler, "extra", &unit, &CompileOptions::default()).unwrap();
        assert!(resolved.path.ends_with("right.ts"));
    }
}
