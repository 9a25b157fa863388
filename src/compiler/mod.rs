//! File compiler: parses one file's import/export statement lines into a
//! [`Unit`], memoized by normalized absolute path.

pub mod patterns;
pub mod unit;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{LoaderError, Result};
use crate::fs::{normalize_path, FileSystem, OsFileSystem};
use patterns as pat;
pub use unit::{ExportEdge, ExportName, ImportBinding, ImportKind, Unit};

/// Candidate index filenames, in priority order.
pub const INDEX_CANDIDATES: [&str; 3] = ["index.d.ts", "index.ts", "index.tsx"];

/// Extension probing order for reference resolution.
const EXTENSIONS: [&str; 3] = [".d.ts", ".ts", ".tsx"];

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Supply the file content directly instead of reading it.
    pub content: Option<String>,
    /// Bypass the memo table and recompile.
    pub disable_cache: bool,
    /// Skip import-line analysis; only export provenance that does not need
    /// import resolution is wanted.
    pub disable_analyze_import: bool,
}

impl CompileOptions {
    /// Options for files reached through a reference: flags propagate, the
    /// supplied content does not.
    fn child(&self) -> CompileOptions {
        CompileOptions {
            content: None,
            disable_cache: self.disable_cache,
            disable_analyze_import: self.disable_analyze_import,
        }
    }
}

/// Owns the per-process unit cache and the injected filesystem capability.
/// Single-threaded by design; callers wanting isolated cache lifetimes create
/// their own `Compiler`.
pub struct Compiler {
    fs: Box<dyn FileSystem>,
    cache: RefCell<HashMap<PathBuf, Arc<Unit>>>,
    in_progress: RefCell<HashSet<PathBuf>>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_fs(Box::new(OsFileSystem))
    }

    pub fn with_fs(fs: Box<dyn FileSystem>) -> Self {
        Self {
            fs,
            cache: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashSet::new()),
        }
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn compile(&self, path: &Path, options: &CompileOptions) -> Result<Arc<Unit>> {
        let path = normalize_path(path);

        if !options.disable_cache {
            if let Some(unit) = self.cache.borrow().get(&path) {
                return Ok(unit.clone());
            }
        }

        self.in_progress.borrow_mut().insert(path.clone());
        let compiled = self.compile_uncached(&path, options);
        self.in_progress.borrow_mut().remove(&path);

        let unit = Arc::new(compiled?);
        self.cache.borrow_mut().insert(path, unit.clone());
        Ok(unit)
    }

    fn compile_uncached(&self, path: &Path, options: &CompileOptions) -> Result<Unit> {
        let raw = match &options.content {
            Some(content) => content.clone(),
            None => self.fs.read_to_string(path)?,
        };
        // Nested `export` keywords inside a namespace block would otherwise
        // be read as top-level statements.
        let content = pat::EXPORT_NAMESPACE_BLOCK.replace_all(&raw, "").into_owned();

        let mut unit = Unit::new(path.to_path_buf());
        if !options.disable_analyze_import {
            self.analyze_imports(&mut unit, &content, options)?;
        }
        self.analyze_exports(&mut unit, &content)?;
        Ok(unit)
    }

    fn analyze_imports(&self, unit: &mut Unit, content: &str, options: &CompileOptions) -> Result<()> {
        for found in pat::IMPORT_LINE.find_iter(content) {
            let line = pat::strip_inline_comment(found.as_str());

            if let Some(caps) = pat::IMPORT_DEFAULT.captures(&line) {
                self.add_import(unit, &caps[1], ImportKind::Default, None, &caps[2], options)?;
            } else if let Some(caps) = pat::IMPORT_NAMESPACE.captures(&line) {
                self.add_import(unit, &caps[1], ImportKind::Namespace, None, &caps[2], options)?;
            } else if let Some(caps) = pat::IMPORT_DEFAULT_AND_LIST.captures(&line) {
                let reference = caps[3].to_string();
                self.add_import(unit, &caps[1], ImportKind::Default, None, &reference, options)?;
                self.add_import_list(unit, &caps[2], &reference, options)?;
            } else if let Some(caps) = pat::IMPORT_LIST_AND_DEFAULT.captures(&line) {
                let reference = caps[3].to_string();
                self.add_import_list(unit, &caps[1], &reference, options)?;
                self.add_import(unit, &caps[2], ImportKind::Default, None, &reference, options)?;
            } else if let Some(caps) = pat::IMPORT_LIST.captures(&line) {
                self.add_import_list(unit, &caps[1], &caps[2].to_string(), options)?;
            } else if pat::IMPORT_SIDE_EFFECT.is_match(&line) {
                // Side-effect import, nothing is bound.
            } else {
                tracing::warn!(
                    "unsupported import syntax `{}` in {}, skipped",
                    line,
                    unit.path.display()
                );
            }
        }
        Ok(())
    }

    fn add_import_list(
        &self,
        unit: &mut Unit,
        locals: &str,
        reference: &str,
        options: &CompileOptions,
    ) -> Result<()> {
        let locals = locals.trim();
        if locals.is_empty() {
            return Ok(());
        }
        for field in pat::LIST_SPLIT.split(locals) {
            let (local, remote) = pat::split_alias(field);
            self.add_import(unit, &local, ImportKind::Named, remote, reference, options)?;
        }
        Ok(())
    }

    fn add_import(
        &self,
        unit: &mut Unit,
        local: &str,
        kind: ImportKind,
        remote: Option<String>,
        reference: &str,
        options: &CompileOptions,
    ) -> Result<()> {
        let dir = unit.path.parent().unwrap_or_else(|| Path::new("/"));
        let Some(from) = self.find_referenced_path(dir, reference, true) else {
            // An absolute-looking reference is assumed to be an external
            // dependency; only relative ones are worth a warning.
            if reference.starts_with('.') {
                tracing::warn!(
                    "cannot resolve \"{}\" referenced by {}, binding ignored",
                    reference,
                    unit.path.display()
                );
            }
            return Ok(());
        };

        let mut kind = kind;
        if kind == ImportKind::Default && !self.declares_default(&from, options)? {
            // allowSyntheticDefaultImports lets a namespace pose as a default
            // import; the target decides which one this really is.
            kind = ImportKind::Namespace;
        }

        if unit.imports.contains_key(local) {
            tracing::warn!(
                "imported name `{}` is duplicated in {}, keeping the later one",
                local,
                unit.path.display()
            );
        }
        unit.imports
            .insert(local.to_string(), ImportBinding { from, kind, remote });
        Ok(())
    }

    fn declares_default(&self, path: &Path, options: &CompileOptions) -> Result<bool> {
        if self.in_progress.borrow().contains(path) {
            // Mid-compile through an import cycle; keep the default reading.
            return Ok(true);
        }
        let unit = self.compile(path, &options.child())?;
        Ok(unit.declares.iter().any(|d| d == pat::KEY_DEFAULT))
    }

    fn analyze_exports(&self, unit: &mut Unit, content: &str) -> Result<()> {
        for found in pat::EXPORT_LINE.find_iter(content) {
            let line = pat::strip_inline_comment(found.as_str());

            if pat::EXPORT_ASSIGN.is_match(&line) {
                unit.legacy_aggregate = true;
            } else if let Some(caps) = pat::EXPORT_LIST_FROM.captures(&line) {
                let list = caps[1].trim().to_string();
                let from = self.resolve_reference(unit, &line, &caps[2])?;
                if list.is_empty() {
                    unit.push_wildcard(from);
                } else {
                    for field in pat::LIST_SPLIT.split(&list) {
                        let (name, remote) = pat::split_alias(field);
                        unit.push_export(from.clone(), ExportName { name, remote });
                    }
                }
            } else if let Some(caps) = pat::EXPORT_ALL_FROM.captures(&line) {
                let from = self.resolve_reference(unit, &line, &caps[1])?;
                unit.push_wildcard(from);
            } else if pat::EXPORT_DEFAULT.is_match(&line) {
                unit.declare(pat::KEY_DEFAULT);
            } else if let Some(caps) = pat::EXPORT_DECLARATION.captures(&line) {
                unit.declare(&caps[1]);
            } else if let Some(caps) = pat::EXPORT_LIST.captures(&line) {
                let list = caps[1].trim().to_string();
                for field in pat::LIST_SPLIT.split(&list).filter(|f| !f.is_empty()) {
                    self.export_local(unit, field);
                }
            } else {
                return Err(LoaderError::UnsupportedExport {
                    file: unit.path.clone(),
                    line: line.trim().to_string(),
                });
            }
        }
        Ok(())
    }

    /// `export {a, b as c}` with no `from`: each entry either re-exports an
    /// import binding or re-declares a local name.
    fn export_local(&self, unit: &mut Unit, field: &str) {
        let (name, as_source) = pat::split_alias(field);
        let bound = as_source.clone().unwrap_or_else(|| name.clone());

        let Some(binding) = unit.imports.get(&bound) else {
            unit.declare(&name);
            return;
        };

        let from = binding.from.clone();
        let remote = match binding.kind {
            ImportKind::Namespace => Some(pat::KEY_ALL.to_string()),
            ImportKind::Default => Some(pat::KEY_DEFAULT.to_string()),
            ImportKind::Named => {
                let remote = binding
                    .remote
                    .clone()
                    .or_else(|| (bound != name).then(|| bound.clone()));
                // `import {c as b}; export {b as c}` comes back around to a
                // no-op alias.
                remote.filter(|r| r != &name)
            }
        };
        unit.push_export(from, ExportName { name, remote });
    }

    fn resolve_reference(&self, unit: &Unit, line: &str, reference: &str) -> Result<PathBuf> {
        let dir = unit.path.parent().unwrap_or_else(|| Path::new("/"));
        self.find_referenced_path(dir, reference, true)
            .ok_or_else(|| LoaderError::UnresolvedReference {
                file: unit.path.clone(),
                line: line.trim().to_string(),
            })
    }

    /// Maps a reference string to an existing file: extension probing first,
    /// then one `index` retry for directory references.
    fn find_referenced_path(&self, dir: &Path, reference: &str, try_directory: bool) -> Option<PathBuf> {
        let mut reference = reference.to_string();
        let mut try_directory = try_directory;
        if reference.ends_with('/') {
            try_directory = false;
            reference.push_str("index");
        }

        let base = normalize_path(&dir.join(&reference));
        for ext in EXTENSIONS {
            let candidate = PathBuf::from(format!("{}{}", base.display(), ext));
            if self.fs.exists(&candidate) {
                return Some(candidate);
            }
        }

        if try_directory {
            self.find_referenced_path(dir, &format!("{reference}/"), false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn compile(path: &Path) -> Arc<Unit> {
        Compiler::new().compile(path, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn empty_file_compiles_to_empty_unit() {
        let dir = TempDir::new().unwrap();
        let file = create_file(dir.path(), "a.ts", "const local = 1\n");

        let unit = compile(&file);
        assert!(unit.declares.is_empty());
        assert!(unit.imports.is_empty());
        assert!(unit.edges.is_empty());
        assert!(!unit.legacy_aggregate);
    }

    #[test]
    fn cache_returns_identical_unit() {
        let dir = TempDir::new().unwrap();
        let file = create_file(dir.path(), "a.ts", "export const Foo = 1\n");

        let compiler = Compiler::new();
        let first = compiler.compile(&file, &CompileOptions::default()).unwrap();
        let second = compiler.compile(&file, &CompileOptions::default()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let bypass = CompileOptions { disable_cache: true, ..Default::default() };
        let third = compiler.compile(&file, &bypass).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn overload_declarations_dedup() {
        let dir = TempDir::new().unwrap();
        let file = create_file(
            dir.path(),
            "a.ts",
            "export function f(a: string): void\nexport function f(a: number): void\n",
        );

        let unit = compile(&file);
        assert_eq!(unit.declares, vec!["f"]);
    }

    #[test]
    fn default_import_reclassified_without_default_export() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "b.ts", "export const v = 1\n");
        create_file(dir.path(), "c.ts", "export default class C {}\n");
        let file = create_file(
            dir.path(),
            "a.ts",
            "import b from './b'\nimport c from './c'\n",
        );

        let unit = compile(&file);
        assert_eq!(unit.imports["b"].kind, ImportKind::Namespace);
        assert_eq!(unit.imports["c"].kind, ImportKind::Default);
    }

    #[test]
    fn combined_default_and_list_orders_bind_both() {
        let dir = TempDir::new().unwrap();
        create_file(
            dir.path(),
            "b.ts",
            "export default class B {}\nexport const named = 1\n",
        );
        let file = create_file(
            dir.path(),
            "a.ts",
            "import Def, {named} from './b'\nimport {named as other}, Def2 from './b'\n",
        );

        let unit = compile(&file);
        assert_eq!(unit.imports["Def"].kind, ImportKind::Default);
        assert_eq!(unit.imports["named"].kind, ImportKind::Named);
        assert_eq!(unit.imports["Def2"].kind, ImportKind::Default);
        assert_eq!(unit.imports["other"].kind, ImportKind::Named);
        assert_eq!(unit.imports["other"].remote.as_deref(), Some("named"));
    }

    #[test]
    fn unresolvable_imports_are_dropped() {
        let dir = TempDir::new().unwrap();
        let file = create_file(
            dir.path(),
            "a.ts",
            "import {x} from './missing'\nimport {y} from 'some-package'\nimport './style.scss'\n",
        );

        let unit = compile(&file);
        assert!(unit.imports.is_empty());
    }

    #[test]
    fn directory_reference_probes_index() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "sub/index.ts", "export const v = 1\n");
        let file = create_file(dir.path(), "a.ts", "export * from './sub'\n");

        let unit = compile(&file);
        assert_eq!(unit.edges.len(), 1);
        assert!(unit.edges[0].is_wildcard());
        assert!(unit.edges[0].from.ends_with("sub/index.ts"));
    }

    #[test]
    fn extension_priority_prefers_dts() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "b.d.ts", "export const v = 1\n");
        create_file(dir.path(), "b.ts", "export const v = 1\n");
        let file = create_file(dir.path(), "a.ts", "export {v} from './b'\n");

        let unit = compile(&file);
        assert!(unit.edges[0].from.ends_with("b.d.ts"));
    }

    #[test]
    fn export_list_from_records_aliases() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "b.ts", "export const a = 1\nexport const b = 2\n");
        let file = create_file(dir.path(), "a.ts", "export {a, b as c} from './b'\n");

        let unit = compile(&file);
        let names: Vec<_> = unit.export_names().collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(
            unit.edges.iter().flat_map(|e| e.names.iter()).nth(1).unwrap().remote.as_deref(),
            Some("b")
        );
    }

    #[test]
    fn reexported_namespace_import_gets_all_sentinel() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "b.ts", "export const v = 1\n");
        let file = create_file(dir.path(), "a.ts", "import * as b from './b'\nexport {b}\n");

        let unit = compile(&file);
        let entry = unit.edges[0].names.first().unwrap();
        assert_eq!(entry.name, "b");
        assert_eq!(entry.remote.as_deref(), Some("*"));
    }

    #[test]
    fn roundtrip_alias_collapses_to_plain_reference() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "b.ts", "export const c = 1\n");
        let file = create_file(
            dir.path(),
            "a.ts",
            "import {c as b} from './b'\nexport {b as c}\n",
        );

        let unit = compile(&file);
        let entry = unit.edges[0].names.first().unwrap();
        assert_eq!(entry.name, "c");
        assert_eq!(entry.remote, None);
    }

    #[test]
    fn legacy_aggregate_sets_flag_only() {
        let dir = TempDir::new().unwrap();
        let file = create_file(dir.path(), "a.ts", "declare const x: number\nexport = x\n");

        let unit = compile(&file);
        assert!(unit.legacy_aggregate);
        assert!(unit.declares.is_empty());
    }

    #[test]
    fn unparseable_export_is_fatal() {
        let dir = TempDir::new().unwrap();
        let file = create_file(dir.path(), "a.ts", "export !!nonsense!!\n");

        let err = Compiler::new().compile(&file, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, LoaderError::UnsupportedExport { .. }));
    }

    #[test]
    fn missing_export_target_is_fatal() {
        let dir = TempDir::new().unwrap();
        let file = create_file(dir.path(), "a.ts", "export {v} from './missing'\n");

        let err = Compiler::new().compile(&file, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, LoaderError::UnresolvedReference { .. }));
    }

    #[test]
    fn namespace_block_exports_are_ignored() {
        let dir = TempDir::new().unwrap();
        let file = create_file(
            dir.path(),
            "a.ts",
            "export namespace N {\n  export const hidden = 1\n}\nexport const visible = 2\n",
        );

        let unit = compile(&file);
        assert_eq!(unit.declares, vec!["visible"]);
    }

    #[test]
    fn content_option_avoids_filesystem_read() {
        let dir = TempDir::new().unwrap();
        let phantom = dir.path().join("phantom.ts");

        let options = CompileOptions {
            content: Some("export const Foo = 1\n".to_string()),
            ..Default::default()
        };
        let unit = Compiler::new().compile(&phantom, &options).unwrap();
        assert_eq!(unit.declares, vec!["Foo"]);
    }
}
