//! Import rewriter: turns barrel imports (`import {a, b} from 'pkg'`) into
//! direct per-submodule imports using an assembled export map.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::assembler::{load_artifact, AssembleOptions, Assembler, ExportMap};
use crate::compiler::patterns::{self as pat, KEY_ALL, KEY_DEFAULT, KEY_SEPARATOR};
use crate::error::{LoaderError, Result};
use crate::fs::normalize_path;

/// One module the rewriter knows how to split.
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    /// Literal module name as it appears in import statements, e.g. `antd`.
    pub name: String,
    /// Root directory of the module; defaults to
    /// `<projectRoot>/node_modules/<name>`.
    pub root: Option<PathBuf>,
    /// Persisted export-map artifact; defaults to `<root>/index.d.json` when
    /// that file exists.
    pub map_file: Option<PathBuf>,
    /// Root declaration file; defaults to the `module`/`typings` field of the
    /// module's `package.json`, then `<root>/index.d.ts`.
    pub entry_file: Option<PathBuf>,
    /// Recompute the export map on every call instead of caching it.
    pub realtime_parse: bool,
    /// Log every replaced statement.
    pub debug: bool,
}

impl ModuleConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Result of rewriting one source text.
#[derive(Debug)]
pub struct RewriteOutcome {
    pub source_file: PathBuf,
    pub source: String,
    pub rewritten: String,
    /// Referenced submodule paths (e.g. `antd/es/Layout`), in discovery
    /// order, deduplicated.
    pub ref_modules: Vec<String>,
}

/// Holds the per-module-name statement patterns and export-map cache.
pub struct Rewriter {
    assembler: Assembler,
    patterns: RefCell<HashMap<String, Regex>>,
    maps: RefCell<HashMap<String, ExportMap>>,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Rewriter {
    pub fn new() -> Self {
        Self::with_assembler(Assembler::new())
    }

    pub fn with_assembler(assembler: Assembler) -> Self {
        Self {
            assembler,
            patterns: RefCell::new(HashMap::new()),
            maps: RefCell::new(HashMap::new()),
        }
    }

    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }

    /// Build-pipeline transform contract: rewrite `source` (read from
    /// `resource_path` when not supplied) against every configured module.
    pub fn transform(
        &self,
        resource_path: &Path,
        source: Option<&str>,
        modules: &[ModuleConfig],
    ) -> Result<RewriteOutcome> {
        let resource_path = normalize_path(resource_path);
        let source = match source {
            Some(text) => text.to_string(),
            None => self.assembler.compiler().fs().read_to_string(&resource_path)?,
        };

        let mut ref_modules = Vec::new();
        let mut rewritten = source.clone();
        for module in modules {
            let map = self.module_map(&resource_path, module)?;
            rewritten = self.apply(&rewritten, &module.name, &map, module.debug, &mut ref_modules)?;
        }

        Ok(RewriteOutcome {
            source_file: resource_path,
            source,
            rewritten,
            ref_modules,
        })
    }

    /// Rewrites `source` against precomputed maps keyed by literal module
    /// name. Returns the rewritten text and the referenced submodule paths.
    pub fn rewrite_source(
        &self,
        source: &str,
        bindings: &[(&str, &ExportMap)],
    ) -> Result<(String, Vec<String>)> {
        let mut ref_modules = Vec::new();
        let mut rewritten = source.to_string();
        for (name, map) in bindings {
            rewritten = self.apply(&rewritten, name, map, false, &mut ref_modules)?;
        }
        Ok((rewritten, ref_modules))
    }

    fn apply(
        &self,
        source: &str,
        module: &str,
        map: &ExportMap,
        debug: bool,
        ref_modules: &mut Vec<String>,
    ) -> Result<String> {
        let pattern = self.pattern_for(module);
        let mut out = String::with_capacity(source.len());
        let mut last = 0;

        for caps in pattern.captures_iter(source) {
            let matched = caps.get(0).unwrap();
            out.push_str(&source[last..matched.start()]);
            last = matched.end();

            // The two quote captures stand in for a backreference; mixed
            // quotes mean this is not actually a statement about `module`.
            if caps[4] != caps[5] {
                out.push_str(matched.as_str());
                continue;
            }

            let replacement = self.replace_statement(
                &caps[1],
                &caps[2],
                &caps[3],
                &caps[4],
                module,
                map,
                ref_modules,
            )?;
            if debug {
                tracing::debug!("{}  =>  {}", matched.as_str(), replacement);
            }
            out.push_str(&replacement);
        }
        out.push_str(&source[last..]);
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn replace_statement(
        &self,
        indent: &str,
        in_out: &str,
        raw_fields: &str,
        quote: &str,
        module: &str,
        map: &ExportMap,
        ref_modules: &mut Vec<String>,
    ) -> Result<String> {
        let prefix_ws = &raw_fields[..raw_fields.len() - raw_fields.trim_start().len()];
        let suffix_ws = &raw_fields[raw_fields.trim_end().len()..];
        let cleaned = pat::strip_inline_comment(raw_fields.trim());

        struct Slot {
            /// Original field text, reused verbatim when no alias applies.
            field: String,
            /// Local/exported name of the entry.
            key: String,
            /// Remote part of the map value (may be a sentinel, or empty).
            alias: String,
        }

        let mut files: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Slot>> = HashMap::new();

        for field in pat::LIST_SPLIT.split(cleaned.trim()) {
            let (key, lookup_override) = pat::split_alias(field);
            let lookup = lookup_override.as_deref().unwrap_or(&key);
            let Some(value) = map.get(lookup) else {
                return Err(LoaderError::FieldNotInModule {
                    field: field.to_string(),
                    module: module.to_string(),
                });
            };

            let (subfile, alias) = match value.split_once(KEY_SEPARATOR) {
                Some((subfile, alias)) => (subfile, alias),
                None => (value.as_str(), ""),
            };
            let file = if subfile.is_empty() {
                module.to_string()
            } else {
                format!("{}/{}", module, subfile.trim_start_matches("./"))
            };

            if !groups.contains_key(&file) {
                if !ref_modules.contains(&file) {
                    ref_modules.push(file.clone());
                }
                files.push(file.clone());
                groups.insert(file.clone(), Vec::new());
            }
            groups.get_mut(&file).unwrap().push(Slot {
                field: field.to_string(),
                key,
                alias: alias.to_string(),
            });
        }

        let mut lines = Vec::new();
        for file in &files {
            let from_file = format!("from {quote}{file}{quote}");
            let mut bracket_fields = Vec::new();

            for slot in &groups[file] {
                if slot.alias == KEY_ALL {
                    // A namespace import cannot be bracket-combined.
                    lines.push(format!("{indent}{in_out} * as {} {from_file}", slot.key));
                } else if slot.alias == KEY_DEFAULT {
                    lines.push(format!("{indent}{in_out} {} {from_file}", slot.key));
                } else if slot.alias.is_empty() {
                    bracket_fields.push(slot.field.clone());
                } else {
                    bracket_fields.push(format!("{} as {}", slot.alias, slot.key));
                }
            }

            if !bracket_fields.is_empty() {
                lines.push(format!(
                    "{indent}{in_out} {{{prefix_ws}{}{suffix_ws}}} {from_file}",
                    bracket_fields.join(", ")
                ));
            }
        }
        Ok(lines.join(pat::EOL))
    }

    fn pattern_for(&self, module: &str) -> Regex {
        if let Some(pattern) = self.patterns.borrow().get(module) {
            return pattern.clone();
        }
        let pattern = Regex::new(&format!(
            r#"(?m)^([ \t]*)(import|export)\s+\{{([^}}]+)\}}\s+from\s+(['"]){}(['"])"#,
            regex::escape(module)
        ))
        .expect("escaped module name always forms a valid pattern");
        self.patterns
            .borrow_mut()
            .insert(module.to_string(), pattern.clone());
        pattern
    }

    /// Locates the export map for one configured module: persisted artifact
    /// first, then the `module`/`typings` entry of its package.json, then
    /// `index.d.ts`, assembling on the fly for the latter two.
    fn module_map(&self, source_file: &Path, module: &ModuleConfig) -> Result<ExportMap> {
        if !module.realtime_parse {
            if let Some(map) = self.maps.borrow().get(&module.name) {
                return Ok(map.clone());
            }
        }

        let fs = self.assembler.compiler().fs();
        let root = match &module.root {
            Some(root) => normalize_path(root),
            None => self.default_root(source_file, &module.name)?,
        };

        let artifact = module
            .map_file
            .clone()
            .or_else(|| {
                let candidate = root.join("index.d.json");
                fs.exists(&candidate).then_some(candidate)
            });
        if let Some(artifact) = artifact {
            let map = load_artifact(fs, &artifact)?;
            self.maps.borrow_mut().insert(module.name.clone(), map.clone());
            return Ok(map);
        }

        let mut entry: Option<PathBuf> = None;
        if root.to_string_lossy().contains("node_modules") {
            if let Ok(text) = fs.read_to_string(&root.join("package.json")) {
                if let Ok(pkg) = serde_json::from_str::<serde_json::Value>(&text) {
                    let declared = pkg
                        .get("module")
                        .or_else(|| pkg.get("typings"))
                        .and_then(|v| v.as_str());
                    if let Some(rel) = declared {
                        let candidate = root.join(rel);
                        if fs.exists(&candidate) {
                            entry = Some(candidate);
                        } else {
                            tracing::warn!(
                                "module `{}` names a module/typings file `{}` that does not exist",
                                module.name,
                                rel
                            );
                        }
                    }
                }
            }
        }
        let entry = entry.or_else(|| module.entry_file.clone()).or_else(|| {
            let candidate = root.join("index.d.ts");
            fs.exists(&candidate).then_some(candidate)
        });
        let Some(entry) = entry else {
            return Err(LoaderError::MissingModuleEntry(module.name.clone()));
        };

        let mut map = self.assembler.assemble(
            &entry,
            &AssembleOptions {
                disable_cache: module.realtime_parse,
                ..Default::default()
            },
        )?;

        // A package whose typings live in a subdirectory (antd's `es/`, say)
        // needs that directory prefixed onto every map value.
        let entry_dir = normalize_path(&entry);
        let entry_dir = entry_dir.parent().unwrap_or(&root);
        if let Ok(prefix) = entry_dir.strip_prefix(&root) {
            let prefix = prefix.to_string_lossy().replace('\\', "/");
            if !prefix.is_empty() && prefix != "." {
                for value in map.values_mut() {
                    *value = prefix_value(&prefix, value);
                }
            }
        }

        self.maps.borrow_mut().insert(module.name.clone(), map.clone());
        Ok(map)
    }

    fn default_root(&self, source_file: &Path, name: &str) -> Result<PathBuf> {
        let fs = self.assembler.compiler().fs();
        let mut dir = normalize_path(source_file);
        while dir.pop() {
            if fs.exists(&dir.join("package.json")) {
                return Ok(dir.join("node_modules").join(name));
            }
            if dir.parent().is_none() {
                break;
            }
        }
        Err(LoaderError::MissingModuleEntry(name.to_string()))
    }
}

fn prefix_value(prefix: &str, value: &str) -> String {
    let (subfile, alias) = match value.split_once(KEY_SEPARATOR) {
        Some((subfile, alias)) => (subfile, Some(alias)),
        None => (value, None),
    };
    let joined = if subfile.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, subfile.trim_start_matches("./"))
    };
    match alias {
        Some(alias) => format!("{joined}{KEY_SEPARATOR}{alias}"),
        None => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(entries: &[(&str, &str)]) -> ExportMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn rewrite(source: &str, module: &str, map: &ExportMap) -> (String, Vec<String>) {
        Rewriter::new().rewrite_source(source, &[(module, map)]).unwrap()
    }

    #[test]
    fn aliased_entry_threads_the_remote_name() {
        let map = map_of(&[("z", "./b::v")]);
        let (out, refs) = rewrite("import {z} from 'pkg'\n", "pkg", &map);
        assert_eq!(out, "import {v as z} from 'pkg/b'\n");
        assert_eq!(refs, vec!["pkg/b"]);
    }

    #[test]
    fn namespace_sentinel_becomes_star_import() {
        let map = map_of(&[("ns", "./b::*")]);
        let (out, _) = rewrite("import {ns} from 'pkg'\n", "pkg", &map);
        assert_eq!(out, "import * as ns from 'pkg/b'\n");
    }

    #[test]
    fn default_sentinel_becomes_default_import() {
        let map = map_of(&[("widget", "./w::default")]);
        let (out, _) = rewrite("import {widget} from 'pkg'\n", "pkg", &map);
        assert_eq!(out, "import widget from 'pkg/w'\n");
    }

    #[test]
    fn entries_group_by_subfile() {
        let map = map_of(&[("a", "./x"), ("b", "./x"), ("c", "./y")]);
        let (out, refs) = rewrite("import {a, b, c} from 'pkg'\n", "pkg", &map);
        assert_eq!(
            out,
            format!("import {{a, b}} from 'pkg/x'{}import {{c}} from 'pkg/y'\n", pat::EOL)
        );
        assert_eq!(refs, vec!["pkg/x", "pkg/y"]);
    }

    #[test]
    fn entry_resident_names_keep_the_bare_module() {
        let map = map_of(&[("test", "")]);
        let (out, refs) = rewrite("import {test} from 'pkg'\n", "pkg", &map);
        assert_eq!(out, "import {test} from 'pkg'\n");
        assert_eq!(refs, vec!["pkg"]);
    }

    #[test]
    fn missing_field_names_field_and_module() {
        let map = map_of(&[("a", "./x")]);
        let err = Rewriter::new()
            .rewrite_source("import {ghost} from 'pkg'\n", &[("pkg", &map)])
            .unwrap_err();
        match err {
            LoaderError::FieldNotInModule { field, module } => {
                assert_eq!(field, "ghost");
                assert_eq!(module, "pkg");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn indentation_and_statement_kind_survive() {
        let map = map_of(&[("a", "./x")]);
        let (out, _) = rewrite("    export {a} from \"pkg\"\n", "pkg", &map);
        assert_eq!(out, "    export {a} from \"pkg/x\"\n");
    }

    #[test]
    fn bracket_spacing_is_preserved() {
        let map = map_of(&[("a", "./x"), ("b", "./x")]);
        let (out, _) = rewrite("import { a, b } from 'pkg'\n", "pkg", &map);
        assert_eq!(out, "import { a, b } from 'pkg/x'\n");
    }

    #[test]
    fn block_comments_do_not_split_fields() {
        let map = map_of(&[("a", "./x"), ("b", "./x")]);
        let (out, _) = rewrite("import {a /* a, the first */, b} from 'pkg'\n", "pkg", &map);
        assert_eq!(out, "import {a, b} from 'pkg/x'\n");
    }

    #[test]
    fn unrelated_modules_are_untouched(){
        let map = map_of(&[("a", "./x")]);
        let source = "import {a} from 'other'\nconst x = 1\n";
        let (out, refs) = rewrite(source, "pkg", &map);
        assert_eq!(out, source);
        assert!(refs.is_empty());
    }

    #[test]
    fn as_source_is_the_lookup_key() {
        let map = map_of(&[("a", "./x")]);
        let (out, _) = rewrite("import {a as local} from 'pkg'\n", "pkg", &map);
        assert_eq!(out, "import {a as local} from 'pkg/x'\n");
    }

    #[test]
    fn prefix_value_joins_subdirectory() {
        assert_eq!(prefix_value("es", "./b"), "es/b");
        assert_eq!(prefix_value("es", "./b::v"), "es/b::v");
        assert_eq!(prefix_value("es", ""), "es");
    }
}
