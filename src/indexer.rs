//! Directory indexer: synthesizes a barrel declaration file for a directory
//! tree, deduplicating exported names across the whole traversal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::compiler::patterns::{EOL, KEY_DEFAULT};
use crate::compiler::{CompileOptions, Compiler, Unit, INDEX_CANDIDATES};
use crate::error::Result;
use crate::fs::{normalize_path, FileStat};

/// Predicate over (stat, entry name, path relative to the root, absolute
/// path); entries it rejects are not indexed.
pub type EntryFilter = dyn Fn(&FileStat, &str, &Path, &Path) -> bool;

/// Derives an exported name from a file path.
pub type RenameFn = dyn Fn(&Path) -> String;

pub struct IndexifyOptions {
    /// Maximum recursion depth; `0` means unbounded.
    pub deep: usize,
    /// When a subdirectory owns one of the candidate index files, emit one
    /// re-export of that file instead of descending. On by default.
    pub reuse_index: bool,
    /// Rewrite a `default` export to a name derived from the file.
    pub rename_default: bool,
    pub filter: Option<Box<EntryFilter>>,
    /// Name derivation override; the default is PascalCase of the file
    /// basename (or of the parent directory for files named `index`).
    pub rename: Option<Box<RenameFn>>,
}

impl Default for IndexifyOptions {
    fn default() -> Self {
        Self {
            deep: 0,
            reuse_index: true,
            rename_default: false,
            filter: None,
            rename: None,
        }
    }
}

pub struct Indexer {
    compiler: Compiler,
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Indexer {
    pub fn new() -> Self {
        Self::with_compiler(Compiler::new())
    }

    pub fn with_compiler(compiler: Compiler) -> Self {
        Self { compiler }
    }

    /// Produces the text of a barrel declaration file for `folder`.
    pub fn indexify(&self, folder: &Path, options: &IndexifyOptions) -> Result<String> {
        let root = normalize_path(folder);
        let mut state = Traversal {
            root: root.clone(),
            options,
            lines: Vec::new(),
            used: HashSet::new(),
            namespace_aliases: Vec::new(),
        };

        self.walk_folder(&root, 1, &mut state)?;

        // Legacy aggregate files were pulled in as namespace imports; one
        // trailing statement re-exports them all.
        if !state.namespace_aliases.is_empty() {
            state
                .lines
                .push(format!("export {{{}}}", state.namespace_aliases.join(", ")));
        }
        Ok(state.lines.join(EOL))
    }

    fn walk_folder(&self, folder: &Path, depth: usize, state: &mut Traversal) -> Result<()> {
        if state.options.deep != 0 && depth > state.options.deep {
            return Ok(());
        }

        if depth != 1 && state.options.reuse_index {
            for candidate in INDEX_CANDIDATES {
                let index_file = folder.join(candidate);
                if self.compiler.fs().exists(&index_file) {
                    return self.emit_file(&index_file, state);
                }
            }
        }

        for name in self.compiler.fs().read_dir(folder)? {
            // The root's own index is what we are generating.
            if depth == 1 && INDEX_CANDIDATES.contains(&name.as_str()) {
                continue;
            }
            if name.starts_with('_') || name.starts_with('.') {
                continue;
            }

            let absolute = folder.join(&name);
            let stat = self.compiler.fs().stat(&absolute)?;
            if stat.is_file && !(name.ends_with(".ts") || name.ends_with(".tsx")) {
                continue;
            }

            if let Some(filter) = &state.options.filter {
                let relative = absolute
                    .strip_prefix(&state.root)
                    .unwrap_or(&absolute)
                    .to_path_buf();
                if !filter(&stat, &name, &relative, &absolute) {
                    continue;
                }
            }

            if stat.is_file {
                self.emit_file(&absolute, state)?;
            } else if stat.is_dir {
                self.walk_folder(&absolute, depth + 1, state)?;
            }
        }
        Ok(())
    }

    fn emit_file(&self, file: &Path, state: &mut Traversal) -> Result<()> {
        let options = CompileOptions {
            disable_analyze_import: true,
            ..Default::default()
        };
        let unit = self.compiler.compile(file, &options)?;
        let reference = state.reference_for(file);

        if unit.legacy_aggregate {
            let name = state.derive_name(file);
            if !state.used.insert(name.clone()) {
                tracing::warn!(
                    "exported name `{}` from {} collides with an earlier file, dropped",
                    name,
                    file.display()
                );
                return Ok(());
            }
            state.lines.push(format!("import * as {name} from '{reference}'"));
            state.namespace_aliases.push(name);
            return Ok(());
        }

        let surface = self.surface_names(&unit, &mut HashSet::new())?;
        let mut kept: Vec<(String, String)> = Vec::new();
        let mut renamed = false;
        for name in &surface {
            let out_name = if name == KEY_DEFAULT && state.options.rename_default {
                renamed = true;
                state.derive_name(file)
            } else {
                name.clone()
            };
            if !state.used.insert(out_name.clone()) {
                tracing::warn!(
                    "exported name `{}` from {} collides with an earlier file, dropped",
                    out_name,
                    file.display()
                );
                continue;
            }
            kept.push((name.clone(), out_name));
        }

        if kept.is_empty() {
            return Ok(());
        }
        if !renamed && kept.len() == surface.len() {
            state.lines.push(format!("export * from '{reference}'"));
        } else {
            // An explicit list keeps dropped and renamed names from leaking
            // back out through a blanket re-export.
            let fields: Vec<String> = kept
                .into_iter()
                .map(|(name, out_name)| {
                    if name == out_name {
                        name
                    } else {
                        format!("{name} as {out_name}")
                    }
                })
                .collect();
            state
                .lines
                .push(format!("export {{{}}} from '{reference}'", fields.join(", ")));
        }
        Ok(())
    }

    /// Full exported surface of a unit: declares, explicit export names, and
    /// the surfaces behind wildcard edges. Cyclic wildcards stop silently;
    /// the indexer only needs names, not provenance.
    fn surface_names(&self, unit: &Unit, seen: &mut HashSet<PathBuf>) -> Result<Vec<String>> {
        seen.insert(unit.path.clone());

        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str, names: &mut Vec<String>| {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };

        for name in &unit.declares {
            push(name, &mut names);
        }
        for edge in &unit.edges {
            if edge.is_wildcard() {
                if seen.contains(&edge.from) {
                    continue;
                }
                let options = CompileOptions {
                    disable_analyze_import: true,
                    ..Default::default()
                };
                let target = self.compiler.compile(&edge.from, &options)?;
                for name in self.surface_names(&target, seen)? {
                    push(&name, &mut names);
                }
            } else {
                for entry in &edge.names {
                    push(&entry.name, &mut names);
                }
            }
        }
        Ok(names)
    }
}

struct Traversal<'a> {
    root: PathBuf,
    options: &'a IndexifyOptions,
    lines: Vec<String>,
    used: HashSet<String>,
    namespace_aliases: Vec<String>,
}

impl Traversal<'_> {
    /// `./`-relative reference to a file, extension stripped, a trailing
    /// `/index` collapsed into a directory reference.
    fn reference_for(&self, file: &Path) -> String {
        let relative = file.strip_prefix(&self.root).unwrap_or(file);
        let mut text = relative.to_string_lossy().replace('\\', "/");
        for ext in [".d.ts", ".tsx", ".ts"] {
            if text.ends_with(ext) {
                text.truncate(text.len() - ext.len());
                break;
            }
        }
        if let Some(stripped) = text.strip_suffix("/index") {
            text = format!("{stripped}/");
        }
        format!("./{text}")
    }

    fn derive_name(&self, file: &Path) -> String {
        if let Some(rename) = &self.options.rename {
            return rename(file);
        }
        default_name(file)
    }
}

fn default_name(file: &Path) -> String {
    let mut stem = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for ext in [".d.ts", ".tsx", ".ts"] {
        if stem.ends_with(ext) {
            stem.truncate(stem.len() - ext.len());
            break;
        }
    }
    if stem == "index" {
        if let Some(parent) = file.parent().and_then(|p| p.file_name()) {
            stem = parent.to_string_lossy().into_owned();
        }
    }
    pascal_case(&stem)
}

fn pascal_case(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
