//! Export-map assembler: flattens one entry unit's whole surface into a
//! `name -> relativeSubpath[::remote]` dictionary.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::patterns::KEY_SEPARATOR;
use crate::compiler::{CompileOptions, Compiler, Unit};
use crate::error::{LoaderError, Result};
use crate::fs::{normalize_path, FileSystem};
use crate::resolver::resolve_from;

/// Flattened, terminal view of one entry unit. Values are relative subpaths
/// from the entry file, optionally suffixed with `::remote`; the empty string
/// marks a name resident in the entry file itself.
pub type ExportMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    /// Bypass both the unit cache and the per-entry map cache.
    pub disable_cache: bool,
    /// Skip import-line analysis in the compiler.
    pub disable_analyze_import: bool,
}

/// Owns the per-entry map cache; compilation goes through the held
/// [`Compiler`] and shares its unit cache.
pub struct Assembler {
    compiler: Compiler,
    cache: RefCell<HashMap<PathBuf, ExportMap>>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self::with_compiler(Compiler::new())
    }

    pub fn with_compiler(compiler: Compiler) -> Self {
        Self {
            compiler,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn assemble(&self, entry: &Path, options: &AssembleOptions) -> Result<ExportMap> {
        let entry = normalize_path(entry);

        if !options.disable_cache {
            if let Some(map) = self.cache.borrow().get(&entry) {
                return Ok(map.clone());
            }
        }

        let compile_options = CompileOptions {
            content: None,
            disable_cache: options.disable_cache,
            disable_analyze_import: options.disable_analyze_import,
        };
        let unit = self.compiler.compile(&entry, &compile_options)?;
        let entry_dir = entry.parent().unwrap_or_else(|| Path::new("/")).to_path_buf();

        let mut map = ExportMap::new();
        for name in &unit.declares {
            insert_value(&mut map, name, String::new());
        }

        let mut walk = WildcardWalk::default();
        walk.stack.push(entry.clone());
        self.assemble_edges(&unit, &entry_dir, &compile_options, &mut map, &mut walk)?;

        self.cache.borrow_mut().insert(entry, map.clone());
        Ok(map)
    }

    fn assemble_edges(
        &self,
        unit: &Unit,
        entry_dir: &Path,
        options: &CompileOptions,
        map: &mut ExportMap,
        walk: &mut WildcardWalk,
    ) -> Result<()> {
        for edge in &unit.edges {
            if edge.is_wildcard() {
                if walk.stack.contains(&edge.from) {
                    return Err(LoaderError::CircularReexport(edge.from.clone()));
                }
                if !walk.done.insert(edge.from.clone()) {
                    // Already expanded under another edge; idempotent.
                    continue;
                }
                let target = self.compiler.compile(&edge.from, options)?;
                let rel = relative_key(entry_dir, &target.path);
                for name in &target.declares {
                    insert_value(map, name, rel.clone());
                }
                walk.stack.push(edge.from.clone());
                self.assemble_edges(&target, entry_dir, options, map, walk)?;
                walk.stack.pop();
            } else {
                let target = self.compiler.compile(&edge.from, options)?;
                for entry in &edge.names {
                    let resolved =
                        resolve_from(&self.compiler, entry, &target, &unit.path, options)?;
                    let mut value = relative_key(entry_dir, &resolved.path);
                    if let Some(remote) = resolved.remote.as_deref().filter(|r| *r != entry.name) {
                        value = format!("{value}{KEY_SEPARATOR}{remote}");
                    }
                    insert_value(map, &entry.name, value);
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct WildcardWalk {
    /// Units on the current expansion path; revisiting one is a cycle.
    stack: Vec<PathBuf>,
    /// Units whose surface was already pulled in; revisiting is a no-op.
    done: HashSet<PathBuf>,
}

fn insert_value(map: &mut ExportMap, name: &str, value: String) {
    if let Some(previous) = map.get(name) {
        tracing::warn!(
            "exported name `{}` from `{}` overrides the one from `{}`",
            name,
            display_value(&value),
            display_value(previous),
        );
    }
    map.insert(name.to_string(), value);
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "<entry>"
    } else {
        value
    }
}

/// Map value for a target file: relative to the entry's directory, extension
/// stripped, a trailing `/index` collapsed to `/`, `./`-prefixed Node style.
fn relative_key(entry_dir: &Path, target: &Path) -> String {
    let mut key = relative_path(entry_dir, target)
        .to_string_lossy()
        .replace('\\', "/");

    for ext in [".d.ts", ".tsx", ".ts"] {
        if key.ends_with(ext) {
            key.truncate(key.len() - ext.len());
            break;
        }
    }
    if let Some(stripped) = key.strip_suffix("/index") {
        key = format!("{stripped}/");
    } else if key == "index" {
        key = String::new();
    }
    if !key.is_empty() && !key.starts_with('.') {
        key = format!("./{key}");
    }
    key
}

fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<_> = base.components().collect();
    let target: Vec<_> = target.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for component in &target[common..] {
        out.push(component.as_os_str());
    }
    out
}

/// Loads a persisted export-map artifact (a JSON name -> value dictionary)
/// through the injected filesystem capability.
pub fn load_artifact(fs: &dyn FileSystem, path: &Path) -> Result<ExportMap> {
    let text = fs.read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Persists an export map, creating parent directories as needed.
pub fn save_artifact(map: &ExportMap, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(map)?)?;
    Ok(())
}
