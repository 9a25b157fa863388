use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use walkdir::WalkDir;

use crate::assembler::{save_artifact, AssembleOptions, Assembler};
use crate::error::Result;
use crate::indexer::{EntryFilter, Indexer, IndexifyOptions};
use crate::rewriter::{ModuleConfig, Rewriter};

#[derive(Parser)]
#[command(name = "index-loader")]
#[command(about = "Export-graph tooling for TypeScript module trees")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Flatten a declaration entry into an export-map artifact
    index-loader djson node_modules/antd/index.d.ts --out-file node_modules/antd/index.d.json

    # Generate barrel index files for source directories
    index-loader indexify ./src/components ./src/helper --deep 2

    # Split barrel imports in a source tree into direct submodule imports
    index-loader rewrite ./src --modules antd
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble a declaration file's export map and print or persist it
    Djson {
        /// Entry declaration file (index.d.ts or any .ts/.tsx file)
        input: PathBuf,

        /// Write the JSON map here instead of stdout
        #[arg(long)]
        out_file: Option<PathBuf>,

        /// Skip import-line analysis when compiling
        #[arg(long)]
        no_analyze_import: bool,
    },

    /// Generate a barrel index file for each given directory
    Indexify {
        /// Directories to index
        #[arg(required = true)]
        folders: Vec<PathBuf>,

        /// Output filename inside each directory
        #[arg(long, default_value = "index.d.ts")]
        index: String,

        /// Maximum recursion depth (0 = unbounded)
        #[arg(long, default_value = "0")]
        deep: usize,

        /// Entry names to skip
        #[arg(long)]
        exclude: Vec<String>,

        /// Rename `default` exports after their file
        #[arg(long)]
        rename_default: bool,
    },

    /// Rewrite barrel imports of the given modules into direct imports
    Rewrite {
        /// Source files or directories to rewrite in place
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Module names to split (e.g. antd)
        #[arg(long, required = true)]
        modules: Vec<String>,

        /// Reassemble export maps on every file instead of caching
        #[arg(long)]
        realtime_parse: bool,

        /// Log every replaced statement
        #[arg(long)]
        debug: bool,
    },
}

pub fn djson(input: &Path, out_file: Option<&Path>, no_analyze_import: bool) -> Result<()> {
    let assembler = Assembler::new();
    let map = assembler.assemble(
        input,
        &AssembleOptions {
            disable_analyze_import: no_analyze_import,
            ..Default::default()
        },
    )?;

    match out_file {
        Some(path) => {
            save_artifact(&map, path)?;
            println!("Wrote {} entries to {}", map.len(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&map)?),
    }
    Ok(())
}

pub fn indexify(
    folders: &[PathBuf],
    index_name: &str,
    deep: usize,
    exclude: &[String],
    rename_default: bool,
) -> Result<()> {
    let indexer = Indexer::new();
    let mut filter: Option<Box<EntryFilter>> = None;
    if !exclude.is_empty() {
        let excluded = exclude.to_vec();
        filter = Some(Box::new(move |_stat, name, _relative, _absolute| {
            !excluded.iter().any(|e| e.as_str() == name)
        }));
    }
    let options = IndexifyOptions {
        deep,
        rename_default,
        filter,
        ..Default::default()
    };

    for folder in folders {
        let content = indexer.indexify(folder, &options)?;
        let out = folder.join(index_name);
        fs::write(&out, content)?;
        println!("Wrote {}", out.display());
    }
    Ok(())
}

pub fn rewrite(
    paths: &[PathBuf],
    modules: &[String],
    realtime_parse: bool,
    debug: bool,
) -> Result<()> {
    let configs: Vec<ModuleConfig> = modules
        .iter()
        .map(|name| ModuleConfig {
            realtime_parse,
            debug,
            ..ModuleConfig::named(name)
        })
        .collect();

    let rewriter = Rewriter::new();
    let mut ref_modules: Vec<String> = Vec::new();
    let mut rewritten_files = 0usize;

    for path in paths {
        for file in source_files(path) {
            let outcome = rewriter.transform(&file, None, &configs)?;
            if outcome.rewritten != outcome.source {
                fs::write(&outcome.source_file, &outcome.rewritten)?;
                rewritten_files += 1;
            }
            ref_modules.extend(outcome.ref_modules);
        }
    }

    ref_modules.sort();
    ref_modules.dedup();
    println!("Rewrote {rewritten_files} file(s)");
    for module in &ref_modules {
        println!("  {module}");
    }
    Ok(())
}

fn source_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != "node_modules")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            (name.ends_with(".ts") || name.ends_with(".tsx")) && !name.ends_with(".d.ts")
        })
        .map(|e| e.into_path())
        .collect()
}
