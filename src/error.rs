use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported export syntax `{line}` in {}", file.display())]
    UnsupportedExport { file: PathBuf, line: String },

    #[error("cannot resolve file referenced by `{line}` in {}", file.display())]
    UnresolvedReference { file: PathBuf, line: String },

    #[error("symbol `{name}` requested by {} not found", requester.display())]
    SymbolNotFound { name: String, requester: PathBuf },

    #[error("field \"{field}\" is not exported by module `{module}`")]
    FieldNotInModule { field: String, module: String },

    #[error("circular re-export through {}", .0.display())]
    CircularReexport(PathBuf),

    #[error("module `{0}` has no declaration entry and no export-map artifact")]
    MissingModuleEntry(String),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
