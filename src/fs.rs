//! Filesystem capability injected into the compiler and indexer.
//!
//! Everything that reads the disk goes through [`FileSystem`] so tests and
//! embedders can substitute their own implementation. The capability surface
//! is read-only; writing (persisted artifacts, generated index files) happens
//! at the edges through `std::fs`.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Minimal stat record, enough to distinguish files from directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub is_dir: bool,
}

pub trait FileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Entry names of a directory, sorted for deterministic traversal.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    fn exists(&self, path: &Path) -> bool;
}

/// The real filesystem.
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let meta = fs::metadata(path)?;
        Ok(FileStat {
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Lexically absolutizes and cleans a path without touching the filesystem.
///
/// Units are cached by this form, so it must not require the path to exist
/// (content can be supplied in memory for paths that were never written).
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
