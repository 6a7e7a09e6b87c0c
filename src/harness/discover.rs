//! Benchmark discovery

use crate::error::{HarnessError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A benchmark program on disk
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Benchmark {
    /// File name, used as the result-store key
    pub name: String,
    pub path: PathBuf,
}

/// Regular files in `dir` with the given extension (case-insensitive),
/// sorted by file name
pub fn benchmarks_in(dir: &Path, extension: &str) -> Result<Vec<Benchmark>> {
    if !dir.is_dir() {
        return Err(HarnessError::InvalidDirectory(dir.to_path_buf()));
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if !path.is_file() || !matches {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            found.push(Benchmark {
                name: name.to_string(),
                path: path.clone(),
            });
        }
    }

    found.sort();
    Ok(found)
}
