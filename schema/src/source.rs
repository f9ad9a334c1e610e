use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, UTF_8};
use tracing::debug;

use crate::error::{CompileError, Result};

pub const SOURCE_EXTENSION: &str = "ks";

/// The decoded text of one schema file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceText {
    pub path: PathBuf,
    pub text: String,
}

impl SourceText {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Reads every `.ks` file below `root`, in sorted path order.
pub fn load_sources(root: &Path) -> Result<Vec<SourceText>> {
    let mut paths = Vec::new();
    collect_paths(root, &mut paths)?;
    paths.sort();
    debug!(root = %root.display(), files = paths.len(), "found schema files");

    paths.into_iter().map(|path| read_source(&path)).collect()
}

fn collect_paths(directory: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    let io_error = |source| CompileError::Io {
        path: directory.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(directory).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_paths(&path, paths)?;
        } else if path
            .extension()
            .is_some_and(|extension| extension == SOURCE_EXTENSION)
        {
            paths.push(path);
        }
    }
    Ok(())
}

/// Reads a file as UTF-8. A byte-order mark is dropped; malformed input is an error.
pub fn read_source(path: &Path) -> Result<SourceText> {
    let buf = fs::read(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (decoded, _, had_errors) = Encoding::decode(UTF_8, &buf);
    if had_errors {
        return Err(CompileError::Encoding {
            path: path.to_path_buf(),
        });
    }
    Ok(SourceText::new(path, decoded.into_owned()))
}
