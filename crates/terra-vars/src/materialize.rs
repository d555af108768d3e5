//! Writing the resolved mapping to the terraform working directory
//!
//! The variables file is replaced atomically: content goes to a temp file
//! in the destination directory first, then renames over the target, so a
//! concurrent reader never observes a half-written file.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use terra_common::{Error, Result};

pub use terra_common::GENERATED_VARS_FILENAME;

/// Serialize `vars` as a flat JSON object into `working_dir`
///
/// Writes [`GENERATED_VARS_FILENAME`], fully overwriting any file left by
/// a previous attempt, and returns the destination path. Keys serialize in
/// sorted order, so equal mappings produce byte-identical files.
pub fn write_vars_file(vars: &BTreeMap<String, String>, working_dir: &Path) -> Result<PathBuf> {
    let path = working_dir.join(GENERATED_VARS_FILENAME);

    // A string-to-string map always serializes; treat the impossible as io
    let json = serde_json::to_vec(vars).map_err(|e| Error::VarsWrite {
        path: path.clone(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;

    let mut tmp = NamedTempFile::new_in(working_dir).map_err(|source| Error::VarsWrite {
        path: path.clone(),
        source,
    })?;
    tmp.write_all(&json).map_err(|source| Error::VarsWrite {
        path: path.clone(),
        source,
    })?;
    tmp.persist(&path).map_err(|e| Error::VarsWrite {
        path: path.clone(),
        source: e.error,
    })?;

    debug!(path = %path.display(), vars = vars.len(), "Wrote generated vars file");
    Ok(path)
}
