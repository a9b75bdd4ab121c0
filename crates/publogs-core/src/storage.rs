//! Artifact file lifecycle: stream into a uniquely named `.part` file next to
//! the destination, then move it into place without clobbering.
//!
//! A destination path only ever exists once its content is complete, which is
//! what lets actions treat "destination exists" as "already done". Each
//! attempt gets its own temp file, so two writers for the same destination
//! never share one.

use std::fs;
use std::io;
use std::path::Path;

use tempfile::NamedTempFile;

/// Temporary file suffix used before the final move.
pub const TEMP_SUFFIX: &str = ".part";

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Fresh temp file in the destination's directory, e.g. `.k1abc.log.Xy3k9a.part`.
/// It is removed when dropped unless committed.
pub fn create_temp(final_path: &Path) -> io::Result<NamedTempFile> {
    let dir = match final_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
}

/// Move a finished temp file into place. Returns `false` (and drops the temp
/// file) when the destination appeared in the meantime.
pub fn commit(temp: NamedTempFile, final_path: &Path) -> io::Result<bool> {
    match temp.persist_noclobber(final_path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}
