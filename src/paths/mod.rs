//! Output path derivation.

use std::path::{Path, PathBuf};

use crate::convert::AudioFormat;
use crate::ConversionError;

/// Build the audio file name for a source: its stem plus the format's extension
pub fn output_file_name(source: &Path, format: AudioFormat) -> PathBuf {
    // Appended rather than set_extension so dotted stems like "a.final" survive.
    let mut name = source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".");
    name.push(format.extension());
    PathBuf::from(name)
}

/// Resolve where the audio extracted from `source` should be written.
///
/// With an output directory the file lands there, and the directory is created if needed.
/// Without one the audio file sits next to the source.
pub fn resolve_output_path(
    source: &Path,
    output_dir: Option<&Path>,
    format: AudioFormat,
) -> Result<PathBuf, ConversionError> {
    let file_name = output_file_name(source, format);

    match output_dir {
        Some(dir) => {
            if !ensure_directory_exists(dir) {
                return Err(ConversionError::OutputDirectoryUnavailable {
                    path: dir.to_path_buf(),
                });
            }
            Ok(dir.join(file_name))
        }
        None => Ok(source
            .parent()
            .map(|parent| parent.join(&file_name))
            .unwrap_or(file_name)),
    }
}

/// Re-root `source` (found under `root`) beneath `output_dir`, keeping its relative subdirectory.
///
/// Pure path arithmetic: nothing is created on disk.
pub fn rebase_output_path(
    source: &Path,
    root: &Path,
    output_dir: &Path,
    format: AudioFormat,
) -> PathBuf {
    let relative_dir = source
        .strip_prefix(root)
        .ok()
        .and_then(|relative| relative.parent())
        .unwrap_or_else(|| Path::new(""));

    output_dir
        .join(relative_dir)
        .join(output_file_name(source, format))
}

/// Create `path` and any missing parents. Succeeds if it already exists.
///
/// Returns `false` on permission or I/O failure and leaves the reaction to the caller.
pub fn ensure_directory_exists(path: &Path) -> bool {
    if path.as_os_str().is_empty() || path.is_dir() {
        return true;
    }

    match fs_err::create_dir_all(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to create directory: {}", e);
            false
        }
    }
}

/// Ensure the directory that will contain `file` exists
pub fn ensure_parent_exists(file: &Path) -> bool {
    match file.parent() {
        Some(parent) => ensure_directory_exists(parent),
        None => true,
    }
}
