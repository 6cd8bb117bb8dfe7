use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Video container extensions accepted as conversion sources (lowercase, no dot)
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "avi", "mov", "mkv", "flv", "wmv", "m4v", "3gp"];

/// Check whether a path carries a supported video extension (case-insensitive)
pub fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            SUPPORTED_VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Recursively collect every supported video file under `root`.
///
/// The result is sorted by full path so that batch numbering is reproducible across runs.
/// A missing directory, or one without matches, yields an empty list.
pub fn discover_video_files(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        tracing::debug!("Discovery root is not a directory: {}", root.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("Error accessing entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_supported_video(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    // Plain string order, so "a-c.mp4" sorts before "a/b.mp4".
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    files
}
