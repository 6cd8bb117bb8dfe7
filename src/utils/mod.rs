use std::path::Path;

use crate::transcoder::{TranscodeError, Transcoder};

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Size of a file on disk, 0 if it cannot be read
pub fn file_size(path: &Path) -> u64 {
    fs_err::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Check if the transcoder's external tools are available
pub async fn check_dependencies<T: Transcoder>(transcoder: &T) -> Vec<String> {
    let mut missing = Vec::new();

    match transcoder.validate().await {
        Ok(()) => {}
        Err(TranscodeError::ToolNotFound { path }) => {
            missing.push(format!("{} - required for audio extraction", path.display()));
        }
        Err(e) => {
            missing.push(format!("{} is not usable: {}", transcoder.name(), e));
        }
    }

    missing
}
